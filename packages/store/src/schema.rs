//! Graph vocabulary and fixture helpers.
//!
//! Annotation repositories only ever *match* manifestations, expressions,
//! and enum nodes; they never create them. The helpers here create those
//! pre-existing nodes for operators (the CLI) and tests.

use serde_json::Value;
use spangraph::{BibliographyType, EdgeType, NoteType, SegmentationType};

use crate::error::StoreError;
use crate::graph::{Edge, GraphProvider, GraphProviderExt, GraphWrite, Node};

pub mod labels {
    pub const MANIFESTATION: &str = "Manifestation";
    pub const EXPRESSION: &str = "Expression";
    pub const SPAN: &str = "Span";
    pub const BIBLIOGRAPHIC_METADATA: &str = "BibliographicMetadata";
    pub const NOTE: &str = "Note";
    pub const SEGMENT: &str = "Segment";
    pub const PAGINATION: &str = "Pagination";
    pub const VOLUME: &str = "Volume";
    pub const PAGE: &str = "Page";
    pub const BIBLIOGRAPHY_TYPE: &str = "BibliographyType";
    pub const NOTE_TYPE: &str = "NoteType";
    pub const SEGMENTATION_TYPE: &str = "SegmentationType";
}

pub mod rels {
    pub const HAS_SPAN: &str = "HAS_SPAN";
    pub const HAS_TYPE: &str = "HAS_TYPE";
    pub const HAS_VOLUME: &str = "HAS_VOLUME";
    pub const HAS_PAGE: &str = "HAS_PAGE";
    pub const BIBLIOGRAPHY_OF: &str = "BIBLIOGRAPHY_OF";
    pub const NOTE_OF: &str = "NOTE_OF";
    pub const SEGMENT_OF: &str = "SEGMENT_OF";
    pub const PAGINATION_OF: &str = "PAGINATION_OF";
}

/// Property holding an enum node's wire name.
pub const NAME: &str = "name";

/// Every `(label, name)` enum node the repositories may link to.
pub fn enum_nodes() -> Vec<(&'static str, &'static str)> {
    let mut out = Vec::new();
    out.extend(
        BibliographyType::ALL
            .iter()
            .map(|t| (labels::BIBLIOGRAPHY_TYPE, t.as_str())),
    );
    out.extend(NoteType::ALL.iter().map(|t| (labels::NOTE_TYPE, t.as_str())));
    out.extend(
        SegmentationType::ALL
            .iter()
            .map(|t| (labels::SEGMENTATION_TYPE, t.as_str())),
    );
    out
}

/// Stable ID of an enum node.
pub fn enum_node_id(label: &str, name: &str) -> String {
    format!("{label}:{name}")
}

/// Create every enum node that does not yet exist, in one transaction.
/// Returns how many were created.
pub fn seed_enum_nodes(provider: &dyn GraphProvider) -> Result<usize, StoreError> {
    let created = provider.write_transaction(|tx| {
        let mut created = 0;
        for (label, name) in enum_nodes() {
            if !tx.find_nodes(label, NAME, &Value::from(name))?.is_empty() {
                continue;
            }
            tx.create_node(Node::new(enum_node_id(label, name), label).with(NAME, name))?;
            created += 1;
        }
        Ok(created)
    })?;
    tracing::info!(created, "seeded enum nodes");
    Ok(created)
}

/// Create a bare manifestation node.
pub fn create_manifestation(provider: &dyn GraphProvider, id: &str) -> Result<(), StoreError> {
    provider.write_transaction(|tx| tx.create_node(Node::new(id, labels::MANIFESTATION)))
}

/// Create a bare expression node.
pub fn create_expression(provider: &dyn GraphProvider, id: &str) -> Result<(), StoreError> {
    provider.write_transaction(|tx| tx.create_node(Node::new(id, labels::EXPRESSION)))
}

/// Record that expression `from` is a translation of / commentary on `to`.
pub fn link_expressions(
    provider: &dyn GraphProvider,
    from: &str,
    edge_type: EdgeType,
    to: &str,
) -> Result<(), StoreError> {
    provider.write_transaction(|tx| {
        require_expression(tx, from)?;
        require_expression(tx, to)?;
        tx.create_edge(Edge::new(from, edge_type.as_str(), to))
    })
}

fn require_expression(tx: &mut dyn GraphWrite, id: &str) -> Result<(), StoreError> {
    tx.node_with_label(id, labels::EXPRESSION)?
        .map(|_| ())
        .ok_or_else(|| StoreError::NotFound(format!("expression {id}")))
}
