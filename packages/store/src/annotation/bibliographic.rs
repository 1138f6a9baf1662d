use spangraph::{BibliographicInput, BibliographicMetadata, BibliographyType};

use super::{create_span, load_single_span, parse_type, AnnotationKind, KindDescriptor};
use crate::error::StoreError;
use crate::graph::{GraphRead, GraphWrite, Node};
use crate::schema::{labels, rels};

/// Titles, colophons, incipits and similar metadata located in the text.
pub struct Bibliographic;

impl AnnotationKind for Bibliographic {
    type Input = BibliographicInput;
    type Output = BibliographicMetadata;

    const DESCRIPTOR: KindDescriptor = KindDescriptor {
        name: "bibliographic",
        anchor_label: labels::BIBLIOGRAPHIC_METADATA,
        annotation_edge: rels::BIBLIOGRAPHY_OF,
        type_label: Some(labels::BIBLIOGRAPHY_TYPE),
        fixed_type: None,
        owned_edges: &[rels::HAS_SPAN],
    };

    fn type_name(input: &BibliographicInput) -> Option<&'static str> {
        Some(input.bibliography_type.as_str())
    }

    fn create_owned(
        tx: &mut dyn GraphWrite,
        anchor_id: &str,
        input: &BibliographicInput,
    ) -> Result<(), StoreError> {
        create_span(tx, anchor_id, &input.span).map(|_| ())
    }

    fn load(
        session: &dyn GraphRead,
        anchor: &Node,
        type_name: Option<&str>,
    ) -> Result<BibliographicMetadata, StoreError> {
        Ok(BibliographicMetadata {
            id: anchor.id.clone(),
            bibliography_type: parse_type::<BibliographyType>(anchor, type_name)?,
            span: load_single_span(session, anchor)?,
        })
    }

    fn output_id(output: &BibliographicMetadata) -> &str {
        &output.id
    }
}
