//! Pure logic for span-anchored text annotations and text lineage.
//!
//! This crate holds everything that does not touch storage: the annotation
//! data model, input validation, node ID generation, and the relationship
//! inference engine. Graph persistence lives in `spangraph-store`.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | [`Span`], kind enums, annotation inputs and outputs |
//! | [`validation`] | Input checks via [`Validate`] and [`validate_span`] |
//! | [`ids`] | [`generate_id`] for new graph nodes |
//! | [`relation`] | Relation composition table and [`infer_relationships`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use spangraph::relation::{Adjacency, AdjacencyMap, EdgeDirection, EdgeType};
//! use spangraph::infer_relationships;
//!
//! let mut map = AdjacencyMap::new();
//! map.insert("E1".into(), vec![Adjacency::new("E2", EdgeType::TranslationOf, EdgeDirection::Out)]);
//! map.insert("E2".into(), vec![Adjacency::new("E1", EdgeType::TranslationOf, EdgeDirection::In)]);
//!
//! let groups = infer_relationships(&map, "E1")?;
//! // {TRANSLATION: ["E2"]}
//! ```

pub mod ids;
pub mod relation;
pub mod types;
pub mod validation;

pub use ids::{generate_id, is_valid_id};
pub use relation::{
    infer_relation_dict, infer_relationships, Adjacency, AdjacencyMap, Classification,
    EdgeDirection, EdgeType, Relation, RelationDict, RelationError, RelationGroups,
};
pub use types::{
    BibliographicInput, BibliographicMetadata, BibliographyType, Note, NoteInput, NoteType, Page,
    PageInput, Pagination, PaginationInput, Positioned, Segment, SegmentInput, SegmentationType,
    Span, Volume, VolumeInput,
};
pub use validation::{validate_batch, validate_lines, validate_span, Validate, ValidationError};
