//! Graph-backed storage for span annotations and text lineage.
//!
//! Repositories run each call as one read session or one write transaction
//! against a [`GraphProvider`], on tokio's blocking pool. The relationship
//! service reads the lineage graph once per call and hands it to the
//! in-memory traversal in `spangraph::relation`.

pub mod annotation;
pub mod config;
pub mod error;
pub mod graph;
pub mod relationships;
pub mod schema;

pub use annotation::{
    AnnotationKind, BibliographicRepository, KindDescriptor, NoteRepository,
    PaginationRepository, Repositories, SegmentationRepository, SpanAnnotationRepository,
};
pub use config::{RetryPolicy, StoreConfig};
pub use error::StoreError;
pub use graph::{
    memory::MemoryGraph, open_provider, sqlite::SqliteGraph, GraphProvider, GraphProviderExt,
};
pub use relationships::{build_adjacency_map, RelationshipService};
