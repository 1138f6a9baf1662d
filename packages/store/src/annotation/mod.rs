//! Span-anchored annotation repositories.
//!
//! Every annotation kind has the same graph shape:
//!
//! ```text
//!   (Manifestation) <-[annotation_edge]- (Anchor) -[HAS_TYPE]-> (TypeEnum)
//!                                            |
//!                                       owned_edges*
//!                                            v
//!                                         (Span)...
//! ```
//!
//! Kinds differ only in labels, edge names, and the owned subgraph under the
//! anchor. A [`KindDescriptor`] captures the names; an [`AnnotationKind`]
//! builds and reads back the owned subgraph. [`SpanAnnotationRepository`]
//! implements `get`/`get_all`/`add`/`delete`/`delete_all` once for all of
//! them.
//!
//! | Kind | Anchor | Owned subgraph |
//! |------|--------|----------------|
//! | [`Bibliographic`] | `BibliographicMetadata` | one `Span` |
//! | [`Notes`] | `Note` | one `Span` |
//! | [`Segmentation`] | `Segment` | one or more `Span` lines |
//! | [`Paginations`] | `Pagination` | `Volume` → `Page`s → `Span` lines |

mod bibliographic;
mod note;
mod pagination;
mod segmentation;

pub use bibliographic::Bibliographic;
pub use note::Notes;
pub use pagination::Paginations;
pub use segmentation::Segmentation;

use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use spangraph::{generate_id, validate_batch, Positioned, Span, Validate};

use crate::error::StoreError;
use crate::graph::{
    blocking, Direction, Edge, GraphProvider, GraphProviderExt, GraphRead, GraphWrite, Node,
    Properties,
};
use crate::schema::{labels, rels, NAME};

// ---------------------------------------------------------------------------
// Kind descriptors
// ---------------------------------------------------------------------------

/// Graph names for one annotation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    /// Short name used in logs and error messages.
    pub name: &'static str,
    pub anchor_label: &'static str,
    /// Edge from the anchor to its manifestation.
    pub annotation_edge: &'static str,
    /// Label of the enum node linked via `HAS_TYPE`, if the kind is typed.
    pub type_label: Option<&'static str>,
    /// When set, every anchor of this kind links to this enum name and
    /// reads only return anchors that do.
    pub fixed_type: Option<&'static str>,
    /// Edges, followed outward from the anchor, that lead to nodes the
    /// anchor owns. Deletion cascades along them.
    pub owned_edges: &'static [&'static str],
}

/// Builds and reads back the subgraph one annotation kind owns.
pub trait AnnotationKind: Send + Sync + 'static {
    type Input: Validate + Clone + Send + Sync + 'static;
    type Output: Positioned + Send + 'static;

    const DESCRIPTOR: KindDescriptor;

    /// Enum name the input links to. Only consulted for typed kinds without
    /// a `fixed_type`.
    fn type_name(_input: &Self::Input) -> Option<&'static str> {
        None
    }

    /// Properties stored on the anchor node itself.
    fn anchor_properties(_input: &Self::Input) -> Properties {
        Properties::new()
    }

    /// Create everything under the anchor (already created as `anchor_id`).
    fn create_owned(
        tx: &mut dyn GraphWrite,
        anchor_id: &str,
        input: &Self::Input,
    ) -> Result<(), StoreError>;

    /// Reconstruct the output for `anchor`. `type_name` is the name of the
    /// linked enum node, if any.
    fn load(
        session: &dyn GraphRead,
        anchor: &Node,
        type_name: Option<&str>,
    ) -> Result<Self::Output, StoreError>;

    /// Sort key for `get_all`; the annotation ID breaks ties.
    fn order_key(output: &Self::Output) -> (i64, i64) {
        (0, output.position().unwrap_or(i64::MAX))
    }

    fn output_id(output: &Self::Output) -> &str;
}

// ---------------------------------------------------------------------------
// Shared subgraph helpers
// ---------------------------------------------------------------------------

/// Create a `Span` node owned by `owner_id`. Returns the span's ID.
pub(crate) fn create_span(
    tx: &mut dyn GraphWrite,
    owner_id: &str,
    span: &Span,
) -> Result<String, StoreError> {
    let id = generate_id();
    tx.create_node(
        Node::new(&id, labels::SPAN)
            .with("start", span.start)
            .with("end", span.end),
    )?;
    tx.create_edge(Edge::new(owner_id, rels::HAS_SPAN, &id))?;
    Ok(id)
}

/// All spans owned by `owner_id`, sorted ascending.
pub(crate) fn load_spans<S: GraphRead + ?Sized>(
    session: &S,
    owner_id: &str,
) -> Result<Vec<Span>, StoreError> {
    let mut spans = session
        .neighbours(owner_id, rels::HAS_SPAN, Direction::Outgoing)?
        .iter()
        .map(|n| Ok(Span::new(n.int_prop("start")?, n.int_prop("end")?)))
        .collect::<Result<Vec<_>, StoreError>>()?;
    spans.sort();
    Ok(spans)
}

/// The single span owned by `owner`.
pub(crate) fn load_single_span<S: GraphRead + ?Sized>(
    session: &S,
    owner: &Node,
) -> Result<Span, StoreError> {
    load_spans(session, &owner.id)?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::malformed(format!("{} {} owns no span", owner.label, owner.id)))
}

/// Parse an enum name read from the graph.
pub(crate) fn parse_type<T: std::str::FromStr<Err = String>>(
    anchor: &Node,
    type_name: Option<&str>,
) -> Result<T, StoreError> {
    let name = type_name.ok_or_else(|| {
        StoreError::malformed(format!("{} {} has no type", anchor.label, anchor.id))
    })?;
    name.parse().map_err(StoreError::malformed)
}

fn linked_type_name<S: GraphRead + ?Sized>(
    session: &S,
    anchor_id: &str,
) -> Result<Option<String>, StoreError> {
    session
        .neighbours(anchor_id, rels::HAS_TYPE, Direction::Outgoing)?
        .first()
        .map(|n| n.str_prop(NAME).map(str::to_string))
        .transpose()
}

/// Anchors of `descriptor`'s kind on `manifestation_id`, with their type
/// names, honouring `fixed_type` and an optional caller filter.
fn matching_anchors<S: GraphRead + ?Sized>(
    session: &S,
    descriptor: &KindDescriptor,
    manifestation_id: &str,
    type_filter: Option<&str>,
) -> Result<Vec<(Node, Option<String>)>, StoreError> {
    let mut out = Vec::new();
    let anchors =
        session.neighbours(manifestation_id, descriptor.annotation_edge, Direction::Incoming)?;
    for anchor in anchors {
        if anchor.label != descriptor.anchor_label {
            continue;
        }
        let type_name = linked_type_name(session, &anchor.id)?;
        let wanted = [descriptor.fixed_type, type_filter];
        if wanted
            .iter()
            .flatten()
            .any(|w| type_name.as_deref() != Some(*w))
        {
            continue;
        }
        out.push((anchor, type_name));
    }
    Ok(out)
}

/// Delete `anchor_id` and every node reachable from it along `owned_edges`.
/// Returns the number of nodes removed.
fn cascade_delete(
    tx: &mut dyn GraphWrite,
    descriptor: &KindDescriptor,
    anchor_id: &str,
) -> Result<usize, StoreError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut doomed: Vec<String> = Vec::new();

    seen.insert(anchor_id.to_string());
    queue.push_back(anchor_id.to_string());

    while let Some(current) = queue.pop_front() {
        for rel in descriptor.owned_edges {
            for child in tx.neighbours(&current, rel, Direction::Outgoing)? {
                if seen.insert(child.id.clone()) {
                    queue.push_back(child.id);
                }
            }
        }
        doomed.push(current);
    }

    let mut removed = 0;
    // Leaves first.
    for id in doomed.iter().rev() {
        if tx.delete_node(id)? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Delete every anchor of `descriptor`'s kind on `manifestation_id` inside
/// the caller's transaction. Returns the number of anchors removed.
pub(crate) fn purge_kind(
    tx: &mut dyn GraphWrite,
    descriptor: &KindDescriptor,
    manifestation_id: &str,
) -> Result<usize, StoreError> {
    let anchors = matching_anchors(&*tx, descriptor, manifestation_id, None)?;
    for (anchor, _) in &anchors {
        cascade_delete(tx, descriptor, &anchor.id)?;
    }
    Ok(anchors.len())
}

// ---------------------------------------------------------------------------
// SpanAnnotationRepository
// ---------------------------------------------------------------------------

/// Repository for one annotation kind.
///
/// Each call runs on the blocking pool and uses exactly one read session or
/// one write transaction.
pub struct SpanAnnotationRepository<K: AnnotationKind> {
    provider: Arc<dyn GraphProvider>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: AnnotationKind> Clone for SpanAnnotationRepository<K> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            _kind: PhantomData,
        }
    }
}

pub type BibliographicRepository = SpanAnnotationRepository<Bibliographic>;
pub type NoteRepository = SpanAnnotationRepository<Notes>;
pub type SegmentationRepository = SpanAnnotationRepository<Segmentation>;
pub type PaginationRepository = SpanAnnotationRepository<Paginations>;

impl<K: AnnotationKind> SpanAnnotationRepository<K> {
    pub fn new(provider: Arc<dyn GraphProvider>) -> Self {
        Self {
            provider,
            _kind: PhantomData,
        }
    }

    pub fn descriptor(&self) -> KindDescriptor {
        K::DESCRIPTOR
    }

    /// Fetch one annotation by ID. Returns [`StoreError::NotFound`] if no
    /// anchor of this kind has that ID.
    pub async fn get(&self, id: &str) -> Result<K::Output, StoreError> {
        let provider = Arc::clone(&self.provider);
        let id = id.to_string();

        blocking(move || {
            let d = &K::DESCRIPTOR;
            let session = provider.read_session()?;
            let anchor = session
                .node_with_label(&id, d.anchor_label)?
                .ok_or_else(|| StoreError::NotFound(format!("{} annotation {id}", d.name)))?;
            let type_name = linked_type_name(&*session, &anchor.id)?;
            if let Some(fixed) = d.fixed_type {
                if type_name.as_deref() != Some(fixed) {
                    return Err(StoreError::NotFound(format!("{} annotation {id}", d.name)));
                }
            }
            tracing::debug!(kind = d.name, %id, "fetched annotation");
            K::load(&*session, &anchor, type_name.as_deref())
        })
        .await
    }

    /// Fetch every annotation of this kind on a manifestation, ordered by
    /// position in the base text. An unknown manifestation yields an empty
    /// list.
    pub async fn get_all(
        &self,
        manifestation_id: &str,
        type_filter: Option<&str>,
    ) -> Result<Vec<K::Output>, StoreError> {
        let provider = Arc::clone(&self.provider);
        let manifestation_id = manifestation_id.to_string();
        let type_filter = type_filter.map(str::to_string);

        blocking(move || {
            let d = &K::DESCRIPTOR;
            let session = provider.read_session()?;
            let anchors =
                matching_anchors(&*session, d, &manifestation_id, type_filter.as_deref())?;
            let mut outputs = anchors
                .iter()
                .map(|(anchor, type_name)| K::load(&*session, anchor, type_name.as_deref()))
                .collect::<Result<Vec<_>, _>>()?;
            outputs.sort_by(|a, b| {
                K::order_key(a)
                    .cmp(&K::order_key(b))
                    .then_with(|| K::output_id(a).cmp(K::output_id(b)))
            });
            tracing::debug!(
                kind = d.name,
                manifestation = %manifestation_id,
                count = outputs.len(),
                "listed annotations"
            );
            Ok(outputs)
        })
        .await
    }

    /// Create `items` on a manifestation in one transaction and return their
    /// new IDs, in input order.
    ///
    /// Fails with [`StoreError::NotFound`] if the manifestation or any
    /// item's type node is missing, and with [`StoreError::Invalid`] if any
    /// item is malformed. Either way nothing is created.
    pub async fn add(
        &self,
        manifestation_id: &str,
        items: Vec<K::Input>,
    ) -> Result<Vec<String>, StoreError> {
        validate_batch(&items)?;

        let provider = Arc::clone(&self.provider);
        let manifestation_id = manifestation_id.to_string();

        blocking(move || {
            let d = &K::DESCRIPTOR;
            let ids = provider.write_transaction(|tx| {
                tx.node_with_label(&manifestation_id, labels::MANIFESTATION)?
                    .ok_or_else(|| {
                        StoreError::NotFound(format!("manifestation {manifestation_id}"))
                    })?;

                let mut ids = Vec::with_capacity(items.len());
                for item in &items {
                    let type_node = resolve_type_node::<K>(tx, item)?;
                    let anchor_id = generate_id();
                    let mut anchor = Node::new(&anchor_id, d.anchor_label);
                    anchor.properties = K::anchor_properties(item);
                    tx.create_node(anchor)?;
                    tx.create_edge(Edge::new(&anchor_id, d.annotation_edge, &manifestation_id))?;
                    if let Some(type_id) = type_node {
                        tx.create_edge(Edge::new(&anchor_id, rels::HAS_TYPE, type_id))?;
                    }
                    K::create_owned(tx, &anchor_id, item)?;
                    ids.push(anchor_id);
                }
                Ok(ids)
            })?;
            tracing::info!(
                kind = d.name,
                manifestation = %manifestation_id,
                count = ids.len(),
                "added annotations"
            );
            Ok(ids)
        })
        .await
    }

    /// Delete one annotation and everything it owns. Deleting an absent ID
    /// is not an error; the return value says whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let provider = Arc::clone(&self.provider);
        let id = id.to_string();

        blocking(move || {
            let d = &K::DESCRIPTOR;
            let removed = provider.write_transaction(|tx| {
                if tx.node_with_label(&id, d.anchor_label)?.is_none() {
                    return Ok(0);
                }
                cascade_delete(tx, d, &id)
            })?;
            tracing::info!(kind = d.name, %id, nodes = removed, "deleted annotation");
            Ok(removed > 0)
        })
        .await
    }

    /// Delete every annotation of this kind on a manifestation, atomically.
    /// Returns how many annotations were removed.
    pub async fn delete_all(&self, manifestation_id: &str) -> Result<usize, StoreError> {
        let provider = Arc::clone(&self.provider);
        let manifestation_id = manifestation_id.to_string();

        blocking(move || {
            let d = &K::DESCRIPTOR;
            let removed =
                provider.write_transaction(|tx| purge_kind(tx, d, &manifestation_id))?;
            tracing::info!(
                kind = d.name,
                manifestation = %manifestation_id,
                count = removed,
                "deleted all annotations"
            );
            Ok(removed)
        })
        .await
    }
}

/// Find the enum node `item` must link to, if the kind is typed.
fn resolve_type_node<K: AnnotationKind>(
    tx: &mut dyn GraphWrite,
    item: &K::Input,
) -> Result<Option<String>, StoreError> {
    let d = &K::DESCRIPTOR;
    let Some(type_label) = d.type_label else {
        return Ok(None);
    };
    let name = d
        .fixed_type
        .or_else(|| K::type_name(item))
        .ok_or_else(|| StoreError::Internal(format!("{} input carries no type", d.name)))?;
    tx.find_nodes(type_label, NAME, &Value::from(name))?
        .into_iter()
        .next()
        .map(|n| Some(n.id))
        .ok_or_else(|| StoreError::NotFound(format!("{type_label} {name:?}")))
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// One repository per annotation kind, sharing a provider.
#[derive(Clone)]
pub struct Repositories {
    provider: Arc<dyn GraphProvider>,
    pub bibliographic: BibliographicRepository,
    pub notes: NoteRepository,
    pub segmentation: SegmentationRepository,
    pub pagination: PaginationRepository,
}

impl Repositories {
    pub fn new(provider: Arc<dyn GraphProvider>) -> Self {
        Self {
            bibliographic: SpanAnnotationRepository::new(Arc::clone(&provider)),
            notes: SpanAnnotationRepository::new(Arc::clone(&provider)),
            segmentation: SpanAnnotationRepository::new(Arc::clone(&provider)),
            pagination: SpanAnnotationRepository::new(Arc::clone(&provider)),
            provider,
        }
    }

    /// Delete every annotation of every kind on a manifestation in a single
    /// transaction, as done before the manifestation itself is removed.
    /// Returns the number of annotations removed.
    pub async fn purge_manifestation(&self, manifestation_id: &str) -> Result<usize, StoreError> {
        let provider = Arc::clone(&self.provider);
        let manifestation_id = manifestation_id.to_string();

        blocking(move || {
            let removed = provider.write_transaction(|tx| {
                let mut removed = 0;
                for d in [
                    &Bibliographic::DESCRIPTOR,
                    &Notes::DESCRIPTOR,
                    &Segmentation::DESCRIPTOR,
                    &Paginations::DESCRIPTOR,
                ] {
                    removed += purge_kind(tx, d, &manifestation_id)?;
                }
                Ok(removed)
            })?;
            tracing::info!(
                manifestation = %manifestation_id,
                count = removed,
                "purged annotations"
            );
            Ok(removed)
        })
        .await
    }
}
