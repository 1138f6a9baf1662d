use spangraph::{generate_id, Page, Pagination, PaginationInput, Positioned, Volume};

use super::{create_span, load_spans, AnnotationKind, KindDescriptor};
use crate::error::StoreError;
use crate::graph::{Direction, Edge, GraphRead, GraphWrite, Node};
use crate::schema::{labels, rels};

/// Physical layout: one volume per pagination, pages under the volume, and
/// line spans under each page.
///
/// ```text
/// (Pagination) -[HAS_VOLUME]-> (Volume {index})
///                                  -[HAS_PAGE]-> (Page {reference})
///                                                   -[HAS_SPAN]-> (Span)...
/// ```
pub struct Paginations;

impl AnnotationKind for Paginations {
    type Input = PaginationInput;
    type Output = Pagination;

    const DESCRIPTOR: KindDescriptor = KindDescriptor {
        name: "pagination",
        anchor_label: labels::PAGINATION,
        annotation_edge: rels::PAGINATION_OF,
        type_label: None,
        fixed_type: None,
        owned_edges: &[rels::HAS_VOLUME, rels::HAS_PAGE, rels::HAS_SPAN],
    };

    fn create_owned(
        tx: &mut dyn GraphWrite,
        anchor_id: &str,
        input: &PaginationInput,
    ) -> Result<(), StoreError> {
        let volume_id = generate_id();
        tx.create_node(Node::new(&volume_id, labels::VOLUME).with("index", input.volume.index))?;
        tx.create_edge(Edge::new(anchor_id, rels::HAS_VOLUME, &volume_id))?;

        for page in &input.volume.pages {
            let page_id = generate_id();
            tx.create_node(
                Node::new(&page_id, labels::PAGE).with("reference", page.reference.as_str()),
            )?;
            tx.create_edge(Edge::new(&volume_id, rels::HAS_PAGE, &page_id))?;
            for line in &page.lines {
                create_span(tx, &page_id, line)?;
            }
        }
        Ok(())
    }

    fn load(
        session: &dyn GraphRead,
        anchor: &Node,
        _type_name: Option<&str>,
    ) -> Result<Pagination, StoreError> {
        let volume_node = session
            .neighbours(&anchor.id, rels::HAS_VOLUME, Direction::Outgoing)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::malformed(format!("pagination {} has no volume", anchor.id))
            })?;

        let mut pages = session
            .neighbours(&volume_node.id, rels::HAS_PAGE, Direction::Outgoing)?
            .into_iter()
            .map(|page| {
                Ok(Page {
                    reference: page.str_prop("reference")?.to_string(),
                    lines: load_spans(session, &page.id)?,
                    id: page.id,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        // Pages follow the text, not insertion order.
        pages.sort_by(|a, b| {
            let key = |p: &Page| p.position().unwrap_or(i64::MAX);
            key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
        });

        Ok(Pagination {
            id: anchor.id.clone(),
            volume: Volume {
                index: volume_node.int_prop("index")?,
                id: volume_node.id,
                pages,
            },
        })
    }

    /// Volumes first, then position within the volume.
    fn order_key(output: &Pagination) -> (i64, i64) {
        (output.volume.index, output.position().unwrap_or(i64::MAX))
    }

    fn output_id(output: &Pagination) -> &str {
        &output.id
    }
}
