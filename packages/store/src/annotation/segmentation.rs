use spangraph::{Segment, SegmentInput, SegmentationType};

use super::{create_span, load_spans, parse_type, AnnotationKind, KindDescriptor};
use crate::error::StoreError;
use crate::graph::{GraphRead, GraphWrite, Node};
use crate::schema::{labels, rels};

/// Segments of a text, either plain segmentation or alignment units. A
/// segment may own several lines.
pub struct Segmentation;

impl AnnotationKind for Segmentation {
    type Input = SegmentInput;
    type Output = Segment;

    const DESCRIPTOR: KindDescriptor = KindDescriptor {
        name: "segment",
        anchor_label: labels::SEGMENT,
        annotation_edge: rels::SEGMENT_OF,
        type_label: Some(labels::SEGMENTATION_TYPE),
        fixed_type: None,
        owned_edges: &[rels::HAS_SPAN],
    };

    fn type_name(input: &SegmentInput) -> Option<&'static str> {
        Some(input.segmentation_type.as_str())
    }

    fn create_owned(
        tx: &mut dyn GraphWrite,
        anchor_id: &str,
        input: &SegmentInput,
    ) -> Result<(), StoreError> {
        for line in &input.lines {
            create_span(tx, anchor_id, line)?;
        }
        Ok(())
    }

    fn load(
        session: &dyn GraphRead,
        anchor: &Node,
        type_name: Option<&str>,
    ) -> Result<Segment, StoreError> {
        Ok(Segment {
            id: anchor.id.clone(),
            segmentation_type: parse_type::<SegmentationType>(anchor, type_name)?,
            lines: load_spans(session, &anchor.id)?,
        })
    }

    fn output_id(output: &Segment) -> &str {
        &output.id
    }
}
