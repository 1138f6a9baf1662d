use spangraph::{Note, NoteInput, NoteType};

use super::{create_span, load_single_span, parse_type, AnnotationKind, KindDescriptor};
use crate::error::StoreError;
use crate::graph::{GraphRead, GraphWrite, Node, Properties};
use crate::schema::{labels, rels};

/// Editorial notes. Every note is filed under the `durchen` category, and
/// reads ignore notes of any other category.
pub struct Notes;

impl AnnotationKind for Notes {
    type Input = NoteInput;
    type Output = Note;

    const DESCRIPTOR: KindDescriptor = KindDescriptor {
        name: "note",
        anchor_label: labels::NOTE,
        annotation_edge: rels::NOTE_OF,
        type_label: Some(labels::NOTE_TYPE),
        fixed_type: Some("durchen"),
        owned_edges: &[rels::HAS_SPAN],
    };

    fn anchor_properties(input: &NoteInput) -> Properties {
        let mut props = Properties::new();
        props.insert("text".into(), input.text.clone().into());
        props
    }

    fn create_owned(
        tx: &mut dyn GraphWrite,
        anchor_id: &str,
        input: &NoteInput,
    ) -> Result<(), StoreError> {
        create_span(tx, anchor_id, &input.span).map(|_| ())
    }

    fn load(
        session: &dyn GraphRead,
        anchor: &Node,
        type_name: Option<&str>,
    ) -> Result<Note, StoreError> {
        Ok(Note {
            id: anchor.id.clone(),
            note_type: parse_type::<NoteType>(anchor, type_name)?,
            text: anchor.str_prop("text")?.to_string(),
            span: load_single_span(session, anchor)?,
        })
    }

    fn output_id(output: &Note) -> &str {
        &output.id
    }
}
