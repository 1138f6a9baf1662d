use thiserror::Error;

use crate::types::{BibliographicInput, NoteInput, PaginationInput, SegmentInput, Span};

/// Errors returned when an annotation input is malformed.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("span start must not be negative, got {0}")]
    NegativeStart(i64),

    #[error("span start must be less than end, got [{start}, {end})")]
    InvertedSpan { start: i64, end: i64 },

    #[error("{0} must contain at least one line")]
    NoLines(&'static str),

    #[error("line at index {index} is invalid: {source}")]
    InvalidLine {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("note text must not be empty")]
    EmptyNoteText,

    #[error("pagination volume must contain at least one page")]
    NoPages,

    #[error("page at index {0} must have a non-empty reference")]
    EmptyPageReference(usize),

    #[error("page at index {index} is invalid: {source}")]
    InvalidPage {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    #[error("item at index {index} is invalid: {source}")]
    InvalidItem {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Check that `span` is a non-negative, non-empty half-open range.
pub fn validate_span(span: &Span) -> Result<(), ValidationError> {
    if span.start < 0 {
        return Err(ValidationError::NegativeStart(span.start));
    }
    if span.start >= span.end {
        return Err(ValidationError::InvertedSpan {
            start: span.start,
            end: span.end,
        });
    }
    Ok(())
}

/// Check a list of lines owned by one anchor. `owner` names the anchor in
/// the error message.
pub fn validate_lines(owner: &'static str, lines: &[Span]) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::NoLines(owner));
    }
    for (index, line) in lines.iter().enumerate() {
        validate_span(line).map_err(|e| ValidationError::InvalidLine {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

/// Implemented by every annotation input type.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for BibliographicInput {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_span(&self.span)
    }
}

impl Validate for NoteInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyNoteText);
        }
        validate_span(&self.span)
    }
}

impl Validate for SegmentInput {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_lines("segment", &self.lines)
    }
}

impl Validate for PaginationInput {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.volume.pages.is_empty() {
            return Err(ValidationError::NoPages);
        }
        for (index, page) in self.volume.pages.iter().enumerate() {
            if page.reference.trim().is_empty() {
                return Err(ValidationError::EmptyPageReference(index));
            }
            validate_lines("page", &page.lines).map_err(|e| ValidationError::InvalidPage {
                index,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// Validate a batch, reporting the index of the first bad item.
pub fn validate_batch<T: Validate>(items: &[T]) -> Result<(), ValidationError> {
    for (index, item) in items.iter().enumerate() {
        item.validate().map_err(|e| ValidationError::InvalidItem {
            index,
            source: Box::new(e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BibliographyType, PageInput, SegmentationType, VolumeInput};

    #[test]
    fn span_must_be_forward() {
        assert!(validate_span(&Span::new(0, 1)).is_ok());
        assert_eq!(
            validate_span(&Span::new(4, 4)),
            Err(ValidationError::InvertedSpan { start: 4, end: 4 })
        );
        assert_eq!(
            validate_span(&Span::new(-1, 3)),
            Err(ValidationError::NegativeStart(-1))
        );
    }

    #[test]
    fn segment_needs_lines() {
        let seg = SegmentInput {
            segmentation_type: SegmentationType::Alignment,
            lines: vec![],
        };
        assert_eq!(seg.validate(), Err(ValidationError::NoLines("segment")));
    }

    #[test]
    fn pagination_reports_bad_page_index() {
        let p = PaginationInput {
            volume: VolumeInput {
                index: 1,
                pages: vec![
                    PageInput { reference: "1a".into(), lines: vec![Span::new(0, 10)] },
                    PageInput { reference: "1b".into(), lines: vec![Span::new(20, 10)] },
                ],
            },
        };
        match p.validate() {
            Err(ValidationError::InvalidPage { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidPage, got {other:?}"),
        }
    }

    #[test]
    fn pagination_rejects_blank_reference() {
        let p = PaginationInput {
            volume: VolumeInput {
                index: 1,
                pages: vec![PageInput { reference: " ".into(), lines: vec![Span::new(0, 1)] }],
            },
        };
        assert_eq!(p.validate(), Err(ValidationError::EmptyPageReference(0)));
    }

    #[test]
    fn batch_reports_item_index() {
        let items = vec![
            BibliographicInput {
                bibliography_type: BibliographyType::Title,
                span: Span::new(0, 5),
            },
            BibliographicInput {
                bibliography_type: BibliographyType::Colophon,
                span: Span::new(9, 2),
            },
        ];
        match validate_batch(&items) {
            Err(ValidationError::InvalidItem { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidItem, got {other:?}"),
        }
    }

    #[test]
    fn note_text_required() {
        let n = NoteInput { text: "  ".into(), span: Span::new(0, 2) };
        assert_eq!(n.validate(), Err(ValidationError::EmptyNoteText));
    }
}
