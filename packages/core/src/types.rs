//! Core data types for span-anchored annotations.
//!
//! Every annotation owns one or more [`Span`]s into the base text of a
//! manifestation. Inputs are what callers hand to a repository's `add`;
//! outputs are what `get` and `get_all` reconstruct from the graph.
//!
//! Kind enums ([`BibliographyType`], [`NoteType`], [`SegmentationType`])
//! serialise as lowercase snake_case strings. The same string is the `name`
//! property of the matching enum node in the graph.

use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` character offset range into a manifestation's
/// base text.
///
/// Ordering is by `start`, then `end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: i64,
    pub end: i64,
}

impl Span {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of characters covered by the span.
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Kind enums
// ---------------------------------------------------------------------------

/// Generates `Display`, `FromStr`, and an `ALL` table for a wire-string enum.
macro_rules! wire_enum {
    ($ty:ident, $what:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// The wire-format string, also the `name` of the enum node.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($ty::$variant),)+
                    _ => Err(format!(
                        concat!("unknown ", $what, " {:?}; expected one of: {}"),
                        s,
                        [$($wire),+].join(", ")
                    )),
                }
            }
        }
    };
}

/// The category of a bibliographic metadata annotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BibliographyType {
    Title,
    AltTitle,
    Colophon,
    Incipit,
    AltIncipit,
    Author,
    Person,
}

wire_enum!(BibliographyType, "bibliography type", {
    Title => "title",
    AltTitle => "alt_title",
    Colophon => "colophon",
    Incipit => "incipit",
    AltIncipit => "alt_incipit",
    Author => "author",
    Person => "person",
});

/// The category of an editorial note.
///
/// Only `durchen` (variant-reading notes) is in use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Durchen,
}

wire_enum!(NoteType, "note type", {
    Durchen => "durchen",
});

/// Whether a segment splits a single text or aligns it against another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationType {
    Segmentation,
    Alignment,
}

wire_enum!(SegmentationType, "segmentation type", {
    Segmentation => "segmentation",
    Alignment => "alignment",
});

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BibliographicInput {
    #[serde(rename = "type")]
    pub bibliography_type: BibliographyType,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteInput {
    pub text: String,
    pub span: Span,
}

/// One segment; a segment may cover several non-contiguous lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentInput {
    #[serde(default = "default_segmentation_type")]
    pub segmentation_type: SegmentationType,
    pub lines: Vec<Span>,
}

fn default_segmentation_type() -> SegmentationType {
    SegmentationType::Segmentation
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageInput {
    pub reference: String,
    pub lines: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeInput {
    pub index: i64,
    pub pages: Vec<PageInput>,
}

/// A pagination holds exactly one volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationInput {
    pub volume: VolumeInput,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BibliographicMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub bibliography_type: BibliographyType,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: String,
    pub note_type: NoteType,
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: String,
    pub segmentation_type: SegmentationType,
    /// Sorted ascending.
    pub lines: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: String,
    pub reference: String,
    /// Sorted ascending.
    pub lines: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    pub id: String,
    pub index: i64,
    /// Ordered by the first line of each page. Page order is never stored;
    /// it is recovered from where each page's text sits in the base text.
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub id: String,
    pub volume: Volume,
}

// ---------------------------------------------------------------------------
// Positioned
// ---------------------------------------------------------------------------

/// Where an annotation sits in the base text: the smallest `start` among the
/// spans it owns. `None` when it owns no spans.
pub trait Positioned {
    fn position(&self) -> Option<i64>;
}

fn min_start(lines: &[Span]) -> Option<i64> {
    lines.iter().map(|s| s.start).min()
}

impl Positioned for BibliographicMetadata {
    fn position(&self) -> Option<i64> {
        Some(self.span.start)
    }
}

impl Positioned for Note {
    fn position(&self) -> Option<i64> {
        Some(self.span.start)
    }
}

impl Positioned for Segment {
    fn position(&self) -> Option<i64> {
        min_start(&self.lines)
    }
}

impl Positioned for Page {
    fn position(&self) -> Option<i64> {
        min_start(&self.lines)
    }
}

impl Positioned for Pagination {
    fn position(&self) -> Option<i64> {
        self.volume.pages.iter().filter_map(Page::position).min()
    }
}
