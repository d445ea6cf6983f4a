//! Span-based source editing

use mago_database::file::FileId;
use mago_span::{Position, Span};
use thiserror::Error;

/// Errors that can occur during edit application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Overlapping edits detected at offset {0}")]
    OverlappingEdits(usize),

    #[error("Edit span {start}..{end} out of bounds for source length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("A changeset is already open")]
    ChangesetAlreadyOpen,

    #[error("No changeset is open")]
    NoOpenChangeset,
}

/// A single replacement of a byte range; an empty range is an insertion
#[derive(Debug, Clone)]
pub struct Edit {
    /// The source span to replace
    pub span: Span,
    /// The replacement text
    pub replacement: String,
    /// Human-readable description of the edit
    pub message: String,
}

impl Edit {
    pub fn new(span: Span, replacement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
            message: message.into(),
        }
    }

    /// Edit covering the byte range `start..end` of an anonymous source
    pub fn from_offsets(
        start: usize,
        end: usize,
        replacement: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let span = Span::new(
            FileId::zero(),
            Position::new(start as u32),
            Position::new(end as u32),
        );
        Self::new(span, replacement, message)
    }

    /// Insertion of `text` at byte `offset`
    pub fn insert(offset: usize, text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_offsets(offset, offset, text, message)
    }

    pub fn start_offset(&self) -> usize {
        self.span.start.offset as usize
    }

    pub fn end_offset(&self) -> usize {
        self.span.end.offset as usize
    }

    pub fn is_insertion(&self) -> bool {
        self.start_offset() == self.end_offset()
    }
}

/// Apply edits to `source` in a single forward pass
///
/// Edits are ordered by start offset; edits sharing a start offset keep the
/// order in which they were given, so several insertions at one offset land
/// in that order and an insertion listed before a replacement at the same
/// offset lands in front of it. Replacements may not overlap each other and
/// an insertion may not fall strictly inside a replaced range.
pub fn apply_edits(source: &str, edits: &[Edit]) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.start_offset());

    let len = source.len();
    let mut result = String::with_capacity(len);
    let mut cursor = 0;

    for edit in sorted {
        let (start, end) = (edit.start_offset(), edit.end_offset());

        if start > end
            || end > len
            || !source.is_char_boundary(start)
            || !source.is_char_boundary(end)
        {
            return Err(EditError::SpanOutOfBounds { start, end, len });
        }
        if start < cursor {
            return Err(EditError::OverlappingEdits(start));
        }

        result.push_str(&source[cursor..start]);
        result.push_str(&edit.replacement);
        cursor = end;
    }

    result.push_str(&source[cursor..]);
    Ok(result)
}
