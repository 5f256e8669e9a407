//! Source location tracking
//!
//! Spans are byte ranges into one piece of text (a snippet or a compilable
//! unit). Line/column positions are computed on demand for display.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source position (line, column, and byte offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of text
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Byte range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span
    #[inline]
    pub fn new(
        start: usize,
        end: usize,
    ) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both
    #[inline]
    pub fn to(
        self,
        other: Span,
    ) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Move the span by `delta` bytes
    #[inline]
    pub fn shifted(
        self,
        delta: usize,
    ) -> Span {
        Span::new(self.start + delta, self.end + delta)
    }

    /// Get the source text length
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Get the line/column position of a byte offset in `text`
pub fn position_of(
    text: &str,
    offset: usize,
) -> Position {
    let offset = offset.min(text.len());
    let before = &text[..floor_char_boundary(text, offset)];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Position {
        line,
        column: before[line_start..].chars().count() + 1,
        offset,
    }
}

fn floor_char_boundary(
    text: &str,
    mut offset: usize,
) -> usize {
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of_multiline() {
        let text = "int x;\nint y = x;";
        let pos = position_of(text, 11);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 5);
    }

    #[test]
    fn test_span_cover_and_shift() {
        let a = Span::new(4, 6);
        let b = Span::new(1, 3);
        assert_eq!(a.to(b), Span::new(1, 6));
        assert_eq!(a.shifted(10), Span::new(14, 16));
        assert_eq!(Span::new(2, 2).len(), 0);
        assert!(Span::new(2, 2).is_empty());
    }
}
