//! Source location tracking.
//!
//! Every AST node has a byte `Span`. Editors speak in lines and columns, so
//! `LineIndex` converts spans into 1-indexed `SourceRange`s.

/// A span in the source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Byte offset of the start.
    pub start: u32,
    /// Byte offset of the end (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Create an empty span at a position.
    #[inline]
    pub const fn empty(pos: u32) -> Self {
        Self { start: pos, end: pos }
    }

    /// Length of the span in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    #[inline]
    pub const fn merge(self, other: Span) -> Span {
        Span {
            start: if self.start < other.start { self.start } else { other.start },
            end: if self.end > other.end { self.end } else { other.end },
        }
    }

    /// Check if `other` lies entirely inside this span.
    #[inline]
    pub const fn encloses(&self, other: Span) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// A 1-indexed line/column position. Columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line/column range of a node, as an editor would decorate it.
///
/// Lines and columns are 1-indexed and both ends are inclusive: `end_column`
/// is the column of the node's last character. An empty node has
/// `end == start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceRange {
    pub const fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    pub const fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }

    /// Whether `other` lies within this range.
    pub fn contains_range(&self, other: &SourceRange) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start(), self.end())
    }
}

/// Convert byte offsets to line/column and back.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of the start of each line.
    line_starts: Vec<u32>,
    source: String,
}

impl LineIndex {
    /// Build a line index from source code.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            line_starts,
            source: source.to_string(),
        }
    }

    /// Convert a byte offset to a 1-indexed position.
    ///
    /// Returns `None` when the offset is past the end of the source or does
    /// not fall on a character boundary.
    pub fn position(&self, offset: u32) -> Option<Position> {
        let offset_usize = offset as usize;
        if offset_usize > self.source.len() || !self.source.is_char_boundary(offset_usize) {
            return None;
        }
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i.saturating_sub(1));
        let line_start = self.line_starts[line] as usize;
        let column = self.source[line_start..offset_usize].chars().count() as u32;
        Some(Position::new(line as u32 + 1, column + 1))
    }

    /// Convert a span into an inclusive 1-indexed range.
    pub fn range(&self, span: Span) -> Option<SourceRange> {
        if span.end < span.start {
            return None;
        }
        let start = self.position(span.start)?;
        let end = if span.is_empty() {
            start
        } else {
            // Position of the last character in the span.
            let last = self.source.get(..span.end as usize)?.char_indices().next_back()?.0;
            self.position(last as u32)?
        };
        Some(SourceRange {
            start_line: start.line,
            start_column: start.column,
            end_line: end.line,
            end_column: end.column,
        })
    }

    /// Convert a 1-indexed position to a byte offset.
    ///
    /// Columns past the end of the line clamp to the line end.
    pub fn offset(&self, position: Position) -> u32 {
        let line = position.line.max(1) as usize - 1;
        let Some(&line_start) = self.line_starts.get(line) else {
            return self.source.len() as u32;
        };
        let line_end = self
            .line_starts
            .get(line + 1)
            .map_or(self.source.len(), |next| *next as usize - 1);
        let text = &self.source[line_start as usize..line_end];
        let wanted = position.column.max(1) as usize - 1;
        let within = text
            .char_indices()
            .nth(wanted)
            .map_or(text.len(), |(i, _)| i);
        line_start + within as u32
    }

    /// Get the total number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(5, 10);
        let b = Span::new(8, 15);
        assert_eq!(a.merge(b), Span::new(5, 15));
        assert!(Span::new(5, 15).encloses(a));
        assert!(!a.encloses(b));
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("line1\nline2\nline3");

        assert_eq!(index.position(0), Some(Position::new(1, 1)));
        assert_eq!(index.position(5), Some(Position::new(1, 6)));
        assert_eq!(index.position(6), Some(Position::new(2, 1)));
        assert_eq!(index.position(12), Some(Position::new(3, 1)));
        assert_eq!(index.position(99), None);
    }

    #[test]
    fn test_range_is_inclusive() {
        let index = LineIndex::new("var a = 10;");
        // `a`
        let range = index.range(Span::new(4, 5)).unwrap();
        assert_eq!((range.start_line, range.start_column), (1, 5));
        assert_eq!((range.end_line, range.end_column), (1, 5));
        // whole statement
        let range = index.range(Span::new(0, 11)).unwrap();
        assert_eq!(range.end_column, 11);
    }

    #[test]
    fn test_range_counts_characters() {
        let index = LineIndex::new("let é = 'ü';\nx");
        let range = index.range(Span::new(9, 13)).unwrap();
        assert_eq!(range.start_column, 9);
        assert_eq!(range.end_column, 11);
        assert!(index.range(Span::new(5, 6)).is_none());
    }

    #[test]
    fn test_offset_roundtrip() {
        let index = LineIndex::new("ab\ncdé\n");
        assert_eq!(index.offset(Position::new(2, 3)), 5);
        assert_eq!(index.offset(Position::new(2, 40)), 7);
        assert_eq!(index.offset(Position::new(9, 1)), 8);
    }
}
