//! Node locator: guesses which node type the user is editing from the text
//! before the cursor in the transform buffer.
//!
//! The guess is textual. Everything after the first `visitor: {` up to the
//! cursor is scanned for capitalized words, and the last one wins. A handler
//! named `VariableDeclaration(path) { ... }` therefore stays active while
//! the cursor is anywhere in its body, until another capitalized word is
//! passed.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Marker that opens the visitor table.
pub const VISITOR_MARKER: &str = "visitor: {";

/// A cursor in an editor buffer. Both fields are 1-indexed; `column` is the
/// character offset in the line plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::str::FromStr for CursorPosition {
    type Err = String;

    /// Parse `LINE:COLUMN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (line, column) = s
            .split_once(':')
            .ok_or_else(|| format!("expected LINE:COLUMN, got '{s}'"))?;
        let line = line
            .trim()
            .parse()
            .map_err(|_| format!("invalid line '{line}'"))?;
        let column = column
            .trim()
            .parse()
            .map_err(|_| format!("invalid column '{column}'"))?;
        Ok(Self::new(line, column))
    }
}

fn node_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([A-Z][a-z0-9]+)+").ok())
        .as_ref()
}

/// The text from the start of `source` up to `cursor`.
///
/// Lines past the end yield the whole text; a column past the end of its
/// line yields the whole line.
pub fn text_until(source: &str, cursor: CursorPosition) -> &str {
    let wanted_line = cursor.line.max(1) as usize;
    let mut line_start = 0;
    for (number, line) in source.split_inclusive('\n').enumerate() {
        if number + 1 == wanted_line {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let chars = cursor.column.max(1) as usize - 1;
            let end = content
                .char_indices()
                .nth(chars)
                .map_or(content.len(), |(i, _)| i);
            return &source[..line_start + end];
        }
        line_start += line.len();
    }
    source
}

/// The node type the cursor is in, if any.
pub fn locate(transform_source: &str, cursor: CursorPosition) -> Option<String> {
    let before = text_until(transform_source, cursor);
    let handlers = before.split(VISITOR_MARKER).nth(1)?;
    let found = node_name_pattern()?
        .find_iter(handlers)
        .last()
        .map(|m| m.as_str().to_string());
    tracing::trace!(?cursor, found = ?found, "locate");
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUGIN: &str = "export default () => {
  return {
    visitor: {
      VariableDeclaration(path) {
        path.node.kind = 'let';
      },
      Identifier(path) {

      }
    }
  }
}";

    #[test]
    fn test_inside_identifier_handler() {
        assert_eq!(
            locate(PLUGIN, CursorPosition::new(8, 1)),
            Some("Identifier".to_string())
        );
    }

    #[test]
    fn test_inside_first_handler() {
        assert_eq!(
            locate(PLUGIN, CursorPosition::new(5, 9)),
            Some("VariableDeclaration".to_string())
        );
        // Right after the handler name.
        assert_eq!(
            locate(PLUGIN, CursorPosition::new(4, 26)),
            Some("VariableDeclaration".to_string())
        );
        // Half-typed names match their prefix.
        assert_eq!(
            locate(PLUGIN, CursorPosition::new(4, 15)),
            Some("Variable".to_string())
        );
    }

    #[test]
    fn test_before_marker() {
        for line in 1..=3 {
            for column in 1..=20 {
                assert_eq!(locate(PLUGIN, CursorPosition::new(line, column)), None);
            }
        }
        // Right at the end of the marker nothing matched yet.
        assert_eq!(locate(PLUGIN, CursorPosition::new(3, 15)), None);
    }

    #[test]
    fn test_no_marker_anywhere() {
        let source = "const Visitor = { VariableDeclaration() {} };";
        for column in 1..=50 {
            assert_eq!(locate(source, CursorPosition::new(1, column)), None);
        }
        assert_eq!(locate("", CursorPosition::new(1, 1)), None);
    }

    #[test]
    fn test_out_of_range_cursor() {
        assert_eq!(
            locate(PLUGIN, CursorPosition::new(99, 99)),
            Some("Identifier".to_string())
        );
        assert_eq!(locate(PLUGIN, CursorPosition::new(0, 0)), None);
    }

    #[test]
    fn test_text_until() {
        let text = "ab\ncdé\nf";
        assert_eq!(text_until(text, CursorPosition::new(1, 1)), "");
        assert_eq!(text_until(text, CursorPosition::new(1, 3)), "ab");
        assert_eq!(text_until(text, CursorPosition::new(1, 30)), "ab");
        assert_eq!(text_until(text, CursorPosition::new(2, 4)), "ab\ncdé");
        assert_eq!(text_until(text, CursorPosition::new(3, 2)), text);
        assert_eq!(text_until(text, CursorPosition::new(7, 1)), text);
    }

    #[test]
    fn test_parse_cursor() {
        assert_eq!("3:14".parse::<CursorPosition>(), Ok(CursorPosition::new(3, 14)));
        assert!("3".parse::<CursorPosition>().is_err());
        assert!("a:1".parse::<CursorPosition>().is_err());
    }
}
