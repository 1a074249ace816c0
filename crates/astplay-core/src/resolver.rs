//! Location resolver: finds where nodes of a given type sit in the input
//! source, so the editor can highlight them.

use astplay_parser::node::walk;
use astplay_parser::{Alias, Ast, NodeRef, NodeType, SourceRange};
use serde::Serialize;

/// A visitor key: a concrete node type or one of Babel's aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitorKey {
    Type(NodeType),
    Alias(Alias),
}

impl VisitorKey {
    pub fn parse(name: &str) -> Option<Self> {
        NodeType::from_name(name)
            .map(VisitorKey::Type)
            .or_else(|| Alias::from_name(name).map(VisitorKey::Alias))
    }

    pub fn matches(self, ty: NodeType) -> bool {
        match self {
            VisitorKey::Type(key) => key == ty,
            VisitorKey::Alias(alias) => alias.covers(ty),
        }
    }

    /// Every node type this key selects.
    pub fn node_types(self) -> impl Iterator<Item = NodeType> {
        NodeType::ALL.iter().copied().filter(move |ty| self.matches(*ty))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisitorKey::Type(ty) => ty.as_str(),
            VisitorKey::Alias(alias) => alias.as_str(),
        }
    }
}

impl std::fmt::Display for VisitorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranges of all nodes of the requested type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// In source order.
    pub ranges: Vec<SourceRange>,
    /// Matching nodes whose span could not be mapped onto the source.
    pub skipped: usize,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Collect the ranges of every node matching `node_type`.
///
/// Unknown or absent names resolve to nothing. Nodes whose spans do not fit
/// the source are counted in `skipped` and left out.
pub fn resolve(ast: &Ast, node_type: Option<&str>) -> Resolution {
    let Some(key) = node_type.and_then(VisitorKey::parse) else {
        return Resolution::default();
    };
    resolve_key(ast, key)
}

pub fn resolve_key(ast: &Ast, key: VisitorKey) -> Resolution {
    let mut resolution = Resolution::default();
    walk(NodeRef::program(&ast.program), &mut |node| {
        if !key.matches(node.node_type()) {
            return;
        }
        match ast.range(node.span()) {
            Some(range) => resolution.ranges.push(range),
            None => resolution.skipped += 1,
        }
    });
    // Parents are visited before children, which already start no earlier;
    // the sort only guards nodes printed out of source order.
    resolution
        .ranges
        .sort_by_key(|range| (range.start_line, range.start_column));
    if resolution.skipped > 0 {
        tracing::warn!(key = %key, skipped = resolution.skipped, "some node locations could not be resolved");
    }
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use astplay_parser::{parse, ParserOptions, Span};

    fn ranges(source: &str, ty: &str) -> Vec<String> {
        let ast = parse(source, ParserOptions::default()).unwrap();
        resolve(&ast, Some(ty))
            .ranges
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_identifiers_in_sum() {
        assert_eq!(
            ranges("function sum(a, b) { return a + b; }", "Identifier"),
            ["1:10-1:12", "1:14-1:14", "1:17-1:17", "1:29-1:29", "1:33-1:33"]
        );
    }

    #[test]
    fn test_alias() {
        let found = ranges("var a = 1; a++; if (a) {}", "Statement");
        assert_eq!(found.len(), 4);
        let found = ranges("1; 'x'; null; `t`; /r/;", "Literal");
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_unknown_or_absent() {
        let ast = parse("var a = 1;", ParserOptions::default()).unwrap();
        assert!(resolve(&ast, None).is_empty());
        assert!(resolve(&ast, Some("")).is_empty());
        assert!(resolve(&ast, Some("Variable")).is_empty());
        assert_eq!(resolve(&ast, Some("Variable")).skipped, 0);
    }

    #[test]
    fn test_sorted() {
        let source = "const f = (x) => x * 2;\nlet { a, b: [c] } = o;\nf(a)(c);";
        let ast = parse(source, ParserOptions::default()).unwrap();
        for ty in ["Identifier", "Expression", "Pattern", "CallExpression"] {
            let resolution = resolve(&ast, Some(ty));
            let starts: Vec<_> = resolution
                .ranges
                .iter()
                .map(|r| (r.start_line, r.start_column))
                .collect();
            let mut sorted = starts.clone();
            sorted.sort_unstable();
            assert_eq!(starts, sorted, "{ty}");
        }
    }

    #[test]
    fn test_stale_spans_are_skipped() {
        let mut ast = parse("a; b;", ParserOptions::default()).unwrap();
        // Point the second statement past the end of the source.
        ast.program.body[1].span = Span::new(40, 42);
        let resolution = resolve(&ast, Some("ExpressionStatement"));
        assert_eq!(resolution.ranges.len(), 1);
        assert_eq!(resolution.skipped, 1);
    }

    #[test]
    fn test_visitor_key() {
        assert_eq!(
            VisitorKey::parse("Identifier"),
            Some(VisitorKey::Type(NodeType::Identifier))
        );
        assert_eq!(VisitorKey::parse("Function"), Some(VisitorKey::Alias(Alias::Function)));
        assert!(VisitorKey::parse("Nope").is_none());
        let functions: Vec<_> = VisitorKey::Alias(Alias::Function).node_types().collect();
        assert!(functions.contains(&NodeType::ArrowFunctionExpression));
        assert!(functions.contains(&NodeType::ObjectMethod));
        assert!(!functions.contains(&NodeType::Identifier));
    }
}
