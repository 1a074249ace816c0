//! Location invariants over a realistic corpus.

use astplay_parser::node::walk;
use astplay_parser::{parse, NodeRef, NodeType, ParserOptions, Position, SourceRange};

const CORPUS: &[&str] = &[
    "var a = 10;",
    "function sum(a, b) { return a + b; }",
    "const { x, y: [z, ...rest] = [] } = obj;",
    "class A extends B { static #x; }",
    "class A extends B { constructor() { super(); } get v() { return 1; } static s = 2; }",
    "for (let i = 0; i < n; i++) { if (i % 2) continue; else break; }",
    "for await (const chunk of stream) process(chunk);",
    "label: while (true) { do { x--; } while (x > 0); break label; }",
    "try { risky(); } catch ({ message }) { log(message); } finally { done(); }",
    "switch (k) { case 1: a(); break; default: b(); }",
    "import def, { named as alias } from \"mod\"; export { alias }; export default def;",
    "export * as ns from \"ns\"; export const q = 1;",
    "const f = async (a = 1, { b }) => await a?.[b] ?? b;",
    "tag`hello ${world} and ${more}`;",
    "const re = /ab+c/gi, big = 10n, t = new.target;",
    "x = a ? b : c, y = (1, 2);",
    "obj = { a, b: 2, [c]: 3, get d() { return 4; }, ...e, m() {} };",
    "const s = \"héllo wörld\"; const emoji = '😀';",
];

fn check_containment(node: NodeRef<'_>) {
    let parent = node.span();
    for (step, child) in node.children() {
        let span = child.span();
        assert!(
            parent.start <= span.start && span.end <= parent.end,
            "{:?} {:?} at `{}` escapes {:?} {:?}",
            child.node_type(),
            span,
            step.field,
            node.node_type(),
            parent,
        );
        check_containment(child);
    }
}

#[test]
fn child_spans_nest_inside_parents() {
    for source in CORPUS {
        // Private members are rejected; everything else must parse.
        let Ok(ast) = parse(source, ParserOptions::default()) else {
            assert!(source.contains('#'), "failed to parse {source:?}");
            continue;
        };
        assert_eq!(ast.program.span.end as usize, source.len());
        check_containment(NodeRef::program(&ast.program));
    }
}

#[test]
fn every_node_has_a_range() {
    for source in CORPUS {
        let Ok(ast) = parse(source, ParserOptions::default()) else {
            continue;
        };
        walk(NodeRef::program(&ast.program), &mut |node| {
            let range = ast.range(node.span());
            assert!(range.is_some(), "{:?} in {source:?} has no range", node.node_type());
        });
    }
}

#[test]
fn identifier_ranges_are_inclusive() {
    let source = "function sum(a, b) { return a + b; }";
    let ast = parse(source, ParserOptions::default()).unwrap();
    let mut ranges = Vec::new();
    walk(NodeRef::program(&ast.program), &mut |node| {
        if node.node_type() == NodeType::Identifier {
            ranges.push(ast.range(node.span()).unwrap());
        }
    });
    assert_eq!(ranges.len(), 5);
    // `sum` occupies columns 10 through 12.
    assert_eq!(ranges[0].start(), Position::new(1, 10));
    assert_eq!(ranges[0].end(), Position::new(1, 12));
    // Single-character identifiers start and end on the same column.
    assert_eq!(ranges[1].start(), ranges[1].end());
}

#[test]
fn columns_count_characters_not_bytes() {
    let source = "const s = \"é\"; x;";
    let ast = parse(source, ParserOptions::default()).unwrap();
    let last = NodeRef::stmt(&ast.program.body[1]);
    let range: SourceRange = ast.range(last.span()).unwrap();
    assert_eq!(range.start(), Position::new(1, 16));
    assert_eq!(range.end(), Position::new(1, 17));
}

#[test]
fn multiline_ranges() {
    let source = "let a = 1;\nfunction f() {\n  return a;\n}";
    let ast = parse(source, ParserOptions::default()).unwrap();
    let function = NodeRef::stmt(&ast.program.body[1]);
    let range = ast.range(function.span()).unwrap();
    assert_eq!(range.to_string(), "2:1-4:1");
}
