//! Printing parsed programs back to source.

use astplay_parser::{generate, parse, parse_expression, NodeMut, ParserOptions, SlotMut, Step};

fn print(source: &str) -> String {
    let ast = parse(source, ParserOptions::default())
        .unwrap_or_else(|err| panic!("{source:?}: {err}"));
    generate(&ast.program)
}

#[test]
fn printing_reaches_a_fixed_point() {
    let sources = [
        "var a=10",
        "const {x, y: [z, ...rest] = []} = obj",
        "for (let i = 0; i < n; i++) { if (i % 2) continue; else break }",
        "try { risky() } catch (e) { log(e) } finally { done() }",
        "switch (k) { case 1: a(); break; default: b() }",
        "import def, {named as alias} from 'mod'; export {alias}; export default def",
        "const f = async (a = 1, {b}) => await a?.[b] ?? b",
        "class A extends B { constructor() { super() } get v() { return 1 } static s = 2 }",
        "obj = {a, b: 2, [c]: 3, get d() { return 4 }, ...e, *m() {}}",
        "x = a ? b : c, y = (1, 2)",
        "if (a) if (b) c(); else d();",
        "label: do x--; while (x > 0)",
    ];
    for source in sources {
        let once = print(source);
        let twice = print(&once);
        assert_eq!(once, twice, "printing {source:?} is not stable");
    }
}

#[test]
fn formatting_is_normalized() {
    assert_eq!(print("var a=10"), "var a = 10;");
    assert_eq!(print("let s = 'single'"), "let s = \"single\";");
    assert_eq!(
        print("if (a) { b() } else { c() }"),
        "if (a) {\n  b();\n} else {\n  c();\n}"
    );
    assert_eq!(print("import {a as b} from 'm'"), "import { a as b } from \"m\";");
}

#[test]
fn dangling_else_keeps_its_meaning() {
    let ast = parse("if (a) { if (b) c(); } else d();", ParserOptions::default()).unwrap();
    let printed = generate(&ast.program);
    let reparsed = parse(&printed, ParserOptions::default()).unwrap();
    assert_eq!(generate(&reparsed.program), printed);
    assert!(printed.contains("} else d();"), "{printed}");
}

#[test]
fn replacing_a_slot_prints_the_new_expression() {
    let mut ast = parse("foo();", ParserOptions::default()).unwrap();
    let slot = NodeMut::Program(&mut ast.program)
        .descend(&[Step::item("body", 0), Step::field("expression")])
        .unwrap();
    assert!(matches!(slot, SlotMut::Expr(_)));
    slot.replace(parse_expression("bar(b + 1)").unwrap()).unwrap();
    assert_eq!(generate(&ast.program), "bar(b + 1);");
}
