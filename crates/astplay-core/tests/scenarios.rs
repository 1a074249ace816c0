//! End-to-end behaviour of the playground pipeline: parse, project, locate,
//! resolve and transform.

use astplay_core::{
    locate, project, resolve, run, CursorPosition, ProjectOptions, RunnerOptions, TransformMode,
    TransformResult,
};
use astplay_parser::node::walk;
use astplay_parser::{parse, NodeRef, ParserOptions};

const INPUT: &str = "var a = 10;

function sum(a, b) {
  var result = a + b;
  return result;
}";

const VAR_TO_LET: &str = "
/**
 * Convert 'var' declarations to 'let'.
 */
export default () => {
  return {
    visitor: {
      VariableDeclaration(path) {
        if (path.node.kind === 'var') {
          path.node.kind = 'let'
        }
      },
      Identifier(path) {
        const name = path.node.name;
      },
    }
  }
}
";

/// 1-indexed cursor just after the first occurrence of `needle`.
fn cursor_after(source: &str, needle: &str) -> CursorPosition {
    let offset = source.find(needle).expect("needle present") + needle.len();
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().unwrap_or("").chars().count() + 1;
    CursorPosition::new(line as u32, column as u32)
}

#[test]
fn test_scenario_a_var_to_let() {
    let result = run("var a = 10;", VAR_TO_LET, &RunnerOptions::default());
    match result {
        TransformResult::Output(text) => assert!(text.contains("let a = 10;"), "{text}"),
        TransformResult::Failure(message) => panic!("transform failed: {message}"),
    }
}

#[test]
fn test_scenario_a_whole_input() {
    let result = run(INPUT, VAR_TO_LET, &RunnerOptions::default());
    let TransformResult::Output(text) = result else {
        panic!("{result:?}");
    };
    assert!(text.starts_with("let a = 10;\nfunction sum(a, b) {"), "{text}");
    assert!(text.contains("\n  let result = a + b;\n"), "{text}");
    assert!(!text.contains("var "), "{text}");
}

#[test]
fn test_scenario_b_thrown_error() {
    let code = "export default () => { throw new Error(\"boom\"); };";
    assert_eq!(
        run("var a = 10;", code, &RunnerOptions::default()),
        TransformResult::Failure("boom".to_string())
    );
    // Thrown while visiting, not while loading.
    let code = "export default () => ({ visitor: { NumericLiteral() { throw new Error('boom'); } } });";
    assert_eq!(
        run("var a = 10;", code, &RunnerOptions::default()),
        TransformResult::Failure("boom".to_string())
    );
}

#[test]
fn test_scenario_c_cursor_in_handler() {
    let cursor = cursor_after(VAR_TO_LET, "const name");
    assert_eq!(locate(VAR_TO_LET, cursor).as_deref(), Some("Identifier"));

    let cursor = cursor_after(VAR_TO_LET, "path.node.kind = ");
    assert_eq!(locate(VAR_TO_LET, cursor).as_deref(), Some("VariableDeclaration"));

    let inline = "export default { visitor: { VariableDeclaration(path) { x(); } Identifier(path) { } } }";
    let cursor = cursor_after(inline, "Identifier(path) { ");
    assert_eq!(locate(inline, cursor).as_deref(), Some("Identifier"));
}

#[test]
fn test_scenario_d_cursor_before_visitor() {
    let cursor = cursor_after(VAR_TO_LET, "export default");
    assert_eq!(locate(VAR_TO_LET, cursor), None);
    assert_eq!(locate(VAR_TO_LET, CursorPosition::new(1, 1)), None);
}

#[test]
fn test_scenario_e_identifier_ranges() {
    let ast = parse("function sum(a, b) { return a + b; }", ParserOptions::default()).unwrap();
    let resolution = resolve(&ast, Some("Identifier"));
    let found: Vec<String> = resolution.ranges.iter().map(ToString::to_string).collect();
    assert_eq!(found, ["1:10-1:12", "1:14-1:14", "1:17-1:17", "1:29-1:29", "1:33-1:33"]);
    assert_eq!(resolution.skipped, 0);
}

#[test]
fn test_locate_then_resolve() {
    let cursor = cursor_after(VAR_TO_LET, "path.node.kind = ");
    let active = locate(VAR_TO_LET, cursor);
    let ast = parse(INPUT, ParserOptions::default()).unwrap();
    let resolution = resolve(&ast, active.as_deref());
    let found: Vec<String> = resolution.ranges.iter().map(ToString::to_string).collect();
    assert_eq!(found, ["1:1-1:11", "4:3-4:21"]);
}

#[test]
fn test_projection_covers_every_node() {
    let ast = parse(INPUT, ParserOptions::default()).unwrap();
    let root = NodeRef::program(&ast.program);
    let mut nodes = 0;
    walk(root, &mut |_| nodes += 1);

    let tree = project(root, None, &ProjectOptions::show_all(), ast.line_index());
    assert_eq!(tree.count(), nodes);
    assert!(tree.iter().all(|node| node.range.is_some()));

    let tree = project(root, Some("Identifier"), &ProjectOptions::show_all(), ast.line_index());
    let active = tree.iter().filter(|node| node.is_active).count();
    assert_eq!(active, resolve(&ast, Some("Identifier")).ranges.len());
}

#[test]
fn test_runs_are_idempotent() {
    let plugins = [
        VAR_TO_LET,
        "export default () => ({ visitor: { Identifier(path) { path.node.name = path.node.name.toUpperCase(); } } });",
        "export default () => ({ visitor: { ReturnStatement(path) { path.remove(); } } });",
        "export default () => { throw new Error('always'); };",
    ];
    for plugin in plugins {
        let first = run(INPUT, plugin, &RunnerOptions::default());
        let second = run(INPUT, plugin, &RunnerOptions::default());
        assert_eq!(first, second, "{plugin}");
    }
}

#[test]
fn test_direct_code_mode() {
    let options = RunnerOptions {
        mode: TransformMode::DirectCode,
        ..RunnerOptions::default()
    };
    let code = "export default function (input) {
        return input.split('\\n').map((line, i) => `${i + 1}: ${line}`).join('\\n');
    }";
    assert_eq!(
        run("a\nb", code, &options),
        TransformResult::Output("1: a\n2: b".to_string())
    );
}

#[test]
fn test_replace_with_source_string() {
    let code = "export default ({ types: t }) => ({
        visitor: {
            BinaryExpression(path) {
                if (path.node.operator === '+' && t.isIdentifier(path.node.left)) {
                    path.replaceWithSourceString(`add(${path.node.left.name}, ${path.node.right.name})`);
                }
            },
        },
    });";
    let result = run(INPUT, code, &RunnerOptions::default());
    assert!(result.text().contains("var result = add(a, b);"), "{}", result.text());
}
