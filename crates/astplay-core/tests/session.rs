//! Synchronization controller behaviour with a recording editor host.

use astplay_core::{
    CursorPosition, KeyEvent, MemoryHost, PlaygroundConfig, Session, TransformMode, TransformResult,
};
use std::time::{Duration, Instant};

const PLUGIN: &str = "export default () => ({
  visitor: {
    VariableDeclaration(path) {
      path.node.kind = 'let';
    },
    Identifier(path) {
    },
  },
});";

fn config() -> PlaygroundConfig {
    PlaygroundConfig::default().with_debounce_ms(500)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn output(session: &Session<MemoryHost>) -> &str {
    session.output().map_or("", TransformResult::text)
}

#[test]
fn test_initial_state() {
    let session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());
    assert!(session.ast().is_some());
    assert!(session.tree().is_some());
    assert!(session.last_parse_error().is_none());
    assert_eq!(output(&session), "let a = 10;");
    assert_eq!(session.active_node_type(), None);
    assert!(session.decorations().is_empty());
}

#[test]
fn test_blank_transform_code_does_not_run() {
    let session = Session::new(&config(), "var a = 10;", "  \n", MemoryHost::new());
    assert!(session.output().is_none());
}

#[test]
fn test_input_is_debounced() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());

    session.on_input_changed("var b = 1;", start);
    session.on_input_changed("var c = 2;", start + ms(200));
    assert_eq!(session.next_deadline(), Some(start + ms(700)));

    // Not yet due: nothing changes.
    assert!(!session.poll(start + ms(600)));
    assert_eq!(session.accepted_input(), "var a = 10;");
    assert_eq!(output(&session), "let a = 10;");

    // Only the last edit is flushed, once.
    assert!(session.poll(start + ms(700)));
    assert_eq!(session.accepted_input(), "var c = 2;");
    assert_eq!(output(&session), "let c = 2;");
    assert!(!session.poll(start + ms(2_000)));
    assert_eq!(session.next_deadline(), None);
}

#[test]
fn test_parse_failure_keeps_previous_tree() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());
    let tree = session.tree().cloned();

    session.on_input_changed("var = ;", start);
    assert!(session.poll(start + ms(500)));
    assert!(session.last_parse_error().is_some());
    assert_eq!(session.tree().cloned(), tree);
    assert_eq!(output(&session), "let a = 10;");

    // An explicit run reports the parse error from the transform's own parse.
    assert!(session.on_key_down(&KeyEvent::new("Enter").with_shift(), start + ms(550)));
    assert!(session.output().is_some_and(TransformResult::is_failure));

    session.on_input_changed("let ok = 1;", start + ms(600));
    assert!(session.poll(start + ms(1_100)));
    assert!(session.last_parse_error().is_none());
    assert_ne!(session.tree().cloned(), tree);
}

fn nested_parens(depth: usize) -> String {
    format!("var x = {}1{};", "(".repeat(depth), ")".repeat(depth))
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());
    let tree = session.tree().cloned();

    session.on_input_changed(nested_parens(10_000), start);
    assert!(session.poll(start + ms(500)));
    let err = session.last_parse_error().expect("nesting limit reported");
    assert_eq!(err.message, "Maximum nesting depth exceeded");
    assert_eq!(session.tree().cloned(), tree);
    assert_eq!(output(&session), "let a = 10;");

    session.on_input_changed(nested_parens(50), start + ms(1_000));
    assert!(session.poll(start + ms(1_500)));
    assert!(session.last_parse_error().is_none());
    assert_eq!(output(&session), "let x = 1;");
}

#[test]
fn test_cursor_drives_decorations() {
    let mut session = Session::new(&config(), "var a = 10;\nvar b = a;", PLUGIN, MemoryHost::new());

    // Inside the VariableDeclaration handler.
    session.on_cursor_moved(CursorPosition::new(4, 7));
    assert_eq!(session.active_node_type(), Some("VariableDeclaration"));
    let ranges: Vec<String> = session.host().ranges().iter().map(ToString::to_string).collect();
    assert_eq!(ranges, ["1:1-1:11", "2:1-2:10"]);
    assert_eq!(session.decorations().len(), 2);
    let tree = session.tree().unwrap();
    assert_eq!(tree.iter().filter(|node| node.is_active).count(), 2);

    // Inside the Identifier handler.
    session.on_cursor_moved(CursorPosition::new(7, 1));
    assert_eq!(session.active_node_type(), Some("Identifier"));
    assert_eq!(session.host().ranges().len(), 3);
    assert_eq!(session.decorations().len(), 3);

    // Same type again: no new decoration request.
    let updates = session.host().updates();
    session.on_cursor_moved(CursorPosition::new(7, 2));
    assert_eq!(session.host().updates(), updates);

    // Before the visitor: decorations are cleared.
    session.on_cursor_moved(CursorPosition::new(1, 1));
    assert_eq!(session.active_node_type(), None);
    assert!(session.host().ranges().is_empty());
    assert!(session.decorations().is_empty());
}

#[test]
fn test_decorations_follow_reparse() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());
    session.on_cursor_moved(CursorPosition::new(4, 7));
    assert_eq!(session.host().ranges().len(), 1);

    session.on_input_changed("var a = 1;\nvar b = 2;\nvar c = 3;", start);
    session.poll(start + ms(500));
    assert_eq!(session.host().ranges().len(), 3);
}

#[test]
fn test_run_shortcut() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", "", MemoryHost::new());
    assert!(session.output().is_none());

    session.on_transform_code_changed(PLUGIN);
    assert!(session.output().is_none());

    assert!(!session.on_key_down(&KeyEvent::new("Enter"), start));
    assert!(session.output().is_none());

    assert!(session.on_key_down(&KeyEvent::new("Enter").with_shift(), start));
    assert_eq!(output(&session), "let a = 10;");

    // A failing transform shows its message.
    session.on_transform_code_changed("export default () => { throw new Error('nope'); };");
    session.run_now();
    assert_eq!(session.output(), Some(&TransformResult::Failure("nope".to_string())));
}

#[test]
fn test_run_shortcut_flushes_overdue_input() {
    let start = Instant::now();
    let mut session = Session::new(&config(), "var a = 10;", PLUGIN, MemoryHost::new());
    session.on_input_changed("var z = 0;", start);
    assert!(session.on_key_down(&KeyEvent::new("Enter").with_shift(), start + ms(100)));
    assert_eq!(output(&session), "let a = 10;");
    assert!(session.on_key_down(&KeyEvent::new("Enter").with_shift(), start + ms(600)));
    assert_eq!(output(&session), "let z = 0;");
}

#[test]
fn test_direct_code_session() {
    let config = config().with_mode(TransformMode::DirectCode);
    // Direct-code input need not be JavaScript.
    let session = Session::new(&config, "not js at all", "export default (s) => s.toUpperCase();", MemoryHost::new());
    assert_eq!(output(&session), "NOT JS AT ALL");
    assert!(session.last_parse_error().is_some());
    assert!(session.tree().is_none());
}
