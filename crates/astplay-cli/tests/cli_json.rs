//! Integration tests for the `--json` output of the astplay commands.
//!
//! These tests verify:
//! - stdout is a single valid JSON document
//! - failing transforms exit with status 1 and still report JSON
//! - the config file in the working directory is honored

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const VAR_TO_LET: &str = "export default () => ({
  visitor: {
    VariableDeclaration(path) {
      path.node.kind = 'let';
    },
  },
});
";

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "astplay-cli", "--bin", "astplay", "--"]);
    cmd
}

fn astplay(cwd: &Path, args: &[&str]) -> Output {
    cargo_bin()
        .args(args)
        .args(["--json", "--cwd"])
        .arg(cwd)
        .output()
        .expect("Failed to run astplay")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_tree_json() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.js"), "var a = 10;").unwrap();

    let output = astplay(dir.path(), &["tree", "input.js", "--active", "VariableDeclaration"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["node_type"], "Program");
    assert_eq!(json["label"]["kind"], "root");

    let decl = &json["children"][0];
    assert_eq!(decl["node_type"], "VariableDeclaration");
    assert_eq!(decl["label"]["kind"], "element");
    assert_eq!(decl["label"]["field"], "body");
    assert_eq!(decl["is_active"], true);
    assert_eq!(decl["range"]["start_line"], 1);
    assert_eq!(decl["range"]["end_column"], 11);
    assert!(decl["values"]
        .as_array()
        .unwrap()
        .iter()
        .any(|v| v["name"] == "kind" && v["value"] == "\"var\""));
}

#[test]
fn test_tree_parse_error_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.js"), "var = ;").unwrap();

    let output = astplay(dir.path(), &["tree", "input.js"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_run_json_output() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.js"), "var a = 10;").unwrap();
    std::fs::write(dir.path().join("plugin.js"), VAR_TO_LET).unwrap();

    let output = astplay(dir.path(), &["run", "input.js", "plugin.js"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["ok"], true);
    assert_eq!(json["mode"], "ast-mutation");
    assert_eq!(json["result"]["kind"], "output");
    assert_eq!(json["result"]["text"], "let a = 10;");
}

#[test]
fn test_run_json_failure_exits_nonzero() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.js"), "var a = 10;").unwrap();
    std::fs::write(
        dir.path().join("plugin.js"),
        "export default () => { throw new Error('boom'); };",
    )
    .unwrap();

    let output = astplay(dir.path(), &["run", "input.js", "plugin.js"]);
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);

    assert_eq!(json["ok"], false);
    assert_eq!(json["result"]["kind"], "failure");
    assert_eq!(json["result"]["text"], "boom");
}

#[test]
fn test_run_code_mode() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.txt"), "hello").unwrap();
    std::fs::write(
        dir.path().join("upper.js"),
        "export default (input) => input.toUpperCase();",
    )
    .unwrap();

    let output = astplay(dir.path(), &["run", "input.txt", "upper.js", "--mode", "code"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["mode"], "direct-code");
    assert_eq!(json["result"]["text"], "HELLO");
}

#[test]
fn test_config_file_sets_mode() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("astplay.config.json"), r#"{"mode": "direct-code"}"#).unwrap();
    std::fs::write(dir.path().join("input.txt"), "a b").unwrap();
    std::fs::write(
        dir.path().join("split.js"),
        "module.exports = (input) => input.split(' ').join('\\n');",
    )
    .unwrap();

    let output = astplay(dir.path(), &["run", "input.txt", "split.js"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["mode"], "direct-code");
    assert_eq!(json["result"]["text"], "a\nb");
}

#[test]
fn test_locate_json() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("plugin.js"), VAR_TO_LET).unwrap();

    // Inside the VariableDeclaration handler body.
    let output = astplay(dir.path(), &["locate", "plugin.js", "--cursor", "4:10"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["cursor"]["line"], 4);
    assert_eq!(json["node_type"], "VariableDeclaration");

    // Before the visitor table.
    let output = astplay(dir.path(), &["locate", "plugin.js", "--cursor", "1:1"]);
    let json = stdout_json(&output);
    assert!(json["node_type"].is_null());
}

#[test]
fn test_resolve_json() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("input.js"),
        "var a = 10;\n\nfunction sum(a, b) {\n  var result = a + b;\n  return result;\n}",
    )
    .unwrap();

    let output = astplay(dir.path(), &["resolve", "input.js", "VariableDeclaration"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["node_type"], "VariableDeclaration");
    assert_eq!(json["known"], true);
    assert_eq!(json["skipped"], 0);
    let ranges = json["ranges"].as_array().unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[1]["start_line"], 4);
    assert_eq!(ranges[1]["start_column"], 3);
    assert_eq!(ranges[1]["end_column"], 21);
}

#[test]
fn test_resolve_unknown_type_is_empty() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("input.js"), "var a = 10;").unwrap();

    let output = astplay(dir.path(), &["resolve", "input.js", "NotANode"]);
    assert!(output.status.success());
    let json = stdout_json(&output);

    assert_eq!(json["known"], false);
    assert!(json["ranges"].as_array().unwrap().is_empty());
}
