//! Transform runner.
//!
//! Runs user-supplied transform code against an input program. The code is
//! parsed with the same parser and evaluated by a budget-bounded interpreter
//! of a JavaScript subset. Two strategies exist:
//!
//! - [`TransformMode::AstMutation`]: the code exports a Babel-style plugin.
//!   Its visitor walks the input AST and edits it in place; the result is
//!   printed by the code generator.
//! - [`TransformMode::DirectCode`]: the code exports a function from input
//!   text to output text.
//!
//! [`run`] never panics and never returns an error: every failure becomes a
//! [`TransformResult::Failure`] carrying a displayable message.

mod builtins;
mod interp;
mod loader;
mod path;
mod value;

use astplay_parser::{parse, Codegen, CodegenOptions, ParseError, ParserOptions};
use interp::{EvalError, Interpreter};
use loader::ModuleExports;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Stack size of the threads parsing and transform code run on.
const LARGE_STACK_SIZE: usize = 64 * 1024 * 1024;

/// How the transform code is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformMode {
    /// A Babel-style plugin edits the parsed input.
    #[default]
    AstMutation,
    /// A function maps input text to output text.
    DirectCode,
}

/// Limits for one transform run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Statements executed plus functions called.
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Wall-clock limit for the whole run.
    pub time_limit: Duration,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 256,
            time_limit: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub mode: TransformMode,
    /// How the input is parsed. Transform code is always a module.
    pub parser: ParserOptions,
    pub codegen: CodegenOptions,
    pub budget: Budget,
}

/// Outcome of a transform run: output text or a failure message, never
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum TransformResult {
    Output(String),
    Failure(String),
}

impl TransformResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, TransformResult::Failure(_))
    }

    /// The output text or the failure message.
    pub fn text(&self) -> &str {
        match self {
            TransformResult::Output(text) | TransformResult::Failure(text) => text,
        }
    }
}

/// Why a run failed.
#[derive(Debug, thiserror::Error)]
enum TransformError {
    #[error("{0}")]
    Input(ParseError),
    #[error("{0}")]
    Code(ParseError),
    #[error("{0}")]
    Eval(String),
    #[error("{0}")]
    Budget(String),
    #[error("transform thread failed: {0}")]
    Thread(std::io::Error),
}

impl TransformError {
    fn kind(&self) -> &'static str {
        match self {
            TransformError::Input(_) => "input",
            TransformError::Code(_) => "code",
            TransformError::Eval(_) => "eval",
            TransformError::Budget(_) => "budget",
            TransformError::Thread(_) => "thread",
        }
    }
}

impl From<EvalError> for TransformError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Budget(message) => TransformError::Budget(message),
            other => TransformError::Eval(other.to_string()),
        }
    }
}

/// A way of applying loaded transform code to an input.
trait Transform {
    fn apply(
        &self,
        interp: &mut Interpreter,
        exports: &ModuleExports,
        input: &str,
        options: &RunnerOptions,
    ) -> Result<String, TransformError>;
}

/// Babel-style plugin: visitor over the parsed input.
struct VisitorTransform;

impl Transform for VisitorTransform {
    fn apply(
        &self,
        interp: &mut Interpreter,
        exports: &ModuleExports,
        input: &str,
        options: &RunnerOptions,
    ) -> Result<String, TransformError> {
        let ast = parse(input, options.parser.clone()).map_err(TransformError::Input)?;
        let plugin = interp.resolve_plugin(exports.entry())?;
        let visitor = interp.visitor_table(&plugin)?;
        let state = interp.plugin_state(input);

        interp.target = Some(ast.program);
        interp.plugin_hook(&plugin, "pre", &state)?;
        if !visitor.is_empty() {
            interp.traverse(&visitor, &state)?;
        }
        interp.plugin_hook(&plugin, "post", &state)?;

        let program = interp
            .target
            .take()
            .ok_or_else(|| TransformError::Eval("the transformed program was lost".to_string()))?;
        Ok(Codegen::new(&program, options.codegen.clone()).generate())
    }
}

/// Text-to-text function.
struct DirectTransform;

impl Transform for DirectTransform {
    fn apply(
        &self,
        interp: &mut Interpreter,
        exports: &ModuleExports,
        input: &str,
        _options: &RunnerOptions,
    ) -> Result<String, TransformError> {
        let function = interp.direct_function(exports)?;
        let output = interp.call(&function, value::Value::Undefined, vec![value::Value::string(input)])?;
        Ok(output.to_js_string())
    }
}

/// Runs transform code with fixed options.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    options: RunnerOptions,
}

impl Runner {
    pub fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Apply `transform_code` to `input`.
    pub fn run(&self, input: &str, transform_code: &str) -> TransformResult {
        let started = Instant::now();
        let outcome = on_large_stack(|| self.run_inner(input, transform_code))
            .map_err(TransformError::Thread)
            .and_then(|result| result);
        let elapsed_ms = started.elapsed().as_millis();
        match outcome {
            Ok(output) => {
                debug!(mode = ?self.options.mode, elapsed_ms, "transform finished");
                TransformResult::Output(output)
            }
            Err(err) => {
                if matches!(err, TransformError::Budget(_) | TransformError::Thread(_)) {
                    warn!(kind = err.kind(), elapsed_ms, "transform aborted: {err}");
                } else {
                    debug!(kind = err.kind(), elapsed_ms, "transform failed: {err}");
                }
                TransformResult::Failure(err.to_string())
            }
        }
    }

    fn run_inner(&self, input: &str, transform_code: &str) -> Result<String, TransformError> {
        let code = parse(transform_code, ParserOptions::default()).map_err(TransformError::Code)?;
        let mut interp = Interpreter::new(self.options.budget);
        let exports = interp.load_module(&code.program)?;
        let strategy: &dyn Transform = match self.options.mode {
            TransformMode::AstMutation => &VisitorTransform,
            TransformMode::DirectCode => &DirectTransform,
        };
        let output = strategy.apply(&mut interp, &exports, input, &self.options);
        debug!(steps = interp.steps(), "transform code evaluated");
        output
    }
}

/// Apply `transform_code` to `input` with `options`.
pub fn run(input: &str, transform_code: &str, options: &RunnerOptions) -> TransformResult {
    Runner::new(options.clone()).run(input, transform_code)
}

/// Run `f` on a scoped thread with a stack large enough for deeply nested
/// code, and wait for it.
pub(crate) fn on_large_stack<T, F>(f: F) -> std::io::Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("astplay-worker".to_string())
            .stack_size(LARGE_STACK_SIZE)
            .spawn_scoped(scope, f)?;
        handle
            .join()
            .map_err(|_| std::io::Error::other("transform thread panicked"))
    })
}

/// Evaluate `source` as a script and return `String(result)`, or
/// `error: <message>`.
#[cfg(test)]
fn eval_script(source: &str) -> String {
    let source = source.to_string();
    on_large_stack(move || {
        let ast = match parse(&source, ParserOptions::default()) {
            Ok(ast) => ast,
            Err(err) => return format!("error: {err}"),
        };
        let mut interp = Interpreter::new(Budget::default());
        let global = std::rc::Rc::clone(&interp.global);
        match interp
            .exec_stmts(&ast.program.body, &global)
            .and_then(|_| interp.lookup("result", &global))
        {
            Ok(value) => value.to_js_string(),
            Err(err) => format!("error: {err}"),
        }
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VAR_TO_LET: &str = "
        export default function () {
            return {
                visitor: {
                    VariableDeclaration(path) {
                        if (path.node.kind === 'var') {
                            path.node.kind = 'let';
                        }
                    },
                },
            };
        }
    ";

    fn run_ast(input: &str, code: &str) -> TransformResult {
        run(input, code, &RunnerOptions::default())
    }

    fn run_direct(input: &str, code: &str) -> TransformResult {
        let options = RunnerOptions {
            mode: TransformMode::DirectCode,
            ..RunnerOptions::default()
        };
        run(input, code, &options)
    }

    #[test]
    fn test_var_to_let() {
        let result = run_ast("var a = 10;\nfunction sum(a, b) {\n  var r = a + b;\n  return r;\n}", VAR_TO_LET);
        let TransformResult::Output(text) = result else {
            panic!("{result:?}");
        };
        assert!(text.contains("let a = 10;"), "{text}");
        assert!(text.contains("let r = a + b;"), "{text}");
        assert!(!text.contains("var"), "{text}");
    }

    #[test]
    fn test_plugin_shapes() {
        let object = "export default { visitor: { Identifier(path) { path.node.name = 'y'; } } };";
        assert_eq!(run_ast("x;", object), TransformResult::Output("y;".to_string()));

        let common_js = "module.exports = function ({ types: t }) {
            return { visitor: { 'NumericLiteral|StringLiteral': { exit(path) { if (t.isNumericLiteral(path.node)) path.node.value = 2; } } } };
        };";
        assert_eq!(run_ast("f(1, 'a');", common_js), TransformResult::Output("f(2, \"a\");".to_string()));

        let imported = "import { types as t } from '@babel/core';
            export default (api) => {
                api.assertVersion(7);
                return { visitor: { CallExpression(path) { if (t.isIdentifier(path.node.callee, { name: 'old' })) path.node.callee.name = 'neu'; } } };
            };";
        assert_eq!(run_ast("old(); other();", imported), TransformResult::Output("neu();\nother();".to_string()));
    }

    #[test]
    fn test_pre_post_and_state() {
        let code = "export default () => ({
            pre() { this.count = 0; },
            visitor: { Identifier() { this.count++; } },
            post(state) { if (state.file.code.length > 0) throw new Error('seen ' + this.count); },
        });";
        assert_eq!(run_ast("a + b * c;", code), TransformResult::Failure("seen 3".to_string()));
    }

    #[test]
    fn test_failures() {
        assert_eq!(
            run_ast("var a = 10;", "export default () => { throw new Error('boom'); };"),
            TransformResult::Failure("boom".to_string())
        );
        assert_eq!(
            run_ast("var a = 10;", "export default () => { throw 'plain'; };"),
            TransformResult::Failure("plain".to_string())
        );
        assert_eq!(
            run_ast("a;", "export default () => ({ visitor: { Identifier(path) { path.node.x.y; } } });"),
            TransformResult::Failure("Cannot read properties of undefined (reading 'y')".to_string())
        );
        assert_eq!(
            run_ast("a;", "export default () => ({ visitor: { Identifer() {} } });"),
            TransformResult::Failure(
                "You gave us a visitor for the node type Identifer but it's not a valid type".to_string()
            )
        );
        assert_eq!(
            run_ast("a;", "export default () => 1;"),
            TransformResult::Failure("Plugin/Preset did not return an object.".to_string())
        );
        assert_eq!(
            run_ast("a;", "import x from 'lodash';"),
            TransformResult::Failure("Cannot find module 'lodash'".to_string())
        );
        assert!(run_ast("a;", "const x = ;").is_failure());
        assert!(run_ast("var = ;", VAR_TO_LET).text().starts_with("Unexpected"));
        assert_eq!(
            run_ast("a;", "const unused = 1;").text(),
            "The transform code has no default export. Use `export default` or `module.exports`."
        );
    }

    #[test]
    fn test_budget() {
        let options = RunnerOptions {
            budget: Budget {
                max_steps: 5_000,
                ..Budget::default()
            },
            ..RunnerOptions::default()
        };
        let result = run("a;", "while (true) {}", &options);
        assert_eq!(
            result,
            TransformResult::Failure("transform exceeded its execution budget of 5000 steps".to_string())
        );
        let result = run_ast("a;", "const f = () => f(); export default f;");
        assert_eq!(result, TransformResult::Failure("Maximum call stack size exceeded".to_string()));
    }

    #[test]
    fn test_direct_code() {
        assert_eq!(
            run_direct("var a = 1;", "export default (code) => code.toUpperCase();"),
            TransformResult::Output("VAR A = 1;".to_string())
        );
        assert_eq!(
            run_direct("abc", "(input) => input.split('').reverse().join('')"),
            TransformResult::Output("cba".to_string())
        );
        assert_eq!(
            run_direct("x", "module.exports = (s) => s.length;"),
            TransformResult::Output("1".to_string())
        );
        // The input is never parsed in direct mode.
        assert_eq!(
            run_direct("var = ;", "export default (s) => s + '!';"),
            TransformResult::Output("var = ;!".to_string())
        );
        assert!(run_direct("x", "export default 42;").is_failure());
    }

    #[test]
    fn test_idempotent() {
        let code = "export default () => ({ visitor: { Identifier(path) { path.node.name = path.node.name + '_'; } } });";
        let first = run_ast("a + b;", code);
        let second = run_ast("a + b;", code);
        assert_eq!(first, second);
        assert_eq!(first, TransformResult::Output("a_ + b_;".to_string()));
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_string(&TransformResult::Failure("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"failure","text":"boom"}"#);
        let mode: TransformMode = serde_json::from_str("\"direct-code\"").unwrap();
        assert_eq!(mode, TransformMode::DirectCode);
    }
}
