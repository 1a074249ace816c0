//! Module evaluation and plugin resolution.
//!
//! Transform code is a small ES module. Its entry point is the default
//! export, `module.exports`, or (direct-code mode only) the value of the last
//! top-level expression statement.

use super::interp::{EvalError, EvalResult, Interpreter};
use super::path::{Phase, VisitorTable};
use super::value::{Env, Object, ObjectClass, Scope, Value};
use crate::resolver::VisitorKey;
use astplay_parser::{
    ExportDefault, Expr, ExprKind, ImportDecl, ImportSpecifierKind, NodeType, Pattern, PatternKind,
    PatternProp, Program, Stmt, StmtKind,
};
use std::rc::Rc;

/// Visitor keys that configure the traversal rather than name node types.
const IGNORED_VISITOR_KEYS: &[&str] = &["noScope", "denylist", "blacklist", "skipKeys", "shouldSkip"];

/// What evaluating a transform module produced.
#[derive(Default)]
pub struct ModuleExports {
    /// `export default ...`
    pub default: Option<Value>,
    /// `module.exports`, if the module replaced or filled it.
    pub common_js: Option<Value>,
    /// Value of the last top-level expression statement.
    pub last_expression: Option<Value>,
}

impl ModuleExports {
    /// The default export, falling back to `module.exports`.
    pub fn entry(&self) -> Option<&Value> {
        self.default.as_ref().or(self.common_js.as_ref())
    }
}

fn module_source(decl_source: &Expr) -> String {
    match &decl_source.kind {
        ExprKind::String(s) => s.clone(),
        _ => String::new(),
    }
}

fn cannot_find(module: &str) -> EvalError {
    EvalError::error(format!("Cannot find module '{module}'"))
}

fn pattern_names(pattern: &Pattern, out: &mut Vec<String>) {
    match &pattern.kind {
        PatternKind::Ident(id) => out.push(id.name.clone()),
        PatternKind::Array(items) => {
            for item in items.iter().flatten() {
                pattern_names(item, out);
            }
        }
        PatternKind::Object(props) => {
            for prop in props {
                match prop {
                    PatternProp::Prop { value, .. } => pattern_names(value, out),
                    PatternProp::Rest(rest) => pattern_names(rest, out),
                }
            }
        }
        PatternKind::Assign { left, .. } => pattern_names(left, out),
        PatternKind::Rest(inner) => pattern_names(inner, out),
        PatternKind::Expr(_) => {}
    }
}

/// Names bound by an exported declaration.
fn declared_names(stmt: &Stmt) -> Vec<String> {
    let mut names = Vec::new();
    match &stmt.kind {
        StmtKind::Var(decl) => {
            for declarator in &decl.declarations {
                pattern_names(&declarator.id, &mut names);
            }
        }
        StmtKind::Function(function) => names.extend(function.id.iter().map(|id| id.name.clone())),
        _ => {}
    }
    names
}

/// The `types` namespace: `types.isIdentifier(node)` and friends.
fn types_object() -> Value {
    Value::object(Object::with_class(ObjectClass::Types))
}

/// The `api` argument of a plugin function.
fn plugin_api() -> Value {
    let mut api = Object::new();
    api.set("types", types_object());
    api.set("version", Value::string(env!("CARGO_PKG_VERSION")));
    api.set("assertVersion", Value::global("api.assertVersion"));
    Value::object(api)
}

impl Interpreter {
    /// Evaluate `program` as a module in a fresh scope below the globals.
    pub fn load_module(&mut self, program: &Program) -> EvalResult<ModuleExports> {
        let env = Scope::function(&self.global, Some(Value::Undefined));
        let exports = Value::object(Object::new());
        let mut module = Object::new();
        module.set("exports", exports.clone());
        let module = Value::object(module);
        env.declare("module", module.clone(), true);
        env.declare("exports", exports.clone(), true);

        let mut loaded = ModuleExports::default();
        self.hoist(&program.body, &env);
        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::Import(decl) => self.import(decl, &env)?,
                StmtKind::ExportDefault(export) => {
                    let value = match export {
                        ExportDefault::Function(function) => {
                            let closure = self.function_closure(function, &env);
                            if let Some(id) = &function.id {
                                env.declare(&id.name, closure.clone(), true);
                            }
                            closure
                        }
                        ExportDefault::Class(_) => {
                            return Err(EvalError::Type(
                                "Classes are not supported in transform code".to_string(),
                            ))
                        }
                        ExportDefault::Expr(expr) => self.eval(expr, &env)?,
                    };
                    loaded.default = Some(value);
                }
                StmtKind::ExportNamed(export) => {
                    if let Some(source) = &export.source {
                        return Err(cannot_find(&module_source(source)));
                    }
                    if let Some(declaration) = &export.declaration {
                        self.exec_stmt(declaration, &env)?;
                        for name in declared_names(declaration) {
                            let value = self.lookup(&name, &env)?;
                            self.set_property(&exports, &Value::from(name), value)?;
                        }
                    }
                    for specifier in &export.specifiers {
                        let value = self.lookup(&specifier.local.name, &env)?;
                        if specifier.exported.name == "default" {
                            loaded.default = Some(value);
                        } else {
                            self.set_property(&exports, &Value::string(specifier.exported.name.as_str()), value)?;
                        }
                    }
                }
                StmtKind::ExportAll(export) => return Err(cannot_find(&module_source(&export.source))),
                StmtKind::Expr(expr) => {
                    self.tick()?;
                    loaded.last_expression = Some(self.eval(expr, &env)?);
                }
                _ => {
                    self.exec_stmt(stmt, &env)?;
                }
            }
        }

        let current = self.get_property(&module, &Value::string("exports"))?;
        let replaced = match (&current, &exports) {
            (Value::Object(a), Value::Object(b)) => !Rc::ptr_eq(a, b),
            _ => true,
        };
        if replaced {
            loaded.common_js = Some(current);
        } else if let Value::Object(object) = &current {
            let object = object.borrow();
            if let Some(default) = object.get("default") {
                loaded.default.get_or_insert_with(|| default.clone());
            } else if !object.is_empty() {
                loaded.common_js = Some(current.clone());
            }
        }
        Ok(loaded)
    }

    fn import(&mut self, decl: &ImportDecl, env: &Env) -> EvalResult<()> {
        let source = module_source(&decl.source);
        let module = match source.as_str() {
            "@babel/core" => {
                let mut core = Object::new();
                core.set("types", types_object());
                Value::object(core)
            }
            "@babel/types" => types_object(),
            _ => return Err(cannot_find(&source)),
        };
        for specifier in &decl.specifiers {
            match &specifier.kind {
                ImportSpecifierKind::Default(local) | ImportSpecifierKind::Namespace(local) => {
                    env.declare(&local.name, module.clone(), false);
                }
                ImportSpecifierKind::Named { imported, local } => {
                    let value = self.get_property(&module, &Value::string(imported.name.as_str()))?;
                    env.declare(&local.name, value, false);
                }
            }
        }
        Ok(())
    }

    /// Turn the module's entry into a plugin object, calling it with the
    /// plugin API when it is a function.
    pub fn resolve_plugin(&mut self, entry: Option<&Value>) -> EvalResult<Value> {
        let Some(entry) = entry else {
            return Err(EvalError::Plugin(
                "The transform code has no default export. Use `export default` or `module.exports`."
                    .to_string(),
            ));
        };
        let plugin = if entry.is_callable() {
            let options = Value::object(Object::new());
            self.call(entry, Value::Undefined, vec![plugin_api(), options, Value::string("/")])?
        } else {
            entry.clone()
        };
        match plugin {
            Value::Object(_) => Ok(plugin),
            _ => Err(EvalError::Plugin(
                "Plugin/Preset did not return an object.".to_string(),
            )),
        }
    }

    /// Build the dispatch table from the plugin's `visitor` object.
    pub fn visitor_table(&mut self, plugin: &Value) -> EvalResult<VisitorTable> {
        let mut table = VisitorTable::default();
        let visitor = match self.get_property(plugin, &Value::string("visitor"))? {
            Value::Undefined => return Ok(table),
            Value::Object(visitor) => visitor,
            _ => {
                return Err(EvalError::Plugin(
                    "Plugin .visitor must be an object".to_string(),
                ))
            }
        };
        let entries: Vec<(Rc<str>, Value)> = visitor
            .borrow()
            .entries()
            .map(|(key, value)| (Rc::clone(key), value.clone()))
            .collect();

        for (key, handler) in entries {
            if key.starts_with('_') || IGNORED_VISITOR_KEYS.contains(&&*key) {
                continue;
            }
            let mut types: Vec<NodeType> = Vec::new();
            for part in key.split('|').map(str::trim) {
                match part {
                    // Root-level enter/exit run for every node.
                    "enter" | "exit" => types.extend(NodeType::ALL.iter().copied()),
                    _ => {
                        let key = VisitorKey::parse(part).ok_or_else(|| {
                            EvalError::Plugin(format!(
                                "You gave us a visitor for the node type {part} but it's not a valid type"
                            ))
                        })?;
                        types.extend(key.node_types());
                    }
                }
            }
            types.sort_unstable();
            types.dedup();

            match &*key {
                "enter" => self.add_handler(&mut table, &key, "enter", &types, Phase::Enter, &handler)?,
                "exit" => self.add_handler(&mut table, &key, "exit", &types, Phase::Exit, &handler)?,
                _ if handler.is_callable() => table.add(types, Phase::Enter, &handler),
                _ if matches!(handler, Value::Object(_)) => {
                    for (name, phase) in [("enter", Phase::Enter), ("exit", Phase::Exit)] {
                        let inner = self.get_property(&handler, &Value::string(name))?;
                        if !matches!(inner, Value::Undefined) {
                            self.add_handler(&mut table, &key, name, &types, phase, &inner)?;
                        }
                    }
                }
                _ => {
                    return Err(EvalError::Plugin(format!(
                        "You passed traverse() a visitor object with the property {key} that has the invalid type {}",
                        handler.type_of()
                    )))
                }
            }
        }
        tracing::trace!(empty = table.is_empty(), "visitor table built");
        Ok(table)
    }

    fn add_handler(
        &self,
        table: &mut VisitorTable,
        key: &str,
        name: &str,
        types: &[NodeType],
        phase: Phase,
        handler: &Value,
    ) -> EvalResult<()> {
        if !handler.is_callable() {
            return Err(EvalError::Plugin(format!(
                "You passed traverse() a visitor object with the property {key} that has the invalid property {name}"
            )));
        }
        table.add(types.iter().copied(), phase, handler);
        Ok(())
    }

    /// `this` of visitor handlers and of `pre`/`post`.
    pub fn plugin_state(&self, input: &str) -> Value {
        let mut file = Object::new();
        file.set("code", Value::string(input));
        let mut state = Object::new();
        state.set("opts", Value::object(Object::new()));
        state.set("file", Value::object(file));
        state.set("filename", Value::Undefined);
        Value::object(state)
    }

    /// Call the plugin's `pre` or `post` hook, if it has one.
    pub fn plugin_hook(&mut self, plugin: &Value, hook: &str, state: &Value) -> EvalResult<()> {
        let function = self.get_property(plugin, &Value::string(hook))?;
        match function {
            Value::Undefined => Ok(()),
            f if f.is_callable() => {
                self.call(&f, state.clone(), vec![state.clone()])?;
                Ok(())
            }
            _ => Err(EvalError::Plugin(format!("Plugin .{hook} must be a function"))),
        }
    }

    /// The function a direct-code transform exports.
    pub fn direct_function(&self, exports: &ModuleExports) -> EvalResult<Value> {
        match exports.entry().or(exports.last_expression.as_ref()) {
            Some(function) if function.is_callable() => Ok(function.clone()),
            _ => Err(EvalError::Plugin(
                "Direct-code transforms must export a function that takes the input text".to_string(),
            )),
        }
    }
}
