//! Nodes and paths as transform code sees them, and the visitor traversal
//! that hands paths to plugin handlers.
//!
//! A node value is a list of steps from the `Program` root, resolved against
//! the live AST on every access. Edits made through one handle are therefore
//! visible through every other. A handle whose steps no longer lead to a
//! node (its subtree was replaced or removed) reads as a removed node.

use super::interp::{EvalError, EvalResult, Interpreter};
use super::value::{NativeKind, Value};
use crate::resolver::VisitorKey;
use astplay_parser::{
    parse_expression, Field, NodeMut, NodeRef, NodeType, Program, Scalar, SlotMut, Step,
};
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// A node of the AST under transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub steps: Vec<Step>,
}

impl NodeHandle {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    fn child(&self, step: Step) -> Value {
        let mut steps = self.steps.clone();
        steps.push(step);
        Value::Node(Rc::new(NodeHandle { steps }))
    }
}

/// The `path` handed to visitor handlers.
#[derive(Debug)]
pub struct PathHandle {
    pub steps: Vec<Step>,
    node_type: Cell<NodeType>,
    skipped: Cell<bool>,
    /// Depth of the node that actually left the tree; removing the only
    /// expression of a statement removes the statement.
    removed: Cell<Option<usize>>,
    replaced: Cell<bool>,
}

impl PathHandle {
    pub fn new(steps: Vec<Step>, node_type: NodeType) -> Self {
        Self {
            steps,
            node_type: Cell::new(node_type),
            skipped: Cell::new(false),
            removed: Cell::new(None),
            replaced: Cell::new(false),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type.get()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get().is_some()
    }
}

const PATH_METHODS: &[&str] = &["skip", "stop", "remove", "replaceWithSourceString"];

/// Visit phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

/// Handlers per node type, in the order the plugin listed them.
#[derive(Debug, Default)]
pub struct VisitorTable {
    enter: FxHashMap<NodeType, Vec<Value>>,
    exit: FxHashMap<NodeType, Vec<Value>>,
}

impl VisitorTable {
    pub fn add(&mut self, types: impl IntoIterator<Item = NodeType>, phase: Phase, handler: &Value) {
        let table = match phase {
            Phase::Enter => &mut self.enter,
            Phase::Exit => &mut self.exit,
        };
        for ty in types {
            table.entry(ty).or_default().push(handler.clone());
        }
    }

    pub fn handlers(&self, phase: Phase, ty: NodeType) -> &[Value] {
        let table = match phase {
            Phase::Enter => &self.enter,
            Phase::Exit => &self.exit,
        };
        table.get(&ty).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.enter.is_empty() && self.exit.is_empty()
    }
}

/// What a visited subtree asks of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// The node at this depth left the tree.
    Removed(usize),
    Stop,
}

/// The editable node at `steps`.
fn node_mut<'a>(program: &'a mut Program, steps: &[Step]) -> Option<NodeMut<'a>> {
    if steps.is_empty() {
        Some(NodeMut::Program(program))
    } else {
        NodeMut::Program(program).descend(steps).map(SlotMut::into_node)
    }
}

fn scalar_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::String(s) => Value::from(s),
        Scalar::Number(n) => Value::Number(n),
        Scalar::Bool(b) => Value::Bool(b),
    }
}

fn removed_node(key: &str) -> EvalError {
    EvalError::Type(format!(
        "Cannot read properties of a removed node (reading '{key}')"
    ))
}

fn edit_error(err: astplay_parser::node::EditError) -> EvalError {
    EvalError::error(err.0)
}

/// Babel-shaped JSON of a node: `type`, `start`, `end`, then its fields.
pub fn node_to_json(node: NodeRef<'_>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("type".into(), node.node_type().as_str().into());
    map.insert("start".into(), node.span().start.into());
    map.insert("end".into(), node.span().end.into());
    for (name, field) in node.fields() {
        let value = match field {
            Field::Node(child) => node_to_json(child),
            Field::List(items) => items.into_iter().map(node_to_json).collect(),
            Field::Value(Scalar::String(s)) => s.into(),
            Field::Value(Scalar::Number(n)) => super::builtins::json_number(n),
            Field::Value(Scalar::Bool(b)) => b.into(),
            Field::Null => serde_json::Value::Null,
        };
        map.insert(name.to_string(), value);
    }
    serde_json::Value::Object(map)
}

impl Interpreter {
    pub(super) fn node_at(&self, steps: &[Step]) -> Option<NodeRef<'_>> {
        let program = self.target.as_ref()?;
        NodeRef::program(program).descend(steps)
    }

    fn node_type_at(&self, steps: &[Step]) -> Option<NodeType> {
        self.node_at(steps).map(|node| node.node_type())
    }

    fn program_mut(&mut self) -> EvalResult<&mut Program> {
        self.target
            .as_mut()
            .ok_or_else(|| EvalError::error("No AST is being transformed"))
    }

    fn list_len(&self, steps: &[Step], field: &str) -> usize {
        match self.node_at(steps).and_then(|node| node.field(field)) {
            Some(Field::List(items)) => items.len(),
            _ => 0,
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub(super) fn get_node_property(&mut self, handle: &NodeHandle, key: &str) -> EvalResult<Value> {
        let node = self.node_at(&handle.steps).ok_or_else(|| removed_node(key))?;
        Ok(match key {
            "type" => Value::string(node.node_type().as_str()),
            "start" => Value::Number(f64::from(node.span().start)),
            "end" => Value::Number(f64::from(node.span().end)),
            _ => match node.field(key) {
                Some(Field::Node(_)) => handle.child(Step::field(key)),
                Some(Field::List(items)) => Value::array(
                    (0..items.len())
                        .map(|index| handle.child(Step::item(key, index)))
                        .collect(),
                ),
                Some(Field::Value(scalar)) => scalar_value(scalar),
                Some(Field::Null) => Value::Null,
                None => Value::Undefined,
            },
        })
    }

    /// Assign a plain-valued field: `path.node.kind = "let"`.
    pub(super) fn set_node_property(
        &mut self,
        handle: &NodeHandle,
        key: &str,
        value: &Value,
    ) -> EvalResult<()> {
        let node_type = self
            .node_type_at(&handle.steps)
            .ok_or_else(|| removed_node(key))?;
        if key == "type" {
            return Err(EvalError::error(format!(
                "Cannot change the type of a {node_type}; use path.replaceWithSourceString"
            )));
        }
        let scalar = match value {
            Value::String(s) => Scalar::String(s.to_string()),
            Value::Number(n) => Scalar::Number(*n),
            Value::Bool(b) => Scalar::Bool(*b),
            other => {
                return Err(EvalError::Type(format!(
                    "Cannot assign {} to {node_type}.{key}; use path.replaceWithSourceString to replace nodes",
                    other.type_of()
                )))
            }
        };
        let program = self.program_mut()?;
        let node = node_mut(program, &handle.steps).ok_or_else(|| removed_node(key))?;
        node.set_scalar(key, &scalar).map_err(edit_error)
    }

    /// Enumerable keys of a node.
    pub(super) fn node_keys(&self, handle: &NodeHandle) -> EvalResult<Vec<String>> {
        let node = self
            .node_at(&handle.steps)
            .ok_or_else(|| removed_node("keys"))?;
        let mut keys = vec!["type".to_string(), "start".to_string(), "end".to_string()];
        keys.extend(node.fields().into_iter().map(|(name, _)| name.to_string()));
        Ok(keys)
    }

    pub(super) fn node_json(&self, handle: &NodeHandle) -> Option<serde_json::Value> {
        self.node_at(&handle.steps).map(node_to_json)
    }

    /// `types.isX(node, opts)` and `path.isX(opts)`.
    pub(super) fn call_is(&mut self, key: VisitorKey, this: &Value, args: &[Value]) -> EvalResult<Value> {
        let (steps, opts) = match this {
            Value::Path(path) if !path.is_removed() => (Some(path.steps.clone()), args.first()),
            Value::Path(_) => (None, None),
            _ => match args.first() {
                Some(Value::Node(handle)) => (Some(handle.steps.clone()), args.get(1)),
                _ => (None, None),
            },
        };
        let Some(steps) = steps else {
            return Ok(Value::Bool(false));
        };
        if !self.node_type_at(&steps).is_some_and(|ty| key.matches(ty)) {
            return Ok(Value::Bool(false));
        }
        if let Some(Value::Object(opts)) = opts {
            let expected: Vec<_> = opts
                .borrow()
                .entries()
                .map(|(k, v)| (Rc::clone(k), v.clone()))
                .collect();
            let handle = NodeHandle::new(steps);
            for (k, v) in expected {
                if !self.get_node_property(&handle, &k)?.strict_eq(&v) {
                    return Ok(Value::Bool(false));
                }
            }
        }
        Ok(Value::Bool(true))
    }

    // =========================================================================
    // Paths
    // =========================================================================

    pub(super) fn get_path_property(&mut self, path: &Rc<PathHandle>, key: &str) -> EvalResult<Value> {
        let parent = path.steps.split_last();
        Ok(match key {
            "node" if path.is_removed() => Value::Null,
            "node" => Value::Node(Rc::new(NodeHandle::new(path.steps.clone()))),
            "type" => Value::string(path.node_type().as_str()),
            "parent" => match parent {
                Some((_, steps)) => Value::Node(Rc::new(NodeHandle::new(steps.to_vec()))),
                None => Value::Null,
            },
            "key" => match parent {
                Some((Step { index: Some(index), .. }, _)) => Value::from(*index),
                Some((Step { field, .. }, _)) => Value::string(field.as_str()),
                None => Value::Null,
            },
            "listKey" => match parent {
                Some((Step { field, index: Some(_) }, _)) => Value::string(field.as_str()),
                _ => Value::Undefined,
            },
            "removed" => Value::Bool(path.is_removed()),
            "shouldSkip" => Value::Bool(path.skipped.get()),
            "shouldStop" => Value::Bool(self.stopped),
            _ => {
                if let Some(name) = PATH_METHODS.iter().find(|name| **name == key) {
                    Value::native(NativeKind::Method(*name), Value::Path(Rc::clone(path)))
                } else if let Some(is) = key.strip_prefix("is").and_then(VisitorKey::parse) {
                    Value::native(NativeKind::Is(is), Value::Path(Rc::clone(path)))
                } else {
                    Value::Undefined
                }
            }
        })
    }

    pub(super) fn call_path_method(
        &mut self,
        path: &PathHandle,
        name: &str,
        args: &[Value],
    ) -> EvalResult<Value> {
        match name {
            "skip" => path.skipped.set(true),
            "stop" => self.stopped = true,
            "remove" => self.remove_path(path)?,
            "replaceWithSourceString" => {
                let code = args.first().map(Value::to_js_string).unwrap_or_default();
                self.replace_with_source(path, &code)?;
            }
            _ => return Err(EvalError::Type(format!("path.{name} is not a function"))),
        }
        Ok(Value::Undefined)
    }

    fn remove_path(&mut self, path: &PathHandle) -> EvalResult<()> {
        if path.is_removed() {
            return Err(EvalError::error(
                "NodePath has been removed so is read-only.",
            ));
        }
        let depth = self.remove_at(&path.steps)?;
        trace!(node_type = %path.node_type(), depth, "path removed");
        path.removed.set(Some(depth));
        Ok(())
    }

    /// Remove the node at `steps`; returns the depth of the node that left
    /// the tree.
    fn remove_at(&mut self, steps: &[Step]) -> EvalResult<usize> {
        let Some((last, parent)) = steps.split_last() else {
            return Err(EvalError::error("Cannot remove the Program node"));
        };
        let node_type = self
            .node_type_at(steps)
            .ok_or_else(|| removed_node("remove"))?;
        let parent_type = self
            .node_type_at(parent)
            .ok_or_else(|| removed_node("remove"))?;
        match last.index {
            Some(index) => {
                let program = self.program_mut()?;
                let list = node_mut(program, parent)
                    .and_then(|node| node.list(&last.field))
                    .ok_or_else(|| removed_node("remove"))?;
                list.remove(index).map_err(edit_error)?;
                let emptied = parent_type == NodeType::VariableDeclaration
                    && self.list_len(parent, &last.field) == 0;
                let parent_in_list = parent.last().is_some_and(|step| step.index.is_some());
                if emptied && parent_in_list {
                    return self.remove_at(parent);
                }
                Ok(steps.len())
            }
            None if parent_type == NodeType::ExpressionStatement => self.remove_at(parent),
            None => Err(EvalError::error(format!(
                "Cannot remove the {node_type} in {parent_type}.{}",
                last.field
            ))),
        }
    }

    fn replace_with_source(&mut self, path: &PathHandle, code: &str) -> EvalResult<()> {
        if path.is_removed() {
            return Err(EvalError::error(
                "NodePath has been removed so is read-only.",
            ));
        }
        let expr = parse_expression(code)
            .map_err(|err| EvalError::syntax(format!("replaceWithSourceString: {err}")))?;
        let program = self.program_mut()?;
        let slot = NodeMut::Program(program)
            .descend(&path.steps)
            .ok_or_else(|| EvalError::error("Cannot replace the Program node"))?;
        slot.replace(expr).map_err(edit_error)?;
        let node_type = self
            .node_type_at(&path.steps)
            .ok_or_else(|| removed_node("replaceWithSourceString"))?;
        trace!(from = %path.node_type(), to = %node_type, "path replaced");
        path.node_type.set(node_type);
        path.replaced.set(true);
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Walk the target AST depth-first, calling the table's handlers with
    /// `this` set to `state`.
    pub fn traverse(&mut self, visitor: &VisitorTable, state: &Value) -> EvalResult<()> {
        self.stopped = false;
        self.visit(visitor, state, &mut Vec::new())?;
        Ok(())
    }

    fn visit(&mut self, visitor: &VisitorTable, state: &Value, steps: &mut Vec<Step>) -> EvalResult<Flow> {
        let Some(node_type) = self.node_type_at(steps) else {
            return Ok(Flow::Continue);
        };
        let path = Rc::new(PathHandle::new(steps.clone(), node_type));

        if let Some(flow) = self.dispatch(visitor, Phase::Enter, &path, state)? {
            return Ok(flow);
        }
        if path.skipped.get() {
            return Ok(Flow::Continue);
        }
        path.replaced.set(false);

        let fields: Vec<(&'static str, bool)> = match self.node_at(steps) {
            Some(node) => node
                .fields()
                .into_iter()
                .filter_map(|(name, field)| match field {
                    Field::Node(_) => Some((name, false)),
                    Field::List(_) => Some((name, true)),
                    Field::Value(_) | Field::Null => None,
                })
                .collect(),
            None => return Ok(Flow::Continue),
        };
        let depth = steps.len();
        for (name, is_list) in fields {
            if is_list {
                let mut index = 0;
                while index < self.list_len(steps, name) {
                    steps.push(Step::item(name, index));
                    let flow = self.visit(visitor, state, steps);
                    steps.pop();
                    match flow? {
                        Flow::Continue => index += 1,
                        // The next item moved into this slot.
                        Flow::Removed(removed) if removed == depth + 1 => {}
                        other => return Ok(other),
                    }
                }
            } else {
                steps.push(Step::field(name));
                let flow = self.visit(visitor, state, steps);
                steps.pop();
                match flow? {
                    Flow::Continue => {}
                    Flow::Removed(removed) if removed == depth + 1 => {}
                    other => return Ok(other),
                }
            }
        }

        Ok(self
            .dispatch(visitor, Phase::Exit, &path, state)?
            .unwrap_or(Flow::Continue))
    }

    /// Run the handlers of one phase. `Some` when the walk must not continue
    /// normally at this node.
    fn dispatch(
        &mut self,
        visitor: &VisitorTable,
        phase: Phase,
        path: &Rc<PathHandle>,
        state: &Value,
    ) -> EvalResult<Option<Flow>> {
        for handler in visitor.handlers(phase, path.node_type()) {
            trace!(node_type = %path.node_type(), ?phase, "visit");
            let args = vec![Value::Path(Rc::clone(path)), state.clone()];
            self.call(handler, state.clone(), args)?;
            if self.stopped {
                return Ok(Some(Flow::Stop));
            }
            if let Some(depth) = path.removed.get() {
                return Ok(Some(Flow::Removed(depth)));
            }
            if path.replaced.get() {
                break;
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{on_large_stack, Budget};
    use super::*;
    use astplay_parser::{generate, parse, ParserOptions};

    /// Traverse `input` with `visitor`, a JavaScript object literal mapping
    /// node types to handlers. Returns the printed result and the `log`
    /// array of the transform code.
    fn traverse(input: &str, visitor: &str) -> Result<(String, String), String> {
        let input = input.to_string();
        let source = format!("const log = []; const visitor = {visitor};");
        on_large_stack(move || {
            let mut interp = Interpreter::new(Budget::default());
            let global = Rc::clone(&interp.global);
            let plugin = parse(&source, ParserOptions::default()).map_err(|e| e.to_string())?;
            interp
                .exec_stmts(&plugin.program.body, &global)
                .map_err(|e| e.to_string())?;
            let mut table = VisitorTable::default();
            if let Ok(Value::Object(object)) = interp.lookup("visitor", &global) {
                for (key, handler) in object.borrow().entries() {
                    let key = VisitorKey::parse(key).ok_or("bad key")?;
                    table.add(key.node_types(), Phase::Enter, handler);
                }
            }
            interp.target = Some(parse(&input, ParserOptions::default()).map_err(|e| e.to_string())?.program);
            interp
                .traverse(&table, &Value::Undefined)
                .map_err(|e| e.to_string())?;
            let log = interp
                .lookup("log", &global)
                .map_err(|e| e.to_string())?
                .to_js_string();
            let program = interp.target.take().ok_or("no target")?;
            Ok((generate(&program), log))
        })
        .unwrap()
    }

    #[test]
    fn test_visit_order_and_properties() {
        let (_, log) = traverse(
            "var a = 1;",
            "{ Identifier(path) { log.push(path.node.name, path.key, path.parent.type); },
               NumericLiteral(path) { log.push(path.node.value, path.type, path.listKey); } }",
        )
        .unwrap();
        assert_eq!(log, "a,id,VariableDeclarator,1,NumericLiteral,");
    }

    #[test]
    fn test_scalar_edit() {
        let (out, _) = traverse(
            "var a = 10; var b = a;",
            "{ VariableDeclaration(path) { path.node.kind = 'let'; } }",
        )
        .unwrap();
        assert_eq!(out, "let a = 10;\nlet b = a;");
    }

    #[test]
    fn test_remove_visits_every_sibling() {
        let (out, log) = traverse(
            "a(); b(); c(); d();",
            "{ CallExpression(path) { log.push(path.node.callee.name); if (path.node.callee.name !== 'd') path.remove(); } }",
        )
        .unwrap();
        assert_eq!(log, "a,b,c,d");
        assert_eq!(out, "d();");
    }

    #[test]
    fn test_remove_last_declarator_removes_declaration() {
        let (out, _) = traverse(
            "var a = 1, b = 2; keep();",
            "{ VariableDeclarator(path) { path.remove(); } }",
        )
        .unwrap();
        assert_eq!(out, "keep();");
    }

    #[test]
    fn test_remove_errors() {
        let err = traverse("f(1);", "{ NumericLiteral(path) { path.remove(); } }");
        assert!(err.is_ok(), "{err:?}");
        let err = traverse("var a = 1;", "{ NumericLiteral(path) { path.remove(); } }").unwrap_err();
        assert_eq!(err, "Cannot remove the NumericLiteral in VariableDeclarator.init");
        let err = traverse("a;", "{ Program(path) { path.remove(); } }").unwrap_err();
        assert_eq!(err, "Cannot remove the Program node");
    }

    #[test]
    fn test_replace_with_source_string() {
        let (out, log) = traverse(
            "const x = a + b;",
            "{ BinaryExpression(path) { path.replaceWithSourceString('sum(a, b)'); log.push(path.type); },
               Identifier(path) { log.push(path.node.name); } }",
        )
        .unwrap();
        assert_eq!(out, "const x = sum(a, b);");
        // The replacement's children are visited; it is not revisited itself.
        assert_eq!(log, "x,CallExpression,sum,a,b");
    }

    #[test]
    fn test_replace_statement_position() {
        let (out, _) = traverse(
            "if (x) {}",
            "{ IfStatement(path) { path.replaceWithSourceString('noop()'); } }",
        )
        .unwrap();
        assert_eq!(out, "noop();");
        let err = traverse("a;", "{ Identifier(path) { path.replaceWithSourceString('1 +'); } }").unwrap_err();
        assert!(err.starts_with("replaceWithSourceString: "), "{err}");
    }

    #[test]
    fn test_skip_and_stop() {
        let (_, log) = traverse(
            "f(a); g(b);",
            "{ CallExpression(path) { if (path.node.callee.name === 'f') path.skip(); },
               Identifier(path) { log.push(path.node.name); if (path.node.name === 'g') path.stop(); } }",
        )
        .unwrap();
        assert_eq!(log, "g");
    }

    #[test]
    fn test_is_checks() {
        let (_, log) = traverse(
            "x = 1;",
            "{ AssignmentExpression(path) {
                 log.push(path.isExpression(), path.isStatement(), path.isAssignmentExpression({ operator: '=' }));
                 log.push(typeof path.isNotAType);
               } }",
        )
        .unwrap();
        assert_eq!(log, "true,false,true,undefined");
    }

    #[test]
    fn test_non_scalar_assignment_is_rejected() {
        let err = traverse("a;", "{ Identifier(path) { path.node.name = {}; } }").unwrap_err();
        assert!(err.contains("replaceWithSourceString"), "{err}");
        let err = traverse("var a;", "{ VariableDeclaration(path) { path.node.kind = 'nope'; } }").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_node_json() {
        let ast = parse("a;", ParserOptions::default()).unwrap();
        let json = node_to_json(NodeRef::stmt(&ast.program.body[0]));
        assert_eq!(
            json.to_string(),
            r#"{"type":"ExpressionStatement","start":0,"end":2,"expression":{"type":"Identifier","start":0,"end":1,"name":"a"}}"#
        );
    }
}
