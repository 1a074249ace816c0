//! Tree-walking interpreter for the JavaScript subset transform code is
//! written in.
//!
//! Statements and calls are counted against the `Budget`; the wall clock is
//! checked every 1024 steps. Functions are closures over `Rc` scopes, and
//! their code is cloned once per function literal and shared afterwards.

use super::value::{
    array_index, AssignError, Closure, Env, FunctionBody, FunctionCode, NativeKind, Object,
    RegExpValue, Scope, Value,
};
use super::Budget;
use astplay_parser::{
    ArrowBody, ArrowFunction, AssignOp, BinaryOp, Block, Expr, ExprKind, ForHead, ForInit,
    Function, LogicalOp, MemberProp, Pattern, PatternKind, PatternProp, Program, PropertyKey,
    PropertyKind, Span, Stmt, StmtKind, Template, UnaryOp, UpdateOp, VarDecl, VarKind,
};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use std::time::Instant;

/// Error raised while evaluating transform code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    /// A `throw`n value.
    #[error("{}", thrown_message(.0))]
    Thrown(Value),
    /// A `TypeError` raised by the interpreter.
    #[error("{0}")]
    Type(String),
    /// A `ReferenceError` raised by the interpreter.
    #[error("{0}")]
    Reference(String),
    /// The budget ran out. Cannot be caught.
    #[error("{0}")]
    Budget(String),
    /// The plugin is malformed. Cannot be caught.
    #[error("{0}")]
    Plugin(String),
}

impl EvalError {
    /// A thrown `Error` with `message`.
    pub fn error(message: impl AsRef<str>) -> Self {
        EvalError::Thrown(Value::error("Error", message.as_ref()))
    }

    pub fn syntax(message: impl AsRef<str>) -> Self {
        EvalError::Thrown(Value::error("SyntaxError", message.as_ref()))
    }

    /// Whether `try`/`catch` sees this error.
    pub fn catchable(&self) -> bool {
        matches!(
            self,
            EvalError::Thrown(_) | EvalError::Type(_) | EvalError::Reference(_)
        )
    }

    /// The value a `catch` clause binds.
    pub fn into_value(self) -> Value {
        match self {
            EvalError::Thrown(value) => value,
            EvalError::Type(message) => Value::error("TypeError", &message),
            EvalError::Reference(message) => Value::error("ReferenceError", &message),
            EvalError::Budget(message) | EvalError::Plugin(message) => Value::error("Error", &message),
        }
    }
}

fn thrown_message(value: &Value) -> String {
    if let Value::Object(object) = value {
        if let Some(message) = object.borrow().get("message") {
            return message.to_js_string();
        }
    }
    value.to_js_string()
}

pub type EvalResult<T> = Result<T, EvalError>;

/// How a statement finished.
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(Value),
    Break(Option<Rc<str>>),
    Continue(Option<Rc<str>>),
}

/// How a binding is introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bind {
    Var,
    Let,
    Const,
    Param,
    /// Plain assignment to existing bindings and members.
    Assign,
}

impl From<VarKind> for Bind {
    fn from(kind: VarKind) -> Self {
        match kind {
            VarKind::Var => Bind::Var,
            VarKind::Let => Bind::Let,
            VarKind::Const => Bind::Const,
        }
    }
}

/// Outcome of one loop body run.
fn loop_exit(completion: Completion, label: Option<&str>) -> Option<Completion> {
    match completion {
        Completion::Normal | Completion::Continue(None) => None,
        Completion::Continue(Some(l)) if Some(&*l) == label => None,
        Completion::Break(None) => Some(Completion::Normal),
        Completion::Break(Some(l)) if Some(&*l) == label => Some(Completion::Normal),
        other => Some(other),
    }
}

/// Upper bound for arrays grown by index assignment and for built strings.
pub(super) const MAX_COLLECTION_LEN: usize = 1 << 24;

pub struct Interpreter {
    pub(super) global: Env,
    budget: Budget,
    steps: u64,
    depth: usize,
    started: Instant,
    code: FxHashMap<Span, Rc<FunctionCode>>,
    /// The AST being transformed, if any.
    pub(super) target: Option<Program>,
    /// Set by `path.stop()`.
    pub(super) stopped: bool,
}

impl Interpreter {
    pub fn new(budget: Budget) -> Self {
        let global = Scope::global();
        super::builtins::install_globals(&global);
        Self {
            global,
            budget,
            steps: 0,
            depth: 0,
            started: Instant::now(),
            code: FxHashMap::default(),
            target: None,
            stopped: false,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(super) fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.budget.max_steps {
            return Err(EvalError::Budget(format!(
                "transform exceeded its execution budget of {} steps",
                self.budget.max_steps
            )));
        }
        if self.steps % 1024 == 0 && self.started.elapsed() > self.budget.time_limit {
            return Err(EvalError::Budget(format!(
                "transform exceeded its execution budget of {} ms",
                self.budget.time_limit.as_millis()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Run a statement list in `env`, hoisting function declarations first.
    pub(super) fn exec_stmts(&mut self, stmts: &[Stmt], env: &Env) -> EvalResult<Completion> {
        self.hoist(stmts, env);
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&mut self, block: &Block, env: &Env) -> EvalResult<Completion> {
        let scope = Scope::block(env);
        self.exec_stmts(&block.body, &scope)
    }

    pub(super) fn hoist(&mut self, stmts: &[Stmt], env: &Env) {
        for stmt in stmts {
            let function = match &stmt.kind {
                StmtKind::Function(function) => function,
                StmtKind::ExportNamed(export) => match export.declaration.as_deref() {
                    Some(Stmt {
                        kind: StmtKind::Function(function),
                        ..
                    }) => function,
                    _ => continue,
                },
                _ => continue,
            };
            if let Some(id) = &function.id {
                let closure = self.function_closure(function, env);
                env.declare(&id.name, closure, true);
            }
        }
    }

    pub(super) fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<Completion> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Var(decl) => {
                self.exec_var_decl(decl, env)?;
                Ok(Completion::Normal)
            }
            // Hoisted.
            StmtKind::Function(_) | StmtKind::Empty | StmtKind::Debugger => Ok(Completion::Normal),
            StmtKind::Class(_) => Err(unsupported("Classes")),
            StmtKind::Block(block) => self.exec_block(block, env),
            StmtKind::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Completion::Normal)
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.exec_stmt(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, env)?;
                let scope = Scope::block(env);
                for case in cases {
                    self.hoist(&case.consequent, &scope);
                }
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, &scope)?.strict_eq(&value) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
                let Some(start) = start else {
                    return Ok(Completion::Normal);
                };
                for case in &cases[start..] {
                    for stmt in &case.consequent {
                        match self.exec_stmt(stmt, &scope)? {
                            Completion::Normal => {}
                            Completion::Break(None) => return Ok(Completion::Normal),
                            abrupt => return Ok(abrupt),
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::For { .. }
            | StmtKind::ForIn { .. }
            | StmtKind::ForOf { .. }
            | StmtKind::While { .. }
            | StmtKind::DoWhile { .. } => self.exec_loop(stmt, env, None),
            StmtKind::Break { label } => Ok(Completion::Break(
                label.as_ref().map(|l| Rc::from(l.name.as_str())),
            )),
            StmtKind::Continue { label } => Ok(Completion::Continue(
                label.as_ref().map(|l| Rc::from(l.name.as_str())),
            )),
            StmtKind::Return { argument } => {
                let value = match argument {
                    Some(argument) => self.eval(argument, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Throw { argument } => Err(EvalError::Thrown(self.eval(argument, env)?)),
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_block(block, env);
                if let Some(handler) = handler {
                    match result {
                        Err(err) if err.catchable() => {
                            let scope = Scope::block(env);
                            result = match &handler.param {
                                Some(param) => self
                                    .bind_pattern(param, err.into_value(), &scope, Bind::Let)
                                    .and_then(|()| self.exec_stmts(&handler.body.body, &scope)),
                                None => self.exec_stmts(&handler.body.body, &scope),
                            };
                        }
                        other => result = other,
                    }
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_block(finalizer, env)? {
                        Completion::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                result
            }
            StmtKind::Labeled { label, body } => {
                let completion = match &body.kind {
                    StmtKind::For { .. }
                    | StmtKind::ForIn { .. }
                    | StmtKind::ForOf { .. }
                    | StmtKind::While { .. }
                    | StmtKind::DoWhile { .. } => self.exec_loop(body, env, Some(&label.name))?,
                    _ => self.exec_stmt(body, env)?,
                };
                match completion {
                    Completion::Break(Some(l)) if *l == *label.name => Ok(Completion::Normal),
                    other => Ok(other),
                }
            }
            StmtKind::Import(_)
            | StmtKind::ExportNamed(_)
            | StmtKind::ExportDefault(_)
            | StmtKind::ExportAll(_) => Err(EvalError::Plugin(
                "import and export are only allowed at the top level".to_string(),
            )),
        }
    }

    fn exec_loop(&mut self, stmt: &Stmt, env: &Env, label: Option<&str>) -> EvalResult<Completion> {
        match &stmt.kind {
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let mut scope = Scope::block(env);
                let per_iteration = matches!(init, Some(ForInit::Var(decl)) if decl.kind != VarKind::Var);
                match init {
                    Some(ForInit::Var(decl)) => self.exec_var_decl(decl, &scope)?,
                    Some(ForInit::Expr(expr)) => {
                        self.eval(expr, &scope)?;
                    }
                    None => {}
                }
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        if !self.eval(test, &scope)?.truthy() {
                            break;
                        }
                    }
                    let completion = self.exec_stmt(body, &scope)?;
                    if let Some(done) = loop_exit(completion, label) {
                        return Ok(done);
                    }
                    if per_iteration {
                        scope = scope.fork();
                    }
                    if let Some(update) = update {
                        self.eval(update, &scope)?;
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::ForIn { left, right, body } => {
                let object = self.eval(right, env)?;
                let keys: Vec<Value> = self
                    .own_keys(&object)?
                    .into_iter()
                    .map(Value::String)
                    .collect();
                self.run_for_each(left, keys, body, env, label)
            }
            StmtKind::ForOf {
                left,
                right,
                body,
                is_await,
            } => {
                if *is_await {
                    return Err(unsupported("for await loops"));
                }
                let iterable = self.eval(right, env)?;
                let items = self.iterate(&iterable)?;
                self.run_for_each(left, items, body, env, label)
            }
            StmtKind::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                    let completion = self.exec_stmt(body, env)?;
                    if let Some(done) = loop_exit(completion, label) {
                        return Ok(done);
                    }
                }
                Ok(Completion::Normal)
            }
            StmtKind::DoWhile { body, test } => {
                loop {
                    self.tick()?;
                    let completion = self.exec_stmt(body, env)?;
                    if let Some(done) = loop_exit(completion, label) {
                        return Ok(done);
                    }
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            _ => self.exec_stmt(stmt, env),
        }
    }

    fn run_for_each(
        &mut self,
        head: &ForHead,
        items: Vec<Value>,
        body: &Stmt,
        env: &Env,
        label: Option<&str>,
    ) -> EvalResult<Completion> {
        for item in items {
            self.tick()?;
            let scope = Scope::block(env);
            match head {
                ForHead::Var(decl) => {
                    if let Some(declarator) = decl.declarations.first() {
                        self.bind_pattern(&declarator.id, item, &scope, decl.kind.into())?;
                    }
                }
                ForHead::Pattern(pattern) => self.bind_pattern(pattern, item, &scope, Bind::Assign)?,
            }
            let completion = self.exec_stmt(body, &scope)?;
            if let Some(done) = loop_exit(completion, label) {
                return Ok(done);
            }
        }
        Ok(Completion::Normal)
    }

    pub(super) fn exec_var_decl(&mut self, decl: &VarDecl, env: &Env) -> EvalResult<()> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval(init, env)?,
                None => {
                    if decl.kind == VarKind::Var {
                        if let PatternKind::Ident(id) = &declarator.id.kind {
                            if env.var_scope().has_own(&id.name) {
                                continue;
                            }
                        }
                    }
                    Value::Undefined
                }
            };
            self.bind_pattern(&declarator.id, value, env, decl.kind.into())?;
        }
        Ok(())
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    fn bind_name(&mut self, name: &str, value: Value, env: &Env, mode: Bind) -> EvalResult<()> {
        match mode {
            Bind::Var => env.var_scope().declare(name, value, true),
            Bind::Let | Bind::Param => env.declare(name, value, true),
            Bind::Const => env.declare(name, value, false),
            Bind::Assign => {
                return env.assign(name, value).map_err(|err| match err {
                    AssignError::Constant => {
                        EvalError::Type("Assignment to constant variable.".to_string())
                    }
                    AssignError::Undeclared => EvalError::Reference(format!("{name} is not defined")),
                })
            }
        }
        Ok(())
    }

    /// Bind or assign `value` through a (possibly destructuring) pattern.
    pub(super) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        env: &Env,
        mode: Bind,
    ) -> EvalResult<()> {
        match &pattern.kind {
            PatternKind::Ident(id) => self.bind_name(&id.name, value, env, mode),
            PatternKind::Array(elements) => {
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        None => {}
                        Some(Pattern {
                            kind: PatternKind::Rest(inner),
                            ..
                        }) => {
                            let rest = items.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                            self.bind_pattern(inner, Value::array(rest), env, mode)?;
                        }
                        Some(element) => {
                            let item = items.get(index).cloned().unwrap_or(Value::Undefined);
                            self.bind_pattern(element, item, env, mode)?;
                        }
                    }
                }
                Ok(())
            }
            PatternKind::Object(props) => {
                if value.is_nullish() {
                    return Err(EvalError::Type(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_js_string(),
                        value.to_js_string()
                    )));
                }
                let mut used = Vec::new();
                for prop in props {
                    match prop {
                        PatternProp::Prop { key, value: target, .. } => {
                            let key = self.property_key(key, env)?;
                            let item = self.get_property(&value, &Value::string(key.as_str()))?;
                            used.push(key);
                            self.bind_pattern(target, item, env, mode)?;
                        }
                        PatternProp::Rest(rest) => {
                            let mut remaining = Object::new();
                            for key in self.own_keys(&value)? {
                                if used.iter().any(|u| **u == *key) {
                                    continue;
                                }
                                let item = self.get_property(&value, &Value::String(Rc::clone(&key)))?;
                                remaining.set(&key, item);
                            }
                            let target = match &rest.kind {
                                PatternKind::Rest(inner) => inner.as_ref(),
                                _ => rest,
                            };
                            self.bind_pattern(target, Value::object(remaining), env, mode)?;
                        }
                    }
                }
                Ok(())
            }
            PatternKind::Assign { left, right } => {
                let value = match value {
                    Value::Undefined => self.eval(right, env)?,
                    value => value,
                };
                self.bind_pattern(left, value, env, mode)
            }
            PatternKind::Rest(inner) => self.bind_pattern(inner, value, env, mode),
            PatternKind::Expr(target) => self.assign_to_expr(target, value, env),
        }
    }

    fn assign_to_expr(&mut self, target: &Expr, value: Value, env: &Env) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Ident(id) => self.bind_name(&id.name, value, env, Bind::Assign),
            ExprKind::Member {
                object, property, ..
            } => {
                let object = self.eval(object, env)?;
                let key = self.member_key(property, env)?;
                self.set_property(&object, &key, value)
            }
            _ => Err(EvalError::Type("Invalid assignment target".to_string())),
        }
    }

    /// Current value of a simple assignment target.
    fn read_target(&mut self, target: &Pattern, env: &Env) -> EvalResult<Value> {
        match &target.kind {
            PatternKind::Ident(id) => self.lookup(&id.name, env),
            PatternKind::Expr(expr) => self.eval(expr, env),
            _ => Err(EvalError::Type("Invalid left-hand side in assignment".to_string())),
        }
    }

    pub(super) fn lookup(&self, name: &str, env: &Env) -> EvalResult<Value> {
        env.lookup(name)
            .ok_or_else(|| EvalError::Reference(format!("{name} is not defined")))
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn shared_code(&mut self, span: Span, make: impl FnOnce() -> FunctionCode) -> Rc<FunctionCode> {
        Rc::clone(self.code.entry(span).or_insert_with(|| Rc::new(make())))
    }

    pub(super) fn function_closure(&mut self, function: &Function, env: &Env) -> Value {
        let code = self.shared_code(function.span, || FunctionCode {
            params: function.params.clone(),
            body: FunctionBody::Block(function.body.clone()),
            is_arrow: false,
            is_async: function.is_async,
            is_generator: function.is_generator,
        });
        let name = function
            .id
            .as_ref()
            .map_or_else(|| Rc::from("anonymous"), |id| Rc::from(id.name.as_str()));
        Value::Function(Rc::new(Closure {
            name,
            code,
            env: Rc::clone(env),
        }))
    }

    fn arrow_closure(&mut self, arrow: &ArrowFunction, env: &Env) -> Value {
        let code = self.shared_code(arrow.span, || FunctionCode {
            params: arrow.params.clone(),
            body: match &arrow.body {
                ArrowBody::Expr(expr) => FunctionBody::Expr(expr.as_ref().clone()),
                ArrowBody::Block(block) => FunctionBody::Block(block.clone()),
            },
            is_arrow: true,
            is_async: arrow.is_async,
            is_generator: false,
        });
        Value::Function(Rc::new(Closure {
            name: Rc::from("anonymous"),
            code,
            env: Rc::clone(env),
        }))
    }

    /// Call any callable value.
    pub fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(closure) => {
                self.depth += 1;
                let result = if self.depth > self.budget.max_call_depth {
                    Err(EvalError::Budget("Maximum call stack size exceeded".to_string()))
                } else {
                    self.call_closure(closure, this, args)
                };
                self.depth -= 1;
                result
            }
            Value::Native(native) => {
                let native = Rc::clone(native);
                self.call_native(&native, args)
            }
            other => Err(EvalError::Type(format!(
                "{} is not a function",
                other.to_js_string()
            ))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        self.tick()?;
        let code = Rc::clone(&closure.code);
        if code.is_async || code.is_generator {
            return Err(unsupported("Async functions and generators"));
        }
        let scope = if code.is_arrow {
            Scope::function(&closure.env, None)
        } else {
            let scope = Scope::function(&closure.env, Some(this));
            scope.declare("arguments", Value::array(args.clone()), true);
            scope
        };
        for (index, param) in code.params.iter().enumerate() {
            match &param.kind {
                PatternKind::Rest(inner) => {
                    let rest = args.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(inner, Value::array(rest), &scope, Bind::Param)?;
                }
                _ => {
                    let arg = args.get(index).cloned().unwrap_or(Value::Undefined);
                    self.bind_pattern(param, arg, &scope, Bind::Param)?;
                }
            }
        }
        match &code.body {
            FunctionBody::Block(block) => match self.exec_stmts(&block.body, &scope)? {
                Completion::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        }
    }

    /// `new callee(...args)`
    fn construct(&mut self, callee: &Value, args: Vec<Value>, describe: &str) -> EvalResult<Value> {
        match callee {
            Value::Native(native) if matches!(native.kind, NativeKind::Global(_)) => {
                let native = Rc::clone(native);
                self.construct_native(&native, args)
                    .unwrap_or_else(|| Err(EvalError::Type(format!("{describe} is not a constructor"))))
            }
            Value::Function(closure) if !closure.code.is_arrow => {
                let this = Value::object(Object::new());
                let result = self.call(callee, this.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) => result,
                    _ => this,
                })
            }
            _ => Err(EvalError::Type(format!("{describe} is not a constructor"))),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::BigInt(digits) => Ok(Value::Number(digits.parse().unwrap_or(f64::NAN))),
            ExprKind::String(s) => Ok(Value::string(s.as_str())),
            ExprKind::Regex { pattern, flags } => RegExpValue::new(pattern, flags)
                .map(|re| Value::RegExp(Rc::new(re)))
                .map_err(EvalError::syntax),
            ExprKind::Template(template) => self.eval_template(template, env).map(Value::from),
            ExprKind::TaggedTemplate { tag, quasi } => {
                let (function, this) = match self.eval_callee(tag, env)? {
                    Some(pair) => pair,
                    None => return Ok(Value::Undefined),
                };
                let strings = quasi
                    .quasis
                    .iter()
                    .map(|q| Value::string(q.cooked.as_str()))
                    .collect();
                let mut args = vec![Value::array(strings)];
                for expr in &quasi.expressions {
                    args.push(self.eval(expr, env)?);
                }
                self.call_checked(&function, this, args, tag)
            }
            ExprKind::Ident(id) => self.lookup(&id.name, env),
            ExprKind::This => Ok(env.this()),
            ExprKind::Super => Err(unsupported("'super' expressions")),
            ExprKind::Import => Err(unsupported("Dynamic imports")),
            ExprKind::MetaProperty { .. } => Ok(Value::Undefined),
            ExprKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        None => items.push(Value::Undefined),
                        Some(Expr {
                            kind: ExprKind::Spread(inner),
                            ..
                        }) => {
                            let value = self.eval(inner, env)?;
                            items.extend(self.iterate(&value)?);
                        }
                        Some(element) => items.push(self.eval(element, env)?),
                    }
                }
                Ok(Value::array(items))
            }
            ExprKind::Object(props) => {
                let mut object = Object::new();
                for prop in props {
                    match &prop.kind {
                        PropertyKind::Init { key, value, .. } => {
                            let key = self.property_key(key, env)?;
                            let value = self.eval(value, env)?;
                            object.set(&key, value);
                        }
                        PropertyKind::Method {
                            key,
                            kind,
                            function,
                        } => {
                            if matches!(
                                kind,
                                astplay_parser::MethodKind::Get | astplay_parser::MethodKind::Set
                            ) {
                                return Err(unsupported("Getters and setters"));
                            }
                            let key = self.property_key(key, env)?;
                            let method = self.function_closure(function, env);
                            let method = match method {
                                Value::Function(closure) => Value::Function(Rc::new(Closure {
                                    name: Rc::from(key.as_str()),
                                    code: Rc::clone(&closure.code),
                                    env: Rc::clone(&closure.env),
                                })),
                                other => other,
                            };
                            object.set(&key, method);
                        }
                        PropertyKind::Spread(expr) => {
                            let source = self.eval(expr, env)?;
                            for key in self.own_keys(&source)? {
                                let value = self.get_property(&source, &Value::String(Rc::clone(&key)))?;
                                object.set(&key, value);
                            }
                        }
                    }
                }
                Ok(Value::object(object))
            }
            ExprKind::Function(function) => Ok(self.function_closure(function, env)),
            ExprKind::Arrow(arrow) => Ok(self.arrow_closure(arrow, env)),
            ExprKind::Class(_) => Err(unsupported("Classes")),
            ExprKind::Unary { op, argument } => self.eval_unary(*op, argument, env),
            ExprKind::Update {
                op,
                prefix,
                argument,
            } => {
                let target = match &argument.kind {
                    ExprKind::Ident(_) | ExprKind::Member { .. } => argument.as_ref(),
                    _ => {
                        return Err(EvalError::syntax(
                            "Invalid left-hand side expression in update operation",
                        ))
                    }
                };
                let old = self.eval(target, env)?.to_number();
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign_to_expr(target, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            ExprKind::Assign { op, left, right } => self.eval_assign(*op, left, right, env),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            ExprKind::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
            ExprKind::Member { .. } | ExprKind::Call { .. } => {
                Ok(self.eval_chain(expr, env)?.unwrap_or(Value::Undefined))
            }
            ExprKind::New { callee, arguments } => {
                let function = self.eval(callee, env)?;
                let args = self.eval_args(arguments, env)?;
                self.construct(&function, args, &describe(callee))
            }
            ExprKind::Spread(_) => Err(EvalError::syntax("Unexpected spread element")),
            ExprKind::Yield { .. } | ExprKind::Await(_) => {
                Err(unsupported("Async functions and generators"))
            }
        }
    }

    fn eval_template(&mut self, template: &Template, env: &Env) -> EvalResult<String> {
        let mut out = String::new();
        for (index, quasi) in template.quasis.iter().enumerate() {
            out.push_str(&quasi.cooked);
            if let Some(expr) = template.expressions.get(index) {
                out.push_str(&self.eval(expr, env)?.to_js_string());
            }
        }
        Ok(out)
    }

    /// Evaluate a member/call chain. `None` when an optional link
    /// short-circuited.
    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> EvalResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, env)?;
                self.get_property(&object, &key).map(Some)
            }
            ExprKind::Call {
                callee,
                arguments,
                optional,
            } => {
                let Some((function, this)) = self.eval_callee(callee, env)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(arguments, env)?;
                self.call_checked(&function, this, args, callee).map(Some)
            }
            _ => self.eval(expr, env).map(Some),
        }
    }

    /// The function and `this` of a call.
    fn eval_callee(&mut self, callee: &Expr, env: &Env) -> EvalResult<Option<(Value, Value)>> {
        match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, env)?;
                let function = self.get_property(&object, &key)?;
                Ok(Some((function, object)))
            }
            _ => Ok(self.eval_chain(callee, env)?.map(|f| (f, Value::Undefined))),
        }
    }

    fn call_checked(
        &mut self,
        function: &Value,
        this: Value,
        args: Vec<Value>,
        callee: &Expr,
    ) -> EvalResult<Value> {
        if !function.is_callable() {
            return Err(EvalError::Type(format!("{} is not a function", describe(callee))));
        }
        self.call(function, this, args)
    }

    fn eval_args(&mut self, arguments: &[Expr], env: &Env) -> EvalResult<Vec<Value>> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match &argument.kind {
                ExprKind::Spread(inner) => {
                    let value = self.eval(inner, env)?;
                    args.extend(self.iterate(&value)?);
                }
                _ => args.push(self.eval(argument, env)?),
            }
        }
        Ok(args)
    }

    fn member_key(&mut self, property: &MemberProp, env: &Env) -> EvalResult<Value> {
        match property {
            MemberProp::Ident(id) => Ok(Value::string(id.name.as_str())),
            MemberProp::Computed(expr) => self.eval(expr, env),
        }
    }

    fn property_key(&mut self, key: &PropertyKey, env: &Env) -> EvalResult<String> {
        match key {
            PropertyKey::Computed(expr) => Ok(self.eval(expr, env)?.to_js_string()),
            PropertyKey::Literal(Expr {
                kind: ExprKind::Number(n),
                ..
            }) => Ok(astplay_parser::format_number(*n)),
            other => Ok(other.static_name().unwrap_or_default()),
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, argument: &Expr, env: &Env) -> EvalResult<Value> {
        match op {
            UnaryOp::Typeof => {
                if let ExprKind::Ident(id) = &argument.kind {
                    if env.lookup(&id.name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                Ok(Value::string(self.eval(argument, env)?.type_of()))
            }
            UnaryOp::Delete => match &argument.kind {
                ExprKind::Member {
                    object, property, ..
                } => {
                    let object = self.eval(object, env)?;
                    let key = self.member_key(property, env)?.to_js_string();
                    match &object {
                        Value::Object(o) => {
                            o.borrow_mut().remove(&key);
                            Ok(Value::Bool(true))
                        }
                        Value::Node(_) => Err(EvalError::error(format!(
                            "Cannot delete node property '{key}'; use path.remove()"
                        ))),
                        _ => Ok(Value::Bool(true)),
                    }
                }
                _ => Ok(Value::Bool(true)),
            },
            _ => {
                let value = self.eval(argument, env)?;
                Ok(match op {
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
                    UnaryOp::Void | UnaryOp::Typeof | UnaryOp::Delete => Value::Undefined,
                })
            }
        }
    }

    fn eval_assign(&mut self, op: AssignOp, left: &Pattern, right: &Expr, env: &Env) -> EvalResult<Value> {
        let binary = match op {
            AssignOp::Assign => {
                let value = self.eval(right, env)?;
                self.bind_pattern(left, value.clone(), env, Bind::Assign)?;
                return Ok(value);
            }
            AssignOp::AndAssign | AssignOp::OrAssign | AssignOp::NullishAssign => {
                let current = self.read_target(left, env)?;
                let keep = match op {
                    AssignOp::AndAssign => !current.truthy(),
                    AssignOp::OrAssign => current.truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                let value = self.eval(right, env)?;
                self.bind_pattern(left, value.clone(), env, Bind::Assign)?;
                return Ok(value);
            }
            AssignOp::AddAssign => BinaryOp::Add,
            AssignOp::SubAssign => BinaryOp::Sub,
            AssignOp::MulAssign => BinaryOp::Mul,
            AssignOp::DivAssign => BinaryOp::Div,
            AssignOp::ModAssign => BinaryOp::Mod,
            AssignOp::PowAssign => BinaryOp::Pow,
            AssignOp::ShlAssign => BinaryOp::Shl,
            AssignOp::ShrAssign => BinaryOp::Shr,
            AssignOp::UShrAssign => BinaryOp::UShr,
            AssignOp::BitOrAssign => BinaryOp::BitOr,
            AssignOp::BitXorAssign => BinaryOp::BitXor,
            AssignOp::BitAndAssign => BinaryOp::BitAnd,
        };
        let current = self.read_target(left, env)?;
        let right = self.eval(right, env)?;
        let value = self.binary(binary, &current, &right)?;
        self.bind_pattern(left, value.clone(), env, Bind::Assign)?;
        Ok(value)
    }

    fn binary(&mut self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        let number = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
        let int = |f: fn(i32, i32) -> i32| {
            Value::Number(f64::from(f(to_int32(left.to_number()), to_int32(right.to_number()))))
        };
        Ok(match op {
            BinaryOp::Add => {
                let numeric = |v: &Value| {
                    matches!(
                        v,
                        Value::Number(_) | Value::Bool(_) | Value::Null | Value::Undefined
                    )
                };
                if numeric(left) && numeric(right) {
                    Value::Number(left.to_number() + right.to_number())
                } else {
                    let text = left.to_js_string() + &right.to_js_string();
                    if text.len() > MAX_COLLECTION_LEN {
                        return Err(EvalError::Type("Invalid string length".to_string()));
                    }
                    Value::from(text)
                }
            }
            BinaryOp::Sub => number(|a, b| a - b),
            BinaryOp::Mul => number(|a, b| a * b),
            BinaryOp::Div => number(|a, b| a / b),
            BinaryOp::Mod => number(|a, b| a % b),
            BinaryOp::Pow => number(f64::powf),
            BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
            BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
            BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
            BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = match (left, right) {
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => left.to_number().partial_cmp(&right.to_number()),
                };
                Value::Bool(ordering.is_some_and(|ordering| match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::LtEq => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Shl => int(|a, b| a.wrapping_shl(b as u32 & 31)),
            BinaryOp::Shr => int(|a, b| a.wrapping_shr(b as u32 & 31)),
            BinaryOp::UShr => {
                let a = to_int32(left.to_number()) as u32;
                let b = to_int32(right.to_number()) as u32 & 31;
                Value::Number(f64::from(a >> b))
            }
            BinaryOp::BitOr => int(|a, b| a | b),
            BinaryOp::BitXor => int(|a, b| a ^ b),
            BinaryOp::BitAnd => int(|a, b| a & b),
            BinaryOp::In => {
                let key = left.to_js_string();
                Value::Bool(match right {
                    Value::Object(object) => object.borrow().contains(&key),
                    Value::Array(items) => {
                        key == "length" || array_index(left).is_some_and(|i| i < items.borrow().len())
                    }
                    Value::Node(_) | Value::Path(_) => {
                        !matches!(self.get_property(right, left)?, Value::Undefined)
                    }
                    other => {
                        return Err(EvalError::Type(format!(
                            "Cannot use 'in' operator to search for '{key}' in {}",
                            other.to_js_string()
                        )))
                    }
                })
            }
            BinaryOp::Instanceof => Value::Bool(self.instance_of(left, right)?),
        })
    }

    fn instance_of(&self, value: &Value, class: &Value) -> EvalResult<bool> {
        match class {
            Value::Native(native) => match native.kind {
                NativeKind::Global(name) if name.ends_with("Error") => Ok(match value {
                    Value::Object(object) => {
                        let object = object.borrow();
                        object.class == super::value::ObjectClass::Error
                            && (name == "Error"
                                || object.get("name").is_some_and(|n| n.to_js_string() == name))
                    }
                    _ => false,
                }),
                _ => Ok(false),
            },
            Value::Function(_) => Ok(false),
            _ => Err(EvalError::Type(
                "Right-hand side of 'instanceof' is not callable".to_string(),
            )),
        }
    }

    /// Values produced by iterating `value` (`for...of`, spreads, array
    /// destructuring).
    pub(super) fn iterate(&self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::Array(items) => Ok(items.borrow().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            other => Err(EvalError::Type(format!(
                "{} is not iterable",
                match other {
                    Value::Undefined | Value::Null => other.to_js_string(),
                    _ => other.type_of().to_string(),
                }
            ))),
        }
    }

    pub(super) fn own_keys(&self, value: &Value) -> EvalResult<Vec<Rc<str>>> {
        match value {
            Value::Node(handle) => Ok(self
                .node_keys(handle)?
                .into_iter()
                .map(Rc::from)
                .collect()),
            other => Ok(other.own_keys()),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn get_property(&mut self, object: &Value, key: &Value) -> EvalResult<Value> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::Type(format!(
                "Cannot read properties of {} (reading '{}')",
                object.to_js_string(),
                key.to_js_string()
            ))),
            Value::Node(handle) => {
                let handle = Rc::clone(handle);
                self.get_node_property(&handle, &key.to_js_string())
            }
            Value::Path(path) => {
                let path = Rc::clone(path);
                self.get_path_property(&path, &key.to_js_string())
            }
            _ => Ok(super::builtins::get_builtin_property(object, key)),
        }
    }

    pub fn set_property(&mut self, object: &Value, key: &Value, value: Value) -> EvalResult<()> {
        match object {
            Value::Object(o) => {
                o.borrow_mut().set(&key.to_js_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if let Some(index) = array_index(key) {
                    if index >= MAX_COLLECTION_LEN {
                        return Err(EvalError::Type("Invalid array length".to_string()));
                    }
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                } else if key.to_js_string() == "length" {
                    let length = array_index(&value)
                        .filter(|len| *len < MAX_COLLECTION_LEN)
                        .ok_or_else(|| EvalError::Type("Invalid array length".to_string()))?;
                    items.resize(length, Value::Undefined);
                }
                Ok(())
            }
            Value::Node(handle) => {
                let handle = Rc::clone(handle);
                self.set_node_property(&handle, &key.to_js_string(), &value)
            }
            Value::Path(_) => Err(EvalError::error(format!(
                "Cannot assign to path.{}",
                key.to_js_string()
            ))),
            Value::Undefined | Value::Null => Err(EvalError::Type(format!(
                "Cannot set properties of {} (setting '{}')",
                object.to_js_string(),
                key.to_js_string()
            ))),
            _ => Ok(()),
        }
    }
}

fn unsupported(what: &str) -> EvalError {
    EvalError::Type(format!("{what} are not supported in transform code"))
}

/// Source-like name of a callee for error messages: `a.b.c`.
fn describe(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(id) => id.name.clone(),
        ExprKind::This => "this".to_string(),
        ExprKind::Member {
            object,
            property: MemberProp::Ident(id),
            ..
        } => format!("{}.{}", describe(object), id.name),
        ExprKind::Member {
            object,
            property: MemberProp::Computed(_),
            ..
        } => format!("{}[...]", describe(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

/// ECMAScript `ToInt32`.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let wrapped = n.trunc() % 4_294_967_296.0;
    (wrapped as i64) as u32 as i32
}

#[cfg(test)]
mod tests {
    use super::super::on_large_stack;
    use super::*;
    use astplay_parser::{parse, ParserOptions};

    /// Run `source` as a script and return `String(result)`, or the error.
    /// Budget errors are prefixed with `budget: `.
    fn run(source: &str, budget: Budget) -> Result<String, String> {
        let source = source.to_string();
        on_large_stack(move || {
            let ast = parse(&source, ParserOptions::default()).map_err(|e| e.to_string())?;
            let mut interp = Interpreter::new(budget);
            let global = Rc::clone(&interp.global);
            let outcome = interp
                .exec_stmts(&ast.program.body, &global)
                .and_then(|_| interp.lookup("result", &global));
            match outcome {
                Ok(value) => Ok(value.to_js_string()),
                Err(EvalError::Budget(message)) => Err(format!("budget: {message}")),
                Err(err) => Err(err.to_string()),
            }
        })
        .unwrap()
    }

    fn eval_str(source: &str) -> String {
        run(source, Budget::default()).unwrap_or_else(|err| format!("error: {err}"))
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval_str("let result = 1 + 2 * 3 - 4 / 2;"), "5");
        assert_eq!(eval_str("let result = 'a' + 1 + 2;"), "a12");
        assert_eq!(eval_str("let result = 2 ** 10 % 1000;"), "24");
        assert_eq!(eval_str("let result = `x=${1 + 1}!`;"), "x=2!");
        assert_eq!(eval_str("let result = -7 >> 1;"), "-4");
        assert_eq!(eval_str("let result = -1 >>> 28;"), "15");
        assert_eq!(eval_str("let result = typeof nope + typeof 1;"), "undefinednumber");
    }

    #[test]
    fn test_closures_and_loops() {
        let source = "
            function counter() { let n = 0; return () => ++n; }
            const next = counter();
            next(); next();
            const fns = [];
            for (let i = 0; i < 3; i++) { fns.push(() => i); }
            let total = 0;
            for (const f of fns) total += f();
            let result = [next(), total].join(':');
        ";
        assert_eq!(eval_str(source), "3:3");
    }

    #[test]
    fn test_labels_and_switch() {
        let source = "
            let out = '';
            outer: for (let i = 0; i < 3; i++) {
                for (let j = 0; j < 3; j++) {
                    if (j === 1) continue outer;
                    if (i === 2) break outer;
                    out += i + '' + j + ' ';
                }
            }
            switch (out.length) {
                case 1: out = 'one'; break;
                case 6: out += 'six';
                default: out += '!';
            }
            let result = out;
        ";
        assert_eq!(eval_str(source), "00 10 six!");
    }

    #[test]
    fn test_destructuring() {
        let source = "
            const { a, b: [c, , d = 4], ...rest } = { a: 1, b: [2, 3], e: 5, f: 6 };
            let [x, ...ys] = 'xyz';
            let result = [a, c, d, Object.keys(rest).join(''), x, ys.join('')].join(',');
        ";
        assert_eq!(eval_str(source), "1,2,4,ef,x,yz");
    }

    #[test]
    fn test_try_catch_finally() {
        let source = "
            let log = [];
            try { null.x; } catch (e) { log.push(e.message); }
            try { missing; } catch ({ name }) { log.push(name); }
            try { throw new TypeError('bad'); } catch (e) { log.push(e instanceof TypeError, e instanceof Error); }
            const f = () => { try { return 'try'; } finally { log.push('finally'); } };
            log.push(f());
            let result = log.join('|');
        ";
        assert_eq!(
            eval_str(source),
            "Cannot read properties of null (reading 'x')|ReferenceError|true|true|finally|try"
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval_str("x;"), "error: x is not defined");
        assert_eq!(
            eval_str("let o = {}; o.y.z;"),
            "error: Cannot read properties of undefined (reading 'z')"
        );
        assert_eq!(eval_str("let o = {}; o.f();"), "error: o.f is not a function");
        assert_eq!(eval_str("const k = 1; k = 2;"), "error: Assignment to constant variable.");
        assert_eq!(eval_str("throw 'plain';"), "error: plain");
        assert_eq!(eval_str("throw new Error('boom');"), "error: boom");
        assert_eq!(
            eval_str("class A {}"),
            "error: Classes are not supported in transform code"
        );
    }

    #[test]
    fn test_optional_chaining() {
        let source = "
            const o = { a: null, f() { return this.v; }, v: 7 };
            let result = [o.a?.b.c, o.missing?.(), o.f?.(), o?.a ?? 'd'].join(',');
        ";
        assert_eq!(eval_str(source), ",,7,d");
    }

    #[test]
    fn test_step_budget() {
        let budget = Budget {
            max_steps: 1000,
            ..Budget::default()
        };
        let err = run("while (true) {}", budget).unwrap_err();
        assert!(err.starts_with("budget: transform exceeded its execution budget"), "{err}");

        // Budget errors cannot be caught.
        let source = "let caught = false; try { while (true) {} } catch (e) { caught = true; }";
        assert!(run(source, budget).unwrap_err().starts_with("budget: "));
    }

    #[test]
    fn test_call_depth() {
        let err = run("function f() { return f(); } f();", Budget::default()).unwrap_err();
        assert_eq!(err, "budget: Maximum call stack size exceeded");
    }

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(1.9), 1);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(f64::NAN), 0);
    }
}
