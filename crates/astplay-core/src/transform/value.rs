//! Runtime values of the transform interpreter.

use super::path::{NodeHandle, PathHandle};
use crate::resolver::VisitorKey;
use astplay_parser::{format_number, Block, Expr, Pattern};
use regex_lite::Regex;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub type Shared<T> = Rc<RefCell<T>>;

/// A JavaScript value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Shared<Vec<Value>>),
    Object(Shared<Object>),
    Function(Rc<Closure>),
    Native(Rc<Native>),
    RegExp(Rc<RegExpValue>),
    /// A node of the AST under transformation.
    Node(Rc<NodeHandle>),
    /// The `path` argument of a visitor handler.
    Path(Rc<PathHandle>),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native(kind: NativeKind, this: Value) -> Self {
        Value::Native(Rc::new(Native { kind, this }))
    }

    pub fn global(name: &'static str) -> Self {
        Self::native(NativeKind::Global(name), Value::Undefined)
    }

    /// An `Error`-like object.
    pub fn error(name: &str, message: &str) -> Self {
        let mut object = Object::with_class(ObjectClass::Error);
        object.set("name", Value::string(name));
        object.set("message", Value::string(message));
        Value::object(object)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::RegExp(_)
            | Value::Node(_)
            | Value::Path(_) => "object",
        }
    }

    /// `Number(value)`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(object) => {
                let object = object.borrow();
                if object.class == ObjectClass::Error {
                    let name = object.get("name").map_or_else(|| "Error".to_string(), Value::to_js_string);
                    let message = object.get("message").map(Value::to_js_string).unwrap_or_default();
                    if message.is_empty() {
                        name
                    } else {
                        format!("{name}: {message}")
                    }
                } else {
                    "[object Object]".to_string()
                }
            }
            Value::Function(closure) => format!("function {}() {{ [code] }}", closure.name),
            Value::Native(native) => format!("function {}() {{ [native code] }}", native.name()),
            Value::RegExp(re) => format!("/{}/{}", re.source, re.flags),
            Value::Node(_) | Value::Path(_) => "[object Object]".to_string(),
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b) || a.same_as(b),
            (Value::RegExp(a), Value::RegExp(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => a.steps == b.steps,
            (Value::Path(a), Value::Path(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                if matches!(self, Value::Bool(_) | Value::Number(_) | Value::String(_))
                    && matches!(other, Value::Bool(_) | Value::Number(_) | Value::String(_))
                {
                    #[allow(clippy::float_cmp)]
                    let equal = self.to_number() == other.to_number();
                    equal
                } else {
                    false
                }
            }
            _ => self.strict_eq(other),
        }
    }

    /// `Object.keys`-style enumeration, used by `for...in` and spreads.
    pub fn own_keys(&self) -> Vec<Rc<str>> {
        match self {
            Value::Object(object) => object.borrow().keys().cloned().collect(),
            Value::Array(items) => (0..items.borrow().len()).map(|i| Rc::from(i.to_string())).collect(),
            Value::String(s) => (0..s.chars().count()).map(|i| Rc::from(i.to_string())).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => write!(f, "Array({})", items.borrow().len()),
            Value::Object(_) => f.write_str("Object"),
            Value::Function(closure) => write!(f, "Function({})", closure.name),
            Value::Native(native) => write!(f, "Native({})", native.name()),
            Value::Node(node) => write!(f, "Node({:?})", node.steps),
            Value::Path(path) => write!(f, "Path({})", path.node_type()),
            other => f.write_str(&other.to_js_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

#[allow(clippy::cast_precision_loss)]
impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

/// `Number("...")`.
pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let prefixed = |prefixes: &[&str], radix: u32| {
        prefixes
            .iter()
            .find_map(|p| s.strip_prefix(p))
            .map(|digits| u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64))
    };
    if let Some(n) = prefixed(&["0x", "0X"], 16)
        .or_else(|| prefixed(&["0o", "0O"], 8))
        .or_else(|| prefixed(&["0b", "0B"], 2))
    {
        return n;
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) => {
            s.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Array index from a property key, if it is one.
pub fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < 4_294_967_295.0 => {
            #[allow(clippy::cast_sign_loss)]
            Some(*n as usize)
        }
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            if s.len() > 1 && s.starts_with('0') {
                None
            } else {
                s.parse().ok()
            }
        }
        _ => None,
    }
}

// =============================================================================
// Objects
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectClass {
    #[default]
    Plain,
    Error,
    /// The `types` namespace handed to plugins: `isX` is answered for
    /// every node type and alias.
    Types,
}

/// A plain object with insertion-ordered properties.
#[derive(Debug, Default)]
pub struct Object {
    pub class: ObjectClass,
    props: Vec<(Rc<str>, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class: ObjectClass) -> Self {
        Self {
            class,
            props: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.props.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((Rc::from(key), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.props.len();
        self.props.retain(|(k, _)| &**k != key);
        self.props.len() != before
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Rc<str>> {
        self.props.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.props.iter().map(|(k, v)| (k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Body of a user-defined function.
#[derive(Debug)]
pub enum FunctionBody {
    Block(Block),
    Expr(Expr),
}

/// Code of a user-defined function, shared by every closure created from it.
#[derive(Debug)]
pub struct FunctionCode {
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    pub is_async: bool,
    pub is_generator: bool,
}

/// A user-defined function with its captured scope.
pub struct Closure {
    pub name: Rc<str>,
    pub code: Rc<FunctionCode>,
    pub env: Env,
}

/// A built-in function, optionally bound to a receiver (`"ab".slice`).
#[derive(Debug)]
pub struct Native {
    pub kind: NativeKind,
    pub this: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    /// Free function or constructor: `"Error"`, `"console.log"`, `"Math.max"`.
    Global(&'static str),
    /// Method looked up on `this`.
    Method(&'static str),
    /// `types.isX(node)` or `path.isX()`.
    Is(VisitorKey),
}

impl Native {
    pub fn name(&self) -> &str {
        match self.kind {
            NativeKind::Global(name) => name.rsplit('.').next().unwrap_or(name),
            NativeKind::Method(name) => name,
            NativeKind::Is(key) => key.as_str(),
        }
    }

    /// Unbound natives compare equal by kind (`console.log === console.log`).
    fn same_as(&self, other: &Native) -> bool {
        self.kind == other.kind && matches!(self.kind, NativeKind::Global(_))
    }
}

// =============================================================================
// Regular expressions
// =============================================================================

/// A compiled regular expression literal.
#[derive(Debug)]
pub struct RegExpValue {
    pub source: String,
    pub flags: String,
    pub regex: Regex,
    /// Advanced by `test` on global expressions.
    pub last_index: Cell<usize>,
}

impl RegExpValue {
    /// Compile a pattern with JavaScript flags.
    pub fn new(source: &str, flags: &str) -> Result<Self, String> {
        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' => inline.push(flag),
                'g' | 'u' | 'y' | 'd' => {}
                other => return Err(format!("Invalid regular expression flags '{other}'")),
            }
        }
        let pattern = if inline.is_empty() {
            source.to_string()
        } else {
            format!("(?{inline}){source}")
        };
        let regex = Regex::new(&pattern)
            .map_err(|err| format!("Invalid regular expression: /{source}/: {err}"))?;
        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
            last_index: Cell::new(0),
        })
    }

    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

// =============================================================================
// Scopes
// =============================================================================

pub type Env = Rc<Scope>;

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

/// A lexical scope.
#[derive(Debug)]
pub struct Scope {
    vars: RefCell<FxHashMap<Rc<str>, Binding>>,
    parent: Option<Env>,
    /// `this` for function scopes; arrows and blocks look further up.
    this: Option<Value>,
    /// Whether `var` declarations land here.
    function_scope: bool,
}

impl Scope {
    pub fn global() -> Env {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: None,
            this: Some(Value::Undefined),
            function_scope: true,
        })
    }

    pub fn block(parent: &Env) -> Env {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            this: None,
            function_scope: false,
        })
    }

    pub fn function(parent: &Env, this: Option<Value>) -> Env {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
            this,
            function_scope: true,
        })
    }

    /// Copy of this scope's bindings under the same parent, for per-iteration
    /// `let` bindings in loops.
    pub fn fork(&self) -> Env {
        Rc::new(Scope {
            vars: RefCell::new(self.vars.borrow().clone()),
            parent: self.parent.clone(),
            this: self.this.clone(),
            function_scope: self.function_scope,
        })
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.vars
            .borrow_mut()
            .insert(Rc::from(name), Binding { value, mutable });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    /// Assign to an existing binding. `Err` carries the reason.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undeclared),
        }
    }

    pub fn this(&self) -> Value {
        match (&self.this, &self.parent) {
            (Some(this), _) => this.clone(),
            (None, Some(parent)) => parent.this(),
            (None, None) => Value::Undefined,
        }
    }

    /// The nearest scope that takes `var` declarations.
    pub fn var_scope(self: &Rc<Self>) -> Env {
        let mut scope = Rc::clone(self);
        while !scope.function_scope {
            match &scope.parent {
                Some(parent) => scope = Rc::clone(parent),
                None => break,
            }
        }
        scope
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Constant,
    Undeclared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string() {
        assert_eq!(Value::Number(10.0).to_js_string(), "10");
        assert_eq!(Value::Number(0.5).to_js_string(), "0.5");
        assert_eq!(
            Value::array(vec![Value::from(1.0), Value::Null, Value::from("a")]).to_js_string(),
            "1,,a"
        );
        assert_eq!(Value::error("TypeError", "bad").to_js_string(), "TypeError: bad");
        assert_eq!(Value::object(Object::new()).to_js_string(), "[object Object]");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("0x10").to_number(), 16.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("4px").to_number().is_nan());
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(Value::from("1").loose_eq(&Value::from(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::from(1.0)));
        assert!(!Value::from("a").loose_eq(&Value::Null));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
        let object = Value::object(Object::new());
        assert!(object.strict_eq(&object.clone()));
        assert!(!object.strict_eq(&Value::object(Object::new())));
    }

    #[test]
    fn test_truthy_and_typeof() {
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::array(Vec::new()).truthy());
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::global("String").type_of(), "function");
    }

    #[test]
    fn test_scope_chain() {
        let global = Scope::global();
        global.declare("a", Value::from(1.0), true);
        global.declare("k", Value::from(2.0), false);
        let block = Scope::block(&global);
        block.declare("b", Value::from(3.0), true);

        assert!(block.assign("a", Value::from(5.0)).is_ok());
        assert_eq!(global.lookup("a").unwrap().to_number(), 5.0);
        assert_eq!(block.assign("k", Value::Null), Err(AssignError::Constant));
        assert_eq!(block.assign("zz", Value::Null), Err(AssignError::Undeclared));
        assert!(global.lookup("b").is_none());
        assert!(Rc::ptr_eq(&block.var_scope(), &global));
    }

    #[test]
    fn test_regexp_flags() {
        let re = RegExpValue::new("ab+c", "gi").unwrap();
        assert!(re.global());
        assert!(re.regex.is_match("xABBC"));
        assert!(RegExpValue::new("a", "q").is_err());
        assert!(RegExpValue::new("(", "").is_err());
    }

    #[test]
    fn test_array_index() {
        assert_eq!(array_index(&Value::from(2.0)), Some(2));
        assert_eq!(array_index(&Value::from("3")), Some(3));
        assert_eq!(array_index(&Value::from("03")), None);
        assert_eq!(array_index(&Value::from(1.5)), None);
        assert_eq!(array_index(&Value::from("length")), None);
    }
}
