//! Built-in globals and the methods of strings, arrays, numbers and regular
//! expressions.
//!
//! Strings are indexed by `char`, not by UTF-16 unit. `console` output goes
//! to `tracing` under the `astplay::console` target.

use super::interp::{to_int32, EvalError, EvalResult, Interpreter, MAX_COLLECTION_LEN};
use super::value::{
    array_index, Env, Native, NativeKind, Object, ObjectClass, RegExpValue, Shared, Value,
};
use crate::resolver::VisitorKey;
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Free functions and constructors.
const GLOBAL_FUNCTIONS: &[&str] = &[
    "String",
    "Number",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "Error",
    "TypeError",
    "RangeError",
    "SyntaxError",
    "ReferenceError",
];

/// Members of the global namespace objects.
const NAMESPACE_FUNCTIONS: &[&str] = &[
    "console.log",
    "console.info",
    "console.debug",
    "console.warn",
    "console.error",
    "JSON.stringify",
    "JSON.parse",
    "Math.max",
    "Math.min",
    "Math.floor",
    "Math.ceil",
    "Math.round",
    "Math.trunc",
    "Math.sign",
    "Math.abs",
    "Math.pow",
    "Math.sqrt",
    "Object.keys",
    "Object.values",
    "Object.entries",
    "Object.assign",
    "Object.freeze",
    "Array.isArray",
    "Array.from",
];

const STRING_METHODS: &[&str] = &[
    "toString",
    "toUpperCase",
    "toLowerCase",
    "trim",
    "trimStart",
    "trimEnd",
    "includes",
    "startsWith",
    "endsWith",
    "indexOf",
    "lastIndexOf",
    "slice",
    "substring",
    "split",
    "replace",
    "replaceAll",
    "repeat",
    "concat",
    "charAt",
    "at",
    "padStart",
    "padEnd",
    "match",
];

const ARRAY_METHODS: &[&str] = &[
    "toString",
    "push",
    "pop",
    "shift",
    "unshift",
    "join",
    "map",
    "filter",
    "forEach",
    "find",
    "findIndex",
    "some",
    "every",
    "reduce",
    "includes",
    "indexOf",
    "slice",
    "concat",
    "reverse",
];

const NUMBER_METHODS: &[&str] = &["toString", "toFixed"];

const REGEXP_METHODS: &[&str] = &["test", "toString"];

/// Nesting limit for `JSON.stringify` and `console` output.
const MAX_JSON_DEPTH: usize = 128;

pub fn install_globals(global: &Env) {
    global.declare("undefined", Value::Undefined, false);
    global.declare("NaN", Value::Number(f64::NAN), false);
    global.declare("Infinity", Value::Number(f64::INFINITY), false);
    for &name in GLOBAL_FUNCTIONS {
        global.declare(name, Value::global(name), false);
    }

    let mut namespaces: Vec<(&str, Object)> = Vec::new();
    for &name in NAMESPACE_FUNCTIONS {
        let Some((namespace, member)) = name.split_once('.') else {
            continue;
        };
        let index = match namespaces.iter().position(|(n, _)| *n == namespace) {
            Some(index) => index,
            None => {
                namespaces.push((namespace, Object::new()));
                namespaces.len() - 1
            }
        };
        namespaces[index].1.set(member, Value::global(name));
    }
    for (namespace, mut object) in namespaces {
        if namespace == "Math" {
            object.set("PI", Value::Number(std::f64::consts::PI));
            object.set("E", Value::Number(std::f64::consts::E));
        }
        global.declare(namespace, Value::object(object), false);
    }
}

fn method(list: &[&'static str], name: &str, this: &Value) -> Value {
    list.iter()
        .find(|m| **m == name)
        .map_or(Value::Undefined, |m| {
            Value::native(NativeKind::Method(*m), this.clone())
        })
}

/// Property lookup on everything but nodes and paths.
pub fn get_builtin_property(object: &Value, key: &Value) -> Value {
    let name = key.to_js_string();
    match object {
        Value::Object(o) => {
            let o = o.borrow();
            if let Some(value) = o.get(&name) {
                return value.clone();
            }
            if o.class == ObjectClass::Types {
                if let Some(key) = name.strip_prefix("is").and_then(VisitorKey::parse) {
                    return Value::native(NativeKind::Is(key), Value::Undefined);
                }
            }
            Value::Undefined
        }
        Value::Array(items) => {
            if let Some(index) = array_index(key) {
                items.borrow().get(index).cloned().unwrap_or(Value::Undefined)
            } else if name == "length" {
                Value::from(items.borrow().len())
            } else {
                method(ARRAY_METHODS, &name, object)
            }
        }
        Value::String(s) => {
            if let Some(index) = array_index(key) {
                s.chars()
                    .nth(index)
                    .map_or(Value::Undefined, |c| Value::from(c.to_string()))
            } else if name == "length" {
                Value::from(s.chars().count())
            } else {
                method(STRING_METHODS, &name, object)
            }
        }
        Value::Number(_) => method(NUMBER_METHODS, &name, object),
        Value::RegExp(re) => match name.as_str() {
            "source" => Value::string(re.source.as_str()),
            "flags" => Value::string(re.flags.as_str()),
            "global" => Value::Bool(re.global()),
            "lastIndex" => Value::from(re.last_index.get()),
            _ => method(REGEXP_METHODS, &name, object),
        },
        Value::Function(closure) => match name.as_str() {
            "name" => Value::String(Rc::clone(&closure.name)),
            "length" => Value::from(closure.code.params.len()),
            _ => Value::Undefined,
        },
        Value::Native(native) if name == "name" => Value::string(native.name()),
        _ => Value::Undefined,
    }
}

/// A JSON number the way `JSON.stringify` prints it: integral values
/// without a fraction, non-finite values as `null`.
#[allow(clippy::cast_possible_truncation)]
pub fn json_number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut object = Object::new();
            for (key, value) in map {
                object.set(&key, from_json(value));
            }
            Value::object(object)
        }
    }
}

fn make_error(name: &str, message: Option<&Value>) -> Value {
    let message = match message {
        None | Some(Value::Undefined) => String::new(),
        Some(message) => message.to_js_string(),
    };
    Value::error(name, &message)
}

/// Resolve a relative index argument (`slice(-2)`) against `len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let n = match value {
        None | Some(Value::Undefined) => return default,
        Some(value) => value.to_number(),
    };
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// An integer argument clamped to `0..=len` (`substring`, `charAt`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn clamped_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    let n = match value {
        None | Some(Value::Undefined) => return default,
        Some(value) => value.to_number(),
    };
    if n.is_nan() {
        0
    } else {
        n.trunc().clamp(0.0, len as f64) as usize
    }
}

fn char_count(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map_or(s.len(), |(i, _)| i)
}

fn check_length(len: usize) -> EvalResult<()> {
    if len > MAX_COLLECTION_LEN {
        Err(EvalError::Type("Invalid string length".to_string()))
    } else {
        Ok(())
    }
}

/// `parseInt`
fn parse_int(text: &str, radix: &Value) -> f64 {
    let s = text.trim_start();
    let (negative, mut s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut radix = match radix {
        Value::Undefined => 0,
        other => to_int32(other.to_number()),
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    let Ok(radix) = u32::try_from(radix) else {
        return f64::NAN;
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = s.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, digit| acc * f64::from(radix) + f64::from(*digit));
    if negative {
        -value
    } else {
        value
    }
}

/// `parseFloat`: the longest numeric prefix.
fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let numeric = s
        .find(|c: char| !(c.is_ascii_digit() || "+-.eE".contains(c)))
        .unwrap_or(s.len());
    (1..=numeric)
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// A match of a string or regular expression pattern, in byte offsets.
struct Found {
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
}

fn find_matches(subject: &str, pattern: &Value, all: bool) -> Vec<Found> {
    match pattern {
        Value::RegExp(re) => re
            .regex
            .captures_iter(subject)
            .take(if all { usize::MAX } else { 1 })
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(Found {
                    start: whole.start(),
                    end: whole.end(),
                    groups: (1..caps.len())
                        .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                        .collect(),
                })
            })
            .collect(),
        other => {
            let needle = other.to_js_string();
            let found = |(start, _): (usize, &str)| Found {
                start,
                end: start + needle.len(),
                groups: Vec::new(),
            };
            if all {
                subject.match_indices(needle.as_str()).map(found).collect()
            } else {
                subject.match_indices(needle.as_str()).take(1).map(found).collect()
            }
        }
    }
}

/// Expand `$$`, `$&`, `` $` ``, `$'` and `$n` in a replacement string.
fn expand_replacement(template: &str, subject: &str, found: &Found) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('&') => {
                chars.next();
                out.push_str(&subject[found.start..found.end]);
            }
            Some('`') => {
                chars.next();
                out.push_str(&subject[..found.start]);
            }
            Some('\'') => {
                chars.next();
                out.push_str(&subject[found.end..]);
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let mut index = d.to_digit(10).map_or(0, |d| d as usize);
                let mut second = None;
                if let Some(next) = chars.peek().and_then(|n| n.to_digit(10)) {
                    let two = index * 10 + next as usize;
                    if (1..=found.groups.len()).contains(&two) {
                        second = chars.next();
                        index = two;
                    }
                }
                match found.groups.get(index.wrapping_sub(1)) {
                    Some(group) if index >= 1 => out.push_str(group.as_deref().unwrap_or("")),
                    _ => {
                        out.push('$');
                        out.push(d);
                        out.extend(second);
                    }
                }
            }
            _ => out.push('$'),
        }
    }
    out
}

/// `Number.prototype.toString(radix)` for integers.
#[allow(clippy::cast_possible_truncation)]
fn to_radix(n: f64, radix: u32) -> String {
    if n.fract() != 0.0 || !n.is_finite() || n.abs() >= 9_007_199_254_740_992.0 {
        return Value::Number(n).to_js_string();
    }
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (value % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value /= u64::from(radix);
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

impl Interpreter {
    pub(super) fn call_native(&mut self, native: &Native, args: Vec<Value>) -> EvalResult<Value> {
        match native.kind {
            NativeKind::Global(name) => self.call_global(name, args),
            NativeKind::Is(key) => self.call_is(key, &native.this, &args),
            NativeKind::Method(name) => match &native.this {
                Value::String(s) => self.string_method(s, name, &args),
                Value::Array(items) => self.array_method(items, name, &args),
                Value::Number(n) => number_method(*n, name, &args),
                Value::RegExp(re) => Ok(regexp_method(re, name, &args)),
                Value::Path(path) => self.call_path_method(path, name, &args),
                other => Err(EvalError::Type(format!(
                    "{}.{name} is not a function",
                    other.type_of()
                ))),
            },
        }
    }

    /// `new Error(...)` and friends; `None` for natives that are not
    /// constructors.
    pub(super) fn construct_native(&mut self, native: &Native, args: Vec<Value>) -> Option<EvalResult<Value>> {
        match native.kind {
            NativeKind::Global(
                name @ ("Error" | "TypeError" | "RangeError" | "SyntaxError" | "ReferenceError"),
            ) => Some(Ok(make_error(name, args.first()))),
            _ => None,
        }
    }

    fn call_global(&mut self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let arg = |index: usize| args.get(index).cloned().unwrap_or(Value::Undefined);
        let number = |index: usize| arg(index).to_number();
        Ok(match name {
            "String" => match args.first() {
                None => Value::string(""),
                Some(value) => Value::from(value.to_js_string()),
            },
            "Number" => Value::Number(args.first().map_or(0.0, Value::to_number)),
            "Boolean" => Value::Bool(arg(0).truthy()),
            "parseInt" => Value::Number(parse_int(&arg(0).to_js_string(), &arg(1))),
            "parseFloat" => Value::Number(parse_float(&arg(0).to_js_string())),
            "isNaN" => Value::Bool(number(0).is_nan()),
            "isFinite" => Value::Bool(number(0).is_finite()),
            "Error" | "TypeError" | "RangeError" | "SyntaxError" | "ReferenceError" => {
                make_error(name, args.first())
            }

            "console.log" | "console.info" => {
                info!(target: "astplay::console", "{}", self.format_log(&args));
                Value::Undefined
            }
            "console.debug" => {
                debug!(target: "astplay::console", "{}", self.format_log(&args));
                Value::Undefined
            }
            "console.warn" => {
                warn!(target: "astplay::console", "{}", self.format_log(&args));
                Value::Undefined
            }
            "console.error" => {
                error!(target: "astplay::console", "{}", self.format_log(&args));
                Value::Undefined
            }

            "JSON.stringify" => self.json_stringify(&arg(0), &arg(2))?,
            "JSON.parse" => {
                let json = serde_json::from_str(&arg(0).to_js_string())
                    .map_err(|err| EvalError::syntax(format!("JSON.parse: {err}")))?;
                from_json(json)
            }

            "Math.max" => Value::Number(args.iter().map(Value::to_number).fold(
                f64::NEG_INFINITY,
                |acc, n| if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.max(n) },
            )),
            "Math.min" => Value::Number(args.iter().map(Value::to_number).fold(
                f64::INFINITY,
                |acc, n| if acc.is_nan() || n.is_nan() { f64::NAN } else { acc.min(n) },
            )),
            "Math.floor" => Value::Number(number(0).floor()),
            "Math.ceil" => Value::Number(number(0).ceil()),
            "Math.round" => Value::Number((number(0) + 0.5).floor()),
            "Math.trunc" => Value::Number(number(0).trunc()),
            "Math.sign" => {
                let n = number(0);
                Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() })
            }
            "Math.abs" => Value::Number(number(0).abs()),
            "Math.pow" => Value::Number(number(0).powf(number(1))),
            "Math.sqrt" => Value::Number(number(0).sqrt()),

            "Object.keys" | "Object.values" | "Object.entries" => {
                let target = arg(0);
                if target.is_nullish() {
                    return Err(EvalError::Type(
                        "Cannot convert undefined or null to object".to_string(),
                    ));
                }
                let mut out = Vec::new();
                for key in self.own_keys(&target)? {
                    let item = match name {
                        "Object.keys" => Value::String(key),
                        _ => {
                            let value = self.get_property(&target, &Value::String(Rc::clone(&key)))?;
                            if name == "Object.values" {
                                value
                            } else {
                                Value::array(vec![Value::String(key), value])
                            }
                        }
                    };
                    out.push(item);
                }
                Value::array(out)
            }
            "Object.assign" => {
                let target = arg(0);
                for source in args.iter().skip(1) {
                    for key in self.own_keys(source)? {
                        let key = Value::String(key);
                        let value = self.get_property(source, &key)?;
                        self.set_property(&target, &key, value)?;
                    }
                }
                target
            }
            "Object.freeze" => arg(0),
            "api.assertVersion" => Value::Undefined,
            "Array.isArray" => Value::Bool(matches!(arg(0), Value::Array(_))),
            "Array.from" => Value::array(self.iterate(&arg(0))?),

            _ => return Err(EvalError::Type(format!("{name} is not a function"))),
        })
    }

    // =========================================================================
    // console and JSON
    // =========================================================================

    fn format_log(&self, args: &[Value]) -> String {
        args.iter()
            .map(|arg| match arg {
                Value::String(s) => s.to_string(),
                other => self.inspect(other, 0),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `util.inspect`-like rendering for `console` output.
    fn inspect(&self, value: &Value, depth: usize) -> String {
        match value {
            Value::String(s) => format!("'{s}'"),
            Value::Array(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    "[]".to_string()
                } else if depth > 2 {
                    "[Array]".to_string()
                } else {
                    let parts: Vec<_> = items.iter().map(|item| self.inspect(item, depth + 1)).collect();
                    format!("[ {} ]", parts.join(", "))
                }
            }
            Value::Object(object) => {
                let object = object.borrow();
                if object.class == ObjectClass::Error {
                    return value.to_js_string();
                }
                if object.is_empty() {
                    "{}".to_string()
                } else if depth > 2 {
                    "[Object]".to_string()
                } else {
                    let parts: Vec<_> = object
                        .entries()
                        .map(|(key, value)| format!("{key}: {}", self.inspect(value, depth + 1)))
                        .collect();
                    format!("{{ {} }}", parts.join(", "))
                }
            }
            Value::Function(closure) => format!("[Function: {}]", closure.name),
            Value::Native(native) => format!("[Function: {}]", native.name()),
            Value::Node(handle) => match self.node_at(&handle.steps) {
                Some(node) => format!(
                    "Node {{ type: '{}', start: {}, end: {} }}",
                    node.node_type(),
                    node.span().start,
                    node.span().end
                ),
                None => "Node { removed }".to_string(),
            },
            Value::Path(path) => format!("NodePath {{ type: '{}' }}", path.node_type()),
            other => other.to_js_string(),
        }
    }

    fn to_json(&self, value: &Value, depth: usize) -> EvalResult<Option<serde_json::Value>> {
        if depth > MAX_JSON_DEPTH {
            return Err(EvalError::Type(
                "Converting circular structure to JSON".to_string(),
            ));
        }
        Ok(match value {
            Value::Undefined | Value::Function(_) | Value::Native(_) => None,
            Value::Null => Some(serde_json::Value::Null),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => Some(json_number(*n)),
            Value::String(s) => Some(serde_json::Value::from(s.as_ref())),
            Value::Array(items) => {
                let items = items.borrow().clone();
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    out.push(self.to_json(item, depth + 1)?.unwrap_or(serde_json::Value::Null));
                }
                Some(serde_json::Value::Array(out))
            }
            Value::Object(object) => {
                let entries: Vec<(Rc<str>, Value)> = {
                    let object = object.borrow();
                    if object.class == ObjectClass::Error {
                        Vec::new()
                    } else {
                        object
                            .entries()
                            .map(|(key, value)| (Rc::clone(key), value.clone()))
                            .collect()
                    }
                };
                let mut map = serde_json::Map::new();
                for (key, value) in entries {
                    if let Some(json) = self.to_json(&value, depth + 1)? {
                        map.insert(key.to_string(), json);
                    }
                }
                Some(serde_json::Value::Object(map))
            }
            Value::RegExp(_) | Value::Path(_) => Some(serde_json::Value::Object(serde_json::Map::new())),
            Value::Node(handle) => Some(self.node_json(handle).unwrap_or(serde_json::Value::Null)),
        })
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn json_stringify(&self, value: &Value, space: &Value) -> EvalResult<Value> {
        let Some(json) = self.to_json(value, 0)? else {
            return Ok(Value::Undefined);
        };
        let indent = match space {
            Value::Number(n) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
            Value::String(s) => s.chars().take(10).collect(),
            _ => String::new(),
        };
        if indent.is_empty() {
            return serde_json::to_string(&json)
                .map(Value::from)
                .map_err(|err| EvalError::Type(err.to_string()));
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        json.serialize(&mut serializer)
            .map_err(|err| EvalError::Type(err.to_string()))?;
        Ok(Value::from(String::from_utf8_lossy(&buf).into_owned()))
    }

    // =========================================================================
    // Methods
    // =========================================================================

    fn string_method(&mut self, s: &Rc<str>, name: &str, args: &[Value]) -> EvalResult<Value> {
        let arg = |index: usize| args.get(index).cloned().unwrap_or(Value::Undefined);
        let text = |index: usize| arg(index).to_js_string();
        let len = s.chars().count();
        Ok(match name {
            "toString" => Value::String(Rc::clone(s)),
            "toUpperCase" => Value::from(s.to_uppercase()),
            "toLowerCase" => Value::from(s.to_lowercase()),
            "trim" => Value::from(s.trim()),
            "trimStart" => Value::from(s.trim_start()),
            "trimEnd" => Value::from(s.trim_end()),
            "includes" => {
                let from = byte_offset(s, clamped_index(args.get(1), len, 0));
                Value::Bool(s[from..].contains(text(0).as_str()))
            }
            "startsWith" => {
                let from = byte_offset(s, clamped_index(args.get(1), len, 0));
                Value::Bool(s[from..].starts_with(text(0).as_str()))
            }
            "endsWith" => {
                let to = byte_offset(s, clamped_index(args.get(1), len, len));
                Value::Bool(s[..to].ends_with(text(0).as_str()))
            }
            "indexOf" => {
                let from = byte_offset(s, clamped_index(args.get(1), len, 0));
                match s[from..].find(text(0).as_str()) {
                    Some(at) => Value::from(char_count(s, from + at)),
                    None => Value::Number(-1.0),
                }
            }
            "lastIndexOf" => match s.rfind(text(0).as_str()) {
                Some(at) => Value::from(char_count(s, at)),
                None => Value::Number(-1.0),
            },
            "slice" => {
                let start = relative_index(args.first(), len, 0);
                let end = relative_index(args.get(1), len, len);
                Value::from(s.chars().skip(start).take(end.saturating_sub(start)).collect::<String>())
            }
            "substring" => {
                let a = clamped_index(args.first(), len, 0);
                let b = clamped_index(args.get(1), len, len);
                let (start, end) = if a <= b { (a, b) } else { (b, a) };
                Value::from(s.chars().skip(start).take(end - start).collect::<String>())
            }
            "charAt" => {
                let index = clamped_index(args.first(), len, 0);
                Value::from(s.chars().nth(index).map(String::from).unwrap_or_default())
            }
            "at" => {
                let n = arg(0).to_number();
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                let index = if n < 0.0 { len as f64 + n } else { n };
                if index < 0.0 {
                    Value::Undefined
                } else {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let index = index as usize;
                    s.chars()
                        .nth(index)
                        .map_or(Value::Undefined, |c| Value::from(c.to_string()))
                }
            }
            "split" => {
                let limit = match arg(1) {
                    Value::Undefined => usize::MAX,
                    other => array_index(&Value::Number(other.to_number().trunc())).unwrap_or(0),
                };
                let parts: Vec<Value> = match arg(0) {
                    Value::Undefined => vec![Value::String(Rc::clone(s))],
                    Value::RegExp(re) => re.regex.split(s).map(Value::from).collect(),
                    separator => {
                        let separator = separator.to_js_string();
                        if separator.is_empty() {
                            s.chars().map(|c| Value::from(c.to_string())).collect()
                        } else {
                            s.split(separator.as_str()).map(Value::from).collect()
                        }
                    }
                };
                Value::array(parts.into_iter().take(limit).collect())
            }
            "replace" | "replaceAll" => self.replace(s, &arg(0), &arg(1), name == "replaceAll")?,
            "repeat" => {
                let count = arg(0).to_number();
                if count < 0.0 || !count.is_finite() {
                    return Err(EvalError::Thrown(Value::error(
                        "RangeError",
                        &format!("Invalid count value: {}", Value::Number(count).to_js_string()),
                    )));
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = count as usize;
                check_length(s.len().saturating_mul(count))?;
                Value::from(s.repeat(count))
            }
            "concat" => {
                let mut out = s.to_string();
                for arg in args {
                    out.push_str(&arg.to_js_string());
                }
                check_length(out.len())?;
                Value::from(out)
            }
            "padStart" | "padEnd" => {
                let target = clamped_index(args.first(), MAX_COLLECTION_LEN, 0);
                let filler = match arg(1) {
                    Value::Undefined => " ".to_string(),
                    other => other.to_js_string(),
                };
                if target <= len || filler.is_empty() {
                    Value::String(Rc::clone(s))
                } else {
                    let pad: String = filler.chars().cycle().take(target - len).collect();
                    Value::from(if name == "padStart" {
                        format!("{pad}{s}")
                    } else {
                        format!("{s}{pad}")
                    })
                }
            }
            "match" => {
                let re = match arg(0) {
                    Value::RegExp(re) => re,
                    other => Rc::new(RegExpValue::new(&other.to_js_string(), "").map_err(EvalError::syntax)?),
                };
                if re.global() {
                    let all: Vec<Value> = re.regex.find_iter(s).map(|m| Value::from(m.as_str())).collect();
                    if all.is_empty() {
                        Value::Null
                    } else {
                        Value::array(all)
                    }
                } else {
                    match re.regex.captures(s) {
                        None => Value::Null,
                        Some(caps) => Value::array(
                            (0..caps.len())
                                .map(|i| caps.get(i).map_or(Value::Undefined, |m| Value::from(m.as_str())))
                                .collect(),
                        ),
                    }
                }
            }
            _ => return Err(EvalError::Type(format!("string.{name} is not a function"))),
        })
    }

    fn replace(&mut self, subject: &str, pattern: &Value, replacement: &Value, all: bool) -> EvalResult<Value> {
        let all = match pattern {
            Value::RegExp(re) if all && !re.global() => {
                return Err(EvalError::Type(
                    "replaceAll must be called with a global RegExp".to_string(),
                ))
            }
            Value::RegExp(re) => re.global(),
            _ => all,
        };
        let mut out = String::new();
        let mut last = 0;
        for found in find_matches(subject, pattern, all) {
            out.push_str(&subject[last..found.start]);
            let text = if replacement.is_callable() {
                let mut args = vec![Value::from(&subject[found.start..found.end])];
                args.extend(
                    found
                        .groups
                        .iter()
                        .map(|group| group.as_deref().map_or(Value::Undefined, Value::from)),
                );
                args.push(Value::from(char_count(subject, found.start)));
                args.push(Value::from(subject));
                self.call(replacement, Value::Undefined, args)?.to_js_string()
            } else {
                expand_replacement(&replacement.to_js_string(), subject, &found)
            };
            out.push_str(&text);
            check_length(out.len())?;
            last = found.end;
        }
        out.push_str(&subject[last..]);
        Ok(Value::from(out))
    }

    fn array_method(&mut self, items: &Shared<Vec<Value>>, name: &str, args: &[Value]) -> EvalResult<Value> {
        let arg = |index: usize| args.get(index).cloned().unwrap_or(Value::Undefined);
        let this = Value::Array(Rc::clone(items));
        let snapshot = || items.borrow().clone();
        Ok(match name {
            "toString" => Value::from(this.to_js_string()),
            "push" => {
                let mut items = items.borrow_mut();
                if items.len() + args.len() > MAX_COLLECTION_LEN {
                    return Err(EvalError::Type("Invalid array length".to_string()));
                }
                items.extend(args.iter().cloned());
                Value::from(items.len())
            }
            "pop" => items.borrow_mut().pop().unwrap_or(Value::Undefined),
            "shift" => {
                let mut items = items.borrow_mut();
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            }
            "unshift" => {
                let mut items = items.borrow_mut();
                items.splice(0..0, args.iter().cloned());
                Value::from(items.len())
            }
            "join" => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    other => other.to_js_string(),
                };
                let parts: Vec<String> = snapshot()
                    .iter()
                    .map(|item| if item.is_nullish() { String::new() } else { item.to_js_string() })
                    .collect();
                Value::from(parts.join(&separator))
            }
            "map" | "filter" | "forEach" | "find" | "findIndex" | "some" | "every" => {
                let callback = arg(0);
                if !callback.is_callable() {
                    return Err(EvalError::Type(format!(
                        "{} is not a function",
                        callback.to_js_string()
                    )));
                }
                let mut mapped = Vec::new();
                for (index, item) in snapshot().into_iter().enumerate() {
                    let args = vec![item.clone(), Value::from(index), this.clone()];
                    let result = self.call(&callback, Value::Undefined, args)?;
                    match name {
                        "map" => mapped.push(result),
                        "filter" if result.truthy() => mapped.push(item),
                        "find" if result.truthy() => return Ok(item),
                        "findIndex" if result.truthy() => return Ok(Value::from(index)),
                        "some" if result.truthy() => return Ok(Value::Bool(true)),
                        "every" if !result.truthy() => return Ok(Value::Bool(false)),
                        _ => {}
                    }
                }
                match name {
                    "map" | "filter" => Value::array(mapped),
                    "find" | "forEach" => Value::Undefined,
                    "findIndex" => Value::Number(-1.0),
                    "some" => Value::Bool(false),
                    _ => Value::Bool(true),
                }
            }
            "reduce" => {
                let callback = arg(0);
                if !callback.is_callable() {
                    return Err(EvalError::Type(format!(
                        "{} is not a function",
                        callback.to_js_string()
                    )));
                }
                let items = snapshot();
                let mut entries = items.into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match entries.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(EvalError::Type(
                                "Reduce of empty array with no initial value".to_string(),
                            ))
                        }
                    },
                };
                for (index, item) in entries {
                    acc = self.call(&callback, Value::Undefined, vec![acc, item, Value::from(index), this.clone()])?;
                }
                acc
            }
            "includes" => {
                let needle = arg(0);
                Value::Bool(snapshot().iter().any(|item| {
                    item.strict_eq(&needle)
                        || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
                }))
            }
            "indexOf" => {
                let needle = arg(0);
                snapshot()
                    .iter()
                    .position(|item| item.strict_eq(&needle))
                    .map_or(Value::Number(-1.0), Value::from)
            }
            "slice" => {
                let items = snapshot();
                let start = relative_index(args.first(), items.len(), 0);
                let end = relative_index(args.get(1), items.len(), items.len());
                Value::array(items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default())
            }
            "concat" => {
                let mut out = snapshot();
                for arg in args {
                    match arg {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Value::array(out)
            }
            "reverse" => {
                items.borrow_mut().reverse();
                this
            }
            _ => return Err(EvalError::Type(format!("array.{name} is not a function"))),
        })
    }
}

fn number_method(n: f64, name: &str, args: &[Value]) -> EvalResult<Value> {
    match name {
        "toString" => match args.first() {
            None | Some(Value::Undefined) => Ok(Value::from(Value::Number(n).to_js_string())),
            Some(radix) => {
                let radix = to_int32(radix.to_number());
                match u32::try_from(radix) {
                    Ok(radix) if (2..=36).contains(&radix) => Ok(Value::from(to_radix(n, radix))),
                    _ => Err(EvalError::Thrown(Value::error(
                        "RangeError",
                        "toString() radix must be between 2 and 36",
                    ))),
                }
            }
        },
        "toFixed" => {
            let digits = args.first().map_or(0.0, Value::to_number);
            if !(0.0..=100.0).contains(&digits) {
                return Err(EvalError::Thrown(Value::error(
                    "RangeError",
                    "toFixed() digits argument must be between 0 and 100",
                )));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let digits = digits as usize;
            Ok(Value::from(format!("{n:.digits$}")))
        }
        _ => Err(EvalError::Type(format!("number.{name} is not a function"))),
    }
}

fn regexp_method(re: &RegExpValue, name: &str, args: &[Value]) -> Value {
    match name {
        "test" => {
            let subject = args.first().map(Value::to_js_string).unwrap_or_default();
            if !re.global() {
                return Value::Bool(re.regex.is_match(&subject));
            }
            let start = re.last_index.get();
            let found = if subject.is_char_boundary(start) {
                re.regex.find_at(&subject, start)
            } else {
                None
            };
            match found {
                Some(m) => {
                    re.last_index.set(m.end());
                    Value::Bool(true)
                }
                None => {
                    re.last_index.set(0);
                    Value::Bool(false)
                }
            }
        }
        _ => Value::from(format!("/{}/{}", re.source, re.flags)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::eval_script;
    use super::*;

    #[test]
    fn test_string_methods() {
        assert_eq!(
            eval_script("let result = ['  ab ', 'héllo'].map(s => s.trim().toUpperCase()).join('|');"),
            "AB|HÉLLO"
        );
        assert_eq!(eval_script("let result = 'héllo'.slice(1, -1);"), "éll");
        assert_eq!(eval_script("let result = 'abc'.substring(2, 0) + 'abc'.at(-1);"), "abc");
        assert_eq!(eval_script("let result = 'a,b,,c'.split(',').length;"), "4");
        assert_eq!(eval_script("let result = 'abc'.split('').reverse().join('');"), "cba");
        assert_eq!(eval_script("let result = 'x'.padStart(3, 'ab') + 'y'.padEnd(2);"), "abxy ");
        assert_eq!(eval_script("let result = 'aXbXc'.indexOf('X', 2);"), "3");
        assert_eq!(eval_script("let result = 'ab'.repeat(3);"), "ababab");
    }

    #[test]
    fn test_replace() {
        assert_eq!(eval_script("let result = 'a-b-c'.replace('-', '+');"), "a+b-c");
        assert_eq!(eval_script("let result = 'a-b-c'.replaceAll('-', '+');"), "a+b+c");
        assert_eq!(
            eval_script("let result = 'John Smith'.replace(/(\\w+) (\\w+)/, '$2, $1 ($&) $$');"),
            "Smith, John (John Smith) $"
        );
        assert_eq!(
            eval_script("let result = 'a1b22'.replace(/\\d+/g, (m, offset) => `[${m}@${offset}]`);"),
            "a[1@1]b[22@3]"
        );
        assert_eq!(
            eval_script("let result = 'x'.replaceAll(/x/, 'y');"),
            "error: replaceAll must be called with a global RegExp"
        );
    }

    #[test]
    fn test_regexp() {
        assert_eq!(
            eval_script("const re = /a(b)?/; let result = [re.test('xa'), re.source, 'cab'.match(re).join('|')].join(',');"),
            "true,a(b)?,ab|b"
        );
        assert_eq!(eval_script("let result = 'a1b2'.match(/\\d/g).join('');"), "12");
        assert_eq!(eval_script("let result = 'ab'.match(/z/);"), "null");
        assert_eq!(
            eval_script("const re = /o/g; let n = 0; while (re.test('foo')) n++; let result = n;"),
            "2"
        );
    }

    #[test]
    fn test_array_methods() {
        let source = "
            const xs = [3, 1, 2];
            const out = [];
            out.push(xs.map(x => x * 2).join(' '));
            out.push(xs.filter(x => x > 1).length);
            out.push(xs.find(x => x < 3), xs.findIndex(x => x === 2));
            out.push(xs.some(x => x > 2), xs.every(x => x > 2));
            out.push(xs.reduce((a, b) => a + b), xs.reduce((a, b) => a + b, 10));
            out.push(xs.includes(NaN), [NaN].includes(NaN), xs.indexOf(2));
            out.push(xs.slice(-2).join(''), xs.concat([4], 5).length);
            xs.unshift(0); xs.shift(); xs.pop();
            out.push(xs.join(''));
            let result = out.join(';');
        ";
        assert_eq!(
            eval_script(source),
            "6 2 4;2;1;2;true;false;6;16;false;true;2;12;5;31"
        );
        assert_eq!(
            eval_script("[].reduce((a, b) => a);"),
            "error: Reduce of empty array with no initial value"
        );
    }

    #[test]
    fn test_json() {
        assert_eq!(
            eval_script("let result = JSON.stringify({ b: 1, a: [true, null, undefined, 1.5], f() {}, s: 'x' });"),
            r#"{"b":1,"a":[true,null,null,1.5],"s":"x"}"#
        );
        assert_eq!(
            eval_script("let result = JSON.stringify({ a: [1] }, null, 2);"),
            "{\n  \"a\": [\n    1\n  ]\n}"
        );
        assert_eq!(eval_script("let result = JSON.stringify(undefined);"), "undefined");
        assert_eq!(eval_script("let result = JSON.parse('{\"k\": [1, \"v\"]}').k[1];"), "v");
        assert_eq!(
            eval_script("let result = JSON.stringify(new Error('x'));"),
            "{}"
        );
    }

    #[test]
    fn test_numbers_and_math() {
        assert_eq!(eval_script("let result = parseInt('  -42px') + parseInt('ff', 16) + parseInt('0x10');"), "229");
        assert_eq!(eval_script("let result = parseFloat('3.5e2abc');"), "350");
        assert_eq!(eval_script("let result = isNaN(parseInt('x'));"), "true");
        assert_eq!(eval_script("let result = (255).toString(16) + (3.14159).toFixed(2);"), "ff3.14");
        assert_eq!(
            eval_script("let result = [Math.max(1, 5, 3), Math.min(), Math.round(2.5), Math.round(-2.5), Math.abs(-1)].join(',');"),
            "5,Infinity,3,-2,1"
        );
        assert_eq!(eval_script("let result = Math.max(1, NaN);"), "NaN");
    }

    #[test]
    fn test_objects() {
        let source = "
            const o = Object.assign({ a: 1 }, { b: 2 }, { a: 3 });
            let result = [Object.keys(o).join(''), Object.values(o).join(''), Object.entries(o)[1].join('=')].join(' ');
        ";
        assert_eq!(eval_script(source), "ab 32 b=2");
        assert_eq!(
            eval_script("Object.keys(null);"),
            "error: Cannot convert undefined or null to object"
        );
        assert_eq!(eval_script("let result = Array.isArray([]) && !Array.isArray('a');"), "true");
    }

    #[test]
    fn test_console_does_not_fail() {
        assert_eq!(
            eval_script("console.log('x', 1, { a: [1, 'b'] }); console.warn(new Error('w')); let result = 'ok';"),
            "ok"
        );
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_int("", &Value::Undefined).is_nan());
        assert_eq!(parse_int("z", &Value::Number(36.0)), 35.0);
        assert!(parse_int("1", &Value::Number(1.0)).is_nan());
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float("inf").is_nan());
        assert_eq!(to_radix(-10.0, 2), "-1010");
    }
}
