//=====================================================
// File: interpreter/value.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: AML runtime value model
// Objective: Define the Value union, shared-by-reference collections, the
//            ordered Dict, functions, namespaces, and foreign handles
//=====================================================

use crate::ast::{Parameter, Stmt};
use crate::interpreter::env::Env;
use crate::interpreter::errors::RuntimeError;
use crate::tasks::TaskHandle;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A user function: parameter list, body, and the defining environment
/// captured for lexical scoping.
pub struct Function {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Arc<Vec<Stmt>>,
    pub closure: Env,
}

/// Calling convention for plugin callables: positional values plus
/// string-keyed optional arguments.
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: Vec::new(),
        }
    }

    /// Positional argument at `index`, or an ArgumentError naming the callee.
    pub fn required(&self, index: usize, callee: &str) -> Result<&Value, RuntimeError> {
        self.args.get(index).ok_or_else(|| {
            RuntimeError::ArgumentError(format!(
                "{callee}() missing required argument #{}",
                index + 1
            ))
        })
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.kwargs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

type NativeImpl = Box<dyn Fn(&CallArgs) -> Result<Value, RuntimeError> + Send + Sync>;

/// A natively-implemented callable exposed to scripts (builtin or plugin).
pub struct NativeFunction {
    pub name: String,
    func: NativeImpl,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&CallArgs) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            func: Box::new(func),
        })
    }

    pub fn invoke(&self, call: &CallArgs) -> Result<Value, RuntimeError> {
        (self.func)(call)
    }
}

/// Named, process-wide container of variables and functions.
///
/// The namespace owns a scope whose parent is the declaring environment, so
/// functions declared inside observe later member updates.
pub struct Namespace {
    pub name: String,
    scope: Env,
}

impl Namespace {
    pub fn new(name: impl Into<String>, parent: &Env) -> Self {
        Self {
            name: name.into(),
            scope: parent.child(),
        }
    }

    /// Scope used to execute the namespace body; its locals are the members.
    pub fn scope(&self) -> &Env {
        &self.scope
    }

    pub fn get(&self, member: &str) -> Option<Value> {
        self.scope.get_local(member)
    }

    pub fn set(&self, member: &str, value: Value) {
        self.scope.define(member, value);
    }

    pub fn member_names(&self) -> Vec<String> {
        self.scope.local_names()
    }
}

/// Opaque handle into a plugin-provided object.
pub trait ForeignObject: Send + Sync {
    fn type_name(&self) -> &str;
    fn get_attr(&self, name: &str) -> Option<Value>;
    fn set_attr(&self, name: &str, _value: Value) -> Result<(), RuntimeError> {
        Err(RuntimeError::TypeError(format!(
            "attributes of '{}' are read-only",
            self.type_name()
        )))
    }
}

/// Insertion-ordered map with string-or-scalar keys.
#[derive(Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_key(key: &Value) -> Result<(), RuntimeError> {
        match key {
            Value::Str(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' cannot be used as a dict key",
                other.type_name()
            ))),
        }
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        Self::check_key(&key)?;
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| value_eq(k, &key)) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| value_eq(k, key))
            .map(|(_, v)| v.clone())
    }

    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Value::Str(s) if s == key))
            .map(|(_, v)| v.clone())
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| value_eq(k, key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// Tagged runtime value. Lists and dicts are shared by reference: cloning a
/// Value clones the handle, and mutation is visible through every alias.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Arc<RwLock<Vec<Value>>>),
    Dict(Arc<RwLock<Dict>>),
    Function(Arc<Function>),
    Native(Arc<NativeFunction>),
    Namespace(Arc<Namespace>),
    Foreign(Arc<dyn ForeignObject>),
    Task(Arc<TaskHandle>),
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(values)))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Arc::new(RwLock::new(dict)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Native(_) => "function",
            Value::Namespace(_) => "namespace",
            Value::Foreign(_) => "foreign",
            Value::Task(_) => "task",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.read().is_empty(),
            Value::Dict(dict) => !dict.read().is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(RuntimeError::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str, RuntimeError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::TypeError(format!(
                "expected string, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Structural equality: scalars by value, collections element-wise,
/// callables and handles by identity.
pub fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let xs = x.read();
            let ys = y.read();
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(a, b)| value_eq(a, b))
        }
        (Value::Dict(x), Value::Dict(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let xs = x.read();
            let ys = y.read();
            xs.len() == ys.len()
                && xs
                    .entries()
                    .iter()
                    .all(|(k, v)| ys.get(k).is_some_and(|other| value_eq(v, &other)))
        }
        (Value::Function(x), Value::Function(y)) => Arc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => Arc::ptr_eq(x, y),
        (Value::Namespace(x), Value::Namespace(y)) => Arc::ptr_eq(x, y),
        (Value::Task(x), Value::Task(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// Render an f64 the way scripts expect: integral values without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn fmt_nested(value: &Value, seen: &mut Vec<*const ()>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Strings inside collections keep their quotes.
    match value {
        Value::Str(s) => write!(f, "{s:?}"),
        other => fmt_value(other, seen, f),
    }
}

// Collections are shared by reference, so a list or dict can contain itself.
// `seen` tracks the Arcs on the current rendering path by pointer identity;
// a revisit prints a placeholder instead of recursing.
fn fmt_value(value: &Value, seen: &mut Vec<*const ()>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => f.write_str(&format_number(*n)),
        Value::Str(s) => f.write_str(s),
        Value::List(items) => {
            let ptr = Arc::as_ptr(items) as *const ();
            if seen.contains(&ptr) {
                return f.write_str("[...]");
            }
            seen.push(ptr);
            f.write_str("[")?;
            for (i, item) in items.read().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_nested(item, seen, f)?;
            }
            f.write_str("]")?;
            seen.pop();
            Ok(())
        }
        Value::Dict(dict) => {
            let ptr = Arc::as_ptr(dict) as *const ();
            if seen.contains(&ptr) {
                return f.write_str("{...}");
            }
            seen.push(ptr);
            f.write_str("{")?;
            for (i, (k, v)) in dict.read().entries().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                fmt_nested(k, seen, f)?;
                f.write_str(": ")?;
                fmt_nested(v, seen, f)?;
            }
            f.write_str("}")?;
            seen.pop();
            Ok(())
        }
        Value::Function(func) => write!(f, "func {}(...)", func.name),
        Value::Native(native) => write!(f, "func {}(...)", native.name),
        Value::Namespace(ns) => write!(f, "namespace {}", ns.name),
        Value::Foreign(obj) => write!(f, "<{}>", obj.type_name()),
        Value::Task(task) => write!(f, "task '{}'", task.name()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = Vec::new();
        fmt_value(self, &mut seen, f)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({s:?})"),
            other => write!(f, "{other}"),
        }
    }
}
