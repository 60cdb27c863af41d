//=====================================================
// File: interpreter/paths.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Uniform dotted-path addressing
// Objective: Resolve and assign chains like `ns.d.items[0]` across
//            namespaces, dicts, lists, tasks, and foreign objects
//=====================================================

use crate::interpreter::env::Env;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{NativeFunction, Value};
use crate::tasks::TaskHandle;
use std::sync::Arc;

/// Attribute read dispatched on the runtime tag of `value`.
pub fn member_get(value: &Value, name: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Namespace(ns) => ns.get(name).ok_or_else(|| {
            RuntimeError::VariableNotFound(format!("{}.{}", ns.name, name))
        }),
        Value::Dict(dict) => dict.read().get_str(name).ok_or_else(|| {
            RuntimeError::VariableNotFound(format!("dict has no key '{name}'"))
        }),
        Value::Task(task) => task_member(task, name),
        Value::Foreign(obj) => obj.get_attr(name).ok_or_else(|| {
            RuntimeError::VariableNotFound(format!(
                "'{}' has no attribute '{name}'",
                obj.type_name()
            ))
        }),
        other => Err(RuntimeError::TypeError(format!(
            "cannot read attribute '{name}' of {}",
            other.type_name()
        ))),
    }
}

/// Attribute write counterpart of [`member_get`].
pub fn member_set(value: &Value, name: &str, new: Value) -> Result<(), RuntimeError> {
    match value {
        Value::Namespace(ns) => {
            ns.set(name, new);
            Ok(())
        }
        Value::Dict(dict) => dict.write().insert(Value::str(name), new),
        Value::Foreign(obj) => obj.set_attr(name, new),
        other => Err(RuntimeError::TypeError(format!(
            "cannot assign attribute '{name}' on {}",
            other.type_name()
        ))),
    }
}

/// Index read: lists by (possibly negative) number, dicts by scalar key,
/// strings by character position.
pub fn index_get(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::List(items) => {
            let items = items.read();
            let at = normalize_index(index.as_number()?, items.len())?;
            Ok(items[at].clone())
        }
        Value::Dict(dict) => dict.read().get(index).ok_or_else(|| {
            RuntimeError::IndexError(format!("dict has no key {index}"))
        }),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = normalize_index(index.as_number()?, chars.len())?;
            Ok(Value::Str(chars[at].to_string()))
        }
        other => Err(RuntimeError::TypeError(format!(
            "{} is not indexable",
            other.type_name()
        ))),
    }
}

pub fn index_set(container: &Value, index: &Value, new: Value) -> Result<(), RuntimeError> {
    match container {
        Value::List(items) => {
            let mut items = items.write();
            let at = normalize_index(index.as_number()?, items.len())?;
            items[at] = new;
            Ok(())
        }
        Value::Dict(dict) => dict.write().insert(index.clone(), new),
        other => Err(RuntimeError::TypeError(format!(
            "{} does not support indexed assignment",
            other.type_name()
        ))),
    }
}

fn normalize_index(raw: f64, len: usize) -> Result<usize, RuntimeError> {
    if raw.fract() != 0.0 {
        return Err(RuntimeError::IndexError(format!(
            "index {raw} is not an integer"
        )));
    }
    let mut at = raw as i64;
    if at < 0 {
        at += len as i64;
    }
    if at < 0 || at as usize >= len {
        return Err(RuntimeError::IndexError(format!(
            "index {} out of range (length {len})",
            raw as i64
        )));
    }
    Ok(at as usize)
}

/// Task attributes readable from scripts; `join` is exposed as a bound callable.
fn task_member(task: &Arc<TaskHandle>, name: &str) -> Result<Value, RuntimeError> {
    match name {
        "completed" => Ok(Value::Bool(task.completed())),
        "result" => Ok(task.result()),
        "error" => Ok(task
            .error()
            .map(Value::Str)
            .unwrap_or(Value::Null)),
        "name" => Ok(Value::str(task.name())),
        "join" => {
            let bound = task.clone();
            Ok(Value::Native(NativeFunction::new("join", move |_| {
                bound.join()
            })))
        }
        other => Err(RuntimeError::VariableNotFound(format!(
            "task has no attribute '{other}'"
        ))),
    }
}

/// One parsed segment of a dotted path: a name plus trailing index suffixes
/// (`items[0]["key"]`).
#[derive(Debug)]
struct PathSegment {
    name: String,
    indices: Vec<Value>,
}

fn parse_segments(dotted: &str) -> Result<Vec<PathSegment>, RuntimeError> {
    let mut segments = Vec::new();
    for raw in dotted.split('.') {
        if raw.is_empty() {
            return Err(RuntimeError::VariableNotFound(format!(
                "malformed path '{dotted}'"
            )));
        }
        let (name, mut rest) = match raw.find('[') {
            Some(at) => (&raw[..at], &raw[at..]),
            None => (raw, ""),
        };
        let mut indices = Vec::new();
        while !rest.is_empty() {
            let close = rest.find(']').ok_or_else(|| {
                RuntimeError::VariableNotFound(format!("unbalanced index in '{dotted}'"))
            })?;
            let inner = &rest[1..close];
            let index = if let Some(stripped) = inner
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
            {
                Value::str(stripped)
            } else {
                let number: f64 = inner.trim().parse().map_err(|_| {
                    RuntimeError::VariableNotFound(format!(
                        "bad index '{inner}' in '{dotted}'"
                    ))
                })?;
                Value::Number(number)
            };
            indices.push(index);
            rest = &rest[close + 1..];
        }
        segments.push(PathSegment {
            name: name.to_string(),
            indices,
        });
    }
    Ok(segments)
}

/// Resolve a dotted path starting from `env`. The first segment is a plain
/// lexical lookup; every later step is [`member_get`]/[`index_get`].
pub fn resolve_path(env: &Env, dotted: &str) -> Result<Value, RuntimeError> {
    let segments = parse_segments(dotted)?;
    let mut current = env.get(&segments[0].name)?;
    for step in path_steps(&segments) {
        current = match step {
            PathStep::Member(name) => member_get(&current, &name)?,
            PathStep::Index(index) => index_get(&current, &index)?,
        };
    }
    Ok(current)
}

enum PathStep {
    Member(String),
    Index(Value),
}

/// Flatten segments after the leading name into a uniform step list.
fn path_steps(segments: &[PathSegment]) -> Vec<PathStep> {
    let mut steps = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            steps.push(PathStep::Member(segment.name.clone()));
        }
        for index in &segment.indices {
            steps.push(PathStep::Index(index.clone()));
        }
    }
    steps
}

/// Assign through a dotted path. Intermediate steps resolve exactly as
/// [`resolve_path`] does; only the final step writes.
pub fn assign_path(env: &Env, dotted: &str, value: Value) -> Result<(), RuntimeError> {
    let segments = parse_segments(dotted)?;
    let steps = path_steps(&segments);
    let first = &segments[0].name;

    let Some((last, walk)) = steps.split_last() else {
        // Plain variable: reassign where bound, otherwise create here.
        if env.assign(first, value.clone()).is_err() {
            env.define(first, value);
        }
        return Ok(());
    };

    let mut current = env.get(first)?;
    for step in walk {
        current = match step {
            PathStep::Member(name) => member_get(&current, name)?,
            PathStep::Index(index) => index_get(&current, index)?,
        };
    }
    match last {
        PathStep::Member(name) => member_set(&current, name, value),
        PathStep::Index(index) => index_set(&current, index, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::{Dict, Namespace, value_eq};

    fn nested_env() -> Env {
        // ns.d.items = [10, 20]
        let env = Env::root();
        let ns = Namespace::new("ns", &env);
        let mut dict = Dict::new();
        dict.insert(
            Value::str("items"),
            Value::list(vec![Value::Number(10.0), Value::Number(20.0)]),
        )
        .unwrap();
        ns.set("d", Value::dict(dict));
        env.define("ns", Value::Namespace(Arc::new(ns)));
        env
    }

    #[test]
    fn resolves_namespace_dict_list_chain() {
        let env = nested_env();
        let value = resolve_path(&env, "ns.d.items[1]").unwrap();
        assert!(value_eq(&value, &Value::Number(20.0)));
    }

    #[test]
    fn assign_then_resolve_round_trips() {
        let env = nested_env();
        assign_path(&env, "ns.d.items[0]", Value::str("replaced")).unwrap();
        let value = resolve_path(&env, "ns.d.items[0]").unwrap();
        assert!(value_eq(&value, &Value::str("replaced")));
    }

    #[test]
    fn quoted_string_index_addresses_dict_keys() {
        let env = nested_env();
        let value = resolve_path(&env, "ns.d[\"items\"][0]").unwrap();
        assert!(value_eq(&value, &Value::Number(10.0)));
    }

    #[test]
    fn member_assignment_creates_namespace_entries() {
        let env = nested_env();
        assign_path(&env, "ns.created", Value::Bool(true)).unwrap();
        assert!(value_eq(
            &resolve_path(&env, "ns.created").unwrap(),
            &Value::Bool(true)
        ));
    }

    #[test]
    fn missing_segment_reports_name_error() {
        let env = nested_env();
        assert!(matches!(
            resolve_path(&env, "ns.ghost.x"),
            Err(RuntimeError::VariableNotFound(_))
        ));
    }

    #[test]
    fn negative_list_index_counts_from_end() {
        let env = nested_env();
        let value = resolve_path(&env, "ns.d.items[-1]").unwrap();
        assert!(value_eq(&value, &Value::Number(20.0)));
    }

    #[test]
    fn out_of_range_index_is_an_index_error() {
        let env = nested_env();
        assert!(matches!(
            resolve_path(&env, "ns.d.items[5]"),
            Err(RuntimeError::IndexError(_))
        ));
    }
}
