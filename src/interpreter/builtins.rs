//=====================================================
// File: interpreter/builtins.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Core builtin functions
// Objective: The reserved builtin set every root environment carries;
//            everything richer arrives through plugins
//=====================================================

use crate::interpreter::env::Env;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::{NativeFunction, Value};

/// Names installed by [`install`]; imports must not treat these as exports.
pub const BUILTIN_NAMES: &[&str] = &[
    "print", "len", "str", "num", "bool", "type", "range", "push", "keys",
];

pub fn install(env: &Env) {
    env.define(
        "print",
        Value::Native(NativeFunction::new("print", |call| {
            let line = call
                .args
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
            Ok(Value::Null)
        })),
    );

    env.define(
        "len",
        Value::Native(NativeFunction::new("len", |call| {
            let value = call.required(0, "len")?;
            let len = match value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.read().len(),
                Value::Dict(dict) => dict.read().len(),
                other => {
                    return Err(RuntimeError::TypeError(format!(
                        "len() does not support {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Number(len as f64))
        })),
    );

    env.define(
        "str",
        Value::Native(NativeFunction::new("str", |call| {
            Ok(Value::Str(call.required(0, "str")?.to_string()))
        })),
    );

    env.define(
        "num",
        Value::Native(NativeFunction::new("num", |call| {
            match call.required(0, "num")? {
                Value::Number(n) => Ok(Value::Number(*n)),
                Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                    RuntimeError::TypeError(format!("cannot convert {s:?} to number"))
                }),
                other => Err(RuntimeError::TypeError(format!(
                    "cannot convert {} to number",
                    other.type_name()
                ))),
            }
        })),
    );

    env.define(
        "bool",
        Value::Native(NativeFunction::new("bool", |call| {
            Ok(Value::Bool(call.required(0, "bool")?.is_truthy()))
        })),
    );

    env.define(
        "type",
        Value::Native(NativeFunction::new("type", |call| {
            Ok(Value::str(call.required(0, "type")?.type_name()))
        })),
    );

    env.define(
        "range",
        Value::Native(NativeFunction::new("range", |call| {
            let (start, stop, step) = match call.args.len() {
                1 => (0.0, call.args[0].as_number()?, 1.0),
                2 => (call.args[0].as_number()?, call.args[1].as_number()?, 1.0),
                3 => (
                    call.args[0].as_number()?,
                    call.args[1].as_number()?,
                    call.args[2].as_number()?,
                ),
                n => {
                    return Err(RuntimeError::ArgumentError(format!(
                        "range() takes 1 to 3 arguments, got {n}"
                    )));
                }
            };
            if step == 0.0 {
                return Err(RuntimeError::ArgumentError(
                    "range() step must not be zero".into(),
                ));
            }
            let mut values = Vec::new();
            let mut current = start;
            while (step > 0.0 && current < stop) || (step < 0.0 && current > stop) {
                values.push(Value::Number(current));
                current += step;
            }
            Ok(Value::list(values))
        })),
    );

    env.define(
        "push",
        Value::Native(NativeFunction::new("push", |call| {
            let target = call.required(0, "push")?.clone();
            let value = call.required(1, "push")?.clone();
            match &target {
                Value::List(items) => {
                    items.write().push(value);
                    Ok(target)
                }
                other => Err(RuntimeError::TypeError(format!(
                    "push() expects a list, got {}",
                    other.type_name()
                ))),
            }
        })),
    );

    env.define(
        "keys",
        Value::Native(NativeFunction::new("keys", |call| {
            match call.required(0, "keys")? {
                Value::Dict(dict) => Ok(Value::list(dict.read().keys())),
                other => Err(RuntimeError::TypeError(format!(
                    "keys() expects a dict, got {}",
                    other.type_name()
                ))),
            }
        })),
    );
}
