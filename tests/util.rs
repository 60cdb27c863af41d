//==============================================
// File: tests/util.rs
//==============================================
// Author: AML Contributors
// License: MIT
// Goal: Shared integration-test harness
// Objective: Run AML source through a fresh runtime and read results back
//==============================================

// Not every suite uses every helper.
#![allow(dead_code)]

use aml::Value;
use aml::runtime::AmlRuntime;

/// Execute `source` in a fresh runtime and return it for inspection.
pub fn run_source(source: &str) -> AmlRuntime {
    let runtime = AmlRuntime::new();
    runtime.run_source(source, "<test>").expect("script failed");
    runtime
}

pub fn number(runtime: &AmlRuntime, name: &str) -> f64 {
    runtime
        .get_variable(name)
        .unwrap_or_else(|err| panic!("{name}: {err}"))
        .as_number()
        .unwrap_or_else(|err| panic!("{name}: {err}"))
}

pub fn text(runtime: &AmlRuntime, name: &str) -> String {
    runtime
        .get_variable(name)
        .unwrap_or_else(|err| panic!("{name}: {err}"))
        .as_str()
        .unwrap_or_else(|err| panic!("{name}: {err}"))
        .to_string()
}

pub fn rendered(runtime: &AmlRuntime, name: &str) -> String {
    runtime
        .get_variable(name)
        .unwrap_or_else(|err| panic!("{name}: {err}"))
        .to_string()
}

pub fn boolean(runtime: &AmlRuntime, name: &str) -> bool {
    match runtime
        .get_variable(name)
        .unwrap_or_else(|err| panic!("{name}: {err}"))
    {
        Value::Bool(b) => b,
        other => panic!("{name}: expected bool, got {}", other.type_name()),
    }
}
