//=====================================================
// File: runtime.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Embedding facade over the AML toolchain
// Objective: One handle that compiles, runs, and inspects scripts, for the
//            CLI and for host applications embedding AML
//=====================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::artifact;
use crate::interpreter::Interpreter;
use crate::interpreter::errors::{RuntimeError, ScriptError};
use crate::interpreter::value::{CallArgs, Namespace, Value};
use crate::modules::ModuleLoader;
use crate::parser::Parser;
use crate::plugins::{Plugin, PluginRegistry};
use crate::tasks::{self, CancelFlag, TaskHandle};
use crate::tokenizer::Tokenizer;

pub use crate::artifact::ARTIFACT_EXTENSION;

/// Execution pacing knobs. With `yield_every` at zero the interpreter never
/// yields; otherwise every Nth statement yields the thread, or sleeps when
/// `yield_sleep` is non-zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    pub yield_every: u64,
    pub yield_sleep: Duration,
}

/// A live AML session: one global scope, one plugin registry, one module
/// cache. Scripts run through the same session share state, which is what
/// embedders use to pre-seed variables and read results back.
pub struct AmlRuntime {
    interpreter: Interpreter,
    plugins: Arc<PluginRegistry>,
    loader: Arc<ModuleLoader>,
}

impl AmlRuntime {
    pub fn new() -> Self {
        Self::with_options(RuntimeOptions::default())
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        let plugins = Arc::new(PluginRegistry::with_defaults());
        let loader = Arc::new(ModuleLoader::with_default_paths());
        let interpreter = Interpreter::new(plugins.clone(), loader.clone())
            .with_pacing(options.yield_every, options.yield_sleep);
        Self {
            interpreter,
            plugins,
            loader,
        }
    }

    /// Make a host-defined plugin available to `import_py`.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    pub fn add_search_path(&self, path: impl Into<std::path::PathBuf>) {
        self.loader.add_search_path(path);
    }

    /// Run AML source text. `name` labels diagnostics and the artifact
    /// fingerprint; use the file name or something like `"<repl>"`.
    pub fn run_source(&self, source: &str, name: &str) -> Result<Value, ScriptError> {
        let program = parse_source(source).map_err(|err| label_error(name, err))?;
        Ok(self.interpreter.execute_program(&program)?)
    }

    /// Run a script or compiled artifact, chosen by file extension.
    pub fn run_file(&self, path: &Path) -> Result<Value, ScriptError> {
        // The script's own directory becomes an import root.
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.loader.add_search_path(parent);
        }
        if path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION) {
            let bytes = fs::read(path).map_err(io_script_error)?;
            return self.run_artifact(&bytes);
        }
        let source = fs::read_to_string(path).map_err(io_script_error)?;
        let label = path.display().to_string();
        self.run_source(&source, &label)
    }

    /// Decode and execute a compiled artifact.
    pub fn run_artifact(&self, bytes: &[u8]) -> Result<Value, ScriptError> {
        let decoded = artifact::decode(bytes)?;
        Ok(self.interpreter.execute_program(&decoded.program)?)
    }

    /// Compile source text into the portable artifact encoding.
    pub fn compile_source(&self, source: &str, name: &str) -> Result<Vec<u8>, ScriptError> {
        let program = parse_source(source).map_err(|err| label_error(name, err))?;
        Ok(artifact::encode(&program, name, source)?)
    }

    pub fn compile_file(&self, path: &Path) -> Result<Vec<u8>, ScriptError> {
        let source = fs::read_to_string(path).map_err(io_script_error)?;
        let label = path.display().to_string();
        self.compile_source(&source, &label)
    }

    /// Script-visible variable by plain or dotted name.
    pub fn get_variable(&self, name: &str) -> Result<Value, RuntimeError> {
        self.interpreter.get_global(name)
    }

    pub fn set_variable(&self, name: &str, value: Value) {
        self.interpreter.set_global(name, value);
    }

    /// Call a script function by (possibly dotted) name with positional
    /// arguments.
    pub fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let callee = self.interpreter.get_global(name)?;
        self.interpreter
            .call_value(&callee, CallArgs::positional(args))
    }

    /// Launch a script function on a background thread and return its task
    /// handle, mirroring the script-level `spawn`.
    pub fn parallel_call(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Arc<TaskHandle>, RuntimeError> {
        let callee = self.interpreter.get_global(name)?;
        let interpreter = self.interpreter.clone();
        Ok(tasks::spawn_task(
            name,
            Box::new(move || interpreter.call_value(&callee, CallArgs::positional(args))),
        ))
    }

    /// Create an empty namespace in the global scope, or hand back the one
    /// already bound under that name.
    pub fn define_namespace(&self, name: &str) -> Value {
        if let Ok(existing @ Value::Namespace(_)) = self.interpreter.get_global(name) {
            return existing;
        }
        let namespace =
            Value::Namespace(Arc::new(Namespace::new(name, self.interpreter.globals())));
        self.interpreter.set_global(name, namespace.clone());
        namespace
    }

    /// Limit `import_py` to the named plugins.
    pub fn restrict_plugins(&self, names: &[String]) {
        self.plugins.restrict_to(names);
    }

    /// Shared cancellation flag; triggering it stops running scripts and
    /// tasks at their next checkpoint.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.interpreter.cancel_flag()
    }

    pub fn cancel(&self) {
        self.interpreter.cancel_flag().trigger();
    }

    /// Metadata collected from `meta` blocks as `(key, value)` pairs.
    pub fn metadata(&self) -> Vec<(Value, Value)> {
        self.interpreter.metadata().read().entries().to_vec()
    }
}

impl Default for AmlRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_source(source: &str) -> Result<crate::ast::Program, ScriptError> {
    let tokens = Tokenizer::new(source).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

/// Prefix syntax diagnostics with the script label.
fn label_error(name: &str, err: ScriptError) -> ScriptError {
    ScriptError::new(err.code, format!("{name}: {}", err.message))
}

fn io_script_error(err: std::io::Error) -> ScriptError {
    ScriptError::new(
        crate::interpreter::errors::ErrorCode::ModuleResolution,
        err.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::value_eq;

    #[test]
    fn session_state_persists_across_runs() {
        let runtime = AmlRuntime::new();
        runtime.run_source("var counter = 1", "<test>").unwrap();
        runtime
            .run_source("counter = counter + 1", "<test>")
            .unwrap();
        let value = runtime.get_variable("counter").unwrap();
        assert!(value_eq(&value, &Value::Number(2.0)));
    }

    #[test]
    fn compiled_artifact_runs_like_source() {
        let source = "func square(n) { return n * n }\nvar out = square(6)";
        let compiler = AmlRuntime::new();
        let bytes = compiler.compile_source(source, "square.aml").unwrap();

        let runtime = AmlRuntime::new();
        runtime.run_artifact(&bytes).unwrap();
        let value = runtime.get_variable("out").unwrap();
        assert!(value_eq(&value, &Value::Number(36.0)));
    }

    #[test]
    fn host_calls_into_script_functions() {
        let runtime = AmlRuntime::new();
        runtime
            .run_source("func greet(name) { return \"hi \" + name }", "<test>")
            .unwrap();
        let value = runtime
            .call_function("greet", vec![Value::str("aml")])
            .unwrap();
        assert!(value_eq(&value, &Value::str("hi aml")));
    }

    #[test]
    fn host_seeds_variables_before_running() {
        let runtime = AmlRuntime::new();
        runtime.set_variable("input", Value::Number(20.0));
        runtime.run_source("var doubled = input * 2", "<test>").unwrap();
        let value = runtime.get_variable("doubled").unwrap();
        assert!(value_eq(&value, &Value::Number(40.0)));
    }

    #[test]
    fn parallel_call_joins_with_the_result() {
        let runtime = AmlRuntime::new();
        runtime
            .run_source("func slow_add(a, b) { return a + b }", "<test>")
            .unwrap();
        let task = runtime
            .parallel_call("slow_add", vec![Value::Number(4.0), Value::Number(5.0)])
            .unwrap();
        let value = task.join().unwrap();
        assert!(value_eq(&value, &Value::Number(9.0)));
    }

    #[test]
    fn host_namespace_members_reach_scripts() {
        let runtime = AmlRuntime::new();
        let ns = runtime.define_namespace("Host");
        match &ns {
            Value::Namespace(namespace) => namespace.set("limit", Value::Number(10.0)),
            other => panic!("expected a namespace, got {other}"),
        }
        runtime
            .run_source("var capped = Host.limit * 2", "<test>")
            .unwrap();
        let value = runtime.get_variable("capped").unwrap();
        assert!(value_eq(&value, &Value::Number(20.0)));
    }

    #[test]
    fn metadata_is_visible_to_the_host() {
        let runtime = AmlRuntime::new();
        runtime
            .run_source("meta { name: \"demo\", version: 2 }", "<test>")
            .unwrap();
        let entries = runtime.metadata();
        assert!(entries
            .iter()
            .any(|(k, v)| value_eq(k, &Value::str("name")) && value_eq(v, &Value::str("demo"))));
    }
}
