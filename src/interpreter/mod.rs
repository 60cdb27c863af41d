//=====================================================
// File: interpreter/mod.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Tree-walking evaluator for AML programs
// Objective: Execute parsed programs against the environment chain, drive
//            imports and plugins, and launch spawn/parallel work units
//=====================================================

pub mod builtins;
pub mod env;
pub mod errors;
pub mod paths;
pub mod value;

use crate::ast::{
    AssignTarget, BinaryOp, Expr, ImportEntry, Literal, Program, Stmt, UnaryOp,
};
use crate::modules::{ImportError, ModuleExports, ModuleLoader};
use crate::parser::Parser;
use crate::plugins::{PluginRegistry, RuntimeBridge};
use crate::tasks::{self, CancelFlag};
use crate::tokenizer::Tokenizer;
use env::Env;
use errors::RuntimeError;
use parking_lot::RwLock;
use paths::{index_get, index_set, member_get, member_set, resolve_path};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use value::{CallArgs, Dict, Function, Namespace, Value, value_eq};

/// The evaluator. Cloning is cheap and yields a handle onto the same
/// program state; spawned tasks run on clones.
#[derive(Clone)]
pub struct Interpreter {
    globals: Env,
    metadata: Arc<RwLock<Dict>>,
    entrypoint: Arc<RwLock<Option<String>>>,
    cancel: CancelFlag,
    plugins: Arc<PluginRegistry>,
    loader: Arc<ModuleLoader>,
    yield_every: u64,
    yield_sleep: Duration,
    ops: Arc<AtomicU64>,
}

impl Interpreter {
    pub fn new(plugins: Arc<PluginRegistry>, loader: Arc<ModuleLoader>) -> Self {
        let globals = Env::root();
        builtins::install(&globals);
        Self {
            globals,
            metadata: Arc::new(RwLock::new(Dict::new())),
            entrypoint: Arc::new(RwLock::new(None)),
            cancel: CancelFlag::new(),
            plugins,
            loader,
            yield_every: 0,
            yield_sleep: Duration::ZERO,
            ops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enable micro-yielding: after every `yield_every` statements the
    /// executing thread yields (or sleeps, when `yield_sleep` is non-zero).
    pub fn with_pacing(mut self, yield_every: u64, yield_sleep: Duration) -> Self {
        self.yield_every = yield_every;
        self.yield_sleep = yield_sleep;
        self
    }

    pub fn globals(&self) -> &Env {
        &self.globals
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn metadata(&self) -> Arc<RwLock<Dict>> {
        self.metadata.clone()
    }

    /// Script-visible variable by plain or dotted name.
    pub fn get_global(&self, name: &str) -> Result<Value, RuntimeError> {
        if name.contains(['.', '[']) {
            resolve_path(&self.globals, name)
        } else {
            self.globals.get(name)
        }
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.define(name, value);
    }

    /// Run all top-level statements, then invoke the declared entrypoint
    /// (if any) exactly once. A top-level `return` short-circuits both.
    pub fn execute_program(&self, program: &Program) -> Result<Value, RuntimeError> {
        match self.exec_block(&program.statements, &self.globals) {
            Ok(()) => {}
            Err(RuntimeError::Return(value)) => return Ok(value),
            Err(err) => return Err(err),
        }
        self.invoke_entrypoint()
    }

    fn invoke_entrypoint(&self) -> Result<Value, RuntimeError> {
        // `take` guarantees at most one invocation per program run.
        let Some(name) = self.entrypoint.write().take() else {
            return Ok(Value::Null);
        };
        let target = match resolve_path(&self.globals, &name) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("[aml] entry '{name}' not found: {err}");
                return Ok(Value::Null);
            }
        };
        self.call_value(&target, CallArgs::positional(Vec::new()))
    }

    /// Per-statement cancellation check and optional micro-yield.
    fn checkpoint(&self) -> Result<(), RuntimeError> {
        if self.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        if self.yield_every > 0 {
            let count = self.ops.fetch_add(1, Ordering::Relaxed) + 1;
            if count % self.yield_every == 0 {
                if self.yield_sleep.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(self.yield_sleep);
                }
            }
        }
        Ok(())
    }

    fn exec_block(&self, statements: &[Stmt], env: &Env) -> Result<(), RuntimeError> {
        for statement in statements {
            self.exec_stmt(statement, env)?;
        }
        Ok(())
    }

    fn exec_stmt(&self, statement: &Stmt, env: &Env) -> Result<(), RuntimeError> {
        self.checkpoint()?;
        match statement {
            Stmt::VarDecl { name, value, .. } => {
                let value = self.eval(value, env)?;
                env.define(name, value);
                Ok(())
            }
            Stmt::Assign { target, value, .. } => {
                let value = self.eval(value, env)?;
                match target {
                    AssignTarget::Variable(name) => {
                        // Reassign where bound; first write creates the binding.
                        if env.assign(name, value.clone()).is_err() {
                            env.define(name, value);
                        }
                    }
                    AssignTarget::Index { container, index } => {
                        let container = self.eval(container, env)?;
                        let index = self.eval(index, env)?;
                        index_set(&container, &index, value)?;
                    }
                    AssignTarget::Member { object, property } => {
                        let object = self.eval(object, env)?;
                        member_set(&object, property, value)?;
                    }
                }
                Ok(())
            }
            Stmt::ExprStmt { expr, .. } => {
                self.eval(expr, env)?;
                Ok(())
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
                ..
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.exec_block(then_body, env)
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, env)
                } else {
                    Ok(())
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                while self.eval(condition, env)?.is_truthy() {
                    match self.exec_block(body, env) {
                        Ok(()) => {}
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            }
            Stmt::ForIn {
                var,
                iterable,
                body,
                ..
            } => {
                let iterable = self.eval(iterable, env)?;
                for item in self.iterate(&iterable)? {
                    env.define(var, item);
                    match self.exec_block(body, env) {
                        Ok(()) => {}
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            }
            Stmt::FuncDecl {
                name, params, body, ..
            } => {
                let function = Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: Arc::new(body.clone()),
                    closure: env.clone(),
                };
                env.define(name, Value::Function(Arc::new(function)));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Null,
                };
                Err(RuntimeError::Return(value))
            }
            Stmt::Break { .. } => Err(RuntimeError::Break),
            Stmt::Continue { .. } => Err(RuntimeError::Continue),
            Stmt::NamespaceDecl { name, body, .. } => {
                // Redeclaring an existing namespace merges into it.
                if let Ok(Value::Namespace(existing)) = env.get(name) {
                    return self.exec_block(body, existing.scope());
                }
                let namespace = Namespace::new(name.clone(), env);
                self.exec_block(body, namespace.scope())?;
                env.define(name, Value::Namespace(Arc::new(namespace)));
                Ok(())
            }
            Stmt::ImportPy { entries, .. } => {
                for entry in entries {
                    self.import_plugin(entry, env)?;
                }
                Ok(())
            }
            Stmt::ImportAml { entries, .. } => {
                for entry in entries {
                    self.import_script(entry, env)?;
                }
                Ok(())
            }
            Stmt::TryCatch {
                try_body,
                error_name,
                catch_body,
                ..
            } => match self.exec_block(try_body, env) {
                Ok(()) => Ok(()),
                Err(err) if err.is_catchable() => {
                    let scope = env.child();
                    scope.define(
                        error_name.as_deref().unwrap_or("error"),
                        Value::str(err.catch_message()),
                    );
                    self.exec_block(catch_body, &scope)
                }
                Err(err) => Err(err),
            },
            Stmt::Raise { value, .. } => {
                let value = self.eval(value, env)?;
                Err(RuntimeError::Custom(value.to_string()))
            }
            Stmt::Meta { entries, .. } => {
                for (key, expr) in entries {
                    let value = self.eval(expr, env)?;
                    if matches!(key.as_str(), "entry" | "entrypoint") {
                        if let Value::Str(path) = &value {
                            *self.entrypoint.write() = Some(path.clone());
                        }
                    }
                    self.metadata.write().insert(Value::str(key), value)?;
                }
                env.define("meta", Value::Dict(self.metadata.clone()));
                Ok(())
            }
            Stmt::Parallel { calls, .. } => {
                for call in calls {
                    let (name, target, args) = self.prepare_call(call, env)?;
                    let runner = self.clone();
                    tasks::spawn_detached(
                        &name,
                        Box::new(move || runner.call_value(&target, args)),
                    );
                }
                Ok(())
            }
        }
    }

    pub fn eval(&self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            Expr::Identifier { name, .. } => env.get(name),
            Expr::Binary {
                op, left, right, ..
            } => self.eval_binary(*op, left, right, env),
            Expr::Unary { op, operand, .. } => {
                let operand = self.eval(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOp::Minus => Ok(Value::Number(-operand.as_number()?)),
                }
            }
            Expr::Call {
                callee,
                args,
                kwargs,
                ..
            } => {
                let target = self.eval(callee, env)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval(arg, env)?);
                }
                let mut kw_values = Vec::with_capacity(kwargs.len());
                for (name, value) in kwargs {
                    kw_values.push((name.clone(), self.eval(value, env)?));
                }
                self.call_value(
                    &target,
                    CallArgs {
                        args: arg_values,
                        kwargs: kw_values,
                    },
                )
            }
            Expr::Index {
                container, index, ..
            } => {
                let container = self.eval(container, env)?;
                let index = self.eval(index, env)?;
                index_get(&container, &index)
            }
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object, env)?;
                member_get(&object, property)
            }
            Expr::ListLit { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element, env)?);
                }
                Ok(Value::list(values))
            }
            Expr::DictLit { entries, .. } => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.eval(key, env)?;
                    let value = self.eval(value, env)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::ListComprehension {
                element,
                var,
                iterable,
                condition,
                ..
            } => {
                let iterable = self.eval(iterable, env)?;
                let scope = env.child();
                let mut out = Vec::new();
                for item in self.iterate(&iterable)? {
                    scope.define(var, item);
                    if let Some(filter) = condition {
                        if !self.eval(filter, &scope)?.is_truthy() {
                            continue;
                        }
                    }
                    out.push(self.eval(element, &scope)?);
                }
                Ok(Value::list(out))
            }
            Expr::DictComprehension {
                key,
                value,
                var,
                iterable,
                condition,
                ..
            } => {
                let iterable = self.eval(iterable, env)?;
                let scope = env.child();
                let mut dict = Dict::new();
                for item in self.iterate(&iterable)? {
                    scope.define(var, item);
                    if let Some(filter) = condition {
                        if !self.eval(filter, &scope)?.is_truthy() {
                            continue;
                        }
                    }
                    let k = self.eval(key, &scope)?;
                    let v = self.eval(value, &scope)?;
                    dict.insert(k, v)?;
                }
                Ok(Value::dict(dict))
            }
            Expr::Spawn { call, .. } => {
                let (name, target, args) = self.prepare_call(call, env)?;
                let runner = self.clone();
                Ok(Value::Task(tasks::spawn_task(
                    &name,
                    Box::new(move || runner.call_value(&target, args)),
                )))
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Env,
    ) -> Result<Value, RuntimeError> {
        // Logic operators short-circuit and return the deciding operand.
        match op {
            BinaryOp::And => {
                let left = self.eval(left, env)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                return self.eval(right, env);
            }
            BinaryOp::Or => {
                let left = self.eval(left, env)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                return self.eval(right, env);
            }
            _ => {}
        }

        let left = self.eval(left, env)?;
        let right = self.eval(right, env)?;
        binary_op(op, &left, &right)
    }

    /// Worklist form of `for item in value`. Lists are snapshotted so body
    /// mutations cannot skip or repeat elements.
    fn iterate(&self, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::List(items) => Ok(items.read().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Dict(dict) => Ok(dict.read().keys()),
            other => Err(RuntimeError::TypeError(format!(
                "cannot iterate over {}",
                other.type_name()
            ))),
        }
    }

    /// Invoke any callable value with the two-phase convention: positionals
    /// fill parameter slots left to right, then keywords override by name,
    /// then defaults cover the rest.
    pub fn call_value(&self, callee: &Value, call: CallArgs) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => self.call_function(func, call),
            Value::Native(native) => native.invoke(&call),
            other => Err(RuntimeError::NotCallable(other.to_string())),
        }
    }

    fn call_function(&self, func: &Function, call: CallArgs) -> Result<Value, RuntimeError> {
        if call.args.len() > func.params.len() {
            return Err(RuntimeError::ArgumentError(format!(
                "{}() takes at most {} arguments but {} were given",
                func.name,
                func.params.len(),
                call.args.len()
            )));
        }
        for (name, _) in &call.kwargs {
            if !func.params.iter().any(|p| &p.name == name) {
                return Err(RuntimeError::ArgumentError(format!(
                    "{}() got an unexpected keyword argument '{name}'",
                    func.name
                )));
            }
        }

        let scope = func.closure.child();
        for (i, param) in func.params.iter().enumerate() {
            let keyword = call.keyword(&param.name).cloned();
            let value = match keyword.or_else(|| call.args.get(i).cloned()) {
                Some(value) => value,
                None => match &param.default {
                    // Defaults evaluate in the defining environment.
                    Some(default) => self.eval(default, &func.closure)?,
                    None => {
                        return Err(RuntimeError::ArgumentError(format!(
                            "{}() missing required argument '{}'",
                            func.name, param.name
                        )));
                    }
                },
            };
            scope.define(&param.name, value);
        }

        match self.exec_block(&func.body, &scope) {
            Ok(()) => Ok(Value::Null),
            Err(RuntimeError::Return(value)) => Ok(value),
            Err(err) => Err(err),
        }
    }

    /// Evaluate the pieces of a call expression without invoking it, for
    /// spawn and parallel launches.
    fn prepare_call(
        &self,
        call: &Expr,
        env: &Env,
    ) -> Result<(String, Value, CallArgs), RuntimeError> {
        let Expr::Call {
            callee,
            args,
            kwargs,
            ..
        } = call
        else {
            return Err(RuntimeError::TypeError(
                "spawn expects a call expression".to_string(),
            ));
        };
        let name = call_label(callee);
        let target = self.eval(callee, env)?;
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg, env)?);
        }
        let mut kw_values = Vec::with_capacity(kwargs.len());
        for (key, value) in kwargs {
            kw_values.push((key.clone(), self.eval(value, env)?));
        }
        Ok((
            name,
            target,
            CallArgs {
                args: arg_values,
                kwargs: kw_values,
            },
        ))
    }

    fn import_plugin(&self, entry: &ImportEntry, env: &Env) -> Result<(), RuntimeError> {
        let plugin = self.plugins.resolve(&entry.module).ok_or_else(|| {
            ImportError::UnknownPlugin {
                module: entry.module.clone(),
            }
        })?;
        let bridge = RuntimeBridge::new(self.globals.clone(), self.cancel.clone());
        let exports = plugin.init(&bridge)?;
        let namespace = Namespace::new(entry.binding_name(), env);
        for (name, value) in exports.into_entries() {
            namespace.set(&name, value);
        }
        env.define(entry.binding_name(), Value::Namespace(Arc::new(namespace)));
        Ok(())
    }

    fn import_script(&self, entry: &ImportEntry, env: &Env) -> Result<(), RuntimeError> {
        let module = &entry.module;
        let path = self
            .loader
            .resolve(module)
            .ok_or_else(|| ImportError::NotFound {
                module: module.clone(),
            })?;
        let exports = match self.loader.begin(module, &path)? {
            Some(cached) => cached,
            None => match self.load_module(&path) {
                Ok(exports) => self.loader.finish(&path, exports),
                Err(err) => {
                    self.loader.abort(&path);
                    return Err(err);
                }
            },
        };

        match &entry.alias {
            Some(alias) => {
                let namespace = Namespace::new(alias.clone(), env);
                for (name, value) in exports.iter() {
                    namespace.set(name, value.clone());
                }
                env.define(alias, Value::Namespace(Arc::new(namespace)));
            }
            // Unaliased imports merge straight into the importing scope.
            None => {
                for (name, value) in exports.iter() {
                    env.define(name, value.clone());
                }
            }
        }
        Ok(())
    }

    /// Parse and execute a module file in a fresh global scope; its
    /// top-level bindings minus the builtins become the export set.
    fn load_module(&self, path: &Path) -> Result<ModuleExports, RuntimeError> {
        let source = fs::read_to_string(path).map_err(|err| ImportError::Io {
            path: path.to_path_buf(),
            error: err.to_string(),
        })?;
        let tokens = Tokenizer::new(&source)
            .tokenize()
            .map_err(|error| ImportError::Lex {
                path: path.to_path_buf(),
                error,
            })?;
        let program = Parser::new(tokens)
            .parse()
            .map_err(|error| ImportError::Parse {
                path: path.to_path_buf(),
                error,
            })?;

        // The module's directory joins the search path so its own relative
        // imports resolve.
        if let Some(parent) = path.parent() {
            self.loader.add_search_path(parent);
        }

        let child = self.module_interpreter();
        child
            .execute_program(&program)
            .map_err(|err| ImportError::Execution {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;

        let exports = child
            .globals
            .local_bindings()
            .into_iter()
            .filter(|(name, _)| {
                !builtins::BUILTIN_NAMES.contains(&name.as_str()) && name != "meta"
            })
            .collect();
        Ok(exports)
    }

    /// Fresh globals and metadata, shared cancellation, plugins, loader,
    /// and pacing.
    fn module_interpreter(&self) -> Self {
        let globals = Env::root();
        builtins::install(&globals);
        Self {
            globals,
            metadata: Arc::new(RwLock::new(Dict::new())),
            entrypoint: Arc::new(RwLock::new(None)),
            cancel: self.cancel.clone(),
            plugins: self.plugins.clone(),
            loader: self.loader.clone(),
            yield_every: self.yield_every,
            yield_sleep: self.yield_sleep,
            ops: self.ops.clone(),
        }
    }
}

/// Human-readable task name for a spawned callee.
fn call_label(callee: &Expr) -> String {
    match callee {
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => "call".to_string(),
    }
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => add_values(left, right),
        BinaryOp::Subtract => Ok(Value::Number(left.as_number()? - right.as_number()?)),
        BinaryOp::Multiply => Ok(Value::Number(left.as_number()? * right.as_number()?)),
        BinaryOp::Divide => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Number(left.as_number()? / divisor))
        }
        BinaryOp::Modulo => {
            let divisor = right.as_number()?;
            if divisor == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            // Result carries the sign of the divisor.
            let rem = left.as_number()? % divisor;
            let rem = if rem != 0.0 && (rem < 0.0) != (divisor < 0.0) {
                rem + divisor
            } else {
                rem
            };
            Ok(Value::Number(rem))
        }
        BinaryOp::Power => Ok(Value::Number(left.as_number()?.powf(right.as_number()?))),
        BinaryOp::Equal => Ok(Value::Bool(value_eq(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!value_eq(left, right))),
        BinaryOp::Less | BinaryOp::Greater | BinaryOp::LessEqual | BinaryOp::GreaterEqual => {
            compare_values(op, left, right)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logic operators short-circuit"),
    }
}

/// `+` adds numbers, concatenates when either operand is a string, and
/// joins two lists into a new list.
fn add_values(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{left}{right}"))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.read().clone();
            items.extend(b.read().iter().cloned());
            Ok(Value::list(items))
        }
        _ => Err(RuntimeError::TypeError(format!(
            "cannot add {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare_values(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => {
            return Err(RuntimeError::TypeError(format!(
                "cannot order {} and {}",
                left.type_name(),
                right.type_name()
            )));
        }
    };
    let Some(ordering) = ordering else {
        // NaN comparisons are always false.
        return Ok(Value::Bool(false));
    };
    let result = match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::Greater => ordering.is_gt(),
        BinaryOp::LessEqual => ordering.is_le(),
        BinaryOp::GreaterEqual => ordering.is_ge(),
        _ => unreachable!("compare_values only handles orderings"),
    };
    Ok(Value::Bool(result))
}
