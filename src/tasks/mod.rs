//=====================================================
// File: tasks.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Concurrency primitives for spawn and parallel blocks
// Objective: Joinable task handles, fire-and-forget launches, and the
//            cooperative cancellation flag shared with plugins
//=====================================================

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Cooperative cancellation signal. The core never force-terminates a
/// running unit; the interpreter and plugins poll this flag instead.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct TaskState {
    completed: bool,
    result: Option<Value>,
    error: Option<RuntimeError>,
}

/// Handle to an asynchronously spawned call.
///
/// `join` blocks until completion; `completed`/`result`/`error` are the
/// non-blocking attribute reads scripts use to poll.
pub struct TaskHandle {
    name: String,
    state: Mutex<TaskState>,
    done: Condvar,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(TaskState::default()),
            done: Condvar::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn complete(&self, outcome: Result<Value, RuntimeError>) {
        let mut state = self.state.lock();
        match outcome {
            Ok(value) => state.result = Some(value),
            Err(err) => state.error = Some(err),
        }
        state.completed = true;
        drop(state);
        self.done.notify_all();
    }

    /// Block until the task finishes; the stored error surfaces here.
    pub fn join(&self) -> Result<Value, RuntimeError> {
        let mut state = self.state.lock();
        while !state.completed {
            self.done.wait(&mut state);
        }
        if let Some(err) = &state.error {
            return Err(err.clone());
        }
        Ok(state.result.clone().unwrap_or(Value::Null))
    }

    pub fn completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Result so far; `null` until the task completes or when it failed.
    pub fn result(&self) -> Value {
        self.state.lock().result.clone().unwrap_or(Value::Null)
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.as_ref().map(|e| e.to_string())
    }
}

type TaskJob = Box<dyn FnOnce() -> Result<Value, RuntimeError> + Send + 'static>;

fn launch(name: &str, prefix: &str, body: impl FnOnce() + Send + 'static) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("{prefix}:{name}"))
        .spawn(body)
        .map(|_| ())
}

// A handle whose thread never started must still be joinable: store the
// launch failure as the task's outcome so `join` returns instead of blocking.
fn seal_launch(handle: &TaskHandle, name: &str, outcome: io::Result<()>) {
    if let Err(err) = outcome {
        handle.complete(Err(RuntimeError::Custom(format!(
            "failed to start task '{name}': {err}"
        ))));
    }
}

/// Launch a joinable task; the returned handle is completed by the worker.
pub fn spawn_task(name: &str, job: TaskJob) -> Arc<TaskHandle> {
    let handle = TaskHandle::new(name);
    let worker = handle.clone();
    let outcome = launch(name, "aml-task", move || {
        worker.complete(job());
    });
    seal_launch(&handle, name, outcome);
    handle
}

/// Fire-and-forget launch for parallel blocks. Failures are reported on
/// stderr and otherwise swallowed; nothing waits on the thread.
pub fn spawn_detached(name: &str, job: TaskJob) {
    let label = name.to_string();
    let outcome = launch(name, "aml-parallel", move || {
        if let Err(err) = job() {
            eprintln!("[aml] parallel call '{label}' failed: {err}");
        }
    });
    if let Err(err) = outcome {
        eprintln!("[aml] failed to start thread for '{name}': {err}");
    }
}
