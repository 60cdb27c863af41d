//==============================================
// File: tests/concurrency.rs
//==============================================
// Author: AML Contributors
// License: MIT
// Goal: Spawn, parallel, and cancellation behavior
// Objective: Task handles join with results, share state safely, and stop
//            at cancellation checkpoints
//==============================================

mod util;

use aml::Value;
use aml::runtime::AmlRuntime;
use std::time::{Duration, Instant};
use util::{boolean, number, run_source};

#[test]
fn spawned_tasks_join_with_their_results() {
    let src = r#"
func work(n, scale = 2) {
    return n * scale
}
var t1 = spawn work(10)
var t2 = spawn work(10, scale = 5)
var sum = t1.join() + t2.join()
"#;
    let runtime = run_source(src);
    assert_eq!(number(&runtime, "sum"), 70.0);
}

#[test]
fn join_after_completion_is_idempotent() {
    let src = r#"
func quick() { return 9 }
var t = spawn quick()
var first = t.join()
var second = t.join()
var done = t.completed
"#;
    let runtime = run_source(src);
    assert_eq!(number(&runtime, "first"), 9.0);
    assert_eq!(number(&runtime, "second"), 9.0);
    assert!(boolean(&runtime, "done"));
}

#[test]
fn task_errors_surface_on_join() {
    let src = r#"
func explode() {
    raise "kaboom"
}
var t = spawn explode()
var message = ""
try {
    t.join()
} catch {
    message = error
}
var failed = t.error
"#;
    let runtime = run_source(src);
    assert!(util::text(&runtime, "message").contains("kaboom"));
    assert!(util::text(&runtime, "failed").contains("kaboom"));
}

#[test]
fn tasks_mutate_shared_collections() {
    let src = r#"
var results = []
func record(n) {
    push(results, n)
    return n
}
var a = spawn record(1)
var b = spawn record(2)
a.join()
b.join()
var count = len(results)
"#;
    let runtime = run_source(src);
    assert_eq!(number(&runtime, "count"), 2.0);
}

#[test]
fn parallel_block_completes_without_joining() {
    let src = r#"
var hits = []
func tick(n) {
    push(hits, n)
}
parallel {
    tick(1)
    tick(2)
    tick(3)
}
"#;
    let runtime = run_source(src);
    // Fire-and-forget: poll until the detached calls land.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let hits = runtime.get_variable("hits").unwrap();
        if let Value::List(items) = &hits {
            if items.read().len() == 3 {
                break;
            }
        }
        assert!(Instant::now() < deadline, "parallel calls never completed");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn cancellation_stops_a_long_running_task() {
    let src = r#"
func spin() {
    var i = 0
    while true {
        i = i + 1
    }
}
var t = spawn spin()
"#;
    let runtime = run_source(src);
    runtime.cancel();

    let task = runtime.get_variable("t").unwrap();
    let Value::Task(handle) = task else {
        panic!("expected a task handle");
    };
    let err = handle.join().unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}

#[test]
fn cancelled_runtime_rejects_new_work() {
    let runtime = AmlRuntime::new();
    runtime.cancel();
    let err = runtime.run_source("var x = 1", "<test>").unwrap_err();
    assert!(err.to_string().contains("cancelled"));
}
