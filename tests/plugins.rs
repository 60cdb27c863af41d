//==============================================
// File: tests/plugins.rs
//==============================================
// Author: AML Contributors
// License: MIT
// Goal: Native plugin integration
// Objective: import_py binding, host-registered plugins, and the runtime
//            bridge capability surface
//==============================================

mod util;

use aml::RuntimeError;
use aml::Value;
use aml::plugins::{Plugin, PluginExports, RuntimeBridge};
use aml::runtime::AmlRuntime;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use util::{number, text};

/// Test plugin that counts initializations and exposes bridge-backed ops.
struct GaugePlugin {
    inits: Arc<AtomicUsize>,
}

impl Plugin for GaugePlugin {
    fn name(&self) -> &str {
        "gauge"
    }

    fn init(&self, bridge: &RuntimeBridge) -> Result<PluginExports, RuntimeError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        bridge.define("gauge_loaded", Value::Bool(true));
        let reader = bridge.clone();
        let writer = bridge.clone();
        let stopper = bridge.clone();
        Ok(PluginExports::new()
            .value("unit", Value::str("kPa"))
            .function("read", move |call| {
                let name = call.required(0, "read")?.as_str()?.to_string();
                reader.get(&name)
            })
            .function("write", move |call| {
                let name = call.required(0, "write")?.as_str()?.to_string();
                let value = call.required(1, "write")?.clone();
                writer.assign(&name, value)?;
                Ok(Value::Null)
            })
            .function("halt", move |_| {
                stopper.trigger_cancel();
                Ok(Value::Null)
            }))
    }
}

fn runtime_with_gauge() -> (AmlRuntime, Arc<AtomicUsize>) {
    let inits = Arc::new(AtomicUsize::new(0));
    let runtime = AmlRuntime::new();
    runtime.register_plugin(Arc::new(GaugePlugin {
        inits: inits.clone(),
    }));
    (runtime, inits)
}

#[test]
fn import_py_binds_exports_under_the_alias() {
    let (runtime, inits) = runtime_with_gauge();
    runtime
        .run_source(
            "import_py { gauge as g }\nvar unit = g.unit",
            "<test>",
        )
        .expect("run");
    assert_eq!(text(&runtime, "unit"), "kPa");
    assert_eq!(inits.load(Ordering::SeqCst), 1);
}

#[test]
fn plugin_init_sees_the_live_environment() {
    let (runtime, _) = runtime_with_gauge();
    runtime
        .run_source("import_py { gauge }", "<test>")
        .expect("run");
    // Defined through the bridge during init.
    assert!(matches!(
        runtime.get_variable("gauge_loaded"),
        Ok(Value::Bool(true))
    ));
}

#[test]
fn bridge_reads_and_writes_dotted_paths() {
    let (runtime, _) = runtime_with_gauge();
    let src = r#"
import_py { gauge }
namespace Sensors {
    var pressure = 101.3
}
var observed = gauge.read("Sensors.pressure")
gauge.write("Sensors.pressure", 99.9)
var updated = Sensors.pressure
"#;
    runtime.run_source(src, "<test>").expect("run");
    assert!((number(&runtime, "observed") - 101.3).abs() < 1e-9);
    assert!((number(&runtime, "updated") - 99.9).abs() < 1e-9);
}

#[test]
fn plugin_triggered_cancellation_halts_the_script() {
    let (runtime, _) = runtime_with_gauge();
    let err = runtime
        .run_source(
            "import_py { gauge }\ngauge.halt()\nvar never = 1",
            "<test>",
        )
        .unwrap_err();
    assert!(err.to_string().contains("cancelled"));
    assert!(runtime.get_variable("never").is_err());
}

#[test]
fn default_plugins_are_available() {
    let runtime = AmlRuntime::new();
    runtime
        .run_source(
            "import_py { console, timing }\nvar t = timing.now()\nconsole.log(\"ok\", t)",
            "<test>",
        )
        .expect("run");
    assert!(number(&runtime, "t") > 0.0);
}

#[test]
fn allowlist_hides_everything_else() {
    let runtime = AmlRuntime::new();
    runtime.restrict_plugins(&["console".to_string()]);
    runtime
        .run_source("import_py { console }", "<test>")
        .expect("allowed plugin loads");
    let err = runtime
        .run_source("import_py { timing }", "<test>")
        .unwrap_err();
    assert_eq!(err.code_str(), "E002");
}

#[test]
fn unknown_plugin_is_a_module_resolution_error() {
    let runtime = AmlRuntime::new();
    let err = runtime
        .run_source("import_py { antigravity }", "<test>")
        .unwrap_err();
    assert_eq!(err.code_str(), "E002");
    assert!(err.to_string().contains("antigravity"));
}
