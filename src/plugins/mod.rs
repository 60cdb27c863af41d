//=====================================================
// File: plugins.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Native plugin registry and runtime bridge
// Objective: Resolve import_py targets to registered plugin modules and hand
//            each one a capability object into the live runtime
//=====================================================

use crate::interpreter::env::Env;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::paths::{assign_path, resolve_path};
use crate::interpreter::value::{NativeFunction, Value};
use crate::tasks::CancelFlag;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub mod console;
pub mod timing;

/// Capability handed to each plugin at initialization.
///
/// Plugins participate in script state only through this object: dotted-path
/// reads, define/assign writes, and the cooperative cancellation signal.
/// There is no ambient global runtime.
#[derive(Clone)]
pub struct RuntimeBridge {
    root: Env,
    cancel: CancelFlag,
}

impl RuntimeBridge {
    pub fn new(root: Env, cancel: CancelFlag) -> Self {
        Self { root, cancel }
    }

    /// Look up a script-visible variable by plain or dotted name.
    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        if name.contains(['.', '[']) {
            resolve_path(&self.root, name)
        } else {
            self.root.get(name)
        }
    }

    /// Create a binding in the root environment.
    pub fn define(&self, name: &str, value: Value) {
        self.root.define(name, value);
    }

    /// Assign by plain or dotted name, creating top-level names that do not
    /// exist yet.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        assign_path(&self.root, name, value)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn trigger_cancel(&self) {
        self.cancel.trigger();
    }
}

/// Values a plugin exposes to scripts, bound under the import's name.
#[derive(Default)]
pub struct PluginExports {
    entries: Vec<(String, Value)>,
}

impl PluginExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.entries.push((name.to_string(), value));
        self
    }

    pub fn function(
        self,
        name: &str,
        func: impl Fn(&crate::interpreter::value::CallArgs) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let native = Value::Native(NativeFunction::new(name, func));
        self.value(name, native)
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

/// A natively-implemented module loadable through `import_py`.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn init(&self, bridge: &RuntimeBridge) -> Result<PluginExports, RuntimeError>;
}

/// Registry of available plugin modules, keyed by canonical name.
///
/// Lookups also accept dotted spellings (`plugins.console`) by falling back
/// to the final path segment.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn Plugin>>>,
    allowlist: RwLock<Option<Vec<String>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(console::ConsolePlugin));
        registry.register(Arc::new(timing::TimingPlugin));
        registry
    }

    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        self.plugins
            .write()
            .insert(plugin.name().to_string(), plugin);
    }

    /// Limit resolution to the named plugins. Others stay registered but
    /// become invisible to `import_py`.
    pub fn restrict_to(&self, names: &[String]) {
        *self.allowlist.write() = Some(names.to_vec());
    }

    pub fn resolve(&self, module: &str) -> Option<Arc<dyn Plugin>> {
        let plugins = self.plugins.read();
        let found = plugins.get(module).cloned().or_else(|| {
            let tail = module.rsplit(['.', '/', '\\']).next()?;
            plugins.get(tail).cloned()
        })?;
        match &*self.allowlist.read() {
            Some(names) if !names.iter().any(|n| n == found.name()) => None,
            _ => Some(found),
        }
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::value_eq;

    struct ProbePlugin;

    impl Plugin for ProbePlugin {
        fn name(&self) -> &str {
            "probe"
        }

        fn init(&self, bridge: &RuntimeBridge) -> Result<PluginExports, RuntimeError> {
            // Record initialization in script-visible state.
            bridge.define("probe_ready", Value::Bool(true));
            let reader = bridge.clone();
            Ok(PluginExports::new()
                .value("version", Value::Number(1.0))
                .function("read", move |call| {
                    let name = call.required(0, "read")?.as_str()?.to_string();
                    reader.get(&name)
                }))
        }
    }

    #[test]
    fn registry_resolves_exact_and_dotted_names() {
        let registry = PluginRegistry::with_defaults();
        registry.register(Arc::new(ProbePlugin));
        assert!(registry.resolve("probe").is_some());
        assert!(registry.resolve("plugins.probe").is_some());
        assert!(registry.resolve("console").is_some());
        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn bridge_round_trips_script_state() {
        let env = Env::root();
        let bridge = RuntimeBridge::new(env.clone(), CancelFlag::new());
        bridge.define("speed", Value::Number(3.0));
        assert!(value_eq(
            &bridge.get("speed").unwrap(),
            &Value::Number(3.0)
        ));
        bridge.assign("speed", Value::Number(5.0)).unwrap();
        assert!(value_eq(&env.get("speed").unwrap(), &Value::Number(5.0)));
    }

    #[test]
    fn bridge_cancellation_is_shared() {
        let cancel = CancelFlag::new();
        let bridge = RuntimeBridge::new(Env::root(), cancel.clone());
        assert!(!bridge.is_cancelled());
        bridge.trigger_cancel();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn plugin_init_receives_working_bridge() {
        let env = Env::root();
        let bridge = RuntimeBridge::new(env.clone(), CancelFlag::new());
        let exports = ProbePlugin.init(&bridge).unwrap().into_entries();
        assert_eq!(exports.len(), 2);
        assert!(value_eq(&env.get("probe_ready").unwrap(), &Value::Bool(true)));
    }
}
