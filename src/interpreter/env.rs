//=====================================================
// File: interpreter/env.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Hierarchical variable environments
// Objective: Scope chain with lexical lookup, shared across concurrent
//            execution units
//=====================================================

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct EnvInner {
    values: RwLock<HashMap<String, Value>>,
    parent: Option<Env>,
}

/// A scope in the chain. Cheap to clone; clones alias the same scope.
#[derive(Clone)]
pub struct Env(Arc<EnvInner>);

impl Env {
    pub fn root() -> Self {
        Self(Arc::new(EnvInner {
            values: RwLock::new(HashMap::new()),
            parent: None,
        }))
    }

    /// New innermost scope whose parent is `self`.
    pub fn child(&self) -> Self {
        Self(Arc::new(EnvInner {
            values: RwLock::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn same_scope(&self, other: &Env) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Create or overwrite a binding in this scope.
    pub fn define(&self, name: &str, value: Value) {
        self.0.values.write().insert(name.to_string(), value);
    }

    /// Lexical lookup from innermost to root.
    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(value) = env.0.values.read().get(name) {
                return Ok(value.clone());
            }
            current = env.0.parent.as_ref();
        }
        Err(RuntimeError::VariableNotFound(name.to_string()))
    }

    /// Lookup restricted to this scope's own bindings.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.0.values.read().get(name).cloned()
    }

    /// Reassign an existing binding, walking the chain outward.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut current = Some(self);
        while let Some(env) = current {
            let mut values = env.0.values.write();
            if values.contains_key(name) {
                values.insert(name.to_string(), value);
                return Ok(());
            }
            drop(values);
            current = env.0.parent.as_ref();
        }
        Err(RuntimeError::VariableNotFound(name.to_string()))
    }

    pub fn local_names(&self) -> Vec<String> {
        self.0.values.read().keys().cloned().collect()
    }

    /// Snapshot of this scope's own bindings; used when merging imports.
    pub fn local_bindings(&self) -> Vec<(String, Value)> {
        self.0
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::value_eq;

    #[test]
    fn lookup_walks_the_scope_chain() {
        let root = Env::root();
        root.define("x", Value::Number(1.0));
        let inner = root.child().child();
        assert!(value_eq(&inner.get("x").unwrap(), &Value::Number(1.0)));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let root = Env::root();
        root.define("x", Value::Number(1.0));
        let inner = root.child();
        inner.define("x", Value::Number(2.0));
        assert!(value_eq(&inner.get("x").unwrap(), &Value::Number(2.0)));
        assert!(value_eq(&root.get("x").unwrap(), &Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_the_defining_scope() {
        let root = Env::root();
        root.define("count", Value::Number(0.0));
        let inner = root.child();
        inner.assign("count", Value::Number(5.0)).unwrap();
        assert!(value_eq(&root.get("count").unwrap(), &Value::Number(5.0)));
    }

    #[test]
    fn assign_to_missing_name_is_an_error() {
        let env = Env::root();
        assert!(matches!(
            env.assign("ghost", Value::Null),
            Err(RuntimeError::VariableNotFound(_))
        ));
    }
}
