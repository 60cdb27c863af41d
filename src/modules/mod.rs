//=====================================================
// File: modules.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: AML script-module resolution and caching
// Objective: Locate import_aml targets on the search path, gate reloads
//            through a cache, and detect cyclic imports
//=====================================================

use crate::interpreter::value::Value;
use crate::parser::ParseError;
use crate::tokenizer::LexError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub type ModuleExports = Vec<(String, Value)>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("module '{module}' could not be located")]
    NotFound { module: String },
    #[error("failed reading module '{}': {error}", path.display())]
    Io { path: PathBuf, error: String },
    #[error("failed tokenizing module '{}': {error}", path.display())]
    Lex { path: PathBuf, error: LexError },
    #[error("failed parsing module '{}': {error}", path.display())]
    Parse { path: PathBuf, error: ParseError },
    #[error("cyclic import detected for module '{module}'")]
    Cyclic { module: String },
    #[error("module '{}' failed during execution: {message}", path.display())]
    Execution { path: PathBuf, message: String },
    #[error("plugin module '{module}' is not registered")]
    UnknownPlugin { module: String },
}

#[derive(Clone)]
enum ModuleState {
    Initializing,
    Ready(Arc<ModuleExports>),
}

/// Search-path resolver plus per-path cache for AML script modules.
///
/// The interpreter drives parsing and execution; the loader owns location,
/// caching, and the in-progress marker that turns recursive imports into
/// [`ImportError::Cyclic`] instead of a stack overflow.
#[derive(Default)]
pub struct ModuleLoader {
    search_paths: Mutex<Vec<PathBuf>>,
    cache: Mutex<HashMap<PathBuf, ModuleState>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default roots: the working directory plus the user module directory.
    pub fn with_default_paths() -> Self {
        let loader = Self::new();
        if let Ok(cwd) = std::env::current_dir() {
            loader.add_search_path(cwd);
        }
        if let Some(home) = dirs::home_dir() {
            loader.add_search_path(home.join(".aml").join("modules"));
        }
        loader
    }

    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut paths = self.search_paths.lock();
        if !paths.contains(&path) {
            // Script-local directories are pushed during run_file; earlier
            // entries win, matching the original resolution order.
            paths.push(path);
        }
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.lock().clone()
    }

    /// Map a module name (`utils.curves`, `lib/helpers`) to an existing
    /// `.aml` file under the search roots.
    pub fn resolve(&self, module: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for part in module.split(['.', '/', '\\']) {
            relative.push(part);
        }
        relative.set_extension("aml");
        for base in self.search_paths.lock().iter() {
            let candidate = base.join(&relative);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Begin loading `path`. `Ok(Some(..))` is a cache hit; `Ok(None)` marks
    /// the module in-progress and obligates the caller to `finish` or `abort`.
    pub fn begin(&self, module: &str, path: &Path) -> Result<Option<Arc<ModuleExports>>, ImportError> {
        let mut cache = self.cache.lock();
        match cache.get(path) {
            Some(ModuleState::Ready(exports)) => Ok(Some(exports.clone())),
            Some(ModuleState::Initializing) => Err(ImportError::Cyclic {
                module: module.to_string(),
            }),
            None => {
                cache.insert(path.to_path_buf(), ModuleState::Initializing);
                Ok(None)
            }
        }
    }

    pub fn finish(&self, path: &Path, exports: ModuleExports) -> Arc<ModuleExports> {
        let exports = Arc::new(exports);
        self.cache
            .lock()
            .insert(path.to_path_buf(), ModuleState::Ready(exports.clone()));
        exports
    }

    /// Drop the in-progress marker after a failed load so a later import can
    /// retry.
    pub fn abort(&self, path: &Path) {
        let mut cache = self.cache.lock();
        if matches!(cache.get(path), Some(ModuleState::Initializing)) {
            cache.remove(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_dotted_names_under_search_roots() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/util.aml"), "var x = 1").unwrap();

        let loader = ModuleLoader::new();
        loader.add_search_path(dir.path());
        assert_eq!(
            loader.resolve("lib.util"),
            Some(dir.path().join("lib/util.aml"))
        );
        assert_eq!(
            loader.resolve("lib/util"),
            Some(dir.path().join("lib/util.aml"))
        );
        assert!(loader.resolve("lib.missing").is_none());
    }

    #[test]
    fn begin_marks_in_progress_and_detects_cycles() {
        let loader = ModuleLoader::new();
        let path = PathBuf::from("/tmp/cycle.aml");
        assert!(loader.begin("cycle", &path).unwrap().is_none());
        assert!(matches!(
            loader.begin("cycle", &path),
            Err(ImportError::Cyclic { .. })
        ));
        loader.finish(&path, vec![("x".into(), Value::Number(1.0))]);
        let cached = loader.begin("cycle", &path).unwrap().expect("cache hit");
        assert_eq!(cached.len(), 1);
    }

    #[test]
    fn abort_clears_the_marker() {
        let loader = ModuleLoader::new();
        let path = PathBuf::from("/tmp/fail.aml");
        assert!(loader.begin("fail", &path).unwrap().is_none());
        loader.abort(&path);
        assert!(loader.begin("fail", &path).unwrap().is_none());
    }
}
