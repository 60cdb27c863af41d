//=====================================================
// File: config.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: Toolchain configuration
// Objective: Load `aml.toml` from the working directory or the user config
//            directory, with defaults when absent
//=====================================================

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "aml.toml";

/// Configuration model loaded from TOML. Every field has a default, so a
/// partial file is fine and a missing file means defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AmlConfig {
    /// Extra module search roots, checked before the built-in ones.
    pub search_paths: Vec<PathBuf>,
    /// When set, only the named plugins resolve through `import_py`.
    pub plugin_allowlist: Option<Vec<String>>,
    /// Yield the executing thread every N statements (0 disables pacing).
    pub yield_every: u64,
    /// Sleep duration in milliseconds for each pacing yield.
    pub yield_sleep_ms: u64,
}

impl Default for AmlConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            plugin_allowlist: None,
            yield_every: 0,
            yield_sleep_ms: 0,
        }
    }
}

impl AmlConfig {
    /// Load configuration: `./aml.toml` wins over the user config directory;
    /// absence of both yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Self::load_from(&local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("aml").join(CONFIG_FILE);
            if user.is_file() {
                return Self::load_from(&user);
            }
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        let config: Self = toml::from_str(&data)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "yield_every = 50\n").unwrap();
        let config = AmlConfig::load_from(&path).expect("load");
        assert_eq!(config.yield_every, 50);
        assert_eq!(config.yield_sleep_ms, 0);
        assert!(config.search_paths.is_empty());
        assert!(config.plugin_allowlist.is_none());
    }

    #[test]
    fn allowlist_is_read_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "plugin_allowlist = [\"console\"]\n").unwrap();
        let config = AmlConfig::load_from(&path).expect("load");
        assert_eq!(config.plugin_allowlist, Some(vec!["console".to_string()]));
    }

    #[test]
    fn malformed_toml_is_a_context_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "yield_every = [nope").unwrap();
        let err = AmlConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parsing configuration"));
    }

    #[test]
    fn search_paths_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "search_paths = [\"lib\", \"vendor/aml\"]\n").unwrap();
        let config = AmlConfig::load_from(&path).expect("load");
        assert_eq!(
            config.search_paths,
            vec![PathBuf::from("lib"), PathBuf::from("vendor/aml")]
        );
    }
}
