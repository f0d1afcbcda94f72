//! Runtime configuration for the Nestbox supervisor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{NestboxError, Result};

/// Host-side settings that do not vary per container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory under which each cgroup v1 subsystem is mounted.
    pub cgroup_root: PathBuf,
    /// Shell executed inside the container.
    pub shell: PathBuf,
    /// Archive extraction tool.
    pub extract_tool: String,
    /// Network namespace attach tool.
    pub network_tool: String,
    /// Stack size for the cloned child, in bytes.
    pub stack_size: usize,
    /// Backoff before retrying an interrupted wait, in milliseconds.
    pub wait_backoff_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from(constants::CGROUP_ROOT),
            shell: PathBuf::from(constants::DEFAULT_SHELL),
            extract_tool: constants::DEFAULT_EXTRACT_TOOL.into(),
            network_tool: constants::DEFAULT_NETWORK_TOOL.into(),
            stack_size: constants::DEFAULT_STACK_SIZE,
            wait_backoff_ms: constants::DEFAULT_WAIT_BACKOFF_MS,
        }
    }
}

impl RuntimeConfig {
    /// Loads a JSON configuration file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NestboxError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| {
            NestboxError::config(format!("{}: {e}", path.display()))
        })
    }

    /// Applies `NESTBOX_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(constants::ENV_CGROUP_ROOT) {
            self.cgroup_root = PathBuf::from(root);
        }
        if let Some(shell) = lookup(constants::ENV_SHELL) {
            self.shell = PathBuf::from(shell);
        }
        if let Some(tool) = lookup(constants::ENV_EXTRACT_TOOL) {
            self.extract_tool = tool;
        }
        if let Some(tool) = lookup(constants::ENV_NETWORK_TOOL) {
            self.network_tool = tool;
        }
        self
    }

    /// Checks values that would otherwise fail deep inside the launcher.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a relative shell path or a stack
    /// too small to run the child's initialization.
    pub fn validate(&self) -> Result<()> {
        if !self.shell.is_absolute() {
            return Err(NestboxError::config(format!(
                "shell must be an absolute path: {}",
                self.shell.display()
            )));
        }
        if self.stack_size < 64 * 1024 {
            return Err(NestboxError::config(format!(
                "stack_size too small: {} bytes",
                self.stack_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nestbox.json");
        std::fs::write(&path, r#"{ "shell": "/bin/bash", "wait_backoff_ms": 5 }"#).unwrap();

        let cfg = RuntimeConfig::load(&path).unwrap();
        assert_eq!(cfg.shell, PathBuf::from("/bin/bash"));
        assert_eq!(cfg.wait_backoff_ms, 5);
        assert_eq!(cfg.cgroup_root, PathBuf::from(constants::CGROUP_ROOT));
        assert_eq!(cfg.stack_size, constants::DEFAULT_STACK_SIZE);
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ shell").unwrap();
        assert!(matches!(
            RuntimeConfig::load(&path),
            Err(NestboxError::Config { .. })
        ));
    }

    #[test]
    fn overrides_replace_only_present_keys() {
        let cfg = RuntimeConfig::default().with_overrides(|key| {
            (key == constants::ENV_CGROUP_ROOT).then(|| "/tmp/cg".to_string())
        });
        assert_eq!(cfg.cgroup_root, PathBuf::from("/tmp/cg"));
        assert_eq!(cfg.extract_tool, constants::DEFAULT_EXTRACT_TOOL);
    }

    #[test]
    fn validate_rejects_relative_shell() {
        let cfg = RuntimeConfig {
            shell: PathBuf::from("sh"),
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(RuntimeConfig::default().validate().is_ok());
    }
}
