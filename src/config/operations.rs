//! Config loading and validation.

use super::model::ManagerConfig;
use crate::error::{ManagerError, Result};
use std::path::Path;

impl ManagerConfig {
    /// Load config from a YAML file, or defaults when the file does not exist.
    ///
    /// # Returns
    ///
    /// * `Ok(ManagerConfig)` - Loaded and validated config (or defaults)
    /// * `Err(ManagerError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ManagerError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content).map_err(|e| {
            ManagerError::Config(format!("{} (in '{}')", e, path.display()))
        })
    }

    /// Parse config from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: ManagerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ManagerError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `agents_dir`, `log_dir` and `session_prefix` must be non-empty
    /// - `session_prefix` may not contain `:` or `.` (tmux target separators)
    /// - `poll_interval_ms` and `settle_polls` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.agents_dir.trim().is_empty() {
            return Err(ManagerError::Config(
                "config validation failed: agents_dir must not be empty".to_string(),
            ));
        }

        if self.log_dir.trim().is_empty() {
            return Err(ManagerError::Config(
                "config validation failed: log_dir must not be empty".to_string(),
            ));
        }

        if self.session_prefix.is_empty() {
            return Err(ManagerError::Config(
                "config validation failed: session_prefix must not be empty".to_string(),
            ));
        }

        if self.session_prefix.contains([':', '.']) {
            return Err(ManagerError::Config(format!(
                "config validation failed: session_prefix '{}' must not contain ':' or '.'",
                self.session_prefix
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(ManagerError::Config(
                "config validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.settle_polls == 0 {
            return Err(ManagerError::Config(
                "config validation failed: settle_polls must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
