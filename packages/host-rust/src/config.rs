//! Startup configuration for the interception layer.

use std::path::{Path, PathBuf};

use quest_events_core::{ListenerFailurePolicy, OperationId};
use serde::{Deserialize, Serialize};

/// Interception settings, usually read from `config/config.json`.
///
/// JSON keys are camelCase; every field has a default, so a partial file is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterceptConfig {
    /// When false, nothing is patched or rerouted.
    pub enabled: bool,
    /// Enables debug-level logging and per-call pass-through diagnostics.
    pub debug: bool,
    /// Operation names to wrap. Names outside this list are never wrapped.
    pub methods_to_patch: Vec<String>,
    /// Prefix attached to every log line emitted under the root span.
    pub logger_prefix: String,
    /// Operation whose identity proves a reroute took effect. Defaults to the
    /// first entry of `methods_to_patch`.
    pub sentinel_operation: Option<String>,
    /// Reaction to listener errors.
    pub listener_failure_policy: ListenerFailurePolicy,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            methods_to_patch: OperationId::ALL
                .iter()
                .map(|op| op.name().to_string())
                .collect(),
            logger_prefix: "[QuestEvents] ".to_string(),
            sentinel_operation: None,
            listener_failure_policy: ListenerFailurePolicy::Propagate,
        }
    }
}

impl InterceptConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this type, and
    /// [`ConfigError::Invalid`] if [`validate`](Self::validate) rejects it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if interception is enabled with an
    /// empty whitelist, or the sentinel is not whitelisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.methods_to_patch.is_empty() {
            return Err(ConfigError::Invalid(
                "methodsToPatch must name at least one operation".to_string(),
            ));
        }
        if let Some(sentinel) = &self.sentinel_operation {
            if !self.methods_to_patch.contains(sentinel) {
                return Err(ConfigError::Invalid(format!(
                    "sentinelOperation {sentinel} is not listed in methodsToPatch"
                )));
            }
        }
        Ok(())
    }
}

/// Errors from loading or validating [`InterceptConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
