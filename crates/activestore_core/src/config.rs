//! Store configuration and the process-wide default.
//!
//! # Responsibility
//! - Describe where a store lives and how connections are tuned.
//! - Hold the optional default configuration used by the per-thread
//!   default store wrapper.
//!
//! # Invariants
//! - The default configuration is set at most once per process.
//! - Re-setting an identical configuration is a no-op; a different one is
//!   rejected.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

static DEFAULT_CONFIG: OnceCell<StoreConfig> = OnceCell::new();

/// Physical location of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// SQLite database file, opened in WAL mode.
    File(PathBuf),
    /// Named in-memory database shared by every store opened with the same
    /// name. Lives while at least one of those stores stays open.
    Memory { name: String },
}

impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Memory { name } => write!(f, "memory:{name}"),
        }
    }
}

/// Connection settings shared by every store opened from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// How long a writer waits for the store's write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl StoreConfig {
    /// File-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Fresh in-memory store with a unique name.
    pub fn in_memory() -> Self {
        Self::named_memory(format!("activestore-{}", Uuid::new_v4().simple()))
    }

    /// In-memory store shared by every config carrying the same `name`.
    pub fn named_memory(name: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::Memory { name: name.into() },
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub(crate) fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Default-configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("default store already configured at `{existing}`; refusing to switch to `{requested}`")]
    AlreadyConfigured { existing: String, requested: String },
}

/// Sets the process default store configuration.
///
/// # Errors
/// - Returns [`ConfigError::AlreadyConfigured`] when a different
///   configuration is already active.
pub fn set_default_config(config: StoreConfig) -> Result<(), ConfigError> {
    let active = DEFAULT_CONFIG.get_or_init(|| config.clone());
    if *active != config {
        return Err(ConfigError::AlreadyConfigured {
            existing: active.location.to_string(),
            requested: config.location.to_string(),
        });
    }
    Ok(())
}

/// Returns the process default store configuration, if one was set.
pub fn default_config() -> Option<&'static StoreConfig> {
    DEFAULT_CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, StoreLocation};
    use std::time::Duration;

    #[test]
    fn in_memory_configs_get_distinct_names() {
        let first = StoreConfig::in_memory();
        let second = StoreConfig::in_memory();
        assert_ne!(first, second);
        assert!(matches!(first.location, StoreLocation::Memory { .. }));
    }

    #[test]
    fn config_deserializes_with_default_timeout() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"location":{"file":"/tmp/app.sqlite3"}}"#).unwrap();
        assert_eq!(config, StoreConfig::file("/tmp/app.sqlite3"));
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }
}
