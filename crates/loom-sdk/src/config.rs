//! Repository configuration, loaded from TOML.
//!
//! ```toml
//! [storage]
//! path = "/var/lib/loom"   # omit for an in-memory repository
//!
//! [sync]
//! timeout_ms = 30000
//! default_remote = "origin"
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every section and key is optional.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use loom_sync::SyncOptions;

use crate::error::{SdkError, SdkResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoomConfig {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Root of the filesystem backend. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Upper bound on each transport call, in milliseconds.
    pub timeout_ms: u64,
    pub default_remote: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            default_remote: "origin".into(),
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl LoomConfig {
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    fn validate(&self) -> SdkResult<()> {
        if self.sync.timeout_ms == 0 {
            return Err(SdkError::Config("sync.timeout_ms must be positive".into()));
        }
        loom_refs::validate_remote_name(&self.sync.default_remote)
            .map_err(|e| SdkError::Config(format!("sync.default_remote: {e}")))?;
        self.log.max_level()?;
        Ok(())
    }
}

impl LogConfig {
    pub fn max_level(&self) -> SdkResult<tracing::Level> {
        self.level
            .parse()
            .map_err(|_| SdkError::Config(format!("unknown log level {:?}", self.level)))
    }
}
