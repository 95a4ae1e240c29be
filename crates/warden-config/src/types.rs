//! Configuration types.
//!
//! Every struct implements [`Default`] with the same values as the embedded
//! `defaults.toml`, so a bare `[section]` header still yields a working
//! configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level, format and directives.
    pub logging: LoggingSection,
    /// Which policy file to load and the fallback domain.
    pub policy: PolicySection,
    /// Permission prompt behaviour.
    pub security: SecuritySection,
    /// Where suite settings live.
    pub storage: StorageSection,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base filter level.
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra per-target filter directives.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}

/// `[policy]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// Policy file. `None` uses the embedded policy.
    pub path: Option<PathBuf>,
    /// Domain used for unknown or absent domain names.
    pub fallback_domain: String,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            path: None,
            fallback_domain: "untrusted".to_owned(),
        }
    }
}

/// `[security]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Seconds to wait for a prompt answer; 0 waits forever.
    pub prompt_timeout_secs: u64,
    /// Save suite settings as soon as a run changed them.
    pub persist_on_grant: bool,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            prompt_timeout_secs: 0,
            persist_on_grant: true,
        }
    }
}

impl SecuritySection {
    /// The prompt timeout, if one is configured.
    #[must_use]
    pub fn prompt_timeout(&self) -> Option<Duration> {
        (self.prompt_timeout_secs > 0).then(|| Duration::from_secs(self.prompt_timeout_secs))
    }
}

/// Settings backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Nothing survives the process.
    #[default]
    Memory,
    /// Embedded `SurrealKV` tree under `data_dir`.
    Surrealkv,
}

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Data directory. `None` means `~/.warden/data`.
    pub data_dir: Option<PathBuf>,
    /// Backend kind.
    pub backend: StorageBackend,
}

impl StorageSection {
    /// Configured data directory, or `~/.warden/data`.
    #[must_use]
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            directories::BaseDirs::new().map(|d| d.home_dir().join(".warden").join("data"))
        })
    }
}
