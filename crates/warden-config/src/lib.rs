#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the Warden runtime supervisor.
//!
//! # Usage
//!
//! ```rust,no_run
//! use warden_config::Config;
//!
//! let resolved = Config::load(None).unwrap();
//! println!("log level: {}", resolved.config.logging.level);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. **Explicit file** (`--config <path>`)
//! 2. **User** (`~/.warden/config.toml`)
//! 3. **System** (`/etc/warden/config.toml`)
//! 4. **Environment** (`WARDEN_*`), fallback only: applied to fields no file set
//! 5. **Embedded defaults** (`defaults.toml`)
//!
//! This crate has no dependencies on other warden crates. The CLI converts
//! these sections into telemetry, policy and storage settings at startup.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// File discovery and layered loading.
pub mod loader;
/// Deep merge of TOML trees with per-field provenance.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Post-merge validation.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{LoadOptions, ResolvedConfig};
pub use merge::{ConfigLayer, FieldSources};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the
    /// merged configuration fails validation.
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(&LoadOptions {
            explicit: explicit.map(std::path::Path::to_path_buf),
            ..LoadOptions::default()
        })
    }
}
