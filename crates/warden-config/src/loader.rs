//! Config file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `/etc/warden/config.toml`
//! 3. Merge `~/.warden/config.toml`
//! 4. Merge the explicit `--config` file (must exist)
//! 5. Apply `WARDEN_*` fallbacks for fields no file set
//! 6. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge, record_leaves};
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Config files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// Inputs to [`load`]. The defaults discover everything from the process.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// File given with `--config`.
    pub explicit: Option<PathBuf>,
    /// Directory holding the user `config.toml`. `None` means `~/.warden`.
    pub user_dir: Option<PathBuf>,
    /// System file; `None` skips the system layer.
    pub system_file: Option<PathBuf>,
    /// Environment to read fallbacks from. `None` reads the process env.
    pub env: Option<HashMap<String, String>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            explicit: None,
            user_dir: None,
            system_file: Some(PathBuf::from("/etc/warden/config.toml")),
            env: None,
        }
    }
}

/// A loaded configuration plus where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The effective configuration.
    pub config: Config,
    /// Dotted path → layer that set it.
    pub field_sources: FieldSources,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<String>,
}

/// Load configuration according to `options`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, the
/// explicit file is missing, or the result fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut sources);

    if let Some(system) = &options.system_file
        && let Some(overlay) = try_load_file(system)?
    {
        deep_merge(&mut merged, &overlay, "", &ConfigLayer::System, &mut sources);
        loaded_files.push(system.display().to_string());
        info!(path = %system.display(), "loaded system config");
    }

    let user_dir = match &options.user_dir {
        Some(dir) => Some(dir.clone()),
        None => home_directory().ok().map(|h| h.join(".warden")),
    };
    if let Some(dir) = user_dir {
        let path = dir.join("config.toml");
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay, "", &ConfigLayer::User, &mut sources);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), "loaded user config");
        }
    }

    if let Some(path) = &options.explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        })?;
        let layer = ConfigLayer::Explicit(path.display().to_string());
        deep_merge(&mut merged, &overlay, "", &layer, &mut sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded explicit config");
    }

    let env_count = match &options.env {
        Some(vars) => apply_env_fallbacks(&mut merged, &mut sources, vars)?,
        None => apply_env_fallbacks(&mut merged, &mut sources, &collect_env_vars())?,
    };
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources: sources,
        loaded_files,
    })
}

/// Load a single file without layering.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let value = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
    })?;
    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;
    validate::validate(&config)?;
    Ok(config)
}

/// `None` when the file does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
