use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_logging(config)?;
    validate_policy(config)?;
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let format = config.logging.format.to_ascii_lowercase();
    if !LOG_FORMATS.contains(&format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unknown format '{}'; expected one of: {}",
                config.logging.format,
                LOG_FORMATS.join(", ")
            ),
        });
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn validate_policy(config: &Config) -> ConfigResult<()> {
    if config.policy.fallback_domain.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "policy.fallback_domain".to_owned(),
            message: "must name a domain".to_owned(),
        });
    }
    if let Some(path) = &config.policy.path
        && !path.is_file()
    {
        return Err(ConfigError::ValidationError {
            field: "policy.path".to_owned(),
            message: format!("{} does not exist", path.display()),
        });
    }
    Ok(())
}
