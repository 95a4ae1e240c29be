//! Bridge from `warden_config::Config` to telemetry types.

use warden_config::Config;
use warden_telemetry::{LogConfig, LogFormat};

/// Logging configuration for the `[logging]` section.
///
/// An unparseable format falls back to compact; config validation already
/// rejects those, so this only matters for hand-built configs.
pub(crate) fn to_log_config(config: &Config) -> LogConfig {
    let format = config
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);
    config
        .logging
        .directives
        .iter()
        .fold(
            LogConfig::new(config.logging.level.clone()).with_format(format),
            |log, directive| log.with_directive(directive.clone()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_section_maps() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        config.logging.format = "json".to_string();
        config.logging.directives = vec!["warden_scheduler=trace".to_string()];

        let log = to_log_config(&config);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["warden_scheduler=trace".to_string()]);
    }
}
