//! Environment variables are a **fallback**: they only fill fields that no
//! config file set.

use std::collections::HashMap;
use std::hash::BuildHasher;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};

#[derive(Clone, Copy)]
enum Kind {
    Str,
    Int,
}

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "WARDEN_LOG_LEVEL",
        field_path: "logging.level",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_LOG_FORMAT",
        field_path: "logging.format",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_POLICY",
        field_path: "policy.path",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_DATA_DIR",
        field_path: "storage.data_dir",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "WARDEN_PROMPT_TIMEOUT_SECS",
        field_path: "security.prompt_timeout_secs",
        kind: Kind::Int,
    },
];

/// Snapshot of the process environment, limited to `WARDEN_*`.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("WARDEN_"))
        .collect()
}

/// Apply fallbacks for every mapped variable whose field is not attributed
/// to a file layer. Returns how many were applied.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a numeric variable does not parse.
pub fn apply_env_fallbacks<S: BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };

        let value = match mapping.kind {
            Kind::Str => toml::Value::String(raw.clone()),
            Kind::Int => {
                let n: i64 = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                    var_name: mapping.var_name.to_owned(),
                    message: format!("expected a non-negative integer, got '{raw}'"),
                })?;
                toml::Value::Integer(n)
            },
        };

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var fallback"
        );
        set_field(merged, mapping.field_path, value);
        sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::record_leaves;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fills_default_and_missing_fields() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"\n").unwrap();
        let mut sources = FieldSources::new();
        record_leaves(&merged, "", &ConfigLayer::Defaults, &mut sources);

        let vars = env(&[("WARDEN_LOG_LEVEL", "trace"), ("WARDEN_POLICY", "/tmp/p.txt")]);
        let applied = apply_env_fallbacks(&mut merged, &mut sources, &vars).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(merged["logging"]["level"].as_str(), Some("trace"));
        assert_eq!(merged["policy"]["path"].as_str(), Some("/tmp/p.txt"));
        assert_eq!(sources.get("policy.path"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_file_value_wins() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let vars = env(&[("WARDEN_LOG_LEVEL", "trace")]);
        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &vars).unwrap(), 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_integer_coercion() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();

        let vars = env(&[("WARDEN_PROMPT_TIMEOUT_SECS", "30")]);
        apply_env_fallbacks(&mut merged, &mut sources, &vars).unwrap();
        assert_eq!(merged["security"]["prompt_timeout_secs"].as_integer(), Some(30));

        let bad = env(&[("WARDEN_PROMPT_TIMEOUT_SECS", "soon")]);
        let err = apply_env_fallbacks(&mut merged, &mut FieldSources::new(), &bad).unwrap_err();
        assert!(matches!(err, ConfigError::EnvError { .. }));
    }
}
