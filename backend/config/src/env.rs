//! Environment handling for config values.
//!
//! `${VAR_NAME}` references in string values are resolved at load time
//! (uppercase `[A-Z_][A-Z0-9_]*` names only); `$${VAR}` escapes to a literal
//! `${VAR}`. A few `BANKBOT_*` variables override fields directly.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::schema::{ApiConfig, BankBotConfig, LoggingConfig};

/// Optional leading `$` marks an escaped reference.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const API_URL_VAR: &str = "BANKBOT_API_URL";
pub const LOG_LEVEL_VAR: &str = "BANKBOT_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "BANKBOT_LOG_DIR";

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config value tree from `env`.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply `BANKBOT_*` overrides from a provided map. Empty values are ignored.
pub fn apply_env_overrides_with(
    mut config: BankBotConfig,
    env: &HashMap<String, String>,
) -> BankBotConfig {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(url) = get(API_URL_VAR) {
        config.api.get_or_insert_with(ApiConfig::default).base_url = Some(url.to_string());
    }
    if let Some(level) = get(LOG_LEVEL_VAR) {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level.to_string());
    }
    if let Some(dir) = get(LOG_DIR_VAR) {
        config.logging.get_or_insert_with(LoggingConfig::default).dir = Some(PathBuf::from(dir));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_var() {
        let v = json!({"api": {"baseUrl": "https://${BANK_HOST}:8443"}});
        let result = resolve_env_vars_with(&v, &env(&[("BANK_HOST", "bank.test")])).unwrap();
        assert_eq!(result["api"]["baseUrl"], "https://bank.test:8443");
    }

    #[test]
    fn error_names_missing_var_and_path() {
        let v = json!({"logging": {"dir": "${LOG_ROOT}/bankbot"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("LOG_ROOT"));
        assert!(err.contains("logging.dir"));
    }

    #[test]
    fn escaped_reference_is_kept_literally() {
        let v = json!({"note": "$${HOME} stays"});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result["note"], "${HOME} stays");
    }

    #[test]
    fn non_string_values_pass_through() {
        let v = json!({"chat": {"historyLimit": 10}, "tags": ["a", "$plain"]});
        let result = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(result, v);
    }

    #[test]
    fn overrides_replace_file_values() {
        let cfg = BankBotConfig {
            api: Some(ApiConfig {
                base_url: Some("http://from-file".into()),
                request_timeout_secs: Some(3),
            }),
            ..Default::default()
        };
        let cfg = apply_env_overrides_with(
            cfg,
            &env(&[
                (API_URL_VAR, "https://override.test"),
                (LOG_LEVEL_VAR, "debug"),
                (LOG_DIR_VAR, "  "),
            ]),
        );
        assert_eq!(cfg.base_url(), "https://override.test");
        assert_eq!(cfg.request_timeout().as_secs(), 3);
        assert_eq!(cfg.log_level(), "debug");
        assert!(cfg.logging.unwrap().dir.is_none());
    }
}
