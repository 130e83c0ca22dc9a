//! `bankbot-config`: Banking Bot client configuration.
//!
//! Provides:
//! - Typed config schema with resolved accessors
//! - YAML read/write (`~/.bankbot/config.yaml`)
//! - `${ENV_VAR}` substitution and `BANKBOT_*` overrides
//! - Default value application
//! - Validation report

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

// Re-export most-used types at crate root.
pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides_with, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use schema::BankBotConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load a config file, resolve env references and overrides, apply defaults,
/// and validate.
///
/// The report is returned rather than logged because the logger is usually
/// configured from the result.
pub async fn load_and_prepare(path: &Path) -> Result<(BankBotConfig, ValidationReport)> {
    load_and_prepare_with(path, &std::env::vars().collect()).await
}

/// [`load_and_prepare`] against a provided environment.
pub async fn load_and_prepare_with(
    path: &Path,
    env: &HashMap<String, String>,
) -> Result<(BankBotConfig, ValidationReport)> {
    let value = io::load_config_value(path).await?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: BankBotConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(apply_env_overrides_with(config, env));
    let report = validate(&config);
    Ok((config, report))
}

/// Log every warning and error in a report.
pub fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(name: &str, yaml: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bankbot-prepare-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = config_file_path(&dir);
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[tokio::test]
    async fn full_pipeline() {
        let path = scratch_file(
            "full",
            "api:\n  baseUrl: https://${BANK_HOST}\nlogging:\n  level: warn\n",
        );
        let env: HashMap<String, String> = [
            ("BANK_HOST".to_string(), "bank.test".to_string()),
            ("BANKBOT_LOG_LEVEL".to_string(), "debug".to_string()),
        ]
        .into_iter()
        .collect();

        let (cfg, report) = load_and_prepare_with(&path, &env).await.unwrap();
        assert!(report.is_valid());
        assert_eq!(cfg.base_url(), "https://bank.test");
        assert_eq!(cfg.log_level(), "debug");
        assert_eq!(cfg.refresh_window().as_secs(), 300);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_reference_fails_load() {
        let path = scratch_file("missing-ref", "api:\n  baseUrl: ${NOT_SET_ANYWHERE}\n");
        let err = load_and_prepare_with(&path, &HashMap::new()).await.unwrap_err();
        assert!(format!("{err:#}").contains("NOT_SET_ANYWHERE"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn invalid_values_are_reported_not_fatal() {
        let path = scratch_file("invalid", "api:\n  baseUrl: bank.test\n");
        let (cfg, report) = load_and_prepare_with(&path, &HashMap::new()).await.unwrap();
        assert_eq!(cfg.base_url(), "bank.test");
        assert!(!report.is_valid());
        let _ = std::fs::remove_file(&path);
    }
}
