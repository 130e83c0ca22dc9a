//! Config file read/write.

use crate::schema::BankBotConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Env var overriding the config directory.
pub const CONFIG_DIR_VAR: &str = "BANKBOT_CONFIG_DIR";

/// Resolve the Banking Bot config directory.
/// Priority: `BANKBOT_CONFIG_DIR` env > `~/.bankbot/` > `./.bankbot`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CONFIG_DIR_VAR) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".bankbot"),
        None => PathBuf::from(".bankbot"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load the raw YAML tree from disk; a missing file is an empty mapping.
pub async fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(serde_json::Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file parses as YAML null.
    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(match value {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    })
}

/// Load and parse the config from disk without env substitution.
pub async fn load_config(path: &Path) -> Result<BankBotConfig> {
    let value = load_config_value(path).await?;
    serde_json::from_value(value)
        .with_context(|| format!("Invalid config structure at: {}", path.display()))
}

/// Write config to disk atomically (write to temp file, rename).
pub async fn write_config(config: &BankBotConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ChatConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bankbot-config-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn missing_file_is_default() {
        let dir = scratch_dir("missing");
        let cfg = load_config(&config_file_path(&dir)).await.unwrap();
        assert_eq!(cfg, BankBotConfig::default());
    }

    #[tokio::test]
    async fn write_then_load() {
        let dir = scratch_dir("write");
        let path = config_file_path(&dir);
        let cfg = BankBotConfig {
            chat: Some(ChatConfig {
                history_limit: Some(7),
            }),
            ..Default::default()
        };
        write_config(&cfg, &path).await.unwrap();
        assert!(!path.with_extension("yaml.tmp").exists());
        assert_eq!(load_config(&path).await.unwrap(), cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn empty_file_is_default() {
        let dir = scratch_dir("empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = config_file_path(&dir);
        std::fs::write(&path, "").unwrap();
        assert_eq!(load_config(&path).await.unwrap(), BankBotConfig::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn malformed_yaml_is_an_error() {
        let dir = scratch_dir("bad");
        std::fs::create_dir_all(&dir).unwrap();
        let path = config_file_path(&dir);
        std::fs::write(&path, "api: [unclosed").unwrap();
        let err = load_config(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config YAML"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
