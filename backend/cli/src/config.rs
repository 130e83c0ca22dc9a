use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bankbot_client::{ApiClient, FileSessionStore};
use bankbot_config::{
    config_dir, config_file_path, load_and_prepare, log_report, schema::ApiConfig, validate,
    BankBotConfig, ValidationReport,
};
use bankbot_logging::init_logger;
use bankbot_tui::UiOptions;

/// Resolved client configuration for one CLI invocation.
pub struct Config {
    /// Directory holding `config.yaml`, the session file and logs.
    pub dir: PathBuf,
    pub file: BankBotConfig,
    pub report: ValidationReport,
}

impl Config {
    /// Load `config.yaml`, then apply command-line overrides on top.
    pub async fn load(dir: Option<PathBuf>, api_url: Option<String>) -> Result<Self> {
        let dir = dir.unwrap_or_else(config_dir);
        let (mut file, mut report) = load_and_prepare(&config_file_path(&dir)).await?;
        if let Some(url) = api_url {
            file.api.get_or_insert_with(ApiConfig::default).base_url = Some(url);
            report = validate(&file);
        }
        Ok(Self { dir, file, report })
    }

    pub fn file_path(&self) -> PathBuf {
        config_file_path(&self.dir)
    }

    pub fn init_logging(&self, console: bool) -> Result<()> {
        init_logger(self.file.log_dir(&self.dir), self.file.log_level(), console)?;
        log_report(&self.report);
        Ok(())
    }

    /// Fail with every validation error when the config cannot be used.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.report.is_valid() {
            return Ok(());
        }
        let errors: Vec<String> = self.report.errors.iter().map(|e| e.to_string()).collect();
        bail!(
            "Invalid configuration in {}:\n  {}",
            self.file_path().display(),
            errors.join("\n  ")
        )
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        let store = FileSessionStore::new(self.file.session_file(&self.dir));
        let window = chrono::Duration::from_std(self.file.refresh_window())
            .context("refresh window is out of range")?;
        let client = ApiClient::with_connect_timeout(
            self.file.base_url(),
            Box::new(store),
            self.file.request_timeout(),
        )?;
        Ok(client.with_refresh_window(window))
    }

    pub fn ui_options(&self) -> Result<UiOptions> {
        Ok(UiOptions {
            history_limit: self.file.history_limit(),
            proactive_refresh_window: chrono::Duration::from_std(
                self.file.proactive_refresh_window(),
            )
            .context("proactive refresh window is out of range")?,
            refresh_check_interval: self.file.refresh_check_interval(),
        })
    }
}
