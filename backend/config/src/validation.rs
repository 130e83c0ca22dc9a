//! Config validation with user-friendly error messages.

use crate::schema::BankBotConfig;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BankBotConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_api(config, &mut report);
    validate_auth(config, &mut report);
    validate_logging(config, &mut report);
    validate_chat(config, &mut report);
    report
}

fn validate_api(config: &BankBotConfig, report: &mut ValidationReport) {
    let url = config.base_url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        report.error(
            "api.baseUrl",
            format!("'{url}' is not an http(s) URL"),
        );
    } else if url.starts_with("http://")
        && !url.contains("localhost")
        && !url.contains("127.0.0.1")
    {
        report.warn("api.baseUrl", "Credentials will be sent over plain http");
    }
    if config.request_timeout().is_zero() {
        report.error("api.requestTimeoutSecs", "requestTimeoutSecs must be > 0");
    }
}

fn validate_auth(config: &BankBotConfig, report: &mut ValidationReport) {
    let window = config.refresh_window();
    let proactive = config.proactive_refresh_window();
    if window.is_zero() {
        report.error("auth.refreshWindowSecs", "refreshWindowSecs must be > 0");
    }
    if proactive.is_zero() {
        report.error("auth.proactiveRefreshSecs", "proactiveRefreshSecs must be > 0");
    }
    if config.refresh_check_interval().is_zero() {
        report.error(
            "auth.refreshCheckIntervalSecs",
            "refreshCheckIntervalSecs must be > 0",
        );
    }
    if proactive < window {
        report.warn(
            "auth.proactiveRefreshSecs",
            "Proactive window is smaller than the request refresh window; background refresh will rarely run",
        );
    }
}

fn validate_logging(config: &BankBotConfig, report: &mut ValidationReport) {
    let level = config.log_level();
    // Full filter directives like `bankbot=debug,reqwest=warn` are accepted as-is.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.error(
            "logging.level",
            format!("Unknown log level '{level}'. Use one of {}", LOG_LEVELS.join(", ")),
        );
    }
}

fn validate_chat(config: &BankBotConfig, report: &mut ValidationReport) {
    if config.history_limit() == 0 {
        report.warn("chat.historyLimit", "historyLimit is 0; conversations will load empty");
    }
}
