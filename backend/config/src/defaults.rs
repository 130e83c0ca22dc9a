//! Config defaults: fills unset fields of a freshly loaded config.

use crate::schema::{ApiConfig, AuthConfig, BankBotConfig, ChatConfig, LoggingConfig};

/// Backend address used when nothing is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:2024";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Requests refresh a token expiring within 5 minutes.
pub const DEFAULT_REFRESH_WINDOW_SECS: u64 = 5 * 60;

/// The background check refreshes a token expiring within 10 minutes.
pub const DEFAULT_PROACTIVE_REFRESH_SECS: u64 = 10 * 60;

pub const DEFAULT_REFRESH_CHECK_INTERVAL_SECS: u64 = 2 * 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: BankBotConfig) -> BankBotConfig {
    let config = apply_api_defaults(config);
    let config = apply_auth_defaults(config);
    let config = apply_logging_defaults(config);
    apply_chat_defaults(config)
}

fn apply_api_defaults(mut config: BankBotConfig) -> BankBotConfig {
    let api = config.api.get_or_insert_with(ApiConfig::default);
    if api.base_url.as_deref().map(str::trim).unwrap_or("").is_empty() {
        api.base_url = Some(DEFAULT_API_URL.to_string());
    }
    api.request_timeout_secs.get_or_insert(DEFAULT_REQUEST_TIMEOUT_SECS);
    config
}

fn apply_auth_defaults(mut config: BankBotConfig) -> BankBotConfig {
    let auth = config.auth.get_or_insert_with(AuthConfig::default);
    auth.refresh_window_secs.get_or_insert(DEFAULT_REFRESH_WINDOW_SECS);
    auth.proactive_refresh_secs.get_or_insert(DEFAULT_PROACTIVE_REFRESH_SECS);
    auth.refresh_check_interval_secs
        .get_or_insert(DEFAULT_REFRESH_CHECK_INTERVAL_SECS);
    config
}

fn apply_logging_defaults(mut config: BankBotConfig) -> BankBotConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if logging.level.is_none() {
        logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}

fn apply_chat_defaults(mut config: BankBotConfig) -> BankBotConfig {
    let chat = config.chat.get_or_insert_with(ChatConfig::default);
    chat.history_limit.get_or_insert(DEFAULT_HISTORY_LIMIT);
    config
}
