//! Banking Bot client configuration schema.
//!
//! Every field is optional on disk; [`crate::apply_all_defaults`] fills the
//! gaps and the accessors below read the resolved values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::defaults::{
    DEFAULT_API_URL, DEFAULT_HISTORY_LIMIT, DEFAULT_LOG_LEVEL, DEFAULT_PROACTIVE_REFRESH_SECS,
    DEFAULT_REFRESH_CHECK_INTERVAL_SECS, DEFAULT_REFRESH_WINDOW_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankBotConfig {
    /// Backend location and HTTP behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Token refresh timing and session storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    /// Log level and log file directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Conversation view settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Requests refresh the token first when it expires within this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_window_secs: Option<u64>,
    /// The background check refreshes when expiry is within this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proactive_refresh_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_check_interval_secs: Option<u64>,
    /// Where the session token is persisted. Relative paths resolve against the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// How many messages `GET /chat/history` is asked for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

impl BankBotConfig {
    pub fn base_url(&self) -> &str {
        self.api
            .as_ref()
            .and_then(|a| a.base_url.as_deref())
            .unwrap_or(DEFAULT_API_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        let secs = self.api.as_ref().and_then(|a| a.request_timeout_secs);
        Duration::from_secs(secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn refresh_window(&self) -> Duration {
        let secs = self.auth.as_ref().and_then(|a| a.refresh_window_secs);
        Duration::from_secs(secs.unwrap_or(DEFAULT_REFRESH_WINDOW_SECS))
    }

    pub fn proactive_refresh_window(&self) -> Duration {
        let secs = self.auth.as_ref().and_then(|a| a.proactive_refresh_secs);
        Duration::from_secs(secs.unwrap_or(DEFAULT_PROACTIVE_REFRESH_SECS))
    }

    pub fn refresh_check_interval(&self) -> Duration {
        let secs = self.auth.as_ref().and_then(|a| a.refresh_check_interval_secs);
        Duration::from_secs(secs.unwrap_or(DEFAULT_REFRESH_CHECK_INTERVAL_SECS))
    }

    pub fn session_file(&self, config_dir: &Path) -> PathBuf {
        let file = self
            .auth
            .as_ref()
            .and_then(|a| a.session_file.clone())
            .unwrap_or_else(|| PathBuf::from("session.json"));
        config_dir.join(file)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self, config_dir: &Path) -> PathBuf {
        let dir = self
            .logging
            .as_ref()
            .and_then(|l| l.dir.clone())
            .unwrap_or_else(|| PathBuf::from("logs"));
        config_dir.join(dir)
    }

    pub fn history_limit(&self) -> u32 {
        self.chat
            .as_ref()
            .and_then(|c| c.history_limit)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}
