//! Structured Logger
//!
//! Wraps `tracing` to provide JSON-formatted file output with daily rotation
//! (NDJSON), an optional console layer, and `RUST_LOG`-based level control.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the log directory.
pub const LOG_FILE_NAME: &str = "bankbot.log";

/// Initialize the global structured logger.
///
/// `RUST_LOG` wins over `level`. The console layer writes to stderr and is
/// left out for the full-screen UI, which owns the terminal. Installing twice
/// is a no-op.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str, console: bool) -> Result<()> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Rolling file appender: writes NDJSON to `<dir>/bankbot.log.YYYY-MM-DD`
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_dir() {
        let dir = std::env::temp_dir().join(format!("bankbot-logs-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        init_logger(&dir, "info", false).unwrap();
        assert!(dir.is_dir());
        // A second install leaves the first subscriber in place.
        init_logger(&dir, "debug", true).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
