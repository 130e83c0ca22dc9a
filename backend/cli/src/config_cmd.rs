//! CLI Config Subcommands
//!
//! `config show`, `config path` and `config init`.

use anyhow::{bail, Context, Result};
use bankbot_config::{apply_all_defaults, write_config, BankBotConfig};

use crate::config::Config;
use crate::terminal_output::{note_error, note_success, note_warn, paint, DIM};

/// The resolved configuration as YAML, after env overrides and defaults.
pub fn resolved_yaml(config: &Config) -> Result<String> {
    serde_yaml::to_string(&config.file).context("Failed to serialize config")
}

pub fn show(config: &Config) -> Result<()> {
    println!("{}", paint(DIM, &format!("# {}", config.file_path().display())));
    print!("{}", resolved_yaml(config)?);
    for warning in &config.report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &config.report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    Ok(())
}

pub fn path(config: &Config) {
    println!("{}", config.file_path().display());
}

/// Write a config file populated with every default.
pub async fn init(config: &Config, force: bool) -> Result<()> {
    let path = config.file_path();
    if path.exists() && !force {
        bail!(
            "{} already exists. Pass --force to overwrite it.",
            path.display()
        );
    }
    write_config(&apply_all_defaults(BankBotConfig::default()), &path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
