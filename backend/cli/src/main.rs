mod ask_cmd;
mod auth_cmd;
mod config;
mod config_cmd;
mod terminal_output;
mod threads_cmd;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use config::Config;
use terminal_output::note_error;

#[derive(Parser)]
#[command(name = "bankbot")]
#[command(about = "Banking Bot: chat with your banking assistant from the terminal")]
#[command(version)]
struct Cli {
    /// Directory holding config.yaml, the session file and logs
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Backend base URL, overriding the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the full-screen chat (default)
    Ui,
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List conversations, most recent first
    Threads,
    /// Print the messages of one conversation
    History {
        thread_id: String,
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Ask one question and stream the answer
    Ask {
        message: String,
        /// Continue an existing conversation
        #[arg(short, long)]
        thread: Option<String>,
        /// Only print the answer, not the reasoning steps
        #[arg(short, long)]
        quiet: bool,
    },
    /// Show the backend's reasoning trace for the latest answer
    Trace,
    /// Delete one conversation
    Delete { thread_id: String },
    /// Delete every conversation
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a config file with every default
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config_dir, cli.api_url).await?;
    let command = cli.command.unwrap_or(Commands::Ui);
    let is_ui = matches!(command, Commands::Ui);
    config.init_logging(cli.verbose && !is_ui)?;

    let client = || -> Result<bankbot_client::ApiClient> {
        config.ensure_valid()?;
        let api = config.api_client()?;
        info!(base_url = api.base_url(), "Banking Bot client starting");
        Ok(api)
    };

    match command {
        Commands::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(&config),
            ConfigAction::Path => {
                config_cmd::path(&config);
                Ok(())
            }
            ConfigAction::Init { force } => config_cmd::init(&config, force).await,
        },
        Commands::Ui => bankbot_tui::run(Arc::new(client()?), config.ui_options()?).await,
        Commands::Login { user, password } => auth_cmd::login(&client()?, user, password).await,
        Commands::Logout => {
            auth_cmd::logout(&client()?);
            Ok(())
        }
        Commands::Whoami => auth_cmd::whoami(&client()?).await,
        Commands::Threads => threads_cmd::list(&client()?).await,
        Commands::History { thread_id, limit } => {
            let limit = limit.unwrap_or_else(|| config.file.history_limit());
            threads_cmd::history(&client()?, &thread_id, limit).await
        }
        Commands::Ask {
            message,
            thread,
            quiet,
        } => ask_cmd::ask(&client()?, &message, thread, !quiet).await,
        Commands::Trace => ask_cmd::trace(&client()?).await,
        Commands::Delete { thread_id } => threads_cmd::delete(&client()?, &thread_id).await,
        Commands::DeleteAll { yes } => threads_cmd::delete_all(&client()?, yes).await,
    }
}
