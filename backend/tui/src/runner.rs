//! TUI Runtime Loop
//!
//! Owns the terminal and multiplexes keyboard input, stream updates, finished
//! backend calls, a redraw tick and the proactive token check with
//! `tokio::select!`. Commands produced by state transitions are executed here.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bankbot_client::{spawn_chat_stream, ApiClient, ClientError, StreamHandle, StreamUpdate};
use bankbot_logging::StreamEventLogger;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::{
    AppEvent, AppState, Command, DELETE_ALL_FAILED, DELETE_FAILED, INVALID_CREDENTIALS,
};
use crate::input::handle_key_event;
use crate::render::draw_ui;

const REDRAW_INTERVAL: Duration = Duration::from_millis(150);

/// Settings the UI reads from the client configuration.
#[derive(Debug, Clone)]
pub struct UiOptions {
    pub history_limit: u32,
    pub proactive_refresh_window: chrono::Duration,
    pub refresh_check_interval: Duration,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            history_limit: 50,
            proactive_refresh_window: chrono::Duration::minutes(10),
            refresh_check_interval: Duration::from_secs(120),
        }
    }
}

/// Run the full-screen UI until the user quits.
pub async fn run(api: Arc<ApiClient>, options: UiOptions) -> Result<()> {
    let mut terminal = setup_terminal().context("Failed to initialise terminal")?;
    let result = event_loop(&mut terminal, api, options).await;
    restore_terminal(&mut terminal)?;
    result
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> io::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn event_loop(terminal: &mut Tui, api: Arc<ApiClient>, options: UiOptions) -> Result<()> {
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();
    let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();
    let mut effects = Effects {
        api: api.clone(),
        app_tx,
        stream_tx,
        stream: None,
        history_limit: options.history_limit,
    };

    let mut state = AppState::new();
    if api.tokens().is_logged_in() {
        info!("Restoring stored session");
        for command in state.restore_session() {
            effects.execute(command);
        }
    }

    let mut keys = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    let mut refresh_check = tokio::time::interval(options.refresh_check_interval);

    loop {
        terminal.draw(|f| draw_ui(f, &state))?;

        let commands = tokio::select! {
            maybe_event = keys.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    handle_key_event(key, &mut state)
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => break,
            },
            Some(update) = stream_rx.recv() => {
                if let StreamUpdate::Event(_, event) = &update {
                    let thread_id = state.current_thread_id.as_deref().unwrap_or_default();
                    StreamEventLogger::log_event(thread_id, event);
                }
                state.handle_stream_update(update)
            }
            Some(event) = app_rx.recv() => state.handle_app_event(event),
            _ = redraw.tick() => {
                state.tick();
                Vec::new()
            }
            _ = refresh_check.tick() => {
                effects.proactive_refresh(options.proactive_refresh_window);
                Vec::new()
            }
        };

        for command in commands {
            effects.execute(command);
        }
        if state.should_quit {
            break;
        }
    }

    effects.stop_stream();
    Ok(())
}

/// Executes commands against the backend, reporting back through channels.
struct Effects {
    api: Arc<ApiClient>,
    app_tx: mpsc::UnboundedSender<AppEvent>,
    stream_tx: mpsc::UnboundedSender<StreamUpdate>,
    stream: Option<StreamHandle>,
    history_limit: u32,
}

impl Effects {
    fn execute(&mut self, command: Command) {
        debug!(?command, "Executing command");
        match command {
            Command::Login { user_id, password } => {
                self.spawn(move |api| async move {
                    match api.login(&user_id, &password).await {
                        Ok(user) => AppEvent::LoggedIn(user),
                        Err(e) => {
                            if !matches!(e, ClientError::InvalidCredentials) {
                                warn!(error = %e, "Login failed");
                            }
                            AppEvent::LoginFailed(INVALID_CREDENTIALS.to_string())
                        }
                    }
                });
            }
            Command::Logout => {
                self.stop_stream();
                self.api.logout();
            }
            Command::LoadUser => {
                self.spawn(|api| async move {
                    match api.current_user().await {
                        Ok(user) => AppEvent::UserLoaded(user),
                        Err(e) => {
                            warn!(error = %e, "Failed to load profile");
                            AppEvent::SessionExpired
                        }
                    }
                });
            }
            Command::RefreshThreads => {
                self.spawn(|api| async move {
                    match api.threads().await {
                        Ok(threads) => AppEvent::ThreadsLoaded(threads),
                        Err(e) if e.requires_login() => AppEvent::SessionExpired,
                        Err(e) => AppEvent::ThreadsFailed(e.to_string()),
                    }
                });
            }
            Command::LoadHistory(thread_id) => {
                let limit = self.history_limit;
                self.spawn(move |api| async move {
                    match api.history(&thread_id, Some(limit)).await {
                        Ok(entries) => AppEvent::HistoryLoaded { thread_id, entries },
                        Err(e) if e.requires_login() => AppEvent::SessionExpired,
                        Err(e) => AppEvent::HistoryFailed {
                            thread_id,
                            error: e.to_string(),
                        },
                    }
                });
            }
            Command::StartStream {
                turn,
                message,
                thread_id,
            } => {
                self.stop_stream();
                self.stream = Some(spawn_chat_stream(
                    self.api.clone(),
                    turn,
                    message,
                    thread_id,
                    self.stream_tx.clone(),
                ));
            }
            Command::StopStream => self.stop_stream(),
            Command::DeleteThread(thread_id) => {
                self.spawn(move |api| async move {
                    match api.delete_thread(&thread_id).await {
                        Ok(_) => AppEvent::ThreadDeleted(thread_id),
                        Err(e) if e.requires_login() => AppEvent::SessionExpired,
                        Err(e) => {
                            warn!(error = %e, %thread_id, "Failed to delete thread");
                            AppEvent::DeleteFailed(DELETE_FAILED.to_string())
                        }
                    }
                });
            }
            Command::DeleteAllThreads => {
                self.spawn(|api| async move {
                    match api.delete_all_threads().await {
                        Ok(_) => AppEvent::AllThreadsDeleted,
                        Err(e) if e.requires_login() => AppEvent::SessionExpired,
                        Err(e) => {
                            warn!(error = %e, "Failed to delete all threads");
                            AppEvent::DeleteFailed(DELETE_ALL_FAILED.to_string())
                        }
                    }
                });
            }
        }
    }

    /// Run one backend call on a task and post its result to the UI loop.
    fn spawn<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<ApiClient>) -> Fut,
        Fut: std::future::Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.app_tx.clone();
        let fut = call(self.api.clone());
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    fn stop_stream(&mut self) {
        if let Some(handle) = self.stream.take() {
            if !handle.is_finished() {
                debug!(turn = ?handle.turn(), "Aborting stream");
            }
            handle.cancel();
        }
    }

    /// Refresh ahead of expiry while the user is idle.
    fn proactive_refresh(&self, window: chrono::Duration) {
        let tokens = self.api.tokens().clone();
        if !tokens.needs_proactive_refresh(window) {
            return;
        }
        let tx = self.app_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokens.refresh().await {
                warn!(error = %e, "Proactive token refresh failed");
                let _ = tx.send(AppEvent::SessionExpired);
            }
        });
    }
}
