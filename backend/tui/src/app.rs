//! TUI App State
//!
//! Top-level state of the terminal UI and the transitions driven by keys,
//! stream updates and finished backend calls. Transitions never perform I/O;
//! whatever has to reach the backend is handed back to the runner as
//! [`Command`]s.

use bankbot_client::StreamUpdate;
use bankbot_core::{new_thread_id, Applied, ChatThread, HistoryEntry, Transcript, TurnId, User};
use ratatui::widgets::ListState;
use tracing::{debug, warn};

pub const EMPTY_CREDENTIALS: &str = "Please enter both username and password";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
pub const DELETE_FAILED: &str = "Failed to delete conversation. Please try again.";
pub const DELETE_ALL_FAILED: &str = "Failed to delete all conversations. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub focus: LoginField,
    pub show_password: bool,
    pub error: Option<String>,
    pub pending: bool,
}

impl LoginForm {
    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

/// Which chat pane receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Sidebar,
}

/// A destructive action waiting for a yes/no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    DeleteThread(String),
    DeleteAll,
}

/// Side effects requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { user_id: String, password: String },
    Logout,
    LoadUser,
    RefreshThreads,
    LoadHistory(String),
    StartStream {
        turn: TurnId,
        message: String,
        thread_id: String,
    },
    StopStream,
    DeleteThread(String),
    DeleteAllThreads,
}

/// Results of backend calls, delivered back to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    LoggedIn(User),
    LoginFailed(String),
    UserLoaded(User),
    ThreadsLoaded(Vec<ChatThread>),
    ThreadsFailed(String),
    HistoryLoaded {
        thread_id: String,
        entries: Vec<HistoryEntry>,
    },
    HistoryFailed {
        thread_id: String,
        error: String,
    },
    ThreadDeleted(String),
    AllThreadsDeleted,
    DeleteFailed(String),
    SessionExpired,
}

pub struct AppState {
    pub screen: Screen,
    pub login: LoginForm,
    pub user: Option<User>,
    pub threads: Vec<ChatThread>,
    pub threads_loading: bool,
    pub thread_list_state: ListState,
    pub sidebar_collapsed: bool,
    pub focus: Focus,
    pub current_thread_id: Option<String>,
    pub history_loading: bool,
    pub transcript: Transcript,
    pub input: String,
    pub confirm: Option<Confirm>,
    pub alert: Option<String>,
    pub evaluation_expanded: bool,
    /// Lines scrolled up from the bottom of the message pane.
    pub scroll_back: u16,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Login,
            login: LoginForm::default(),
            user: None,
            threads: Vec::new(),
            threads_loading: false,
            thread_list_state: ListState::default(),
            sidebar_collapsed: false,
            focus: Focus::Input,
            current_thread_id: None,
            history_loading: false,
            transcript: Transcript::new(),
            input: String::new(),
            confirm: None,
            alert: None,
            evaluation_expanded: false,
            scroll_back: 0,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    pub fn subtitle(&self) -> &'static str {
        if self.current_thread_id.is_some() {
            "Active Conversation"
        } else {
            "Start a new conversation"
        }
    }

    pub fn input_enabled(&self) -> bool {
        !self.transcript.is_streaming()
    }

    pub fn selected_thread(&self) -> Option<&ChatThread> {
        self.thread_list_state
            .selected()
            .and_then(|i| self.threads.get(i))
    }

    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// A stored session exists; go straight to the chat screen.
    pub fn restore_session(&mut self) -> Vec<Command> {
        self.screen = Screen::Chat;
        self.threads_loading = true;
        vec![Command::LoadUser, Command::RefreshThreads]
    }

    pub fn submit_login(&mut self) -> Vec<Command> {
        if self.login.pending {
            return Vec::new();
        }
        let user_id = self.login.username.trim().to_string();
        if user_id.is_empty() || self.login.password.is_empty() {
            self.login.error = Some(EMPTY_CREDENTIALS.to_string());
            return Vec::new();
        }
        self.login.error = None;
        self.login.pending = true;
        vec![Command::Login {
            user_id,
            password: self.login.password.clone(),
        }]
    }

    pub fn logout(&mut self) -> Vec<Command> {
        let mut commands = self.stop_stream();
        self.return_to_login(None);
        commands.push(Command::Logout);
        commands
    }

    fn return_to_login(&mut self, error: Option<&str>) {
        self.screen = Screen::Login;
        self.login.pending = false;
        self.login.password.clear();
        self.login.focus = LoginField::Username;
        self.login.error = error.map(str::to_string);
        self.user = None;
        self.threads.clear();
        self.threads_loading = false;
        self.thread_list_state.select(None);
        self.current_thread_id = None;
        self.history_loading = false;
        self.transcript.reset();
        self.input.clear();
        self.confirm = None;
        self.alert = None;
        self.focus = Focus::Input;
    }

    // -----------------------------------------------------------------------
    // Conversation
    // -----------------------------------------------------------------------

    /// Send the input box as a new turn, creating a thread id when needed.
    pub fn send_message(&mut self) -> Vec<Command> {
        if !self.input_enabled() || self.input.trim().is_empty() {
            return Vec::new();
        }
        let message = self.input.trim().to_string();
        // A fresh thread has no history to load.
        let thread_id = self
            .current_thread_id
            .get_or_insert_with(new_thread_id)
            .clone();

        let mut commands = Vec::new();
        if self.transcript.has_open_stream() {
            // The previous answer is done but its evaluation is still streaming.
            commands.push(Command::StopStream);
        }
        match self.transcript.begin_turn(&message, &thread_id) {
            Ok(turn) => {
                self.input.clear();
                self.scroll_back = 0;
                self.evaluation_expanded = false;
                commands.push(Command::StartStream {
                    turn,
                    message,
                    thread_id,
                });
            }
            Err(e) => warn!(error = %e, "Message not sent"),
        }
        commands
    }

    /// Abort whatever stream is still attached to the transcript.
    pub fn stop_stream(&mut self) -> Vec<Command> {
        match self.transcript.cancel() {
            Some(turn) => {
                debug!(?turn, "Stream stopped");
                vec![Command::StopStream]
            }
            None => Vec::new(),
        }
    }

    pub fn new_chat(&mut self) -> Vec<Command> {
        let commands = self.clear_conversation();
        self.thread_list_state.select(None);
        self.focus = Focus::Input;
        commands
    }

    fn clear_conversation(&mut self) -> Vec<Command> {
        let commands = self.stop_stream();
        self.current_thread_id = None;
        self.history_loading = false;
        self.transcript.reset();
        self.evaluation_expanded = false;
        self.scroll_back = 0;
        commands
    }

    /// Open the thread at `index` in the sidebar.
    pub fn open_thread(&mut self, index: usize) -> Vec<Command> {
        let Some(thread_id) = self.threads.get(index).map(|t| t.chat_thread_id.clone()) else {
            return Vec::new();
        };
        self.thread_list_state.select(Some(index));
        if self.current_thread_id.as_deref() == Some(thread_id.as_str()) {
            return Vec::new();
        }
        let mut commands = self.clear_conversation();
        self.current_thread_id = Some(thread_id.clone());
        self.history_loading = true;
        commands.push(Command::LoadHistory(thread_id));
        commands
    }

    pub fn select_next_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        let next = match self.thread_list_state.selected() {
            Some(i) => (i + 1).min(self.threads.len() - 1),
            None => 0,
        };
        self.thread_list_state.select(Some(next));
    }

    pub fn select_previous_thread(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        let previous = self
            .thread_list_state
            .selected()
            .map_or(0, |i| i.saturating_sub(1));
        self.thread_list_state.select(Some(previous));
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        if self.sidebar_collapsed {
            self.focus = Focus::Input;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    // -----------------------------------------------------------------------
    // Dialogs
    // -----------------------------------------------------------------------

    pub fn request_delete_selected(&mut self) {
        if let Some(thread) = self.selected_thread() {
            self.confirm = Some(Confirm::DeleteThread(thread.chat_thread_id.clone()));
        }
    }

    pub fn request_delete_all(&mut self) {
        if !self.threads.is_empty() {
            self.confirm = Some(Confirm::DeleteAll);
        }
    }

    pub fn confirm_yes(&mut self) -> Vec<Command> {
        match self.confirm.take() {
            Some(Confirm::DeleteThread(id)) => vec![Command::DeleteThread(id)],
            Some(Confirm::DeleteAll) => vec![Command::DeleteAllThreads],
            None => Vec::new(),
        }
    }

    pub fn confirm_no(&mut self) {
        self.confirm = None;
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    // -----------------------------------------------------------------------
    // Async results
    // -----------------------------------------------------------------------

    pub fn handle_app_event(&mut self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::LoggedIn(user) => {
                self.login.pending = false;
                self.login.password.clear();
                self.login.error = None;
                self.user = Some(user);
                self.screen = Screen::Chat;
                self.threads_loading = true;
                vec![Command::RefreshThreads]
            }
            AppEvent::LoginFailed(error) => {
                self.login.pending = false;
                self.login.error = Some(error);
                Vec::new()
            }
            AppEvent::UserLoaded(user) => {
                self.user = Some(user);
                Vec::new()
            }
            AppEvent::ThreadsLoaded(threads) => {
                self.threads_loading = false;
                self.threads = threads;
                let selected = self.current_thread_id.as_deref().and_then(|id| {
                    self.threads.iter().position(|t| t.chat_thread_id == id)
                });
                self.thread_list_state.select(selected);
                Vec::new()
            }
            AppEvent::ThreadsFailed(error) => {
                warn!(%error, "Failed to load threads");
                self.threads_loading = false;
                Vec::new()
            }
            AppEvent::HistoryLoaded { thread_id, entries } => {
                if self.current_thread_id.as_deref() == Some(thread_id.as_str()) {
                    self.history_loading = false;
                    self.transcript.load_history(&thread_id, entries);
                }
                Vec::new()
            }
            AppEvent::HistoryFailed { thread_id, error } => {
                warn!(%thread_id, %error, "Failed to load history");
                if self.current_thread_id.as_deref() == Some(thread_id.as_str()) {
                    self.history_loading = false;
                }
                Vec::new()
            }
            AppEvent::ThreadDeleted(thread_id) => {
                let mut commands = Vec::new();
                if self.current_thread_id.as_deref() == Some(thread_id.as_str()) {
                    commands = self.clear_conversation();
                }
                self.threads.retain(|t| t.chat_thread_id != thread_id);
                self.thread_list_state.select(None);
                commands.push(Command::RefreshThreads);
                commands
            }
            AppEvent::AllThreadsDeleted => {
                let mut commands = self.clear_conversation();
                self.threads.clear();
                self.thread_list_state.select(None);
                commands.push(Command::RefreshThreads);
                commands
            }
            AppEvent::DeleteFailed(message) => {
                self.alert = Some(message);
                Vec::new()
            }
            AppEvent::SessionExpired => {
                let mut commands = self.stop_stream();
                self.return_to_login(Some(SESSION_EXPIRED));
                commands.push(Command::Logout);
                commands
            }
        }
    }

    pub fn handle_stream_update(&mut self, update: StreamUpdate) -> Vec<Command> {
        match update {
            StreamUpdate::Event(turn, event) => {
                if self.transcript.apply(turn, event) == Applied::AnswerComplete {
                    self.scroll_back = 0;
                }
                Vec::new()
            }
            StreamUpdate::Finished(turn) => match self.transcript.finish(turn) {
                Some(_) => vec![Command::RefreshThreads],
                None => Vec::new(),
            },
            StreamUpdate::Failed(turn, error) => {
                warn!(%error, "Stream failed");
                if error.requires_login() && self.transcript.active_turn() == Some(turn) {
                    self.transcript.cancel();
                    self.return_to_login(Some(SESSION_EXPIRED));
                    return vec![Command::Logout];
                }
                self.transcript.fail(turn);
                Vec::new()
            }
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
