//! Keyboard Input Handler
//!
//! Maps crossterm key events onto `AppState` transitions. Dialogs take the
//! keyboard first, then the active screen and the focused pane.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{AppState, Command, Focus, Screen};

/// Lines moved per PageUp/PageDown.
const PAGE: u16 = 10;

/// Handles a single keyboard event, returning the side effects it requested.
pub fn handle_key_event(key: KeyEvent, state: &mut AppState) -> Vec<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        state.should_quit = true;
        return Vec::new();
    }

    if state.alert.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
            state.dismiss_alert();
        }
        return Vec::new();
    }

    if state.confirm.is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => return state.confirm_yes(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => state.confirm_no(),
            _ => {}
        }
        return Vec::new();
    }

    match state.screen {
        Screen::Login => login_key(key, ctrl, state),
        Screen::Chat => chat_key(key, ctrl, state),
    }
}

fn login_key(key: KeyEvent, ctrl: bool, state: &mut AppState) -> Vec<Command> {
    match key.code {
        KeyCode::Esc => state.should_quit = true,
        KeyCode::Char('t') if ctrl => state.login.show_password = !state.login.show_password,
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            state.login.toggle_focus()
        }
        KeyCode::Enter => return state.submit_login(),
        KeyCode::Backspace => {
            state.login.focused_mut().pop();
        }
        KeyCode::Char(c) if !ctrl && !state.login.pending => state.login.focused_mut().push(c),
        _ => {}
    }
    Vec::new()
}

fn chat_key(key: KeyEvent, ctrl: bool, state: &mut AppState) -> Vec<Command> {
    if ctrl {
        match key.code {
            KeyCode::Char('n') => return state.new_chat(),
            KeyCode::Char('b') => state.toggle_sidebar(),
            KeyCode::Char('e') => state.evaluation_expanded = !state.evaluation_expanded,
            KeyCode::Char('l') => return state.logout(),
            KeyCode::Char('d') => state.request_delete_all(),
            _ => {}
        }
        return Vec::new();
    }

    match key.code {
        KeyCode::Esc => {
            if state.transcript.has_open_stream() {
                return state.stop_stream();
            }
            state.focus = Focus::Input;
        }
        KeyCode::Tab if !state.sidebar_collapsed => {
            state.focus = match state.focus {
                Focus::Input => Focus::Sidebar,
                Focus::Sidebar => Focus::Input,
            };
        }
        KeyCode::PageUp => state.scroll_up(PAGE),
        KeyCode::PageDown => state.scroll_down(PAGE),
        _ => match state.focus {
            Focus::Sidebar => return sidebar_key(key, state),
            Focus::Input => return input_key(key, state),
        },
    }
    Vec::new()
}

fn sidebar_key(key: KeyEvent, state: &mut AppState) -> Vec<Command> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => state.select_previous_thread(),
        KeyCode::Down | KeyCode::Char('j') => state.select_next_thread(),
        KeyCode::Enter => {
            if let Some(index) = state.thread_list_state.selected() {
                let commands = state.open_thread(index);
                state.focus = Focus::Input;
                return commands;
            }
        }
        KeyCode::Char('n') => return state.new_chat(),
        KeyCode::Char('d') | KeyCode::Delete => state.request_delete_selected(),
        KeyCode::Char('D') => state.request_delete_all(),
        _ => {}
    }
    Vec::new()
}

fn input_key(key: KeyEvent, state: &mut AppState) -> Vec<Command> {
    match key.code {
        KeyCode::Enter => return state.send_message(),
        KeyCode::Backspace if state.input_enabled() => {
            state.input.pop();
        }
        KeyCode::Char(c) if state.input_enabled() => state.input.push(c),
        _ => {}
    }
    Vec::new()
}
