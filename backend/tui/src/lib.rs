//! TUI (Terminal User Interface) for the Banking Bot client.
//!
//! Exposes the ratatui state, rendering and runtime loop behind `bankbot ui`.

pub mod app;
pub mod format;
pub mod input;
pub mod render;
pub mod runner;

pub use app::{AppEvent, AppState, Command};
pub use input::handle_key_event;
pub use render::draw_ui;
pub use runner::{run, UiOptions};
