//! `bankbot-core`: domain model and conversation state for the Banking Bot client.
//!
//! Provides:
//! - Wire types for users, threads, history, steps and evaluations
//! - The `StreamEvent` schema of the chat stream
//! - `Transcript`, the reducer that turns stream events into display messages

pub mod error;
pub mod event;
pub mod transcript;
pub mod types;

pub use error::BankBotError;
pub use event::{StepEvent, StreamEvent};
pub use transcript::{new_thread_id, Applied, EvaluationView, Transcript, TurnId, STREAM_ERROR_MESSAGE};
pub use types::{
    star_rating, strip_phase_glyph, ChatMessage, ChatThread, Confidence, CriterionScore,
    EvaluationSummary, HistoryEntry, Phase, ReactStep, Role, StepDetails, User,
};
