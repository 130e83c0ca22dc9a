use thiserror::Error;

/// Top-level error type for client-side conversation state.
#[derive(Debug, Error)]
pub enum BankBotError {
    #[error("a response is already streaming for this conversation")]
    StreamInFlight,

    #[error("message is empty")]
    EmptyMessage,

    #[error("malformed stream event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
