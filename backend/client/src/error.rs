use thiserror::Error;

/// Errors surfaced by the backend client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("session expired; please log in again")]
    SessionExpired,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("request was rejected as unauthorized")]
    Unauthorized,

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// The session is gone and the user has to log in again.
    ///
    /// `AuthenticationFailed` is only returned after a failed pre-stream
    /// refresh, which has already cleared the session.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::NotLoggedIn
                | ClientError::SessionExpired
                | ClientError::AuthenticationFailed
                | ClientError::Unauthorized
        )
    }
}
