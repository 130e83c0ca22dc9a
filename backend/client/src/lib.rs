//! `bankbot-client`: talks to the Banking Bot backend.
//!
//! - `session`: bearer token, expiry decoding, persisted session, coalesced refresh
//! - `api`: REST calls with refresh-and-retry on 401
//! - `stream`: SSE decoding and the cancellable chat stream

pub mod api;
pub mod error;
pub mod session;
pub mod stream;

pub use api::{ApiClient, DEFAULT_BASE_URL};
pub use error::ClientError;
pub use session::{
    decode_claims, Claims, FileSessionStore, MemorySessionStore, Session, SessionStore,
    TokenManager, TokenRefresher,
};
pub use stream::{spawn_chat_stream, SseDecoder, StreamHandle, StreamUpdate};
