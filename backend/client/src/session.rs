//! Session and bearer-token management.
//!
//! Holds the current access token, decodes its expiry from the JWT payload,
//! persists it through a [`SessionStore`], and collapses concurrent refresh
//! attempts into a single call to the backend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Claims read from the token payload. The signature is never checked here.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decode the payload segment of a JWT. Returns `None` for anything malformed.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A bearer token and its decoded expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let expires_at = decode_claims(&token)
            .and_then(|c| c.exp)
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single());
        if expires_at.is_none() {
            warn!("Failed to decode token expiry; proactive refresh disabled");
        }
        Self { token, expires_at }
    }

    pub fn subject(&self) -> Option<String> {
        decode_claims(&self.token).and_then(|c| c.sub)
    }

    /// Time left before expiry, negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at.map(|exp| exp - now)
    }
}

/// Where the session survives between runs.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// JSON file in the user's config directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, used by tests and one-shot commands.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.inner.lock().ok()?.clone()
    }

    fn save(&self, session: &Session) -> Result<(), ClientError> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(session.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
        Ok(())
    }
}

/// Exchanges a still-valid (or just-expired) token for a fresh one.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current_token: &str) -> Result<String, ClientError>;
}

/// Owns the session and serializes refreshes.
pub struct TokenManager {
    session: RwLock<Option<Session>>,
    store: Arc<dyn SessionStore>,
    refresher: Arc<dyn TokenRefresher>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Box<dyn SessionStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        let session = store.load();
        if session.is_some() {
            debug!("Restored saved session");
        }
        Self {
            session: RwLock::new(session),
            store: Arc::from(store),
            refresher,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session().and_then(|s| s.expires_at)
    }

    pub fn is_logged_in(&self) -> bool {
        self.session().is_some()
    }

    /// Replace the current token and persist it.
    ///
    /// The store does blocking file I/O, so the save runs on the blocking pool.
    pub async fn set_token(&self, token: &str) -> Result<Session, ClientError> {
        let session = Session::new(token);
        if let Ok(mut guard) = self.session.write() {
            *guard = Some(session.clone());
        }
        let store = self.store.clone();
        let saved = session.clone();
        tokio::task::spawn_blocking(move || store.save(&saved))
            .await
            .map_err(|e| ClientError::Storage(std::io::Error::other(e)))??;
        Ok(session)
    }

    /// Forget the session from an async context without blocking the runtime.
    async fn expire(&self) {
        if let Ok(mut guard) = self.session.write() {
            *guard = None;
        }
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to remove stored session"),
            Err(e) => warn!(error = %e, "Session cleanup task failed"),
        }
    }

    /// Forget the session, in memory and on disk.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.session.write() {
            *guard = None;
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to remove stored session");
        }
    }

    /// Expiry is known and closer than `window`.
    pub fn needs_refresh(&self, window: Duration) -> bool {
        self.needs_refresh_at(Utc::now(), window)
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.session()
            .and_then(|s| s.remaining(now))
            .is_some_and(|left| left < window)
    }

    /// Like [`needs_refresh`](Self::needs_refresh) but only while the token still works.
    pub fn needs_proactive_refresh(&self, window: Duration) -> bool {
        self.needs_proactive_refresh_at(Utc::now(), window)
    }

    pub fn needs_proactive_refresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.session()
            .and_then(|s| s.remaining(now))
            .is_some_and(|left| left < window && left > Duration::zero())
    }

    /// Refresh the current token, sharing the call with concurrent callers.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let observed = self.token().ok_or(ClientError::NotLoggedIn)?;
        self.refresh_after_unauthorized(&observed).await
    }

    /// Refresh because `stale_token` was rejected.
    ///
    /// Callers queue on a single gate; whoever gets through after the token
    /// was already replaced just picks up the new one. A failed refresh ends
    /// the session.
    pub async fn refresh_after_unauthorized(&self, stale_token: &str) -> Result<String, ClientError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.token().ok_or(ClientError::SessionExpired)?;
        if current != stale_token {
            debug!("Token already refreshed by another request");
            return Ok(current);
        }

        match self.refresher.refresh(&current).await {
            Ok(token) => {
                self.set_token(&token).await?;
                info!("Token refreshed");
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed; clearing session");
                self.expire().await;
                Err(ClientError::SessionExpired)
            }
        }
    }
}
