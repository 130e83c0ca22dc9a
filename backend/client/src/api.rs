//! REST client for the Banking Bot backend.
//!
//! Every authorized call refreshes an about-to-expire token first, and retries
//! exactly once with a fresh token when the backend answers 401.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use bankbot_core::{ChatThread, HistoryEntry, User};
use chrono::Duration;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::session::{SessionStore, TokenManager, TokenRefresher};

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:2024";

const DEFAULT_CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ThreadsResponse {
    #[serde(default)]
    threads: Vec<ChatThread>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Bare(Vec<HistoryEntry>),
    Wrapped { history: Vec<HistoryEntry> },
}

#[derive(Deserialize)]
struct TraceResponse {
    #[serde(default)]
    trace: Value,
}

/// Calls `POST /auth/refresh` with the current bearer token.
struct HttpTokenRefresher {
    http: Client,
    base_url: String,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, current_token: &str) -> Result<String, ClientError> {
        debug!("Refreshing token");
        let response = self
            .http
            .post(format!("{}/auth/refresh", self.base_url))
            .bearer_auth(current_token)
            .json(&json!({}))
            .send()
            .await?;
        let TokenResponse { access_token } = check_status(response).await?.json().await?;
        Ok(access_token)
    }
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    refresh_window: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Box<dyn SessionStore>) -> Result<Self, ClientError> {
        Self::with_connect_timeout(base_url, store, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Streams can run for minutes, so only connecting is bounded.
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        store: Box<dyn SessionStore>,
        timeout: StdDuration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().connect_timeout(timeout).build()?;
        Ok(Self::with_http(http, base_url, store))
    }

    pub fn with_http(http: Client, base_url: impl Into<String>, store: Box<dyn SessionStore>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let refresher = Arc::new(HttpTokenRefresher {
            http: http.clone(),
            base_url: base_url.clone(),
        });
        Self {
            http,
            base_url,
            tokens: Arc::new(TokenManager::new(store, refresher)),
            refresh_window: Duration::minutes(5),
        }
    }

    /// How close to expiry a token may get before requests refresh it first.
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Exchange credentials for a session and fetch the profile.
    pub async fn login(&self, user_id: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&json!({ "user_id": user_id, "password": password }))
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            warn!(user_id, "Login rejected");
            return Err(ClientError::InvalidCredentials);
        }
        let TokenResponse { access_token } = check_status(response).await?.json().await?;
        self.tokens.set_token(&access_token).await?;
        info!(user_id, "Logged in");
        self.current_user().await
    }

    /// `GET /auth/me`, falling back to the token subject when unavailable.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        match self.get_json::<User>("/auth/me", &[]).await {
            Ok(user) => Ok(user),
            Err(e) if e.requires_login() => Err(e),
            Err(e) => {
                let subject = self.tokens.session().and_then(|s| s.subject());
                match subject {
                    Some(sub) => {
                        debug!(error = %e, "Profile endpoint unavailable; using token subject");
                        Ok(User::from_subject(&sub))
                    }
                    None => Err(e),
                }
            }
        }
    }

    pub fn logout(&self) {
        self.tokens.clear();
        info!("Logged out");
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub async fn threads(&self) -> Result<Vec<ChatThread>, ClientError> {
        let response: ThreadsResponse = self.get_json("/chat/threads", &[]).await?;
        Ok(response.threads)
    }

    pub async fn history(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<HistoryEntry>, ClientError> {
        let mut query = vec![("chat_thread_id", thread_id.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let response: HistoryResponse = self.get_json("/chat/history", &query).await?;
        Ok(match response {
            HistoryResponse::Bare(entries) => entries,
            HistoryResponse::Wrapped { history } => history,
        })
    }

    pub async fn delete_thread(&self, thread_id: &str) -> Result<Value, ClientError> {
        let url = self.url(&format!("/chat/threads/{thread_id}"));
        let response = self.authorized(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    pub async fn delete_all_threads(&self) -> Result<Value, ClientError> {
        let url = self.url("/chat/threads");
        let response = self.authorized(|http| http.delete(&url)).await?;
        read_json(response).await
    }

    /// Raw reasoning trace of the most recent turn, as the backend recorded it.
    pub async fn react_trace(&self) -> Result<Value, ClientError> {
        let response: TraceResponse = self.get_json("/chat/react-trace", &[]).await?;
        Ok(response.trace)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self.authorized(|http| http.get(&url).query(query)).await?;
        Ok(response.json().await?)
    }

    /// Refresh a soon-to-expire token, tolerating failure.
    pub(crate) async fn refresh_if_expiring(&self) {
        if self.tokens.is_logged_in() && self.tokens.needs_refresh(self.refresh_window) {
            if let Err(e) = self.tokens.refresh().await {
                warn!(error = %e, "Failed to refresh token before request");
            }
        }
    }

    async fn authorized<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.refresh_if_expiring().await;
        self.send_with_retry(build).await
    }

    /// Send with the current token; on 401 refresh once and retry once.
    pub(crate) async fn send_with_retry<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.tokens.token().ok_or(ClientError::NotLoggedIn)?;
        let response = build(&self.http).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!("Request unauthorized; refreshing token and retrying");
        let fresh = self.tokens.refresh_after_unauthorized(&token).await?;
        let retry = build(&self.http).bearer_auth(&fresh).send().await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!("Request still unauthorized after token refresh");
            return Err(ClientError::Unauthorized);
        }
        check_status(retry).await
    }
}

pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Parse a JSON body, treating an empty one as `null`.
async fn read_json(response: Response) -> Result<Value, ClientError> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::tests::fake_token;
    use crate::session::{MemorySessionStore, Session};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use chrono::Utc;

    /// In-process stand-in for the backend.
    pub(crate) struct FakeBackend {
        pub valid_token: Mutex<String>,
        pub refresh_calls: AtomicUsize,
        /// Token handed out by `/auth/refresh`; `None` makes refresh fail.
        pub next_token: Mutex<Option<String>>,
        pub stream_body: Mutex<String>,
        pub profile_available: bool,
    }

    impl FakeBackend {
        pub(crate) fn new(valid_token: &str) -> Arc<Self> {
            Arc::new(Self {
                valid_token: Mutex::new(valid_token.to_string()),
                refresh_calls: AtomicUsize::new(0),
                next_token: Mutex::new(None),
                stream_body: Mutex::new(String::new()),
                profile_available: true,
            })
        }

        fn authorized(&self, headers: &HeaderMap) -> bool {
            let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
        }
    }

    fn unauthorized() -> AxumResponse {
        (axum::http::StatusCode::UNAUTHORIZED, "invalid token").into_response()
    }

    async fn login(
        State(backend): State<Arc<FakeBackend>>,
        Json(body): Json<Value>,
    ) -> AxumResponse {
        if body["password"] != "secret" {
            return unauthorized();
        }
        let token = backend.valid_token.lock().unwrap().clone();
        Json(json!({ "access_token": token })).into_response()
    }

    async fn me(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> AxumResponse {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        if !backend.profile_available {
            return (axum::http::StatusCode::NOT_FOUND, "no profile").into_response();
        }
        Json(json!({
            "id": "1", "user_id": "john_doe", "first_name": "John",
            "last_name": "Doe", "email": "john@bank.test"
        }))
        .into_response()
    }

    async fn refresh(State(backend): State<Arc<FakeBackend>>) -> AxumResponse {
        backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        match backend.next_token.lock().unwrap().clone() {
            Some(token) => Json(json!({ "access_token": token })).into_response(),
            None => unauthorized(),
        }
    }

    async fn threads(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> AxumResponse {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        Json(json!({ "threads": [{
            "chat_thread_id": "thread_1",
            "last_message": "What is my balance?",
            "last_activity": "2024-05-01T10:00:00",
            "message_count": 2
        }]}))
        .into_response()
    }

    async fn history(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> AxumResponse {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        Json(json!([{
            "id": 9, "user_query": "hi", "bot_response": "hello",
            "created_at": "2024-05-01T10:00:00Z"
        }]))
        .into_response()
    }

    async fn delete_ok(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> AxumResponse {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        Json(json!({ "deleted": true })).into_response()
    }

    async fn stream(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> AxumResponse {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        let body = backend.stream_body.lock().unwrap().clone();
        ([("content-type", "text/event-stream")], body).into_response()
    }

    /// Serve the fake backend on an ephemeral port and return its base URL.
    pub(crate) async fn spawn_backend(backend: Arc<FakeBackend>) -> String {
        let router = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/me", get(me))
            .route("/auth/refresh", post(refresh))
            .route("/chat/threads", get(threads).delete(delete_ok))
            .route("/chat/threads/:id", delete(delete_ok))
            .route("/chat/history", get(history))
            .route("/chat/stream", post(stream))
            .with_state(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn far_token(sub: &str) -> String {
        fake_token(Utc::now() + Duration::hours(2), sub)
    }

    pub(crate) fn client_with(base_url: &str, token: Option<&str>) -> ApiClient {
        let store = match token {
            Some(t) => MemorySessionStore::with_session(Session::new(t)),
            None => MemorySessionStore::default(),
        };
        ApiClient::new(base_url, Box::new(store)).unwrap()
    }

    #[tokio::test]
    async fn test_login_stores_token_and_fetches_profile() {
        let token = far_token("john_doe");
        let backend = FakeBackend::new(&token);
        let url = spawn_backend(backend).await;
        let client = client_with(&url, None);

        let user = client.login("john_doe", "secret").await.unwrap();
        assert_eq!(user.first_name, "John");
        assert_eq!(client.tokens().token().as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn test_login_failure_creates_no_session() {
        let backend = FakeBackend::new(&far_token("john_doe"));
        let url = spawn_backend(backend).await;
        let client = client_with(&url, None);

        let err = client.login("john_doe", "wrong").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidCredentials));
        assert!(!client.tokens().is_logged_in());
    }

    #[tokio::test]
    async fn test_profile_falls_back_to_token_subject() {
        let token = far_token("jane_smith");
        let backend = Arc::new(FakeBackend {
            valid_token: Mutex::new(token.clone()),
            refresh_calls: AtomicUsize::new(0),
            next_token: Mutex::new(None),
            stream_body: Mutex::new(String::new()),
            profile_available: false,
        });
        let url = spawn_backend(backend).await;
        let client = client_with(&url, Some(&token));

        let user = client.current_user().await.unwrap();
        assert_eq!(user.user_id, "jane_smith");
        assert_eq!(user.first_name, "jane");
        assert_eq!(user.last_name, "smith");
    }

    #[tokio::test]
    async fn test_unauthorized_request_refreshes_and_retries_once() {
        let stale = far_token("old");
        let fresh = far_token("new");
        let backend = FakeBackend::new(&fresh);
        *backend.next_token.lock().unwrap() = Some(fresh.clone());
        let url = spawn_backend(backend.clone()).await;
        let client = client_with(&url, Some(&stale));

        let threads = client.threads().await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].message_count, 2);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.tokens().token().as_deref(), Some(fresh.as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_requests_refresh_once() {
        let stale = far_token("old");
        let fresh = far_token("new");
        let backend = FakeBackend::new(&fresh);
        *backend.next_token.lock().unwrap() = Some(fresh.clone());
        let url = spawn_backend(backend.clone()).await;
        let client = client_with(&url, Some(&stale));

        let results = futures_util::future::join_all((0..5).map(|_| client.threads())).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_unauthorized_propagates() {
        let stale = far_token("old");
        let backend = FakeBackend::new("never-matches");
        *backend.next_token.lock().unwrap() = Some(far_token("still-wrong"));
        let url = spawn_backend(backend.clone()).await;
        let client = client_with(&url, Some(&stale));

        let err = client.threads().await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_ends_session() {
        let stale = far_token("old");
        let backend = FakeBackend::new("never-matches");
        let url = spawn_backend(backend).await;
        let client = client_with(&url, Some(&stale));

        let err = client.threads().await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert!(!client.tokens().is_logged_in());
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_before_request() {
        let expiring = fake_token(Utc::now() + Duration::minutes(2), "old");
        let fresh = far_token("new");
        let backend = FakeBackend::new(&fresh);
        *backend.next_token.lock().unwrap() = Some(fresh.clone());
        let url = spawn_backend(backend.clone()).await;
        let client = client_with(&url, Some(&expiring));

        client.threads().await.unwrap();
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_and_deletes() {
        let token = far_token("u");
        let backend = FakeBackend::new(&token);
        let url = spawn_backend(backend).await;
        let client = client_with(&url, Some(&token));

        let history = client.history("thread_1", Some(20)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "9");

        assert_eq!(client.delete_thread("thread_1").await.unwrap()["deleted"], true);
        assert_eq!(client.delete_all_threads().await.unwrap()["deleted"], true);
    }

    #[tokio::test]
    async fn test_requests_without_session_fail_fast() {
        let client = client_with("http://127.0.0.1:9", None);
        assert!(matches!(client.threads().await, Err(ClientError::NotLoggedIn)));
    }
}
