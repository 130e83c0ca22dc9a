//! Streaming Consumer
//!
//! Consumes the Server-Sent Events of `POST /chat/stream`, decodes each
//! `data:` frame into a [`StreamEvent`], and hands the events to a callback
//! (or, for the UI, to a channel tagged with the turn they belong to).

use std::sync::Arc;

use bankbot_core::{StreamEvent, TurnId};
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::api::ApiClient;
use crate::error::ClientError;

/// Incremental SSE frame decoder.
///
/// Network chunks can end mid-line, so bytes are buffered until a newline.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing frame that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line).into_iter().collect()
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim_end_matches(['\n', '\r']),
        Err(e) => {
            warn!(error = %e, "Dropping non-UTF-8 SSE line");
            return None;
        }
    };
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    match StreamEvent::from_json(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, line = %payload, "Failed to parse SSE data");
            None
        }
    }
}

impl ApiClient {
    /// Stream the answer to `message`, invoking `on_event` per frame until the body ends.
    pub async fn stream_chat<F>(
        &self,
        message: &str,
        thread_id: &str,
        mut on_event: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(StreamEvent),
    {
        if self.tokens().needs_refresh(self.refresh_window()) {
            if let Err(e) = self.tokens().refresh().await {
                error!(error = %e, "Failed to refresh token before streaming");
                return Err(ClientError::AuthenticationFailed);
            }
        }

        let url = self.url("/chat/stream");
        let body = json!({ "message": message, "chat_thread_id": thread_id });
        debug!(thread_id, "Starting stream request");
        let response = self
            .send_with_retry(|http| {
                http.post(&url)
                    .header("Accept", "text/event-stream")
                    .json(&body)
            })
            .await?;

        let mut decoder = SseDecoder::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            for event in decoder.push(&chunk?) {
                on_event(event);
            }
        }
        for event in decoder.finish() {
            on_event(event);
        }
        debug!(thread_id, "Stream ended");
        Ok(())
    }
}

/// Progress of a spawned stream, tagged with the turn that started it.
#[derive(Debug)]
pub enum StreamUpdate {
    Event(TurnId, StreamEvent),
    Finished(TurnId),
    Failed(TurnId, ClientError),
}

/// Cancellation handle for one spawned stream.
#[derive(Debug)]
pub struct StreamHandle {
    turn: TurnId,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Abort the request immediately; no acknowledgement is awaited.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run [`ApiClient::stream_chat`] on a task, forwarding progress to `tx`.
pub fn spawn_chat_stream(
    api: Arc<ApiClient>,
    turn: TurnId,
    message: String,
    thread_id: String,
    tx: mpsc::UnboundedSender<StreamUpdate>,
) -> StreamHandle {
    let task = tokio::spawn(async move {
        let events = tx.clone();
        let result = api
            .stream_chat(&message, &thread_id, |event| {
                debug!(kind = event.kind(), "Stream event");
                let _ = events.send(StreamUpdate::Event(turn, event));
            })
            .await;
        let update = match result {
            Ok(()) => StreamUpdate::Finished(turn),
            Err(e) => {
                error!(error = %e, thread_id = %thread_id, "Streaming error");
                StreamUpdate::Failed(turn, e)
            }
        };
        let _ = tx.send(update);
    });
    StreamHandle { turn, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{client_with, far_token, spawn_backend, FakeBackend};
    use bankbot_core::{Phase, Transcript};
    use std::sync::atomic::Ordering;

    const BALANCE_STREAM: &str = concat!(
        "data: {\"type\":\"stream_start\"}\n\n",
        "data: {\"type\":\"react_step\",\"step\":1,\"phase\":\"THOUGHT\",\"content\":\"💭 Look up balance\"}\n\n",
        "data: {\"type\":\"reasoning_token\",\"step\":1,\"content\":\"checking\"}\n\n",
        "data: not json\n\n",
        ": keep-alive comment\n",
        "data: {\"type\":\"react_step\",\"step\":2,\"phase\":\"ACTION\",\"content\":\"🔧 get_balance\",\"details\":{\"tool_name\":\"get_balance\"}}\n\n",
        "data: {\"type\":\"react_step\",\"step\":3,\"phase\":\"OBSERVATION\",\"content\":\"👁️ 1204.55\"}\n\n",
        "data: {\"type\":\"react_step\",\"step\":4,\"phase\":\"FINAL_ANSWER\",\"content\":\"✅ done\",\"details\":{\"final_answer\":\"$1,204.55\"}}\n\n",
        "data: {\"type\":\"evaluation_complete\",\"evaluation\":{\"overall_score\":4.5,\"confidence_level\":\"high\",\"summary\":\"Accurate\",\"criteria_scores\":[],\"strengths\":[],\"weaknesses\":[]}}\n\n",
        "data: {\"type\":\"stream_complete\"}"
    );

    #[test]
    fn test_decoder_handles_split_frames() {
        let mut decoder = SseDecoder::new();
        let frame = b"data: {\"type\":\"llm_token\",\"content\":\"Hel\"}\r\n";
        let (a, b) = frame.split_at(17);
        assert!(decoder.push(a).is_empty());
        let events = decoder.push(b);
        assert_eq!(
            events,
            vec![StreamEvent::LlmToken {
                content: Some("Hel".into())
            }]
        );
    }

    #[test]
    fn test_decoder_skips_garbage_and_flushes_tail() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: ping\ndata: {oops}\n\ndata: {\"type\":\"completion\"}");
        assert!(events.is_empty());
        let tail = decoder.finish();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].kind(), "completion");
        assert!(decoder.finish().is_empty());
    }

    #[tokio::test]
    async fn test_stream_chat_delivers_events_in_order() {
        let token = far_token("u");
        let backend = FakeBackend::new(&token);
        *backend.stream_body.lock().unwrap() = BALANCE_STREAM.to_string();
        let url = spawn_backend(backend).await;
        let client = client_with(&url, Some(&token));

        let mut kinds = Vec::new();
        client
            .stream_chat("What is my balance?", "thread_1", |event| kinds.push(event.kind()))
            .await
            .unwrap();
        assert_eq!(
            kinds,
            vec![
                "other",
                "react_step",
                "reasoning_token",
                "react_step",
                "react_step",
                "react_step",
                "evaluation_complete",
                "other"
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_retries_after_unauthorized() {
        let fresh = far_token("new");
        let backend = FakeBackend::new(&fresh);
        *backend.next_token.lock().unwrap() = Some(fresh.clone());
        *backend.stream_body.lock().unwrap() = BALANCE_STREAM.to_string();
        let url = spawn_backend(backend.clone()).await;
        let client = client_with(&url, Some(&far_token("old")));

        let mut count = 0;
        client
            .stream_chat("hi", "thread_1", |_| count += 1)
            .await
            .unwrap();
        assert_eq!(count, 8);
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_with_rejected_session_fails() {
        let client = client_with(
            &spawn_backend(FakeBackend::new("other")).await,
            Some(&far_token("u")),
        );
        let err = client.stream_chat("hi", "t", |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
    }

    #[tokio::test]
    async fn test_spawned_stream_drives_transcript() {
        let token = far_token("u");
        let backend = FakeBackend::new(&token);
        *backend.stream_body.lock().unwrap() = BALANCE_STREAM.to_string();
        let url = spawn_backend(backend).await;
        let api = Arc::new(client_with(&url, Some(&token)));

        let mut transcript = Transcript::new();
        let turn = transcript.begin_turn("What is my balance?", "thread_1").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_chat_stream(
            api,
            turn,
            "What is my balance?".into(),
            "thread_1".into(),
            tx,
        );

        while let Some(update) = rx.recv().await {
            match update {
                StreamUpdate::Event(turn, event) => {
                    transcript.apply(turn, event);
                }
                StreamUpdate::Finished(turn) => {
                    transcript.finish(turn);
                    break;
                }
                StreamUpdate::Failed(_, e) => panic!("stream failed: {e}"),
            }
        }

        assert!(!transcript.is_streaming());
        let answer = transcript.messages().last().unwrap();
        assert_eq!(answer.content, "$1,204.55");
        assert_eq!(answer.react_steps.len(), 4);
        assert_eq!(answer.react_steps[0].phase, Phase::Thought);
        assert_eq!(answer.react_steps[0].reasoning, "checking");
        assert_eq!(answer.evaluation.as_ref().map(|e| e.overall_score), Some(4.5));
    }

    #[tokio::test]
    async fn test_cancelled_stream_stops_updates() {
        let client = client_with("http://10.255.255.1:9", Some(&far_token("u")));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transcript = Transcript::new();
        let turn = transcript.begin_turn("hi", "t").unwrap();

        let handle = spawn_chat_stream(Arc::new(client), turn, "hi".into(), "t".into(), tx);
        handle.cancel();
        transcript.cancel();

        // The aborted task drops its sender without reporting anything.
        assert!(rx.recv().await.is_none());
        assert!(!transcript.is_streaming());
        assert_eq!(transcript.messages().len(), 1);
    }
}
