//! Stream Event Logger
//!
//! One structured, redacted record per event received on the chat stream,
//! written under the `stream_events` target.

use bankbot_core::StreamEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

/// Longest text excerpt kept in a record.
const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Serialize, PartialEq)]
pub struct StreamEventRecord {
    pub thread_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl StreamEventRecord {
    pub fn from_event(thread_id: &str, event: &StreamEvent) -> Self {
        let mut record = StreamEventRecord {
            thread_id: thread_id.to_string(),
            timestamp: Utc::now(),
            kind: event.kind(),
            step: None,
            phase: None,
            tool_name: None,
            score: None,
            preview: None,
        };
        match event {
            StreamEvent::ReactStep(step) => {
                record.step = Some(step.step);
                record.phase = Some(format!("{:?}", step.phase));
                record.tool_name = step.details.as_ref().and_then(|d| d.tool_name.clone());
                record.preview = step.content.as_deref().map(preview);
            }
            StreamEvent::ReasoningToken { step, content } => {
                record.step = *step;
                record.preview = content.as_deref().map(preview);
            }
            StreamEvent::EvaluationComplete { evaluation } => {
                record.score = evaluation.as_ref().map(|e| e.overall_score);
            }
            StreamEvent::Completion {
                evaluation_summary, ..
            } => {
                record.score = evaluation_summary.as_ref().map(|e| e.overall_score);
            }
            StreamEvent::LlmToken { content } => {
                record.preview = content.as_deref().map(preview);
            }
            StreamEvent::Other => {}
        }
        record
    }
}

fn preview(text: &str) -> String {
    let clipped: String = text.chars().take(PREVIEW_CHARS).collect();
    redact_sensitive_data(&clipped)
}

pub struct StreamEventLogger;

impl StreamEventLogger {
    /// Logs a received stream event with its text redacted.
    pub fn log_event(thread_id: &str, event: &StreamEvent) {
        let record = StreamEventRecord::from_event(thread_id, event);
        match serde_json::to_string(&record) {
            Ok(json) => info!(target: "stream_events", kind = record.kind, event = %json, "Stream event"),
            Err(_) => info!(target: "stream_events", event = ?record, "Stream event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> StreamEvent {
        StreamEvent::from_json(raw).unwrap()
    }

    #[test]
    fn test_step_record_is_redacted() {
        let ev = event(
            r#"{"type":"react_step","step":2,"phase":"ACTION","content":"🔧 lookup 123456789012","details":{"tool_name":"get_balance"}}"#,
        );
        let record = StreamEventRecord::from_event("thread_1", &ev);
        assert_eq!(record.kind, "react_step");
        assert_eq!(record.step, Some(2));
        assert_eq!(record.phase.as_deref(), Some("Action"));
        assert_eq!(record.tool_name.as_deref(), Some("get_balance"));
        assert_eq!(record.preview.as_deref(), Some("🔧 lookup [REDACTED_ACCOUNT]"));
    }

    #[test]
    fn test_evaluation_score_recorded() {
        let ev = event(
            r#"{"type":"completion","evaluation_summary":{"overall_score":3.5,"confidence_level":"medium","summary":"ok"}}"#,
        );
        let record = StreamEventRecord::from_event("t", &ev);
        assert_eq!(record.score, Some(3.5));
        assert!(record.preview.is_none());
    }

    #[test]
    fn test_long_tokens_are_clipped() {
        let long = "x".repeat(500);
        let ev = StreamEvent::LlmToken {
            content: Some(long),
        };
        let record = StreamEventRecord::from_event("t", &ev);
        assert_eq!(record.preview.map(|p| p.chars().count()), Some(PREVIEW_CHARS));
    }

    #[test]
    fn test_log_event_without_subscriber() {
        StreamEventLogger::log_event("t", &StreamEvent::Other);
    }
}
