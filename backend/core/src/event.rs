use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{parse_timestamp, EvaluationSummary, Phase, ReactStep, StepDetails};

/// A single JSON frame received on the chat stream, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A reasoning step was created or updated.
    ReactStep(StepEvent),
    /// Live tokens for an in-progress THOUGHT step.
    ReasoningToken {
        #[serde(default)]
        step: Option<u32>,
        #[serde(default)]
        content: Option<String>,
    },
    /// The background evaluator finished scoring the answer.
    EvaluationComplete {
        #[serde(default)]
        evaluation: Option<EvaluationSummary>,
    },
    /// The backend finished the turn.
    Completion {
        #[serde(default)]
        evaluation_summary: Option<EvaluationSummary>,
        #[serde(default)]
        chat_thread_id: Option<String>,
    },
    /// Plain answer token, for agents that stream text without steps.
    LlmToken {
        #[serde(default)]
        content: Option<String>,
    },
    /// `stream_start`, `stream_complete`, `response_chunk` and anything newer.
    #[serde(other)]
    Other,
}

impl StreamEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::ReactStep(_) => "react_step",
            StreamEvent::ReasoningToken { .. } => "reasoning_token",
            StreamEvent::EvaluationComplete { .. } => "evaluation_complete",
            StreamEvent::Completion { .. } => "completion",
            StreamEvent::LlmToken { .. } => "llm_token",
            StreamEvent::Other => "other",
        }
    }

    /// Parse the JSON payload of one `data:` line.
    pub fn from_json(raw: &str) -> Result<Self, crate::BankBotError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Payload of a `react_step` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepEvent {
    pub step: u32,
    pub phase: Phase,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub details: Option<StepDetails>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl StepEvent {
    pub fn final_answer(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.final_answer.as_deref())
            .filter(|a| !a.trim().is_empty())
    }

    pub fn into_step(self) -> ReactStep {
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        ReactStep {
            step: self.step,
            phase: self.phase,
            content: self.content.unwrap_or_default(),
            details: self.details,
            timestamp,
            reasoning: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_react_step() {
        let event = StreamEvent::from_json(
            r#"{"type":"react_step","step":3,"phase":"FINAL_ANSWER","content":"✅ Done","details":{"final_answer":"$1,204.55"},"timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        let StreamEvent::ReactStep(step) = event else {
            panic!("expected react_step");
        };
        assert_eq!(step.step, 3);
        assert_eq!(step.phase, Phase::FinalAnswer);
        assert_eq!(step.final_answer(), Some("$1,204.55"));
    }

    #[test]
    fn test_unknown_types_are_tolerated() {
        for raw in [
            r#"{"type":"stream_start","user_id":"u1"}"#,
            r#"{"type":"stream_complete"}"#,
            r#"{"type":"something_new","x":1}"#,
        ] {
            assert_eq!(StreamEvent::from_json(raw).unwrap(), StreamEvent::Other);
        }
    }

    #[test]
    fn test_null_fields_default() {
        let event = StreamEvent::from_json(
            r#"{"type":"react_step","step":1,"phase":"THOUGHT","content":null,"details":null}"#,
        )
        .unwrap();
        let StreamEvent::ReactStep(step) = event else {
            panic!("expected react_step");
        };
        let step = step.into_step();
        assert_eq!(step.content, "");
        assert!(step.details.is_none());
    }

    #[test]
    fn test_completion_with_summary() {
        let event = StreamEvent::from_json(
            r#"{"type":"completion","evaluation_summary":{"overall_score":4.5,"confidence_level":"high","summary":"ok","criteria_scores":[],"strengths":["clear"],"weaknesses":[]}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::Completion { evaluation_summary: Some(eval), .. } => {
                assert_eq!(eval.overall_score, 4.5);
                assert_eq!(eval.strengths, vec!["clear".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_is_an_error() {
        assert!(StreamEvent::from_json(r#"{"content":"x"}"#).is_err());
    }
}
