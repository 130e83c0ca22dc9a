//! Transcript reducer
//!
//! Folds the typed events of a chat stream into the list of display messages
//! plus the live list of in-progress reasoning steps. All transitions are
//! synchronous and side-effect free; the caller owns the network stream and
//! tags every event with the [`TurnId`] it was started for, so late events from
//! a cancelled or superseded stream fall on the floor.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::BankBotError;
use crate::event::StreamEvent;
use crate::types::{
    strip_phase_glyph, ChatMessage, EvaluationSummary, HistoryEntry, Phase, ReactStep, Role,
};

/// Text shown in place of an answer when the stream fails.
pub const STREAM_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Identifies one user message and the stream answering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

/// Outcome of feeding one event to the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Visible state changed.
    Updated,
    /// The final answer was materialized; the streaming UI state is over.
    AnswerComplete,
    /// The event was stale, redundant, or carried nothing usable.
    Ignored,
}

/// What the evaluation panel under the latest answer should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationView<'a> {
    Hidden,
    Pending,
    Ready(&'a EvaluationSummary),
}

#[derive(Debug)]
struct ActiveTurn {
    id: TurnId,
    thread_id: String,
    answer: String,
    assistant_index: Option<usize>,
    pending_evaluation: Option<EvaluationSummary>,
}

/// Client-side state of one chat window.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    live_steps: Vec<ReactStep>,
    streaming: bool,
    answer_complete: bool,
    active: Option<ActiveTurn>,
    turns_started: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Steps of the answer currently being reasoned about, ordered by arrival.
    pub fn live_steps(&self) -> &[ReactStep] {
        &self.live_steps
    }

    /// True from `begin_turn` until the answer is final or the stream stops.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn answer_complete(&self) -> bool {
        self.answer_complete
    }

    /// A stream is still attached, possibly only delivering the evaluation.
    pub fn has_open_stream(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Start a turn: append the user message and enter the streaming state.
    ///
    /// A stream that already produced its answer but is still open is
    /// superseded; its remaining events will be ignored.
    pub fn begin_turn(&mut self, message: &str, thread_id: &str) -> Result<TurnId, BankBotError> {
        if self.streaming {
            return Err(BankBotError::StreamInFlight);
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(BankBotError::EmptyMessage);
        }

        self.turns_started += 1;
        let id = TurnId(self.turns_started);

        self.messages.push(
            ChatMessage::new(message_id("user", id), Role::User, message).in_thread(thread_id),
        );
        self.live_steps.clear();
        self.streaming = true;
        self.answer_complete = false;
        self.active = Some(ActiveTurn {
            id,
            thread_id: thread_id.to_string(),
            answer: String::new(),
            assistant_index: None,
            pending_evaluation: None,
        });
        debug!(turn = id.0, thread_id, "Turn started");
        Ok(id)
    }

    /// Fold one stream event into the transcript.
    pub fn apply(&mut self, turn: TurnId, event: StreamEvent) -> Applied {
        if self.active_turn() != Some(turn) {
            return Applied::Ignored;
        }

        match event {
            StreamEvent::ReactStep(step_event) => {
                if self.answer_complete {
                    return Applied::Ignored;
                }
                let final_answer = (step_event.phase == Phase::FinalAnswer).then(|| {
                    step_event.final_answer().map(str::to_string).unwrap_or_else(|| {
                        strip_phase_glyph(step_event.content.as_deref().unwrap_or_default())
                            .to_string()
                    })
                });
                self.upsert_step(step_event.into_step());

                match final_answer {
                    Some(answer) => {
                        self.complete_answer(answer);
                        Applied::AnswerComplete
                    }
                    None => Applied::Updated,
                }
            }
            StreamEvent::ReasoningToken { step, content } => {
                if self.answer_complete {
                    return Applied::Ignored;
                }
                let (Some(index), Some(content)) = (step, content) else {
                    return Applied::Ignored;
                };
                match self
                    .live_steps
                    .iter_mut()
                    .find(|s| s.step == index && s.phase == Phase::Thought)
                {
                    Some(step) => {
                        step.reasoning.push_str(&content);
                        Applied::Updated
                    }
                    None => Applied::Ignored,
                }
            }
            StreamEvent::EvaluationComplete { evaluation } => match evaluation {
                Some(evaluation) => self.attach_evaluation(evaluation),
                None => Applied::Ignored,
            },
            StreamEvent::Completion {
                evaluation_summary, ..
            } => match evaluation_summary {
                Some(evaluation) => self.attach_evaluation(evaluation),
                None => Applied::Ignored,
            },
            StreamEvent::LlmToken { content } => {
                if self.answer_complete {
                    return Applied::Ignored;
                }
                let Some(content) = content.filter(|c| !c.is_empty()) else {
                    return Applied::Ignored;
                };
                let answer = match self.active.as_mut() {
                    Some(active) => {
                        active.answer.push_str(&content);
                        active.answer.clone()
                    }
                    None => return Applied::Ignored,
                };
                if let Some(message) = self.assistant_message_mut() {
                    message.content = answer;
                }
                Applied::Updated
            }
            StreamEvent::Other => Applied::Ignored,
        }
    }

    /// The stream ended normally. Returns the thread it belonged to.
    ///
    /// Without an explicit answer the last THOUGHT is promoted to the answer.
    pub fn finish(&mut self, turn: TurnId) -> Option<String> {
        if self.active_turn() != Some(turn) {
            return None;
        }
        self.streaming = false;

        let has_answer = self
            .active
            .as_ref()
            .is_some_and(|a| !a.answer.is_empty());

        if !has_answer && !self.answer_complete {
            if let Some(fallback) = self.fallback_answer() {
                debug!(turn = turn.0, "Using last thought as the answer");
                let steps = std::mem::take(&mut self.live_steps);
                if let Some(message) = self.assistant_message_mut() {
                    message.content = fallback.clone();
                    message.react_steps = steps;
                }
                if let Some(active) = self.active.as_mut() {
                    active.answer = fallback;
                }
            }
        } else if !self.answer_complete {
            let steps = std::mem::take(&mut self.live_steps);
            if let Some(message) = self.existing_assistant_message_mut() {
                message.react_steps = steps;
            }
        }

        let pending = self.active.as_mut().and_then(|a| a.pending_evaluation.take());
        if let Some(evaluation) = pending {
            if let Some(message) = self.existing_assistant_message_mut() {
                message.evaluation = Some(evaluation);
            }
        }

        self.live_steps.clear();
        self.active.take().map(|a| a.thread_id)
    }

    /// The stream failed. Appends an error bubble unless the answer already arrived.
    pub fn fail(&mut self, turn: TurnId) -> bool {
        if self.active_turn() != Some(turn) {
            return false;
        }
        let thread_id = self.active.take().map(|a| a.thread_id);
        self.streaming = false;
        self.live_steps.clear();

        if self.answer_complete {
            return false;
        }
        let mut message =
            ChatMessage::new(message_id("error", turn), Role::Assistant, STREAM_ERROR_MESSAGE);
        message.chat_thread_id = thread_id;
        self.messages.push(message);
        true
    }

    /// Stop listening to the active stream without waiting for the server.
    pub fn cancel(&mut self) -> Option<TurnId> {
        let turn = self.active.take().map(|a| a.id);
        self.streaming = false;
        self.live_steps.clear();
        turn
    }

    /// Populate an empty transcript from persisted history.
    pub fn load_history(&mut self, thread_id: &str, entries: Vec<HistoryEntry>) -> bool {
        if !self.messages.is_empty() {
            debug!(thread_id, existing = self.messages.len(), "Skipping history load");
            return false;
        }
        for entry in entries {
            self.messages.push(
                ChatMessage::new(format!("{}-user", entry.id), Role::User, entry.user_query)
                    .in_thread(thread_id)
                    .at(entry.created_at),
            );
            self.messages.push(
                ChatMessage::new(
                    format!("{}-assistant", entry.id),
                    Role::Assistant,
                    entry.bot_response,
                )
                .in_thread(thread_id)
                .at(entry.created_at),
            );
        }
        true
    }

    /// Drop everything, e.g. when switching to a new chat.
    pub fn reset(&mut self) {
        *self = Self {
            turns_started: self.turns_started,
            ..Self::default()
        };
    }

    /// Index of the most recent assistant message.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == Role::Assistant)
    }

    pub fn evaluation_view(&self) -> EvaluationView<'_> {
        let Some(message) = self.last_assistant_index().map(|i| &self.messages[i]) else {
            return EvaluationView::Hidden;
        };
        if let Some(evaluation) = &message.evaluation {
            return EvaluationView::Ready(evaluation);
        }
        let waiting = self.answer_complete
            && self
                .active
                .as_ref()
                .is_some_and(|a| a.assistant_index == self.last_assistant_index());
        if waiting {
            EvaluationView::Pending
        } else {
            EvaluationView::Hidden
        }
    }

    fn upsert_step(&mut self, step: ReactStep) {
        match self.live_steps.iter_mut().find(|s| s.step == step.step) {
            Some(existing) => *existing = step,
            None => self.live_steps.push(step),
        }
    }

    fn complete_answer(&mut self, answer: String) {
        let steps = std::mem::take(&mut self.live_steps);
        let pending = self.active.as_mut().and_then(|a| {
            if !answer.is_empty() {
                a.answer = answer.clone();
            }
            a.pending_evaluation.take()
        });

        if let Some(message) = self.assistant_message_mut() {
            if !answer.is_empty() {
                message.content = answer;
            }
            message.react_steps = steps;
            if pending.is_some() {
                message.evaluation = pending;
            }
        }
        self.streaming = false;
        self.answer_complete = true;
    }

    fn attach_evaluation(&mut self, evaluation: EvaluationSummary) -> Applied {
        if let Some(message) = self.existing_assistant_message_mut() {
            message.evaluation = Some(evaluation);
            return Applied::Updated;
        }
        if let Some(active) = self.active.as_mut() {
            active.pending_evaluation = Some(evaluation);
        }
        Applied::Updated
    }

    fn fallback_answer(&self) -> Option<String> {
        let thought = self
            .live_steps
            .iter()
            .rev()
            .find(|s| s.phase == Phase::Thought)?;
        let raw = thought
            .details
            .as_ref()
            .and_then(|d| d.full_thought.as_deref())
            .unwrap_or(&thought.content);
        let text = strip_phase_glyph(raw);
        (!text.is_empty()).then(|| text.to_string())
    }

    fn existing_assistant_message_mut(&mut self) -> Option<&mut ChatMessage> {
        let index = self.active.as_ref()?.assistant_index?;
        self.messages.get_mut(index)
    }

    /// This turn's assistant message, created on first use.
    fn assistant_message_mut(&mut self) -> Option<&mut ChatMessage> {
        let active = self.active.as_mut()?;
        let index = match active.assistant_index {
            Some(index) => index,
            None => {
                let message =
                    ChatMessage::new(message_id("assistant", active.id), Role::Assistant, "")
                        .in_thread(active.thread_id.clone());
                self.messages.push(message);
                let index = self.messages.len() - 1;
                active.assistant_index = Some(index);
                index
            }
        };
        self.messages.get_mut(index)
    }
}

/// Generate an identifier for a conversation the backend has not seen yet.
pub fn new_thread_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("thread_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

fn message_id(prefix: &str, turn: TurnId) -> String {
    format!("{prefix}_{}_{}", Utc::now().timestamp_millis(), turn.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StepEvent;
    use crate::types::StepDetails;

    fn step(index: u32, phase: Phase, content: &str) -> StreamEvent {
        StreamEvent::ReactStep(StepEvent {
            step: index,
            phase,
            content: Some(content.to_string()),
            details: None,
            timestamp: None,
        })
    }

    fn final_answer(index: u32, answer: &str) -> StreamEvent {
        StreamEvent::ReactStep(StepEvent {
            step: index,
            phase: Phase::FinalAnswer,
            content: Some("✅ Final answer ready".into()),
            details: Some(StepDetails {
                final_answer: Some(answer.to_string()),
                ..Default::default()
            }),
            timestamp: None,
        })
    }

    fn evaluation(score: f64) -> EvaluationSummary {
        EvaluationSummary {
            overall_score: score,
            confidence_level: "high".into(),
            summary: "Accurate".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_balance_question_flow() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("What is my balance?", "thread_1").unwrap();
        assert_eq!(t.messages().len(), 1);
        assert_eq!(t.messages()[0].role, Role::User);
        assert!(t.is_streaming());

        t.apply(turn, step(1, Phase::Thought, "💭 I should look up the balance"));
        t.apply(turn, step(2, Phase::Action, "🔧 get_balance"));
        t.apply(turn, step(3, Phase::Observation, "👁️ 1204.55"));
        assert_eq!(t.live_steps().len(), 3);

        let applied = t.apply(turn, final_answer(4, "$1,204.55"));
        assert_eq!(applied, Applied::AnswerComplete);
        assert!(!t.is_streaming());
        assert!(t.answer_complete());
        assert!(t.live_steps().is_empty());

        let answer = &t.messages()[1];
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "$1,204.55");
        assert_eq!(answer.react_steps.len(), 4);
        assert_eq!(answer.chat_thread_id.as_deref(), Some("thread_1"));
    }

    #[test]
    fn test_same_step_index_is_upserted() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, step(1, Phase::Thought, "first draft"));
        t.apply(turn, step(1, Phase::Thought, "second draft"));
        assert_eq!(t.live_steps().len(), 1);
        assert_eq!(t.live_steps()[0].content, "second draft");
    }

    #[test]
    fn test_final_answer_ends_streaming_with_evaluation_pending() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, final_answer(1, "hello"));
        assert!(!t.is_streaming());
        assert!(t.has_open_stream());
        assert_eq!(t.evaluation_view(), EvaluationView::Pending);

        t.apply(
            turn,
            StreamEvent::EvaluationComplete {
                evaluation: Some(evaluation(4.0)),
            },
        );
        assert!(matches!(t.evaluation_view(), EvaluationView::Ready(e) if e.overall_score == 4.0));

        assert_eq!(t.finish(turn).as_deref(), Some("t"));
        assert!(matches!(t.evaluation_view(), EvaluationView::Ready(_)));
    }

    #[test]
    fn test_evaluation_before_final_answer_is_held() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(
            turn,
            StreamEvent::EvaluationComplete {
                evaluation: Some(evaluation(3.0)),
            },
        );
        assert_eq!(t.messages().len(), 1);
        t.apply(turn, final_answer(1, "hello"));
        assert_eq!(t.messages()[1].evaluation.as_ref().map(|e| e.overall_score), Some(3.0));
    }

    #[test]
    fn test_completion_summary_attaches() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, final_answer(1, "hello"));
        t.apply(
            turn,
            StreamEvent::Completion {
                evaluation_summary: Some(evaluation(5.0)),
                chat_thread_id: None,
            },
        );
        assert!(t.messages()[1].evaluation.is_some());
    }

    #[test]
    fn test_pending_evaluation_hidden_after_stream_closes() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, final_answer(1, "hello"));
        t.finish(turn);
        assert_eq!(t.evaluation_view(), EvaluationView::Hidden);
    }

    #[test]
    fn test_cancel_stops_mutation() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, step(1, Phase::Thought, "thinking"));
        assert_eq!(t.cancel(), Some(turn));
        assert!(!t.is_streaming());
        assert!(t.live_steps().is_empty());

        let before = t.messages().to_vec();
        assert_eq!(t.apply(turn, final_answer(2, "late")), Applied::Ignored);
        assert_eq!(
            t.apply(turn, StreamEvent::LlmToken { content: Some("x".into()) }),
            Applied::Ignored
        );
        assert!(t.finish(turn).is_none());
        assert!(!t.fail(turn));
        assert_eq!(t.messages(), before.as_slice());
    }

    #[test]
    fn test_stale_turn_is_ignored_after_new_turn() {
        let mut t = Transcript::new();
        let first = t.begin_turn("one", "t").unwrap();
        t.apply(first, final_answer(1, "answer one"));
        let second = t.begin_turn("two", "t").unwrap();
        assert_ne!(first, second);
        assert_eq!(
            t.apply(
                first,
                StreamEvent::EvaluationComplete {
                    evaluation: Some(evaluation(1.0))
                }
            ),
            Applied::Ignored
        );
        assert!(t.messages()[1].evaluation.is_none());
    }

    #[test]
    fn test_begin_turn_guards() {
        let mut t = Transcript::new();
        assert!(matches!(t.begin_turn("   ", "t"), Err(BankBotError::EmptyMessage)));
        t.begin_turn("hi", "t").unwrap();
        assert!(matches!(t.begin_turn("again", "t"), Err(BankBotError::StreamInFlight)));
    }

    #[test]
    fn test_reasoning_tokens_only_extend_thoughts() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, step(1, Phase::Thought, "thinking"));
        t.apply(turn, step(2, Phase::Action, "acting"));
        for token in ["The ", "balance"] {
            t.apply(
                turn,
                StreamEvent::ReasoningToken {
                    step: Some(1),
                    content: Some(token.into()),
                },
            );
        }
        let ignored = t.apply(
            turn,
            StreamEvent::ReasoningToken {
                step: Some(2),
                content: Some("nope".into()),
            },
        );
        assert_eq!(ignored, Applied::Ignored);
        assert_eq!(t.live_steps()[0].reasoning, "The balance");
        assert_eq!(t.live_steps()[1].reasoning, "");
    }

    #[test]
    fn test_finish_falls_back_to_last_thought() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, step(1, Phase::Thought, "early thought"));
        t.apply(
            turn,
            StreamEvent::ReactStep(StepEvent {
                step: 2,
                phase: Phase::Thought,
                content: Some("💭 short".into()),
                details: Some(StepDetails {
                    full_thought: Some("💭 Your balance is $10".into()),
                    ..Default::default()
                }),
                timestamp: None,
            }),
        );
        t.apply(turn, step(3, Phase::Observation, "observed"));
        t.finish(turn);

        assert!(!t.is_streaming());
        let answer = t.messages().last().unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "Your balance is $10");
        assert_eq!(answer.react_steps.len(), 3);
    }

    #[test]
    fn test_finish_without_anything_adds_no_answer() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.finish(turn);
        assert_eq!(t.messages().len(), 1);
    }

    #[test]
    fn test_llm_tokens_build_answer() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        for token in ["Hel", "lo"] {
            t.apply(turn, StreamEvent::LlmToken { content: Some(token.into()) });
        }
        assert_eq!(t.messages().len(), 2);
        assert_eq!(t.messages()[1].content, "Hello");
        t.finish(turn);
        assert_eq!(t.messages()[1].content, "Hello");
    }

    #[test]
    fn test_fail_appends_error_message() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, step(1, Phase::Thought, "thinking"));
        assert!(t.fail(turn));
        assert!(!t.is_streaming());
        assert!(t.live_steps().is_empty());
        assert_eq!(t.messages().last().unwrap().content, STREAM_ERROR_MESSAGE);
    }

    #[test]
    fn test_fail_after_answer_keeps_answer() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.apply(turn, final_answer(1, "done"));
        assert!(!t.fail(turn));
        assert_eq!(t.messages().last().unwrap().content, "done");
    }

    #[test]
    fn test_history_only_loads_into_empty_transcript() {
        let entry = HistoryEntry {
            id: "7".into(),
            user_query: "q".into(),
            bot_response: "a".into(),
            created_at: Utc::now(),
        };
        let mut t = Transcript::new();
        assert!(t.load_history("t", vec![entry.clone()]));
        assert_eq!(t.messages().len(), 2);
        assert_eq!(t.messages()[0].id, "7-user");
        assert_eq!(t.messages()[1].id, "7-assistant");
        assert!(!t.load_history("t", vec![entry]));
        assert_eq!(t.messages().len(), 2);
    }

    #[test]
    fn test_reset_clears_view() {
        let mut t = Transcript::new();
        let turn = t.begin_turn("hi", "t").unwrap();
        t.reset();
        assert!(t.is_empty());
        assert!(!t.has_open_stream());
        assert_eq!(t.apply(turn, final_answer(1, "x")), Applied::Ignored);
    }

    #[test]
    fn test_new_thread_id_shape() {
        let id = new_thread_id();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "thread");
        assert_eq!(parts[2].len(), 9);
    }
}
