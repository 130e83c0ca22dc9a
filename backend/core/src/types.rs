use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Authenticated user profile as returned by `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    /// Build a best-effort profile from a token subject such as `john_doe`.
    pub fn from_subject(sub: &str) -> Self {
        let mut parts = sub.split('_');
        let first = parts.next().filter(|p| !p.is_empty()).unwrap_or("User");
        let last = parts.next().unwrap_or("");
        Self {
            id: sub.to_string(),
            user_id: sub.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{sub}@example.com"),
        }
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.user_id.clone()
        } else {
            full.to_string()
        }
    }
}

/// One conversation as listed in the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatThread {
    pub chat_thread_id: String,
    #[serde(default)]
    pub last_message: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u32,
}

/// A persisted question/answer pair from `GET /chat/history`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub user_query: String,
    #[serde(default)]
    pub bot_response: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the rendered transcript.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub chat_thread_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub react_steps: Vec<ReactStep>,
    pub evaluation: Option<EvaluationSummary>,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            chat_thread_id: None,
            react_steps: Vec::new(),
            evaluation: None,
        }
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.chat_thread_id = Some(thread_id.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Reasoning phase of a ReAct step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Thought,
    Action,
    Observation,
    FinalAnswer,
    Unknown,
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "THOUGHT" => Phase::Thought,
            "ACTION" => Phase::Action,
            "OBSERVATION" => Phase::Observation,
            "FINAL_ANSWER" => Phase::FinalAnswer,
            _ => Phase::Unknown,
        })
    }
}

impl Phase {
    /// Human label used on step cards.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Thought => "Thinking",
            Phase::Action => "Acting",
            Phase::Observation => "Observing",
            Phase::FinalAnswer => "Final Answer",
            Phase::Unknown => "Working",
        }
    }
}

/// Optional tool and pattern metadata attached to a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
}

/// One unit of agent reasoning, keyed by `step`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReactStep {
    pub step: u32,
    pub phase: Phase,
    pub content: String,
    pub details: Option<StepDetails>,
    pub timestamp: DateTime<Utc>,
    /// Live reasoning tokens received for a THOUGHT step.
    pub reasoning: String,
}

impl ReactStep {
    /// Step content without the leading phase glyph the agent prefixes.
    pub fn display_content(&self) -> &str {
        strip_phase_glyph(&self.content)
    }
}

/// Remove a leading phase glyph (💭 🔧 👁️ ✅) and surrounding whitespace.
pub fn strip_phase_glyph(text: &str) -> &str {
    let trimmed = text.trim_start();
    for glyph in ["💭", "🔧", "👁️", "👁", "✅"] {
        if let Some(rest) = trimmed.strip_prefix(glyph) {
            return rest.trim();
        }
    }
    trimmed.trim_end()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CriterionScore {
    pub criterion: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Post-hoc confidence score and critique of an answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSummary {
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub confidence_level: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub criteria_scores: Vec<CriterionScore>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
    Unknown,
}

impl EvaluationSummary {
    pub fn confidence(&self) -> Confidence {
        match self.confidence_level.to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }
}

/// Render a score as stars out of `max`, e.g. `★★★½☆ (3.5/5)`.
pub fn star_rating(score: f64, max: u32) -> String {
    let score = score.clamp(0.0, max as f64);
    let full = score.floor() as u32;
    let half = score.fract() >= 0.5;
    let empty = max - full - u32::from(half);

    let mut out = "★".repeat(full as usize);
    if half {
        out.push('½');
    }
    out.push_str(&"☆".repeat(empty as usize));
    out.push_str(&format!(" ({score}/{max})"));
    out
}

/// Parse backend timestamps: RFC 3339, or naive ISO-8601 taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}
