//! Log Redaction Layer
//!
//! Scrubs bearer tokens, JWTs, and account or card numbers from strings
//! before they are logged.

use regex::Regex;
use std::sync::LazyLock;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static JWT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eyJ[a-zA-Z0-9_\-]+\.[a-zA-Z0-9_\-]+\.[a-zA-Z0-9_\-]*").unwrap()
});
// Runs of 8+ digits, or four groups of four (card style).
static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{4}[ -]){3}\d{4}\b|\b\d{8,}\b").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = JWT_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    ACCOUNT_RE
        .replace_all(&redacted, "[REDACTED_ACCOUNT]")
        .into_owned()
}
