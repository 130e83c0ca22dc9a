//! Telemetry and structured logging for the Banking Bot client.
//!
//! Handles log redaction, NDJSON file output with daily rotation, and
//! structured logging of every received stream event.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{StreamEventLogger, StreamEventRecord};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
