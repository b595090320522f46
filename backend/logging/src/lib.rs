//! Telemetry and structured logging components for PatentFlow.
//!
//! Handles log redaction, console and rolling NDJSON output, and stream lifecycle events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{StreamEvent, StreamEventEntry, StreamEventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
