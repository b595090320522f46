//! Stream Event Logger
//!
//! Structured lifecycle events for streamed responses, emitted through `tracing`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    Opened,
    Finished { bytes: usize, chunks: usize },
    Aborted { bytes: usize, reason: String },
    ClientGone { bytes: usize },
}

#[derive(Debug, Serialize)]
pub struct StreamEventEntry {
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
    pub event: StreamEvent,
}

pub struct StreamEventLogger;

impl StreamEventLogger {
    /// Logs a stream lifecycle event; free-form text is redacted first.
    pub fn log_event(endpoint: &str, mut event: StreamEvent) {
        if let StreamEvent::Aborted { reason, .. } = &mut event {
            *reason = redact_sensitive_data(reason);
        }

        let aborted = matches!(event, StreamEvent::Aborted { .. });
        let entry = StreamEventEntry {
            endpoint: endpoint.into(),
            timestamp: Utc::now(),
            event,
        };

        let payload = serde_json::to_string(&entry).unwrap_or_default();
        if aborted {
            warn!(target: "stream_events", event = %payload, "Stream aborted");
        } else {
            info!(target: "stream_events", event = %payload, "Stream event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_tag() {
        let entry = StreamEventEntry {
            endpoint: "proposal-text-optimization".into(),
            timestamp: Utc::now(),
            event: StreamEvent::Finished { bytes: 12, chunks: 3 },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "Finished");
        assert_eq!(json["event"]["chunks"], 3);
    }
}
