use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ConsumerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// Text received so far for one streamed request, and how it ended.
///
/// Every mutation is refused once the session leaves `Active`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSession {
    pub id: Uuid,
    pub buffer: String,
    pub state: StreamState,
    pub error: Option<ConsumerError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            buffer: String::new(),
            state: StreamState::Active,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == StreamState::Active
    }

    pub fn append(&mut self, text: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        self.buffer.push_str(text);
        true
    }

    pub fn complete(&mut self) -> bool {
        self.finish(StreamState::Completed, None)
    }

    /// Marks the session failed. The partial buffer is kept.
    pub fn fail(&mut self, error: ConsumerError) -> bool {
        self.finish(StreamState::Failed, Some(error))
    }

    pub fn cancel(&mut self) -> bool {
        self.finish(StreamState::Cancelled, None)
    }

    fn finish(&mut self, state: StreamState, error: Option<ConsumerError>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = state;
        self.error = error;
        self.finished_at = Some(Utc::now());
        true
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_is_final() {
        let mut session = StreamSession::new();
        assert!(session.append("部分"));
        assert!(session.fail(ConsumerError::Transport("reset".into())));

        assert!(!session.append("更多"));
        assert!(!session.complete());
        assert!(!session.cancel());
        assert_eq!(session.buffer, "部分");
        assert_eq!(session.state, StreamState::Failed);
        assert!(session.finished_at.is_some());
    }

    #[test]
    fn cancel_keeps_buffer_without_error() {
        let mut session = StreamSession::new();
        session.append("abc");
        assert!(session.cancel());
        assert_eq!(session.buffer, "abc");
        assert_eq!(session.error, None);
        assert!(session.state.is_terminal());
    }
}
