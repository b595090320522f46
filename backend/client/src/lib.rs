//! Client side of PatentFlow streaming.
//!
//! Reads streamed completions incrementally and keeps the drafting state
//! that the responses are applied to.

pub mod consumer;
pub mod decode;
pub mod error;
pub mod history;
pub mod session;
pub mod workflow;

pub use consumer::{StreamHandle, StreamRequest, StreamingClient};
pub use decode::Utf8Accumulator;
pub use error::ConsumerError;
pub use history::{History, HistoryEntry, DEFAULT_HISTORY_CAPACITY};
pub use session::{StreamSession, StreamState};
pub use workflow::{AiWarning, AiWarningKind, DisclosureWorkflow, Panel, Step, WorkflowError};
