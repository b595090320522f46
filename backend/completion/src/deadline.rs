use std::future::Future;
use std::time::Duration;

use tracing::warn;

use patentflow_core::CompletionError;

/// Tagged result of a bounded, non-streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Completed(String),
    TimedOut(Duration),
    Failed(CompletionError),
}

/// What a call site does when its completion does not come back in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// Surface timeouts and upstream failures as errors.
    Propagate,
    /// Answer with a fixed value instead; the failure is only logged.
    Fallback(String),
}

/// Run `operation` with a deadline. The operation is dropped when the deadline
/// passes, which releases any in-flight model request.
pub async fn with_deadline<F>(deadline: Duration, operation: F) -> CompletionOutcome
where
    F: Future<Output = Result<String, CompletionError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(text)) => CompletionOutcome::Completed(text),
        Ok(Err(err)) => CompletionOutcome::Failed(err),
        Err(_) => CompletionOutcome::TimedOut(deadline),
    }
}

impl CompletionOutcome {
    /// Apply a call site's policy.
    ///
    /// Invalid input and configuration errors always propagate; a fallback
    /// only covers timeouts and upstream failures.
    pub fn resolve(self, policy: &TimeoutPolicy) -> Result<String, CompletionError> {
        match (self, policy) {
            (Self::Completed(text), _) => Ok(text),
            (Self::TimedOut(after), TimeoutPolicy::Fallback(value)) => {
                warn!(timeout_ms = after.as_millis() as u64, "Completion timed out, using fallback");
                Ok(value.clone())
            }
            (Self::Failed(err @ CompletionError::Upstream { .. }), TimeoutPolicy::Fallback(value))
            | (Self::Failed(err @ CompletionError::Timeout(_)), TimeoutPolicy::Fallback(value)) => {
                warn!(error = %err, "Completion failed, using fallback");
                Ok(value.clone())
            }
            (Self::TimedOut(after), TimeoutPolicy::Propagate) => Err(CompletionError::Timeout(after)),
            (Self::Failed(err), _) => Err(err),
        }
    }
}
