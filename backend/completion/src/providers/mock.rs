use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use patentflow_core::{ChatRequest, CompletionError, CompletionModel, Fragment, FragmentStream};

/// What the mock does for one call.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Yield these fragments, then end normally.
    Fragments(Vec<String>),
    /// Refuse to open the stream.
    FailOpen(CompletionError),
    /// Yield these fragments, then fail.
    FailAfter(Vec<String>, CompletionError),
    /// Open a stream that never produces anything.
    Hang,
}

impl MockBehavior {
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(Into::into).collect())
    }
}

/// A scripted completion model for offline runs and tests.
///
/// Queued behaviors are used once each, in order; after that every call
/// falls back to the default behavior.
pub struct MockModel {
    name: String,
    default: MockBehavior,
    queued: Mutex<VecDeque<MockBehavior>>,
    fragment_delay: Option<Duration>,
    calls: AtomicUsize,
    yielded: Arc<AtomicUsize>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: MockBehavior::fragments(["Mock response"]),
            queued: Mutex::new(VecDeque::new()),
            fragment_delay: None,
            calls: AtomicUsize::new(0),
            yielded: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fragments<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_default(MockBehavior::fragments(fragments))
    }

    pub fn with_default(mut self, behavior: MockBehavior) -> Self {
        self.default = behavior;
        self
    }

    /// Queue a behavior for the next unclaimed call.
    pub fn then(self, behavior: MockBehavior) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(behavior);
        self
    }

    /// Sleep before each fragment, to imitate token latency.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Number of times a stream was requested.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of fragments actually produced across all streams.
    pub fn yielded(&self) -> usize {
        self.yielded.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let behavior = self
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        let (fragments, failure) = match behavior {
            MockBehavior::Fragments(fragments) => (fragments, None),
            MockBehavior::FailAfter(fragments, err) => (fragments, Some(err)),
            MockBehavior::FailOpen(err) => return Err(err),
            MockBehavior::Hang => {
                return Ok(Box::pin(futures::stream::pending::<
                    Result<Fragment, CompletionError>,
                >()))
            }
        };

        let delay = self.fragment_delay;
        let yielded = Arc::clone(&self.yielded);
        Ok(Box::pin(async_stream::stream! {
            for fragment in fragments {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yielded.fetch_add(1, Ordering::SeqCst);
                yield Ok(Fragment::from(fragment));
            }
            if let Some(err) = failure {
                yield Err(err);
            }
        }))
    }
}
