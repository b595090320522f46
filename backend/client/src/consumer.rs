//! Reads a streamed `text/plain` response into a [`StreamSession`].
//!
//! Each request gets its own reader task. The session lives in a
//! `watch` channel so a UI can render every chunk as it lands, and the
//! handle can cancel at any point.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use patentflow_core::OptimizationType;

use crate::decode::Utf8Accumulator;
use crate::error::ConsumerError;
use crate::session::StreamSession;

pub const OPTIMIZATION_PATH: &str = "/api/disclosure/proposal-text-optimization";
pub const EFFECTS_PATH: &str = "/api/disclosure/technical-effect-generation";
pub const BACKGROUND_PATH: &str = "/api/disclosure/background-generation";
pub const KEYWORDS_PATH: &str = "/api/report/keyword-recommendation";
pub const HEALTH_PATH: &str = "/api/health";

/// A POST whose response body is streamed text.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub path: String,
    pub body: Value,
}

impl StreamRequest {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body,
        }
    }

    pub fn optimization(text: &str, optimization_type: OptimizationType) -> Self {
        Self::new(
            OPTIMIZATION_PATH,
            json!({ "text": text, "optimizationType": optimization_type }),
        )
    }

    pub fn technical_effects(background: &str, solution: &str) -> Self {
        Self::new(
            EFFECTS_PATH,
            json!({ "technicalBackground": background, "technicalSolution": solution }),
        )
    }

    pub fn background(invention_name: &str, technical_field: &str, existing_problems: &str) -> Self {
        Self::new(
            BACKGROUND_PATH,
            json!({
                "inventionName": invention_name,
                "technicalField": technical_field,
                "existingProblems": existing_problems,
            }),
        )
    }

    pub fn keywords(core_keyword: &str, technical_field: Option<&str>, count: Option<u32>) -> Self {
        Self::new(
            KEYWORDS_PATH,
            json!({
                "coreKeyword": core_keyword,
                "technicalField": technical_field,
                "desiredCount": count,
                "stream": true,
            }),
        )
    }
}

#[derive(Debug, Clone)]
pub struct StreamingClient {
    http: reqwest::Client,
    base_url: String,
}

impl StreamingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Spawn a reader for `request` and return immediately.
    pub fn start(&self, request: StreamRequest) -> StreamHandle {
        let (tx, updates) = watch::channel(StreamSession::new());
        let session = Arc::new(tx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(consume(
            self.http.clone(),
            self.url(&request.path),
            request.body,
            Arc::clone(&session),
            cancel.clone(),
        ));
        StreamHandle {
            session,
            updates,
            cancel,
            task,
        }
    }

    /// Start `request` and wait for its terminal state.
    pub async fn run(&self, request: StreamRequest) -> StreamSession {
        self.start(request).finish().await
    }

    /// Non-streaming keyword recommendation.
    pub async fn recommend_keywords(
        &self,
        core_keyword: &str,
        technical_field: Option<&str>,
        count: Option<u32>,
    ) -> Result<Vec<String>, ConsumerError> {
        let body = json!({
            "coreKeyword": core_keyword,
            "technicalField": technical_field,
            "desiredCount": count,
            "stream": false,
        });
        let response = self.http.post(self.url(KEYWORDS_PATH)).json(&body).send().await?;
        let value = json_body(response).await?;
        let terms = value["data"]["recommendations"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(terms)
    }

    pub async fn health(&self) -> Result<Value, ConsumerError> {
        let response = self.http.get(self.url(HEALTH_PATH)).send().await?;
        json_body(response).await
    }
}

async fn json_body(response: reqwest::Response) -> Result<Value, ConsumerError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ConsumerError::status(status.as_u16(), &text));
    }
    serde_json::from_str(&text).map_err(|err| ConsumerError::Transport(err.to_string()))
}

/// Control end of one streamed request.
pub struct StreamHandle {
    session: Arc<watch::Sender<StreamSession>>,
    updates: watch::Receiver<StreamSession>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn id(&self) -> Uuid {
        self.updates.borrow().id
    }

    /// A receiver that is notified after every applied chunk and on the terminal transition.
    pub fn updates(&self) -> watch::Receiver<StreamSession> {
        self.updates.clone()
    }

    pub fn snapshot(&self) -> StreamSession {
        self.updates.borrow().clone()
    }

    /// Stop reading and close the connection. The buffer is frozen as of
    /// this call; nothing read afterwards is applied.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.session.send_if_modified(|s| s.cancel());
    }

    /// Forward each newly appended piece of text to `on_delta`, then wait
    /// for the terminal state.
    pub async fn follow(self, mut on_delta: impl FnMut(&str)) -> StreamSession {
        let mut updates = self.updates.clone();
        let mut seen = 0;
        loop {
            {
                let session = updates.borrow_and_update();
                if session.buffer.len() > seen {
                    on_delta(&session.buffer[seen..]);
                    seen = session.buffer.len();
                }
                if session.state.is_terminal() {
                    break;
                }
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
        self.finish().await
    }

    /// Wait for the reader to stop and return the final session.
    pub async fn finish(self) -> StreamSession {
        if let Err(err) = self.task.await {
            warn!(error = %err, "Stream reader task failed");
            self.session
                .send_if_modified(|s| s.fail(ConsumerError::Transport(format!("reader task failed: {err}"))));
        }
        let session = self.session.borrow().clone();
        session
    }
}

async fn consume(
    http: reqwest::Client,
    url: String,
    body: Value,
    session: Arc<watch::Sender<StreamSession>>,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(%url, "Stream cancelled, closing connection");
            session.send_if_modified(|s| s.cancel());
            return;
        }
        result = read_body(&http, &url, &body, &session) => result,
    };

    match result {
        Ok(()) => {
            debug!(%url, "Stream completed");
            session.send_if_modified(|s| s.complete());
        }
        Err(err) => {
            warn!(%url, error = %err, "Stream failed");
            session.send_if_modified(|s| s.fail(err));
        }
    }
}

async fn read_body(
    http: &reqwest::Client,
    url: &str,
    body: &Value,
    session: &watch::Sender<StreamSession>,
) -> Result<(), ConsumerError> {
    let response = http.post(url).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ConsumerError::status(status.as_u16(), &text));
    }

    let mut chunks = response.bytes_stream();
    let mut decoder = Utf8Accumulator::new();
    while let Some(chunk) = chunks.next().await {
        let text = decoder.push(&chunk?)?;
        if !text.is_empty() {
            session.send_if_modified(|s| s.append(&text));
        }
    }
    decoder.finish()
}
