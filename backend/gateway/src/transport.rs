//! Chunked text/plain relay from completion streams to the HTTP response.
//!
//! A response is an ordered plan of literal segments and fragment streams.
//! A per-request producer task runs the plan and feeds a bounded channel
//! that backs the response body, so nothing is buffered beyond the channel.

use std::future::Future;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use futures::future::{self, BoxFuture, FutureExt};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use patentflow_core::{CompletionError, FragmentStream};
use patentflow_logging::{StreamEvent, StreamEventLogger};

/// Chunks the producer may run ahead of the client.
pub const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum StreamTransportError {
    #[error("client disconnected")]
    ClientDisconnected,

    #[error("completion stream failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Emission granularity for a fragment stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One chunk per fragment.
    Whole,
    /// One chunk per character, with `delay` after each.
    PerChar { delay: Duration },
}

impl Pacing {
    pub fn per_char(delay: Duration) -> Self {
        Self::PerChar { delay }
    }
}

/// A fragment stream that may not be opened yet.
pub type PendingStream = BoxFuture<'static, Result<FragmentStream, CompletionError>>;

pub enum Segment {
    Literal(&'static str),
    Stream {
        fragments: PendingStream,
        pacing: Pacing,
    },
}

/// Ordered description of one streamed response body.
pub struct ResponsePlan {
    endpoint: &'static str,
    segments: Vec<Segment>,
}

impl ResponsePlan {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            segments: Vec::new(),
        }
    }

    pub fn literal(mut self, text: &'static str) -> Self {
        self.segments.push(Segment::Literal(text));
        self
    }

    /// Relay an already opened stream.
    pub fn stream(mut self, fragments: FragmentStream, pacing: Pacing) -> Self {
        self.segments.push(Segment::Stream {
            fragments: future::ready(Ok(fragments)).boxed(),
            pacing,
        });
        self
    }

    /// Relay a stream that is only opened once every earlier segment is sent.
    pub fn deferred<F>(mut self, open: F, pacing: Pacing) -> Self
    where
        F: Future<Output = Result<FragmentStream, CompletionError>> + Send + 'static,
    {
        self.segments.push(Segment::Stream {
            fragments: open.boxed(),
            pacing,
        });
        self
    }

    /// Spawn the producer and return the receiving end of the body channel.
    pub fn spawn(self) -> ReceiverStream<Result<Bytes, StreamTransportError>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(drive(self.endpoint, self.segments, tx));
        ReceiverStream::new(rx)
    }
}

impl IntoResponse for ResponsePlan {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self.spawn());
        (
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8"),
                (CACHE_CONTROL, "no-cache"),
                (HeaderName::from_static("x-accel-buffering"), "no"),
            ],
            body,
        )
            .into_response()
    }
}

type ChunkSender = mpsc::Sender<Result<Bytes, StreamTransportError>>;

async fn drive(endpoint: &'static str, segments: Vec<Segment>, tx: ChunkSender) {
    StreamEventLogger::log_event(endpoint, StreamEvent::Opened);

    let mut relay = Relay::new(&tx);
    let result = relay.run(segments).await;
    let (bytes, chunks) = (relay.bytes, relay.chunks);

    match result {
        Ok(()) => StreamEventLogger::log_event(endpoint, StreamEvent::Finished { bytes, chunks }),
        Err(StreamTransportError::ClientDisconnected) => {
            debug!(endpoint, "Client went away, dropping completion stream");
            StreamEventLogger::log_event(endpoint, StreamEvent::ClientGone { bytes });
        }
        Err(err) => {
            StreamEventLogger::log_event(
                endpoint,
                StreamEvent::Aborted {
                    bytes,
                    reason: err.to_string(),
                },
            );
            // An error item makes the body end without its terminating chunk.
            let _ = tx.send(Err(err)).await;
        }
    }
}

struct Relay<'a> {
    tx: &'a ChunkSender,
    bytes: usize,
    chunks: usize,
}

impl<'a> Relay<'a> {
    fn new(tx: &'a ChunkSender) -> Self {
        Self {
            tx,
            bytes: 0,
            chunks: 0,
        }
    }

    async fn run(&mut self, segments: Vec<Segment>) -> Result<(), StreamTransportError> {
        for segment in segments {
            match segment {
                Segment::Literal(text) => self.send(Bytes::from_static(text.as_bytes())).await?,
                Segment::Stream { fragments, pacing } => {
                    let mut fragments = tokio::select! {
                        biased;
                        _ = self.tx.closed() => return Err(StreamTransportError::ClientDisconnected),
                        opened = fragments => opened?,
                    };
                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = self.tx.closed() => return Err(StreamTransportError::ClientDisconnected),
                            next = fragments.next() => next,
                        };
                        match next {
                            Some(fragment) => self.emit(fragment?.as_str(), pacing).await?,
                            None => break,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn emit(&mut self, text: &str, pacing: Pacing) -> Result<(), StreamTransportError> {
        if text.is_empty() {
            return Ok(());
        }
        match pacing {
            Pacing::Whole => self.send(Bytes::copy_from_slice(text.as_bytes())).await,
            Pacing::PerChar { delay } => {
                let mut buf = [0u8; 4];
                for ch in text.chars() {
                    let encoded = ch.encode_utf8(&mut buf);
                    self.send(Bytes::copy_from_slice(encoded.as_bytes())).await?;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Ok(())
            }
        }
    }

    async fn send(&mut self, chunk: Bytes) -> Result<(), StreamTransportError> {
        let len = chunk.len();
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| StreamTransportError::ClientDisconnected)?;
        self.bytes += len;
        self.chunks += 1;
        Ok(())
    }
}
