use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::CompletionError;
use crate::types::Fragment;

/// Lazy, finite, single-pass sequence of fragments from one model call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, CompletionError>> + Send>>;

/// A filled prompt ready to send to a chat-completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// Trait for chat-completion backends.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Backend name (e.g., "openai-compatible", "mock").
    fn name(&self) -> &str;

    /// Open a streaming completion. Resolves once the model has accepted the
    /// request; fragments are produced as the returned stream is polled.
    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, CompletionError>;
}
