use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use patentflow_core::model::MAX_RETRIES;
use patentflow_core::{ChatRequest, CompletionError, CompletionModel, FragmentStream, ModelConfig, PromptRequest};

use crate::deadline::{with_deadline, CompletionOutcome};
use crate::template::PromptTemplate;

/// Fills prompt templates and drives the configured model.
///
/// Holds no per-request state; clones share the same model and settings.
#[derive(Clone)]
pub struct CompletionSource {
    model: Arc<dyn CompletionModel>,
    config: Arc<ModelConfig>,
}

impl CompletionSource {
    pub fn new(model: Arc<dyn CompletionModel>, config: Arc<ModelConfig>) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    fn chat_request(
        &self,
        template: &PromptTemplate,
        request: &PromptRequest,
    ) -> Result<ChatRequest, CompletionError> {
        let prompt = template.fill(request)?;
        Ok(ChatRequest {
            model: self.config.model.clone(),
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            temperature: template.temperature().unwrap_or(self.config.temperature),
        })
    }

    /// Open a lazy fragment stream for `template`.
    ///
    /// Upstream failures while opening are retried up to `max_retries` times,
    /// never more than [`MAX_RETRIES`].
    /// Errors after the first fragment are passed through unretried, since a
    /// second attempt would repeat text the caller already relayed.
    pub async fn stream(
        &self,
        template: &PromptTemplate,
        request: &PromptRequest,
    ) -> Result<FragmentStream, CompletionError> {
        let chat = self.chat_request(template, request)?;
        let retries = self.config.max_retries.min(MAX_RETRIES);
        let mut attempt: u32 = 0;
        loop {
            match self.model.stream(&chat).await {
                Ok(stream) => {
                    debug!(template = template.name, attempt, "Completion stream opened");
                    return Ok(stream);
                }
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    warn!(
                        template = template.name,
                        model = self.model.name(),
                        attempt,
                        error = %err,
                        "Upstream failed, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Drive the stream to the end and return the concatenated text,
    /// bounded by the configured timeout.
    pub async fn complete(
        &self,
        template: &PromptTemplate,
        request: &PromptRequest,
    ) -> CompletionOutcome {
        // Reject bad input outside the deadline so it is never mistaken for a timeout.
        if let Err(err) = template.fill(request) {
            return CompletionOutcome::Failed(err);
        }

        let outcome = with_deadline(self.config.timeout, async {
            let mut fragments = self.stream(template, request).await?;
            let mut text = String::new();
            while let Some(fragment) = fragments.next().await {
                text.push_str(fragment?.as_str());
            }
            Ok(text)
        })
        .await;

        match &outcome {
            CompletionOutcome::Completed(text) => {
                info!(template = template.name, chars = text.chars().count(), "Completion finished")
            }
            CompletionOutcome::TimedOut(after) => warn!(
                template = template.name,
                timeout_ms = after.as_millis() as u64,
                "Completion timed out"
            ),
            CompletionOutcome::Failed(err) => {
                warn!(template = template.name, error = %err, "Completion failed")
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::deadline::TimeoutPolicy;
    use crate::prompts;
    use crate::providers::mock::{MockBehavior, MockModel};

    fn source(model: Arc<MockModel>, config: ModelConfig) -> CompletionSource {
        CompletionSource::new(model, Arc::new(config))
    }

    fn keyword_request() -> PromptRequest {
        PromptRequest::new()
            .with("coreKeyword", "智能座舱")
            .with("technicalField", "汽车电子")
            .with("desiredCount", "5")
    }

    #[tokio::test]
    async fn complete_concatenates_fragments_in_order() {
        let model = Arc::new(MockModel::new("mock").with_fragments(["座舱", "、", "车载"]));
        let outcome = source(model.clone(), ModelConfig::default())
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert_eq!(outcome, CompletionOutcome::Completed("座舱、车载".into()));
        assert_eq!(model.requests()[0].temperature, 0.1);
        assert!(model.requests()[0].user_prompt.contains("智能座舱"));
    }

    #[tokio::test]
    async fn missing_field_never_calls_the_model() {
        let model = Arc::new(MockModel::new("mock"));
        let source = source(model.clone(), ModelConfig::default());
        let request = PromptRequest::new().with("coreKeyword", "电池");

        let outcome = source.complete(&prompts::keyword_recommendation(), &request).await;
        assert_eq!(
            outcome,
            CompletionOutcome::Failed(CompletionError::MissingField("technicalField".into()))
        );
        assert!(source
            .stream(&prompts::text_optimization(Default::default()), &PromptRequest::new())
            .await
            .is_err());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn retries_once_on_upstream_error() {
        let model = Arc::new(
            MockModel::new("mock")
                .with_fragments(["ok"])
                .then(MockBehavior::FailOpen(CompletionError::upstream(Some(502), "bad gateway"))),
        );
        let outcome = source(model.clone(), ModelConfig::default())
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert_eq!(outcome, CompletionOutcome::Completed("ok".into()));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::FailOpen(
            CompletionError::upstream(Some(429), "rate limited"),
        )));
        let outcome = source(model.clone(), ModelConfig::default())
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert!(matches!(outcome, CompletionOutcome::Failed(CompletionError::Upstream { .. })));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn retry_budget_is_capped_at_one() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::FailOpen(
            CompletionError::upstream(Some(503), "overloaded"),
        )));
        let config = ModelConfig {
            max_retries: 5,
            ..ModelConfig::default()
        };
        let outcome = source(model.clone(), config)
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert!(matches!(outcome, CompletionOutcome::Failed(CompletionError::Upstream { .. })));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::FailOpen(
            CompletionError::Configuration("no key".into()),
        )));
        let outcome = source(model.clone(), ModelConfig::default())
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert!(matches!(outcome, CompletionOutcome::Failed(CompletionError::Configuration(_))));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_is_not_retried() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::FailAfter(
            vec!["half".into()],
            CompletionError::upstream(None, "connection reset"),
        )));
        let outcome = source(model.clone(), ModelConfig::default())
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert!(matches!(outcome, CompletionOutcome::Failed(_)));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn hanging_model_times_out_without_retry() {
        let model = Arc::new(MockModel::new("mock").with_default(MockBehavior::Hang));
        let config = ModelConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let started = Instant::now();
        let outcome = source(model.clone(), config)
            .complete(&prompts::keyword_recommendation(), &keyword_request())
            .await;
        assert_eq!(outcome, CompletionOutcome::TimedOut(Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(model.calls(), 1);

        let resolved = outcome.resolve(&TimeoutPolicy::Fallback(prompts::KEYWORD_FALLBACK.into()));
        assert_eq!(resolved.as_deref(), Ok(prompts::KEYWORD_FALLBACK));
    }
}
