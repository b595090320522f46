use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use patentflow_core::{ChatRequest, CompletionError, CompletionModel, Fragment, FragmentStream, ModelConfig};
use patentflow_logging::redact_sensitive_data;

/// Streaming client for any OpenAI-compatible `/chat/completions` endpoint
/// (DeepSeek, Qwen, vLLM, OpenAI itself).
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: &ModelConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text deltas from one SSE `data:` payload.
fn parse_chunk(data: &str) -> Result<Vec<String>, CompletionError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| CompletionError::upstream(None, format!("malformed stream chunk: {e}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .filter(|content| !content.is_empty())
        .collect())
}

#[async_trait]
impl CompletionModel for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn stream(&self, request: &ChatRequest) -> Result<FragmentStream, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Configuration("OPENAI_API_KEY is not set".into()))?;

        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &request.system_prompt,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.user_prompt,
        });

        let body = ChatCompletionBody {
            model: &request.model,
            messages,
            temperature: request.temperature,
            stream: true,
        };

        debug!(model = %request.model, base_url = %self.base_url, "Opening chat completion stream");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::upstream(None, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = redact_sensitive_data(&error_body);
            warn!(status = status.as_u16(), body = %message, "Model endpoint rejected request");
            return Err(CompletionError::upstream(Some(status.as_u16()), message));
        }

        let mut events = Box::pin(response.bytes_stream().eventsource());
        let fragments = async_stream::stream! {
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(CompletionError::upstream(None, format!("stream read failed: {e}")));
                        return;
                    }
                };
                let data = event.data.trim();
                if data == "[DONE]" {
                    break;
                }
                if data.is_empty() {
                    continue;
                }
                match parse_chunk(data) {
                    Ok(deltas) => {
                        for delta in deltas {
                            yield Ok(Fragment::from(delta));
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_request() -> ChatRequest {
        ChatRequest {
            model: "deepseek-chat".into(),
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            temperature: 0.1,
        }
    }

    fn provider(server: &MockServer, api_key: Option<&str>) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(&ModelConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        })
    }

    fn sse(deltas: &[&str]) -> String {
        let mut body = String::new();
        for delta in deltas {
            let chunk = serde_json::json!({ "choices": [{ "delta": { "content": delta } }] });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn collect(stream: FragmentStream) -> Vec<Result<Fragment, CompletionError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn streams_deltas_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse(&["本发明", "", "提供", "一种方法"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stream = provider(&server, Some("sk-test")).stream(&chat_request()).await.unwrap();
        let fragments: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(|f| f.unwrap().into_string())
            .collect();
        assert_eq!(fragments, vec!["本发明", "提供", "一种方法"]);
    }

    #[tokio::test]
    async fn error_status_becomes_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"bad key sk-abcdefghijklmnopqrst"}"#))
            .mount(&server)
            .await;

        let err = match provider(&server, Some("sk-test")).stream(&chat_request()).await {
            Err(err) => err,
            Ok(_) => panic!("expected an upstream error"),
        };
        match err {
            CompletionError::Upstream { status, message } => {
                assert_eq!(status, Some(401));
                assert!(!message.contains("sk-abcdefghijklmnopqrst"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_chunk_ends_stream_with_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: not-json\n\n"),
            )
            .mount(&server)
            .await;

        let stream = provider(&server, Some("sk-test")).stream(&chat_request()).await.unwrap();
        let items = collect(stream).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().as_str(), "ok");
        assert!(matches!(items[1], Err(CompletionError::Upstream { .. })));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let server = MockServer::start().await;
        let result = provider(&server, None).stream(&chat_request()).await;
        assert!(matches!(result, Err(CompletionError::Configuration(_))));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
