//! PatentFlow Gateway HTTP API Server
//!
//! Validates drafting requests, opens completion streams, and relays their
//! fragments to the client as chunked `text/plain`.

pub mod background;
pub mod effects;
pub mod error;
pub mod health_api;
pub mod keywords;
pub mod optimization;
pub mod server;
pub mod transport;

pub use error::ApiError;
pub use server::{build_router, serve, start_server, GatewayState};
pub use transport::{Pacing, ResponsePlan, StreamTransportError};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{Body, Bytes};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use patentflow_completion::{CompletionSource, MockModel};
    use patentflow_core::ModelConfig;

    use crate::server::GatewayState;

    pub fn state(model: Arc<MockModel>) -> GatewayState {
        state_with_config(model, ModelConfig::default())
    }

    pub fn state_with_config(model: Arc<MockModel>, config: ModelConfig) -> GatewayState {
        GatewayState::new(CompletionSource::new(model, Arc::new(config)))
            .with_char_delay(Duration::ZERO)
    }

    pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Result<Bytes, axum::Error>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        (status, axum::body::to_bytes(response.into_body(), usize::MAX).await)
    }

    pub async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Result<Bytes, axum::Error>) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(router, request).await
    }

    pub async fn get(router: Router, uri: &str) -> (StatusCode, Bytes) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(router, request).await;
        (status, body.unwrap())
    }

    pub fn text(body: &Bytes) -> String {
        String::from_utf8(body.to_vec()).unwrap()
    }

    pub fn json(body: &Bytes) -> Value {
        serde_json::from_slice(body).unwrap()
    }
}
