//! Gateway health endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: String,
    pub uptime_seconds: u64,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        service: "patentflow-gateway",
        version: env!("CARGO_PKG_VERSION"),
        model: state.source.config().model.clone(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use patentflow_completion::MockModel;

    use crate::server::build_router;
    use crate::test_support::{get, json, state};

    #[tokio::test]
    async fn health_reports_service_and_model() {
        let router = build_router(state(Arc::new(MockModel::new("mock"))));
        let (status, body) = get(router, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "patentflow-gateway");
        assert_eq!(body["model"], "deepseek-chat");
    }
}
