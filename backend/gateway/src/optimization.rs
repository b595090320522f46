use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

use patentflow_completion::prompts;
use patentflow_core::{OptimizationType, PromptRequest};

use crate::error::{required, ApiError};
use crate::server::{capability, GatewayState};
use crate::transport::{Pacing, ResponsePlan};

pub const ENDPOINT: &str = "/api/disclosure/proposal-text-optimization";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeBody {
    pub text: Option<String>,
    pub optimization_type: Option<OptimizationType>,
}

/// Handler for `POST /api/disclosure/proposal-text-optimization`
#[instrument(skip_all)]
pub async fn optimize(
    State(state): State<GatewayState>,
    payload: Result<Json<OptimizeBody>, JsonRejection>,
) -> Result<ResponsePlan, ApiError> {
    let Json(body) = payload?;
    let text = required(body.text, "技术方案文本是必需的")?;
    let kind = body.optimization_type.unwrap_or_default();
    info!(optimization_type = kind.as_str(), chars = text.chars().count(), "Optimizing text");

    let request = PromptRequest::new().with("text", text);
    let fragments = state
        .source
        .stream(&prompts::text_optimization(kind), &request)
        .await?;
    Ok(ResponsePlan::new(ENDPOINT).stream(fragments, Pacing::Whole))
}

pub async fn describe() -> Json<serde_json::Value> {
    capability(
        "专利技术方案优化 API 正常运行",
        ENDPOINT,
        &[
            ("text", "技术方案文本"),
            ("optimizationType", "优化类型 (standard/detailed/concise/legal, 可选)"),
        ],
    )
}
