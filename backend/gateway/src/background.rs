use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

use patentflow_completion::prompts;
use patentflow_core::PromptRequest;

use crate::error::{or_default, ApiError};
use crate::server::{capability, GatewayState};
use crate::transport::{Pacing, ResponsePlan};

pub const ENDPOINT: &str = "/api/disclosure/background-generation";

const MISSING_INPUT: &str = "发明名称和技术领域是必需的";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundBody {
    pub invention_name: Option<String>,
    pub technical_field: Option<String>,
    pub existing_problems: Option<String>,
}

/// Handler for `POST /api/disclosure/background-generation`
#[instrument(skip_all)]
pub async fn generate(
    State(state): State<GatewayState>,
    payload: Result<Json<BackgroundBody>, JsonRejection>,
) -> Result<ResponsePlan, ApiError> {
    let Json(body) = payload?;
    let (name, field) = match (body.invention_name, body.technical_field) {
        (Some(n), Some(f)) if !n.trim().is_empty() && !f.trim().is_empty() => (n, f),
        _ => return Err(ApiError::Validation(MISSING_INPUT.to_string())),
    };
    info!(invention = name.as_str(), field = field.as_str(), "Generating background");

    let request = PromptRequest::new()
        .with("inventionName", name)
        .with("technicalField", field)
        .with(
            "existingProblems",
            or_default(body.existing_problems, prompts::DEFAULT_EXISTING_PROBLEMS),
        );
    let fragments = state
        .source
        .stream(&prompts::background_generation(), &request)
        .await?;
    Ok(ResponsePlan::new(ENDPOINT).stream(fragments, Pacing::Whole))
}

pub async fn describe() -> Json<serde_json::Value> {
    capability(
        "背景技术生成 API 正常运行",
        ENDPOINT,
        &[
            ("inventionName", "发明名称"),
            ("technicalField", "技术领域"),
            ("existingProblems", "现有技术存在的问题 (可选)"),
        ],
    )
}
