use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{info, instrument};

use patentflow_completion::prompts;
use patentflow_core::{PromptRequest, BENEFICIAL_EFFECTS_HEADER, PROTECTION_POINTS_HEADER};

use crate::error::ApiError;
use crate::server::{capability, GatewayState};
use crate::transport::{Pacing, ResponsePlan};

pub const ENDPOINT: &str = "/api/disclosure/technical-effect-generation";

const MISSING_INPUT: &str = "技术背景和技术方案是必需的";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsBody {
    pub technical_background: Option<String>,
    pub technical_solution: Option<String>,
}

/// Handler for `POST /api/disclosure/technical-effect-generation`
///
/// Streams beneficial effects, then protection points, each under its own
/// heading. The second completion is only requested after the first ends.
#[instrument(skip_all)]
pub async fn generate(
    State(state): State<GatewayState>,
    payload: Result<Json<EffectsBody>, JsonRejection>,
) -> Result<ResponsePlan, ApiError> {
    let Json(body) = payload?;
    let (background, solution) = match (body.technical_background, body.technical_solution) {
        (Some(b), Some(s)) if !b.trim().is_empty() && !s.trim().is_empty() => (b, s),
        _ => return Err(ApiError::Validation(MISSING_INPUT.to_string())),
    };
    info!(
        background_chars = background.chars().count(),
        solution_chars = solution.chars().count(),
        "Generating technical effects"
    );

    let request = PromptRequest::new()
        .with("technicalBackground", background)
        .with("technicalSolution", solution);
    let effects = state.source.stream(&prompts::beneficial_effects(), &request).await?;

    let source = state.source.clone();
    let protection = async move { source.stream(&prompts::protection_points(), &request).await };

    Ok(ResponsePlan::new(ENDPOINT)
        .literal(BENEFICIAL_EFFECTS_HEADER)
        .stream(effects, Pacing::Whole)
        .literal(PROTECTION_POINTS_HEADER)
        .deferred(protection, Pacing::per_char(state.char_delay)))
}

pub async fn describe() -> Json<serde_json::Value> {
    capability(
        "技术效果生成 API 正常运行",
        ENDPOINT,
        &[
            ("technicalBackground", "技术背景"),
            ("technicalSolution", "技术方案"),
        ],
    )
}
