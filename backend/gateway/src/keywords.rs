//! Keyword recommendation: streamed text or a bounded JSON answer.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use patentflow_completion::prompts;
use patentflow_core::PromptRequest;

use crate::error::{or_default, required, ApiError};
use crate::server::GatewayState;
use crate::transport::{Pacing, ResponsePlan};

pub const ENDPOINT: &str = "/api/report/keyword-recommendation";

pub const DEFAULT_TECHNICAL_FIELD: &str = "通用技术";
pub const DEFAULT_COUNT: u32 = 5;

const USAGE_HINT: &str =
    "缺少必要参数。请使用格式：/api/report/keyword-recommendation?keyword=智能座舱&field=汽车电子&count=5";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordBody {
    pub core_keyword: Option<String>,
    pub technical_field: Option<String>,
    /// Numbers and numeric strings are honored; anything else means the default.
    #[serde(default)]
    pub desired_count: Value,
    pub stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct KeywordQuery {
    pub keyword: Option<String>,
    pub field: Option<String>,
    pub count: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub core_keyword: String,
    pub technical_field: String,
    pub desired_count: u32,
    pub recommendations: Vec<String>,
    pub actual_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub data: Recommendations,
}

struct KeywordInput {
    core_keyword: String,
    technical_field: String,
    desired_count: u32,
}

impl KeywordInput {
    fn prompt_request(&self) -> PromptRequest {
        PromptRequest::new()
            .with("coreKeyword", self.core_keyword.as_str())
            .with("technicalField", self.technical_field.as_str())
            .with("desiredCount", self.desired_count.to_string())
    }
}

fn count_or_default(count: Option<u32>) -> u32 {
    count.filter(|c| *c > 0).unwrap_or(DEFAULT_COUNT)
}

fn count_from_json(value: &Value) -> u32 {
    let count = match value {
        Value::Number(n) => n.as_u64().and_then(|c| u32::try_from(c).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    count_or_default(count)
}

/// Handler for `POST /api/report/keyword-recommendation`
///
/// Streams unless the body sets `"stream": false`.
#[instrument(skip_all)]
pub async fn recommend(
    State(state): State<GatewayState>,
    payload: Result<Json<KeywordBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload?;
    let input = KeywordInput {
        core_keyword: required(body.core_keyword, "核心关键词是必需的")?,
        technical_field: or_default(body.technical_field, DEFAULT_TECHNICAL_FIELD),
        desired_count: count_from_json(&body.desired_count),
    };
    info!(
        keyword = input.core_keyword.as_str(),
        count = input.desired_count,
        stream = body.stream != Some(false),
        "Recommending keywords"
    );

    if body.stream == Some(false) {
        return Ok(complete(&state, input).await?.into_response());
    }
    let fragments = state
        .source
        .stream(&prompts::keyword_recommendation(), &input.prompt_request())
        .await?;
    Ok(ResponsePlan::new(ENDPOINT)
        .stream(fragments, Pacing::Whole)
        .into_response())
}

/// Handler for `GET /api/report/keyword-recommendation?keyword=&field=&count=`
#[instrument(skip_all)]
pub async fn recommend_query(
    State(state): State<GatewayState>,
    Query(query): Query<KeywordQuery>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let input = KeywordInput {
        core_keyword: required(query.keyword, USAGE_HINT)?,
        technical_field: or_default(query.field, DEFAULT_TECHNICAL_FIELD),
        desired_count: count_or_default(query.count.and_then(|c| c.trim().parse().ok())),
    };
    complete(&state, input).await
}

async fn complete(
    state: &GatewayState,
    input: KeywordInput,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let raw = state
        .source
        .complete(&prompts::keyword_recommendation(), &input.prompt_request())
        .await
        .resolve(&state.keyword_policy)?;
    let recommendations = prompts::split_keywords(&raw);

    Ok(Json(RecommendationResponse {
        success: true,
        data: Recommendations {
            actual_count: recommendations.len(),
            core_keyword: input.core_keyword,
            technical_field: input.technical_field,
            desired_count: input.desired_count,
            recommendations,
        },
    }))
}
