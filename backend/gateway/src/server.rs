//! Main HTTP gateway server and routing.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use patentflow_completion::{prompts, CompletionSource, TimeoutPolicy};

use crate::{background, effects, health_api, keywords, optimization};

/// Default pause between characters of a per-character paced stream.
pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(20);

/// Application state shared across routes. Read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub source: CompletionSource,
    pub char_delay: Duration,
    pub keyword_policy: TimeoutPolicy,
    pub started: Instant,
}

impl GatewayState {
    pub fn new(source: CompletionSource) -> Self {
        Self {
            source,
            char_delay: DEFAULT_CHAR_DELAY,
            keyword_policy: TimeoutPolicy::Fallback(prompts::KEYWORD_FALLBACK.to_string()),
            started: Instant::now(),
        }
    }

    pub fn with_char_delay(mut self, delay: Duration) -> Self {
        self.char_delay = delay;
        self
    }

    pub fn with_keyword_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.keyword_policy = policy;
        self
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/api/disclosure/proposal-text-optimization",
            get(optimization::describe).post(optimization::optimize),
        )
        .route(
            "/api/disclosure/technical-effect-generation",
            get(effects::describe).post(effects::generate),
        )
        .route(
            "/api/disclosure/background-generation",
            get(background::describe).post(background::generate),
        )
        .route(
            "/api/report/keyword-recommendation",
            get(keywords::recommend_query).post(keywords::recommend),
        )
        .route("/api/health", get(health_api::get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `addr` and serves until ctrl-c.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        %addr,
        model = state.source.config().model.as_str(),
        "Gateway HTTP server listening"
    );
    let app = build_router(state).layer(CorsLayer::permissive());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server failed")?;
    Ok(())
}

/// Self-description returned by `GET` on a work endpoint.
pub(crate) fn capability(
    message: &str,
    endpoint: &str,
    fields: &[(&str, &str)],
) -> axum::Json<serde_json::Value> {
    let required: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(name, meaning)| (name.to_string(), serde_json::Value::from(*meaning)))
        .collect();
    axum::Json(serde_json::json!({
        "message": message,
        "endpoint": endpoint,
        "method": "POST",
        "required_fields": required,
    }))
}
