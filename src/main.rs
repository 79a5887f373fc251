mod config;
mod courtlistener;
mod courts;
mod mcp;
mod models;
mod query;
mod ranking;
mod rate_limit;
mod reference;
mod tools;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use config::Config;
use courtlistener::CourtListener;
use rate_limit::RateLimiter;
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub client: CourtListener,
    pub rate_limiter: Arc<RateLimiter>,
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true, "timestamp": Utc::now() }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caselaw_research_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let client = CourtListener::new(
        config.courtlistener_base_url.clone(),
        config.courtlistener_token.clone(),
        Duration::from_secs(config.upstream_timeout_secs),
        config.upstream_max_attempts,
    )?;
    let rate_limiter = Arc::new(RateLimiter::new(
        config.mcp_rate_limit_per_minute,
        config.mcp_rate_limit_burst,
    ));

    let state = AppState {
        config: config.clone(),
        client,
        rate_limiter,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/mcp", post(mcp::mcp))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("caselaw-research-api listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
