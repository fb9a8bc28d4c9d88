mod analysis;
mod config;
mod documents;
mod errors;
mod llm_client;
mod routes;
mod screening;
mod sentiment;
mod state;
mod tabular;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::analysis::{Analyzer, BatchOrchestrator};
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HR Toolkit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.llm_settings())?;
    info!("LLM client initialized (model: {})", config.gemini_model);

    // One analyzer behind every task; batches share it
    let analyzer = Analyzer::new(Arc::new(llm), config.analyzer_settings());
    let orchestrator = BatchOrchestrator::new(analyzer, config.batch_concurrency);
    let settings = orchestrator.analyzer().settings();
    info!(
        "Batch orchestrator ready (concurrency: {}, attempts: {}, timeout: {}s, strategy: {:?})",
        orchestrator.concurrency(),
        settings.retry.attempts(),
        settings.call_timeout.as_secs(),
        settings.strategy
    );

    let cors = build_cors(&config)?;
    let state = AppState::new(config.clone(), orchestrator);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Permissive when no origins are configured, otherwise an explicit allow-list.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("ALLOWED_ORIGINS has invalid origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}
