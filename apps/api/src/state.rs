use std::sync::Arc;

use crate::analysis::BatchOrchestrator;
use crate::config::Config;
use crate::routes::rate_limit::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// One configured model client behind every analysis.
    pub orchestrator: BatchOrchestrator,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: BatchOrchestrator) -> Self {
        let rate_limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute));
        Self {
            config,
            orchestrator,
            rate_limiter,
        }
    }
}
