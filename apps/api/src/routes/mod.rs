pub mod auth;
pub mod health;
pub mod rate_limit;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::screening::handlers as screening;
use crate::sentiment::handlers as sentiment;
use crate::state::AppState;

/// Upper bound on request bodies; uploads carry up to 100 resumes.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Response body format for batch endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// CSV download response.
pub fn csv_response(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Resume screening
        .route("/resume/screen", post(screening::handle_screen))
        .route("/resume/upload", post(screening::handle_upload))
        // Sentiment and attrition
        .route("/sentiment/analyze", post(sentiment::handle_analyze))
        .route("/sentiment/attrition", post(sentiment::handle_attrition))
        .route("/sentiment/upload", post(sentiment::handle_upload))
        .layer(from_fn_with_state(state.clone(), auth::require_bearer))
        .layer(from_fn_with_state(
            state.clone(),
            rate_limit::enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/health", get(health::health_handler))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
