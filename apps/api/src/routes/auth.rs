use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::state::AppState;

/// Middleware: when `REQUIRE_AUTH` is on, `/api/v1/*` needs `Authorization: Bearer <API_KEY>`.
/// A missing header is rejected, not just a wrong one.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.config.require_auth {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match (presented, state.config.api_key.as_deref()) {
        (Some(token), Some(expected)) if token == expected => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}
