use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Paths reachable without a key.
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Rejects calls whose `x-api-key` isn't one of the configured keys.
/// No configured keys means the check is off.
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let keys = &state.config.api_keys;
    let path = req.uri().path();
    if keys.is_empty() || PUBLIC_PATHS.iter().any(|p| *p == path) {
        return Ok(next.run(req).await);
    }

    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| keys.iter().any(|k| k == key));

    if !authorized {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}
