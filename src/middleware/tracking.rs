use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id we accept; longer ones are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Route key for requests the router couldn't match. Raw paths of
/// unmatched requests are caller-controlled, so they all share one metric.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Id under which the current request is tracked. Inserted into the
/// request extensions so handlers can attach timings and tasks to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Wraps every call in `start_request` / `complete_request` and adds:
///
///   x-request-id        — the tracked id (echoed or generated)
///   x-response-time-us  — total handler wall time in microseconds
///   server-timing       — same value in the standard Server-Timing format
pub async fn tracking_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, |p| p.as_str())
        .to_owned();

    let request_id =
        inbound_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let start = Instant::now();
    state
        .tracker
        .start_request_on_route(&request_id, &path, method.as_str(), Some(&route));

    let mut response = next.run(req).await;
    let status = response.status().as_u16();
    // The record may have been evicted while in flight; time it locally then
    let elapsed = state
        .tracker
        .try_complete_request(&request_id, status)
        .unwrap_or_else(|| start.elapsed().as_secs_f64());
    let us = (elapsed * 1_000_000.0) as u64;

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = request_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("x-response-time-us", val);
    }
    let server_timing = format!("total;dur={:.3}", elapsed * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("server-timing", val);
    }

    // ── Log ─────────────────────────────────────────────────────
    // Probes and long-lived streams only at debug
    let quiet = path == "/health" || path.ends_with("/stream");
    match status {
        _ if quiet => tracing::debug!(
            %request_id, %method, %path, status, elapsed_us = us,
            "request completed"
        ),
        500.. => tracing::error!(
            %request_id, %method, %path, status, elapsed_us = us,
            "request failed"
        ),
        400..=499 => tracing::warn!(
            %request_id, %method, %path, status, elapsed_us = us,
            "request rejected"
        ),
        _ => tracing::info!(
            %request_id, %method, %path, status, elapsed_us = us,
            "request completed"
        ),
    }

    response
}

/// Caller-supplied id, if usable.
fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
}
