use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::middleware::RequestId;
use crate::tracker::{RequestRecord, RouteStats, TrackerSummary};
use crate::AppState;

const METRICS_KEEP_ALIVE: Duration = Duration::from_secs(15);

// ─── GET /monitoring/get-requests ────────────────────────────────
/// Every tracked request, keyed by request id.

pub async fn get_requests(
    State(state): State<Arc<AppState>>,
    current: Option<Extension<RequestId>>,
) -> Json<HashMap<String, RequestRecord>> {
    let _timer = current
        .as_ref()
        .map(|Extension(id)| state.tracker.time_function(&id.0, "snapshot_registry"));

    Json(state.tracker.get_request_info_list())
}

// ─── GET /monitoring/requests/:request_id ────────────────────────
/// One request with its tasks; `{}` when the id isn't tracked.

pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Json<serde_json::Value> {
    let info = state
        .tracker
        .get_request_info(&request_id)
        .and_then(|info| serde_json::to_value(info).ok())
        .unwrap_or_else(|| serde_json::json!({}));

    Json(info)
}

// ─── GET /monitoring/metrics ─────────────────────────────────────

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, RouteStats>> {
    Json(state.tracker.get_metrics())
}

// ─── GET /monitoring/summary ─────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub tracker: TrackerSummary,
    pub max_requests: usize,
    pub max_age_secs: u64,
}

pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let policy = state.tracker.policy();
    Json(SummaryResponse {
        tracker: state.tracker.summary(),
        max_requests: policy.max_requests,
        max_age_secs: policy.max_age.as_secs(),
    })
}

// ─── GET /monitoring/metrics/stream ──────────────────────────────
/// Live route metrics as Server-Sent Events: one `metrics` event per
/// `stream_interval`, each carrying the same JSON map as `/monitoring/metrics`.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let ticks = IntervalStream::new(tokio::time::interval(state.config.stream_interval));

    let events = ticks.map(move |_| {
        let event = Event::default().event("metrics");
        // A map of plain numbers always serializes; fall back to an empty object
        Ok(event
            .json_data(state.tracker.get_metrics())
            .unwrap_or_else(|_| Event::default().event("metrics").data("{}")))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(METRICS_KEEP_ALIVE))
}
