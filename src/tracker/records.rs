use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ─── Request lifecycle ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Running,
    Completed,
}

/// Bookkeeping entry for one inbound call.
///
/// `execution_time`, `status_code` and `completion_time` stay `None`
/// until the request completes.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub path: String,
    pub method: String,
    /// Matched route template, when the router knows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub start_time: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Seconds between start and completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    pub functions: Vec<FunctionTiming>,
    pub background_tasks: Vec<String>,

    #[serde(skip)]
    pub(crate) started: Instant,
    /// Insertion sequence, used to tell a restarted id from its old slot.
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl RequestRecord {
    pub(crate) fn new(
        request_id: &str,
        path: &str,
        method: &str,
        route: Option<&str>,
        seq: u64,
    ) -> Self {
        Self {
            request_id: request_id.to_owned(),
            path: path.to_owned(),
            method: method.to_owned(),
            route: route.map(str::to_owned),
            start_time: Utc::now(),
            status: RequestStatus::Running,
            status_code: None,
            execution_time: None,
            completion_time: None,
            functions: Vec::new(),
            background_tasks: Vec::new(),
            started: Instant::now(),
            seq,
        }
    }

    /// Aggregation key, e.g. `GET:/users/:id`.
    pub fn route_key(&self) -> String {
        let path = self.route.as_deref().unwrap_or(&self.path);
        format!("{}:{}", self.method, path)
    }
}

/// One ad-hoc timing attached to a request.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionTiming {
    pub name: String,
    /// Seconds.
    pub execution_time: f64,
    pub timestamp: DateTime<Utc>,
}

// ─── Background tasks ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    /// Originating request. Lookup only; the request may not be tracked.
    pub request_id: String,
    pub task_name: String,
    pub start_time: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub(crate) started: Instant,
    #[serde(skip)]
    pub(crate) finished: Option<Instant>,
}

impl TaskRecord {
    pub(crate) fn new(task_id: &str, request_id: &str, task_name: &str) -> Self {
        Self {
            task_id: task_id.to_owned(),
            request_id: request_id.to_owned(),
            task_name: task_name.to_owned(),
            start_time: Utc::now(),
            status: TaskStatus::Running,
            execution_time: None,
            completion_time: None,
            started: Instant::now(),
            finished: None,
        }
    }
}

// ─── Query results ───────────────────────────────────────────────

/// A request record joined with the tasks it spawned.
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    #[serde(flatten)]
    pub record: RequestRecord,
    pub active_background_tasks: Vec<TaskRecord>,
    pub completed_background_tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerSummary {
    pub tracked_requests: usize,
    pub running_requests: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub routes: usize,
    /// Request records dropped by the retention policy since startup.
    pub evicted_requests: u64,
}
