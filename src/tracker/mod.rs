//! In-process registry correlating inbound requests, the background tasks
//! they spawn, ad-hoc function timings and per-route latency statistics.
//!
//! Every operation is best-effort: an unknown id degrades to a no-op or an
//! empty result, never an error, so tracking can't break the request it
//! observes.

pub mod records;
pub mod retention;
pub mod route_metrics;
pub mod timer;

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;

pub use records::{
    FunctionTiming, RequestInfo, RequestRecord, RequestStatus, TaskRecord, TaskStatus,
    TrackerSummary,
};
pub use retention::{RetentionPolicy, SweepReport};
pub use route_metrics::{PercentileSet, RouteStats};
pub use timer::FunctionTimer;

use retention::InsertionOrder;
use route_metrics::RouteMetric;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe request/task registry.
/// Middleware calls `start_request()`/`complete_request()`, the monitoring
/// routes read snapshots.
pub struct UnifiedTracker {
    inner: Mutex<Inner>,
    policy: RetentionPolicy,
}

// ─── Internal state ──────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    requests: HashMap<String, RequestRecord>,
    active_tasks: HashMap<String, TaskRecord>,
    /// Finished tasks keyed by their originating request id.
    completed_tasks: HashMap<String, Vec<TaskRecord>>,
    routes: HashMap<String, RouteMetric>,

    order: InsertionOrder,
    evicted_requests: u64,
}

// ─── UnifiedTracker impl ─────────────────────────────────────────

impl UnifiedTracker {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Begin tracking a request. A duplicate id overwrites the old record.
    pub fn start_request(&self, request_id: &str, path: &str, method: &str) {
        self.start_request_on_route(request_id, path, method, None);
    }

    /// Like [`start_request`](Self::start_request), aggregating under the
    /// route template instead of the raw path when one is given.
    pub fn start_request_on_route(
        &self,
        request_id: &str,
        path: &str,
        method: &str,
        route: Option<&str>,
    ) {
        let mut inner = self.inner.lock();
        let seq = inner.order.push(request_id);
        inner.requests.insert(
            request_id.to_owned(),
            RequestRecord::new(request_id, path, method, route, seq),
        );
        inner.enforce_capacity(self.policy.max_requests);
    }

    /// Mark a request completed and fold its duration into the route
    /// metric. Returns the elapsed seconds, or `0.0` for an unknown id.
    pub fn complete_request(&self, request_id: &str, status_code: u16) -> f64 {
        self.try_complete_request(request_id, status_code)
            .unwrap_or(0.0)
    }

    /// Same as [`complete_request`](Self::complete_request) but reports an
    /// unknown id as `None` instead of a zero duration.
    pub fn try_complete_request(&self, request_id: &str, status_code: u16) -> Option<f64> {
        self.inner.lock().complete_request(request_id, status_code)
    }

    /// Register a task spawned while handling `request_id`. The parent link
    /// is skipped if the request isn't tracked.
    pub fn start_background_task(&self, task_id: &str, request_id: &str, task_name: &str) {
        let mut inner = self.inner.lock();
        inner.active_tasks.insert(
            task_id.to_owned(),
            TaskRecord::new(task_id, request_id, task_name),
        );
        if let Some(record) = inner.requests.get_mut(request_id) {
            record.background_tasks.push(task_id.to_owned());
        }
    }

    /// Move a task out of the active set. Unknown (or already completed)
    /// ids are ignored.
    pub fn complete_background_task(&self, task_id: &str, success: bool) {
        self.inner.lock().complete_background_task(task_id, success);
    }

    pub fn record_function_execution(
        &self,
        request_id: &str,
        function_name: &str,
        execution_time: f64,
    ) {
        let mut inner = self.inner.lock();
        if let Some(record) = inner.requests.get_mut(request_id) {
            record.functions.push(FunctionTiming {
                name: function_name.to_owned(),
                execution_time,
                timestamp: Utc::now(),
            });
        }
    }

    /// Snapshot of one request with its active and completed tasks.
    pub fn get_request_info(&self, request_id: &str) -> Option<RequestInfo> {
        self.inner.lock().request_info(request_id)
    }

    /// Owned copy of every tracked request, keyed by id.
    pub fn get_request_info_list(&self) -> HashMap<String, RequestRecord> {
        self.inner.lock().requests.clone()
    }

    /// Per-route statistics for every route with at least one completion.
    pub fn get_metrics(&self) -> BTreeMap<String, RouteStats> {
        self.inner
            .lock()
            .routes
            .iter()
            .filter(|(_, metric)| metric.count() > 0)
            .map(|(key, metric)| (key.clone(), metric.stats()))
            .collect()
    }

    pub fn summary(&self) -> TrackerSummary {
        let inner = self.inner.lock();
        TrackerSummary {
            tracked_requests: inner.requests.len(),
            running_requests: inner
                .requests
                .values()
                .filter(|r| r.status == RequestStatus::Running)
                .count(),
            active_tasks: inner.active_tasks.len(),
            completed_tasks: inner.completed_tasks.values().map(Vec::len).sum(),
            routes: inner.routes.len(),
            evicted_requests: inner.evicted_requests,
        }
    }

    /// Drop everything older than the policy's `max_age`.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> SweepReport {
        self.inner.lock().sweep(now, self.policy)
    }
}

impl Default for UnifiedTracker {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn complete_request(&mut self, request_id: &str, status_code: u16) -> Option<f64> {
        let record = self.requests.get_mut(request_id)?;
        let execution_time = record.started.elapsed().as_secs_f64();

        record.status = RequestStatus::Completed;
        record.status_code = Some(status_code);
        record.execution_time = Some(execution_time);
        record.completion_time = Some(Utc::now());

        self.routes
            .entry(record.route_key())
            .or_insert_with(RouteMetric::new)
            .observe(execution_time);

        Some(execution_time)
    }

    fn complete_background_task(&mut self, task_id: &str, success: bool) {
        let Some(mut task) = self.active_tasks.remove(task_id) else {
            return;
        };

        let now = Instant::now();
        task.execution_time = Some(now.duration_since(task.started).as_secs_f64());
        task.completion_time = Some(Utc::now());
        task.finished = Some(now);
        task.status = if success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        self.completed_tasks
            .entry(task.request_id.clone())
            .or_default()
            .push(task);
    }

    fn request_info(&self, request_id: &str) -> Option<RequestInfo> {
        let record = self.requests.get(request_id)?.clone();
        let active_background_tasks = self
            .active_tasks
            .values()
            .filter(|task| task.request_id == request_id)
            .cloned()
            .collect();
        let completed_background_tasks = self
            .completed_tasks
            .get(request_id)
            .cloned()
            .unwrap_or_default();

        Some(RequestInfo {
            record,
            active_background_tasks,
            completed_background_tasks,
        })
    }

    /// Evict oldest records until at most `max_requests` remain.
    fn enforce_capacity(&mut self, max_requests: usize) {
        while self.requests.len() > max_requests {
            let Some((seq, request_id)) = self.order.pop_oldest() else {
                break;
            };
            if self.requests.get(&request_id).is_some_and(|r| r.seq == seq) {
                self.evict_request(&request_id);
            }
        }

        // Restarted ids leave dead slots behind; keep the queue bounded
        if self.order.len() > max_requests.saturating_mul(2) {
            self.compact_order();
        }
    }

    fn evict_request(&mut self, request_id: &str) {
        self.requests.remove(request_id);
        self.completed_tasks.remove(request_id);
        self.evicted_requests += 1;
    }

    fn compact_order(&mut self) {
        let requests = &self.requests;
        self.order
            .retain(|seq, id| requests.get(id).is_some_and(|r| r.seq == seq));
    }

    fn sweep(&mut self, now: Instant, policy: RetentionPolicy) -> SweepReport {
        let expired = |at: Instant| now.saturating_duration_since(at) > policy.max_age;
        let mut report = SweepReport::default();

        let stale: Vec<String> = self
            .requests
            .values()
            .filter(|r| expired(r.started))
            .map(|r| r.request_id.clone())
            .collect();
        for request_id in &stale {
            self.evict_request(request_id);
        }
        report.requests = stale.len();

        let before = self.active_tasks.len();
        self.active_tasks.retain(|_, task| !expired(task.started));
        report.active_tasks = before - self.active_tasks.len();

        // Lists whose parent is still tracked go with the parent
        let requests = &self.requests;
        let before = self.completed_tasks.len();
        self.completed_tasks.retain(|request_id, tasks| {
            requests.contains_key(request_id)
                || tasks
                    .iter()
                    .filter_map(|t| t.finished)
                    .max()
                    .is_some_and(|newest| !expired(newest))
        });
        report.completed_task_lists = before - self.completed_tasks.len();

        if report.requests > 0 {
            self.compact_order();
        }
        report
    }
}
