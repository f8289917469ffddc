use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::UnifiedTracker;

/// Bounds on how much history the tracker keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Upper bound on request records; the oldest is evicted first.
    pub max_requests: usize,
    /// Records (and orphaned task lists) older than this are swept.
    pub max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_requests: 10_000,
            max_age: Duration::from_secs(3600),
        }
    }
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub requests: usize,
    pub active_tasks: usize,
    pub completed_task_lists: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.requests == 0 && self.active_tasks == 0 && self.completed_task_lists == 0
    }
}

// ─── Insertion order ─────────────────────────────────────────────

/// FIFO of `(seq, request_id)` in start order.
///
/// A restarted id leaves its old entry behind; such entries are skipped
/// on eviction because their `seq` no longer matches the live record.
#[derive(Debug, Default)]
pub(crate) struct InsertionOrder {
    queue: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl InsertionOrder {
    pub(crate) fn push(&mut self, request_id: &str) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back((seq, request_id.to_owned()));
        seq
    }

    pub(crate) fn pop_oldest(&mut self) -> Option<(u64, String)> {
        self.queue.pop_front()
    }

    /// Drop entries for which `live` says the slot is gone.
    pub(crate) fn retain(&mut self, mut live: impl FnMut(u64, &str) -> bool) {
        self.queue.retain(|(seq, id)| live(*seq, id));
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

// ─── Background sweeper ──────────────────────────────────────────

/// Runs `tracker.sweep()` every `every` until the handle is aborted.
pub fn spawn_sweeper(tracker: Arc<UnifiedTracker>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing to sweep yet
        interval.tick().await;

        loop {
            interval.tick().await;
            let report = tracker.sweep();
            if !report.is_empty() {
                tracing::debug!(
                    requests = report.requests,
                    active_tasks = report.active_tasks,
                    completed_task_lists = report.completed_task_lists,
                    "tracker sweep evicted stale records"
                );
            }
        }
    })
}
