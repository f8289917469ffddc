use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::tracker::UnifiedTracker;

/// Spawns `fut` on the runtime as a background task of `request_id`.
///
/// The task is registered before it starts and completed when the future
/// resolves: `Ok` → completed, `Err` → failed. A task that panics or is
/// aborted is completed as failed.
pub fn spawn_tracked<F, T, E>(
    tracker: Arc<UnifiedTracker>,
    request_id: &str,
    task_name: &str,
    fut: F,
) -> (String, JoinHandle<Result<T, E>>)
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let task_id = Uuid::new_v4().to_string();
    tracker.start_background_task(&task_id, request_id, task_name);

    let mut guard = CompletionGuard {
        tracker,
        task_id: task_id.clone(),
        armed: true,
    };
    let task_name = task_name.to_owned();

    let handle = tokio::spawn(async move {
        let result = fut.await;
        guard.armed = false;

        match &result {
            Ok(_) => guard.tracker.complete_background_task(&guard.task_id, true),
            Err(e) => {
                tracing::warn!(
                    task_id = %guard.task_id,
                    task = %task_name,
                    error = %e,
                    "background task failed"
                );
                guard.tracker.complete_background_task(&guard.task_id, false);
            }
        }
        result
    });

    (task_id, handle)
}

/// Marks the task failed if its future never got to report.
struct CompletionGuard {
    tracker: Arc<UnifiedTracker>,
    task_id: String,
    armed: bool,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(task_id = %self.task_id, "background task dropped before completion");
            self.tracker.complete_background_task(&self.task_id, false);
        }
    }
}
