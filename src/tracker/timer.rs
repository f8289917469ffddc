use std::future::Future;
use std::time::Instant;

use super::UnifiedTracker;

/// Records how long a named piece of work took, attached to a request.
///
/// The timing is written when the guard is dropped, or earlier through
/// [`finish`](FunctionTimer::finish).
#[must_use = "the timing is recorded when the guard is dropped"]
pub struct FunctionTimer<'a> {
    tracker: &'a UnifiedTracker,
    request_id: String,
    name: String,
    start: Instant,
    recorded: bool,
}

impl<'a> FunctionTimer<'a> {
    /// Stop the clock now. Returns the elapsed seconds.
    pub fn finish(mut self) -> f64 {
        self.record()
    }

    fn record(&mut self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if !self.recorded {
            self.recorded = true;
            self.tracker
                .record_function_execution(&self.request_id, &self.name, elapsed);
        }
        elapsed
    }
}

impl Drop for FunctionTimer<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

impl UnifiedTracker {
    pub fn time_function(&self, request_id: &str, function_name: &str) -> FunctionTimer<'_> {
        FunctionTimer {
            tracker: self,
            request_id: request_id.to_owned(),
            name: function_name.to_owned(),
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Await `fut`, recording its duration under `function_name`.
    pub async fn timed<F: Future>(
        &self,
        request_id: &str,
        function_name: &str,
        fut: F,
    ) -> F::Output {
        let timer = self.time_function(request_id, function_name);
        let out = fut.await;
        timer.finish();
        out
    }
}
