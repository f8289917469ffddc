use hdrhistogram::Histogram;
use serde::Serialize;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Per-route accumulator ───────────────────────────────────────

/// Running latency totals for one `method:path` key.
/// Created on the first completion of a route, never removed.
pub(crate) struct RouteMetric {
    count: u64,
    total_time: f64,
    max_time: f64,
    min_time: f64,
    histogram: Histogram<u64>,
}

impl RouteMetric {
    pub(crate) fn new() -> Self {
        Self {
            count: 0,
            total_time: 0.0,
            max_time: 0.0,
            min_time: f64::INFINITY,
            histogram: Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .expect("histogram creation"),
        }
    }

    /// Fold one completed request (seconds) into the totals.
    pub(crate) fn observe(&mut self, execution_time: f64) {
        self.count += 1;
        self.total_time += execution_time;
        self.max_time = self.max_time.max(execution_time);
        self.min_time = self.min_time.min(execution_time);

        // Clamp to ≥ 1 μs; anything past the upper bound saturates
        let us = (execution_time * 1_000_000.0).round() as u64;
        self.histogram.saturating_record(us.max(HIST_LOW));
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn stats(&self) -> RouteStats {
        RouteStats {
            count: self.count,
            total_time: self.total_time,
            max_time: self.max_time,
            min_time: self.min_time,
            avg_time: self.total_time / self.count as f64,
            latency_us: PercentileSet::from_histogram(&self.histogram),
        }
    }
}

// ─── Read side ───────────────────────────────────────────────────

/// Aggregated statistics for one route. Times are in seconds;
/// `avg_time` is derived on read.
#[derive(Debug, Clone, Serialize)]
pub struct RouteStats {
    pub count: u64,
    pub total_time: f64,
    pub max_time: f64,
    pub min_time: f64,
    pub avg_time: f64,
    pub latency_us: PercentileSet,
}

/// Latency distribution of one route, from its histogram. Every value is
/// in microseconds; `count` is the number of recorded completions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: u64,
}

impl PercentileSet {
    /// All zeros for a route with nothing recorded yet.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self::default();
        }

        let at = |q: f64| hist.value_at_quantile(q);
        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
            p999: at(0.999),
            count: hist.len(),
        }
    }
}
