use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

pub const OP_PROCESS_TICK: &str = "process_tick";
pub const OP_GENERATE_PREDICTION: &str = "generate_prediction";
pub const OP_PROCESS_OUTCOME: &str = "process_outcome";

/// Rolling latency samples per engine operation, shared across symbol tasks.
pub struct LatencyTracker {
    histograms: dashmap::DashMap<&'static str, VecDeque<Duration>>,
    max_samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            histograms: dashmap::DashMap::new(),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&self, operation: &'static str, duration: Duration) {
        let mut hist = self
            .histograms
            .entry(operation)
            .or_insert_with(|| VecDeque::with_capacity(self.max_samples));
        if hist.len() >= self.max_samples {
            hist.pop_front();
        }
        hist.push_back(duration);
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, operation: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(operation, start.elapsed());
        out
    }

    pub fn summary(&self, operation: &str) -> Option<LatencySummary> {
        self.histograms.get(operation).and_then(|hist| summarize(&hist))
    }

    pub fn log_summary(&self) {
        for entry in self.histograms.iter() {
            if let Some(s) = summarize(entry.value()) {
                info!(
                    "Latency [{}]: p50={:.1}us p95={:.1}us p99={:.1}us samples={}",
                    entry.key(),
                    s.p50.as_secs_f64() * 1e6,
                    s.p95.as_secs_f64() * 1e6,
                    s.p99.as_secs_f64() * 1e6,
                    s.samples,
                );
            }
        }
    }
}

fn summarize(hist: &VecDeque<Duration>) -> Option<LatencySummary> {
    if hist.is_empty() {
        return None;
    }

    let mut sorted: Vec<Duration> = hist.iter().copied().collect();
    sorted.sort();

    let last = sorted.len() - 1;
    let at = |q: f64| sorted[((sorted.len() as f64 * q) as usize).min(last)];
    Some(LatencySummary {
        p50: at(0.50),
        p95: at(0.95),
        p99: at(0.99),
        samples: sorted.len(),
    })
}
