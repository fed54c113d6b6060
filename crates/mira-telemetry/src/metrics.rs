use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const WINDOW: usize = 1000;

/// A ring of the last 1000 duration samples per operation, from which
/// p50/p95/p99 can be queried (spec.md §4.8).
pub struct MetricRecorder {
    windows: Mutex<HashMap<String, VecDeque<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl MetricRecorder {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()) }
    }

    pub fn record(&self, operation: &str, duration_ms: f64) {
        let mut windows = self.windows.lock().expect("metric recorder lock poisoned");
        let ring = windows.entry(operation.to_string()).or_insert_with(|| VecDeque::with_capacity(WINDOW));
        if ring.len() == WINDOW {
            ring.pop_front();
        }
        ring.push_back(duration_ms);
    }

    pub fn percentiles(&self, operation: &str) -> Option<Percentiles> {
        let windows = self.windows.lock().expect("metric recorder lock poisoned");
        let ring = windows.get(operation)?;
        if ring.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = ring.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        Some(Percentiles {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        })
    }
}

impl Default for MetricRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_none_for_unknown_operation() {
        let recorder = MetricRecorder::new();
        assert!(recorder.percentiles("hook_invocation").is_none());
    }

    #[test]
    fn computes_percentiles_over_samples() {
        let recorder = MetricRecorder::new();
        for ms in 1..=100 {
            recorder.record("hook_invocation", ms as f64);
        }
        let p = recorder.percentiles("hook_invocation").unwrap();
        assert!(p.p50 >= 49.0 && p.p50 <= 51.0);
        assert!(p.p95 >= 94.0 && p.p95 <= 96.0);
        assert!(p.p99 >= 98.0);
    }

    #[test]
    fn ring_drops_oldest_sample_past_window_size() {
        let recorder = MetricRecorder::new();
        for ms in 0..1500 {
            recorder.record("op", ms as f64);
        }
        let p = recorder.percentiles("op").unwrap();
        // only the most recent 1000 samples (500..1499) remain.
        assert!(p.p50 >= 999.0);
    }
}
