use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;

/// Execution counters plus a fixed-size window of recent durations.
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    window: VecDeque<Duration>,
    capacity: usize,
    slow_threshold: Duration,
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    /// Executions slower than the slow-query threshold.
    pub slow: u64,
    pub hits: u64,
    pub misses: u64,
    /// Callers that joined an in-flight execution.
    pub coalesced: u64,
}

/// Latency summary over the rolling window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub slow: u64,
    /// Number of durations currently in the window.
    pub samples: usize,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl QueryMetrics {
    pub fn new(capacity: usize, slow_threshold: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            slow_threshold,
            total: 0,
            successes: 0,
            failures: 0,
            slow: 0,
            hits: 0,
            misses: 0,
            coalesced: 0,
        }
    }

    /// Record one execution. Returns true when it was slow.
    pub fn record(&mut self, duration: Duration, success: bool) -> bool {
        self.total += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }

        // FIFO eviction keeps the window bounded.
        while self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(duration);

        let slow = duration > self.slow_threshold;
        if slow {
            self.slow += 1;
        }
        slow
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn report(&self) -> PerformanceReport {
        let mut sorted: Vec<f64> = self
            .window
            .iter()
            .map(|d| d.as_nanos() as f64 / 1_000_000.0)
            .collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let avg_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        PerformanceReport {
            total: self.total,
            successes: self.successes,
            failures: self.failures,
            slow: self.slow,
            samples: sorted.len(),
            avg_ms,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            max_ms: sorted.last().copied().unwrap_or(0.0),
        }
    }

    /// Drop every counter and sample.
    pub fn reset(&mut self) {
        *self = Self::new(self.capacity, self.slow_threshold);
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
