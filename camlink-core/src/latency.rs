//! One-way latency: rolling window of samples with running average, min and max.
//!
//! Latency is `local receive time - origin timestamp`. Both clocks are assumed to share
//! the Unix epoch; no skew correction is applied.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default window capacity (most recent samples kept).
pub const DEFAULT_WINDOW: usize = 100;

/// One latency measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    pub value_ms: f64,
    /// Local wall clock (ms since epoch) when the sample was taken.
    pub at_ms: u64,
}

/// Summary of the current window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub measurements: usize,
}

/// Fixed-capacity FIFO of latency samples. The oldest sample is evicted when full.
#[derive(Debug)]
pub struct LatencyRecorder {
    window: VecDeque<LatencySample>,
    capacity: usize,
}

impl LatencyRecorder {
    /// Capacity 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest beyond capacity. Returns the updated average.
    pub fn record(&mut self, value_ms: f64, at_ms: u64) -> f64 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(LatencySample { value_ms, at_ms });
        self.average()
    }

    /// Running average over the window; 0 when empty.
    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().map(|s| s.value_ms).sum::<f64>() / self.window.len() as f64
    }

    pub fn min(&self) -> Option<f64> {
        self.window.iter().map(|s| s.value_ms).reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.window.iter().map(|s| s.value_ms).reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn samples(&self) -> impl Iterator<Item = &LatencySample> {
        self.window.iter()
    }

    pub fn stats(&self) -> LatencyStats {
        LatencyStats {
            average_ms: self.average(),
            min_ms: self.min().unwrap_or(0.0),
            max_ms: self.max().unwrap_or(0.0),
            measurements: self.window.len(),
        }
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// `now_ms - origin_ms` as float; negative when the sender clock runs ahead.
pub fn one_way_latency_ms(now_ms: u64, origin_ms: u64) -> f64 {
    now_ms as f64 - origin_ms as f64
}

/// Current wall clock in ms since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
