//! Tick statistics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of a pipe's activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipeStats {
    /// Ticks that ran to completion (including idle ones)
    pub ticks: u64,
    /// Ticks on which no input yielded a value
    pub idle_ticks: u64,
    /// Ticks on which a value was found and fanned out
    pub values_delivered: u64,
    /// Individual input poll calls
    pub input_polls: u64,
    /// Individual output deliver calls
    pub output_calls: u64,
}

impl PipeStats {
    /// Fraction of completed ticks that found a value, `0.0` before any tick.
    pub fn hit_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.values_delivered as f64 / self.ticks as f64
        }
    }
}

/// Live counters, updated by the worker without taking the pipe lock.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    ticks: AtomicU64,
    idle_ticks: AtomicU64,
    values_delivered: AtomicU64,
    input_polls: AtomicU64,
    output_calls: AtomicU64,
}

impl Counters {
    pub(crate) fn record_poll(&self) {
        self.input_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_tick(&self) {
        self.idle_ticks.fetch_add(1, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_delivery(&self, outputs: usize) {
        self.output_calls
            .fetch_add(outputs as u64, Ordering::Relaxed);
        self.values_delivered.fetch_add(1, Ordering::Relaxed);
        self.ticks.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> PipeStats {
        PipeStats {
            ticks: self.ticks.load(Ordering::Acquire),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            values_delivered: self.values_delivered.load(Ordering::Relaxed),
            input_polls: self.input_polls.load(Ordering::Relaxed),
            output_calls: self.output_calls.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.record_poll();
        counters.record_poll();
        counters.record_idle_tick();
        counters.record_poll();
        counters.record_delivery(3);

        let stats = counters.snapshot();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.idle_ticks, 1);
        assert_eq!(stats.values_delivered, 1);
        assert_eq!(stats.input_polls, 3);
        assert_eq!(stats.output_calls, 3);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate_before_any_tick() {
        assert_eq!(PipeStats::default().hit_rate(), 0.0);
    }
}
