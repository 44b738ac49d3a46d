//! Pipeline counters.
//!
//! Counters only; nothing in the pipeline branches on them. Shared as an
//! `Arc` between the consumer loop and whoever reports them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Received/processed/dropped event counts plus per-cycle timing.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    received_events: AtomicU64,
    processed_events: AtomicU64,
    dropped_events: AtomicU64,
    cycles: AtomicU64,
    last_cycle_micros: AtomicU64,
    total_cycle_micros: AtomicU64,
}

impl SinkMetrics {
    pub fn mark_received(&self, count: u64) {
        self.received_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mark_processed(&self, count: u64) {
        self.processed_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mark_dropped(&self, count: u64) {
        self.dropped_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, elapsed: Duration) {
        let micros = elapsed.as_micros() as u64;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_micros.store(micros, Ordering::Relaxed);
        self.total_cycle_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received_events: self.received_events.load(Ordering::Relaxed),
            processed_events: self.processed_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_events.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            last_cycle_micros: self.last_cycle_micros.load(Ordering::Relaxed),
            total_cycle_micros: self.total_cycle_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received_events: u64,
    pub processed_events: u64,
    pub dropped_events: u64,
    pub cycles: u64,
    pub last_cycle_micros: u64,
    pub total_cycle_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = SinkMetrics::default();
        metrics.mark_received(10);
        metrics.mark_received(5);
        metrics.mark_processed(12);
        metrics.mark_dropped(3);
        metrics.record_cycle(Duration::from_millis(2));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received_events, 15);
        assert_eq!(snapshot.processed_events, 12);
        assert_eq!(snapshot.dropped_events, 3);
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.last_cycle_micros, 2000);
    }
}
