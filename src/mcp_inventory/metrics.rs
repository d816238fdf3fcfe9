//! Operation counters reported by the store.
//!
//! The store never owns a collector; it talks to whatever [`MetricsSink`] it
//! was constructed with. [`NoopMetrics`] is the default, [`InMemoryMetrics`]
//! is a counting sink handy for tests and for hosts that poll a summary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Receiver for store operation counts and durations. All methods default to
/// no-ops so sinks only implement what they care about.
pub trait MetricsSink: Send + Sync {
    fn record_load(&self, _duration: Duration, _inventory_size: usize) {}
    fn record_save(&self, _duration: Duration, _inventory_size: usize) {}
    fn record_validation(&self, _duration: Duration) {}
    fn record_recovery(&self) {}
    fn record_backup(&self) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Counting sink backed by atomics.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    load_operations: AtomicU64,
    save_operations: AtomicU64,
    load_time_ms: AtomicU64,
    save_time_ms: AtomicU64,
    validation_time_ms: AtomicU64,
    recovery_operations: AtomicU64,
    backup_operations: AtomicU64,
    inventory_size: AtomicU64,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all counters.
    pub fn summary(&self) -> HashMap<&'static str, u64> {
        HashMap::from([
            (
                "load_operations_total",
                self.load_operations.load(Ordering::Relaxed),
            ),
            (
                "save_operations_total",
                self.save_operations.load(Ordering::Relaxed),
            ),
            ("load_time_total_ms", self.load_time_ms.load(Ordering::Relaxed)),
            ("save_time_total_ms", self.save_time_ms.load(Ordering::Relaxed)),
            (
                "validation_time_total_ms",
                self.validation_time_ms.load(Ordering::Relaxed),
            ),
            (
                "recovery_operations_total",
                self.recovery_operations.load(Ordering::Relaxed),
            ),
            (
                "backup_operations_total",
                self.backup_operations.load(Ordering::Relaxed),
            ),
            (
                "current_inventory_size",
                self.inventory_size.load(Ordering::Relaxed),
            ),
        ])
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_load(&self, duration: Duration, inventory_size: usize) {
        self.load_operations.fetch_add(1, Ordering::Relaxed);
        self.load_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.inventory_size
            .store(inventory_size as u64, Ordering::Relaxed);
    }

    fn record_save(&self, duration: Duration, inventory_size: usize) {
        self.save_operations.fetch_add(1, Ordering::Relaxed);
        self.save_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        self.inventory_size
            .store(inventory_size as u64, Ordering::Relaxed);
    }

    fn record_validation(&self, duration: Duration) {
        self.validation_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    fn record_recovery(&self) {
        self.recovery_operations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_backup(&self) {
        self.backup_operations.fetch_add(1, Ordering::Relaxed);
    }
}
