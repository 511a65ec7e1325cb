//! Upload counters.
//!
//! [`ResidencyMetrics`] is updated by submitters and the worker without
//! locking; [`ResidencyStats`] is a point-in-time copy for callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared between the manager and its worker.
#[derive(Debug, Default)]
pub struct ResidencyMetrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    bytes_uploaded: AtomicU64,
    chunks: AtomicU64,
    stalls: AtomicU64,
    stall_nanos: AtomicU64,
}

impl ResidencyMetrics {
    pub(crate) fn task_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn chunk_staged(&self, bytes: u64) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn stalled(&self, waited: Duration) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.stall_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> ResidencyStats {
        ResidencyStats {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            stall_time: Duration::from_nanos(self.stall_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Snapshot of [`ResidencyMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResidencyStats {
    /// Tasks accepted by the queue.
    pub tasks_submitted: u64,
    /// Tasks the worker saw complete.
    pub tasks_completed: u64,
    /// Tasks that failed.
    pub tasks_failed: u64,
    /// Bytes staged through the ring, row padding included.
    pub bytes_uploaded: u64,
    /// Copies submitted.
    pub chunks: u64,
    /// Times the worker blocked on a fence because the ring was full.
    pub stalls: u64,
    /// Total time spent in those stalls.
    pub stall_time: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_zero() {
        assert_eq!(ResidencyMetrics::default().snapshot(), ResidencyStats::default());
    }

    #[test]
    fn counters_accumulate() {
        let metrics = ResidencyMetrics::default();
        metrics.task_submitted();
        metrics.chunk_staged(512);
        metrics.chunk_staged(100);
        metrics.stalled(Duration::from_millis(3));
        metrics.stalled(Duration::from_millis(2));
        let stats = metrics.snapshot();
        assert_eq!(stats.tasks_submitted, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.bytes_uploaded, 612);
        assert_eq!(stats.stalls, 2);
        assert_eq!(stats.stall_time, Duration::from_millis(5));
    }
}
