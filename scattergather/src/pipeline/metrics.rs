use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the pipeline stages.
///
/// Counters are monotonic and never reset; `reorder_buffer_peak` is a
/// high-water mark.
#[derive(Debug, Default)]
pub(crate) struct PipelineMetricsStorage {
    work_admitted: AtomicU64,
    work_rejected: AtomicU64,
    work_completed: AtomicU64,
    worker_panics: AtomicU64,
    results_delivered: AtomicU64,
    reorder_buffer_peak: AtomicU64,
}

impl PipelineMetricsStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_admitted(&self) {
        self.work_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_rejected(&self) {
        self.work_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_completed(&self) {
        self.work_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_worker_panics(&self) {
        self.worker_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_delivered(&self) {
        self.results_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_reorder_depth(&self, depth: usize) {
        self.reorder_buffer_peak
            .fetch_max(depth as u64, Ordering::Relaxed);
    }

    pub(crate) fn worker_panics(&self) -> u64 {
        self.worker_panics.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> PipelineMetrics {
        PipelineMetrics {
            work_admitted_total: self.work_admitted.load(Ordering::Relaxed),
            work_rejected_total: self.work_rejected.load(Ordering::Relaxed),
            work_completed_total: self.work_completed.load(Ordering::Relaxed),
            worker_panics_total: self.worker_panics.load(Ordering::Relaxed),
            results_delivered_total: self.results_delivered.load(Ordering::Relaxed),
            reorder_buffer_peak: self.reorder_buffer_peak.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a pipeline's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineMetrics {
    work_admitted_total: u64,
    work_rejected_total: u64,
    work_completed_total: u64,
    worker_panics_total: u64,
    results_delivered_total: u64,
    reorder_buffer_peak: u64,
}

impl PipelineMetrics {
    /// Work items accepted into the input queue.
    pub fn work_admitted_total(&self) -> u64 {
        self.work_admitted_total
    }

    /// Admissions that failed (cancelled, closed, or abandoned).
    pub fn work_rejected_total(&self) -> u64 {
        self.work_rejected_total
    }

    /// Computations that ran to completion.
    pub fn work_completed_total(&self) -> u64 {
        self.work_completed_total
    }

    /// Computations that panicked.
    pub fn worker_panics_total(&self) -> u64 {
        self.worker_panics_total
    }

    /// Results taken by a consumer from the result stream.
    pub fn results_delivered_total(&self) -> u64 {
        self.results_delivered_total
    }

    /// Largest number of results held back waiting for a predecessor.
    pub fn reorder_buffer_peak(&self) -> u64 {
        self.reorder_buffer_peak
    }

    /// Admitted work whose result has not yet reached a consumer.
    pub fn in_flight(&self) -> u64 {
        self.work_admitted_total
            .saturating_sub(self.results_delivered_total)
            .saturating_sub(self.worker_panics_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let storage = PipelineMetricsStorage::new();
        for _ in 0..3 {
            storage.increment_admitted();
        }
        storage.increment_completed();
        storage.increment_delivered();
        storage.increment_worker_panics();
        storage.increment_rejected();

        let metrics = storage.snapshot();
        assert_eq!(metrics.work_admitted_total(), 3);
        assert_eq!(metrics.work_completed_total(), 1);
        assert_eq!(metrics.results_delivered_total(), 1);
        assert_eq!(metrics.worker_panics_total(), 1);
        assert_eq!(metrics.work_rejected_total(), 1);
        assert_eq!(metrics.in_flight(), 1);
    }

    #[test]
    fn test_reorder_peak_keeps_maximum() {
        let storage = PipelineMetricsStorage::new();
        storage.observe_reorder_depth(4);
        storage.observe_reorder_depth(2);
        storage.observe_reorder_depth(7);
        storage.observe_reorder_depth(1);
        assert_eq!(storage.snapshot().reorder_buffer_peak(), 7);
    }
}
