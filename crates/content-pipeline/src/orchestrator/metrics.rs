//! Counters for searches and acquisitions

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by concurrent searches and acquisitions
#[derive(Debug, Default)]
pub struct OrchestratorMetrics {
    pub searches: AtomicU64,
    pub search_cache_hits: AtomicU64,
    pub provider_failures: AtomicU64,
    pub acquisitions_started: AtomicU64,
    pub acquisitions_succeeded: AtomicU64,
    pub acquisitions_failed: AtomicU64,
    pub manifest_cache_hits: AtomicU64,
}

impl OrchestratorMetrics {
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search_cache_hit(&self) {
        self.search_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquisition_started(&self) {
        self.acquisitions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquisition_succeeded(&self) {
        self.acquisitions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acquisition_failed(&self) {
        self.acquisitions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manifest_cache_hit(&self) {
        self.manifest_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorMetricsSnapshot {
        OrchestratorMetricsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            search_cache_hits: self.search_cache_hits.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            acquisitions_started: self.acquisitions_started.load(Ordering::Relaxed),
            acquisitions_succeeded: self.acquisitions_succeeded.load(Ordering::Relaxed),
            acquisitions_failed: self.acquisitions_failed.load(Ordering::Relaxed),
            manifest_cache_hits: self.manifest_cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OrchestratorMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrchestratorMetricsSnapshot {
    pub searches: u64,
    pub search_cache_hits: u64,
    pub provider_failures: u64,
    pub acquisitions_started: u64,
    pub acquisitions_succeeded: u64,
    pub acquisitions_failed: u64,
    pub manifest_cache_hits: u64,
}

impl OrchestratorMetricsSnapshot {
    /// Share of finished acquisitions that succeeded, 0.0 to 1.0
    pub fn acquisition_success_rate(&self) -> f64 {
        let finished = self.acquisitions_succeeded + self.acquisitions_failed;
        if finished == 0 {
            0.0
        } else {
            self.acquisitions_succeeded as f64 / finished as f64
        }
    }

    pub fn search_cache_hit_rate(&self) -> f64 {
        if self.searches == 0 {
            0.0
        } else {
            self.search_cache_hits as f64 / self.searches as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rates() {
        let metrics = OrchestratorMetrics::default();
        metrics.record_search();
        metrics.record_search();
        metrics.record_search_cache_hit();
        metrics.record_acquisition_started();
        metrics.record_acquisition_succeeded();
        metrics.record_acquisition_started();
        metrics.record_acquisition_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches, 2);
        assert_eq!(snapshot.search_cache_hit_rate(), 0.5);
        assert_eq!(snapshot.acquisition_success_rate(), 0.5);
    }
}
