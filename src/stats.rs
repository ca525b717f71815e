use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct CrawlStats {
    started_at: DateTime<Utc>,
    fetched: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    skipped_visited: Arc<AtomicUsize>,
    skipped_depth: Arc<AtomicUsize>,
    discovered: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            fetched: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            skipped_visited: Arc::new(AtomicUsize::new(0)),
            skipped_depth: Arc::new(AtomicUsize::new(0)),
            discovered: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_visited(&self) {
        self.skipped_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_depth(&self) {
        self.skipped_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let ended_at = Utc::now();
        StatsSnapshot {
            started_at: self.started_at,
            ended_at,
            duration_secs: ended_at
                .signed_duration_since(self.started_at)
                .num_seconds()
                .max(0),
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped_visited: self.skipped_visited.load(Ordering::Relaxed),
            skipped_depth: self.skipped_depth.load(Ordering::Relaxed),
            discovered: self.discovered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub fetched: usize,
    pub failed: usize,
    pub skipped_visited: usize,
    pub skipped_depth: usize,
    pub discovered: usize,
    pub cancelled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let stats = CrawlStats::new();
        let shared = stats.clone();

        stats.record_fetched();
        shared.record_fetched();
        shared.record_failed();
        stats.record_discovered();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.fetched, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.discovered, 1);
        assert_eq!(snapshot.cancelled, 0);
    }
}
