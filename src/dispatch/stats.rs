// Live job counters for the dispatcher: submissions, outcomes and busy workers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use super::job::JobKind;

#[derive(Default)]
struct KindCounters {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl KindCounters {
    fn snapshot(&self) -> KindSnapshot {
        KindSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindSnapshot {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub active_workers: u32,
    pub transliterate: KindSnapshot,
    pub reverse_transliterate: KindSnapshot,
    pub learn: KindSnapshot,
}

pub struct DispatchStats {
    started: Instant,
    submitted: AtomicU64,
    rejected: AtomicU64,
    active_workers: AtomicU32,
    transliterate: KindCounters,
    reverse_transliterate: KindCounters,
    learn: KindCounters,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            active_workers: AtomicU32::new(0),
            transliterate: KindCounters::default(),
            reverse_transliterate: KindCounters::default(),
            learn: KindCounters::default(),
        }
    }

    fn counters(&self, kind: JobKind) -> &KindCounters {
        match kind {
            JobKind::Transliterate => &self.transliterate,
            JobKind::ReverseTransliterate => &self.reverse_transliterate,
            JobKind::Learn => &self.learn,
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A submission that never reached a lane (unknown language).
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, kind: JobKind, ok: bool) {
        let counters = self.counters(kind);
        if ok {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_workers(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_workers(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            transliterate: self.transliterate.snapshot(),
            reverse_transliterate: self.reverse_transliterate.snapshot(),
            learn: self.learn.snapshot(),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = DispatchStats::new();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_rejected();

        stats.record_outcome(JobKind::Transliterate, true);
        stats.record_outcome(JobKind::Transliterate, false);
        stats.record_outcome(JobKind::Learn, true);

        stats.increment_workers();
        stats.increment_workers();
        stats.decrement_workers();

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 3);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.active_workers, 1);
        assert_eq!(snap.transliterate, KindSnapshot { completed: 1, failed: 1 });
        assert_eq!(snap.reverse_transliterate, KindSnapshot { completed: 0, failed: 0 });
        assert_eq!(snap.learn.completed, 1);
    }
}
