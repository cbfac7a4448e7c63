//! Global atomic counters for Mnemo.
//!
//! Counters are incremented at the call site. [`Metrics::flush`] emits the
//! current values as one `tracing::info!` event, typically at the end of a
//! CLI command.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    memories_written: AtomicU64,
    recalls: AtomicU64,
    reinforcements: AtomicU64,
    promotions: AtomicU64,
    commit_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            memories_written: AtomicU64::new(0),
            recalls: AtomicU64::new(0),
            reinforcements: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            commit_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_memories_written(&self) {
        self.memories_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "memories_written", "counter incremented");
    }

    pub fn inc_recalls(&self) {
        self.recalls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recalls", "counter incremented");
    }

    /// Count one boosted memory.
    pub fn inc_reinforcements(&self) {
        self.reinforcements.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "reinforcements", "counter incremented");
    }

    pub fn inc_promotions(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "promotions", "counter incremented");
    }

    pub fn inc_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "commit_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            memories_written = self.memories_written(),
            recalls = self.recalls(),
            reinforcements = self.reinforcements(),
            promotions = self.promotions(),
            commit_failures = self.commit_failures(),
        );
    }

    pub fn memories_written(&self) -> u64 {
        self.memories_written.load(Ordering::Relaxed)
    }

    pub fn recalls(&self) -> u64 {
        self.recalls.load(Ordering::Relaxed)
    }

    pub fn reinforcements(&self) -> u64 {
        self.reinforcements.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    pub fn commit_failures(&self) -> u64 {
        self.commit_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.memories_written.store(0, Ordering::Relaxed);
        self.recalls.store(0, Ordering::Relaxed);
        self.reinforcements.store(0, Ordering::Relaxed);
        self.promotions.store(0, Ordering::Relaxed);
        self.commit_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_memories_written();
        m.inc_memories_written();
        m.inc_reinforcements();
        m.inc_commit_failures();
        assert_eq!(m.memories_written(), 2);
        assert_eq!(m.reinforcements(), 1);
        assert_eq!(m.commit_failures(), 1);
        assert_eq!(m.promotions(), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_recalls();
        m.inc_promotions();
        m.reset();
        assert_eq!(m.recalls(), 0);
        assert_eq!(m.promotions(), 0);
    }
}
