//! Decay-weighted relevance and keystone scoring.
//!
//! `score = (priority * (access_count + 1)) / (log10(seconds_since_access + 10) * category_decay)`
//!
//! Core memories decay slowest, episodic fastest. The `+ 10` offset keeps the
//! logarithm at or above 1 for fresh memories.

use chrono::{DateTime, Utc};
use mnemo_state::{Category, Memory};

/// Divisor applied per category. Larger decays faster.
pub fn category_decay(category: Category) -> f64 {
    match category {
        Category::Core => 0.5,
        Category::Semantic => 1.0,
        Category::Episodic => 2.0,
        Category::Working => 1.5,
    }
}

/// Decay score of `memory` at `now`.
///
/// An `accessed_at` in the future (clock skew) counts as zero elapsed seconds.
pub fn decay_score(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - memory.accessed_at).num_milliseconds().max(0) as f64 / 1000.0;
    let weight = memory.priority * (f64::from(memory.access_count) + 1.0);
    weight / ((elapsed + 10.0).log10() * category_decay(memory.category))
}

/// Time-independent foundational importance: `priority * 2 + access_count / 10`.
pub fn keystone_score(memory: &Memory) -> f64 {
    memory.priority * 2.0 + f64::from(memory.access_count) / 10.0
}

/// Stable sort by decay score, highest first. Ties keep input order.
pub fn rank_by_decay(memories: Vec<Memory>, now: DateTime<Utc>) -> Vec<Memory> {
    let mut scored: Vec<(f64, Memory)> = memories
        .into_iter()
        .map(|m| (decay_score(&m, now), m))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, m)| m).collect()
}

/// Highest keystone scores first, truncated to `limit`.
pub fn select_keystones(memories: Vec<Memory>, limit: usize) -> Vec<Memory> {
    let mut scored: Vec<(f64, Memory)> = memories
        .into_iter()
        .map(|m| (keystone_score(&m), m))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(limit);
    scored.into_iter().map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn memory(category: Category, priority: f64, access_count: u32, age: Duration) -> Memory {
        let now = Utc::now();
        Memory::new("m", category, priority).with_access(access_count, now - age)
    }

    #[test]
    fn test_fresh_memory_uses_log10_of_ten() {
        let now = Utc::now();
        let m = Memory::new("m", Category::Semantic, 0.8).with_access(0, now);
        assert!((decay_score(&m, now) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_core_decays_slower_than_episodic() {
        let now = Utc::now();
        let accessed = now - Duration::hours(3);
        let core = Memory::new("c", Category::Core, 0.5).with_access(2, accessed);
        let episodic = Memory::new("e", Category::Episodic, 0.5).with_access(2, accessed);
        let working = Memory::new("w", Category::Working, 0.5).with_access(2, accessed);

        let c = decay_score(&core, now);
        let w = decay_score(&working, now);
        let e = decay_score(&episodic, now);
        assert!(c > w && w > e);
        assert!((c / e - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_access_is_clamped() {
        let now = Utc::now();
        let m = Memory::new("m", Category::Semantic, 0.5).with_access(0, now + Duration::days(2));
        let score = decay_score(&m, now);
        assert!(score.is_finite());
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_keystone_score() {
        let m = memory(Category::Core, 0.9, 5, Duration::days(300));
        assert!((keystone_score(&m) - 2.3).abs() < 1e-9);
    }

    #[test]
    fn test_rank_by_decay_is_stable_on_ties() {
        let now = Utc::now();
        let a = Memory::new("a", Category::Semantic, 0.5).with_access(1, now);
        let b = Memory::new("b", Category::Semantic, 0.5).with_access(1, now);
        let top = Memory::new("top", Category::Core, 0.9).with_access(1, now);

        let ranked = rank_by_decay(vec![a.clone(), b.clone(), top.clone()], now);
        let ids: Vec<_> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![top.id.as_str(), a.id.as_str(), b.id.as_str()]);
    }

    #[test]
    fn test_select_keystones_truncates() {
        let low = memory(Category::Episodic, 0.1, 0, Duration::zero());
        let mid = memory(Category::Semantic, 0.5, 3, Duration::zero());
        let high = memory(Category::Core, 0.9, 20, Duration::zero());
        let picked = select_keystones(vec![low, mid.clone(), high.clone()], 2);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].id, high.id);
        assert_eq!(picked[1].id, mid.id);
    }

    fn category() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn property_score_is_finite_and_non_negative(
            priority in 0.0f64..=1.0,
            access_count in 0u32..10_000,
            age_secs in -86_400i64..100_000_000,
            category in category(),
        ) {
            let now = Utc::now();
            let m = Memory::new("m", category, priority)
                .with_access(access_count, now - Duration::seconds(age_secs));
            let score = decay_score(&m, now);
            prop_assert!(score.is_finite());
            prop_assert!(score >= 0.0);
        }

        #[test]
        fn property_monotone_in_priority_and_access(
            p1 in 0.0f64..=1.0,
            p2 in 0.0f64..=1.0,
            c1 in 0u32..1_000,
            c2 in 0u32..1_000,
            age_secs in 0i64..10_000_000,
            category in category(),
        ) {
            let now = Utc::now();
            let accessed = now - Duration::seconds(age_secs);
            let (lo_p, hi_p) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
            let (lo_c, hi_c) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };

            let base = Memory::new("m", category, lo_p).with_access(lo_c, accessed);
            let more_priority = Memory::new("m", category, hi_p).with_access(lo_c, accessed);
            let more_access = Memory::new("m", category, lo_p).with_access(hi_c, accessed);

            prop_assert!(decay_score(&more_priority, now) >= decay_score(&base, now));
            prop_assert!(decay_score(&more_access, now) >= decay_score(&base, now));
        }
    }
}
