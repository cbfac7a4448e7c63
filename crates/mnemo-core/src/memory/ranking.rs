//! Semantic ranking by embedding similarity.

use mnemo_state::Memory;

use super::similarity::cosine_similarity;

/// A memory with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
}

/// Rank memories by cosine similarity to `query`, highest first.
///
/// Memories without an embedding are excluded, not scored as zero. The sort
/// is stable and the limit is applied after sorting.
pub fn rank_by_similarity(query: &[f32], memories: Vec<Memory>, limit: usize) -> Vec<ScoredMemory> {
    let mut scored: Vec<ScoredMemory> = memories
        .into_iter()
        .filter_map(|memory| {
            let score = memory
                .embedding
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| cosine_similarity(query, v))?;
            Some(ScoredMemory { memory, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_state::Category;

    fn embedded(content: &str, v: Vec<f32>) -> Memory {
        Memory::new(content, Category::Semantic, 0.5).with_embedding(v)
    }

    #[test]
    fn test_unembedded_memories_are_excluded() {
        let plain = Memory::new("no vector", Category::Semantic, 0.9);
        let near = embedded("near", vec![1.0, 0.1]);
        let ranked = rank_by_similarity(&[1.0, 0.0], vec![plain, near.clone()], 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].memory.id, near.id);
    }

    #[test]
    fn test_limit_applies_after_sorting() {
        let far = embedded("far", vec![0.0, 1.0]);
        let mid = embedded("mid", vec![1.0, 1.0]);
        let near = embedded("near", vec![1.0, 0.0]);
        let ranked = rank_by_similarity(&[1.0, 0.0], vec![far, mid.clone(), near.clone()], 2);
        let ids: Vec<_> = ranked.iter().map(|s| s.memory.id.clone()).collect();
        assert_eq!(ids, vec![near.id, mid.id]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let a = embedded("a", vec![2.0, 0.0]);
        let b = embedded("b", vec![1.0, 0.0]);
        let ranked = rank_by_similarity(&[1.0, 0.0], vec![a.clone(), b.clone()], 10);
        assert_eq!(ranked[0].memory.id, a.id);
        assert_eq!(ranked[1].memory.id, b.id);
    }
}
