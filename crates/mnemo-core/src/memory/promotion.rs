//! Promotion of proven project memories into the shared global store.

use std::collections::HashSet;

use chrono::Utc;
use mnemo_state::{Category, Decision, Memory, MemoryFilter, MemoryOrder, MemoryRepository, Status};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::service::{commit_best_effort, MemoryService};
use crate::error::{validate_unit_interval, Result};
use crate::metrics::METRICS;
use crate::obs;

pub const DEFAULT_MIN_ACCESS_COUNT: u32 = 5;
pub const DEFAULT_MIN_OUTCOME: f64 = 0.8;

/// Thresholds a memory must meet to be promoted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionCriteria {
    pub min_access_count: u32,
    pub min_outcome: f64,
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            min_access_count: DEFAULT_MIN_ACCESS_COUNT,
            min_outcome: DEFAULT_MIN_OUTCOME,
        }
    }
}

/// Outcome of an auto-promotion run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromotionReport {
    pub candidates: Vec<String>,
    pub promoted: Vec<String>,
    /// `(memory_id, error)` per failed promotion
    pub failed: Vec<(String, String)>,
    pub dry_run: bool,
}

fn eligible(memory: &Memory, proven: &HashSet<&str>, criteria: &PromotionCriteria) -> bool {
    memory.access_count >= criteria.min_access_count
        && matches!(memory.category, Category::Semantic | Category::Core)
        && memory.status == Status::Verified
        && proven.contains(memory.id.as_str())
}

/// Memories eligible for promotion, by access count then priority (both descending).
pub fn select_promotion_candidates(
    memories: Vec<Memory>,
    decisions: &[Decision],
    criteria: &PromotionCriteria,
) -> Vec<Memory> {
    let proven: HashSet<&str> = decisions
        .iter()
        .filter(|d| d.outcome >= criteria.min_outcome)
        .flat_map(|d| d.memory_ids.iter().map(String::as_str))
        .collect();

    let mut seen = HashSet::new();
    let mut candidates: Vec<Memory> = memories
        .into_iter()
        .filter(|m| eligible(m, &proven, criteria))
        .filter(|m| seen.insert(m.id.clone()))
        .collect();

    candidates.sort_by(|a, b| {
        b.access_count
            .cmp(&a.access_count)
            .then_with(|| b.priority.total_cmp(&a.priority))
    });
    candidates
}

/// The row written to the target store: same id and payload, fresh access state.
fn promoted_copy(memory: &Memory) -> Memory {
    let now = Utc::now();
    let mut copy = Memory::new(memory.content.clone(), memory.category, memory.priority)
        .with_id(memory.id.clone())
        .with_owner(memory.owner_id.clone())
        .with_team(memory.team_id.clone())
        .with_tags(memory.tags.iter().cloned())
        .with_access(0, now);
    copy.source = memory.source.clone();
    copy
}

impl MemoryService {
    #[instrument(skip(self))]
    pub async fn find_promotion_candidates(
        &self,
        criteria: &PromotionCriteria,
    ) -> Result<Vec<Memory>> {
        validate_unit_interval("min_outcome", criteria.min_outcome)?;

        let filter = MemoryFilter::new().status(Status::Verified);
        let memories = self
            .repo
            .query_memories(&filter, MemoryOrder::MostAccessed, None)
            .await?;
        let decisions = self.repo.list_decisions(None).await?;
        Ok(select_promotion_candidates(memories, &decisions, criteria))
    }

    /// Copy one memory into `target` and commit there. The source is untouched.
    #[instrument(skip(self, target))]
    pub async fn promote_memory(&self, id: &str, target: &dyn MemoryRepository) -> Result<()> {
        let memory = self.require_memory(id).await?;
        target.upsert_memory(&promoted_copy(&memory)).await?;

        commit_best_effort(
            target,
            &format!("Promoted memory {} from project store", id),
            &self.author,
        )
        .await;
        METRICS.inc_promotions();
        obs::emit_memory_promoted(id);
        Ok(())
    }

    /// Promote every candidate. A failed promotion is reported and the rest continue.
    #[instrument(skip(self, target, criteria))]
    pub async fn auto_promote(
        &self,
        target: &dyn MemoryRepository,
        criteria: &PromotionCriteria,
        dry_run: bool,
    ) -> Result<PromotionReport> {
        let candidates = self.find_promotion_candidates(criteria).await?;
        let mut report = PromotionReport {
            candidates: candidates.iter().map(|m| m.id.clone()).collect(),
            dry_run,
            ..PromotionReport::default()
        };
        if dry_run {
            info!(candidates = report.candidates.len(), "dry run, nothing promoted");
            return Ok(report);
        }

        for memory in &candidates {
            match self.promote_memory(&memory.id, target).await {
                Ok(()) => report.promoted.push(memory.id.clone()),
                Err(err) => {
                    warn!(memory_id = %memory.id, error = %err, "promotion failed");
                    report.failed.push((memory.id.clone(), err.to_string()));
                }
            }
        }
        Ok(report)
    }
}
