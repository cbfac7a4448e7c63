//! Decision tracking and outcome-driven reinforcement.
//!
//! A decision records which memories informed it. When its outcome is
//! reported above the boost threshold, each linked memory gains priority and
//! one access. Boosts are applied one by one; a failed boost is logged and
//! reported without stopping the rest.

use std::sync::Arc;

use mnemo_state::{Decision, MemoryRepository};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::service::commit_best_effort;
use crate::config::DEFAULT_AUTHOR;
use crate::error::{validate_unit_interval, MnemoError, Result};
use crate::metrics::METRICS;
use crate::obs;

pub const DEFAULT_BOOST_THRESHOLD: f64 = 0.8;
pub const DEFAULT_PRIORITY_BOOST: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecorderConfig {
    /// Outcomes strictly above this reinforce linked memories
    pub boost_threshold: f64,
    pub priority_boost: f64,
    pub author: String,
}

impl Default for DecisionRecorderConfig {
    fn default() -> Self {
        Self {
            boost_threshold: DEFAULT_BOOST_THRESHOLD,
            priority_boost: DEFAULT_PRIORITY_BOOST,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }
}

/// Result of recording an outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReinforcementReport {
    pub decision_id: String,
    pub outcome: f64,
    pub boosted: Vec<String>,
    /// `(memory_id, error)` per failed boost
    pub failed: Vec<(String, String)>,
}

pub struct DecisionRecorder {
    repo: Arc<dyn MemoryRepository>,
    config: DecisionRecorderConfig,
}

impl DecisionRecorder {
    pub fn new(repo: Arc<dyn MemoryRepository>) -> Self {
        Self::with_config(repo, DecisionRecorderConfig::default())
    }

    pub fn with_config(repo: Arc<dyn MemoryRepository>, config: DecisionRecorderConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &DecisionRecorderConfig {
        &self.config
    }

    /// Record a decision against the current head commit, then commit it.
    #[instrument(skip(self, memory_ids, text))]
    pub async fn track_decision(
        &self,
        task_id: &str,
        memory_ids: Vec<String>,
        text: &str,
    ) -> Result<Decision> {
        if task_id.trim().is_empty() {
            return Err(MnemoError::Validation("task id must not be empty".to_string()));
        }

        let head = match self.repo.head_commit().await {
            Ok(head) => head.map(|c| c.hash).unwrap_or_default(),
            Err(err) => {
                debug!(error = %err, "no head commit for decision");
                String::new()
            }
        };

        let decision = Decision::new(task_id, text, memory_ids, head);
        self.repo.insert_decision(&decision).await?;
        obs::emit_decision_tracked(&decision.id, task_id, decision.memory_ids.len());

        let excerpt = if text.chars().count() > 50 {
            format!("{}...", text.chars().take(50).collect::<String>())
        } else {
            text.to_string()
        };
        self.commit(&format!("Track decision: {}", excerpt)).await;
        Ok(decision)
    }

    /// Store the outcome and, above the threshold, reinforce linked memories.
    ///
    /// The outcome range is checked before the store is touched.
    #[instrument(skip(self, feedback))]
    pub async fn record_outcome(
        &self,
        decision_id: &str,
        outcome: f64,
        feedback: &str,
    ) -> Result<ReinforcementReport> {
        validate_unit_interval("outcome", outcome)?;

        let mut decision = self
            .repo
            .get_decision(decision_id)
            .await?
            .ok_or_else(|| MnemoError::decision_not_found(decision_id))?;
        decision.outcome = outcome;
        decision.feedback = feedback.to_string();
        self.repo.update_decision(&decision).await?;

        let mut report = ReinforcementReport {
            decision_id: decision_id.to_string(),
            outcome,
            ..ReinforcementReport::default()
        };

        if outcome > self.config.boost_threshold && !decision.memory_ids.is_empty() {
            for memory_id in &decision.memory_ids {
                match self.boost(memory_id).await {
                    Ok(()) => {
                        METRICS.inc_reinforcements();
                        report.boosted.push(memory_id.clone());
                    }
                    Err(err) => {
                        warn!(memory_id = %memory_id, error = %err, "failed to boost memory");
                        report.failed.push((memory_id.clone(), err.to_string()));
                    }
                }
            }
            self.commit(&format!(
                "Reinforce memories for decision {} (outcome: {:.2})",
                decision_id, outcome
            ))
            .await;
        }

        obs::emit_decision_reinforced(
            decision_id,
            outcome,
            report.boosted.len(),
            report.failed.len(),
        );
        self.commit(&format!(
            "Record outcome for decision {}: {:.2}",
            decision_id, outcome
        ))
        .await;
        Ok(report)
    }

    /// Priority grows without an upper clamp.
    async fn boost(&self, memory_id: &str) -> Result<()> {
        let mut memory = self
            .repo
            .get_memory(memory_id)
            .await?
            .ok_or_else(|| MnemoError::memory_not_found(memory_id))?;
        memory.priority += self.config.priority_boost;
        memory.access_count = memory.access_count.saturating_add(1);
        self.repo.update_memory(&memory).await?;
        Ok(())
    }

    /// Decisions newest first, optionally for one task.
    pub async fn list_decisions(&self, task_id: Option<&str>) -> Result<Vec<Decision>> {
        let task_id = task_id.filter(|t| !t.is_empty());
        Ok(self.repo.list_decisions(task_id).await?)
    }

    pub async fn get_decision(&self, decision_id: &str) -> Result<Decision> {
        self.repo
            .get_decision(decision_id)
            .await?
            .ok_or_else(|| MnemoError::decision_not_found(decision_id))
    }

    async fn commit(&self, message: &str) {
        commit_best_effort(self.repo.as_ref(), message, &self.config.author).await;
    }
}
