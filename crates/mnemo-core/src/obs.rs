//! Structured lifecycle events.
//!
//! Every function emits one event with a stable `event` field so log
//! pipelines can filter on it (`memory.added`, `decision.reinforced`, ...).

use tracing::{info, warn};

/// RAII guard that enters a task-scoped span.
pub struct TaskSpan {
    _span: tracing::span::EnteredSpan,
}

impl TaskSpan {
    pub fn enter(task_id: &str) -> Self {
        let span = tracing::info_span!("mnemo.task", task_id = %task_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_memory_added(memory_id: &str, category: &str, embedded: bool) {
    info!(event = "memory.added", memory_id = %memory_id, category = %category, embedded = embedded);
}

pub fn emit_memory_updated(memory_id: &str) {
    info!(event = "memory.updated", memory_id = %memory_id);
}

pub fn emit_memory_deleted(memory_id: &str) {
    info!(event = "memory.deleted", memory_id = %memory_id);
}

pub fn emit_recall_completed(mode: &str, returned: usize) {
    info!(event = "recall.completed", mode = %mode, returned = returned);
}

pub fn emit_context_packed(selected: usize, total_tokens: usize, budget: usize) {
    info!(
        event = "context.packed",
        selected = selected,
        total_tokens = total_tokens,
        budget = budget,
    );
}

pub fn emit_decision_tracked(decision_id: &str, task_id: &str, memories: usize) {
    info!(
        event = "decision.tracked",
        decision_id = %decision_id,
        task_id = %task_id,
        memories = memories,
    );
}

pub fn emit_decision_reinforced(decision_id: &str, outcome: f64, boosted: usize, failed: usize) {
    info!(
        event = "decision.reinforced",
        decision_id = %decision_id,
        outcome = outcome,
        boosted = boosted,
        failed = failed,
    );
}

pub fn emit_memory_promoted(memory_id: &str) {
    info!(event = "memory.promoted", memory_id = %memory_id);
}

pub fn emit_conflict_resolved(kept: &str, action: &str) {
    info!(event = "conflict.resolved", memory_id = %kept, action = %action);
}

/// Warning: an embedding provider call failed and the write went ahead without a vector.
pub fn emit_embedding_skipped(error: &dyn std::fmt::Display) {
    warn!(event = "embedding.skipped", error = %error);
}

/// Warning: a best-effort commit after a successful write failed.
pub fn emit_commit_failed(message: &str, error: &dyn std::fmt::Display) {
    warn!(event = "commit.failed", message = %message, error = %error);
}
