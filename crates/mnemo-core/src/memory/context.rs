//! Token-budgeted context packing.
//!
//! Core memories go first, then task-relevant ones. Selection is a single
//! greedy pass: an item is taken iff it still fits the remaining budget.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Utc;
use mnemo_state::{Category, Memory, MemoryFilter, MemoryOrder};
use serde::Serialize;
use tiktoken_rs::CoreBPE;
use tracing::{debug, instrument};

use super::ranking::rank_by_similarity;
use super::scoring::rank_by_decay;
use super::service::MemoryService;
use crate::error::Result;
use crate::obs;

/// Core memories always considered for the window
pub const CORE_CONTEXT_LIMIT: usize = 10;
/// Decay-ranked candidates kept per requested task memory before semantic ranking
const TASK_CANDIDATE_FACTOR: usize = 5;

fn encoder() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().ok()).as_ref()
}

/// Counts tokens with `cl100k_base`, or `len / 4` when the encoder cannot load.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    pub fn count(&self, text: &str) -> usize {
        match encoder() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.len() / 4,
        }
    }
}

/// Where a packed memory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    Core,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackedMemory {
    pub memory: Memory,
    pub tokens: usize,
    pub source: ContextSource,
}

/// The selected memories and their combined token count
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextWindow {
    pub items: Vec<PackedMemory>,
    pub total_tokens: usize,
    pub budget: usize,
}

impl ContextWindow {
    pub fn memories(&self) -> impl Iterator<Item = &Memory> {
        self.items.iter().map(|item| &item.memory)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Greedily pack `core` then `task` memories into `budget` tokens.
///
/// Ids already selected are skipped. The result never exceeds the budget,
/// and a budget of zero yields an empty window.
pub fn pack_context<F>(core: Vec<Memory>, task: Vec<Memory>, budget: usize, count: F) -> ContextWindow
where
    F: Fn(&str) -> usize,
{
    let mut window = ContextWindow {
        budget,
        ..ContextWindow::default()
    };
    if budget == 0 {
        return window;
    }

    let mut seen = HashSet::new();
    let tagged = core
        .into_iter()
        .map(|m| (m, ContextSource::Core))
        .chain(task.into_iter().map(|m| (m, ContextSource::Task)));

    for (memory, source) in tagged {
        if seen.contains(&memory.id) {
            continue;
        }
        let tokens = count(&memory.content);
        if window.total_tokens + tokens > budget {
            continue;
        }
        window.total_tokens += tokens;
        seen.insert(memory.id.clone());
        window.items.push(PackedMemory {
            memory,
            tokens,
            source,
        });
    }
    window
}

impl MemoryService {
    /// Build a context window for `task` within `budget` tokens.
    ///
    /// Task memories are the top decay-ranked candidates, re-ranked by
    /// similarity to the task when an embedder is configured.
    #[instrument(skip(self, task))]
    pub async fn assemble_context(
        &self,
        task: Option<&str>,
        limit: usize,
        budget: usize,
    ) -> Result<ContextWindow> {
        let core = self
            .repo
            .query_memories(
                &MemoryFilter::new().category(Category::Core),
                MemoryOrder::Priority,
                Some(CORE_CONTEXT_LIMIT),
            )
            .await?;

        let task_memories = match task.map(str::trim).filter(|t| !t.is_empty()) {
            Some(task) => self.task_memories(task, limit).await?,
            None => Vec::new(),
        };

        let counter = TokenCounter;
        let window = pack_context(core, task_memories, budget, |text| counter.count(text));
        obs::emit_context_packed(window.items.len(), window.total_tokens, budget);
        Ok(window)
    }

    async fn task_memories(&self, task: &str, limit: usize) -> Result<Vec<Memory>> {
        let now = Utc::now();

        if let Some(embedder) = &self.embedder {
            match embedder.embed(task).await {
                Ok(query) => {
                    let all = self
                        .repo
                        .query_memories(&MemoryFilter::new(), MemoryOrder::Priority, None)
                        .await?;
                    let mut candidates = rank_by_decay(all, now);
                    candidates.truncate(limit.saturating_mul(TASK_CANDIDATE_FACTOR));
                    return Ok(rank_by_similarity(&query, candidates, limit)
                        .into_iter()
                        .map(|scored| scored.memory)
                        .collect());
                }
                Err(err) => {
                    debug!(error = %err, "task embedding failed, using decay order");
                }
            }
        }

        let matching = self
            .repo
            .query_memories(&MemoryFilter::new().text(task), MemoryOrder::Priority, None)
            .await?;
        let mut ranked = rank_by_decay(matching, now);
        ranked.truncate(limit);
        Ok(ranked)
    }
}
