//! Recall orchestration: filters, decay and semantic modes, catch-up, keystones.

use chrono::{DateTime, Utc};
use mnemo_state::{Category, Memory, MemoryFilter, MemoryOrder};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ranking::rank_by_similarity;
use super::scoring::{rank_by_decay, select_keystones};
use super::service::MemoryService;
use crate::error::{MnemoError, Result};
use crate::metrics::METRICS;
use crate::obs;

pub const DEFAULT_RECALL_LIMIT: usize = 5;

/// Parameters for [`MemoryService::recall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallOptions {
    pub query: String,
    pub limit: usize,
    pub tags: Vec<String>,
    pub category: Option<Category>,
    pub owner_id: Option<String>,
    pub team_id: Option<String>,
    pub with_decay: bool,
    pub semantic: bool,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            query: String::new(),
            limit: DEFAULT_RECALL_LIMIT,
            tags: Vec::new(),
            category: None,
            owner_id: None,
            team_id: None,
            with_decay: false,
            semantic: false,
        }
    }
}

impl RecallOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_decay(mut self) -> Self {
        self.with_decay = true;
        self
    }

    pub fn semantic(mut self) -> Self {
        self.semantic = true;
        self
    }

    /// Filter without the text predicate.
    fn structural_filter(&self) -> MemoryFilter {
        let mut filter = MemoryFilter::new().tags(self.tags.iter().cloned());
        filter.category = self.category;
        filter.owner_id = self.owner_id.clone().filter(|o| !o.is_empty());
        filter.team_id = self.team_id.clone().filter(|t| !t.is_empty());
        filter
    }

    fn filter(&self) -> MemoryFilter {
        self.structural_filter().text(self.query.clone())
    }

    fn mode(&self) -> &'static str {
        if self.semantic {
            "semantic"
        } else if self.with_decay {
            "decay"
        } else {
            "default"
        }
    }
}

impl MemoryService {
    /// Recall memories in one of three modes.
    ///
    /// - semantic: the query is embedded and only used for similarity
    /// - decay: text-filtered, sorted by decay score
    /// - default: text-filtered, priority then recency
    ///
    /// The limit is applied after ranking.
    #[instrument(skip(self, options), fields(mode = options.mode(), limit = options.limit))]
    pub async fn recall(&self, options: &RecallOptions) -> Result<Vec<Memory>> {
        METRICS.inc_recalls();

        let memories = if options.semantic {
            self.semantic_recall(options).await?
        } else if options.with_decay {
            let candidates = self
                .repo
                .query_memories(&options.filter(), MemoryOrder::Priority, None)
                .await?;
            let mut ranked = rank_by_decay(candidates, Utc::now());
            ranked.truncate(options.limit);
            ranked
        } else {
            self.repo
                .query_memories(&options.filter(), MemoryOrder::Priority, Some(options.limit))
                .await?
        };

        obs::emit_recall_completed(options.mode(), memories.len());
        Ok(memories)
    }

    async fn semantic_recall(&self, options: &RecallOptions) -> Result<Vec<Memory>> {
        if options.query.trim().is_empty() {
            return Err(MnemoError::Validation(
                "semantic recall needs a non-empty query".to_string(),
            ));
        }
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            MnemoError::Validation("semantic recall needs an embedding provider".to_string())
        })?;

        let query = embedder.embed(&options.query).await?;
        let candidates = self
            .repo
            .query_memories(&options.structural_filter(), MemoryOrder::Priority, None)
            .await?;
        Ok(rank_by_similarity(&query, candidates, options.limit)
            .into_iter()
            .map(|scored| scored.memory)
            .collect())
    }

    /// Newest memories first, optionally by category and creation time.
    #[instrument(skip(self))]
    pub async fn catchup(
        &self,
        limit: usize,
        category: Option<Category>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Memory>> {
        let mut filter = MemoryFilter::new();
        filter.category = category;
        filter.created_since = since;
        Ok(self
            .repo
            .query_memories(&filter, MemoryOrder::Newest, Some(limit))
            .await?)
    }

    /// Foundational memories by keystone score.
    pub async fn keystones(&self, limit: usize) -> Result<Vec<Memory>> {
        let all = self
            .repo
            .query_memories(&MemoryFilter::new(), MemoryOrder::Priority, None)
            .await?;
        Ok(select_keystones(all, limit))
    }
}
