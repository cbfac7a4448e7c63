//! Memory lifecycle: add, import, update, delete, history, rollback, links,
//! tags and stats.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use mnemo_state::{
    Category, Memory, MemoryFilter, MemoryLink, MemoryOrder, MemoryVersion, Status, StorageError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::scoring::decay_score;
use super::service::MemoryService;
use crate::error::{validate_unit_interval, MnemoError, Result};
use crate::metrics::METRICS;
use crate::obs;

const EXCERPT_CHARS: usize = 50;

/// Input for [`MemoryService::add_memory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub category: Category,
    pub priority: f64,
    /// Empty means `system`
    pub owner_id: String,
    /// Empty means `system`
    pub team_id: String,
    pub tags: Vec<String>,
    pub source: Option<String>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            category: Category::Episodic,
            priority: 0.5,
            owner_id: String::new(),
            team_id: String::new(),
            tags: Vec::new(),
            source: None,
        }
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Field-presence update: `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub id: String,
    pub content: Option<String>,
    pub owner_id: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<f64>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateParams {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    fn apply(&self, memory: &mut Memory) {
        if let Some(content) = &self.content {
            memory.content = content.clone();
        }
        if let Some(owner) = &self.owner_id {
            memory.owner_id = owner.clone();
        }
        if let Some(category) = self.category {
            memory.category = category;
        }
        if let Some(priority) = self.priority {
            memory.priority = priority;
        }
        if let Some(source) = &self.source {
            memory.source = Some(source.clone()).filter(|s| !s.is_empty());
        }
        if let Some(tags) = &self.tags {
            memory.tags = tags.clone();
        }
    }
}

/// Aggregate statistics over the whole store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub distribution: BTreeMap<String, usize>,
    pub avg_priority: f64,
    pub avg_access_count: f64,
    pub avg_decay_score: f64,
}

fn excerpt(content: &str) -> String {
    if content.chars().count() > EXCERPT_CHARS {
        let head: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

fn or_system(value: &str) -> String {
    if value.trim().is_empty() {
        "system".to_string()
    } else {
        value.to_string()
    }
}

impl MemoryService {
    /// Validate, embed (when configured), insert and commit a new memory.
    ///
    /// Embedding failures do not block the write; the memory is stored
    /// without a vector.
    #[instrument(skip(self, input), fields(category = %input.category))]
    pub async fn add_memory(&self, input: NewMemory) -> Result<Memory> {
        validate_unit_interval("priority", input.priority)?;
        if input.content.trim().is_empty() {
            return Err(MnemoError::Validation("content must not be empty".to_string()));
        }

        let mut memory = Memory::new(input.content, input.category, input.priority)
            .with_owner(or_system(&input.owner_id))
            .with_team(or_system(&input.team_id))
            .with_tags(input.tags);
        memory.source = input.source.filter(|s| !s.is_empty());

        if let Some(embedder) = &self.embedder {
            match embedder.embed(&memory.content).await {
                Ok(vector) => memory.embedding = Some(vector),
                Err(err) => obs::emit_embedding_skipped(&err),
            }
        }

        self.repo.insert_memory(&memory).await?;
        METRICS.inc_memories_written();
        obs::emit_memory_added(
            &memory.id,
            memory.category.as_str(),
            memory.embedding.is_some(),
        );

        self.commit_best_effort(&format!("Add memory: {}", excerpt(&memory.content)))
            .await;
        Ok(memory)
    }

    /// Apply the present fields, refresh `accessed_at` and commit.
    ///
    /// The embedding is left as it was, even when content changes.
    #[instrument(skip(self, params), fields(memory_id = %params.id))]
    pub async fn update_memory(&self, params: UpdateParams) -> Result<Memory> {
        if let Some(priority) = params.priority {
            validate_unit_interval("priority", priority)?;
        }

        let mut memory = self.require_memory(&params.id).await?;
        params.apply(&mut memory);
        memory.accessed_at = Utc::now();

        self.repo.update_memory(&memory).await?;
        METRICS.inc_memories_written();
        obs::emit_memory_updated(&memory.id);

        self.commit_best_effort(&format!("Update memory: {}", memory.id))
            .await;
        Ok(memory)
    }

    /// Set the review status of a memory and commit.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &str, status: Status) -> Result<Memory> {
        let mut memory = self.require_memory(id).await?;
        memory.status = status;
        self.repo.update_memory(&memory).await?;

        self.commit_best_effort(&format!("Update status of memory {} to {}", id, status))
            .await;
        Ok(memory)
    }

    /// Import rows exported by another tool. Rows whose id already exists
    /// or that cannot be read are skipped; the rest land in one commit.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_memories(&self, rows: Vec<serde_json::Value>) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            match self.repo.import_memory(row).await {
                Ok(id) => report.imported.push(id),
                Err(err @ (StorageError::DuplicateMemory { .. } | StorageError::Serialization(_))) => {
                    warn!(index, error = %err, "skipping memory row");
                    report.skipped.push(format!("row {}: {}", index, err));
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !report.imported.is_empty() {
            self.commit_best_effort(&format!("Import {} memories", report.imported.len()))
                .await;
        }
        Ok(report)
    }

    #[instrument(skip(self))]
    pub async fn delete_memory(&self, id: &str) -> Result<()> {
        self.repo.delete_memory(id).await?;
        obs::emit_memory_deleted(id);
        self.commit_best_effort(&format!("Delete memory: {}", id))
            .await;
        Ok(())
    }

    pub async fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
        Ok(self.repo.get_memory(id).await?)
    }

    pub(crate) async fn require_memory(&self, id: &str) -> Result<Memory> {
        self.repo
            .get_memory(id)
            .await?
            .ok_or_else(|| MnemoError::memory_not_found(id))
    }

    /// Committed versions of a memory, newest first.
    pub async fn memory_history(&self, id: &str) -> Result<Vec<MemoryVersion>> {
        Ok(self.repo.memory_history(id).await?)
    }

    /// Restore content, category, priority, source and tags from a past commit.
    #[instrument(skip(self))]
    pub async fn rollback_memory(&self, id: &str, commit_hash: &str) -> Result<Memory> {
        let version = self.repo.memory_version(id, commit_hash).await?;
        let mut memory = self.require_memory(id).await?;

        memory.content = version.memory.content;
        memory.category = version.memory.category;
        memory.priority = version.memory.priority;
        memory.source = version.memory.source;
        memory.tags = version.memory.tags;
        memory.accessed_at = Utc::now();

        self.repo.update_memory(&memory).await?;
        self.commit_best_effort(&format!("Rollback memory {} to commit {}", id, commit_hash))
            .await;
        Ok(memory)
    }

    /// Link two memories. Re-linking the same pair replaces the relation.
    #[instrument(skip(self))]
    pub async fn link_memories(&self, from_id: &str, to_id: &str, relation: &str) -> Result<()> {
        if from_id == to_id {
            return Err(MnemoError::Validation(
                "cannot link a memory to itself".to_string(),
            ));
        }
        let relation = if relation.trim().is_empty() {
            "related"
        } else {
            relation
        };

        self.repo
            .upsert_link(&MemoryLink::new(from_id, to_id, relation))
            .await?;
        self.commit_best_effort(&format!("Link memory {} to {} ({})", from_id, to_id, relation))
            .await;
        Ok(())
    }

    /// Links touching `id`, in either direction.
    pub async fn memory_links(&self, id: &str) -> Result<Vec<MemoryLink>> {
        Ok(self.repo.links_for(id).await?)
    }

    /// Every distinct tag, sorted.
    pub async fn list_tags(&self) -> Result<Vec<String>> {
        let memories = self
            .repo
            .query_memories(&MemoryFilter::new(), MemoryOrder::Priority, None)
            .await?;
        let tags: BTreeSet<String> = memories.into_iter().flat_map(|m| m.tags).collect();
        Ok(tags.into_iter().collect())
    }

    pub async fn memory_count(&self) -> Result<usize> {
        Ok(self.repo.count_memories(&MemoryFilter::new()).await?)
    }

    #[instrument(skip(self))]
    pub async fn memory_stats(&self) -> Result<MemoryStats> {
        let memories = self
            .repo
            .query_memories(&MemoryFilter::new(), MemoryOrder::Priority, None)
            .await?;
        let now = Utc::now();
        let total = memories.len();

        let mut distribution = BTreeMap::new();
        let (mut priority, mut access, mut decay) = (0.0, 0.0, 0.0);
        for m in &memories {
            *distribution.entry(m.category.to_string()).or_insert(0) += 1;
            priority += m.priority;
            access += f64::from(m.access_count);
            decay += decay_score(m, now);
        }

        let avg = |sum: f64| if total == 0 { 0.0 } else { sum / total as f64 };
        debug!(total, "computed memory stats");
        Ok(MemoryStats {
            total_memories: total,
            distribution,
            avg_priority: avg(priority),
            avg_access_count: avg(access),
            avg_decay_score: avg(decay),
        })
    }
}

/// Outcome of [`MemoryService::import_memories`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}
