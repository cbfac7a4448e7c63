//! Storage trait definitions for Mnemo
//!
//! `MemoryRepository` is the single boundary between the recall engine and
//! the versioned store. It covers:
//! - memory rows (query, insert, update, upsert, delete)
//! - per-row version history
//! - decisions and memory links
//! - staged changes and commits
//!
//! The trait is async and backend-agnostic. An in-memory implementation is
//! provided for testing via the `fakes` module.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::schema::{Category, CommitId, Decision, Memory, MemoryLink, MemoryVersion, Status};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Typed predicate over memory rows. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFilter {
    /// Case-insensitive substring match on content
    pub text: Option<String>,
    pub category: Option<Category>,
    pub status: Option<Status>,
    pub owner_id: Option<String>,
    pub team_id: Option<String>,
    /// Every listed tag must be present on the memory
    pub tags: Vec<String>,
    /// Only memories created at or after this instant
    pub created_since: Option<DateTime<Utc>>,
}

impl MemoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
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

    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    /// Evaluate the filter against a row.
    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(text) = &self.text {
            if !memory
                .content
                .to_lowercase()
                .contains(&text.to_lowercase())
            {
                return false;
            }
        }
        if self.category.is_some_and(|c| c != memory.category) {
            return false;
        }
        if self.status.is_some_and(|s| s != memory.status) {
            return false;
        }
        if self
            .owner_id
            .as_deref()
            .is_some_and(|o| o != memory.owner_id)
        {
            return false;
        }
        if self.team_id.as_deref().is_some_and(|t| t != memory.team_id) {
            return false;
        }
        if self.created_since.is_some_and(|s| memory.created_at < s) {
            return false;
        }
        memory.has_all_tags(&self.tags)
    }
}

/// Result ordering for `query_memories`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryOrder {
    /// Priority descending, then most recently accessed
    #[default]
    Priority,
    /// Creation time descending
    Newest,
    /// Access count descending, then priority descending
    MostAccessed,
}

impl MemoryOrder {
    /// Comparator implementing this ordering. Ties compare equal so a
    /// stable sort keeps store order.
    pub fn compare(&self, a: &Memory, b: &Memory) -> Ordering {
        match self {
            MemoryOrder::Priority => b
                .priority
                .total_cmp(&a.priority)
                .then_with(|| b.accessed_at.cmp(&a.accessed_at)),
            MemoryOrder::Newest => b.created_at.cmp(&a.created_at),
            MemoryOrder::MostAccessed => b
                .access_count
                .cmp(&a.access_count)
                .then_with(|| b.priority.total_cmp(&a.priority)),
        }
    }

    /// SurrealQL `ORDER BY` clause for this ordering
    pub fn order_clause(&self) -> &'static str {
        match self {
            MemoryOrder::Priority => "ORDER BY priority DESC, accessed_at DESC",
            MemoryOrder::Newest => "ORDER BY created_at DESC",
            MemoryOrder::MostAccessed => "ORDER BY access_count DESC, priority DESC",
        }
    }
}

/// Versioned store of memories, decisions and links.
///
/// Guarantees:
/// - Writes are staged; `commit` turns staged changes into one commit and
///   returns `None` when nothing is staged.
/// - `memory_history` returns the committed versions of a row, newest first.
/// - `upsert_memory` inserts a missing row, or refreshes only content and
///   priority of an existing one.
/// - `links_for` returns links touching the id in either direction.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Query memories matching `filter`, sorted by `order`, at most `limit` rows.
    async fn query_memories(
        &self,
        filter: &MemoryFilter,
        order: MemoryOrder,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Memory>>;

    /// Count memories matching `filter`.
    async fn count_memories(&self, filter: &MemoryFilter) -> StorageResult<usize>;

    /// Fetch a memory by id.
    async fn get_memory(&self, id: &str) -> StorageResult<Option<Memory>>;

    /// Insert a new memory. `DuplicateMemory` if the id exists.
    async fn insert_memory(&self, memory: &Memory) -> StorageResult<()>;

    /// Store a loosely-typed row exported by another tool and return its id.
    ///
    /// The row is named by `id` or `memory_id`; every other field is read
    /// back through the lenient coercions. `DuplicateMemory` if the id exists.
    async fn import_memory(&self, row: serde_json::Value) -> StorageResult<String>;

    /// Replace an existing memory row. `MemoryNotFound` if absent.
    async fn update_memory(&self, memory: &Memory) -> StorageResult<()>;

    /// Insert, or refresh content and priority of an existing row.
    async fn upsert_memory(&self, memory: &Memory) -> StorageResult<()>;

    /// Delete a memory. `MemoryNotFound` if absent.
    async fn delete_memory(&self, id: &str) -> StorageResult<()>;

    /// Committed versions of a memory, newest first.
    async fn memory_history(&self, id: &str) -> StorageResult<Vec<MemoryVersion>>;

    /// The version of a memory at a specific commit.
    async fn memory_version(&self, id: &str, commit_hash: &str) -> StorageResult<MemoryVersion>;

    async fn insert_decision(&self, decision: &Decision) -> StorageResult<()>;

    async fn get_decision(&self, id: &str) -> StorageResult<Option<Decision>>;

    /// Replace an existing decision. `DecisionNotFound` if absent.
    async fn update_decision(&self, decision: &Decision) -> StorageResult<()>;

    /// Decisions, newest first, optionally restricted to one task.
    async fn list_decisions(&self, task_id: Option<&str>) -> StorageResult<Vec<Decision>>;

    /// Insert a link, replacing the relation of an existing `(from, to)` pair.
    async fn upsert_link(&self, link: &MemoryLink) -> StorageResult<()>;

    /// Links where `id` is either end.
    async fn links_for(&self, id: &str) -> StorageResult<Vec<MemoryLink>>;

    /// Current head commit, if any commit exists.
    async fn head_commit(&self) -> StorageResult<Option<CommitId>>;

    /// Commit staged changes. `None` when nothing was staged.
    async fn commit(&self, message: &str, author: &str) -> StorageResult<Option<CommitId>>;
}

/// Sort by `order` (stable) and truncate to `limit`.
pub fn sort_and_limit(memories: &mut Vec<Memory>, order: MemoryOrder, limit: Option<usize>) {
    memories.sort_by(|a, b| order.compare(a, b));
    if let Some(limit) = limit {
        memories.truncate(limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_filter_matches_all_fields() {
        let memory = Memory::new("Rust ownership rules", Category::Semantic, 0.7)
            .with_owner("alice")
            .with_tags(["rust", "lang"]);

        assert!(MemoryFilter::new().matches(&memory));
        assert!(MemoryFilter::new().text("OWNERSHIP").matches(&memory));
        assert!(MemoryFilter::new()
            .category(Category::Semantic)
            .owner("alice")
            .tags(["lang"])
            .matches(&memory));
        assert!(!MemoryFilter::new().owner("bob").matches(&memory));
        assert!(!MemoryFilter::new().tags(["rust", "go"]).matches(&memory));
        assert!(!MemoryFilter::new()
            .created_since(Utc::now() + Duration::hours(1))
            .matches(&memory));
    }

    #[test]
    fn test_blank_text_filter_is_ignored() {
        assert_eq!(MemoryFilter::new().text("   ").text, None);
    }

    #[test]
    fn test_priority_order_breaks_ties_by_access_time() {
        let now = Utc::now();
        let older = Memory::new("a", Category::Core, 0.5).with_access(0, now - Duration::hours(1));
        let newer = Memory::new("b", Category::Core, 0.5).with_access(0, now);
        let top = Memory::new("c", Category::Core, 0.9).with_access(0, now - Duration::days(1));

        let mut rows = vec![older.clone(), newer.clone(), top.clone()];
        sort_and_limit(&mut rows, MemoryOrder::Priority, Some(2));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, top.id);
        assert_eq!(rows[1].id, newer.id);
    }

    #[test]
    fn test_most_accessed_order() {
        let a = Memory::new("a", Category::Core, 0.9).with_access(2, Utc::now());
        let b = Memory::new("b", Category::Core, 0.1).with_access(7, Utc::now());
        let c = Memory::new("c", Category::Core, 0.5).with_access(7, Utc::now());

        let mut rows = vec![a.clone(), b.clone(), c.clone()];
        sort_and_limit(&mut rows, MemoryOrder::MostAccessed, None);

        let ids: Vec<_> = rows.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), b.id.as_str(), a.id.as_str()]);
    }
}
