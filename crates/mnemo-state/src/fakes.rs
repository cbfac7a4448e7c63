//! In-memory fake for `MemoryRepository` (testing only)
//!
//! `InMemoryRepository` keeps rows in insertion order, stages writes and
//! snapshots staged rows on commit, so it satisfies the same contract as the
//! SurrealDB handle without any external dependency. Failures can be injected
//! per memory id to exercise compensation paths.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::schema::{CommitId, CommitRecord, Decision, Memory, MemoryLink, MemoryVersion};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct State {
    memories: Vec<Memory>,
    decisions: Vec<Decision>,
    links: Vec<MemoryLink>,
    versions: Vec<(String, MemoryVersion)>,
    commits: Vec<CommitRecord>,
    staged: Vec<String>,
    dirty: bool,
    fail_updates: HashSet<String>,
    fail_commits: bool,
}

impl State {
    fn stage(&mut self, id: &str) {
        if !self.staged.iter().any(|s| s == id) {
            self.staged.push(id.to_string());
        }
        self.dirty = true;
    }

    fn check_update(&self, id: &str) -> StorageResult<()> {
        if self.fail_updates.contains(id) {
            return Err(StorageError::Backend(format!(
                "injected update failure for {id}"
            )));
        }
        Ok(())
    }
}

/// In-memory `MemoryRepository` backed by vectors behind a `Mutex`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows without staging them.
    pub fn with_memories(memories: impl IntoIterator<Item = Memory>) -> Self {
        let repo = Self::new();
        if let Ok(mut state) = repo.state.lock() {
            state.memories.extend(memories);
        }
        repo
    }

    /// Make every subsequent update, upsert or delete of `id` fail.
    pub fn fail_updates_for(&self, id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_updates.insert(id.to_string());
        }
    }

    /// Make every subsequent commit fail.
    pub fn fail_commits(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_commits = true;
        }
    }

    /// Commit log, oldest first.
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.state
            .lock()
            .map(|s| s.commits.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| StorageError::Backend(format!("repository lock poisoned: {e}")))
    }
}

#[async_trait]
impl MemoryRepository for InMemoryRepository {
    async fn query_memories(
        &self,
        filter: &MemoryFilter,
        order: MemoryOrder,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Memory>> {
        let state = self.lock()?;
        let mut rows: Vec<Memory> = state
            .memories
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        sort_and_limit(&mut rows, order, limit);
        Ok(rows)
    }

    async fn count_memories(&self, filter: &MemoryFilter) -> StorageResult<usize> {
        let state = self.lock()?;
        Ok(state.memories.iter().filter(|m| filter.matches(m)).count())
    }

    async fn get_memory(&self, id: &str) -> StorageResult<Option<Memory>> {
        let state = self.lock()?;
        Ok(state.memories.iter().find(|m| m.id == id).cloned())
    }

    async fn insert_memory(&self, memory: &Memory) -> StorageResult<()> {
        let mut state = self.lock()?;
        if state.memories.iter().any(|m| m.id == memory.id) {
            return Err(StorageError::DuplicateMemory {
                id: memory.id.clone(),
            });
        }
        state.memories.push(memory.clone());
        state.stage(&memory.id);
        Ok(())
    }

    async fn import_memory(&self, row: serde_json::Value) -> StorageResult<String> {
        let memory = Memory::from_row(row)?;
        self.insert_memory(&memory).await?;
        Ok(memory.id)
    }

    async fn update_memory(&self, memory: &Memory) -> StorageResult<()> {
        let mut state = self.lock()?;
        state.check_update(&memory.id)?;
        let slot = state
            .memories
            .iter_mut()
            .find(|m| m.id == memory.id)
            .ok_or_else(|| StorageError::MemoryNotFound {
                id: memory.id.clone(),
            })?;
        *slot = memory.clone();
        state.stage(&memory.id);
        Ok(())
    }

    async fn upsert_memory(&self, memory: &Memory) -> StorageResult<()> {
        let mut state = self.lock()?;
        state.check_update(&memory.id)?;
        match state.memories.iter_mut().find(|m| m.id == memory.id) {
            Some(existing) => {
                existing.content = memory.content.clone();
                existing.priority = memory.priority;
            }
            None => state.memories.push(memory.clone()),
        }
        state.stage(&memory.id);
        Ok(())
    }

    async fn delete_memory(&self, id: &str) -> StorageResult<()> {
        let mut state = self.lock()?;
        state.check_update(id)?;
        let before = state.memories.len();
        state.memories.retain(|m| m.id != id);
        if state.memories.len() == before {
            return Err(StorageError::MemoryNotFound { id: id.to_string() });
        }
        state.stage(id);
        Ok(())
    }

    async fn memory_history(&self, id: &str) -> StorageResult<Vec<MemoryVersion>> {
        let state = self.lock()?;
        Ok(state
            .versions
            .iter()
            .rev()
            .filter(|(memory_id, _)| memory_id == id)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn memory_version(&self, id: &str, commit_hash: &str) -> StorageResult<MemoryVersion> {
        let state = self.lock()?;
        state
            .versions
            .iter()
            .find(|(memory_id, v)| memory_id == id && v.commit_hash == commit_hash)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| StorageError::VersionNotFound {
                id: id.to_string(),
                commit: commit_hash.to_string(),
            })
    }

    async fn insert_decision(&self, decision: &Decision) -> StorageResult<()> {
        let mut state = self.lock()?;
        state.decisions.push(decision.clone());
        state.dirty = true;
        Ok(())
    }

    async fn get_decision(&self, id: &str) -> StorageResult<Option<Decision>> {
        let state = self.lock()?;
        Ok(state.decisions.iter().find(|d| d.id == id).cloned())
    }

    async fn update_decision(&self, decision: &Decision) -> StorageResult<()> {
        let mut state = self.lock()?;
        let slot = state
            .decisions
            .iter_mut()
            .find(|d| d.id == decision.id)
            .ok_or_else(|| StorageError::DecisionNotFound {
                id: decision.id.clone(),
            })?;
        *slot = decision.clone();
        state.dirty = true;
        Ok(())
    }

    async fn list_decisions(&self, task_id: Option<&str>) -> StorageResult<Vec<Decision>> {
        let state = self.lock()?;
        let mut decisions: Vec<Decision> = state
            .decisions
            .iter()
            .filter(|d| task_id.map_or(true, |t| d.task_id == t))
            .cloned()
            .collect();
        // Insertion order breaks ties in created_at
        decisions.reverse();
        decisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(decisions)
    }

    async fn upsert_link(&self, link: &MemoryLink) -> StorageResult<()> {
        let mut state = self.lock()?;
        match state
            .links
            .iter_mut()
            .find(|l| l.from_id == link.from_id && l.to_id == link.to_id)
        {
            Some(existing) => existing.relation = link.relation.clone(),
            None => state.links.push(link.clone()),
        }
        state.dirty = true;
        Ok(())
    }

    async fn links_for(&self, id: &str) -> StorageResult<Vec<MemoryLink>> {
        let state = self.lock()?;
        Ok(state
            .links
            .iter()
            .filter(|l| l.from_id == id || l.to_id == id)
            .cloned()
            .collect())
    }

    async fn head_commit(&self) -> StorageResult<Option<CommitId>> {
        let state = self.lock()?;
        Ok(state.commits.last().map(|c| c.commit_id.clone()))
    }

    async fn commit(&self, message: &str, author: &str) -> StorageResult<Option<CommitId>> {
        let mut state = self.lock()?;
        if state.fail_commits {
            return Err(StorageError::Commit("injected commit failure".to_string()));
        }
        if !state.dirty {
            return Ok(None);
        }

        let staged = std::mem::take(&mut state.staged);
        let rows: Vec<&Memory> = state
            .memories
            .iter()
            .filter(|m| staged.contains(&m.id))
            .collect();
        let payload = serde_json::to_vec(&rows)?;

        let parent = state.commits.last().map(|c| c.commit_id.hash.clone());
        let commit_id = CommitId::derive(parent.as_deref(), message, &payload);
        let now = Utc::now();

        let versions: Vec<(String, MemoryVersion)> = rows
            .into_iter()
            .map(|m| {
                (
                    m.id.clone(),
                    MemoryVersion {
                        commit_hash: commit_id.hash.clone(),
                        committer: author.to_string(),
                        commit_date: now,
                        memory: m.clone(),
                    },
                )
            })
            .collect();
        state.versions.extend(versions);

        let record = CommitRecord::new(commit_id.clone(), parent, message, author, staged);
        state.commits.push(record);
        state.dirty = false;

        Ok(Some(commit_id))
    }
}
