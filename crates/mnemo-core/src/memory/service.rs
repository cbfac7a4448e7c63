//! The engine handle shared by lifecycle, recall, packing, promotion and
//! conflict operations.

use std::sync::Arc;

use mnemo_state::{CommitId, MemoryRepository};
use tracing::debug;

use crate::config::DEFAULT_AUTHOR;
use crate::embedding::Embedder;
use crate::metrics::METRICS;
use crate::obs;

/// Stateless engine over an injected repository. Every call re-reads what it needs.
#[derive(Clone)]
pub struct MemoryService {
    pub(crate) repo: Arc<dyn MemoryRepository>,
    pub(crate) embedder: Option<Arc<dyn Embedder>>,
    pub(crate) author: String,
}

impl MemoryService {
    pub fn new(repo: Arc<dyn MemoryRepository>) -> Self {
        Self {
            repo,
            embedder: None,
            author: DEFAULT_AUTHOR.to_string(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn repository(&self) -> &Arc<dyn MemoryRepository> {
        &self.repo
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Commit staged changes. Failures are logged and swallowed: the primary
    /// write already succeeded.
    pub(crate) async fn commit_best_effort(&self, message: &str) -> Option<CommitId> {
        commit_best_effort(self.repo.as_ref(), message, &self.author).await
    }
}

pub(crate) async fn commit_best_effort(
    repo: &dyn MemoryRepository,
    message: &str,
    author: &str,
) -> Option<CommitId> {
    match repo.commit(message, author).await {
        Ok(Some(id)) => {
            debug!(commit = %id.short(), %message, "committed");
            Some(id)
        }
        Ok(None) => {
            debug!(%message, "nothing to commit");
            None
        }
        Err(err) => {
            METRICS.inc_commit_failures();
            obs::emit_commit_failed(message, &err);
            None
        }
    }
}
