//! Record types for the Mnemo store
//!
//! Tables:
//! - memories: Agent memories (the unit of recall)
//! - memory_versions: Per-commit snapshots of memory rows
//! - decisions: Decisions linking a task to the memories that informed it
//! - memory_links: Directed relations between memories
//! - commits: Commit log over staged changes

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::coerce;

/// Raised when a category or status string is not one of the known values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?} (expected one of {expected})")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Memory category. Drives the decay factor and promotion eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Core,
    Semantic,
    Working,
    Episodic,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Core,
        Category::Semantic,
        Category::Working,
        Category::Episodic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Semantic => "semantic",
            Category::Working => "working",
            Category::Episodic => "episodic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(Category::Core),
            "semantic" => Ok(Category::Semantic),
            "working" => Ok(Category::Working),
            "episodic" => Ok(Category::Episodic),
            _ => Err(ParseEnumError {
                kind: "category",
                value: s.to_string(),
                expected: "core, semantic, working, episodic",
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = coerce::text(deserializer)?;
        Ok(raw.parse().unwrap_or(Category::Episodic))
    }
}

/// Review status of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Verified,
    UnderReview,
    Deprecated,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Verified => "verified",
            Status::UnderReview => "under_review",
            Status::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verified" => Ok(Status::Verified),
            "under_review" => Ok(Status::UnderReview),
            "deprecated" => Ok(Status::Deprecated),
            _ => Err(ParseEnumError {
                kind: "status",
                value: s.to_string(),
                expected: "verified, under_review, deprecated",
            }),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = coerce::text(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// A single agent memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    #[serde(alias = "memory_id", deserialize_with = "coerce::text")]
    pub id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub content: String,
    #[serde(default = "default_principal", deserialize_with = "coerce::text")]
    pub owner_id: String,
    #[serde(default = "default_principal", deserialize_with = "coerce::text")]
    pub team_id: String,
    #[serde(default = "default_category")]
    pub category: Category,
    #[serde(default, deserialize_with = "coerce::float")]
    pub priority: f64,
    #[serde(default = "Utc::now", deserialize_with = "coerce::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "coerce::timestamp")]
    pub accessed_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "coerce::count")]
    pub access_count: u32,
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "coerce::string_list")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "coerce::embedding")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub status: Status,
}

fn default_principal() -> String {
    "system".to_string()
}

fn default_category() -> Category {
    Category::Episodic
}

impl Memory {
    /// Read a loosely-typed row exported by another tool. The id may be
    /// named `id` or `memory_id` and may be numeric; a row without one is
    /// rejected.
    pub fn from_row(row: serde_json::Value) -> Result<Self, serde_json::Error> {
        let memory: Memory = serde_json::from_value(row)?;
        if memory.id.trim().is_empty() {
            return Err(serde::de::Error::custom("memory row has no id"));
        }
        Ok(memory)
    }

    /// Create a fresh memory with a new v4 id, owned by `system`
    pub fn new(content: impl Into<String>, category: Category, priority: f64) -> Self {
        let now = Utc::now();
        Memory {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            owner_id: default_principal(),
            team_id: default_principal(),
            category,
            priority,
            created_at: now,
            accessed_at: now,
            access_count: 0,
            source: None,
            tags: Vec::new(),
            embedding: None,
            status: Status::Verified,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_access(mut self, access_count: u32, accessed_at: DateTime<Utc>) -> Self {
        self.access_count = access_count;
        self.accessed_at = accessed_at;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// True when every tag in `required` is present (order irrelevant)
    pub fn has_all_tags(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.tags.iter().any(|own| own == t))
    }
}

/// A decision made for a task, and the memories that informed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(deserialize_with = "coerce::text")]
    pub id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub task_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub decision_text: String,
    #[serde(default, deserialize_with = "coerce::string_list")]
    pub memory_ids: Vec<String>,
    #[serde(default, deserialize_with = "coerce::float")]
    pub outcome: f64,
    #[serde(default, deserialize_with = "coerce::text")]
    pub feedback: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub commit_hash: String,
    #[serde(default = "Utc::now", deserialize_with = "coerce::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        task_id: impl Into<String>,
        decision_text: impl Into<String>,
        memory_ids: Vec<String>,
        commit_hash: impl Into<String>,
    ) -> Self {
        Decision {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            decision_text: decision_text.into(),
            memory_ids,
            outcome: 0.0,
            feedback: String::new(),
            commit_hash: commit_hash.into(),
            created_at: Utc::now(),
        }
    }
}

/// Directed relation between two memories. Queried in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLink {
    #[serde(deserialize_with = "coerce::text")]
    pub from_id: String,
    #[serde(deserialize_with = "coerce::text")]
    pub to_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub relation: String,
}

impl MemoryLink {
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        MemoryLink {
            from_id: from_id.into(),
            to_id: to_id.into(),
            relation: relation.into(),
        }
    }

    /// The id on the other end of the link, seen from `id`
    pub fn other_end(&self, id: &str) -> &str {
        if self.from_id == id {
            &self.to_id
        } else {
            &self.from_id
        }
    }
}

/// A memory row as it was at a given commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryVersion {
    #[serde(deserialize_with = "coerce::text")]
    pub commit_hash: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub committer: String,
    #[serde(default = "Utc::now", deserialize_with = "coerce::timestamp")]
    pub commit_date: DateTime<Utc>,
    pub memory: Memory,
}

/// Commit identifier: sha256 over the parent hash and the staged rows
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId {
    pub hash: String,
}

impl CommitId {
    /// Derive a commit id from the parent head, the message and the staged payload.
    pub fn derive(parent: Option<&str>, message: &str, staged: &[u8]) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(b"P");
        match parent {
            Some(p) => {
                hasher.update(b"S");
                hasher.update(p.as_bytes());
            }
            None => hasher.update(b"N"),
        }
        hasher.update(b"\0");

        hasher.update(b"M:");
        hasher.update(message.as_bytes());
        hasher.update(b"\0");

        hasher.update(b"D:");
        hasher.update(staged);

        CommitId {
            hash: hex::encode(hasher.finalize()),
        }
    }

    /// Short hash (first 8 characters)
    pub fn short(&self) -> String {
        self.hash.chars().take(8).collect()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// Commit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_id: CommitId,
    #[serde(default, deserialize_with = "coerce::opt_text")]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub message: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub author: String,
    /// Memory ids touched by this commit
    #[serde(default, deserialize_with = "coerce::string_list")]
    pub memory_ids: Vec<String>,
    #[serde(default = "Utc::now", deserialize_with = "coerce::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(
        commit_id: CommitId,
        parent_id: Option<String>,
        message: &str,
        author: &str,
        memory_ids: Vec<String>,
    ) -> Self {
        CommitRecord {
            commit_id,
            parent_id,
            message: message.to_string(),
            author: author.to_string(),
            memory_ids,
            created_at: Utc::now(),
        }
    }
}
