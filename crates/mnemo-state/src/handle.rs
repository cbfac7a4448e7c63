//! SurrealDB Handle - Connection and `MemoryRepository` implementation
//!
//! Emulates a versioned store on top of SurrealDB: every write records the
//! touched row in `staged`, and `commit` snapshots staged rows into
//! `memory_versions` under a content-derived commit hash.
//!
//! Supports local (file-backed or in-memory) and cloud (WebSocket) connections.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::coerce;
use crate::error::StateError;
use crate::migrations;
use crate::schema::{
    Category, CommitId, CommitRecord, Decision, Memory, MemoryLink, MemoryVersion, Status,
};
use crate::storage_traits::{MemoryFilter, MemoryOrder, MemoryRepository, StorageResult};
use crate::Result;
use crate::StorageError;

const DEFAULT_NAMESPACE: &str = "mnemo";
const DEFAULT_DATABASE: &str = "main";
const DATA_DIR_ENV: &str = "MNEMO_DATA_DIR";

/// Root directory for local stores: `MNEMO_DATA_DIR`, else `<user data dir>/mnemo`.
pub fn default_data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|dir| dir.join("mnemo")))
        .unwrap_or_else(|| PathBuf::from(".mnemo"))
}

/// Each database gets its own directory so the project store and the
/// global store can be open at the same time.
pub fn local_store_path(data_dir: &Path, database: &str) -> PathBuf {
    data_dir.join(database)
}

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "mnemo")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "mnemo")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for Mnemo
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
    database: String,
}

// ---------------------------------------------------------------------------
// Row types. No `id` field: SurrealDB owns record ids.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbMemory {
    #[serde(deserialize_with = "coerce::text")]
    memory_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    content: String,
    #[serde(default, deserialize_with = "coerce::text")]
    owner_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    team_id: String,
    #[serde(default = "episodic")]
    category: Category,
    #[serde(default, deserialize_with = "coerce::float")]
    priority: f64,
    #[serde(default = "coerce::now_datetime", deserialize_with = "coerce::datetime")]
    created_at: SurrealDatetime,
    #[serde(default = "coerce::now_datetime", deserialize_with = "coerce::datetime")]
    accessed_at: SurrealDatetime,
    #[serde(default, deserialize_with = "coerce::count")]
    access_count: u32,
    #[serde(default, deserialize_with = "coerce::opt_text")]
    source: Option<String>,
    #[serde(default, deserialize_with = "coerce::string_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "coerce::embedding")]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    status: Status,
}

fn episodic() -> Category {
    Category::Episodic
}

impl DbMemory {
    fn from_memory(m: &Memory) -> Self {
        DbMemory {
            memory_id: m.id.clone(),
            content: m.content.clone(),
            owner_id: m.owner_id.clone(),
            team_id: m.team_id.clone(),
            category: m.category,
            priority: m.priority,
            created_at: SurrealDatetime::from(m.created_at),
            accessed_at: SurrealDatetime::from(m.accessed_at),
            access_count: m.access_count,
            source: m.source.clone(),
            tags: m.tags.clone(),
            embedding: m.embedding.clone(),
            status: m.status,
        }
    }

    fn into_memory(self) -> Memory {
        Memory {
            id: self.memory_id,
            content: self.content,
            owner_id: self.owner_id,
            team_id: self.team_id,
            category: self.category,
            priority: self.priority,
            created_at: DateTime::<Utc>::from(self.created_at),
            accessed_at: DateTime::<Utc>::from(self.accessed_at),
            access_count: self.access_count,
            source: self.source,
            tags: self.tags,
            embedding: self.embedding,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbMemoryVersion {
    memory_id: String,
    commit_hash: String,
    #[serde(default, deserialize_with = "coerce::text")]
    committer: String,
    #[serde(default = "coerce::now_datetime", deserialize_with = "coerce::datetime")]
    commit_date: SurrealDatetime,
    seq: u64,
    memory: DbMemory,
}

impl DbMemoryVersion {
    fn into_version(self) -> MemoryVersion {
        MemoryVersion {
            commit_hash: self.commit_hash,
            committer: self.committer,
            commit_date: DateTime::<Utc>::from(self.commit_date),
            memory: self.memory.into_memory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbDecision {
    decision_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    task_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    decision_text: String,
    #[serde(default, deserialize_with = "coerce::string_list")]
    memory_ids: Vec<String>,
    #[serde(default, deserialize_with = "coerce::float")]
    outcome: f64,
    #[serde(default, deserialize_with = "coerce::text")]
    feedback: String,
    #[serde(default, deserialize_with = "coerce::text")]
    commit_hash: String,
    #[serde(default = "coerce::now_datetime", deserialize_with = "coerce::datetime")]
    created_at: SurrealDatetime,
}

impl DbDecision {
    fn from_decision(d: &Decision) -> Self {
        DbDecision {
            decision_id: d.id.clone(),
            task_id: d.task_id.clone(),
            decision_text: d.decision_text.clone(),
            memory_ids: d.memory_ids.clone(),
            outcome: d.outcome,
            feedback: d.feedback.clone(),
            commit_hash: d.commit_hash.clone(),
            created_at: SurrealDatetime::from(d.created_at),
        }
    }

    fn into_decision(self) -> Decision {
        Decision {
            id: self.decision_id,
            task_id: self.task_id,
            decision_text: self.decision_text,
            memory_ids: self.memory_ids,
            outcome: self.outcome,
            feedback: self.feedback,
            commit_hash: self.commit_hash,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbCommit {
    commit_id: CommitId,
    parent_id: Option<String>,
    message: String,
    author: String,
    memory_ids: Vec<String>,
    seq: u64,
    #[serde(default = "coerce::now_datetime", deserialize_with = "coerce::datetime")]
    created_at: SurrealDatetime,
}

impl DbCommit {
    fn into_commit_record(self) -> CommitRecord {
        CommitRecord {
            commit_id: self.commit_id,
            parent_id: self.parent_id,
            message: self.message,
            author: self.author,
            memory_ids: self.memory_ids,
            created_at: DateTime::<Utc>::from(self.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbStaged {
    memory_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    #[serde(default, deserialize_with = "coerce::count")]
    count: u32,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url("mem://", DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Connect to any SurrealDB URL (`mem://`, `surrealkv://path`, `ws://...`)
    #[instrument(skip_all, fields(url = %url, namespace = %namespace, database = %database))]
    pub async fn connect_url(url: &str, namespace: &str, database: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle {
            db,
            database: database.to_string(),
        };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Open (or create) a file-backed store for `database` under `data_dir`
    #[instrument(skip_all, fields(data_dir = %data_dir.display(), database = %database))]
    pub async fn setup_local(data_dir: &Path, namespace: &str, database: &str) -> Result<Self> {
        let path = local_store_path(data_dir, database);
        std::fs::create_dir_all(&path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let url = format!("surrealkv://{}", path.display());
        info!("Using local persistence: {}", url);
        Self::connect_url(&url, namespace, database).await
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle {
            db,
            database: config.database.clone(),
        };
        handle.init_schema().await?;

        info!("SurrealDB Cloud connected and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL (`mem://` for a
    /// throwaway store).
    /// Otherwise, opens a file-backed store under [`default_data_dir`].
    ///
    /// `database` overrides the configured database name (used for the
    /// global promotion pool).
    #[instrument(skip_all)]
    pub async fn setup_from_env(database: Option<&str>) -> Result<Self> {
        if let Ok(mut config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            if let Some(db) = database {
                config = config.with_database(db);
            }
            return Self::setup_cloud(config).await;
        }

        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database = database.map(String::from).unwrap_or_else(|| {
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string())
        });

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect_url(&url, &namespace, &database).await;
        }

        info!("No cloud config or SURREALDB_URL found, using local persistence");
        Self::setup_local(&default_data_dir(), &namespace, &database).await
    }

    /// Name of the selected database
    pub fn database(&self) -> &str {
        &self.database
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing Mnemo schema");
        migrations::init_schema(&self.db)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))
    }

    // ========== Staging ==========

    async fn stage(&self, memory_id: Option<&str>) -> StorageResult<()> {
        let row = DbStaged {
            memory_id: memory_id.map(String::from),
        };
        let _created: Option<DbStaged> = self.db.create("staged").content(row).await?;
        Ok(())
    }

    async fn commit_count(&self) -> StorageResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() FROM commits GROUP ALL")
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| u64::from(r.count)).unwrap_or(0))
    }

    /// Commit log, newest first
    #[instrument(skip(self))]
    pub async fn commit_log(&self, limit: usize) -> StorageResult<Vec<CommitRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM commits ORDER BY seq DESC LIMIT $limit")
            .bind(("limit", limit))
            .await?;
        let commits: Vec<DbCommit> = result.take(0)?;
        Ok(commits
            .into_iter()
            .map(DbCommit::into_commit_record)
            .collect())
    }
}

fn where_clause(filter: &MemoryFilter) -> String {
    let mut clauses: Vec<&str> = Vec::new();
    if filter.text.is_some() {
        clauses.push("string::contains(string::lowercase(content), $text)");
    }
    if filter.category.is_some() {
        clauses.push("category = $category");
    }
    if filter.status.is_some() {
        clauses.push("status = $status");
    }
    if filter.owner_id.is_some() {
        clauses.push("owner_id = $owner_id");
    }
    if filter.team_id.is_some() {
        clauses.push("team_id = $team_id");
    }
    if !filter.tags.is_empty() {
        clauses.push("tags CONTAINSALL $tags");
    }
    if filter.created_since.is_some() {
        clauses.push("created_at >= $since");
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    }
}

fn bind_filter<'a>(
    mut query: surrealdb::method::Query<'a, Any>,
    filter: &MemoryFilter,
) -> surrealdb::method::Query<'a, Any> {
    if let Some(text) = &filter.text {
        query = query.bind(("text", text.to_lowercase()));
    }
    if let Some(category) = filter.category {
        query = query.bind(("category", category.to_string()));
    }
    if let Some(status) = filter.status {
        query = query.bind(("status", status.to_string()));
    }
    if let Some(owner) = &filter.owner_id {
        query = query.bind(("owner_id", owner.clone()));
    }
    if let Some(team) = &filter.team_id {
        query = query.bind(("team_id", team.clone()));
    }
    if !filter.tags.is_empty() {
        query = query.bind(("tags", filter.tags.clone()));
    }
    if let Some(since) = filter.created_since {
        query = query.bind(("since", SurrealDatetime::from(since)));
    }
    query
}

#[async_trait]
impl MemoryRepository for SurrealHandle {
    #[instrument(skip(self, filter))]
    async fn query_memories(
        &self,
        filter: &MemoryFilter,
        order: MemoryOrder,
        limit: Option<usize>,
    ) -> StorageResult<Vec<Memory>> {
        let limit_clause = if limit.is_some() { "LIMIT $limit" } else { "" };
        let sql = format!(
            "SELECT * FROM memories {} {} {}",
            where_clause(filter),
            order.order_clause(),
            limit_clause
        );
        debug!(%sql, "querying memories");

        let mut query = bind_filter(self.db.query(sql), filter);
        if let Some(limit) = limit {
            query = query.bind(("limit", limit));
        }

        let mut result = query.await?;
        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().map(DbMemory::into_memory).collect())
    }

    #[instrument(skip(self, filter))]
    async fn count_memories(&self, filter: &MemoryFilter) -> StorageResult<usize> {
        let sql = format!(
            "SELECT count() FROM memories {} GROUP ALL",
            where_clause(filter)
        );
        let mut result = bind_filter(self.db.query(sql), filter).await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.count as usize).unwrap_or(0))
    }

    #[instrument(skip(self))]
    async fn get_memory(&self, id: &str) -> StorageResult<Option<Memory>> {
        let mut result = self
            .db
            .query("SELECT * FROM memories WHERE memory_id = $id")
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<DbMemory> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbMemory::into_memory))
    }

    #[instrument(skip(self, memory), fields(memory_id = %memory.id))]
    async fn insert_memory(&self, memory: &Memory) -> StorageResult<()> {
        if self.get_memory(&memory.id).await?.is_some() {
            return Err(StorageError::DuplicateMemory {
                id: memory.id.clone(),
            });
        }

        let created: Option<DbMemory> = self
            .db
            .create("memories")
            .content(DbMemory::from_memory(memory))
            .await?;
        if created.is_none() {
            return Err(StorageError::Backend("failed to create memory".to_string()));
        }

        self.stage(Some(&memory.id)).await?;
        debug!("memory inserted");
        Ok(())
    }

    #[instrument(skip(self, row))]
    async fn import_memory(&self, row: serde_json::Value) -> StorageResult<String> {
        let memory = Memory::from_row(row)?;
        self.insert_memory(&memory).await?;
        debug!(memory_id = %memory.id, "memory imported");
        Ok(memory.id)
    }

    #[instrument(skip(self, memory), fields(memory_id = %memory.id))]
    async fn update_memory(&self, memory: &Memory) -> StorageResult<()> {
        let mut result = self
            .db
            .query("UPDATE memories CONTENT $row WHERE memory_id = $id")
            .bind(("row", DbMemory::from_memory(memory)))
            .bind(("id", memory.id.clone()))
            .await?;

        let updated: Vec<DbMemory> = result.take(0)?;
        if updated.is_empty() {
            return Err(StorageError::MemoryNotFound {
                id: memory.id.clone(),
            });
        }

        self.stage(Some(&memory.id)).await?;
        Ok(())
    }

    #[instrument(skip(self, memory), fields(memory_id = %memory.id))]
    async fn upsert_memory(&self, memory: &Memory) -> StorageResult<()> {
        if self.get_memory(&memory.id).await?.is_some() {
            self.db
                .query("UPDATE memories SET content = $content, priority = $priority WHERE memory_id = $id")
                .bind(("content", memory.content.clone()))
                .bind(("priority", memory.priority))
                .bind(("id", memory.id.clone()))
                .await?;
        } else {
            let _created: Option<DbMemory> = self
                .db
                .create("memories")
                .content(DbMemory::from_memory(memory))
                .await?;
        }

        self.stage(Some(&memory.id)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_memory(&self, id: &str) -> StorageResult<()> {
        let mut result = self
            .db
            .query("DELETE FROM memories WHERE memory_id = $id RETURN BEFORE")
            .bind(("id", id.to_string()))
            .await?;

        let deleted: Vec<DbMemory> = result.take(0)?;
        if deleted.is_empty() {
            return Err(StorageError::MemoryNotFound { id: id.to_string() });
        }

        self.stage(Some(id)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn memory_history(&self, id: &str) -> StorageResult<Vec<MemoryVersion>> {
        let mut result = self
            .db
            .query("SELECT * FROM memory_versions WHERE memory_id = $id ORDER BY seq DESC")
            .bind(("id", id.to_string()))
            .await?;

        let versions: Vec<DbMemoryVersion> = result.take(0)?;
        Ok(versions
            .into_iter()
            .map(DbMemoryVersion::into_version)
            .collect())
    }

    #[instrument(skip(self))]
    async fn memory_version(&self, id: &str, commit_hash: &str) -> StorageResult<MemoryVersion> {
        let mut result = self
            .db
            .query("SELECT * FROM memory_versions WHERE memory_id = $id AND commit_hash = $commit")
            .bind(("id", id.to_string()))
            .bind(("commit", commit_hash.to_string()))
            .await?;

        let versions: Vec<DbMemoryVersion> = result.take(0)?;
        versions
            .into_iter()
            .next()
            .map(DbMemoryVersion::into_version)
            .ok_or_else(|| StorageError::VersionNotFound {
                id: id.to_string(),
                commit: commit_hash.to_string(),
            })
    }

    #[instrument(skip(self, decision), fields(decision_id = %decision.id))]
    async fn insert_decision(&self, decision: &Decision) -> StorageResult<()> {
        let created: Option<DbDecision> = self
            .db
            .create("decisions")
            .content(DbDecision::from_decision(decision))
            .await?;
        if created.is_none() {
            return Err(StorageError::Backend(
                "failed to create decision".to_string(),
            ));
        }

        self.stage(None).await
    }

    #[instrument(skip(self))]
    async fn get_decision(&self, id: &str) -> StorageResult<Option<Decision>> {
        let mut result = self
            .db
            .query("SELECT * FROM decisions WHERE decision_id = $id")
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<DbDecision> = result.take(0)?;
        Ok(rows.into_iter().next().map(DbDecision::into_decision))
    }

    #[instrument(skip(self, decision), fields(decision_id = %decision.id))]
    async fn update_decision(&self, decision: &Decision) -> StorageResult<()> {
        let mut result = self
            .db
            .query("UPDATE decisions CONTENT $row WHERE decision_id = $id")
            .bind(("row", DbDecision::from_decision(decision)))
            .bind(("id", decision.id.clone()))
            .await?;

        let updated: Vec<DbDecision> = result.take(0)?;
        if updated.is_empty() {
            return Err(StorageError::DecisionNotFound {
                id: decision.id.clone(),
            });
        }

        self.stage(None).await
    }

    #[instrument(skip(self))]
    async fn list_decisions(&self, task_id: Option<&str>) -> StorageResult<Vec<Decision>> {
        let mut result = match task_id {
            Some(task) => {
                self.db
                    .query(
                        "SELECT * FROM decisions WHERE task_id = $task ORDER BY created_at DESC",
                    )
                    .bind(("task", task.to_string()))
                    .await?
            }
            None => {
                self.db
                    .query("SELECT * FROM decisions ORDER BY created_at DESC")
                    .await?
            }
        };

        let rows: Vec<DbDecision> = result.take(0)?;
        Ok(rows.into_iter().map(DbDecision::into_decision).collect())
    }

    #[instrument(skip(self, link), fields(from = %link.from_id, to = %link.to_id))]
    async fn upsert_link(&self, link: &MemoryLink) -> StorageResult<()> {
        let mut result = self
            .db
            .query("UPDATE memory_links SET relation = $relation WHERE from_id = $from AND to_id = $to")
            .bind(("relation", link.relation.clone()))
            .bind(("from", link.from_id.clone()))
            .bind(("to", link.to_id.clone()))
            .await?;

        let updated: Vec<MemoryLink> = result.take(0)?;
        if updated.is_empty() {
            let _created: Option<MemoryLink> = self
                .db
                .create("memory_links")
                .content(link.clone())
                .await?;
        }

        self.stage(None).await
    }

    #[instrument(skip(self))]
    async fn links_for(&self, id: &str) -> StorageResult<Vec<MemoryLink>> {
        let mut result = self
            .db
            .query("SELECT * FROM memory_links WHERE from_id = $id OR to_id = $id")
            .bind(("id", id.to_string()))
            .await?;

        let links: Vec<MemoryLink> = result.take(0)?;
        Ok(links)
    }

    #[instrument(skip(self))]
    async fn head_commit(&self) -> StorageResult<Option<CommitId>> {
        Ok(self
            .commit_log(1)
            .await?
            .into_iter()
            .next()
            .map(|c| c.commit_id))
    }

    #[instrument(skip(self), fields(database = %self.database))]
    async fn commit(&self, message: &str, author: &str) -> StorageResult<Option<CommitId>> {
        let mut result = self.db.query("SELECT * FROM staged").await?;
        let staged: Vec<DbStaged> = result.take(0)?;
        if staged.is_empty() {
            debug!("nothing to commit");
            return Ok(None);
        }

        let mut memory_ids: Vec<String> = Vec::new();
        for id in staged.into_iter().filter_map(|s| s.memory_id) {
            if !memory_ids.contains(&id) {
                memory_ids.push(id);
            }
        }

        let mut result = self
            .db
            .query("SELECT * FROM memories WHERE memory_id IN $ids")
            .bind(("ids", memory_ids.clone()))
            .await?;
        let rows: Vec<DbMemory> = result.take(0)?;

        let payload = serde_json::to_vec(
            &rows
                .iter()
                .cloned()
                .map(DbMemory::into_memory)
                .collect::<Vec<_>>(),
        )?;

        let parent = self.head_commit().await?.map(|c| c.hash);
        let commit_id = CommitId::derive(parent.as_deref(), message, &payload);
        let seq = self.commit_count().await? + 1;
        let now = SurrealDatetime::from(Utc::now());

        for row in rows {
            let version = DbMemoryVersion {
                memory_id: row.memory_id.clone(),
                commit_hash: commit_id.hash.clone(),
                committer: author.to_string(),
                commit_date: now.clone(),
                seq,
                memory: row,
            };
            let _created: Option<DbMemoryVersion> = self
                .db
                .create("memory_versions")
                .content(version)
                .await
                .map_err(|e| StorageError::Commit(e.to_string()))?;
        }

        let record = DbCommit {
            commit_id: commit_id.clone(),
            parent_id: parent,
            message: message.to_string(),
            author: author.to_string(),
            memory_ids,
            seq,
            created_at: now,
        };
        let created: Option<DbCommit> = self
            .db
            .create("commits")
            .content(record)
            .await
            .map_err(|e| StorageError::Commit(e.to_string()))?;
        if created.is_none() {
            return Err(StorageError::Commit("failed to create commit".to_string()));
        }

        self.db.query("DELETE staged").await?;

        info!(commit = %commit_id.short(), "committed staged changes");
        Ok(Some(commit_id))
    }
}
