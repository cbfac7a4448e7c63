//! SurrealDB schema migrations and initialization
//!
//! Tables are SCHEMALESS: rows written by older builds or other tools are
//! accepted as-is and normalized on read by the `coerce` helpers.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Mnemo tables. Idempotent.
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Mnemo SurrealDB schema");

    init_memories_table(db).await?;
    init_memory_versions_table(db).await?;
    init_decisions_table(db).await?;
    init_memory_links_table(db).await?;
    init_commits_table(db).await?;
    init_staged_table(db).await?;

    info!("Mnemo schema initialization complete");
    Ok(())
}

/// Initialize `memories` table
///
/// Schema:
/// ```text
/// TABLE memories {
///   memory_id:     STRING (unique)
///   content:       STRING
///   owner_id:      STRING (indexed)
///   team_id:       STRING (indexed)
///   category:      STRING (core | semantic | working | episodic)
///   priority:      FLOAT
///   created_at:    DATETIME (indexed)
///   accessed_at:   DATETIME
///   access_count:  INT
///   source:        STRING?
///   tags:          ARRAY<STRING>
///   embedding:     ARRAY<FLOAT>?
///   status:        STRING (verified | under_review | deprecated)
/// }
/// ```
async fn init_memories_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing memories table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS memories SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_memory_id ON TABLE memories COLUMNS memory_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_memory_category ON TABLE memories COLUMNS category;
        DEFINE INDEX IF NOT EXISTS idx_memory_owner ON TABLE memories COLUMNS owner_id;
        DEFINE INDEX IF NOT EXISTS idx_memory_team ON TABLE memories COLUMNS team_id;
        DEFINE INDEX IF NOT EXISTS idx_memory_created_at ON TABLE memories COLUMNS created_at;
        DEFINE INDEX IF NOT EXISTS idx_memory_priority ON TABLE memories COLUMNS priority, accessed_at;
    "#;

    db.query(sql).await?;
    debug!("memories table initialized");
    Ok(())
}

/// Initialize `memory_versions` table
///
/// One row per (memory, commit). `seq` is the commit sequence number and
/// orders history.
async fn init_memory_versions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing memory_versions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS memory_versions SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_version_memory_commit ON TABLE memory_versions COLUMNS memory_id, commit_hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_version_memory_seq ON TABLE memory_versions COLUMNS memory_id, seq;
    "#;

    db.query(sql).await?;
    debug!("memory_versions table initialized");
    Ok(())
}

/// Initialize `decisions` table
async fn init_decisions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing decisions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS decisions SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_decision_id ON TABLE decisions COLUMNS decision_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_decision_task ON TABLE decisions COLUMNS task_id, created_at;
    "#;

    db.query(sql).await?;
    debug!("decisions table initialized");
    Ok(())
}

/// Initialize `memory_links` table. `(from_id, to_id)` is unique.
async fn init_memory_links_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing memory_links table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS memory_links SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_link_pair ON TABLE memory_links COLUMNS from_id, to_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_link_to ON TABLE memory_links COLUMNS to_id;
    "#;

    db.query(sql).await?;
    debug!("memory_links table initialized");
    Ok(())
}

/// Initialize `commits` table
async fn init_commits_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing commits table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS commits SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_commit_hash ON TABLE commits COLUMNS commit_id.hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_commit_seq ON TABLE commits COLUMNS seq UNIQUE;
    "#;

    db.query(sql).await?;
    debug!("commits table initialized");
    Ok(())
}

/// Initialize `staged` table: pending changes since the last commit
async fn init_staged_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing staged table");

    db.query("DEFINE TABLE IF NOT EXISTS staged SCHEMALESS;")
        .await?;
    debug!("staged table initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_db() -> Surreal<Any> {
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        db.use_ns("mnemo").use_db("migrations").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let db = fresh_db().await;
        init_schema(&db).await.unwrap();
        init_schema(&db).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_only_tables_accept_rows() {
        let db = fresh_db().await;
        init_schema(&db).await.unwrap();

        let mut result = db
            .query("CREATE commits CONTENT { seq: 1, message: 'first' }; SELECT VALUE message FROM commits;")
            .await
            .unwrap()
            .check()
            .unwrap();
        let messages: Vec<String> = result.take(1).unwrap();
        assert_eq!(messages, vec!["first"]);
    }
}
