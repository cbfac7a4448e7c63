use std::sync::Arc;

use async_trait::async_trait;
use mnemo_core::{
    Category, Embedder, MemoryService, MnemoError, NewMemory, ProviderError, Status, UpdateParams,
};
use mnemo_state::fakes::InMemoryRepository;

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![0.25, 0.5, 1.0])
    }
}

struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Http("connection refused".to_string()))
    }
}

fn service() -> (Arc<InMemoryRepository>, MemoryService) {
    let repo = Arc::new(InMemoryRepository::new());
    let service = MemoryService::new(repo.clone());
    (repo, service)
}

#[tokio::test]
async fn add_memory_defaults_owner_and_commits_excerpt() {
    let (repo, service) = service();
    let content = "Prefer explicit Result returns over panics in library code paths";
    let memory = service
        .add_memory(NewMemory::new(content).category(Category::Semantic).priority(0.7))
        .await
        .unwrap();

    assert_eq!(memory.owner_id, "system");
    assert_eq!(memory.team_id, "system");
    assert!(memory.embedding.is_none());

    let commits = repo.commits();
    assert_eq!(commits.len(), 1);
    let excerpt: String = content.chars().take(50).collect();
    assert_eq!(commits[0].message, format!("Add memory: {excerpt}..."));
    assert_eq!(commits[0].memory_ids, vec![memory.id.clone()]);
}

#[tokio::test]
async fn add_memory_rejects_priority_before_store_access() {
    let (repo, service) = service();
    let err = service
        .add_memory(NewMemory::new("x").priority(1.5))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(service.memory_count().await.unwrap(), 0);
    assert!(repo.commits().is_empty());
}

#[tokio::test]
async fn add_memory_embeds_when_configured() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = MemoryService::new(repo).with_embedder(Arc::new(FixedEmbedder));
    let memory = service.add_memory(NewMemory::new("vectorised")).await.unwrap();
    assert_eq!(memory.embedding, Some(vec![0.25, 0.5, 1.0]));
}

#[tokio::test]
async fn embedding_failure_stores_memory_without_vector() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = MemoryService::new(repo).with_embedder(Arc::new(DownEmbedder));
    let memory = service.add_memory(NewMemory::new("still stored")).await.unwrap();

    let stored = service.get_memory(&memory.id).await.unwrap().unwrap();
    assert!(stored.embedding.is_none());
    assert_eq!(stored.content, "still stored");
}

#[tokio::test]
async fn update_applies_present_fields_and_keeps_embedding() {
    let repo = Arc::new(InMemoryRepository::new());
    let service = MemoryService::new(repo).with_embedder(Arc::new(FixedEmbedder));
    let memory = service
        .add_memory(NewMemory::new("original").tags(["a"]))
        .await
        .unwrap();

    let updated = service
        .update_memory(UpdateParams {
            content: Some("edited".into()),
            ..UpdateParams::new(memory.id.clone())
        })
        .await
        .unwrap();

    assert_eq!(updated.content, "edited");
    assert_eq!(updated.tags, vec!["a"]);
    assert_eq!(updated.embedding, memory.embedding);
    assert!(updated.accessed_at >= memory.accessed_at);
}

#[tokio::test]
async fn update_unknown_memory_is_not_found() {
    let (_repo, service) = service();
    let err = service
        .update_memory(UpdateParams {
            priority: Some(0.3),
            ..UpdateParams::new("missing")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MnemoError::NotFound { kind: "memory", .. }));
}

#[tokio::test]
async fn rollback_restores_committed_version() {
    let (_repo, service) = service();
    let memory = service
        .add_memory(NewMemory::new("v1 content").tags(["first"]).priority(0.4))
        .await
        .unwrap();

    let history = service.memory_history(&memory.id).await.unwrap();
    assert_eq!(history.len(), 1);
    let first_commit = history[0].commit_hash.clone();

    service
        .update_memory(UpdateParams {
            content: Some("v2 content".into()),
            priority: Some(0.9),
            tags: Some(vec!["second".into()]),
            ..UpdateParams::new(memory.id.clone())
        })
        .await
        .unwrap();

    let history = service.memory_history(&memory.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].memory.content, "v2 content");

    let restored = service
        .rollback_memory(&memory.id, &first_commit)
        .await
        .unwrap();
    assert_eq!(restored.content, "v1 content");
    assert_eq!(restored.priority, 0.4);
    assert_eq!(restored.tags, vec!["first"]);
}

#[tokio::test]
async fn rollback_to_unknown_commit_is_not_found() {
    let (_repo, service) = service();
    let memory = service.add_memory(NewMemory::new("m")).await.unwrap();
    let err = service
        .rollback_memory(&memory.id, "deadbeef")
        .await
        .unwrap_err();
    assert!(matches!(err, MnemoError::NotFound { .. }));
}

#[tokio::test]
async fn delete_links_tags_status_and_stats() {
    let (repo, service) = service();
    let a = service
        .add_memory(NewMemory::new("a").category(Category::Core).tags(["rust", "db"]))
        .await
        .unwrap();
    let b = service
        .add_memory(NewMemory::new("b").tags(["api", "rust"]))
        .await
        .unwrap();

    service.link_memories(&a.id, &b.id, "supports").await.unwrap();
    service.link_memories(&a.id, &b.id, "refines").await.unwrap();
    let links = service.memory_links(&b.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].relation, "refines");
    assert_eq!(links[0].other_end(&b.id), a.id);

    assert_eq!(service.list_tags().await.unwrap(), vec!["api", "db", "rust"]);

    let deprecated = service.set_status(&b.id, Status::Deprecated).await.unwrap();
    assert_eq!(deprecated.status, Status::Deprecated);

    let stats = service.memory_stats().await.unwrap();
    assert_eq!(stats.total_memories, 2);
    assert_eq!(stats.distribution.get("core"), Some(&1));
    assert_eq!(stats.distribution.get("episodic"), Some(&1));
    assert!((stats.avg_priority - 0.5).abs() < 1e-9);
    assert!(stats.avg_decay_score > 0.0);

    service.delete_memory(&a.id).await.unwrap();
    assert_eq!(service.memory_count().await.unwrap(), 1);
    assert!(matches!(
        service.delete_memory(&a.id).await.unwrap_err(),
        MnemoError::NotFound { .. }
    ));

    let last = repo.commits().last().unwrap().message.clone();
    assert_eq!(last, format!("Delete memory: {}", a.id));
}

#[tokio::test]
async fn commit_failure_does_not_fail_the_write() {
    let (repo, service) = service();
    repo.fail_commits();
    let memory = service.add_memory(NewMemory::new("kept")).await.unwrap();
    assert!(service.get_memory(&memory.id).await.unwrap().is_some());
    assert!(repo.commits().is_empty());
}

#[tokio::test]
async fn empty_stats() {
    let (_repo, service) = service();
    let stats = service.memory_stats().await.unwrap();
    assert_eq!(stats.total_memories, 0);
    assert_eq!(stats.avg_priority, 0.0);
    assert!(stats.distribution.is_empty());
}

#[tokio::test]
async fn import_skips_unreadable_and_duplicate_rows() {
    let (repo, service) = service();
    let rows = vec![
        serde_json::json!({
            "id": "legacy-1",
            "content": "the staging cluster is shared",
            "priority": "0.9",
            "created_at": "2023-11-05 08:00:00",
            "tags": "infra, staging"
        }),
        serde_json::json!({ "content": "row without an id" }),
        serde_json::json!({ "memory_id": "legacy-1", "content": "duplicate" }),
        serde_json::json!({ "memory_id": 2, "content": "numeric id", "accessed_at": 1699171200 }),
    ];

    let report = service.import_memories(rows).await.unwrap();
    assert_eq!(report.imported, vec!["legacy-1", "2"]);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped[0].starts_with("row 1:"));
    assert!(report.skipped[1].starts_with("row 2:"));

    let imported = service.get_memory("legacy-1").await.unwrap().unwrap();
    assert_eq!(imported.content, "the staging cluster is shared");
    assert_eq!(imported.tags, vec!["infra", "staging"]);
    assert_eq!(imported.status, Status::Verified);

    let commits = repo.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].message, "Import 2 memories");
}

#[tokio::test]
async fn import_of_nothing_makes_no_commit() {
    let (repo, service) = service();
    let report = service
        .import_memories(vec![serde_json::json!({ "content": "no id" })])
        .await
        .unwrap();
    assert!(report.imported.is_empty());
    assert!(repo.commits().is_empty());
}
