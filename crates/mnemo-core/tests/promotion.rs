use std::sync::Arc;

use chrono::Utc;
use mnemo_core::{
    Category, DecisionRecorder, Memory, MemoryRepository, MemoryService, PromotionCriteria,
};
use mnemo_state::fakes::InMemoryRepository;

struct Project {
    repo: Arc<InMemoryRepository>,
    service: MemoryService,
    proven: Memory,
    popular_unproven: Memory,
}

async fn project() -> Project {
    let proven = Memory::new("retry idempotent requests", Category::Semantic, 0.6)
        .with_access(7, Utc::now())
        .with_tags(["http"]);
    let proven_core = Memory::new("main branch is protected", Category::Core, 0.9)
        .with_access(5, Utc::now());
    let popular_unproven = Memory::new("lunch at noon", Category::Semantic, 0.9)
        .with_access(40, Utc::now());
    let repo = Arc::new(InMemoryRepository::with_memories([
        proven.clone(),
        proven_core.clone(),
        popular_unproven.clone(),
    ]));

    let recorder = DecisionRecorder::new(repo.clone());
    let good = recorder
        .track_decision("t", vec![proven.id.clone(), proven_core.id.clone()], "ship it")
        .await
        .unwrap();
    recorder.record_outcome(&good.id, 0.8, "").await.unwrap();
    let bad = recorder
        .track_decision("t", vec![popular_unproven.id.clone()], "skip lunch")
        .await
        .unwrap();
    recorder.record_outcome(&bad.id, 0.2, "").await.unwrap();

    Project {
        service: MemoryService::new(repo.clone()),
        repo,
        proven,
        popular_unproven,
    }
}

#[tokio::test]
async fn candidates_require_a_successful_decision() {
    let p = project().await;
    let candidates = p
        .service
        .find_promotion_candidates(&PromotionCriteria::default())
        .await
        .unwrap();
    let ids: Vec<&str> = candidates.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], p.proven.id);
    assert!(!ids.contains(&p.popular_unproven.id.as_str()));
}

#[tokio::test]
async fn promote_copies_into_target_and_leaves_source() {
    let p = project().await;
    let global = InMemoryRepository::new();
    p.service.promote_memory(&p.proven.id, &global).await.unwrap();

    let copied = global.get_memory(&p.proven.id).await.unwrap().unwrap();
    assert_eq!(copied.content, p.proven.content);
    assert_eq!(copied.tags, p.proven.tags);
    assert_eq!(copied.access_count, 0);
    assert_eq!(
        global.commits().last().unwrap().message,
        format!("Promoted memory {} from project store", p.proven.id)
    );

    let source = p.repo.get_memory(&p.proven.id).await.unwrap().unwrap();
    assert_eq!(source.access_count, p.proven.access_count);
}

#[tokio::test]
async fn promoting_again_refreshes_content() {
    let p = project().await;
    let mut stale = p.proven.clone().with_access(0, Utc::now());
    stale.content = "old wording".to_string();
    let global = InMemoryRepository::with_memories([stale]);

    p.service.promote_memory(&p.proven.id, &global).await.unwrap();
    let copied = global.get_memory(&p.proven.id).await.unwrap().unwrap();
    assert_eq!(copied.content, p.proven.content);
    assert_eq!(global.count_memories(&Default::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn auto_promote_dry_run_reports_only() {
    let p = project().await;
    let global = InMemoryRepository::new();
    let report = p
        .service
        .auto_promote(&global, &PromotionCriteria::default(), true)
        .await
        .unwrap();
    assert!(report.dry_run);
    assert_eq!(report.candidates.len(), 2);
    assert!(report.promoted.is_empty());
    assert_eq!(global.count_memories(&Default::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn auto_promote_continues_past_failures() {
    let p = project().await;
    let global = InMemoryRepository::new();
    global.fail_updates_for(&p.proven.id);

    let report = p
        .service
        .auto_promote(&global, &PromotionCriteria::default(), false)
        .await
        .unwrap();
    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, p.proven.id);
    assert_eq!(global.count_memories(&Default::default()).await.unwrap(), 1);
}
