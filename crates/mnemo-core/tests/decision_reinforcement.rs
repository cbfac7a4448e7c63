use std::sync::Arc;

use mnemo_core::{Category, DecisionRecorder, Memory, MemoryRepository, MnemoError};
use mnemo_state::fakes::InMemoryRepository;

fn seeded() -> (Arc<InMemoryRepository>, Memory, Memory) {
    let a = Memory::new("use sqlx migrations", Category::Semantic, 0.5).with_access(2, chrono::Utc::now());
    let b = Memory::new("pin the toolchain", Category::Core, 0.95).with_access(0, chrono::Utc::now());
    let repo = Arc::new(InMemoryRepository::with_memories([a.clone(), b.clone()]));
    (repo, a, b)
}

async fn priority_and_access(repo: &InMemoryRepository, id: &str) -> (f64, u32) {
    let m = repo.get_memory(id).await.unwrap().unwrap();
    (m.priority, m.access_count)
}

#[tokio::test]
async fn successful_outcome_boosts_every_linked_memory() {
    let (repo, a, b) = seeded();
    let recorder = DecisionRecorder::new(repo.clone());

    let decision = recorder
        .track_decision("task-1", vec![a.id.clone(), b.id.clone()], "adopt migrations")
        .await
        .unwrap();
    let report = recorder
        .record_outcome(&decision.id, 0.9, "worked")
        .await
        .unwrap();

    assert_eq!(report.boosted, vec![a.id.clone(), b.id.clone()]);
    assert!(report.failed.is_empty());

    let (pa, ca) = priority_and_access(&repo, &a.id).await;
    assert!((pa - 0.6).abs() < 1e-9);
    assert_eq!(ca, 3);

    // No upper clamp
    let (pb, cb) = priority_and_access(&repo, &b.id).await;
    assert!((pb - 1.05).abs() < 1e-9);
    assert_eq!(cb, 1);

    let stored = recorder.get_decision(&decision.id).await.unwrap();
    assert_eq!(stored.outcome, 0.9);
    assert_eq!(stored.feedback, "worked");
}

#[tokio::test]
async fn mediocre_outcome_changes_nothing() {
    let (repo, a, _) = seeded();
    let recorder = DecisionRecorder::new(repo.clone());
    let decision = recorder
        .track_decision("task-1", vec![a.id.clone()], "try it")
        .await
        .unwrap();

    let report = recorder.record_outcome(&decision.id, 0.5, "").await.unwrap();
    assert!(report.boosted.is_empty());
    assert_eq!(priority_and_access(&repo, &a.id).await, (0.5, 2));

    let messages: Vec<String> = repo.commits().into_iter().map(|c| c.message).collect();
    assert!(messages.iter().all(|m| !m.starts_with("Reinforce")));
    assert_eq!(
        messages.last().unwrap(),
        &format!("Record outcome for decision {}: 0.50", decision.id)
    );
}

#[tokio::test]
async fn threshold_is_exclusive() {
    let (repo, a, _) = seeded();
    let recorder = DecisionRecorder::new(repo.clone());
    let decision = recorder
        .track_decision("task-1", vec![a.id.clone()], "edge")
        .await
        .unwrap();
    let report = recorder.record_outcome(&decision.id, 0.8, "").await.unwrap();
    assert!(report.boosted.is_empty());
}

#[tokio::test]
async fn failed_boost_is_reported_and_others_continue() {
    let (repo, a, b) = seeded();
    repo.fail_updates_for(&a.id);
    let recorder = DecisionRecorder::new(repo.clone());

    let decision = recorder
        .track_decision(
            "task-2",
            vec![a.id.clone(), "ghost".to_string(), b.id.clone()],
            "mixed",
        )
        .await
        .unwrap();
    let report = recorder.record_outcome(&decision.id, 1.0, "").await.unwrap();

    assert_eq!(report.boosted, vec![b.id.clone()]);
    let failed: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(failed, vec![a.id.as_str(), "ghost"]);
    assert_eq!(priority_and_access(&repo, &a.id).await, (0.5, 2));

    let messages: Vec<String> = repo.commits().into_iter().map(|c| c.message).collect();
    assert!(messages.contains(&format!(
        "Reinforce memories for decision {} (outcome: 1.00)",
        decision.id
    )));
}

#[tokio::test]
async fn decision_links_to_head_commit() {
    let (repo, a, _) = seeded();
    let recorder = DecisionRecorder::new(repo.clone());

    let first = recorder
        .track_decision("task-3", vec![a.id.clone()], "first")
        .await
        .unwrap();
    assert_eq!(first.commit_hash, "");

    let head = repo.head_commit().await.unwrap().unwrap();
    let second = recorder
        .track_decision("task-3", vec![], "second")
        .await
        .unwrap();
    assert_eq!(second.commit_hash, head.hash);

    let listed = recorder.list_decisions(Some("task-3")).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert!(recorder.list_decisions(Some("other")).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_task_id_is_rejected() {
    let (repo, _, _) = seeded();
    let recorder = DecisionRecorder::new(repo);
    let err = recorder.track_decision(" ", vec![], "x").await.unwrap_err();
    assert!(matches!(err, MnemoError::Validation(_)));
}
