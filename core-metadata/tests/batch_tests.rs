//! Integration tests for batch resolution against an in-memory SQLite library

mod common;

use common::{hit, StubSource};
use core_library::db::create_test_pool;
use core_library::{FieldValue, GameRepository, MetadataField, NewGame, SqliteGameRepository};
use core_metadata::{
    BatchConfig, BatchItem, BatchResolver, FallbackOrchestrator, RunContext, SourceFailure,
    SourceRegistry,
};
use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn setup_repo(titles: &[&str]) -> (Arc<SqliteGameRepository>, Vec<i64>) {
    let pool = create_test_pool().await.unwrap();
    let repo = Arc::new(SqliteGameRepository::new(pool));
    let mut ids = Vec::new();
    for title in titles {
        ids.push(repo.insert(&NewGame::new(*title, "GameCube")).await.unwrap());
    }
    (repo, ids)
}

/// Genre source that knows every title except "Unknown".
fn genre_source() -> Arc<StubSource> {
    Arc::new(StubSource::new("genres", |variant, _| {
        if variant.starts_with("Unknown") {
            Err(SourceFailure::NoMatch)
        } else {
            Ok(vec![hit("genres", variant, "Action")])
        }
    }))
}

fn orchestrator(source: Arc<StubSource>) -> Arc<FallbackOrchestrator> {
    Arc::new(FallbackOrchestrator::new(
        SourceRegistry::new().with_source(source),
    ))
}

fn config(field: MetadataField) -> BatchConfig {
    BatchConfig::new(field).with_inter_query_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_batch_fills_missing_records() {
    let (repo, ids) = setup_repo(&["Ikaruga", "Unknown Prototype", "Pikmin", "Metroid Prime"]).await;
    repo.update_field(ids[3], MetadataField::Genre, &FieldValue::Text("Adventure".into()))
        .await
        .unwrap();

    let batch = BatchResolver::new(config(MetadataField::Genre), orchestrator(genre_source()), repo.clone());
    let progress = batch.run(&RunContext::new()).await.unwrap();

    assert_eq!(progress.total, 3);
    assert_eq!(progress.processed, 3);
    assert_eq!(progress.found, 2);
    assert_eq!(progress.not_found, 1);
    assert_eq!(progress.failed, 0);
    assert_eq!(progress.percent_complete, 100);
    assert!(!progress.cancelled);

    let ikaruga = repo.find_by_id(ids[0]).await.unwrap().unwrap();
    assert_eq!(ikaruga.genre.as_deref(), Some("Action"));
    let prime = repo.find_by_id(ids[3]).await.unwrap().unwrap();
    assert_eq!(prime.genre.as_deref(), Some("Adventure"));
    assert_eq!(repo.count_missing(MetadataField::Genre).await.unwrap(), 1);
}

#[tokio::test]
async fn test_rerun_only_touches_remaining_records() {
    let (repo, _) = setup_repo(&["Ikaruga", "Unknown Prototype"]).await;
    let source = genre_source();
    let orch = orchestrator(source.clone());

    let first = BatchResolver::new(config(MetadataField::Genre), orch.clone(), repo.clone());
    first.run(&RunContext::new()).await.unwrap();
    let second = BatchResolver::new(config(MetadataField::Genre), orch, repo.clone());
    let progress = second.run(&RunContext::new()).await.unwrap();

    assert_eq!(progress.total, 1);
    assert_eq!(progress.not_found, 1);
}

#[tokio::test]
async fn test_limit_caps_loaded_records() {
    let (repo, _) = setup_repo(&["Ikaruga", "Pikmin", "Wave Race"]).await;
    let batch = BatchResolver::new(
        config(MetadataField::Genre).with_limit(2),
        orchestrator(genre_source()),
        repo.clone(),
    );
    let progress = batch.run(&RunContext::new()).await.unwrap();

    assert_eq!(progress.total, 2);
    assert_eq!(repo.count_missing(MetadataField::Genre).await.unwrap(), 1);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (repo, _) = setup_repo(&["Ikaruga", "Pikmin"]).await;
    let batch = BatchResolver::new(
        config(MetadataField::Genre).with_dry_run(true),
        orchestrator(genre_source()),
        repo.clone(),
    );
    let progress = batch.run(&RunContext::new()).await.unwrap();

    assert_eq!(progress.found, 2);
    assert_eq!(repo.count_missing(MetadataField::Genre).await.unwrap(), 2);
}

#[tokio::test]
async fn test_unparsable_value_fails_record_and_continues() {
    let (repo, ids) = setup_repo(&["Ikaruga", "Pikmin"]).await;
    let source = Arc::new(StubSource::new("ratings", |variant, _| {
        let value = if variant == "Ikaruga" { "great" } else { "88" };
        Ok(vec![hit("ratings", variant, value)])
    }));
    let event_bus = EventBus::new(64);
    let mut events = event_bus.subscribe();

    let batch = BatchResolver::new(config(MetadataField::CriticRating), orchestrator(source), repo.clone())
        .with_event_bus(event_bus);
    let ctx = RunContext::with_run_id("batch-1");
    let progress = batch.run(&ctx).await.unwrap();

    assert_eq!(progress.failed, 1);
    assert_eq!(progress.found, 1);
    assert_eq!(progress.processed, 2);
    let pikmin = repo.find_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(pikmin.critic_rating, Some(88));

    let mut failed_records = Vec::new();
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::Batch(BatchEvent::RecordFailed { run_id, record_id, .. }) => {
                assert_eq!(run_id, "batch-1");
                failed_records.push(record_id);
            }
            CoreEvent::Batch(BatchEvent::Completed { processed, failed, .. }) => {
                assert_eq!(processed, 2);
                assert_eq!(failed, 1);
                completed = true;
            }
            _ => {}
        }
    }
    assert_eq!(failed_records, vec![ids[0]]);
    assert!(completed);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let (repo, _) = setup_repo(&["Ikaruga", "Pikmin"]).await;
    let source = genre_source();
    let token = CancellationToken::new();
    token.cancel();

    let batch = BatchResolver::new(config(MetadataField::Genre), orchestrator(source.clone()), repo)
        .with_cancellation(token);
    let progress = batch.run(&RunContext::new()).await.unwrap();

    assert!(progress.cancelled);
    assert_eq!(progress.processed, 0);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_cancellation_takes_effect_between_queries() {
    let (repo, _) = setup_repo(&["Ikaruga", "Pikmin", "Wave Race"]).await;
    let token = CancellationToken::new();
    let trigger = token.clone();
    let source = Arc::new(StubSource::new("genres", move |variant, _| {
        // Cancel while the first query is in flight; it still completes.
        trigger.cancel();
        Ok(vec![hit("genres", variant, "Action")])
    }));

    let batch = BatchResolver::new(
        config(MetadataField::Genre).with_inter_query_delay(Duration::from_secs(30)),
        orchestrator(source.clone()),
        repo.clone(),
    )
    .with_cancellation(token);
    let progress = batch.run(&RunContext::new()).await.unwrap();

    assert!(progress.cancelled);
    assert_eq!(progress.processed, 1);
    assert_eq!(progress.found, 1);
    assert_eq!(source.calls(), 1);
    assert_eq!(repo.count_missing(MetadataField::Genre).await.unwrap(), 2);
}

#[tokio::test]
async fn test_run_items_with_caller_records() {
    let (repo, ids) = setup_repo(&["Ikaruga"]).await;
    let batch = BatchResolver::new(config(MetadataField::Genre), orchestrator(genre_source()), repo.clone());

    let items = vec![
        BatchItem::new(ids[0], "Ikaruga", "GameCube"),
        BatchItem::new(9999, "Pikmin", "GameCube"),
    ];
    let progress = batch.run_items(items, &RunContext::new()).await.unwrap();

    assert_eq!(progress.found, 1);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.sources.get("genres"), Some(&1));
}
