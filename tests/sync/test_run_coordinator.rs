// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Integration Tests for the Run Coordinator
//!
//! Drives full runs over the in-memory feed, CRM, and checkpoint store.

use optout_sync::checkpoint::{CheckpointStore, MemoryCheckpointStore, SequenceId, Watermark};
use optout_sync::crm::{CrmFieldError, MockCrmClient};
use optout_sync::feed::{FeedEntry, FeedError, MockFeedClient};
use optout_sync::reconcile::ReconciliationOutcome;
use optout_sync::sync::{RunCounts, RunState, SyncRunner};

fn at(n: i64) -> Watermark {
    Watermark::At(SequenceId::Numeric(n))
}

// ==================== Reference Scenario ====================

#[tokio::test]
async fn test_reference_scenario() {
    // checkpoint "5", feed [[3,a],[6,b],[7,bad],[8,c]], CRM knows b only
    let store = MemoryCheckpointStore::with_watermark(Watermark::At(
        SequenceId::parse("5").unwrap(),
    ));
    let feed = MockFeedClient::from_json(
        r#"[[3,"a@x.com"],[6,"b@x.com"],[7,"bad"],[8,"c@x.com"]]"#,
    )
    .unwrap();
    let crm = MockCrmClient::new();
    crm.add_contact("b@x.com", false).await;
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.candidates, 2);
    assert_eq!(
        report.counts,
        RunCounts {
            success: 1,
            failed: 0,
            not_found: 1,
            skipped_invalid: 1,
        }
    );
    assert!(report.watermark_persisted);
    assert_eq!(store.current().await, at(8));
    assert_eq!(crm.queries().await, vec!["b@x.com", "c@x.com"]);
    assert!(crm.contact("b@x.com").await.unwrap().opted_out);
}

// ==================== Abort Paths ====================

#[tokio::test]
async fn test_feed_failure_leaves_watermark_unchanged() {
    let store = MemoryCheckpointStore::with_watermark(at(5));
    let feed = MockFeedClient::new(vec![FeedEntry::new(6, Some("b@x.com"))]);
    feed.inject_error(FeedError::Network("connection refused".to_string()))
        .await;
    let crm = MockCrmClient::new();
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert!(report.error.unwrap().contains("connection refused"));
    assert_eq!(store.current().await, at(5));
    assert_eq!(store.save_count().await, 0);
    assert!(crm.queries().await.is_empty());
}

#[tokio::test]
async fn test_malformed_feed_aborts() {
    let store = MemoryCheckpointStore::with_watermark(at(5));
    let feed = MockFeedClient::default();
    feed.inject_error(FeedError::Malformed("expected a JSON array".to_string()))
        .await;
    let mut crm = MockCrmClient::new();

    let report = SyncRunner::new(&store, &feed, &mut crm).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert_eq!(store.current().await, at(5));
}

#[tokio::test]
async fn test_auth_failure_aborts_before_any_mutation() {
    let store = MemoryCheckpointStore::with_watermark(at(5));
    let feed = MockFeedClient::new(vec![FeedEntry::new(6, Some("b@x.com"))]);
    let crm = MockCrmClient::new();
    crm.add_contact("b@x.com", false).await;
    crm.fail_authentication("INVALID_LOGIN: invalid username, password, security token")
        .await;
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert!(report.error.unwrap().contains("INVALID_LOGIN"));
    assert_eq!(store.current().await, at(5));
    assert!(crm.updates().await.is_empty());
    assert!(!crm.contact("b@x.com").await.unwrap().opted_out);
}

#[tokio::test]
async fn test_transport_failure_mid_reconciliation_does_not_checkpoint() {
    let store = MemoryCheckpointStore::with_watermark(at(1));
    let feed = MockFeedClient::new(vec![
        FeedEntry::new(2, Some("a@x.com")),
        FeedEntry::new(3, Some("b@x.com")),
    ]);
    let crm = MockCrmClient::new();
    crm.add_contact("a@x.com", false).await;
    crm.fail_queries_for("b@x.com").await;
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert_eq!(report.counts.success, 1);
    assert_eq!(store.current().await, at(1));

    // The retry re-applies a@x.com harmlessly and finishes the run
    let retry_crm = MockCrmClient::new();
    retry_crm.add_contact("a@x.com", true).await;
    let mut retry_handle = retry_crm.clone();
    let report = SyncRunner::new(&store, &feed, &mut retry_handle).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.counts.success, 1);
    assert_eq!(report.counts.not_found, 1);
    assert_eq!(store.current().await, at(3));
}

#[tokio::test]
async fn test_checkpoint_save_failure_aborts() {
    let store = MemoryCheckpointStore::with_watermark(at(1));
    store.fail_saves(true).await;
    let feed = MockFeedClient::new(vec![FeedEntry::new(2, Some("a@x.com"))]);
    let mut crm = MockCrmClient::new();

    let report = SyncRunner::new(&store, &feed, &mut crm).run().await;

    assert_eq!(report.final_state, RunState::Aborted);
    assert!(!report.watermark_persisted);
    assert_eq!(store.current().await, at(1));
}

// ==================== Completion Paths ====================

#[tokio::test]
async fn test_all_not_found_still_checkpoints() {
    let store = MemoryCheckpointStore::new();
    let feed = MockFeedClient::new(vec![
        FeedEntry::new(1, Some("a@x.com")),
        FeedEntry::new(2, Some("b@x.com")),
        FeedEntry::new(3, Some("c@x.com")),
    ]);
    let mut crm = MockCrmClient::new();

    let report = SyncRunner::new(&store, &feed, &mut crm).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.counts.not_found, report.candidates);
    assert_eq!(report.counts.not_found, 3);
    assert_eq!(store.current().await, at(3));
}

#[tokio::test]
async fn test_rejected_updates_still_checkpoint() {
    let store = MemoryCheckpointStore::with_watermark(at(10));
    let feed = MockFeedClient::new(vec![
        FeedEntry::new(11, Some("locked@x.com")),
        FeedEntry::new(12, Some("ok@x.com")),
    ]);
    let crm = MockCrmClient::new();
    let locked = crm.add_contact("locked@x.com", false).await;
    crm.add_contact("ok@x.com", false).await;
    crm.reject_updates_for(
        &locked,
        vec![CrmFieldError {
            status_code: "UNABLE_TO_LOCK_ROW".to_string(),
            message: "unable to obtain exclusive access to this record".to_string(),
            fields: vec![],
        }],
    )
    .await;
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.counts.failed, 1);
    assert_eq!(report.counts.success, 1);
    assert!(matches!(
        report.outcomes[0].outcome,
        ReconciliationOutcome::Failed(_)
    ));
    assert_eq!(store.current().await, at(12));
}

#[tokio::test]
async fn test_invalid_only_run_advances_without_crm() {
    let store = MemoryCheckpointStore::with_watermark(at(5));
    let feed = MockFeedClient::from_json(r#"[[6,"bad"],[7],[8,null]]"#).unwrap();
    let crm = MockCrmClient::new();
    crm.fail_authentication("should never be called").await;
    let mut handle = crm.clone();

    let report = SyncRunner::new(&store, &feed, &mut handle).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.counts.skipped_invalid, 3);
    assert_eq!(report.candidates, 0);
    assert!(report.watermark_persisted);
    assert_eq!(store.current().await, at(8));
    assert!(crm.queries().await.is_empty());
}

#[tokio::test]
async fn test_second_run_processes_nothing() {
    let store = MemoryCheckpointStore::new();
    let feed = MockFeedClient::new(vec![
        FeedEntry::new(1, Some("a@x.com")),
        FeedEntry::new(2, Some("b@x.com")),
    ]);
    let crm = MockCrmClient::new();
    crm.add_contact("a@x.com", false).await;

    let mut first = crm.clone();
    SyncRunner::new(&store, &feed, &mut first).run().await;
    let queries_after_first = crm.queries().await.len();

    let mut second = crm.clone();
    let report = SyncRunner::new(&store, &feed, &mut second).run().await;

    assert_eq!(report.final_state, RunState::Checkpointed);
    assert_eq!(report.new_entries, 0);
    assert!(!report.watermark_persisted);
    assert_eq!(crm.queries().await.len(), queries_after_first);
    assert_eq!(store.save_count().await, 1);
}

#[tokio::test]
async fn test_watermark_never_regresses_across_runs() {
    let store = MemoryCheckpointStore::new();
    let crm = MockCrmClient::new();
    let mut previous = store.load().await;

    for ids in [vec![3, 1, 2], vec![2, 5], vec![4], vec![9, 7]] {
        let feed = MockFeedClient::new(
            ids.iter()
                .map(|id| FeedEntry::new(*id, Some("a@x.com")))
                .collect(),
        );
        let mut handle = crm.clone();
        SyncRunner::new(&store, &feed, &mut handle).run().await;

        let current = store.load().await;
        assert!(current >= previous, "{} regressed to {}", previous, current);
        previous = current;
    }
    assert_eq!(previous, at(9));
}
