//! Proposal aggregation tests

use hitl_core::{
    AggregatorSettings, DecisionBackend, DecisionRecord, ProposalAggregator, ProposalSink, ProposalStatus,
    ReviewError, ScopeContext, ScopeHandle,
};
use hitl_test_utils::{http_error, interrupt, record, scope, FakeBackend, FakeInterruptStream};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn aggregator(
    backend: &Arc<FakeBackend>,
    stream: &Arc<FakeInterruptStream>,
    active: ScopeContext,
) -> ProposalAggregator {
    ProposalAggregator::new(
        backend.clone(),
        stream.clone(),
        ScopeHandle::fixed(active),
    )
}

fn ids(items: &[hitl_core::ProposalItem]) -> Vec<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

#[tokio::test]
async fn superseded_duplicate_is_dropped() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new().with_records(vec![
        record("r1", "classify_intent", &active),
        record("r1", "classify_intent", &active).with_superseded_by("r2"),
    ]));
    let stream = Arc::new(FakeInterruptStream::new());

    let items = aggregator(&backend, &stream, active).refresh().await;
    assert_eq!(ids(&items), vec!["r1"]);
}

#[tokio::test]
async fn live_precedes_persisted_and_wins_on_identity() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new().with_records(vec![
        record("r-dup", "classify_intent", &active)
            .with_inputs(serde_json::from_value(serde_json::json!({"trigger_id": "t1"})).unwrap()),
        record("r-other", "generate_concept_brief", &active),
    ]));
    let stream = Arc::new(
        FakeInterruptStream::new()
            .with_interrupts(vec![interrupt("int-1", &[("classify_intent", "t1"), ("select_standards", "t1")])]),
    );

    let items = aggregator(&backend, &stream, active.clone()).refresh().await;

    assert_eq!(ids(&items), vec!["int-1-0", "int-1-1", "r-other"]);
    assert!(items.iter().all(|i| i.scope == active));
    assert!(items[0].is_live());
}

#[tokio::test]
async fn unscoped_refresh_issues_no_request() {
    let backend = Arc::new(FakeBackend::new().with_records(vec![DecisionRecord::new("r1", "x", "pending")]));
    let stream = Arc::new(
        FakeInterruptStream::new().with_interrupts(vec![interrupt("int-1", &[("classify_intent", "t1")])]),
    );
    let aggregator = aggregator(&backend, &stream, ScopeContext::unresolved());

    let items = aggregator.refresh().await;
    assert_eq!(ids(&items), vec!["int-1-0"]);
    assert_eq!(backend.list_calls(), 0);

    let err = aggregator
        .try_fetch_persisted(&ScopeHandle::fixed(ScopeContext::unresolved()).snapshot())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::ScopeUnresolved));
    assert_eq!(backend.list_calls(), 0);
}

#[tokio::test]
async fn backend_failure_degrades_to_live_only() {
    let active = scope("o1", "p1");
    let backend = Arc::new(
        FakeBackend::new()
            .with_records(vec![record("r1", "x", &active)])
            .with_list_failure(http_error(502, "bad gateway")),
    );
    let stream = Arc::new(
        FakeInterruptStream::new().with_interrupts(vec![interrupt("int-1", &[("classify_intent", "t1")])]),
    );
    let aggregator = aggregator(&backend, &stream, active.clone());

    assert_eq!(ids(&aggregator.refresh().await), vec!["int-1-0"]);
    assert_eq!(backend.list_calls(), 1, "no automatic retry");

    let err = aggregator
        .try_fetch_persisted(&ScopeHandle::fixed(active).snapshot())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::SourceFetchFailed(_)));
    assert!(!err.is_user_facing());
}

#[tokio::test]
async fn stream_failure_degrades_to_persisted_only() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new().with_records(vec![record("r1", "x", &active)]));
    let stream = Arc::new(FakeInterruptStream::new().with_failure(http_error(500, "run lost")));

    assert_eq!(ids(&aggregator(&backend, &stream, active).refresh().await), vec!["r1"]);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out() {
    let active = scope("o1", "p1");
    let backend = Arc::new(
        FakeBackend::new()
            .with_records(vec![record("r1", "x", &active)])
            .with_list_delay(Duration::from_secs(30)),
    );
    let stream = Arc::new(FakeInterruptStream::new());
    let aggregator = aggregator(&backend, &stream, active.clone()).with_settings(AggregatorSettings {
        request_timeout: Duration::from_millis(200),
        ..AggregatorSettings::default()
    });

    assert!(aggregator.refresh().await.is_empty());
    let err = aggregator
        .try_fetch_persisted(&ScopeHandle::fixed(active).snapshot())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Timeout { duration_ms: 200 }));
}

#[tokio::test]
async fn query_carries_active_scope() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new());
    let stream = Arc::new(FakeInterruptStream::new());

    aggregator(&backend, &stream, active.clone()).refresh().await;
    assert_eq!(backend.list_scopes(), vec![active]);
}

#[tokio::test]
async fn retired_items_stay_hidden_until_gone() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new().with_records(vec![
        record("r1", "x", &active),
        record("r2", "y", &active),
    ]));
    let stream = Arc::new(FakeInterruptStream::new());
    let aggregator = aggregator(&backend, &stream, active.clone());

    assert_eq!(aggregator.refresh().await.len(), 2);
    assert_eq!(aggregator.pending_count(), 2);

    aggregator.retire("r1");
    assert_eq!(ids(&aggregator.items()), vec!["r2"]);
    assert_eq!(aggregator.pending_count(), 1);

    // Backend has not caught up yet
    assert_eq!(ids(&aggregator.refresh().await), vec!["r2"]);
    assert!(aggregator.is_retired("r1"));

    // Once gone from both sources, the id is forgotten
    let approved = DecisionRecord::new("r1", "x", "approved").with_scope(&active);
    backend.persist_decision(&active, &approved).await.unwrap();
    aggregator.refresh().await;
    assert!(!aggregator.is_retired("r1"));
}

#[tokio::test]
async fn status_changes_are_reflected() {
    let active = scope("o1", "p1");
    let backend = Arc::new(FakeBackend::new().with_records(vec![record("r1", "x", &active)]));
    let stream = Arc::new(FakeInterruptStream::new());
    let aggregator = aggregator(&backend, &stream, active);
    aggregator.refresh().await;

    aggregator.status_changed("r1", ProposalStatus::Processing);
    assert_eq!(aggregator.get("r1").map(|i| i.status), Some(ProposalStatus::Processing));

    // In-flight status survives a refresh
    aggregator.refresh().await;
    assert_eq!(aggregator.get("r1").map(|i| i.status), Some(ProposalStatus::Processing));

    assert!(matches!(aggregator.require("nope"), Err(ReviewError::UnknownItem(_))));
}
