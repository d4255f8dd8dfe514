//! Property tests for merging and the status lifecycle

use hitl_core::{
    live_items, merge_with, Decision, DecisionLifecycle, Interrupt, ActionRequest, ProposalItem,
    ProposalStatus, ScopeContext, ScopeHandle,
};
use hitl_test_utils::{http_error, record, FakeBackend, FakeInterruptStream};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

const TYPES: &[&str] = &["classify_intent", "select_standards", "generate_concept_brief"];

fn active() -> ScopeContext {
    ScopeContext::new(Some("o1"), Some("p1"))
}

fn identity_args() -> Vec<String> {
    vec!["trigger_id".to_string()]
}

/// (type index, optional trigger index)
fn request_strategy() -> impl Strategy<Value = (usize, Option<u8>)> {
    (0..TYPES.len(), prop::option::of(0u8..4))
}

fn live_from(interrupts: &[Vec<(usize, Option<u8>)>]) -> Vec<ProposalItem> {
    let interrupts: Vec<Interrupt> = interrupts
        .iter()
        .enumerate()
        .map(|(i, requests)| {
            Interrupt::new(
                format!("int-{i}"),
                requests
                    .iter()
                    .map(|(t, trigger)| {
                        let request = ActionRequest::new(TYPES[*t]);
                        match trigger {
                            Some(n) => request.with_arg("trigger_id", format!("t{n}")),
                            None => request,
                        }
                    })
                    .collect(),
            )
        })
        .collect();
    live_items(&interrupts, &active())
}

fn persisted_from(records: &[(u8, usize, Option<u8>)]) -> Vec<ProposalItem> {
    records
        .iter()
        .map(|(id, t, trigger)| {
            let mut r = record(&format!("r{id}"), TYPES[*t], &active());
            if let Some(n) = trigger {
                r.generation_inputs
                    .insert("trigger_id".into(), serde_json::Value::String(format!("t{n}")));
            }
            r.to_item(&active())
        })
        .collect()
}

proptest! {
    #[test]
    fn merged_ids_are_unique(
        interrupts in prop::collection::vec(prop::collection::vec(request_strategy(), 0..3), 0..4),
        records in prop::collection::vec((0u8..6, 0..TYPES.len(), prop::option::of(0u8..4)), 0..8),
    ) {
        let merged = merge_with(live_from(&interrupts), persisted_from(&records), &identity_args());
        let ids: HashSet<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        prop_assert_eq!(ids.len(), merged.len());
    }

    #[test]
    fn live_items_all_kept_in_order_and_first(
        interrupts in prop::collection::vec(prop::collection::vec(request_strategy(), 0..3), 0..4),
        records in prop::collection::vec((0u8..6, 0..TYPES.len(), prop::option::of(0u8..4)), 0..8),
    ) {
        let live = live_from(&interrupts);
        let merged = merge_with(live.clone(), persisted_from(&records), &identity_args());

        prop_assert!(merged.len() >= live.len());
        prop_assert_eq!(&merged[..live.len()], &live[..]);
    }

    #[test]
    fn no_persisted_item_shadows_live(
        interrupts in prop::collection::vec(prop::collection::vec(request_strategy(), 0..3), 0..4),
        records in prop::collection::vec((0u8..6, 0..TYPES.len(), prop::option::of(0u8..4)), 0..8),
    ) {
        let args = identity_args();
        let live = live_from(&interrupts);
        let live_keys: HashSet<_> = live.iter().map(|i| i.identity_key(&args)).collect();
        let merged = merge_with(live, persisted_from(&records), &args);

        for item in merged.iter().filter(|i| !i.is_live()) {
            prop_assert!(!live_keys.contains(&item.identity_key(&args)));
        }
    }
}

/// One attempt: `true` fails the apply
fn attempt_strategy() -> impl Strategy<Value = (bool, bool)> {
    // (fail, approve)
    (any::<bool>(), any::<bool>())
}

fn is_lifecycle_sequence(history: &[ProposalStatus], failures: usize) -> bool {
    use ProposalStatus::{Approved, Pending, Processing, Rejected};

    let Some((&first, rest)) = history.split_first() else {
        return false;
    };
    if first != Pending {
        return false;
    }
    let mut rollbacks = 0;
    let mut chunks = rest.chunks(2);
    while let Some(chunk) = chunks.next() {
        match chunk {
            [Processing, Pending] => rollbacks += 1,
            [Processing, Approved | Rejected] => return chunks.next().is_none() && rollbacks == failures,
            _ => return false,
        }
    }
    rollbacks == failures
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn status_history_follows_lifecycle(attempts in prop::collection::vec(attempt_strategy(), 1..6)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (history, failures, calls) = runtime.block_on(async {
            let backend = Arc::new(FakeBackend::new());
            let stream = Arc::new(FakeInterruptStream::new());
            let lifecycle = DecisionLifecycle::new(
                backend.clone(),
                stream,
                ScopeHandle::fixed(active()),
            );
            let item = record("x", "generate_concept_brief", &active()).to_item(&active());

            let mut failures = 0;
            for (fail, approve) in &attempts {
                if *fail {
                    backend.fail_next_apply(http_error(500, "boom"));
                }
                let decision = if *approve { Decision::approve() } else { Decision::reject() };
                match lifecycle.decide(&item, decision).await {
                    Ok(_) => break,
                    Err(_) => failures += 1,
                }
            }
            (lifecycle.history("x"), failures, backend.apply_calls())
        });

        prop_assert!(is_lifecycle_sequence(&history, failures), "history {:?}", history);
        prop_assert!(calls <= attempts.len());
    }
}

#[test]
fn sequence_checker() {
    use ProposalStatus::{Approved, Pending, Processing};
    assert!(is_lifecycle_sequence(&[Pending, Processing, Pending, Processing, Approved], 1));
    assert!(is_lifecycle_sequence(&[Pending, Processing, Pending], 1));
    assert!(!is_lifecycle_sequence(&[Pending, Approved], 0));
    assert!(!is_lifecycle_sequence(&[Pending, Processing, Approved, Processing], 0));
}
