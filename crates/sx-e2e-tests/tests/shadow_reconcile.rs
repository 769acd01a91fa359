//! End-to-end tests for the shadow reconciliation cycle:
//! get|delta → reconcile → apply → report.

mod helpers;

use helpers::{THING, TestHarness};
use serde_json::json;

#[tokio::test]
async fn e2e_get_to_apply_convergence() {
    let harness = TestHarness::new();
    harness.seed(json!({"temperature": 22.5}));
    let dispatcher = harness.dispatcher(false);

    // Session asks for the document.
    harness.shadow().publish_get().await.unwrap();
    assert_eq!(
        harness.mqtt.last_published().unwrap().topic,
        format!("$aws/things/{THING}/shadow/get")
    );

    // Cloud answers with a diverging desired section.
    let doc = json!({
        "state": {
            "desired": {"temperature": 30},
            "reported": {"temperature": 22.5}
        },
        "version": 12,
        "timestamp": 1700000000
    });
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/get/accepted"),
            &serde_json::to_vec(&doc).unwrap(),
        ))
        .await;

    // Divergence is surfaced, not auto-applied.
    let diff = harness.cache.pending_diff().expect("diff surfaced");
    assert_eq!(diff.get("temperature").unwrap().local, Some(json!(22.5)));
    assert_eq!(diff.get("temperature").unwrap().desired, json!(30));

    // Operator confirms.
    let updated = dispatcher.apply_pending().await.unwrap().unwrap();
    assert_eq!(updated.get("temperature"), Some(&json!(30)));
    assert_eq!(
        harness.store.load().unwrap().get("temperature"),
        Some(&json!(30))
    );

    // Exactly one report, carrying the converged value.
    let reports = harness.mqtt.published_to(&harness.update_topic());
    assert_eq!(reports.len(), 1);
    let payload: serde_json::Value = serde_json::from_slice(&reports[0].payload).unwrap();
    assert_eq!(payload["state"]["reported"]["temperature"], 30);

    // The broker acknowledges; the cycle is closed, nothing more happens.
    let ack = json!({"state": {"reported": {"temperature": 30}}, "version": 13, "timestamp": 0});
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/update/accepted"),
            &serde_json::to_vec(&ack).unwrap(),
        ))
        .await;
    assert_eq!(harness.mqtt.published_to(&harness.update_topic()).len(), 1);
}

#[tokio::test]
async fn e2e_desired_subset_of_local_is_a_noop() {
    let harness = TestHarness::new();
    harness.seed(json!({"temperature": 22.5, "power": "on"}));
    let dispatcher = harness.dispatcher(true);

    let doc = json!({
        "state": {"desired": {"power": "on"}},
        "version": 3,
        "timestamp": 0
    });
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/get/accepted"),
            &serde_json::to_vec(&doc).unwrap(),
        ))
        .await;

    // Converged already: no report, state untouched.
    assert!(harness.mqtt.published().is_empty());
    assert_eq!(
        harness.store.load().unwrap().get("temperature"),
        Some(&json!(22.5))
    );
    assert!(harness.cache.pending_diff().is_none());
}

#[tokio::test]
async fn e2e_type_drift_appears_in_diff() {
    let harness = TestHarness::new();
    harness.seed(json!({"level": 15}));
    let dispatcher = harness.dispatcher(false);

    let delta = json!({"state": {"level": "15"}, "version": 4, "timestamp": 0});
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/update/delta"),
            &serde_json::to_vec(&delta).unwrap(),
        ))
        .await;

    let diff = harness.cache.pending_diff().expect("type drift is a diff");
    let mismatch = diff.get("level").unwrap();
    assert_eq!(mismatch.local, Some(json!(15)));
    assert_eq!(mismatch.desired, json!("15"));
}

#[tokio::test]
async fn e2e_reentrant_delta_supersedes_pending_diff() {
    let harness = TestHarness::new();
    harness.seed(json!({"temperature": 22.5}));
    let dispatcher = harness.dispatcher(false);

    let first = json!({"state": {"temperature": 30}, "version": 5, "timestamp": 0});
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/update/delta"),
            &serde_json::to_vec(&first).unwrap(),
        ))
        .await;

    // A third party changes desired again before the operator applies.
    let second = json!({"state": {"temperature": 28}, "version": 6, "timestamp": 0});
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/update/delta"),
            &serde_json::to_vec(&second).unwrap(),
        ))
        .await;

    let updated = dispatcher.apply_pending().await.unwrap().unwrap();
    assert_eq!(updated.get("temperature"), Some(&json!(28)));
    assert_eq!(harness.mqtt.published_to(&harness.update_topic()).len(), 1);
}

#[tokio::test]
async fn e2e_bootstrap_creates_shadow_from_seed_state() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(false);

    // No shadow yet — the broker rejects the get with 404.
    dispatcher
        .handle_event(TestHarness::message(
            &format!("$aws/things/{THING}/shadow/get/rejected"),
            br#"{"code":404,"message":"No shadow exists with name: lamp-01","timestamp":1700000000}"#,
        ))
        .await;

    // Seed state persisted locally and reported, creating the shadow.
    let state = harness.store.load().expect("bootstrap state persisted");
    assert!(state.get("power").is_some());
    assert!(state.last_updated.is_some());

    let reports = harness.mqtt.published_to(&harness.update_topic());
    assert_eq!(reports.len(), 1);
    let payload: serde_json::Value = serde_json::from_slice(&reports[0].payload).unwrap();
    assert_eq!(
        payload["state"]["reported"]["power"],
        *state.get("power").unwrap()
    );
}
