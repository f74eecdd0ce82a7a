//! End-to-end handling against recording capabilities.

mod support;

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use support::{
    envelope, FakeIdentity, FakePublisher, FakeTrail, Harness, DENY_ALL, TOPIC_ARN, TRAIL_ARN,
};
use trailguard_core::{
    Action, Config, MalformedEventError, PublishError, RemediationStep, StepFailure,
};

#[tokio::test]
async fn stop_logging_reactivates_locks_down_and_notifies() {
    let harness = Harness::new();

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");

    assert_eq!(report.action, Action::NotifyAndRemediate);
    assert_eq!(harness.trail.calls(), vec![TRAIL_ARN.to_string()]);
    assert_eq!(
        harness.identity.calls(),
        vec![("alice".to_string(), DENY_ALL.to_string())]
    );

    let published = harness.publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].target, TOPIC_ARN);
    assert!(published[0].subject.contains("StopLogging"));
    assert!(published[0].subject.contains("Blocking user"));

    let outcome = report.remediation.expect("remediation");
    assert!(outcome.is_complete());
    assert!(report.notification.is_ok());
}

#[tokio::test]
async fn create_trail_only_notifies() {
    let harness = Harness::new();

    let report = harness
        .controller
        .handle(&envelope("CreateTrail"))
        .await
        .expect("report");

    assert_eq!(report.action, Action::NotifyOnly);
    assert!(report.remediation.is_none());
    assert!(harness.trail.calls().is_empty());
    assert!(harness.identity.calls().is_empty());

    let published = harness.publisher.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].subject.contains("CreateTrail received"));
    assert!(!published[0].subject.to_lowercase().contains("blocking"));
}

#[tokio::test]
async fn missing_event_name_calls_nothing() {
    let harness = Harness::new();
    let raw = json!({ "detail": { "eventSource": "cloudtrail.amazonaws.com" } });

    let err = harness.controller.handle(&raw).await.expect_err("malformed");

    assert_eq!(err, MalformedEventError::MissingField("detail.eventName"));
    assert_eq!(harness.external_calls(), 0);
}

#[tokio::test]
async fn unparsable_text_calls_nothing() {
    let harness = Harness::new();

    let err = harness
        .controller
        .handle_str("detail=StopLogging")
        .await
        .expect_err("malformed");

    assert!(matches!(err, MalformedEventError::InvalidJson(_)));
    assert_eq!(harness.external_calls(), 0);
}

#[tokio::test]
async fn missing_trail_still_locks_down() {
    let harness = Harness::new();
    let raw = json!({
        "detail": {
            "eventName": "StopLogging",
            "eventSource": "cloudtrail.amazonaws.com",
            "userIdentity": { "userName": "alice" }
        }
    });

    let report = harness.controller.handle(&raw).await.expect("report");
    let outcome = report.remediation.expect("remediation");

    assert!(!outcome.reactivation_attempted);
    assert_eq!(
        outcome.error_for(RemediationStep::Reactivate),
        Some(&StepFailure::MissingResourceIdentifier)
    );
    assert!(outcome.lockdown_attempted);
    assert!(outcome.lockdown_succeeded);
    assert!(harness.trail.calls().is_empty());
    assert_eq!(harness.identity.calls().len(), 1);
    assert_eq!(harness.publisher.published().len(), 1);
}

#[tokio::test]
async fn missing_identity_still_reactivates() {
    let harness = Harness::new();
    let raw = json!({
        "detail": {
            "eventName": "StopLogging",
            "eventSource": "cloudtrail.amazonaws.com",
            "requestParameters": { "name": TRAIL_ARN },
            "userIdentity": { "type": "Root" }
        }
    });

    let report = harness.controller.handle(&raw).await.expect("report");
    let outcome = report.remediation.expect("remediation");

    assert!(outcome.reactivation_succeeded);
    assert!(!outcome.lockdown_attempted);
    assert_eq!(
        outcome.error_for(RemediationStep::Lockdown),
        Some(&StepFailure::MissingIdentityIdentifier)
    );
    assert!(harness.publisher.published()[0].subject.contains("unknown"));
}

#[tokio::test]
async fn publish_failure_does_not_affect_remediation() {
    let harness = Harness::with(
        FakeTrail::default(),
        FakeIdentity::default(),
        FakePublisher::failing("AuthorizationError"),
    );

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");

    assert!(matches!(report.notification, Err(PublishError::Capability(_))));
    let outcome = report.remediation.expect("remediation");
    assert!(outcome.is_complete());
    assert!(harness.trail.is_logging(TRAIL_ARN));
    assert_eq!(harness.identity.attached_count(), 1);
}

#[tokio::test]
async fn trail_failure_does_not_block_lockdown_or_notification() {
    let harness = Harness::with(
        FakeTrail::failing("TrailNotFoundException"),
        FakeIdentity::default(),
        FakePublisher::default(),
    );

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");
    let outcome = report.remediation.expect("remediation");

    assert!(outcome.reactivation_attempted);
    assert!(!outcome.reactivation_succeeded);
    assert!(outcome.lockdown_succeeded);
    assert_eq!(outcome.errors.len(), 1);
    assert!(report.notification.is_ok());
}

#[tokio::test]
async fn lockdown_failure_is_recorded() {
    let harness = Harness::with(
        FakeTrail::default(),
        FakeIdentity::failing("NoSuchEntity"),
        FakePublisher::default(),
    );

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");
    let outcome = report.remediation.expect("remediation");

    assert!(outcome.reactivation_succeeded);
    assert!(outcome.lockdown_attempted);
    assert!(!outcome.lockdown_succeeded);
    assert!(matches!(
        outcome.error_for(RemediationStep::Lockdown),
        Some(StepFailure::Call(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_trail_call_times_out() {
    let mut config = Config::with_target(TOPIC_ARN);
    config.timeouts.call_timeout_ms = 100;
    let harness = Harness::with_config(
        &config,
        FakeTrail::slow(Duration::from_secs(30)),
        FakeIdentity::default(),
        FakePublisher::default(),
    );

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");
    let outcome = report.remediation.expect("remediation");

    match outcome.error_for(RemediationStep::Reactivate) {
        Some(StepFailure::Call(err)) => assert!(err.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(outcome.lockdown_succeeded);
}

#[tokio::test]
async fn redelivered_stop_logging_is_benign() {
    let harness = Harness::new();
    let raw = envelope("StopLogging");

    let first = harness.controller.handle(&raw).await.expect("first");
    let second = harness.controller.handle(&raw).await.expect("second");

    for report in [&first, &second] {
        let outcome = report.remediation.as_ref().expect("remediation");
        assert!(outcome.is_complete());
        assert!(outcome.errors.is_empty());
    }
    assert_eq!(harness.publisher.published().len(), 2);
    assert_eq!(harness.trail.calls().len(), 2);
    assert_eq!(harness.identity.attached_count(), 1);
}

#[tokio::test]
async fn every_normalized_event_is_notified_once() {
    let harness = Harness::new();
    let names = [
        "StopLogging",
        "DeleteTrail",
        "UpdateTrail",
        "RemoveTags",
        "AddTags",
        "CreateTrail",
        "StartLogging",
        "PutEventSelectors",
        "ConsoleLogin",
    ];

    for name in names {
        let report = harness.controller.handle(&envelope(name)).await.expect("report");
        assert_eq!(report.remediation.is_some(), name == "StopLogging", "{name}");
    }

    assert_eq!(harness.publisher.published().len(), names.len());
    assert_eq!(harness.trail.calls().len(), 1);
}

#[tokio::test]
async fn configured_table_extends_remediated_events() {
    let config = Config::from_toml(&format!(
        r#"
        [notification]
        target_arn = "{TOPIC_ARN}"

        [classification.actions]
        DeleteTrail = "notify_and_remediate"
        "#
    ))
    .expect("config");
    let harness = Harness::with_config(
        &config,
        FakeTrail::default(),
        FakeIdentity::default(),
        FakePublisher::default(),
    );

    let report = harness
        .controller
        .handle(&envelope("DeleteTrail"))
        .await
        .expect("report");

    assert_eq!(report.action, Action::NotifyAndRemediate);
    assert_eq!(harness.identity.calls().len(), 1);
}

#[tokio::test]
async fn foreign_event_source_is_not_remediated() {
    let config = Config::from_toml(&format!(
        r#"
        [notification]
        target_arn = "{TOPIC_ARN}"

        [classification]
        event_sources = ["cloudtrail.amazonaws.com"]
        "#
    ))
    .expect("config");
    let harness = Harness::with_config(
        &config,
        FakeTrail::default(),
        FakeIdentity::default(),
        FakePublisher::default(),
    );
    let mut raw = envelope("StopLogging");
    raw["detail"]["eventSource"] = Value::String("example.amazonaws.com".to_string());

    let report = harness.controller.handle(&raw).await.expect("report");

    assert_eq!(report.action, Action::NotifyOnly);
    assert!(harness.trail.calls().is_empty());
    assert_eq!(harness.journal(), vec!["Publish"]);
}

#[tokio::test]
async fn stop_logging_is_remediated_whatever_its_source_by_default() {
    let harness = Harness::new();
    let mut raw = envelope("StopLogging");
    raw["detail"]["eventSource"] = Value::String(String::new());

    let report = harness.controller.handle(&raw).await.expect("report");

    assert_eq!(report.action, Action::NotifyAndRemediate);
    assert_eq!(harness.trail.calls(), vec![TRAIL_ARN.to_string()]);
    assert_eq!(harness.identity.attached_count(), 1);
}

#[tokio::test]
async fn notification_precedes_remediation() {
    let harness = Harness::new();

    harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");

    assert_eq!(
        harness.journal(),
        vec!["Publish", "StartLogging", "AttachUserPolicy"]
    );
}

#[tokio::test]
async fn notification_precedes_remediation_when_publish_fails() {
    let harness = Harness::with(
        FakeTrail::default(),
        FakeIdentity::default(),
        FakePublisher::failing("AuthorizationError"),
    );

    let report = harness
        .controller
        .handle(&envelope("StopLogging"))
        .await
        .expect("report");

    assert!(!report.notified());
    assert_eq!(
        harness.journal(),
        vec!["Publish", "StartLogging", "AttachUserPolicy"]
    );
}

#[tokio::test]
async fn concurrent_invocations_share_one_controller() {
    let harness = Arc::new(Harness::new());

    let mut handles = Vec::new();
    for idx in 0..8 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            let name = if idx % 2 == 0 { "StopLogging" } else { "UpdateTrail" };
            let raw = envelope(name);
            harness.controller.handle(&raw).await.map(|report| report.action)
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("report");
    }

    assert_eq!(harness.publisher.published().len(), 8);
    assert_eq!(harness.trail.calls().len(), 4);
}
