//! Integration tests for the worker's HTTP surface.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::TimeDelta;
use common::{AggregateId, Clock, ManualClock, UserId};
use delivery::{
    HealthCheckOptions, InMemoryNotificationInbox, Notification, NotificationInbox,
    NotificationKind,
};
use metrics_exporter_prometheus::PrometheusHandle;
use outbox_store::{InMemoryOutboxStore, OutboxId, OutboxRecord, OutboxStore, OutboxStoreExt};
use tower::ServiceExt;
use worker::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn health_options() -> HealthCheckOptions {
    HealthCheckOptions {
        max_dead_letters: 1,
        max_oldest_pending_age: Duration::from_secs(15 * 60),
    }
}

fn setup() -> (axum::Router, InMemoryOutboxStore, ManualClock) {
    let (app, store, clock, _inbox) = setup_with_inbox();
    (app, store, clock)
}

fn setup_with_inbox() -> (
    axum::Router,
    InMemoryOutboxStore,
    ManualClock,
    InMemoryNotificationInbox,
) {
    let store = InMemoryOutboxStore::new();
    let clock = ManualClock::starting_now();
    let inbox = InMemoryNotificationInbox::new();
    let state = Arc::new(AppState::new(
        store.clone(),
        Arc::new(clock.clone()),
        health_options(),
        inbox.clone(),
    ));
    let app = worker::create_app(state, get_metrics_handle());
    (app, store, clock, inbox)
}

async fn dead_letter(store: &InMemoryOutboxStore, clock: &ManualClock) {
    let mut record = OutboxRecord::new("mission.renamed", "{}", clock.now());
    store.insert_one(record.clone()).await.unwrap();
    record.record_failure("subscriber: boom");
    record.mark_dead_lettered(clock.now());
    store.save_outcomes(&[record]).await.unwrap();
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check_on_empty_outbox() {
    let (app, _store, _clock) = setup();

    let (status, json) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Healthy");
    assert_eq!(json["dead_letter_count"], 0);
    assert_eq!(json["oldest_pending_age_secs"], 0);
}

#[tokio::test]
async fn test_degraded_outbox_stays_ok() {
    let (app, store, clock) = setup();
    store
        .insert_one(OutboxRecord::new("mission.created", "{}", clock.now()))
        .await
        .unwrap();
    clock.advance(TimeDelta::minutes(20));

    let (status, json) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Degraded");
    assert_eq!(json["oldest_pending_age_secs"], 1200);
}

#[tokio::test]
async fn test_unhealthy_outbox_returns_503() {
    let (app, store, clock) = setup();
    dead_letter(&store, &clock).await;
    dead_letter(&store, &clock).await;

    let (status, json) = get(app, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "Unhealthy");
    assert_eq!(json["dead_letter_count"], 2);
}

#[tokio::test]
async fn test_list_dead_letters() {
    let (app, store, clock) = setup();
    dead_letter(&store, &clock).await;
    store
        .insert_one(OutboxRecord::new("mission.created", "{}", clock.now()))
        .await
        .unwrap();

    let (status, json) = get(app, "/dead-letters?limit=10").await;

    assert_eq!(status, StatusCode::OK);
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["retry_count"], 1);
    assert_eq!(records[0]["last_error"], "subscriber: boom");
}

#[tokio::test]
async fn test_dead_letters_rejects_zero_limit() {
    let (app, _store, _clock) = setup();

    let (status, json) = get(app, "/dead-letters?limit=0").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "limit must be positive");
}

#[tokio::test]
async fn test_list_notifications_for_user() {
    let (app, _store, clock, inbox) = setup_with_inbox();
    let alice = UserId::new();
    let bob = UserId::new();
    let mission_id = AggregateId::new();
    for (recipient, kind) in [
        (alice, NotificationKind::AddedToMission),
        (bob, NotificationKind::AddedToMission),
        (alice, NotificationKind::RemovedFromMission),
    ] {
        inbox
            .deliver(Notification {
                source_record: OutboxId::new(),
                recipient,
                kind,
                mission_id,
                created_at: clock.now(),
            })
            .await
            .unwrap();
    }

    let (status, json) = get(app.clone(), &format!("/notifications/{alice}")).await;
    assert_eq!(status, StatusCode::OK);
    let notifications = json.as_array().unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0]["kind"], "AddedToMission");
    assert_eq!(notifications[1]["kind"], "RemovedFromMission");
    assert_eq!(notifications[1]["mission_id"], mission_id.to_string());

    let (status, json) = get(app, &format!("/notifications/{}", UserId::new())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, store, clock) = setup();
    dead_letter(&store, &clock).await;

    // Running the health check publishes the outbox gauges
    let (status, _) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("outbox_dead_letters"));
}

#[test]
fn test_default_registry_covers_every_event_type() {
    let (registry, _inbox) = worker::default_registry();
    for event_type in domain::EventType::ALL {
        assert!(!registry.subscribers_for(event_type).is_empty());
    }
    assert_eq!(
        registry
            .subscribers_for(domain::EventType::CollaboratorAdded)
            .len(),
        2
    );
}
