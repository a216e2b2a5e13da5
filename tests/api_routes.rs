//! Status API tests driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tower::ServiceExt;

use shipwatch::api::{create_app, ApiState};
use shipwatch::notify::AlertSink;
use shipwatch::pipeline::{AlertRelay, RefreshScheduler, SchedulerHandle, WatchState};
use shipwatch::types::{TrackedVessel, VesselSnapshot, Zone, ZoneCounts};
use shipwatch::{AlertEvent, Coordinate, DeliveryOutcome, ZoneRadii};

struct AlwaysDelivered;

#[async_trait]
impl AlertSink for AlwaysDelivered {
    async fn deliver(&self, _event: &AlertEvent) -> DeliveryOutcome {
        DeliveryOutcome::Delivered
    }
}

fn test_state(notifications: bool) -> (ApiState, SchedulerHandle) {
    let watch = Arc::new(RwLock::new(WatchState::new()));
    let (_scheduler, handle, _ticks) = RefreshScheduler::new(Duration::from_secs(10));
    let relay = AlertRelay::new(Arc::new(AlwaysDelivered), Arc::clone(&watch), notifications);
    let state = ApiState {
        watch,
        scheduler: handle.clone(),
        relay,
        observer: Coordinate::new(48.853229, 2.225328),
        radii: ZoneRadii::default(),
    };
    (state, handle)
}

async fn call(state: ApiState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn vessel(id: &str, distance: f64, zone: Zone) -> TrackedVessel {
    TrackedVessel::new(
        VesselSnapshot {
            track_id: id.to_string(),
            name: format!("VESSEL {id}"),
            position: Coordinate::new(48.86, 2.23),
            speed_knots: 0.2,
            course_degrees: 0.0,
            length_meters: 12.0,
            width_meters: 4.0,
            heading_degrees: None,
        },
        distance,
        zone,
    )
}

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state(true);
    let (status, body) = call(state, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert!(body["meta"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_vessels_lists_latest_batch() {
    let (state, _) = test_state(true);
    state.watch.write().await.apply_batch(
        1,
        vec![vessel("1", 1_234.0, Zone::Middle)],
        ZoneCounts { inner: 0, middle: 1, outer: 0, beyond: 0 },
        None,
        0,
        Utc::now(),
    );

    let (status, body) = call(state, "GET", "/api/v1/vessels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    let v = &body["data"]["vessels"][0];
    assert_eq!(v["trackId"], "1");
    assert_eq!(v["zone"], "middle");
    assert_eq!(v["distanceKm"], "1.23 km");
    assert_eq!(v["moving"], false);
}

#[tokio::test]
async fn test_status_reports_error_banner_and_scheduler() {
    let (state, _) = test_state(true);
    state
        .watch
        .write()
        .await
        .record_fetch_error(&shipwatch::FeedError::Timeout, Utc::now());

    let (status, body) = call(state, "GET", "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["lastError"], "feed request timed out");
    assert_eq!(data["fetchFailures"], 1);
    assert_eq!(data["scheduler"]["state"], "running");
    assert_eq!(data["scheduler"]["secondsUntilRefresh"], 10);
    assert_eq!(data["notificationsEnabled"], true);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (state, handle) = test_state(true);

    let (status, body) = call(state.clone(), "POST", "/api/v1/scheduler/pause").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "paused");
    assert_eq!(handle.state(), shipwatch::pipeline::SchedulerState::Paused);

    let (status, body) = call(state, "POST", "/api/v1/scheduler/resume").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "running");
}

#[tokio::test]
async fn test_retry_requeues_failed_deliveries() {
    let (state, _) = test_state(true);
    {
        let mut watch = state.watch.write().await;
        let event = AlertEvent::new("7", "X", 10.0, Utc::now());
        watch.record_delivery(&event, DeliveryOutcome::Failed);
    }

    let (status, body) = call(state.clone(), "POST", "/api/v1/alerts/retry").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["requeued"], 1);
    assert!(state.watch.read().await.failed_deliveries.is_empty());

    // the redelivery is tracked by the relay, not detached
    assert_eq!(
        state.relay.wait_for_deliveries().await,
        vec![DeliveryOutcome::Delivered]
    );
    assert_eq!(state.watch.read().await.deliveries.delivered, 1);
}

#[tokio::test]
async fn test_retry_conflicts_when_notifications_disabled() {
    let (state, _) = test_state(false);
    let (status, body) = call(state, "POST", "/api/v1/alerts/retry").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (state, _) = test_state(true);
    let response = create_app(state)
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
