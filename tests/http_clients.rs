//! Feed and push gateway clients against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shipwatch::acquisition::{FeedError, HttpVesselFeed, VesselFeed};
use shipwatch::config::FeedConfig;
use shipwatch::geodesy::bounding_box;
use shipwatch::notify::{
    HttpPushTransport, NotificationDispatcher, PushTransport, RetryPolicy, TransportError,
};
use shipwatch::{AlertEvent, Coordinate, DeliveryOutcome, ZoneCounts};

fn feed_config(server: &MockServer, timeout_ms: u64) -> FeedConfig {
    FeedConfig {
        ships_url: format!("{}/ships", server.uri()),
        timeout_ms,
        ..FeedConfig::default()
    }
}

/// Retry ladder shrunk to milliseconds so tests run in real time.
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(500),
        server_error_backoff: Duration::from_millis(10),
        client_error_backoff: Duration::from_millis(20),
    }
}

fn bodies(requests: &[wiremock::Request]) -> Vec<Value> {
    requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ============================================================================
// Vessel feed
// ============================================================================

#[tokio::test]
async fn test_feed_fetches_ships_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ships"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "total": 2,
            "zones": {"zone1km": 1, "zone2km": 0, "zone3km": 0, "beyond3km": 1},
            "ships": [
                {"trackId": "1", "latitude": 48.85, "longitude": 2.22},
                {"trackId": "2", "latitude": 48.95, "longitude": 2.30}
            ]
        })))
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 2_000), None).unwrap();
    let batch = feed.fetch().await.unwrap();

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.reported_total, Some(2));
    assert_eq!(
        batch.zone_counts,
        Some(ZoneCounts { inner: 1, middle: 0, outer: 0, beyond: 1 })
    );
}

#[tokio::test]
async fn test_feed_sends_bbox_when_configured() {
    let server = MockServer::start().await;
    let bbox = bounding_box(Coordinate::new(48.853229, 2.225328), 3_000.0);
    Mock::given(method("GET"))
        .and(path("/ships"))
        .and(query_param("bbox", bbox.to_query_value().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 2_000), Some(bbox)).unwrap();
    let batch = feed.fetch().await.unwrap();
    assert!(batch.records.is_empty());
}

#[tokio::test]
async fn test_feed_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 2_000), None).unwrap();
    assert_eq!(feed.fetch().await.unwrap_err(), FeedError::Status(503));
}

#[tokio::test]
async fn test_feed_success_false_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "ships": []})),
        )
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 2_000), None).unwrap();
    assert_eq!(feed.fetch().await.unwrap_err(), FeedError::Rejected);
}

#[tokio::test]
async fn test_feed_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 200), None).unwrap();
    assert_eq!(feed.fetch().await.unwrap_err(), FeedError::Timeout);
}

#[tokio::test]
async fn test_feed_health_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let feed = HttpVesselFeed::new(&feed_config(&server, 2_000), None).unwrap();
    let url = feed.health_url().unwrap();
    let body = feed.check_health(&url).await.unwrap();
    assert_eq!(body["status"], "ok");
}

// ============================================================================
// Push gateway
// ============================================================================

#[tokio::test]
async fn test_transport_maps_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = HttpPushTransport::new(&server.uri()).unwrap();
    assert_eq!(transport.post("/ok", &json!({})).await, Ok(()));
    assert_eq!(
        transport.post("/broken", &json!({})).await,
        Err(TransportError::Status(500))
    );
}

#[tokio::test]
async fn test_transport_unreachable_is_network_error() {
    // nothing listens on port 9 of localhost
    let transport = HttpPushTransport::new("http://127.0.0.1:9").unwrap();
    assert!(matches!(
        transport.post("/alert", &json!({})).await,
        Err(TransportError::Network(_))
    ));
}

#[tokio::test]
async fn test_dispatcher_retries_server_errors_then_delivers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alert"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alert"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(2)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpPushTransport::new(&server.uri()).unwrap());
    let dispatcher =
        NotificationDispatcher::new(transport, fast_policy(), "/alert", Some("tok-1".to_string()));
    let event = AlertEvent::new("227", "PENICHE", 640.0, chrono::Utc::now());

    let report = dispatcher.deliver_with_report(&event).await;
    assert_eq!(report.outcome, DeliveryOutcome::Delivered);
    assert_eq!(report.attempts, 3);
    assert_eq!(
        report.waits,
        vec![Duration::from_millis(10), Duration::from_millis(20)]
    );

    let requests = server.received_requests().await.unwrap();
    let sent = bodies(&requests);
    assert_eq!(sent.len(), 3);
    for body in &sent {
        assert_eq!(body["id"], json!(event.id.to_string()));
        assert_eq!(body["trackId"], "227");
        assert_eq!(body["name"], "PENICHE");
        assert_eq!(body["token"], "tok-1");
    }
}

#[tokio::test]
async fn test_dispatcher_gives_up_on_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(3)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpPushTransport::new(&server.uri()).unwrap());
    let dispatcher = NotificationDispatcher::new(transport, fast_policy(), "/alert", None);
    let event = AlertEvent::new("9", "X", 10.0, chrono::Utc::now());

    let report = dispatcher.deliver_with_report(&event).await;
    assert_eq!(report.outcome, DeliveryOutcome::Failed);
    assert_eq!(
        report.waits,
        vec![Duration::from_millis(20), Duration::from_millis(40)]
    );
}

#[tokio::test]
async fn test_token_registration_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/unregister-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpPushTransport::new(&server.uri()).unwrap());
    let dispatcher = NotificationDispatcher::new(transport, fast_policy(), "/alert", None);

    assert_eq!(dispatcher.register_token("abc").await.outcome, DeliveryOutcome::Delivered);
    // registering the same token again is accepted
    assert_eq!(dispatcher.register_token("abc").await.outcome, DeliveryOutcome::Delivered);
    assert_eq!(dispatcher.local_token().await.as_deref(), Some("abc"));

    assert_eq!(dispatcher.unregister_token("abc").await.outcome, DeliveryOutcome::Delivered);
    assert_eq!(dispatcher.local_token().await, None);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(bodies(&requests)[0], json!({"token": "abc"}));
}
