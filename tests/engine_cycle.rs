//! Engine cycle tests against an in-memory feed and a recording sink.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use shipwatch::acquisition::{FeedBatch, FeedError, VesselFeed};
use shipwatch::notify::AlertSink;
use shipwatch::pipeline::{
    CycleReport, MonitoringEngine, RefreshScheduler, RefreshTick, SchedulerState, WatchState,
};
use shipwatch::tracking::AlertTracker;
use shipwatch::{AlertEvent, Coordinate, DeliveryOutcome, ZoneRadii};

const BASE: Coordinate = Coordinate::new(48.853229, 2.225328);
const M_PER_DEG_LAT: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

// ============================================================================
// Fakes
// ============================================================================

struct Reply {
    delay: Duration,
    result: Result<FeedBatch, FeedError>,
}

/// Plays queued replies in call order; an empty queue is a network error.
#[derive(Default)]
struct ScriptedFeed {
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedFeed {
    fn push(&self, result: Result<FeedBatch, FeedError>) {
        self.push_delayed(Duration::ZERO, result);
    }

    fn push_delayed(&self, delay: Duration, result: Result<FeedBatch, FeedError>) {
        self.replies.lock().unwrap().push_back(Reply { delay, result });
    }
}

#[async_trait]
impl VesselFeed for ScriptedFeed {
    async fn fetch(&self) -> Result<FeedBatch, FeedError> {
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply { delay, result }) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(FeedError::Network("script exhausted".to_string())),
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// Records every event it is handed and answers with a fixed outcome.
struct RecordingSink {
    outcome: Mutex<DeliveryOutcome>,
    seen: Mutex<Vec<AlertEvent>>,
}

impl RecordingSink {
    fn new(outcome: DeliveryOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn set_outcome(&self, outcome: DeliveryOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    fn track_ids(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.track_id.clone())
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, event: &AlertEvent) -> DeliveryOutcome {
        self.seen.lock().unwrap().push(event.clone());
        *self.outcome.lock().unwrap()
    }
}

/// Takes an hour to answer every delivery.
#[derive(Default)]
struct HangingSink {
    calls: AtomicUsize,
}

#[async_trait]
impl AlertSink for HangingSink {
    async fn deliver(&self, _event: &AlertEvent) -> DeliveryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        DeliveryOutcome::Delivered
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Upstream record for a vessel due north of the observer.
fn record(id: &str, meters: f64) -> Value {
    json!({
        "trackId": id,
        "name": format!("VESSEL {id}"),
        "latitude": BASE.latitude + meters / M_PER_DEG_LAT,
        "longitude": BASE.longitude,
        "speed": 4.2,
        "course": 90.0,
        "length": 30,
        "width": 6
    })
}

fn batch(records: Vec<Value>) -> Result<FeedBatch, FeedError> {
    Ok(FeedBatch::from_records(records))
}

struct Harness {
    feed: Arc<ScriptedFeed>,
    sink: Arc<RecordingSink>,
    state: Arc<RwLock<WatchState>>,
    engine: MonitoringEngine,
}

fn harness(outcome: DeliveryOutcome) -> Harness {
    let feed = Arc::new(ScriptedFeed::default());
    let sink = RecordingSink::new(outcome);
    let state = Arc::new(RwLock::new(WatchState::new()));
    let engine = MonitoringEngine::new(
        AlertTracker::new(BASE, ZoneRadii::default()),
        feed.clone(),
        sink.clone(),
        Arc::clone(&state),
    );
    Harness {
        feed,
        sink,
        state,
        engine,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_inner_entry_is_delivered_once() {
    let mut h = harness(DeliveryOutcome::Delivered);
    h.feed.push(batch(vec![record("a", 400.0), record("b", 2_500.0)]));
    h.feed.push(batch(vec![record("a", 300.0), record("b", 2_400.0)]));

    let first = h.engine.run_once().await;
    let second = h.engine.run_once().await;
    h.engine.wait_for_deliveries().await;

    match first {
        CycleReport::Applied { vessels, events, .. } => {
            assert_eq!(vessels, 2);
            assert_eq!(events.len(), 1);
        }
        other => panic!("unexpected report: {other:?}"),
    }
    match second {
        CycleReport::Applied { events, .. } => assert!(events.is_empty()),
        other => panic!("unexpected report: {other:?}"),
    }

    assert_eq!(h.sink.track_ids(), vec!["a"]);
    let state = h.state.read().await;
    assert_eq!(state.deliveries.delivered, 1);
    assert_eq!(state.recent_alerts.len(), 1);
    assert_eq!(state.zone_counts.inner, 1);
    assert_eq!(state.zone_counts.outer, 1);
}

#[tokio::test]
async fn test_feed_failure_keeps_previous_vessels_and_flags() {
    let mut h = harness(DeliveryOutcome::Delivered);
    h.feed.push(batch(vec![record("a", 400.0)]));
    h.feed.push(Err(FeedError::Status(502)));
    h.feed.push(batch(vec![record("a", 350.0)]));

    h.engine.run_once().await;
    let failed = h.engine.run_once().await;
    assert!(matches!(
        failed,
        CycleReport::FeedFailed { error: FeedError::Status(502), .. }
    ));

    {
        let state = h.state.read().await;
        assert_eq!(state.vessels.len(), 1, "stale vessels stay visible");
        assert_eq!(state.last_error.as_deref(), Some("feed returned HTTP 502"));
        assert_eq!(state.fetch_failures, 1);
    }
    assert!(h.engine.alert_state()["a"].currently_alerted);

    // Still inside after the outage: no second alert, banner cleared
    h.engine.run_once().await;
    h.engine.wait_for_deliveries().await;
    assert_eq!(h.sink.track_ids(), vec!["a"]);
    assert!(h.state.read().await.last_error.is_none());
}

#[tokio::test]
async fn test_stale_generation_is_discarded() {
    let mut h = harness(DeliveryOutcome::Delivered);

    let newer = h.engine.apply_fetch(2, batch(vec![record("new", 5_000.0)])).await;
    assert!(matches!(newer, CycleReport::Applied { generation: 2, .. }));

    let older = h.engine.apply_fetch(1, batch(vec![record("old", 100.0)])).await;
    assert_eq!(older, CycleReport::Stale { generation: 1, applied: 2 });

    let state = h.state.read().await;
    assert_eq!(state.vessels.len(), 1);
    assert_eq!(state.vessels[0].snapshot.track_id, "new");
    assert_eq!(state.stale_discarded, 1);
    assert!(h.sink.track_ids().is_empty());
}

#[tokio::test]
async fn test_vessel_that_disappears_alerts_again_on_return() {
    let mut h = harness(DeliveryOutcome::Delivered);
    h.feed.push(batch(vec![record("a", 200.0)]));
    h.feed.push(batch(vec![]));
    h.feed.push(batch(vec![record("a", 200.0)]));

    for _ in 0..3 {
        h.engine.run_once().await;
    }
    h.engine.wait_for_deliveries().await;

    assert_eq!(h.sink.track_ids(), vec!["a", "a"]);
}

#[tokio::test]
async fn test_invalid_records_are_skipped() {
    let mut h = harness(DeliveryOutcome::Delivered);
    h.feed.push(batch(vec![
        record("ok", 1_500.0),
        json!({"name": "NO ID", "latitude": 48.8, "longitude": 2.2}),
        json!({"trackId": "no-pos"}),
        json!({"trackId": "bad", "latitude": 123.0, "longitude": 2.2}),
    ]));

    let report = h.engine.run_once().await;
    assert!(matches!(
        report,
        CycleReport::Applied { vessels: 1, rejected: 3, .. }
    ));
    assert_eq!(h.state.read().await.records_rejected, 3);
}

#[tokio::test]
async fn test_notifications_disabled_records_without_sending() {
    let mut h = harness(DeliveryOutcome::Delivered);
    h.engine = h.engine.with_notifications(false);
    h.feed.push(batch(vec![record("a", 100.0)]));

    h.engine.run_once().await;
    h.engine.wait_for_deliveries().await;

    assert!(h.sink.track_ids().is_empty());
    let state = h.state.read().await;
    assert_eq!(state.recent_alerts.len(), 1);
    assert_eq!(state.deliveries.delivered, 0);
}

#[tokio::test]
async fn test_failed_deliveries_can_be_retried() {
    let mut h = harness(DeliveryOutcome::Failed);
    h.feed.push(batch(vec![record("a", 100.0), record("b", 150.0)]));

    h.engine.run_once().await;
    h.engine.wait_for_deliveries().await;
    assert_eq!(h.state.read().await.failed_deliveries.len(), 2);

    h.sink.set_outcome(DeliveryOutcome::Delivered);
    let requeued = h.engine.retry_failed_deliveries().await;
    assert_eq!(requeued, 2);
    h.engine.wait_for_deliveries().await;

    let state = h.state.read().await;
    assert!(state.failed_deliveries.is_empty());
    assert_eq!(state.deliveries.failed, 2);
    assert_eq!(state.deliveries.delivered, 2);

    // same events (same ids) went out again
    let seen = h.sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    let mut first: Vec<_> = seen[..2].iter().map(|e| e.id).collect();
    let mut again: Vec<_> = seen[2..].iter().map(|e| e.id).collect();
    first.sort();
    again.sort();
    assert_eq!(first, again);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_discards_slow_older_fetch() {
    let h = harness(DeliveryOutcome::Delivered);
    // gen 1 is slow and would place "slow" in the inner zone
    h.feed
        .push_delayed(Duration::from_secs(5), batch(vec![record("slow", 100.0)]));
    h.feed.push(batch(vec![record("fast", 2_500.0)]));

    let (tick_tx, tick_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let run = tokio::spawn(h.engine.run(tick_rx, cancel.clone()));

    tick_tx.send(RefreshTick { generation: 1 }).await.unwrap();
    tick_tx.send(RefreshTick { generation: 2 }).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    cancel.cancel();
    run.await.unwrap();

    let state = h.state.read().await;
    assert_eq!(state.applied_generation, 2);
    assert_eq!(state.stale_discarded, 1);
    assert_eq!(state.vessels.len(), 1);
    assert_eq!(state.vessels[0].snapshot.track_id, "fast");
    assert!(h.sink.track_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_drains_when_ticks_close() {
    let h = harness(DeliveryOutcome::Delivered);
    h.feed
        .push_delayed(Duration::from_secs(2), batch(vec![record("a", 1_500.0)]));

    let (tick_tx, tick_rx) = mpsc::channel(8);
    let run = tokio::spawn(h.engine.run(tick_rx, CancellationToken::new()));

    tick_tx.send(RefreshTick { generation: 1 }).await.unwrap();
    drop(tick_tx);

    tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.state.read().await.applied_generation, 1);
}

#[tokio::test]
async fn test_local_only_deliveries_are_retried() {
    let mut h = harness(DeliveryOutcome::DeliveredLocalOnly);
    h.feed.push(batch(vec![record("a", 100.0)]));

    h.engine.run_once().await;
    h.engine.wait_for_deliveries().await;
    {
        let state = h.state.read().await;
        assert_eq!(state.deliveries.delivered_local_only, 1);
        assert_eq!(state.failed_deliveries.len(), 1);
    }

    h.sink.set_outcome(DeliveryOutcome::Delivered);
    assert_eq!(h.engine.retry_failed_deliveries().await, 1);
    assert_eq!(h.engine.wait_for_deliveries().await, vec![DeliveryOutcome::Delivered]);

    let state = h.state.read().await;
    assert!(state.failed_deliveries.is_empty());
    assert_eq!(state.deliveries.delivered, 1);
    assert_eq!(h.sink.track_ids(), vec!["a", "a"]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_hanging_delivery_do_not_stall_cycles() {
    let feed = Arc::new(ScriptedFeed::default());
    for id in ["a", "b", "c"] {
        feed.push_delayed(Duration::from_secs(4), batch(vec![record(id, 100.0)]));
    }
    let sink = Arc::new(HangingSink::default());
    let state = Arc::new(RwLock::new(WatchState::new()));
    let engine = MonitoringEngine::new(
        AlertTracker::new(BASE, ZoneRadii::default()),
        feed,
        sink.clone(),
        Arc::clone(&state),
    );
    let relay = engine.relay();

    let start = Instant::now();
    let (scheduler, handle, ticks) = RefreshScheduler::new(Duration::from_secs(10));
    let cancel = CancellationToken::new();
    let scheduler_run = tokio::spawn(scheduler.run(cancel.clone()));
    let engine_run = tokio::spawn(engine.run(ticks, cancel.clone()));

    // eager fetch (4 s) is in flight when the scheduler pauses
    tokio::time::sleep_until(start + Duration::from_secs(1)).await;
    handle.pause();
    assert_eq!(handle.state(), SchedulerState::Paused);

    tokio::time::sleep_until(start + Duration::from_secs(5)).await;
    {
        let state = state.read().await;
        assert_eq!(state.applied_generation, 1);
        assert_eq!(state.recent_alerts.len(), 1);
    }
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

    // ticks at 16 and 26, applied at 20 and 30, while the first delivery hangs
    tokio::time::sleep_until(start + Duration::from_secs(6)).await;
    handle.resume();
    tokio::time::sleep_until(start + Duration::from_secs(35)).await;

    {
        let state = state.read().await;
        assert_eq!(state.applied_generation, 3);
        assert_eq!(state.cycles_applied, 3);
        assert_eq!(state.recent_alerts.len(), 3);
        assert_eq!(state.deliveries.delivered, 0);
    }
    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    assert_eq!(relay.in_flight(), 3);

    cancel.cancel();
    scheduler_run.await.unwrap();
    engine_run.await.unwrap();
}
