//! Proximity monitoring engine
//!
//! One cycle per refresh tick:
//!
//! ```text
//! tick(gen) -> spawn fetch ─┐
//!                           ▼
//!   fetch done(gen) ── older than applied? ── yes ─> discard
//!                           │ no
//!            Err ─> keep vessels + flags, raise error banner
//!             Ok ─> normalize -> evaluate_batch -> swap vessels + flags
//!                   -> dispatch each rising edge on its own task
//! ```
//!
//! Fetches run concurrently with the loop, but results are applied one at a
//! time inside it, so the alert flags have a single writer.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::relay::AlertRelay;
use super::scheduler::RefreshTick;
use super::state::WatchState;
use crate::acquisition::{normalize_batch, FeedBatch, FeedError, FeedSchema, VesselFeed};
use crate::notify::AlertSink;
use crate::tracking::AlertTracker;
use crate::types::{AlertEvent, AlertStateMap, DeliveryOutcome};

/// What one fetch result did to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleReport {
    Applied {
        generation: u64,
        vessels: usize,
        rejected: usize,
        events: Vec<AlertEvent>,
    },
    FeedFailed {
        generation: u64,
        error: FeedError,
    },
    /// A newer batch was already applied
    Stale {
        generation: u64,
        applied: u64,
    },
}

pub struct MonitoringEngine {
    tracker: AlertTracker,
    feed: Arc<dyn VesselFeed>,
    relay: AlertRelay,
    state: Arc<RwLock<WatchState>>,
    schema: FeedSchema,
    alert_state: AlertStateMap,
    applied_generation: u64,
}

impl MonitoringEngine {
    pub fn new(
        tracker: AlertTracker,
        feed: Arc<dyn VesselFeed>,
        sink: Arc<dyn AlertSink>,
        state: Arc<RwLock<WatchState>>,
    ) -> Self {
        Self {
            tracker,
            feed,
            relay: AlertRelay::new(sink, Arc::clone(&state), true),
            state,
            schema: FeedSchema::default(),
            alert_state: AlertStateMap::new(),
            applied_generation: 0,
        }
    }

    pub fn with_schema(mut self, schema: FeedSchema) -> Self {
        self.schema = schema;
        self
    }

    /// When disabled, rising edges are recorded but not sent.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.relay = self.relay.with_enabled(enabled);
        self
    }

    /// Handle for re-dispatching failed deliveries from outside the loop.
    pub fn relay(&self) -> AlertRelay {
        self.relay.clone()
    }

    pub fn alert_state(&self) -> &AlertStateMap {
        &self.alert_state
    }

    pub const fn applied_generation(&self) -> u64 {
        self.applied_generation
    }

    /// Apply one completed fetch.
    pub async fn apply_fetch(
        &mut self,
        generation: u64,
        result: Result<FeedBatch, FeedError>,
    ) -> CycleReport {
        if generation <= self.applied_generation {
            debug!(generation, applied = self.applied_generation, "Discarding stale fetch");
            self.state.write().await.record_stale();
            return CycleReport::Stale {
                generation,
                applied: self.applied_generation,
            };
        }

        let now = Utc::now();
        let batch = match result {
            Ok(batch) => batch,
            Err(error) => {
                warn!(generation, source = self.feed.source_name(), error = %error, "Feed unavailable, keeping previous vessels");
                self.state.write().await.record_fetch_error(&error, now);
                return CycleReport::FeedFailed { generation, error };
            }
        };

        let normalized = normalize_batch(&batch.records, self.schema);
        let rejected = normalized.rejected.len();
        if rejected > 0 {
            warn!(generation, rejected, "Skipped invalid vessel records");
        }

        let evaluation = self
            .tracker
            .evaluate_batch(&self.alert_state, normalized.vessels, now);

        if let Some(backend) = batch.zone_counts {
            if backend != evaluation.zone_counts {
                debug!(
                    local = ?evaluation.zone_counts,
                    backend = ?backend,
                    "Backend zone counts differ from local classification"
                );
            }
        }

        self.alert_state = evaluation.state;
        self.applied_generation = generation;
        let vessel_count = evaluation.vessels.len();

        {
            let mut state = self.state.write().await;
            state.apply_batch(
                generation,
                evaluation.vessels,
                evaluation.zone_counts,
                batch.zone_counts,
                rejected,
                now,
            );
            for event in &evaluation.events {
                state.record_alert(event.clone());
            }
        }

        for event in &evaluation.events {
            info!(
                event_id = %event.id,
                track_id = %event.track_id,
                vessel = %event.name,
                distance_m = event.distance_meters.round(),
                "Vessel entered inner zone"
            );
            self.relay.dispatch(event.clone());
        }

        info!(
            generation,
            vessels = vessel_count,
            inner = evaluation.zone_counts.inner,
            middle = evaluation.zone_counts.middle,
            outer = evaluation.zone_counts.outer,
            alerts = evaluation.events.len(),
            "Batch applied"
        );

        CycleReport::Applied {
            generation,
            vessels: vessel_count,
            rejected,
            events: evaluation.events,
        }
    }

    /// Fetch and apply one batch right now.
    pub async fn run_once(&mut self) -> CycleReport {
        let generation = self.applied_generation + 1;
        let result = self.feed.fetch().await;
        self.apply_fetch(generation, result).await
    }

    /// Re-dispatch every delivery the gateway never accepted. Returns how
    /// many were re-queued.
    pub async fn retry_failed_deliveries(&mut self) -> usize {
        self.relay.retry_failed().await
    }

    /// Wait for every delivery spawned so far, including retries requested
    /// through other relay handles, and return their outcomes.
    pub async fn wait_for_deliveries(&mut self) -> Vec<DeliveryOutcome> {
        self.relay.wait_for_deliveries().await
    }

    /// Drive cycles from scheduler ticks until cancelled or the tick channel
    /// closes. In-flight fetches are abandoned on cancellation and drained on
    /// channel close.
    pub async fn run(mut self, mut ticks: mpsc::Receiver<RefreshTick>, cancel: CancellationToken) {
        info!(source = self.feed.source_name(), "Monitoring engine started");
        let mut fetches: JoinSet<(u64, Result<FeedBatch, FeedError>)> = JoinSet::new();
        let mut ticks_open = true;

        while ticks_open || !fetches.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Monitoring engine shutting down");
                    fetches.abort_all();
                    break;
                }

                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    match joined {
                        Ok((generation, result)) => {
                            self.apply_fetch(generation, result).await;
                        }
                        Err(e) => warn!(error = %e, "Fetch task failed"),
                    }
                }

                tick = ticks.recv(), if ticks_open => {
                    match tick {
                        Some(RefreshTick { generation }) => {
                            debug!(generation, in_flight = fetches.len(), "Starting fetch");
                            let feed = Arc::clone(&self.feed);
                            fetches.spawn(async move { (generation, feed.fetch().await) });
                        }
                        None => {
                            debug!("Tick channel closed");
                            ticks_open = false;
                        }
                    }
                }
            }
        }

        info!(applied = self.applied_generation, "Monitoring engine stopped");
    }
}
