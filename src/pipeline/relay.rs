//! Alert relay: hands rising-edge events to the sink on their own tasks and
//! records their outcomes in the shared watch state.
//!
//! Deliveries never touch alert flags. A slow or failing delivery cannot
//! hold up the engine loop or another delivery. Every spawned delivery,
//! including API-triggered retries, is tracked so shutdown can wait for it.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::WatchState;
use crate::notify::AlertSink;
use crate::types::{AlertEvent, DeliveryOutcome};

type InFlight = Arc<Mutex<Vec<JoinHandle<DeliveryOutcome>>>>;

#[derive(Clone)]
pub struct AlertRelay {
    sink: Arc<dyn AlertSink>,
    state: Arc<RwLock<WatchState>>,
    enabled: bool,
    in_flight: InFlight,
}

impl AlertRelay {
    pub fn new(sink: Arc<dyn AlertSink>, state: Arc<RwLock<WatchState>>, enabled: bool) -> Self {
        Self {
            sink,
            state,
            enabled,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Same relay (and in-flight set) with notifications switched on or off.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Spawn delivery of one event. False when notifications are disabled.
    pub fn dispatch(&self, event: AlertEvent) -> bool {
        if !self.enabled {
            debug!(track_id = %event.track_id, "Notifications disabled, alert recorded only");
            return false;
        }

        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let outcome = sink.deliver(&event).await;
            state.write().await.record_delivery(&event, outcome);
            outcome
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
        true
    }

    /// Re-dispatch every event the gateway never accepted. Returns how many
    /// were re-queued.
    pub async fn retry_failed(&self) -> usize {
        if !self.enabled {
            return 0;
        }

        let failed = self.state.write().await.take_failed_deliveries();
        if !failed.is_empty() {
            info!(count = failed.len(), "Retrying failed alert deliveries");
        }
        failed
            .into_iter()
            .map(|event| self.dispatch(event))
            .filter(|&spawned| spawned)
            .count()
    }

    /// Deliveries spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every delivery spawned so far and return their outcomes.
    pub async fn wait_for_deliveries(&self) -> Vec<DeliveryOutcome> {
        let handles: Vec<_> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Delivery task failed"),
            }
        }
        outcomes
    }
}
