//! Shared watch state
//!
//! What the status API shows: the latest vessel list, the transient error
//! banner, zone counts and delivery bookkeeping. Written by the engine and by
//! delivery tasks, read by API handlers. Wrapped in `Arc<RwLock<>>`.
//!
//! Alert flags are NOT here; they belong to the engine loop alone.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::acquisition::FeedError;
use crate::config::defaults::{MAX_FAILED_DELIVERIES, MAX_RECENT_ALERTS};
use crate::types::{AlertEvent, DeliveryOutcome, TrackedVessel, ZoneCounts};

/// Delivery outcome tallies since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCounters {
    pub delivered: u64,
    pub delivered_local_only: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchState {
    /// Vessels of the most recently applied batch
    pub vessels: Vec<TrackedVessel>,
    pub zone_counts: ZoneCounts,
    /// Counts the backend reported alongside the batch, if any
    pub backend_zone_counts: Option<ZoneCounts>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Cleared by the next successful poll
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub applied_generation: u64,
    pub cycles_applied: u64,
    pub fetch_failures: u64,
    pub stale_discarded: u64,
    pub records_rejected: u64,
    pub deliveries: DeliveryCounters,
    /// Newest last
    pub recent_alerts: VecDeque<AlertEvent>,
    /// Events the gateway never accepted (`Failed` or `DeliveredLocalOnly`),
    /// oldest first
    pub failed_deliveries: VecDeque<AlertEvent>,
    pub started_at: DateTime<Utc>,
}

impl Default for WatchState {
    fn default() -> Self {
        Self {
            vessels: Vec::new(),
            zone_counts: ZoneCounts::default(),
            backend_zone_counts: None,
            last_updated: None,
            last_error: None,
            last_error_at: None,
            applied_generation: 0,
            cycles_applied: 0,
            fetch_failures: 0,
            stale_discarded: 0,
            records_rejected: 0,
            deliveries: DeliveryCounters::default(),
            recent_alerts: VecDeque::new(),
            failed_deliveries: VecDeque::new(),
            started_at: Utc::now(),
        }
    }
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the vessel list with a freshly evaluated batch and clear the
    /// error banner.
    pub fn apply_batch(
        &mut self,
        generation: u64,
        vessels: Vec<TrackedVessel>,
        zone_counts: ZoneCounts,
        backend_zone_counts: Option<ZoneCounts>,
        rejected: usize,
        at: DateTime<Utc>,
    ) {
        self.vessels = vessels;
        self.zone_counts = zone_counts;
        self.backend_zone_counts = backend_zone_counts;
        self.last_updated = Some(at);
        self.last_error = None;
        self.last_error_at = None;
        self.applied_generation = generation;
        self.cycles_applied += 1;
        self.records_rejected += u64::try_from(rejected).unwrap_or(u64::MAX);
    }

    /// Raise the error banner. The vessel list is left as it was.
    pub fn record_fetch_error(&mut self, error: &FeedError, at: DateTime<Utc>) {
        self.last_error = Some(error.to_string());
        self.last_error_at = Some(at);
        self.fetch_failures += 1;
    }

    pub fn record_stale(&mut self) {
        self.stale_discarded += 1;
    }

    pub fn record_alert(&mut self, event: AlertEvent) {
        if self.recent_alerts.len() >= MAX_RECENT_ALERTS {
            self.recent_alerts.pop_front();
        }
        self.recent_alerts.push_back(event);
    }

    pub fn record_delivery(&mut self, event: &AlertEvent, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.deliveries.delivered += 1,
            DeliveryOutcome::DeliveredLocalOnly => self.deliveries.delivered_local_only += 1,
            DeliveryOutcome::Failed => self.deliveries.failed += 1,
        }
        if outcome.needs_redelivery() {
            if self.failed_deliveries.len() >= MAX_FAILED_DELIVERIES {
                self.failed_deliveries.pop_front();
            }
            self.failed_deliveries.push_back(event.clone());
        }
    }

    /// Drain the failed-delivery list for another round of delivery.
    pub fn take_failed_deliveries(&mut self) -> Vec<AlertEvent> {
        self.failed_deliveries.drain(..).collect()
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
