//! API route handlers

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{AlertRelay, DeliveryCounters, SchedulerHandle, SchedulerState, WatchState};
use crate::types::{AlertEvent, Coordinate, TrackedVessel, ZoneCounts, ZoneRadii};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub watch: Arc<RwLock<WatchState>>,
    pub scheduler: SchedulerHandle,
    pub relay: AlertRelay,
    pub observer: Coordinate,
    pub radii: ZoneRadii,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselsResponse {
    pub count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub vessels: Vec<TrackedVessel>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub seconds_until_refresh: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub observer: Coordinate,
    pub radii: ZoneRadii,
    pub scheduler: SchedulerStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub applied_generation: u64,
    pub vessel_count: usize,
    pub zone_counts: ZoneCounts,
    pub backend_zone_counts: Option<ZoneCounts>,
    pub fetch_failures: u64,
    pub stale_discarded: u64,
    pub records_rejected: u64,
    pub notifications_enabled: bool,
    pub deliveries: DeliveryCounters,
    pub recent_alerts: Vec<AlertEvent>,
    pub failed_deliveries: Vec<AlertEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryResponse {
    pub requeued: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Response {
    let uptime_seconds = state.watch.read().await.uptime_secs();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        uptime_seconds,
    })
}

/// GET /api/v1/vessels
pub async fn get_vessels(State(state): State<ApiState>) -> Response {
    let watch = state.watch.read().await;
    ApiResponse::ok(VesselsResponse {
        count: watch.vessels.len(),
        last_updated: watch.last_updated,
        vessels: watch.vessels.clone(),
    })
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    let watch = state.watch.read().await;
    ApiResponse::ok(StatusResponse {
        observer: state.observer,
        radii: state.radii,
        scheduler: scheduler_status(&state.scheduler),
        last_updated: watch.last_updated,
        last_error: watch.last_error.clone(),
        last_error_at: watch.last_error_at,
        applied_generation: watch.applied_generation,
        vessel_count: watch.vessels.len(),
        zone_counts: watch.zone_counts,
        backend_zone_counts: watch.backend_zone_counts,
        fetch_failures: watch.fetch_failures,
        stale_discarded: watch.stale_discarded,
        records_rejected: watch.records_rejected,
        notifications_enabled: state.relay.enabled(),
        deliveries: watch.deliveries,
        recent_alerts: watch.recent_alerts.iter().cloned().collect(),
        failed_deliveries: watch.failed_deliveries.iter().cloned().collect(),
    })
}

/// POST /api/v1/scheduler/pause
pub async fn pause_scheduler(State(state): State<ApiState>) -> Response {
    state.scheduler.pause();
    ApiResponse::ok(scheduler_status(&state.scheduler))
}

/// POST /api/v1/scheduler/resume
pub async fn resume_scheduler(State(state): State<ApiState>) -> Response {
    state.scheduler.resume();
    ApiResponse::ok(scheduler_status(&state.scheduler))
}

/// POST /api/v1/alerts/retry
///
/// Re-dispatches undelivered alerts in the background; responds immediately.
/// The redeliveries join the relay's in-flight set.
pub async fn retry_alerts(State(state): State<ApiState>) -> Response {
    if !state.relay.enabled() {
        return ApiErrorResponse::conflict("notifications are disabled");
    }
    let requeued = state.relay.retry_failed().await;
    ApiResponse::accepted(RetryResponse { requeued })
}

fn scheduler_status(handle: &SchedulerHandle) -> SchedulerStatus {
    SchedulerStatus {
        state: handle.state(),
        seconds_until_refresh: handle.seconds_until_refresh(),
    }
}
