//! API route definitions
//!
//! - /api/v1/vessels - vessels of the latest applied batch
//! - /api/v1/status - scheduler, error banner, zone counts, deliveries
//! - /api/v1/scheduler/{pause,resume} - refresh control
//! - /api/v1/alerts/retry - re-dispatch failed deliveries

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/vessels", get(handlers::get_vessels))
        .route("/status", get(handlers::get_status))
        .route("/scheduler/pause", post(handlers::pause_scheduler))
        .route("/scheduler/resume", post(handlers::resume_scheduler))
        .route("/alerts/retry", post(handlers::retry_alerts))
        .with_state(state)
}

/// Health endpoint at root level
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
}
