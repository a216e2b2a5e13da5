//! shipwatch: vessel proximity monitoring
//!
//! Polls a vessel feed around a fixed observation point, classifies every
//! vessel into concentric distance zones and raises one push notification
//! per entry into the innermost zone.
//!
//! ## Architecture
//!
//! - **Geodesy**: haversine distance and zone classification
//! - **Acquisition**: feed provider trait, HTTP feed, record normalizer
//! - **Tracking**: rising-edge inner-zone alert state machine
//! - **Notify**: push gateway transport and retry ladder
//! - **Pipeline**: refresh scheduler, monitoring engine, shared watch state
//! - **API**: status and control endpoints

pub mod acquisition;
pub mod api;
pub mod config;
pub mod geodesy;
pub mod notify;
pub mod pipeline;
pub mod tracking;
pub mod types;

// Re-export configuration
pub use config::WatchConfig;

// Re-export commonly used types
pub use types::{
    AlertEvent, AlertState, AlertStateMap, Coordinate, DeliveryOutcome, TrackedVessel,
    VesselSnapshot, Zone, ZoneCounts, ZoneRadii,
};

pub use acquisition::{FeedBatch, FeedError, FeedSchema, HttpVesselFeed, VesselFeed};
pub use geodesy::{classify_zone, distance_meters};
pub use notify::{AlertSink, HttpPushTransport, NotificationDispatcher, PushTransport, RetryPolicy};
pub use pipeline::{MonitoringEngine, RefreshScheduler, SchedulerHandle, WatchState};
pub use tracking::AlertTracker;
