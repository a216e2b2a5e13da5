//! Monitoring pipeline
//!
//! ```text
//! RefreshScheduler ──RefreshTick──> MonitoringEngine ──AlertEvent──> AlertRelay ──> AlertSink
//!        ▲                               │                               │
//!  SchedulerHandle                       └────────> WatchState <─────────┘
//!  (pause/resume)                                  (status API)
//! ```

pub mod engine;
pub mod relay;
pub mod scheduler;
mod state;

pub use engine::{CycleReport, MonitoringEngine};
pub use relay::AlertRelay;
pub use scheduler::{RefreshScheduler, RefreshTick, SchedulerHandle, SchedulerState};
pub use state::*;
