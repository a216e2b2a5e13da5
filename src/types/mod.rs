//! Shared data structures for vessel proximity monitoring
//!
//! - `Coordinate`, `VesselSnapshot`, `TrackedVessel`: normalized feed data
//! - `Zone`, `ZoneRadii`, `ZoneCounts`: distance rings around the observer
//! - `AlertState`, `AlertEvent`, `DeliveryOutcome`: alerting and dispatch

mod alert;
mod vessel;
mod zone;

pub use alert::*;
pub use vessel::*;
pub use zone::*;
