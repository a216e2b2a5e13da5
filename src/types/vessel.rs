//! Vessel position types

use serde::{Deserialize, Serialize};

use super::Zone;
use crate::config::defaults::MOVING_SPEED_THRESHOLD_KNOTS;

/// Geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite, latitude within ±90 and longitude within ±180.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// One normalized vessel record as of a single poll cycle.
///
/// Produced by the normalizer from an upstream feed record. Never persisted;
/// the whole batch is replaced on every successful poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselSnapshot {
    /// Stable identity across polls
    pub track_id: String,
    pub name: String,
    pub position: Coordinate,
    /// Speed over ground (knots), never negative
    pub speed_knots: f64,
    /// Course over ground (degrees), in [0, 360)
    pub course_degrees: f64,
    pub length_meters: f64,
    pub width_meters: f64,
    /// True heading when the feed reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_degrees: Option<f64>,
}

impl VesselSnapshot {
    /// A vessel is considered under way above 0.5 kn.
    pub fn moving(&self) -> bool {
        self.speed_knots > MOVING_SPEED_THRESHOLD_KNOTS
    }
}

/// A snapshot annotated with its distance and zone relative to the observer.
///
/// This is the display shape handed to the status API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedVessel {
    #[serde(flatten)]
    pub snapshot: VesselSnapshot,
    pub distance_meters: f64,
    /// Distance formatted as `"1.23 km"`
    pub distance_km: String,
    pub zone: Zone,
    pub moving: bool,
}

impl TrackedVessel {
    pub fn new(snapshot: VesselSnapshot, distance_meters: f64, zone: Zone) -> Self {
        let moving = snapshot.moving();
        Self {
            snapshot,
            distance_meters,
            distance_km: format_distance_km(distance_meters),
            zone,
            moving,
        }
    }
}

/// Format meters as kilometres with two decimals.
pub fn format_distance_km(distance_meters: f64) -> String {
    format!("{:.2} km", distance_meters / 1000.0)
}
