//! Concentric distance zones around the observation point

use serde::{Deserialize, Serialize};

/// Distance band around the observer, ordered from nearest to farthest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Alert ring (default < 1 km)
    Inner,
    /// Watch ring (default < 2 km)
    Middle,
    /// Approach ring (default < 3 km)
    Outer,
    /// Beyond every ring
    None,
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::Inner => write!(f, "INNER"),
            Zone::Middle => write!(f, "MIDDLE"),
            Zone::Outer => write!(f, "OUTER"),
            Zone::None => write!(f, "NONE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RadiiError {
    #[error("zone radii must be finite and positive (got inner={inner}, middle={middle}, outer={outer})")]
    NotPositive { inner: f64, middle: f64, outer: f64 },
    #[error("zone radii must be strictly increasing (got inner={inner}, middle={middle}, outer={outer})")]
    NotIncreasing { inner: f64, middle: f64, outer: f64 },
}

/// Outer edge of each ring in meters.
///
/// Construction guarantees `0 < inner < middle < outer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneRadii {
    inner: f64,
    middle: f64,
    outer: f64,
}

impl ZoneRadii {
    pub fn new(inner: f64, middle: f64, outer: f64) -> Result<Self, RadiiError> {
        let all_positive = [inner, middle, outer]
            .iter()
            .all(|r| r.is_finite() && *r > 0.0);
        if !all_positive {
            return Err(RadiiError::NotPositive { inner, middle, outer });
        }
        if !(inner < middle && middle < outer) {
            return Err(RadiiError::NotIncreasing { inner, middle, outer });
        }
        Ok(Self { inner, middle, outer })
    }

    pub const fn inner(&self) -> f64 {
        self.inner
    }

    pub const fn middle(&self) -> f64 {
        self.middle
    }

    pub const fn outer(&self) -> f64 {
        self.outer
    }
}

impl Default for ZoneRadii {
    fn default() -> Self {
        use crate::config::defaults::{INNER_RADIUS_M, MIDDLE_RADIUS_M, OUTER_RADIUS_M};
        Self {
            inner: INNER_RADIUS_M,
            middle: MIDDLE_RADIUS_M,
            outer: OUTER_RADIUS_M,
        }
    }
}

/// Number of vessels per zone for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub inner: usize,
    pub middle: usize,
    pub outer: usize,
    pub beyond: usize,
}

impl ZoneCounts {
    pub fn record(&mut self, zone: Zone) {
        match zone {
            Zone::Inner => self.inner += 1,
            Zone::Middle => self.middle += 1,
            Zone::Outer => self.outer += 1,
            Zone::None => self.beyond += 1,
        }
    }

    pub const fn total(&self) -> usize {
        self.inner + self.middle + self.outer + self.beyond
    }
}
