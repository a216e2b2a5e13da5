//! Geodesic calculations: great-circle distance and zone classification.
//!
//! Pure functions, no I/O.

use serde::Serialize;

use crate::config::defaults::EARTH_RADIUS_M;
use crate::types::{Coordinate, Zone, ZoneRadii};

/// Great-circle distance between two coordinates in meters (haversine, mean
/// Earth radius 6 371 km).
///
/// Operands are put in a canonical order before evaluation, so
/// `distance_meters(a, b) == distance_meters(b, a)` holds bit-for-bit and
/// not just up to rounding.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let (p, q) = if (a.latitude, a.longitude) <= (b.latitude, b.longitude) {
        (a, b)
    } else {
        (b, a)
    };

    let lat_p = p.latitude.to_radians();
    let lat_q = q.latitude.to_radians();
    let d_lat = (q.latitude - p.latitude).to_radians();
    let d_lon = (q.longitude - p.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_p.cos() * lat_q.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    let h = h.clamp(0.0, 1.0);

    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Classify a distance into a zone.
///
/// Boundaries are strict: a vessel exactly on a ring belongs to the zone
/// outside it (`d == inner` is `Middle`). NaN classifies as `None`.
pub fn classify_zone(distance_meters: f64, radii: &ZoneRadii) -> Zone {
    if distance_meters < radii.inner() {
        Zone::Inner
    } else if distance_meters < radii.middle() {
        Zone::Middle
    } else if distance_meters < radii.outer() {
        Zone::Outer
    } else {
        Zone::None
    }
}

/// Latitude/longitude rectangle enclosing a circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// `minLon,minLat,maxLon,maxLat`, the usual `bbox` query layout.
    pub fn to_query_value(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.min_longitude, self.min_latitude, self.max_longitude, self.max_latitude
        )
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&c.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&c.longitude)
    }
}

/// Smallest lat/lon box containing every point within `radius_m` of `center`.
///
/// Uses the spherical small-circle approximation; latitudes clamp at the
/// poles and longitudes at ±180 (no antimeridian wrap).
pub fn bounding_box(center: Coordinate, radius_m: f64) -> BoundingBox {
    let angular = radius_m / EARTH_RADIUS_M;
    let d_lat = angular.to_degrees();
    let cos_lat = center.latitude.to_radians().cos();
    let d_lon = if cos_lat.abs() < 1e-12 {
        180.0
    } else {
        (angular / cos_lat).to_degrees().min(180.0)
    };

    BoundingBox {
        min_latitude: (center.latitude - d_lat).max(-90.0),
        min_longitude: (center.longitude - d_lon).max(-180.0),
        max_latitude: (center.latitude + d_lat).min(90.0),
        max_longitude: (center.longitude + d_lon).min(180.0),
    }
}
