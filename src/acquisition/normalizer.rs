//! Vessel snapshot normalizer
//!
//! Converts loosely typed upstream vessel records into `VesselSnapshot`s.
//! Upstream backends have used different field names over time, so each
//! known layout gets an explicit field-mapping table and the layout in use is
//! selected by configuration (`feed.schema`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{Coordinate, VesselSnapshot};

/// Upstream record layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSchema {
    /// Accept every known field name, first match wins
    #[default]
    Auto,
    /// `/ships` backend: `latitude`/`longitude`/`speed`/`course`
    Ships,
    /// Legacy track proxy: `lat`/`lon`, with `sog`/`cog` aliases
    Tracks,
}

/// Candidate upstream keys for each canonical field, in priority order.
struct FieldMap {
    track_id: &'static [&'static str],
    name: &'static [&'static str],
    latitude: &'static [&'static str],
    longitude: &'static [&'static str],
    speed: &'static [&'static str],
    course: &'static [&'static str],
    length: &'static [&'static str],
    width: &'static [&'static str],
    heading: &'static [&'static str],
}

const SHIPS_FIELDS: FieldMap = FieldMap {
    track_id: &["trackId"],
    name: &["name"],
    latitude: &["latitude"],
    longitude: &["longitude"],
    speed: &["speed"],
    course: &["course"],
    length: &["length"],
    width: &["width"],
    heading: &["heading"],
};

const TRACKS_FIELDS: FieldMap = FieldMap {
    track_id: &["trackId"],
    name: &["name"],
    latitude: &["lat"],
    longitude: &["lon"],
    speed: &["speed", "sog"],
    course: &["course", "cog"],
    length: &["length"],
    width: &["width"],
    heading: &["heading"],
};

const AUTO_FIELDS: FieldMap = FieldMap {
    track_id: &["trackId"],
    name: &["name"],
    latitude: &["latitude", "lat"],
    longitude: &["longitude", "lon"],
    speed: &["speed", "sog"],
    course: &["course", "cog"],
    length: &["length"],
    width: &["width"],
    heading: &["heading"],
};

impl FeedSchema {
    const fn fields(self) -> &'static FieldMap {
        match self {
            FeedSchema::Auto => &AUTO_FIELDS,
            FeedSchema::Ships => &SHIPS_FIELDS,
            FeedSchema::Tracks => &TRACKS_FIELDS,
        }
    }
}

/// A record that cannot be tracked. The record is skipped, the batch continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("vessel record is not a JSON object")]
    NotAnObject,
    #[error("vessel record has no track id")]
    MissingTrackId,
    #[error("vessel {track_id}: missing position")]
    MissingPosition { track_id: String },
    #[error("vessel {track_id}: invalid position ({latitude}, {longitude})")]
    InvalidPosition {
        track_id: String,
        latitude: f64,
        longitude: f64,
    },
}

/// Outcome of normalizing one feed batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub vessels: Vec<VesselSnapshot>,
    pub rejected: Vec<ValidationError>,
}

/// Normalize one upstream record.
///
/// Missing speed, course, length and width default to 0. Identity and
/// position have no safe default and fail with `ValidationError`.
pub fn normalize_record(record: &Value, schema: FeedSchema) -> Result<VesselSnapshot, ValidationError> {
    let obj = record.as_object().ok_or(ValidationError::NotAnObject)?;
    let fields = schema.fields();
    let lookup = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()));
    let number = |keys: &[&str]| lookup(keys).and_then(as_number);

    let track_id = lookup(fields.track_id)
        .and_then(as_identifier)
        .ok_or(ValidationError::MissingTrackId)?;

    let (latitude, longitude) = match (number(fields.latitude), number(fields.longitude)) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ValidationError::MissingPosition { track_id }),
    };
    let position = Coordinate::new(latitude, longitude);
    if !position.is_valid() {
        return Err(ValidationError::InvalidPosition {
            track_id,
            latitude,
            longitude,
        });
    }

    let name = lookup(fields.name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| track_id.clone(), str::to_string);

    Ok(VesselSnapshot {
        name,
        position,
        speed_knots: number(fields.speed).map_or(0.0, |s| s.max(0.0)),
        course_degrees: number(fields.course).map_or(0.0, wrap_degrees),
        length_meters: number(fields.length).map_or(0.0, |l| l.max(0.0)),
        width_meters: number(fields.width).map_or(0.0, |w| w.max(0.0)),
        // AIS reports 511 for "heading not available"
        heading_degrees: number(fields.heading).filter(|h| (0.0..360.0).contains(h)),
        track_id,
    })
}

/// Normalize a batch, skipping records that fail validation.
pub fn normalize_batch(records: &[Value], schema: FeedSchema) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for record in records {
        match normalize_record(record, schema) {
            Ok(vessel) => batch.vessels.push(vessel),
            Err(e) => {
                debug!(error = %e, "Skipping vessel record");
                batch.rejected.push(e);
            }
        }
    }
    batch
}

/// Finite number from a JSON number or numeric string.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Non-empty track id from a JSON string or integer.
fn as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
