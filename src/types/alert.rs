//! Alert state and alert event types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-vessel inner-zone alert flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    /// An alert has fired for the current uninterrupted inner-zone dwell
    pub currently_alerted: bool,
    /// When that alert fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerted_at: Option<DateTime<Utc>>,
}

impl AlertState {
    pub const fn armed() -> Self {
        Self {
            currently_alerted: false,
            alerted_at: None,
        }
    }

    pub const fn alerted(at: DateTime<Utc>) -> Self {
        Self {
            currently_alerted: true,
            alerted_at: Some(at),
        }
    }
}

/// Alert flags keyed by track id.
pub type AlertStateMap = HashMap<String, AlertState>;

/// A vessel entered the inner zone.
///
/// Minted once per rising edge. The `id` travels with every delivery attempt
/// so the push gateway can drop duplicates from retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: Uuid,
    pub track_id: String,
    pub name: String,
    pub distance_meters: f64,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(track_id: &str, name: &str, distance_meters: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            track_id: track_id.to_string(),
            name: name.to_string(),
            distance_meters,
            timestamp,
        }
    }
}

/// Terminal result of handing an alert (or a token registration) to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The gateway accepted the request
    Delivered,
    /// The gateway was unreachable but a device token exists locally
    DeliveredLocalOnly,
    /// The gateway was unreachable and nothing local can surface the alert
    Failed,
}

impl DeliveryOutcome {
    pub const fn is_failure(self) -> bool {
        matches!(self, DeliveryOutcome::Failed)
    }

    /// The gateway never accepted the event, so it is worth sending again.
    pub const fn needs_redelivery(self) -> bool {
        !matches!(self, DeliveryOutcome::Delivered)
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::DeliveredLocalOnly => write!(f, "delivered (local only)"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}
