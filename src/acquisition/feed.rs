//! Vessel feed provider abstraction and its HTTP implementation.
//!
//! The engine only sees the [`VesselFeed`] trait. A fetch either returns the
//! raw upstream records of one poll or fails within the provider's own
//! timeout; it never hangs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::defaults::HEALTH_PATH;
use crate::config::FeedConfig;
use crate::geodesy::BoundingBox;
use crate::types::ZoneCounts;

/// Feed failures. All of them mean "feed unavailable" to the engine: keep the
/// stale batch and try again on the next scheduled tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("feed request timed out")]
    Timeout,
    #[error("feed network error: {0}")]
    Network(String),
    #[error("feed returned HTTP {0}")]
    Status(u16),
    #[error("feed reported failure (success=false)")]
    Rejected,
    #[error("unrecognized feed response: {0}")]
    Format(String),
}

/// Raw records from one successful poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedBatch {
    pub records: Vec<Value>,
    /// Per-zone counts as computed by the backend, when it sends them
    pub zone_counts: Option<ZoneCounts>,
    /// Total the backend claims to have returned
    pub reported_total: Option<usize>,
}

impl FeedBatch {
    pub fn from_records(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }
}

/// Source of vessel batches.
#[async_trait]
pub trait VesselFeed: Send + Sync + 'static {
    /// Fetch the current vessel list around the observer.
    async fn fetch(&self) -> Result<FeedBatch, FeedError>;

    /// Human-readable name for logging.
    fn source_name(&self) -> &str;
}

// ============================================================================
// Response envelopes
// ============================================================================

/// Zone metadata of the `/ships` envelope.
#[derive(Debug, Deserialize)]
struct ZonesMetadata {
    #[serde(rename = "zone1km", default)]
    inner: usize,
    #[serde(rename = "zone2km", default)]
    middle: usize,
    #[serde(rename = "zone3km", default)]
    outer: usize,
    #[serde(rename = "beyond3km", default)]
    beyond: usize,
}

impl From<ZonesMetadata> for ZoneCounts {
    fn from(z: ZonesMetadata) -> Self {
        Self {
            inner: z.inner,
            middle: z.middle,
            outer: z.outer,
            beyond: z.beyond,
        }
    }
}

/// Extract the record list from any known response shape:
///
/// - a bare JSON array of records
/// - `{ "success": true, "total": n, "zones": {...}, "ships": [...] }`
/// - `{ "tracks": [...], "_metadata": {...} }`
pub fn parse_feed_body(body: Value) -> Result<FeedBatch, FeedError> {
    let mut obj = match body {
        Value::Array(records) => return Ok(FeedBatch::from_records(records)),
        Value::Object(obj) => obj,
        other => {
            return Err(FeedError::Format(format!(
                "expected array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    if obj.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(FeedError::Rejected);
    }

    let records = match obj.remove("ships").or_else(|| obj.remove("tracks")) {
        Some(Value::Array(records)) => records,
        Some(other) => {
            return Err(FeedError::Format(format!(
                "vessel list is {}, not an array",
                json_kind(&other)
            )))
        }
        None => {
            return Err(FeedError::Format(
                "object has neither 'ships' nor 'tracks'".to_string(),
            ))
        }
    };

    let zone_counts = obj
        .remove("zones")
        .and_then(|z| serde_json::from_value::<ZonesMetadata>(z).ok())
        .map(ZoneCounts::from);

    let reported_total = obj
        .get("total")
        .or_else(|| obj.get("_metadata").and_then(|m| m.get("trackCount")))
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok());

    Ok(FeedBatch {
        records,
        zone_counts,
        reported_total,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FeedError::Timeout
        } else if let Some(status) = e.status() {
            FeedError::Status(status.as_u16())
        } else if e.is_decode() {
            FeedError::Format(e.to_string())
        } else {
            FeedError::Network(e.to_string())
        }
    }
}

// ============================================================================
// HTTP feed
// ============================================================================

/// Polls the vessel backend over HTTP.
#[derive(Clone)]
pub struct HttpVesselFeed {
    http: reqwest::Client,
    ships_url: String,
    bbox: Option<BoundingBox>,
}

impl HttpVesselFeed {
    /// Build a feed client from config. `bbox` is sent as a query parameter
    /// when present.
    pub fn new(config: &FeedConfig, bbox: Option<BoundingBox>) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            ships_url: config.ships_url.clone(),
            bbox,
        })
    }

    /// Probe a backend health endpoint and return its JSON body.
    pub async fn check_health(&self, health_url: &str) -> Result<Value, FeedError> {
        let resp = self
            .http
            .get(health_url)
            .header("Accept", "application/json")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status().as_u16()));
        }
        Ok(resp.json::<Value>().await?)
    }

    pub fn ships_url(&self) -> &str {
        &self.ships_url
    }

    /// Health endpoint on the same origin as the ships endpoint.
    pub fn health_url(&self) -> Result<String, FeedError> {
        let base = reqwest::Url::parse(&self.ships_url)
            .map_err(|e| FeedError::Format(format!("invalid ships_url: {e}")))?;
        base.join(HEALTH_PATH)
            .map(String::from)
            .map_err(|e| FeedError::Format(format!("invalid health url: {e}")))
    }
}

#[async_trait]
impl VesselFeed for HttpVesselFeed {
    async fn fetch(&self) -> Result<FeedBatch, FeedError> {
        let mut req = self
            .http
            .get(&self.ships_url)
            .header("Accept", "application/json");
        if let Some(bbox) = &self.bbox {
            req = req.query(&[("bbox", bbox.to_query_value())]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %self.ships_url, "Feed returned error status");
            return Err(FeedError::Status(status.as_u16()));
        }

        let body: Value = resp.json().await?;
        let batch = parse_feed_body(body)?;
        debug!(
            records = batch.records.len(),
            reported_total = ?batch.reported_total,
            backend_zones = ?batch.zone_counts,
            "Feed batch received"
        );
        Ok(batch)
    }

    fn source_name(&self) -> &str {
        "HTTP"
    }
}
