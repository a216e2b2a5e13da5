//! Watch Configuration - observer, zones, timing and endpoints as TOML values
//!
//! Every tunable the engine uses lives in this module. Each struct implements
//! `Default` with the values from `config::defaults`, so a missing file or a
//! missing key behaves exactly like the stock deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::acquisition::FeedSchema;
use crate::notify::RetryPolicy;
use crate::types::{Coordinate, ZoneRadii};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "SHIPWATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "shipwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitoring deployment.
///
/// Load with `WatchConfig::load()` which searches:
/// 1. `$SHIPWATCH_CONFIG` env var
/// 2. `./shipwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Fixed observation point
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Distance rings
    #[serde(default)]
    pub zones: ZonesConfig,

    /// Refresh timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Vessel feed endpoint
    #[serde(default)]
    pub feed: FeedConfig,

    /// Push gateway and retry ladder
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Status API
    #[serde(default)]
    pub server: ServerConfig,
}

impl WatchConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SHIPWATCH_CONFIG` environment variable
    /// 2. `./shipwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded watch config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded watch config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings with a suggested correction and
    /// never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if !self.observer.coordinate().is_valid() {
            errors.push(format!(
                "observer: {} is not a valid coordinate",
                self.observer.coordinate()
            ));
        }

        if let Err(e) = self.zones.radii() {
            errors.push(format!("zones: {e}"));
        }

        if self.scheduler.refresh_interval_ms < defaults::MIN_REFRESH_INTERVAL_MS {
            errors.push(format!(
                "scheduler.refresh_interval_ms = {} must be >= {}",
                self.scheduler.refresh_interval_ms,
                defaults::MIN_REFRESH_INTERVAL_MS
            ));
        }

        Self::check_url(&self.feed.ships_url, "feed.ships_url", &mut errors);
        if self.feed.timeout_ms == 0 {
            errors.push("feed.timeout_ms must be > 0".to_string());
        }

        let n = &self.notifications;
        Self::check_url(&n.base_url, "notifications.base_url", &mut errors);
        if !n.alert_path.starts_with('/') {
            errors.push(format!(
                "notifications.alert_path = '{}' must start with '/'",
                n.alert_path
            ));
        }
        if n.max_attempts == 0 {
            errors.push("notifications.max_attempts must be >= 1".to_string());
        }
        if n.attempt_timeout_ms == 0 {
            errors.push("notifications.attempt_timeout_ms must be > 0".to_string());
        }
        if matches!(n.device_token.as_deref(), Some(t) if t.trim().is_empty()) {
            errors.push("notifications.device_token must not be empty when set".to_string());
        }

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr = '{}' is not a valid socket address",
                self.server.addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_url(url: &str, name: &str, errors: &mut Vec<String>) {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(format!("{name} = '{url}' must be an http(s) URL"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Observer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_observer_latitude")]
    pub latitude: f64,
    #[serde(default = "default_observer_longitude")]
    pub longitude: f64,
}

fn default_observer_latitude() -> f64 {
    defaults::OBSERVER_LATITUDE
}
fn default_observer_longitude() -> f64 {
    defaults::OBSERVER_LONGITUDE
}

impl ObserverConfig {
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            latitude: default_observer_latitude(),
            longitude: default_observer_longitude(),
        }
    }
}

// ============================================================================
// Zones
// ============================================================================

/// Ring radii in meters. Must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    #[serde(default = "default_inner_m")]
    pub inner_m: f64,
    #[serde(default = "default_middle_m")]
    pub middle_m: f64,
    #[serde(default = "default_outer_m")]
    pub outer_m: f64,
}

fn default_inner_m() -> f64 {
    defaults::INNER_RADIUS_M
}
fn default_middle_m() -> f64 {
    defaults::MIDDLE_RADIUS_M
}
fn default_outer_m() -> f64 {
    defaults::OUTER_RADIUS_M
}

impl ZonesConfig {
    pub fn radii(&self) -> Result<ZoneRadii, crate::types::RadiiError> {
        ZoneRadii::new(self.inner_m, self.middle_m, self.outer_m)
    }
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            inner_m: default_inner_m(),
            middle_m: default_middle_m(),
            outer_m: default_outer_m(),
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between feed refreshes (ms)
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

fn default_refresh_interval_ms() -> u64 {
    defaults::REFRESH_INTERVAL_MS
}

impl SchedulerConfig {
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

// ============================================================================
// Feed
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Endpoint returning the vessel list
    #[serde(default = "default_ships_url")]
    pub ships_url: String,

    /// Upstream record layout
    #[serde(default)]
    pub schema: FeedSchema,

    /// Request timeout (ms)
    #[serde(default = "default_feed_timeout_ms")]
    pub timeout_ms: u64,

    /// Send a `bbox` query around the observer sized to the outer ring
    #[serde(default)]
    pub send_bbox: bool,
}

fn default_ships_url() -> String {
    defaults::FEED_SHIPS_URL.to_string()
}
fn default_feed_timeout_ms() -> u64 {
    defaults::FEED_TIMEOUT_MS
}

impl FeedConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ships_url: default_ships_url(),
            schema: FeedSchema::default(),
            timeout_ms: default_feed_timeout_ms(),
            send_bbox: false,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Dispatch inner-zone alerts at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Push gateway base URL
    #[serde(default = "default_push_base_url")]
    pub base_url: String,

    /// Alert endpoint, relative to `base_url`
    #[serde(default = "default_alert_path")]
    pub alert_path: String,

    /// Push token of this device, if one has been registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,

    /// Timeout for one attempt (ms)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,

    /// Attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after a 5xx is `attempt * server_error_backoff_ms`
    #[serde(default = "default_server_error_backoff_ms")]
    pub server_error_backoff_ms: u64,

    /// Wait after a 4xx, timeout or network error is `attempt * client_error_backoff_ms`
    #[serde(default = "default_client_error_backoff_ms")]
    pub client_error_backoff_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_push_base_url() -> String {
    defaults::PUSH_BASE_URL.to_string()
}
fn default_alert_path() -> String {
    defaults::PUSH_ALERT_PATH.to_string()
}
fn default_attempt_timeout_ms() -> u64 {
    defaults::PUSH_ATTEMPT_TIMEOUT_MS
}
fn default_max_attempts() -> u32 {
    defaults::PUSH_MAX_ATTEMPTS
}
fn default_server_error_backoff_ms() -> u64 {
    defaults::PUSH_SERVER_ERROR_BACKOFF_MS
}
fn default_client_error_backoff_ms() -> u64 {
    defaults::PUSH_CLIENT_ERROR_BACKOFF_MS
}

impl NotificationConfig {
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            server_error_backoff: Duration::from_millis(self.server_error_backoff_ms),
            client_error_backoff: Duration::from_millis(self.client_error_backoff_ms),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_push_base_url(),
            alert_path: default_alert_path(),
            device_token: None,
            attempt_timeout_ms: default_attempt_timeout_ms(),
            max_attempts: default_max_attempts(),
            server_error_backoff_ms: default_server_error_backoff_ms(),
            client_error_backoff_ms: default_client_error_backoff_ms(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Status API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    ///
    /// Can be overridden by `SHIPWATCH_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
