//! System-wide default constants.
//!
//! Every value here is also a config field; these are what a missing TOML
//! key falls back to. Grouped by subsystem for easy discovery.

// ============================================================================
// Observer
// ============================================================================

/// Default observation point latitude (degrees).
pub const OBSERVER_LATITUDE: f64 = 48.853229;

/// Default observation point longitude (degrees).
pub const OBSERVER_LONGITUDE: f64 = 2.225328;

// ============================================================================
// Geodesy & Zones
// ============================================================================

/// Mean Earth radius used by the haversine formula (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Inner (alert) ring radius (meters).
pub const INNER_RADIUS_M: f64 = 1_000.0;

/// Middle (watch) ring radius (meters).
pub const MIDDLE_RADIUS_M: f64 = 2_000.0;

/// Outer (approach) ring radius (meters).
pub const OUTER_RADIUS_M: f64 = 3_000.0;

/// Speed above which a vessel counts as moving (knots).
pub const MOVING_SPEED_THRESHOLD_KNOTS: f64 = 0.5;

// ============================================================================
// Scheduler
// ============================================================================

/// Interval between feed refreshes (ms).
pub const REFRESH_INTERVAL_MS: u64 = 10_000;

/// Smallest accepted refresh interval (ms). The countdown ticks once per second.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;

/// Capacity of the scheduler -> engine tick channel.
pub const TICK_CHANNEL_CAPACITY: usize = 8;

// ============================================================================
// Vessel Feed
// ============================================================================

/// Vessel feed endpoint.
pub const FEED_SHIPS_URL: &str = "https://api.bakabi.fr/ships";

/// HTTP timeout for one feed request (ms).
pub const FEED_TIMEOUT_MS: u64 = 15_000;

// ============================================================================
// Notifications
// ============================================================================

/// Push gateway base URL.
pub const PUSH_BASE_URL: &str = "https://api.bakabi.fr";

/// Path for direct alert posts, relative to the push base URL.
pub const PUSH_ALERT_PATH: &str = "/alert";

/// Path for device token registration.
pub const PUSH_REGISTER_PATH: &str = "/register-token";

/// Path for device token removal.
pub const PUSH_UNREGISTER_PATH: &str = "/unregister-token";

/// Path for the backend health probe.
pub const HEALTH_PATH: &str = "/health";

/// Timeout for a single delivery attempt (ms).
pub const PUSH_ATTEMPT_TIMEOUT_MS: u64 = 15_000;

/// Delivery attempts before giving up.
pub const PUSH_MAX_ATTEMPTS: u32 = 3;

/// Backoff coefficient after a 5xx response (ms per attempt).
pub const PUSH_SERVER_ERROR_BACKOFF_MS: u64 = 3_000;

/// Backoff coefficient after a 4xx, network failure or timeout (ms per attempt).
pub const PUSH_CLIENT_ERROR_BACKOFF_MS: u64 = 5_000;

/// Maximum failed deliveries kept for manual retry.
pub const MAX_FAILED_DELIVERIES: usize = 100;

/// Most recent alert events kept for the status API.
pub const MAX_RECENT_ALERTS: usize = 50;

/// How long shutdown waits for in-flight deliveries before abandoning them.
pub const DELIVERY_DRAIN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Server
// ============================================================================

/// Status API bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";
