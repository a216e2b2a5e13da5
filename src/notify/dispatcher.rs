//! Notification dispatcher
//!
//! Delivers alert events (and device-token registrations) to the push
//! gateway through a [`PushTransport`], retrying on the ladder described by
//! [`RetryPolicy`]. Every attempt is bounded by `attempt_timeout`; an attempt
//! that runs out of time is dropped and counts as a network-class failure.
//!
//! The same serialized body (same event id) is sent on every attempt so the
//! gateway can drop duplicates if an earlier attempt actually landed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::retry::{FailureKind, RetryPolicy};
use super::transport::PushTransport;
use crate::config::defaults::{PUSH_REGISTER_PATH, PUSH_UNREGISTER_PATH};
use crate::types::{AlertEvent, DeliveryOutcome};

/// Where the engine hands rising-edge events.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn deliver(&self, event: &AlertEvent) -> DeliveryOutcome;
}

/// What happened during one delivery, for status reporting and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: DeliveryOutcome,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Backoff slept between attempts, in order
    pub waits: Vec<Duration>,
    /// Description of the last failure, if any attempt failed
    pub last_error: Option<String>,
}

#[derive(Serialize)]
struct AlertPayload<'a> {
    #[serde(flatten)]
    event: &'a AlertEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

struct AttemptLog {
    succeeded: bool,
    attempts: u32,
    waits: Vec<Duration>,
    last_error: Option<String>,
}

pub struct NotificationDispatcher {
    transport: Arc<dyn PushTransport>,
    policy: RetryPolicy,
    alert_path: String,
    device_token: RwLock<Option<String>>,
}

impl NotificationDispatcher {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        policy: RetryPolicy,
        alert_path: impl Into<String>,
        device_token: Option<String>,
    ) -> Self {
        Self {
            transport,
            policy,
            alert_path: alert_path.into(),
            device_token: RwLock::new(device_token),
        }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Device token known locally, if any.
    pub async fn local_token(&self) -> Option<String> {
        self.device_token.read().await.clone()
    }

    /// Deliver one alert event.
    pub async fn deliver_with_report(&self, event: &AlertEvent) -> DeliveryReport {
        let token = self.local_token().await;
        let body = match serde_json::to_value(AlertPayload {
            event,
            token: token.as_deref(),
        }) {
            Ok(body) => body,
            Err(e) => {
                warn!(track_id = %event.track_id, error = %e, "Failed to serialize alert payload");
                return DeliveryReport {
                    outcome: Self::fallback_outcome(token.is_some()),
                    attempts: 0,
                    waits: Vec::new(),
                    last_error: Some(e.to_string()),
                };
            }
        };

        let log = self.post_with_retry(&self.alert_path, &body).await;
        let outcome = if log.succeeded {
            DeliveryOutcome::Delivered
        } else {
            Self::fallback_outcome(token.is_some())
        };

        match outcome {
            DeliveryOutcome::Delivered => info!(
                event_id = %event.id,
                track_id = %event.track_id,
                vessel = %event.name,
                distance_m = event.distance_meters.round(),
                attempts = log.attempts,
                "Alert delivered"
            ),
            _ => warn!(
                event_id = %event.id,
                track_id = %event.track_id,
                outcome = %outcome,
                attempts = log.attempts,
                error = log.last_error.as_deref().unwrap_or("unknown"),
                "Alert not delivered to gateway"
            ),
        }

        DeliveryReport {
            outcome,
            attempts: log.attempts,
            waits: log.waits,
            last_error: log.last_error,
        }
    }

    /// Register a device token with the gateway. The token is stored locally
    /// once the gateway accepts it.
    pub async fn register_token(&self, token: &str) -> DeliveryReport {
        let body = json!({ "token": token });
        let log = self.post_with_retry(PUSH_REGISTER_PATH, &body).await;

        if log.succeeded {
            *self.device_token.write().await = Some(token.to_string());
            info!(attempts = log.attempts, "Device token registered");
        } else {
            warn!(
                attempts = log.attempts,
                error = log.last_error.as_deref().unwrap_or("unknown"),
                "Device token registration failed"
            );
        }
        self.finish(log).await
    }

    /// Unregister a device token. The local copy is cleared once the gateway
    /// confirms.
    pub async fn unregister_token(&self, token: &str) -> DeliveryReport {
        let body = json!({ "token": token });
        let log = self.post_with_retry(PUSH_UNREGISTER_PATH, &body).await;

        if log.succeeded {
            let mut local = self.device_token.write().await;
            if local.as_deref() == Some(token) {
                *local = None;
            }
            info!(attempts = log.attempts, "Device token unregistered");
        } else {
            warn!(
                attempts = log.attempts,
                error = log.last_error.as_deref().unwrap_or("unknown"),
                "Device token unregistration failed"
            );
        }
        self.finish(log).await
    }

    async fn finish(&self, log: AttemptLog) -> DeliveryReport {
        let outcome = if log.succeeded {
            DeliveryOutcome::Delivered
        } else {
            Self::fallback_outcome(self.device_token.read().await.is_some())
        };
        DeliveryReport {
            outcome,
            attempts: log.attempts,
            waits: log.waits,
            last_error: log.last_error,
        }
    }

    const fn fallback_outcome(has_local_token: bool) -> DeliveryOutcome {
        if has_local_token {
            DeliveryOutcome::DeliveredLocalOnly
        } else {
            DeliveryOutcome::Failed
        }
    }

    async fn post_with_retry(&self, path: &str, body: &Value) -> AttemptLog {
        let mut log = AttemptLog {
            succeeded: false,
            attempts: 0,
            waits: Vec::new(),
            last_error: None,
        };

        for attempt in 1..=self.policy.max_attempts.max(1) {
            log.attempts = attempt;

            let result =
                tokio::time::timeout(self.policy.attempt_timeout, self.transport.post(path, body))
                    .await;

            let kind = match result {
                Ok(Ok(())) => {
                    log.succeeded = true;
                    return log;
                }
                Ok(Err(e)) => {
                    log.last_error = Some(e.to_string());
                    e.kind()
                }
                Err(_) => {
                    log.last_error = Some(format!(
                        "attempt timed out after {}ms",
                        self.policy.attempt_timeout.as_millis()
                    ));
                    FailureKind::Timeout
                }
            };

            if !self.policy.has_attempts_left(attempt) {
                break;
            }

            let delay = self.policy.delay_for(attempt, kind);
            debug!(
                path,
                attempt,
                ?kind,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Push attempt failed, backing off"
            );
            log.waits.push(delay);
            tokio::time::sleep(delay).await;
        }

        log
    }
}

#[async_trait]
impl AlertSink for NotificationDispatcher {
    async fn deliver(&self, event: &AlertEvent) -> DeliveryOutcome {
        self.deliver_with_report(event).await.outcome
    }
}
