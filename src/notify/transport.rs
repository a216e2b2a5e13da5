//! Push gateway transport: one HTTP POST per call, no retries.
//!
//! Retries and the per-attempt timeout belong to the dispatcher, which drops
//! the in-flight future when an attempt runs out of time.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::retry::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("push gateway returned HTTP {0}")]
    Status(u16),
    #[error("push gateway unreachable: {0}")]
    Network(String),
}

impl TransportError {
    pub const fn kind(&self) -> FailureKind {
        match self {
            TransportError::Status(code) => FailureKind::from_status(*code),
            TransportError::Network(_) => FailureKind::Network,
        }
    }
}

/// Posts JSON bodies to paths under the push gateway.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// POST `body` to `path` (relative to the gateway base URL).
    /// `Ok` only for 2xx.
    async fn post(&self, path: &str, body: &Value) -> Result<(), TransportError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpPushTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPushTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get base URL for logging
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<(), TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        debug!(url = %url, status = status.as_u16(), "Push gateway responded");
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }
}
