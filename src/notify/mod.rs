//! Push notification delivery
//!
//! - `retry`: the backoff ladder
//! - `transport`: one-shot HTTP POSTs to the push gateway
//! - `dispatcher`: retrying delivery of alert events and token registrations

pub mod dispatcher;
pub mod retry;
pub mod transport;

pub use dispatcher::{AlertSink, DeliveryReport, NotificationDispatcher};
pub use retry::{FailureKind, RetryPolicy};
pub use transport::{HttpPushTransport, PushTransport, TransportError};
