//! Vessel data acquisition
//!
//! - `feed`: the Vessel Feed Provider trait, response-envelope parsing and
//!   the reqwest-backed HTTP implementation
//! - `normalizer`: upstream record -> `VesselSnapshot` with per-schema
//!   field-mapping tables

pub mod feed;
pub mod normalizer;

pub use feed::{parse_feed_body, FeedBatch, FeedError, HttpVesselFeed, VesselFeed};
pub use normalizer::{normalize_batch, normalize_record, FeedSchema, NormalizedBatch, ValidationError};
