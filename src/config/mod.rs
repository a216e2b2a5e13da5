//! Watch Configuration Module
//!
//! Loads the observation point, zone radii, refresh timing, feed and push
//! gateway settings from TOML, replacing every hardcoded constant with an
//! operator-tunable value.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag (fails hard if the file is bad)
//! 2. `SHIPWATCH_CONFIG` environment variable
//! 3. `shipwatch.toml` in the current working directory
//! 4. Built-in defaults (`config::defaults`)
//!
//! The config is passed by value into each component at startup; nothing in
//! the engine reads it globally.

mod watch_config;
pub mod defaults;
pub mod validation;

pub use watch_config::*;
