//! Mindful server: HTTP API, configuration and logging around `mindful-core`.

pub mod api;
pub mod config;
pub mod telemetry;
