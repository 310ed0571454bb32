//! Relay that turns UDP datagrams into synthesized telemetry samples and
//! broadcasts them as JSON text frames to WebSocket subscribers.

pub mod config;
pub mod error;
pub mod hub;
pub mod relay;
pub mod telemetry;
pub mod tick;
pub mod web;

pub use config::Config;
pub use error::RelayError;
pub use relay::Relay;
pub use telemetry::TelemetrySample;
