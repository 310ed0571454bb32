use serde::{Deserialize, Serialize};

/// One telemetry snapshot as broadcast to dashboard clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub heading: f64,
    pub speed: f64,
    pub battery: u8,
    pub mode: String,
}
