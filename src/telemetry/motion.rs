use std::time::{Duration, Instant};

use crate::config::MotionConfig;

use super::sample::TelemetrySample;

/// Parametric circle with a sinusoidal altitude, driven by monotonic
/// time since the model was created.
#[derive(Debug, Clone)]
pub struct MotionModel {
    started_at: Instant,
    config: MotionConfig,
}

impl MotionModel {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            started_at: Instant::now(),
            config,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Sample at the current instant.
    pub fn sample(&self) -> TelemetrySample {
        self.sample_at(self.elapsed())
    }

    pub fn sample_at(&self, elapsed: Duration) -> TelemetrySample {
        let c = &self.config;
        let theta = c.angular_rate * elapsed.as_secs_f64();
        let (sin, cos) = theta.sin_cos();

        // Heading is always zero.
        TelemetrySample {
            lat: c.lat_base + c.radius * sin,
            lon: c.lon_base + c.radius * cos,
            alt: c.alt_base + c.alt_amplitude * sin,
            heading: 0.0,
            speed: c.speed,
            battery: c.battery,
            mode: c.mode.clone(),
        }
    }
}
