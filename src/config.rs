use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub udp: UdpConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UdpConfig {
    #[serde(default = "default_udp_bind")]
    pub bind: String,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: default_udp_bind(),
        }
    }
}

fn default_udp_bind() -> String {
    "0.0.0.0:14551".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_web_bind(),
        }
    }
}

fn default_web_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Longest a single frame write to one subscriber may take.
    #[serde(
        default = "default_send_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub send_timeout: Duration,
    /// Samples buffered between the UDP listener and the dispatcher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_timeout: default_send_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_queue_capacity() -> usize {
    1024
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

/// Parameters of the circular flight path flown by the simulated vehicle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub lat_base: f64,
    pub lon_base: f64,
    /// Circle radius, in degrees.
    pub radius: f64,
    /// rad/s
    pub angular_rate: f64,
    pub alt_base: f64,
    pub alt_amplitude: f64,
    pub speed: f64,
    pub battery: u8,
    pub mode: String,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            lat_base: 12.9716,
            lon_base: 77.5946,
            radius: 0.002,
            angular_rate: 0.5,
            alt_base: 50.0,
            alt_amplitude: 10.0,
            speed: 22.5,
            battery: 99,
            mode: "FLYING (GO-LANG)".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }
}
