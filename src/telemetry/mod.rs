mod motion;
mod sample;

pub use motion::MotionModel;
pub use sample::TelemetrySample;
