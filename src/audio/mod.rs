//! Audio decoding, resampling and pitch tracking.

mod decoder;
mod pitch_tracker;
mod resampler;

pub use decoder::{decode_audio, AudioFormat};
pub use pitch_tracker::{FrequencyFrame, PitchTracker, SpectralPeakTracker, TrackerSettings};
pub use resampler::resample;

use thiserror::Error;

/// Analysis rate used when nothing else is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio input is empty")]
    Empty,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("Failed to resample audio: {0}")]
    Resample(String),

    #[error("Invalid pitch tracker settings: {0}")]
    InvalidSettings(String),
}

/// Single-channel samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
