//! Frame-wise dominant pitch estimation.
//!
//! [`SpectralPeakTracker`] runs a centered short-time Fourier transform and,
//! in every frame, looks for local maxima of the magnitude spectrum that rise
//! above a fraction of the frame's loudest bin. Each peak is refined with
//! parabolic interpolation and the strongest one becomes the frame's pitch.

use super::{AudioError, MonoAudio};
use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use tracing::debug;

/// Dominant pitch of one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyFrame {
    pub time_index: usize,
    pub frequency_hz: f32,
    pub magnitude: f32,
}

/// Turns a waveform into a sequence of voiced frames.
///
/// Frames without a detectable pitch are left out, so silence yields an empty
/// sequence rather than an error.
pub trait PitchTracker: Send + Sync {
    fn track(&self, audio: &MonoAudio) -> Result<Vec<FrequencyFrame>, AudioError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub n_fft: usize,
    pub hop_length: usize,
    pub fmin: f32,
    pub fmax: f32,
    pub threshold: f32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            fmin: 150.0,
            fmax: 4000.0,
            threshold: 0.1,
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.n_fft < 4 {
            return Err(AudioError::InvalidSettings(format!(
                "n_fft must be at least 4, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(AudioError::InvalidSettings(
                "hop_length must be positive".to_string(),
            ));
        }
        if !(self.fmin > 0.0 && self.fmin < self.fmax) {
            return Err(AudioError::InvalidSettings(format!(
                "expected 0 < fmin < fmax, got fmin={} fmax={}",
                self.fmin, self.fmax
            )));
        }
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(AudioError::InvalidSettings(format!(
                "threshold must be in [0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SpectralPeakTracker {
    settings: TrackerSettings,
}

impl Default for SpectralPeakTracker {
    fn default() -> Self {
        Self {
            settings: TrackerSettings::default(),
        }
    }
}

impl SpectralPeakTracker {
    pub fn new(settings: TrackerSettings) -> Result<Self, AudioError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Periodic Hann window of length `n`.
    fn window(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
            .collect()
    }

    fn peak_in_frame(&self, spectrum: &[f32], sample_rate: u32) -> Option<(f32, f32)> {
        let n_fft = self.settings.n_fft as f32;
        let bin_hz = sample_rate as f32 / n_fft;
        let loudest = spectrum.iter().cloned().fold(0.0f32, f32::max);
        let reference = self.settings.threshold * loudest;

        // Bins at or below the reference are treated as silence.
        let gated: Vec<f32> = spectrum
            .iter()
            .map(|&s| if s > reference { s } else { 0.0 })
            .collect();

        let last = spectrum.len() - 1;
        let mut best: Option<(f32, f32)> = None;
        for k in 1..=last {
            let frequency = k as f32 * bin_hz;
            if frequency < self.settings.fmin || frequency >= self.settings.fmax {
                continue;
            }
            let next = if k == last { gated[k] } else { gated[k + 1] };
            if !(gated[k] > gated[k - 1] && gated[k] >= next) {
                continue;
            }

            let (shift, avg) = if k == last {
                (0.0, 0.0)
            } else {
                let avg = 0.5 * (spectrum[k + 1] - spectrum[k - 1]);
                let curvature = 2.0 * spectrum[k] - spectrum[k + 1] - spectrum[k - 1];
                let shift = if curvature.abs() < f32::MIN_POSITIVE {
                    avg
                } else {
                    avg / curvature
                };
                (shift, avg)
            };
            let magnitude = spectrum[k] + 0.5 * avg * shift;
            if magnitude > 0.0 && best.map_or(true, |(_, m)| magnitude > m) {
                best = Some(((k as f32 + shift) * bin_hz, magnitude));
            }
        }
        best
    }
}

impl PitchTracker for SpectralPeakTracker {
    fn track(&self, audio: &MonoAudio) -> Result<Vec<FrequencyFrame>, AudioError> {
        if audio.sample_rate == 0 {
            return Err(AudioError::InvalidSettings(
                "sample rate must be positive".to_string(),
            ));
        }
        if audio.is_empty() {
            return Ok(vec![]);
        }

        let n_fft = self.settings.n_fft;
        let hop = self.settings.hop_length;
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; audio.samples.len() + 2 * pad];
        padded[pad..pad + audio.samples.len()].copy_from_slice(&audio.samples);
        let frame_count = 1 + padded.len().saturating_sub(n_fft) / hop;

        let window = Self::window(n_fft);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut frames = Vec::new();

        for time_index in 0..frame_count {
            let start = time_index * hop;
            let Some(chunk) = padded.get(start..start + n_fft) else {
                break;
            };
            for ((slot, &sample), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
                *slot = Complex::new(sample * w, 0.0);
            }
            fft.process(&mut buffer);
            let spectrum: Vec<f32> = buffer[..=n_fft / 2].iter().map(|c| c.norm()).collect();

            if let Some((frequency_hz, magnitude)) = self.peak_in_frame(&spectrum, audio.sample_rate)
            {
                if frequency_hz > 0.0 {
                    frames.push(FrequencyFrame {
                        time_index,
                        frequency_hz,
                        magnitude,
                    });
                }
            }
        }

        debug!(
            "Tracked {} voiced frames out of {} ({:.2}s of audio)",
            frames.len(),
            frame_count,
            audio.duration_secs()
        );
        Ok(frames)
    }
}
