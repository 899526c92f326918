//! Run-length quantization of pitch frames into notes.
//!
//! Every frame is snapped to the nearest semitone. Consecutive frames on the
//! same semitone collapse into one note whose duration is the run length times
//! the quarter length of a single frame. Only voiced frames reach this stage,
//! so two notes of the same pitch separated by dropped silent frames end up
//! merged into one.
//!
//! A frame without a usable frequency (zero, negative or not finite) is
//! skipped like a silent frame, so the output can be empty for non-empty
//! input made only of such frames.

use super::{hz_to_midi, MusicError, NoteEvent};
use crate::audio::FrequencyFrame;
use tracing::debug;

/// One frame is a sixteenth note.
pub const DEFAULT_FRAME_QUARTER_LENGTH: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    frame_quarter_length: f64,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self {
            frame_quarter_length: DEFAULT_FRAME_QUARTER_LENGTH,
        }
    }
}

impl Quantizer {
    pub fn new(frame_quarter_length: f64) -> Result<Self, MusicError> {
        if !frame_quarter_length.is_finite() || frame_quarter_length <= 0.0 {
            return Err(MusicError::InvalidDuration(frame_quarter_length));
        }
        Ok(Self {
            frame_quarter_length,
        })
    }

    pub fn frame_quarter_length(&self) -> f64 {
        self.frame_quarter_length
    }

    pub fn quantize(&self, frames: &[FrequencyFrame]) -> Vec<NoteEvent> {
        let mut notes = Vec::new();
        let mut run: Option<(i32, usize)> = None;
        let mut skipped = 0usize;

        for frame in frames {
            let Some(pitch) = hz_to_midi(frame.frequency_hz as f64) else {
                skipped += 1;
                continue;
            };
            run = match run {
                Some((current, count)) if current == pitch => Some((current, count + 1)),
                Some((current, count)) => {
                    notes.push(self.note(current, count));
                    Some((pitch, 1))
                }
                None => Some((pitch, 1)),
            };
        }

        if let Some((current, count)) = run {
            notes.push(self.note(current, count));
        }
        if skipped > 0 {
            debug!(
                "Skipped {} of {} frames without a usable frequency",
                skipped,
                frames.len()
            );
        }
        notes
    }

    fn note(&self, pitch: i32, frame_count: usize) -> NoteEvent {
        NoteEvent::with_checked_duration(pitch, frame_count as f64 * self.frame_quarter_length)
    }
}

/// Quantizes with the default sixteenth-note grid.
pub fn quantize_notes(frames: &[FrequencyFrame]) -> Vec<NoteEvent> {
    Quantizer::default().quantize(frames)
}
