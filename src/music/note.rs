use super::MusicError;
use serde::{Deserialize, Serialize};

/// A pitched note with a duration in quarter lengths.
///
/// The duration is always positive and finite, both when built with
/// [`NoteEvent::new`] and when deserialized from stored sheet data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoteEvent")]
pub struct NoteEvent {
    pitch: i32,
    duration: f64,
}

#[derive(Deserialize)]
struct RawNoteEvent {
    pitch: i32,
    duration: f64,
}

impl TryFrom<RawNoteEvent> for NoteEvent {
    type Error = MusicError;

    fn try_from(raw: RawNoteEvent) -> Result<Self, Self::Error> {
        NoteEvent::new(raw.pitch, raw.duration)
    }
}

impl NoteEvent {
    pub fn new(pitch: i32, duration: f64) -> Result<Self, MusicError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MusicError::InvalidDuration(duration));
        }
        Ok(Self { pitch, duration })
    }

    /// Callers must have checked the duration already.
    pub(super) fn with_checked_duration(pitch: i32, duration: f64) -> Self {
        debug_assert!(duration.is_finite() && duration > 0.0);
        Self { pitch, duration }
    }

    pub fn pitch(&self) -> i32 {
        self.pitch
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn transposed(&self, semitones: i32) -> Self {
        Self {
            pitch: self.pitch + semitones,
            duration: self.duration,
        }
    }
}
