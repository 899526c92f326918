use super::{MusicError, NoteEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl TimeSignature {
    pub const COMMON_TIME: TimeSignature = TimeSignature {
        beats: 4,
        beat_type: 4,
    };

    /// Length of one measure in quarter notes.
    pub fn measure_quarter_length(&self) -> f64 {
        self.beats as f64 * 4.0 / self.beat_type as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    Treble,
}

/// A single-part melody in 4/4 with a treble clef.
///
/// Stored sheet data in any other meter is rejected when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScore")]
pub struct Score {
    time_signature: TimeSignature,
    clef: Clef,
    notes: Vec<NoteEvent>,
}

#[derive(Deserialize)]
struct RawScore {
    time_signature: TimeSignature,
    clef: Clef,
    notes: Vec<NoteEvent>,
}

impl TryFrom<RawScore> for Score {
    type Error = MusicError;

    fn try_from(raw: RawScore) -> Result<Self, Self::Error> {
        if raw.time_signature != TimeSignature::COMMON_TIME {
            return Err(MusicError::InvalidSheetData(format!(
                "unsupported time signature {}/{}",
                raw.time_signature.beats, raw.time_signature.beat_type
            )));
        }
        Ok(Score {
            time_signature: raw.time_signature,
            clef: raw.clef,
            notes: raw.notes,
        })
    }
}

/// Builds a score that holds `notes` in order.
pub fn create_music_score(notes: Vec<NoteEvent>) -> Score {
    Score {
        time_signature: TimeSignature::COMMON_TIME,
        clef: Clef::Treble,
        notes,
    }
}

impl Score {
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn clef(&self) -> Clef {
        self.clef
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.notes.iter().map(NoteEvent::duration).sum()
    }

    /// Same layout, different notes.
    pub(super) fn with_notes(&self, notes: Vec<NoteEvent>) -> Score {
        Score {
            time_signature: self.time_signature,
            clef: self.clef,
            notes,
        }
    }

    /// JSON form stored in `transcriptions.sheet_data`.
    pub fn to_sheet_data(&self) -> Result<String, MusicError> {
        serde_json::to_string(self).map_err(|e| MusicError::InvalidSheetData(e.to_string()))
    }

    pub fn from_sheet_data(sheet_data: &str) -> Result<Score, MusicError> {
        serde_json::from_str(sheet_data).map_err(|e| MusicError::InvalidSheetData(e.to_string()))
    }
}
