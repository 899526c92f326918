//! From an uploaded recording to a stored transcription.
//!
//! [`TranscriptionPipeline`] decodes and resamples the upload, extracts the
//! melody, estimates its key and transposes it. The result stays in memory
//! until [`save_transcription`] writes it to a [`crate::song_store::SongStore`].

mod melody;
mod pipeline;

pub use melody::extract_melody;
pub use pipeline::{save_transcription, TranscriptionPipeline};

use crate::audio::{AudioError, TrackerSettings, DEFAULT_SAMPLE_RATE};
use crate::music::{
    Key, KeyEstimate, MusicError, Score, DEFAULT_FRAME_QUARTER_LENGTH,
};
use crate::song_store::{NewSong, NewTranscription, TranscriptionPair, MAX_TITLE_CHARS};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("No melody could be detected in the recording")]
    NoMelody,

    #[error(transparent)]
    Music(#[from] MusicError),

    #[error("Failed to save transcription: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub sample_rate: u32,
    pub frame_quarter_length: f64,
    pub tracker: TrackerSettings,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_quarter_length: DEFAULT_FRAME_QUARTER_LENGTH,
            tracker: TrackerSettings::default(),
        }
    }
}

/// Raw bytes of an uploaded recording.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// Used as a format hint when present.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptionRequest {
    pub title: String,
    pub notes: Option<String>,
    /// Key name such as `"Bb"`. The suggested key is used when missing.
    pub target_key: Option<String>,
}

impl TranscriptionRequest {
    /// Checks the request and resolves the target key, if one was given.
    pub fn validate(&self) -> Result<Option<Key>, PipelineError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "a title is required".to_string(),
            ));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(PipelineError::InvalidRequest(format!(
                "the title is longer than {} characters",
                MAX_TITLE_CHARS
            )));
        }
        match self.target_key.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => Ok(Some(Key::parse(name)?)),
        }
    }
}

/// Progress notifications emitted while a recording is analyzed.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    DecodingAudio,
    ExtractingMelody,
    MelodyExtracted { note_count: usize },
    KeyEstimated { label: String },
    KeySuggested { key: Key },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::DecodingAudio => write!(f, "Decoding audio..."),
            PipelineEvent::ExtractingMelody => write!(f, "Extracting melody..."),
            PipelineEvent::MelodyExtracted { note_count } => {
                write!(f, "Extracted {} notes", note_count)
            }
            PipelineEvent::KeyEstimated { label } => write!(f, "Estimated key: {}", label),
            PipelineEvent::KeySuggested { key } => write!(f, "Suggested key: {}", key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MelodyAnalysis {
    pub score: Score,
    pub key_estimate: KeyEstimate,
    pub suggested_key: Key,
    pub audio_duration_secs: f64,
}

impl MelodyAnalysis {
    /// Key label of the recording, e.g. `"D major"`.
    pub fn original_key_label(&self) -> String {
        self.key_estimate.label()
    }

    /// Key signature used to display the untransposed score.
    pub fn original_signature(&self) -> Key {
        self.key_estimate.signature_key()
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub title: String,
    pub notes: Option<String>,
    pub analysis: MelodyAnalysis,
    pub target_key: Key,
    pub transposed: Score,
}

impl TranscriptionResult {
    pub fn original_score(&self) -> &Score {
        &self.analysis.score
    }

    /// The song row and its two transcriptions, original first.
    pub fn to_records(&self) -> Result<(NewSong, TranscriptionPair), PipelineError> {
        let original_key = self.analysis.original_key_label();
        let song = NewSong {
            title: self.title.trim().to_string(),
            original_key: Some(original_key.clone()),
            notes: self.notes.clone(),
        };
        let pair = TranscriptionPair {
            original: NewTranscription {
                target_key: original_key,
                sheet_data: self.analysis.score.to_sheet_data()?,
            },
            transposed: NewTranscription {
                target_key: self.target_key.name().to_string(),
                sheet_data: self.transposed.to_sheet_data()?,
            },
        };
        Ok((song, pair))
    }
}
