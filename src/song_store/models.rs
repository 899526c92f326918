//! Song and transcription records.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_KEY_CHARS: usize = 10;

/// A song about to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSong {
    pub title: String,
    /// Estimated key label, e.g. `"D major"`.
    pub original_key: Option<String>,
    pub notes: Option<String>,
}

impl NewSong {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            bail!("Song title is required");
        }
        let title_chars = self.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            bail!(
                "Song title is {} characters long, the limit is {}",
                title_chars,
                MAX_TITLE_CHARS
            );
        }
        if let Some(key) = &self.original_key {
            validate_key_label("original_key", key)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTranscription {
    pub target_key: String,
    /// JSON-serialized score.
    pub sheet_data: String,
}

impl NewTranscription {
    pub fn validate(&self) -> Result<()> {
        validate_key_label("target_key", &self.target_key)?;
        if self.sheet_data.is_empty() {
            bail!("Transcription sheet data is required");
        }
        Ok(())
    }
}

/// The two transcriptions stored with every song: as played and transposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionPair {
    pub original: NewTranscription,
    pub transposed: NewTranscription,
}

impl TranscriptionPair {
    pub fn validate(&self) -> Result<()> {
        self.original.validate()?;
        self.transposed.validate()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NewTranscription> {
        [&self.original, &self.transposed].into_iter()
    }
}

fn validate_key_label(field: &str, key: &str) -> Result<()> {
    if key.trim().is_empty() {
        bail!("{} is required", field);
    }
    let chars = key.chars().count();
    if chars > MAX_KEY_CHARS {
        bail!(
            "{} {:?} is {} characters long, the limit is {}",
            field,
            key,
            chars,
            MAX_KEY_CHARS
        );
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub original_key: Option<String>,
    /// Unix seconds, set by the database.
    pub created_at: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: i64,
    pub song_id: i64,
    pub target_key: String,
    pub sheet_data: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSong {
    pub song: Song,
    pub transcriptions: Vec<Transcription>,
}
