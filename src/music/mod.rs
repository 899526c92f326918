mod key;
mod key_analysis;
mod note;
mod pitch;
mod quantizer;
mod score;
mod transpose;

pub use key::{Key, ALL_KEYS, ALTO_SAX_HINTS, SAX_FRIENDLY_KEYS};
pub use key_analysis::{analyze_key, KeyEstimate, KeyFinder, KrumhanslSchmuckler, Mode};
pub use note::NoteEvent;
pub use pitch::{hz_to_midi, midi_to_hz, octave, pitch_class, Accidental, Spelling};
pub use quantizer::{quantize_notes, Quantizer, DEFAULT_FRAME_QUARTER_LENGTH};
pub use score::{create_music_score, Clef, Score, TimeSignature};
pub use transpose::{
    get_available_keys, suggest_best_key, transpose_by, transpose_score, transpose_to_key,
    transposition_interval,
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MusicError {
    #[error("Invalid note duration: {0}")]
    InvalidDuration(f64),

    #[error("Unknown key: {0:?}")]
    UnknownKey(String),

    #[error("Cannot estimate key: {0}")]
    IndeterminateKey(String),

    #[error("Pitch {0} falls outside the MIDI range")]
    PitchOutOfRange(i32),

    #[error("Invalid sheet data: {0}")]
    InvalidSheetData(String),
}
