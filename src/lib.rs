//! Sax Transcriber Library
//!
//! Turns a monophonic recording into a notated melody, picks a saxophone
//! friendly key for it and stores both versions.

pub mod audio;
pub mod config;
pub mod music;
pub mod render;
pub mod server;
pub mod song_store;
pub mod sqlite_persistence;
pub mod transcription;

// Re-export commonly used types for convenience
pub use music::{
    create_music_score, get_available_keys, suggest_best_key, transpose_score, Key, NoteEvent,
    Score,
};
pub use server::{run_server, RequestsLoggingLevel};
pub use song_store::{SongStore, SqliteSongStore};
pub use transcription::{PipelineError, TranscriptionPipeline};
