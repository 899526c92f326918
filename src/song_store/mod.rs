//! Persistence of transcribed songs.

mod models;
mod schema;
mod sqlite_song_store;

pub use models::{
    NewSong, NewTranscription, SavedSong, Song, Transcription, TranscriptionPair,
    MAX_KEY_CHARS, MAX_TITLE_CHARS,
};
pub use schema::SONG_VERSIONED_SCHEMAS;
pub use sqlite_song_store::SqliteSongStore;

use anyhow::Result;

pub trait SongStore: Send + Sync {
    /// Stores a song together with both of its transcriptions.
    /// Everything is written in a single transaction: on Err nothing is stored.
    /// Returns Err if validation fails or there is a database error.
    fn save_song(&self, song: &NewSong, transcriptions: &TranscriptionPair) -> Result<SavedSong>;

    /// Returns all songs, newest first.
    fn list_songs(&self) -> Result<Vec<Song>>;

    /// Returns Ok(None) if the song does not exist.
    /// Returns Err if there is a database error.
    fn get_song(&self, id: i64) -> Result<Option<Song>>;

    /// Returns the transcriptions of a song in the order they were stored.
    /// An unknown song has no transcriptions.
    fn get_transcriptions(&self, song_id: i64) -> Result<Vec<Transcription>>;

    /// Deletes a song and, through the foreign key, its transcriptions.
    /// Returns Ok(false) if the song does not exist.
    fn delete_song(&self, id: i64) -> Result<bool>;
}
