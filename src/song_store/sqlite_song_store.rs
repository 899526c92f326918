use super::models::{NewSong, SavedSong, Song, Transcription, TranscriptionPair};
use super::schema::SONG_VERSIONED_SCHEMAS;
use super::SongStore;
use crate::sqlite_persistence::{open_versioned, DatabaseLocation};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqliteSongStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSongStore {
    pub fn new(location: &DatabaseLocation) -> Result<Self> {
        let conn = open_versioned(location, SONG_VERSIONED_SCHEMAS)
            .with_context(|| format!("Failed to open song database at {}", location))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(&DatabaseLocation::InMemory)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Song database connection lock is poisoned"))
    }

    fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
        Ok(Song {
            id: row.get("id")?,
            title: row.get("title")?,
            original_key: row.get("original_key")?,
            created_at: row.get("created_at")?,
            notes: row.get("notes")?,
        })
    }

    fn row_to_transcription(row: &rusqlite::Row) -> rusqlite::Result<Transcription> {
        Ok(Transcription {
            id: row.get("id")?,
            song_id: row.get("song_id")?,
            target_key: row.get("target_key")?,
            sheet_data: row.get("sheet_data")?,
            created_at: row.get("created_at")?,
        })
    }

    fn query_song(conn: &Connection, id: i64) -> Result<Option<Song>> {
        conn.query_row(
            "SELECT id, title, original_key, created_at, notes FROM songs WHERE id = ?1",
            params![id],
            Self::row_to_song,
        )
        .optional()
        .context("Failed to load song")
    }

    fn query_transcriptions(conn: &Connection, song_id: i64) -> Result<Vec<Transcription>> {
        let mut stmt = conn.prepare(
            "SELECT id, song_id, target_key, sheet_data, created_at
             FROM transcriptions WHERE song_id = ?1 ORDER BY id ASC",
        )?;
        let transcriptions = stmt
            .query_map(params![song_id], Self::row_to_transcription)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transcriptions)
    }
}

impl SongStore for SqliteSongStore {
    fn save_song(&self, song: &NewSong, transcriptions: &TranscriptionPair) -> Result<SavedSong> {
        song.validate()?;
        transcriptions.validate()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO songs (title, original_key, notes) VALUES (?1, ?2, ?3)",
            params![song.title, song.original_key, song.notes],
        )
        .context("Failed to insert song")?;
        let song_id = tx.last_insert_rowid();

        for transcription in transcriptions.iter() {
            tx.execute(
                "INSERT INTO transcriptions (song_id, target_key, sheet_data) VALUES (?1, ?2, ?3)",
                params![song_id, transcription.target_key, transcription.sheet_data],
            )
            .context("Failed to insert transcription")?;
        }

        let saved_song = Self::query_song(&tx, song_id)?
            .ok_or_else(|| anyhow!("Song {} vanished while saving", song_id))?;
        let saved_transcriptions = Self::query_transcriptions(&tx, song_id)?;
        tx.commit().context("Failed to commit song")?;

        info!(
            "Saved song {} {:?} with {} transcriptions",
            song_id,
            saved_song.title,
            saved_transcriptions.len()
        );
        Ok(SavedSong {
            song: saved_song,
            transcriptions: saved_transcriptions,
        })
    }

    fn list_songs(&self) -> Result<Vec<Song>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, original_key, created_at, notes
             FROM songs ORDER BY created_at DESC, id DESC",
        )?;
        let songs = stmt
            .query_map([], Self::row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Listed {} songs", songs.len());
        Ok(songs)
    }

    fn get_song(&self, id: i64) -> Result<Option<Song>> {
        let conn = self.lock()?;
        Self::query_song(&conn, id)
    }

    fn get_transcriptions(&self, song_id: i64) -> Result<Vec<Transcription>> {
        let conn = self.lock()?;
        Self::query_transcriptions(&conn, song_id)
    }

    fn delete_song(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM songs WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!("Deleted song {}", id);
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song_store::NewTranscription;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    fn new_song(title: &str) -> NewSong {
        NewSong {
            title: title.to_string(),
            original_key: Some("D major".to_string()),
            notes: Some("recorded at rehearsal".to_string()),
        }
    }

    fn pair() -> TranscriptionPair {
        TranscriptionPair {
            original: NewTranscription {
                target_key: "D major".to_string(),
                sheet_data: r#"{"notes":[62]}"#.to_string(),
            },
            transposed: NewTranscription {
                target_key: "C".to_string(),
                sheet_data: r#"{"notes":[60]}"#.to_string(),
            },
        }
    }

    fn count(store: &SqliteSongStore, table: &str) -> i64 {
        let conn = store.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn save_writes_one_song_and_two_transcriptions() {
        let store = SqliteSongStore::in_memory().unwrap();
        let saved = store.save_song(&new_song("Summertime"), &pair()).unwrap();

        assert_eq!(saved.song.title, "Summertime");
        assert_eq!(saved.song.original_key.as_deref(), Some("D major"));
        assert!(saved.song.created_at > 0);
        assert_eq!(saved.transcriptions.len(), 2);
        assert_eq!(saved.transcriptions[0].target_key, "D major");
        assert_eq!(saved.transcriptions[1].target_key, "C");
        assert!(saved
            .transcriptions
            .iter()
            .all(|t| t.song_id == saved.song.id));

        assert_eq!(count(&store, "songs"), 1);
        assert_eq!(count(&store, "transcriptions"), 2);
    }

    #[test]
    fn failed_save_leaves_nothing_behind() {
        let store = SqliteSongStore::in_memory().unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute("DROP TABLE transcriptions", []).unwrap();
        }
        assert!(store.save_song(&new_song("Broken"), &pair()).is_err());
        assert_eq!(count(&store, "songs"), 0);
    }

    #[test]
    fn invalid_input_is_rejected_before_sql() {
        let store = SqliteSongStore::in_memory().unwrap();
        assert!(store.save_song(&new_song(""), &pair()).is_err());

        let mut long_key = pair();
        long_key.transposed.target_key = "Bb major!!!".to_string();
        assert!(store.save_song(&new_song("Tune"), &long_key).is_err());
        assert_eq!(count(&store, "songs"), 0);
    }

    #[test]
    fn lists_newest_first() {
        let store = SqliteSongStore::in_memory().unwrap();
        let first = store.save_song(&new_song("First"), &pair()).unwrap();
        let second = store.save_song(&new_song("Second"), &pair()).unwrap();

        let songs = store.list_songs().unwrap();
        let ids: Vec<i64> = songs.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.song.id, first.song.id]);
    }

    #[test]
    fn get_song_and_transcriptions() {
        let store = SqliteSongStore::in_memory().unwrap();
        let saved = store.save_song(&new_song("Tune"), &pair()).unwrap();

        assert_eq!(store.get_song(saved.song.id).unwrap(), Some(saved.song.clone()));
        assert_eq!(store.get_song(9999).unwrap(), None);
        assert_eq!(
            store.get_transcriptions(saved.song.id).unwrap(),
            saved.transcriptions
        );
        assert!(store.get_transcriptions(9999).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_song_cascades() {
        let store = SqliteSongStore::in_memory().unwrap();
        let saved = store.save_song(&new_song("Tune"), &pair()).unwrap();

        assert!(store.delete_song(saved.song.id).unwrap());
        assert!(!store.delete_song(saved.song.id).unwrap());
        assert_eq!(count(&store, "transcriptions"), 0);
    }

    #[test]
    fn reopens_existing_database() {
        let dir = TempDir::new().unwrap();
        let location = DatabaseLocation::File(dir.path().join("songs.db"));
        {
            let store = SqliteSongStore::new(&location).unwrap();
            store.save_song(&new_song("Persisted"), &pair()).unwrap();
        }
        let store = SqliteSongStore::new(&location).unwrap();
        let songs = store.list_songs().unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].title, "Persisted");
    }

    #[test]
    fn migrates_v1_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs.db");
        {
            let conn = Connection::open(&path).unwrap();
            SONG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        }

        let store = SqliteSongStore::new(&DatabaseLocation::File(path)).unwrap();
        let conn = store.lock().unwrap();
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, BASE_DB_VERSION + 2);
        SONG_VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn drifted_schema_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs.db");
        {
            let conn = Connection::open(&path).unwrap();
            SONG_VERSIONED_SCHEMAS[1].create(&conn).unwrap();
            conn.execute("ALTER TABLE songs ADD COLUMN rating INTEGER", [])
                .unwrap();
        }
        let result = SqliteSongStore::new(&DatabaseLocation::File(path));
        assert!(result.is_err());
        let err = format!("{:#}", result.err().unwrap());
        assert!(err.contains("validation failed"), "{}", err);
    }
}
