//! SQLite schema for songs and their transcriptions.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use anyhow::Result;
use rusqlite::Connection;

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 1 - Songs and transcriptions
// =============================================================================

const SONGS_TABLE_V1: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("original_key", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("notes", &SqlType::Text),
    ],
    indices: &[],
};

const TRANSCRIPTIONS_TABLE_V1: Table = Table {
    name: "transcriptions",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!("target_key", &SqlType::Text, non_null = true),
        sqlite_column!("sheet_data", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

// =============================================================================
// Version 2 - Indices for listing songs and loading their transcriptions
// =============================================================================

const SONGS_TABLE_V2: Table = Table {
    indices: &[("idx_songs_created_at", "created_at DESC, id DESC")],
    ..SONGS_TABLE_V1
};

const TRANSCRIPTIONS_TABLE_V2: Table = Table {
    indices: &[("idx_transcriptions_song_id", "song_id")],
    ..TRANSCRIPTIONS_TABLE_V1
};

fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    SONGS_TABLE_V2.create_indices(conn)?;
    TRANSCRIPTIONS_TABLE_V2.create_indices(conn)?;
    Ok(())
}

pub const SONG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[SONGS_TABLE_V1, TRANSCRIPTIONS_TABLE_V1],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[SONGS_TABLE_V2, TRANSCRIPTIONS_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let latest = SONG_VERSIONED_SCHEMAS.last().unwrap();
        latest.create(&conn).unwrap();
        latest.validate(&conn).unwrap();
    }

    #[test]
    fn v1_database_fails_v2_validation_until_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        SONG_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        SONG_VERSIONED_SCHEMAS[0].validate(&conn).unwrap();

        let err = SONG_VERSIONED_SCHEMAS[1]
            .validate(&conn)
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing index"), "{}", err);

        migrate_v1_to_v2(&conn).unwrap();
        SONG_VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }
}
