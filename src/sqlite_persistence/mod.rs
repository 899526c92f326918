mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Where a SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

impl DatabaseLocation {
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, `sqlite::memory:`,
    /// `:memory:` or a bare path. Any other URL scheme is rejected.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            bail!("Database URL is empty");
        }
        if url == ":memory:" || url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(DatabaseLocation::InMemory);
        }
        if let Some(path) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                bail!("Database URL {:?} has no path", url);
            }
            return Ok(DatabaseLocation::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            bail!(
                "Unsupported database URL scheme {:?}, only sqlite is supported",
                scheme
            );
        }
        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::InMemory => write!(f, ":memory:"),
        }
    }
}

/// Opens the database at `location`, creating it with the latest schema when
/// it is new, or validating and migrating it when it already exists.
pub fn open_versioned(
    location: &DatabaseLocation,
    schemas: &'static [VersionedSchema],
) -> Result<Connection> {
    let latest = schemas
        .last()
        .context("At least one schema version is required")?;

    let (mut conn, is_new_db) = match location {
        DatabaseLocation::InMemory => (Connection::open_in_memory()?, true),
        DatabaseLocation::File(path) => {
            let is_new_db = !path.exists();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {:?}", parent)
                })?;
            }
            let conn = Connection::open(path)
                .with_context(|| format!("Failed to open database at {:?}", path))?;
            (conn, is_new_db)
        }
    };
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    if is_new_db {
        info!("Creating new database at {}", location);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        bail!(
            "Database version {} at {} is invalid (expected >= 1)",
            db_version,
            location
        );
    }

    let version_index = schemas
        .iter()
        .position(|s| s.version as i64 == db_version)
        .with_context(|| format!("Unknown database version {}", db_version))?;
    schemas[version_index].validate(&conn).with_context(|| {
        format!(
            "Database schema validation failed for version {}",
            db_version
        )
    })?;

    if (db_version as usize) < latest.version {
        info!(
            "Migrating database from version {} to {}",
            db_version, latest.version
        );
        migrate_if_needed(&mut conn, schemas, db_version as usize)?;
    }
    Ok(conn)
}

fn migrate_if_needed(
    conn: &mut Connection,
    schemas: &[VersionedSchema],
    from_version: usize,
) -> Result<()> {
    let tx = conn.transaction()?;
    let mut latest_from = from_version;
    for schema in schemas.iter().filter(|s| s.version > from_version) {
        info!(
            "Running database migration from version {} to {}",
            latest_from, schema.version
        );
        if let Some(migration_fn) = schema.migration {
            migration_fn(&tx).with_context(|| {
                format!("Failed to run migration to version {}", schema.version)
            })?;
        }
        latest_from = schema.version;
    }
    tx.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
        [],
    )?;
    tx.commit()?;
    Ok(())
}
