//! Durable connection-config store.
//!
//! One SQLite table, `station_configs`, keyed by connection id. Writes are
//! whole-record replacements and happen synchronously with the in-memory
//! update; the registry is the only writer. Live connection state is never
//! written here — only the fields that must survive a restart.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use outpost_core::errors::StorageError;

use crate::types::StationConfig;

/// Current UTC timestamp as ISO-8601.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS station_configs (
    id               TEXT PRIMARY KEY,
    url              TEXT NOT NULL,
    station_id       TEXT NOT NULL,
    interval_minutes INTEGER NOT NULL,
    user_id          TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);
";

/// SQLite-backed store of durable connection configs.
pub struct ConfigStore {
    conn: Mutex<Connection>,
}

impl ConfigStore {
    /// Open (or create) the store at `path`. Parent directories are created
    /// as needed; the schema is applied idempotently.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(?path, "config store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (tests, ephemeral sessions).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist a new config record.
    pub fn insert(&self, config: &StationConfig) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "INSERT INTO station_configs
             (id, url, station_id, interval_minutes, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                config.id.as_str(),
                config.url,
                config.station_id.as_str(),
                config.interval_minutes,
                config.user_id.as_str(),
                config.created_at,
                config.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Replace a record wholesale. Returns `false` if the id is unknown.
    pub fn update(&self, config: &StationConfig) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE station_configs
             SET url = ?2, station_id = ?3, interval_minutes = ?4,
                 user_id = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                config.id.as_str(),
                config.url,
                config.station_id.as_str(),
                config.interval_minutes,
                config.user_id.as_str(),
                config.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a record. Returns `false` if the id is unknown.
    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM station_configs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Fetch one record by id.
    pub fn get(&self, id: &str) -> Result<Option<StationConfig>, StorageError> {
        let conn = self.conn.lock();
        let config = conn
            .query_row(
                "SELECT id, url, station_id, interval_minutes, user_id, created_at, updated_at
                 FROM station_configs WHERE id = ?1",
                params![id],
                config_from_row,
            )
            .optional()?;
        Ok(config)
    }

    /// All records, oldest first.
    pub fn list(&self) -> Result<Vec<StationConfig>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, url, station_id, interval_minutes, user_id, created_at, updated_at
             FROM station_configs ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], config_from_row)?;
        let mut configs = Vec::new();
        for row in rows {
            configs.push(row?);
        }
        Ok(configs)
    }
}

fn config_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StationConfig> {
    Ok(StationConfig {
        id: row.get::<_, String>(0)?.into(),
        url: row.get(1)?,
        station_id: row.get::<_, String>(2)?.into(),
        interval_minutes: row.get(3)?,
        user_id: row.get::<_, String>(4)?.into(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
