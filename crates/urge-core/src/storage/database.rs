//! SQLite-backed durable store.
//!
//! Provides persistent storage for:
//! - The shared key-value space (allowances, countdown end, flags)
//! - The usage event log read by the statistics view

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use super::{data_dir, Store, UsageLog, Write};
use crate::error::StoreError;
use crate::stats::{UsageKind, UsageRecord};

/// SQLite database holding the key-value store and the usage log.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/urge/urge.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("urge.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS usage_events (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                at   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_usage_events_at ON usage_events(at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl Store for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv_get(key)?)
    }

    fn apply(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        write_kv(&tx, writes)?;
        tx.commit()?;
        Ok(())
    }
}

fn write_kv(tx: &Transaction<'_>, writes: &[Write<'_>]) -> Result<(), StoreError> {
    for (key, value) in writes {
        match value {
            Some(v) => {
                tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                    params![key, v],
                )?;
            }
            None => {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            }
        }
    }
    Ok(())
}

impl UsageLog for Database {
    fn record_usage(&mut self, record: &UsageRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO usage_events (kind, at) VALUES (?1, ?2)",
            params![record.kind.as_str(), record.at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn usage_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, at FROM usage_events ORDER BY at ASC, id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (kind, at) = row?;
            let kind = kind.parse::<UsageKind>().map_err(|_| StoreError::Corrupt {
                key: "usage_events.kind".to_string(),
                value: kind.clone(),
            })?;
            let at = DateTime::parse_from_rfc3339(&at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| StoreError::Corrupt {
                    key: "usage_events.at".to_string(),
                    value: at.clone(),
                })?;
            records.push(UsageRecord { kind, at });
        }
        Ok(records)
    }

    fn clear_usage(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM usage_events", [])?;
        Ok(())
    }

    fn wipe(&mut self, writes: &[Write<'_>]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        write_kv(&tx, writes)?;
        tx.execute("DELETE FROM usage_events", [])?;
        tx.commit()?;
        Ok(())
    }
}
