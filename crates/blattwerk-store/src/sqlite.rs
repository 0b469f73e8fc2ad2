// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SQLite key-value store with a total byte quota.
//
// Schema:
//   kv(
//     key        TEXT    PRIMARY KEY,
//     value      BLOB    NOT NULL,
//     updated_at TEXT    NOT NULL    -- RFC 3339
//   )

use std::path::Path;

use blattwerk_core::error::{BlattwerkError, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument, warn};

use crate::kv::KeyValueStore;

/// Convert a `rusqlite::Error` into a `BlattwerkError::Storage`.
fn db_err(e: rusqlite::Error) -> BlattwerkError {
    BlattwerkError::Storage(e.to_string())
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY,
    value      BLOB NOT NULL,
    updated_at TEXT NOT NULL
);";

/// Persistent key-value store backed by a single SQLite table.
///
/// The quota counts key and value bytes across the whole table, so an
/// overwrite is measured against everything except the value it replaces.
pub struct SqliteStore {
    conn: Connection,
    quota_bytes: u64,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), quota_bytes = quota_bytes))]
    pub fn open(path: impl AsRef<Path>, quota_bytes: u64) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("key-value store opened");
        Ok(Self { conn, quota_bytes })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory(quota_bytes: u64) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn, quota_bytes })
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }

    /// Bytes currently used by every key except `excluding`.
    fn used_bytes_excluding(&self, excluding: &str) -> Result<u64> {
        let used: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(value)), 0)
                 FROM kv WHERE key != ?1",
                params![excluding],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(u64::try_from(used).unwrap_or(0))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    #[instrument(skip(self, value), fields(value_len = value.len()))]
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let size = (key.len() + value.len()) as u64;
        let used = self.used_bytes_excluding(key)?;
        if used + size > self.quota_bytes {
            warn!(used, size, quota = self.quota_bytes, "Write exceeds storage quota");
            return Err(BlattwerkError::StorageQuotaExceeded {
                key: key.to_string(),
                size,
                quota: self.quota_bytes,
            });
        }

        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        debug!("value stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv ORDER BY key ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut keys = Vec::new();
        for row in rows {
            let key = row.map_err(db_err)?;
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
