//! Paging cursor persistence.
//!
//! Keeps the paging context of every in-flight import in SQLite, keyed by
//! plugin name and config id, so an import resumes after a restart. A
//! completed import has no row: loading it yields an empty cursor, which
//! starts a fresh import.

use crate::page::ImportCursor;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One stored cursor.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredCursor {
    pub plugin: String,
    pub config_id: String,
    pub cursor: ImportCursor,
    pub updated_at: DateTime<Utc>,
}

/// Persists import cursors in SQLite.
pub struct CursorStore {
    conn: Mutex<Connection>,
}

impl CursorStore {
    /// Opens (or creates) the SQLite database and ensures the table exists.
    ///
    /// `":memory:"` gives a private in-memory database.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open cursor DB at {}", db_path))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> Result<()> {
        self.lock()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS import_cursors (
                    plugin      TEXT NOT NULL,
                    config_id   TEXT NOT NULL,
                    cursor_json TEXT NOT NULL,
                    updated_at  TEXT NOT NULL,
                    PRIMARY KEY (plugin, config_id)
                );",
            )
            .context("Failed to create import_cursors table")?;
        Ok(())
    }

    /// Returns the stored cursor, or an empty one if there is none.
    pub fn load(&self, plugin: &str, config_id: &str) -> Result<ImportCursor> {
        let cursor_json: Option<String> = self
            .lock()
            .query_row(
                "SELECT cursor_json FROM import_cursors WHERE plugin = ?1 AND config_id = ?2",
                params![plugin, config_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load import cursor")?;

        match cursor_json {
            Some(json) => ImportCursor::from_json(&json)
                .with_context(|| format!("Stored cursor for {}/{} is corrupt", plugin, config_id)),
            None => Ok(ImportCursor::new()),
        }
    }

    /// Stores `cursor`. An empty cursor deletes the row.
    pub fn save(&self, plugin: &str, config_id: &str, cursor: &ImportCursor) -> Result<()> {
        if cursor.is_empty() {
            return self.delete(plugin, config_id);
        }
        let cursor_json = cursor.to_json()?;
        self.lock()
            .execute(
                "INSERT INTO import_cursors (plugin, config_id, cursor_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (plugin, config_id)
                 DO UPDATE SET cursor_json = excluded.cursor_json, updated_at = excluded.updated_at",
                params![plugin, config_id, cursor_json, Utc::now().to_rfc3339()],
            )
            .context("Failed to save import cursor")?;
        Ok(())
    }

    /// Deletes a stored cursor. No-op if there is none.
    pub fn delete(&self, plugin: &str, config_id: &str) -> Result<()> {
        self.lock()
            .execute(
                "DELETE FROM import_cursors WHERE plugin = ?1 AND config_id = ?2",
                params![plugin, config_id],
            )
            .context("Failed to delete import cursor")?;
        Ok(())
    }

    /// Returns every stored cursor, ordered by plugin and config id.
    pub fn list(&self) -> Result<Vec<StoredCursor>> {
        let rows: Vec<(String, String, String, String)> = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT plugin, config_id, cursor_json, updated_at
                 FROM import_cursors ORDER BY plugin, config_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list import cursors")?
        };

        rows.into_iter()
            .map(|(plugin, config_id, cursor_json, updated_at)| -> Result<StoredCursor> {
                let cursor = ImportCursor::from_json(&cursor_json)?;
                let updated_at = updated_at
                    .parse::<DateTime<Utc>>()
                    .with_context(|| format!("Invalid updated_at for {}/{}", plugin, config_id))?;
                Ok(StoredCursor {
                    plugin,
                    config_id,
                    cursor,
                    updated_at,
                })
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
