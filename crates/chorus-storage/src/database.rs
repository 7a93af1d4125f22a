// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so writes
//! are serialized without an extra lock.

use std::time::Duration;

use chorus_core::ChorusError;
use tracing::{debug, info};

use crate::migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into `ChorusError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ChorusError {
    ChorusError::Storage {
        source: Box::new(e),
    }
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> ChorusError {
    ChorusError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the migrated SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and apply pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ChorusError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }

        // Migrations need a plain rusqlite connection; run them off the runtime.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), ChorusError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            apply_pragmas(&conn, wal_mode).map_err(storage_err)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| ChorusError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(storage_err)?;
        conn.call(move |conn| -> Result<(), rusqlite::Error> { apply_pragmas(conn, wal_mode) })
            .await
            .map_err(map_tr_err)?;

        info!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The shared single-writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), ChorusError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("wal checkpoint complete");
        Ok(())
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        // journal_mode returns a row, so it cannot go through execute_batch.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
