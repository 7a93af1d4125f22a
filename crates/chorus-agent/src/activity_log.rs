// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-account activity log file.
//!
//! Lifecycle lines are appended to `<dir>/account_<id>_<YYYYMMDD>.log`. The
//! log is optional: without a directory every call is a no-op.

use std::path::{Path, PathBuf};

use chorus_core::{AccountId, ChorusError};
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

pub struct ActivityLog {
    account_id: AccountId,
    dir: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl ActivityLog {
    pub fn new(account_id: AccountId, dir: Option<&Path>) -> Self {
        Self {
            account_id,
            dir: dir.map(Path::to_path_buf),
            file: Mutex::new(None),
        }
    }

    /// Path of today's log file, if logging is enabled.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| {
            dir.join(format!(
                "account_{}_{}.log",
                self.account_id,
                Utc::now().format("%Y%m%d")
            ))
        })
    }

    /// Create the directory and open the file for appending.
    pub async fn open(&self) -> Result<(), ChorusError> {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.path()) else {
            return Ok(());
        };
        let io_err = |e: std::io::Error| ChorusError::Internal(format!("activity log: {e}"));

        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        *self.file.lock().await = Some(file);
        Ok(())
    }

    /// Append one timestamped line. Write failures are logged, not returned.
    pub async fn record(&self, message: &str) {
        let mut guard = self.file.lock().await;
        let Some(file) = guard.as_mut() else {
            return;
        };
        let line = format!("{} {message}\n", Utc::now().to_rfc3339());
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(account_id = %self.account_id, error = %e, "activity log write failed");
        }
    }

    /// Flush and release the file handle.
    pub async fn close(&self) {
        if let Some(mut file) = self.file.lock().await.take() {
            if let Err(e) = file.flush().await {
                warn!(account_id = %self.account_id, error = %e, "activity log flush failed");
            }
        }
    }
}
