//! Single-file JSON backend.
//!
//! Every save rotates the previous file to a `.backup.<timestamp>` sibling
//! (pruned to `max_backups`) and then writes the new document atomically
//! via temp-file + rename, so a crashed or interrupted writer can never
//! leave a half-written state file as the only copy. Corruption on read
//! falls back to the newest parseable backup.
//!
//! Explicit `backup()` copies use a separate `.manual.<timestamp>` suffix:
//! a handle handed to the caller must stay valid however many saves happen
//! afterwards, so rotation pruning never touches them.

use crate::backend::{BackupHandle, StateBackend};
use crate::error::{HiveError, Result};
use crate::io::atomic_write;
use crate::state::SharedState;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct JsonBackend {
    path: PathBuf,
    max_backups: usize,
}

impl JsonBackend {
    pub fn new(path: PathBuf, max_backups: usize) -> Self {
        Self { path, max_backups }
    }

    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("state.json")
    }

    fn backup_prefix(&self) -> String {
        format!("{}.backup.", self.file_name())
    }

    fn new_backup_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.path
            .with_file_name(format!("{}{stamp}", self.backup_prefix()))
    }

    fn new_manual_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        self.path
            .with_file_name(format!("{}.manual.{stamp}", self.file_name()))
    }

    /// Existing backups, newest first (the timestamp suffix is fixed-width,
    /// so lexicographic order is chronological order).
    fn list_backups(&self) -> Vec<PathBuf> {
        let Some(dir) = self.path.parent() else {
            return Vec::new();
        };
        let prefix = self.backup_prefix();
        let mut backups: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        backups.sort();
        backups.reverse();
        backups
    }

    fn rotate_backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.new_backup_path();
        std::fs::copy(&self.path, &backup)?;
        for old in self.list_backups().into_iter().skip(self.max_backups) {
            if let Err(e) = std::fs::remove_file(&old) {
                warn!(path = %old.display(), error = %e, "failed to prune old backup");
            }
        }
        Ok(Some(backup))
    }

    fn parse_file(path: &Path) -> Result<SharedState> {
        let data = std::fs::read_to_string(path)?;
        let state: SharedState = serde_json::from_str(&data)?;
        Ok(state)
    }
}

impl StateBackend for JsonBackend {
    fn save(&self, state: &SharedState) -> Result<()> {
        self.rotate_backup()?;
        let data = serde_json::to_vec_pretty(state)?;
        atomic_write(&self.path, &data)
    }

    fn load(&self) -> Result<Option<SharedState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        match Self::parse_file(&self.path) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable, trying backups");
                for backup in self.list_backups() {
                    match Self::parse_file(&backup) {
                        Ok(state) => {
                            warn!(backup = %backup.display(), "recovered state from backup");
                            return Ok(Some(state));
                        }
                        Err(e) => {
                            warn!(backup = %backup.display(), error = %e, "backup unreadable");
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    fn backup(&self) -> Result<BackupHandle> {
        if !self.path.exists() {
            return Err(HiveError::Persistence(
                "no state file to back up".to_string(),
            ));
        }
        let backup = self.new_manual_path();
        std::fs::copy(&self.path, &backup)?;
        Ok(BackupHandle::File(backup))
    }

    fn restore(&self, handle: &BackupHandle) -> Result<()> {
        let BackupHandle::File(source) = handle else {
            return Err(HiveError::Persistence(
                "json backend cannot restore a history-row handle".to_string(),
            ));
        };
        if !source.exists() {
            return Err(HiveError::BackupNotFound(source.display().to_string()));
        }
        // Parse before overwriting so a bad handle can't clobber good state.
        let state = Self::parse_file(source)?;
        let data = serde_json::to_vec_pretty(&state)?;
        atomic_write(&self.path, &data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
