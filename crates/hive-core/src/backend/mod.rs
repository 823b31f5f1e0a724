pub mod json;
pub mod sqlite;

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::state::SharedState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a backup lives: a sibling file for the JSON backend, a history
/// table row for the SQLite backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "ref")]
pub enum BackupHandle {
    File(PathBuf),
    HistoryRow(i64),
}

/// Durable storage for the `SharedState` document.
///
/// Backends are pure serialization targets: they perform no validation and
/// no merging. A failed `save` leaves the previous durable copy intact;
/// the caller decides whether to keep operating on memory alone.
pub trait StateBackend: Send {
    fn save(&self, state: &SharedState) -> Result<()>;

    /// `Ok(None)` means "nothing durable yet" — the caller starts from a
    /// default document.
    fn load(&self) -> Result<Option<SharedState>>;

    fn backup(&self) -> Result<BackupHandle>;

    fn restore(&self, handle: &BackupHandle) -> Result<()>;
}

/// Construct the backend selected by the config, rooted at `root`.
pub fn open_backend(root: &Path, config: &Config) -> Result<Box<dyn StateBackend>> {
    match config.backend {
        BackendKind::Json => Ok(Box::new(json::JsonBackend::new(
            crate::paths::state_path(root),
            config.max_backups,
        ))),
        BackendKind::Sqlite => Ok(Box::new(sqlite::SqliteBackend::open(
            &crate::paths::state_db_path(root),
        )?)),
    }
}
