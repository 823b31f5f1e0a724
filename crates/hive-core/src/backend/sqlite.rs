//! SQLite backend.
//!
//! # Table design
//!
//! `snapshot` holds the current document under a fixed row id 1; `history`
//! is append-only, one full snapshot per save, for audit and restore.
//! Full snapshots rather than diffs keep the restore path a single row
//! read. The `history` max row id doubles as the backup handle.

use crate::backend::{BackupHandle, StateBackend};
use crate::error::{HiveError, Result};
use crate::state::SharedState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshot (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 saved_at TEXT NOT NULL,
                 document TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS history (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 saved_at TEXT NOT NULL,
                 document TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn parse(document: &str) -> Result<SharedState> {
        let state: SharedState = serde_json::from_str(document)?;
        Ok(state)
    }
}

impl StateBackend for SqliteBackend {
    fn save(&self, state: &SharedState) -> Result<()> {
        let document = serde_json::to_string(state)?;
        let saved_at = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().expect("sqlite lock poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshot (id, saved_at, document) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET saved_at = ?1, document = ?2",
            params![saved_at, document],
        )?;
        tx.execute(
            "INSERT INTO history (saved_at, document) VALUES (?1, ?2)",
            params![saved_at, document],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> Result<Option<SharedState>> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let document: Option<String> = conn
            .query_row("SELECT document FROM snapshot WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(document) = document else {
            return Ok(None);
        };

        match Self::parse(&document) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(error = %e, "snapshot row unreadable, trying history");
                let mut stmt =
                    conn.prepare("SELECT id, document FROM history ORDER BY id DESC")?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })?;
                for row in rows {
                    let (id, document) = row?;
                    match Self::parse(&document) {
                        Ok(state) => {
                            warn!(history_row = id, "recovered state from history");
                            return Ok(Some(state));
                        }
                        Err(e) => warn!(history_row = id, error = %e, "history row unreadable"),
                    }
                }
                Ok(None)
            }
        }
    }

    fn backup(&self) -> Result<BackupHandle> {
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let id: Option<i64> = conn
            .query_row("SELECT MAX(id) FROM history", [], |row| row.get(0))
            .optional()?
            .flatten();
        match id {
            Some(id) => Ok(BackupHandle::HistoryRow(id)),
            None => Err(HiveError::Persistence(
                "no saved state to back up".to_string(),
            )),
        }
    }

    fn restore(&self, handle: &BackupHandle) -> Result<()> {
        let BackupHandle::HistoryRow(id) = handle else {
            return Err(HiveError::Persistence(
                "sqlite backend cannot restore a file handle".to_string(),
            ));
        };
        let conn = self.conn.lock().expect("sqlite lock poisoned");
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM history WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(document) = document else {
            return Err(HiveError::BackupNotFound(format!("history row {id}")));
        };
        // Validates before overwriting the snapshot.
        Self::parse(&document)?;
        conn.execute(
            "INSERT INTO snapshot (id, saved_at, document) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET saved_at = ?1, document = ?2",
            params![Utc::now().to_rfc3339(), document],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::task::TaskInfo;
    use crate::types::Priority;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, SqliteBackend) {
        let dir = TempDir::new().unwrap();
        let backend = SqliteBackend::open(&dir.path().join("state.db")).unwrap();
        (dir, backend)
    }

    fn sample_state(n: usize) -> SharedState {
        let mut state = SharedState::new();
        for i in 0..n {
            state.insert_agent(AgentState::new(format!("agent-{i}"), format!("Agent {i}")));
            state.insert_task(TaskInfo::new(format!("task {i}"), Priority::Low));
        }
        state
    }

    #[test]
    fn save_load_roundtrip() {
        let (_dir, backend) = open_tmp();
        backend.save(&sample_state(4)).unwrap();
        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded.agents.len(), 4);
        assert_eq!(loaded.tasks.len(), 4);
    }

    #[test]
    fn empty_db_loads_none() {
        let (_dir, backend) = open_tmp();
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn every_save_appends_history() {
        let (_dir, backend) = open_tmp();
        backend.save(&sample_state(1)).unwrap();
        backend.save(&sample_state(2)).unwrap();
        backend.save(&sample_state(3)).unwrap();

        let conn = backend.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn backup_and_restore_history_row() {
        let (_dir, backend) = open_tmp();
        backend.save(&sample_state(2)).unwrap();
        let handle = backend.backup().unwrap();

        backend.save(&sample_state(7)).unwrap();
        backend.restore(&handle).unwrap();

        let restored = backend.load().unwrap().unwrap();
        assert_eq!(restored.agents.len(), 2);
    }

    #[test]
    fn backup_on_empty_db_fails() {
        let (_dir, backend) = open_tmp();
        assert!(backend.backup().is_err());
    }

    #[test]
    fn restore_unknown_row_fails() {
        let (_dir, backend) = open_tmp();
        backend.save(&sample_state(1)).unwrap();
        assert!(matches!(
            backend.restore(&BackupHandle::HistoryRow(999)),
            Err(HiveError::BackupNotFound(_))
        ));
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_history() {
        let (_dir, backend) = open_tmp();
        backend.save(&sample_state(5)).unwrap();
        {
            let conn = backend.conn.lock().unwrap();
            conn.execute("UPDATE snapshot SET document = 'garbage' WHERE id = 1", [])
                .unwrap();
        }
        let recovered = backend.load().unwrap().unwrap();
        assert_eq!(recovered.agents.len(), 5);
    }
}
