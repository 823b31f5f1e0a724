use crate::output::print_json;
use hive_core::backend::BackupHandle;
use std::path::{Path, PathBuf};

pub fn backup(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let handle = manager.backup()?;

    let printable = match &handle {
        BackupHandle::File(path) => path.display().to_string(),
        BackupHandle::HistoryRow(id) => id.to_string(),
    };
    if json {
        print_json(&serde_json::json!({ "backup": printable }))?;
    } else {
        println!("Backup created: {printable}");
    }
    Ok(())
}

pub fn restore(root: &Path, handle: &str, json: bool) -> anyhow::Result<()> {
    let (config, manager) = super::open(root)?;

    // sqlite backups are history row ids, json backups are file paths
    let handle = match config.backend {
        hive_core::config::BackendKind::Sqlite => BackupHandle::HistoryRow(handle.parse()?),
        hive_core::config::BackendKind::Json => BackupHandle::File(PathBuf::from(handle)),
    };
    manager.restore_from_backup(&handle)?;
    let state = manager.snapshot();

    if json {
        print_json(&serde_json::json!({
            "restored": true,
            "agents": state.agents.len(),
            "tasks": state.tasks.len(),
            "messages": state.messages.len(),
        }))?;
    } else {
        println!(
            "Restored state: {} agents, {} tasks, {} messages",
            state.agents.len(),
            state.tasks.len(),
            state.messages.len()
        );
    }
    Ok(())
}
