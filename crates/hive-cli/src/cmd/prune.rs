use crate::output::print_json;
use hive_core::paths;
use hive_inbox::store::MessageStore;
use std::path::Path;

/// Drop messages older than the configured retention window, from both the
/// shared-state document and the inbox store.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (config, manager) = super::open(root)?;
    let retention = config.message_retention();

    let removed = manager.prune_messages(retention);

    let cutoff = chrono::Utc::now() - retention;
    let inbox_removed = if paths::inbox_db_path(root).exists() {
        MessageStore::open(&paths::inbox_db_path(root))?.prune_older_than(cutoff)?
    } else {
        0
    };

    if json {
        print_json(&serde_json::json!({
            "removed": removed,
            "inbox_removed": inbox_removed,
            "retention_days": config.message_retention_days,
        }))?;
    } else {
        println!(
            "Pruned {removed} state message(s) and {inbox_removed} inbox message(s) older than {} day(s)",
            config.message_retention_days
        );
    }
    Ok(())
}
