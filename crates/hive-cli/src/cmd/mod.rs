pub mod agent;
pub mod backup;
pub mod init;
pub mod message;
pub mod prune;
pub mod serve;
pub mod state;
pub mod task;

use anyhow::Context;
use hive_core::backend::open_backend;
use hive_core::config::Config;
use hive_core::manager::StateManager;
use std::path::Path;

/// Load the config and open the state manager against the configured backend.
pub fn open(root: &Path) -> anyhow::Result<(Config, StateManager)> {
    let config = Config::load(root).context("not a hive project (run `hive init`)")?;
    let backend = open_backend(root, &config)?;
    let manager = StateManager::open(backend).context("failed to open shared state")?;
    Ok((config, manager))
}
