use crate::error::{HiveError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const HIVE_DIR: &str = ".hive";
pub const CONFIG_FILE: &str = ".hive/config.yaml";
pub const STATE_FILE: &str = ".hive/state.json";
pub const STATE_DB: &str = ".hive/state.db";
pub const INBOX_DB: &str = ".hive/inbox.db";
pub const ROUTING_FILE: &str = ".hive/routing.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn hive_dir(root: &Path) -> PathBuf {
    root.join(HIVE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn state_db_path(root: &Path) -> PathBuf {
    root.join(STATE_DB)
}

pub fn inbox_db_path(root: &Path) -> PathBuf {
    root.join(INBOX_DB)
}

pub fn routing_path(root: &Path) -> PathBuf {
    root.join(ROUTING_FILE)
}

// ---------------------------------------------------------------------------
// Agent id validation
// ---------------------------------------------------------------------------

static AGENT_ID_RE: OnceLock<Regex> = OnceLock::new();

fn agent_id_re() -> &'static Regex {
    AGENT_ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

/// Agent ids double as file-safe keys and wire identifiers, so the
/// vocabulary is deliberately narrow.
pub fn validate_agent_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !agent_id_re().is_match(id) {
        return Err(HiveError::InvalidAgentId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
