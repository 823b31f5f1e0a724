use crate::error::{HiveError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// BackendKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Json,
    Sqlite,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Json
    }
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Json => "json",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role / ApiKeyEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Agent,
    ReadOnly,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::ReadOnly => "read_only",
        }
    }

    pub fn can_send(self) -> bool {
        matches!(self, Role::Admin | Role::Agent)
    }

    pub fn can_broadcast(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = HiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            "read_only" => Ok(Role::ReadOnly),
            _ => Err(HiveError::InvalidStatus(format!("unknown role: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub name: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub version: u32,
    pub project: String,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default = "default_retention_days")]
    pub message_retention_days: i64,
    #[serde(default = "default_stale_minutes")]
    pub stale_after_minutes: i64,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,
    /// HMAC key for bearer tokens, base64url. Generated at `hive init`.
    #[serde(default)]
    pub auth_secret: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

fn default_config_version() -> u32 {
    1
}

fn default_max_backups() -> usize {
    3
}

fn default_retention_days() -> i64 {
    30
}

fn default_stale_minutes() -> i64 {
    10
}

fn default_token_ttl() -> i64 {
    60
}

impl Config {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: project.into(),
            backend: BackendKind::Json,
            max_backups: default_max_backups(),
            message_retention_days: default_retention_days(),
            stale_after_minutes: default_stale_minutes(),
            token_ttl_minutes: default_token_ttl(),
            auth_secret: String::new(),
            api_keys: Vec::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(HiveError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn message_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.message_retention_days)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stale_after_minutes)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes)
    }

    pub fn key_entry(&self, key: &str) -> Option<&ApiKeyEntry> {
        self.api_keys.iter().find(|e| e.key == key)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::new("fleet");
        config.backend = BackendKind::Sqlite;
        config.api_keys.push(ApiKeyEntry {
            key: "k-123".into(),
            name: "dashboard".into(),
            role: Role::ReadOnly,
        });
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project, "fleet");
        assert_eq!(loaded.backend, BackendKind::Sqlite);
        assert_eq!(loaded.api_keys.len(), 1);
        assert_eq!(loaded.api_keys[0].role, Role::ReadOnly);
    }

    #[test]
    fn load_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(HiveError::NotInitialized)
        ));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = serde_yaml::from_str("project: minimal\n").unwrap();
        assert_eq!(config.backend, BackendKind::Json);
        assert_eq!(config.max_backups, 3);
        assert_eq!(config.stale_after_minutes, 10);
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Admin.can_broadcast());
        assert!(!Role::Agent.can_broadcast());
        assert!(Role::Agent.can_send());
        assert!(!Role::ReadOnly.can_send());
    }
}
