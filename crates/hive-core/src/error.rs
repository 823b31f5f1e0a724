use thiserror::Error;

#[derive(Debug, Error)]
pub enum HiveError {
    #[error("not initialized: run 'hive init'")]
    NotInitialized,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("invalid agent id '{0}': must be lowercase alphanumeric with hyphens or underscores")]
    InvalidAgentId(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority '{0}': expected one of low, medium, high, critical")]
    InvalidPriority(String),

    #[error("empty field: {0}")]
    EmptyField(&'static str),

    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for HiveError {
    fn from(e: rusqlite::Error) -> Self {
        HiveError::Sqlite(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
