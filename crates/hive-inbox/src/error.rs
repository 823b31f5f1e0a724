use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("unknown api key")]
    UnknownApiKey,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("permission denied: role {role} cannot {action}")]
    PermissionDenied { role: String, action: String },

    #[error("routing error: {0}")]
    Routing(String),

    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for InboxError {
    fn from(e: rusqlite::Error) -> Self {
        InboxError::Sqlite(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InboxError>;
