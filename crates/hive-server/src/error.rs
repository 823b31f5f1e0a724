use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hive_core::HiveError;
use hive_inbox::InboxError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(HiveError::InvalidStatus(msg.into()).into())
    }

    /// Construct a 401 Unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(InboxError::InvalidToken(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if let Some(e) = self.0.downcast_ref::<HiveError>() {
            match e {
                HiveError::NotInitialized => StatusCode::BAD_REQUEST,
                HiveError::AgentNotFound(_)
                | HiveError::TaskNotFound(_)
                | HiveError::MessageNotFound(_)
                | HiveError::BackupNotFound(_) => StatusCode::NOT_FOUND,
                HiveError::InvalidAgentId(_)
                | HiveError::InvalidStatus(_)
                | HiveError::InvalidPriority(_)
                | HiveError::EmptyField(_) => StatusCode::BAD_REQUEST,
                HiveError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                HiveError::Persistence(_)
                | HiveError::Sqlite(_)
                | HiveError::Io(_)
                | HiveError::Yaml(_)
                | HiveError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else if let Some(e) = self.0.downcast_ref::<InboxError>() {
            match e {
                InboxError::MessageNotFound(_) => StatusCode::NOT_FOUND,
                InboxError::UnknownApiKey
                | InboxError::InvalidToken(_)
                | InboxError::TokenExpired => StatusCode::UNAUTHORIZED,
                InboxError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                InboxError::Routing(_) => StatusCode::UNPROCESSABLE_ENTITY,
                InboxError::Sqlite(_) | InboxError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
