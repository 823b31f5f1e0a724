use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use hive_inbox::InboxError;

#[derive(Deserialize)]
pub struct TokenBody {
    pub key: String,
}

/// POST /auth/token — exchange a configured API key for a signed token.
pub async fn issue_token(
    State(app): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entry = app
        .config
        .key_entry(&body.key)
        .ok_or(InboxError::UnknownApiKey)?
        .clone();
    let token = app.tokens.issue(&entry.name, entry.role)?;
    Ok(Json(serde_json::json!({
        "token": token,
        "name": entry.name,
        "role": entry.role,
        "expires_in_minutes": app.config.token_ttl_minutes,
    })))
}
