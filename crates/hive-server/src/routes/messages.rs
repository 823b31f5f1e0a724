use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use crate::auth::AuthClaims;
use crate::error::AppError;
use crate::state::AppState;
use hive_core::types::{Priority, Recipient};
use hive_inbox::routing::{AgentProfile, RouteRequest};
use hive_inbox::store::{MessageQuery, StoredMessage};

fn profiles(app: &AppState) -> Vec<AgentProfile> {
    app.manager
        .snapshot()
        .agents
        .values()
        .map(|a| AgentProfile {
            agent_id: a.agent_id.clone(),
            capabilities: a.capabilities.iter().cloned().collect(),
        })
        .collect()
}

/// Deliver one logical message: route to concrete recipients, insert one
/// store row per recipient, and record the send in the shared-state
/// document (the two message stores are deliberately parallel).
fn deliver(
    app: &AppState,
    sender: &str,
    recipient: Recipient,
    content: &str,
    subject: Option<String>,
    priority: Priority,
) -> Result<serde_json::Value, AppError> {
    let request = RouteRequest {
        sender: sender.to_string(),
        recipient: recipient.clone(),
        subject: subject.clone(),
        priority,
    };
    let recipients = app.router.route(&request, &profiles(app));

    for recipient_id in &recipients {
        app.store.insert(&StoredMessage::new(
            sender,
            recipient_id.clone(),
            content,
            subject.clone(),
            priority,
        ))?;
    }

    let message_id = app
        .manager
        .send_message(sender, recipient, content, subject, priority)?;

    Ok(serde_json::json!({
        "message_id": message_id,
        "recipients": recipients,
    }))
}

#[derive(Deserialize)]
pub struct SendBody {
    /// Agent id, or "*" for broadcast.
    pub recipient: String,
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// POST /messages/send — authenticated send; broadcast recipients require
/// the admin role.
pub async fn send_message(
    State(app): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(body): Json<SendBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    claims.require_send()?;
    let recipient = Recipient::parse(&body.recipient);
    if recipient == Recipient::Broadcast {
        claims.require_broadcast()?;
    }
    let priority = match body.priority.as_deref() {
        Some(p) => Priority::from_str(p)?,
        None => Priority::Medium,
    };
    let result = tokio::task::spawn_blocking(move || {
        deliver(
            &app,
            &claims.sub,
            recipient,
            &body.content,
            body.subject,
            priority,
        )
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct BroadcastBody {
    pub content: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// POST /messages/broadcast — admin-only fan-out to every agent.
pub async fn broadcast_message(
    State(app): State<AppState>,
    AuthClaims(claims): AuthClaims,
    Json(body): Json<BroadcastBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    claims.require_broadcast()?;
    let priority = match body.priority.as_deref() {
        Some(p) => Priority::from_str(p)?,
        None => Priority::Medium,
    };
    let result = tokio::task::spawn_blocking(move || {
        deliver(
            &app,
            &claims.sub,
            Recipient::Broadcast,
            &body.content,
            body.subject,
            priority,
        )
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct InboxParams {
    pub agent: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /inbox?agent=...&unread=... — a recipient's messages, newest first.
pub async fn get_inbox(
    State(app): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Query(params): Query<InboxParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let messages = app
            .store
            .inbox(&params.agent, params.unread, params.limit.unwrap_or(50))?;
        let unread_count = app.store.unread_count(&params.agent)?;
        Ok::<_, hive_inbox::InboxError>(serde_json::json!({
            "agent": params.agent,
            "messages": messages,
            "unread_count": unread_count,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /messages/search — indexed lookup across the inbox store.
pub async fn search_messages(
    State(app): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let query = MessageQuery {
            sender: params.sender,
            recipient: params.recipient,
            text: params.q,
            since: None,
            unread_only: params.unread,
            limit: params.limit,
        };
        let messages = app.store.search(&query)?;
        Ok::<_, hive_inbox::InboxError>(serde_json::json!({ "messages": messages }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /messages/{id}/read — mark one delivered copy as read.
pub async fn mark_read(
    State(app): State<AppState>,
    AuthClaims(_claims): AuthClaims,
    Path(message_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        app.store.mark_read(&message_id)?;
        Ok::<_, hive_inbox::InboxError>(serde_json::json!({ "message_id": message_id, "read": true }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
