use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::AppError;
use crate::state::AppState;
use hive_core::agent::{AgentState, AgentUpdate};
use hive_core::types::AgentStatus;

#[derive(Deserialize)]
pub struct RegisterBody {
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

/// POST /api/agents — register (or replace) an agent.
pub async fn register_agent(
    State(app): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut agent = AgentState::new(body.agent_id, body.name);
        if let Some(session_id) = body.session_id {
            agent.session_id = session_id;
        }
        if let Some(port) = body.port {
            agent.port = port;
        }
        agent.capabilities = body.capabilities;
        let agent_id = agent.agent_id.clone();
        manager.register_agent(agent)?;
        Ok::<_, hive_core::HiveError>(serde_json::json!({ "agent_id": agent_id }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /api/agents — all agents with a staleness flag.
pub async fn list_agents(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let manager = app.manager.clone();
    let threshold = app.config.stale_threshold();
    let result = tokio::task::spawn_blocking(move || {
        let state = manager.snapshot();
        let now = chrono::Utc::now();
        let agents: Vec<serde_json::Value> = state
            .agents
            .values()
            .map(|a| {
                serde_json::json!({
                    "agent_id": a.agent_id,
                    "name": a.name,
                    "status": a.status,
                    "current_task": a.current_task,
                    "capabilities": a.capabilities,
                    "port": a.port,
                    "last_activity": a.last_activity,
                    "stale": a.is_stale(threshold, now),
                    "error_message": a.error_message,
                })
            })
            .collect();
        let count = agents.len();
        serde_json::json!({ "agents": agents, "count": count })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
    #[serde(default)]
    pub current_task: Option<String>,
    /// Explicitly clear `current_task` (distinct from leaving it untouched).
    #[serde(default)]
    pub clear_task: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Replaces the capability set when present.
    #[serde(default)]
    pub capabilities: Option<BTreeSet<String>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// POST /api/agents/{id}/status — merge a status update into an agent.
pub async fn update_status(
    State(app): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = AgentStatus::from_str(&body.status)?;
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        let update = AgentUpdate {
            current_task: if body.clear_task {
                Some(None)
            } else {
                body.current_task.map(Some)
            },
            session_id: body.session_id,
            port: body.port,
            capabilities: body.capabilities,
            error_message: body.error_message.map(Some),
        };
        manager.update_agent_status(&agent_id, status, update)?;
        Ok::<_, hive_core::HiveError>(serde_json::json!({
            "agent_id": agent_id,
            "status": status,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
