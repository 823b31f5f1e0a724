use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::AppError;
use crate::state::AppState;
use hive_core::task::TaskOutcome;
use hive_core::types::Priority;

/// GET /api/tasks — every task plus a summary line.
pub async fn list_tasks(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        let state = manager.snapshot();
        let tasks: Vec<_> = state.tasks.values().cloned().collect();
        serde_json::json!({
            "tasks": tasks,
            "summary": hive_core::task::summarize(state.tasks.values()),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct CreateTaskBody {
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// POST /api/tasks — create a PENDING task.
pub async fn create_task(
    State(app): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let priority = match body.priority.as_deref() {
        Some(p) => Priority::from_str(p)?,
        None => Priority::Medium,
    };
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        let task_id = manager.create_task(&body.description, priority)?;
        Ok::<_, hive_core::HiveError>(serde_json::json!({
            "task_id": task_id,
            "status": "pending",
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub agent_id: String,
}

/// POST /api/tasks/{id}/assign — claim a PENDING task for an agent.
pub async fn assign_task(
    State(app): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        manager.assign_task(&task_id, &body.agent_id)?;
        Ok::<_, hive_core::HiveError>(serde_json::json!({
            "task_id": task_id,
            "agent_id": body.agent_id,
            "status": "in_progress",
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct CompleteBody {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// POST /api/tasks/{id}/complete — terminally finish a task, with exactly
/// one of `result` (success) or `error` (failure).
pub async fn complete_task(
    State(app): State<AppState>,
    Path(task_id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = match (body.result, body.error) {
        (Some(result), None) => TaskOutcome::Completed(result),
        (None, Some(error)) => TaskOutcome::Failed(error),
        _ => {
            return Err(AppError::bad_request(
                "provide exactly one of 'result' or 'error'",
            ))
        }
    };
    let status = match &outcome {
        TaskOutcome::Completed(_) => "completed",
        TaskOutcome::Failed(_) => "failed",
    };
    let manager = app.manager.clone();
    let result = tokio::task::spawn_blocking(move || {
        manager.complete_task(&task_id, outcome)?;
        Ok::<_, hive_core::HiveError>(serde_json::json!({
            "task_id": task_id,
            "status": status,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
