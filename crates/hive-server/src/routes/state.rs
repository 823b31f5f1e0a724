use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/state — snapshot summary of the whole document.
pub async fn get_state(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let manager = app.manager.clone();
    let config = app.config.clone();
    let result = tokio::task::spawn_blocking(move || {
        let state = manager.snapshot();
        let stale = state.stale_agents(config.stale_threshold(), chrono::Utc::now());

        serde_json::json!({
            "project": config.project,
            "agents": state.agents,
            "tasks": state.tasks,
            "task_summary": hive_core::task::summarize(state.tasks.values()),
            "message_count": state.messages.len(),
            "stale_agents": stale,
            "last_updated": state.last_updated,
            "persistence_healthy": manager.persistence_healthy(),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    Ok(Json(result))
}
