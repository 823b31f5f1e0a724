pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> anyhow::Result<Router> {
    let app_state = state::AppState::new(root)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // State
        .route("/api/state", get(routes::state::get_state))
        // Agents
        .route("/api/agents", get(routes::agents::list_agents))
        .route("/api/agents", post(routes::agents::register_agent))
        .route(
            "/api/agents/{agent_id}/status",
            post(routes::agents::update_status),
        )
        // Tasks
        .route("/api/tasks", get(routes::tasks::list_tasks))
        .route("/api/tasks", post(routes::tasks::create_task))
        .route("/api/tasks/{task_id}/assign", post(routes::tasks::assign_task))
        .route(
            "/api/tasks/{task_id}/complete",
            post(routes::tasks::complete_task),
        )
        // Messages (the inbox surface is mounted unprefixed)
        .route("/messages/send", post(routes::messages::send_message))
        .route(
            "/messages/broadcast",
            post(routes::messages::broadcast_message),
        )
        .route("/messages/search", get(routes::messages::search_messages))
        .route(
            "/messages/{message_id}/read",
            post(routes::messages::mark_read),
        )
        .route("/inbox", get(routes::messages::get_inbox))
        // Auth
        .route("/auth/token", post(routes::auth::issue_token))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state))
}

/// Start the coordination API server.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let app = build_router(root)?;

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("hive server listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root)?;

    tracing::info!("hive server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
