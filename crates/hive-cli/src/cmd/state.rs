use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (config, manager) = super::open(root)?;
    let state = manager.snapshot();
    let summary = hive_core::task::summarize(state.tasks.values());
    let stale = manager.stale_agents(config.stale_threshold());

    if json {
        print_json(&serde_json::json!({
            "project": config.project,
            "backend": config.backend,
            "agents": state.agents,
            "tasks": state.tasks,
            "task_summary": summary,
            "message_count": state.messages.len(),
            "stale_agents": stale,
            "last_updated": state.last_updated,
            "persistence_healthy": manager.persistence_healthy(),
            "last_save_error": manager.last_save_error(),
        }))?;
        return Ok(());
    }

    println!("Project: {} ({} backend)", config.project, config.backend);
    println!(
        "Agents: {}  Tasks: {}  Messages: {}",
        state.agents.len(),
        state.tasks.len(),
        state.messages.len()
    );
    if !stale.is_empty() {
        println!("Stale agents: {}", stale.join(", "));
    }
    if let Some(err) = manager.last_save_error() {
        println!("WARNING: last save failed: {err}");
    }
    if !state.agents.is_empty() {
        println!();
        print_table(
            &["AGENT", "STATUS", "TASK", "LAST ACTIVITY"],
            state
                .agents
                .values()
                .map(|a| {
                    vec![
                        a.agent_id.clone(),
                        a.status.to_string(),
                        a.current_task.clone().unwrap_or_else(|| "-".into()),
                        a.last_activity.to_rfc3339(),
                    ]
                })
                .collect(),
        );
    }
    Ok(())
}
