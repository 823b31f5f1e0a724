use crate::output::{print_json, print_table};
use clap::Subcommand;
use hive_core::task::TaskOutcome;
use hive_core::types::Priority;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a pending task
    Create {
        #[arg(required = true)]
        description: Vec<String>,
        /// low, medium, high, or critical
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// Assign a pending task to an agent
    Assign { task_id: String, agent_id: String },
    /// Complete a task successfully
    Complete {
        task_id: String,
        #[arg(required = true)]
        result: Vec<String>,
    },
    /// Mark a task as failed
    Fail {
        task_id: String,
        #[arg(required = true)]
        error: Vec<String>,
    },
    /// List all tasks
    List,
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TaskSubcommand::Create {
            description,
            priority,
        } => create(root, &description.join(" "), &priority, json),
        TaskSubcommand::Assign { task_id, agent_id } => assign(root, &task_id, &agent_id, json),
        TaskSubcommand::Complete { task_id, result } => finish(
            root,
            &task_id,
            TaskOutcome::Completed(result.join(" ")),
            json,
        ),
        TaskSubcommand::Fail { task_id, error } => {
            finish(root, &task_id, TaskOutcome::Failed(error.join(" ")), json)
        }
        TaskSubcommand::List => list(root, json),
    }
}

fn create(root: &Path, description: &str, priority: &str, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let priority = Priority::from_str(priority)?;
    let task_id = manager.create_task(description, priority)?;

    if json {
        print_json(&serde_json::json!({ "task_id": task_id, "status": "pending" }))?;
    } else {
        println!("Created task [{task_id}]: {description}");
    }
    Ok(())
}

fn assign(root: &Path, task_id: &str, agent_id: &str, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    manager.assign_task(task_id, agent_id)?;

    if json {
        print_json(&serde_json::json!({
            "task_id": task_id,
            "agent_id": agent_id,
            "status": "in_progress",
        }))?;
    } else {
        println!("Assigned task [{task_id}] to '{agent_id}'");
    }
    Ok(())
}

fn finish(root: &Path, task_id: &str, outcome: TaskOutcome, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let status = match &outcome {
        TaskOutcome::Completed(_) => "completed",
        TaskOutcome::Failed(_) => "failed",
    };
    manager.complete_task(task_id, outcome)?;

    if json {
        print_json(&serde_json::json!({ "task_id": task_id, "status": status }))?;
    } else {
        println!("Task [{task_id}] {status}");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let state = manager.snapshot();

    if json {
        let tasks: Vec<_> = state.tasks.values().collect();
        print_json(&tasks)?;
        return Ok(());
    }

    print_table(
        &["TASK", "STATUS", "PRIORITY", "AGENT", "DESCRIPTION"],
        state
            .tasks
            .values()
            .map(|t| {
                vec![
                    t.task_id.clone(),
                    t.status.to_string(),
                    t.priority.to_string(),
                    t.assigned_agent.clone().unwrap_or_else(|| "-".into()),
                    t.description.clone(),
                ]
            })
            .collect(),
    );
    Ok(())
}
