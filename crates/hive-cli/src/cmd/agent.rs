use crate::output::{print_json, print_table};
use clap::Subcommand;
use hive_core::agent::{AgentState, AgentUpdate};
use hive_core::types::AgentStatus;
use std::path::Path;
use std::str::FromStr;

#[derive(Subcommand)]
pub enum AgentSubcommand {
    /// Register (or replace) an agent
    Register {
        agent_id: String,
        /// Display name (default: the agent id)
        #[arg(long)]
        name: Option<String>,
        /// Capability tag, repeatable
        #[arg(long = "cap")]
        capabilities: Vec<String>,
        /// Session identifier of the hosting CLI process
        #[arg(long)]
        session: Option<String>,
        /// Port the agent listens on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Update an agent's status
    Status {
        agent_id: String,
        /// idle, busy, error, or offline
        status: String,
        /// Set the current task id
        #[arg(long)]
        task: Option<String>,
        /// Clear the current task
        #[arg(long, conflicts_with = "task")]
        clear_task: bool,
        /// Replace the capability set; repeatable
        #[arg(long = "cap")]
        capabilities: Vec<String>,
        /// Error detail (for status = error)
        #[arg(long)]
        error: Option<String>,
    },
    /// Record a heartbeat for an agent
    Touch { agent_id: String },
    /// List all agents
    List,
    /// List agents with no recent activity
    Stale,
}

pub fn run(root: &Path, subcmd: AgentSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AgentSubcommand::Register {
            agent_id,
            name,
            capabilities,
            session,
            port,
        } => register(root, agent_id, name, capabilities, session, port, json),
        AgentSubcommand::Status {
            agent_id,
            status,
            task,
            clear_task,
            capabilities,
            error,
        } => self::status(root, &agent_id, &status, task, clear_task, capabilities, error, json),
        AgentSubcommand::Touch { agent_id } => touch(root, &agent_id, json),
        AgentSubcommand::List => list(root, json),
        AgentSubcommand::Stale => stale(root, json),
    }
}

fn register(
    root: &Path,
    agent_id: String,
    name: Option<String>,
    capabilities: Vec<String>,
    session: Option<String>,
    port: Option<u16>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let name = name.unwrap_or_else(|| agent_id.clone());
    let mut agent = AgentState::new(agent_id.clone(), name);
    agent.capabilities = capabilities.into_iter().collect();
    if let Some(session) = session {
        agent.session_id = session;
    }
    if let Some(port) = port {
        agent.port = port;
    }
    manager.register_agent(agent)?;

    if json {
        print_json(&serde_json::json!({ "agent_id": agent_id, "status": "idle" }))?;
    } else {
        println!("Registered agent '{agent_id}'");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn status(
    root: &Path,
    agent_id: &str,
    status: &str,
    task: Option<String>,
    clear_task: bool,
    capabilities: Vec<String>,
    error: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let status = AgentStatus::from_str(status)?;
    let update = AgentUpdate {
        current_task: if clear_task { Some(None) } else { task.map(Some) },
        session_id: None,
        port: None,
        // No `--cap` flags means leave the set untouched.
        capabilities: if capabilities.is_empty() {
            None
        } else {
            Some(capabilities.into_iter().collect())
        },
        error_message: error.map(Some),
    };
    manager.update_agent_status(agent_id, status, update)?;

    if json {
        print_json(&serde_json::json!({ "agent_id": agent_id, "status": status }))?;
    } else {
        println!("Agent '{agent_id}' is now {status}");
    }
    Ok(())
}

fn touch(root: &Path, agent_id: &str, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    manager.touch_activity(agent_id)?;
    if json {
        print_json(&serde_json::json!({ "agent_id": agent_id, "touched": true }))?;
    } else {
        println!("Recorded activity for '{agent_id}'");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, manager) = super::open(root)?;
    let state = manager.snapshot();

    if json {
        let agents: Vec<_> = state.agents.values().collect();
        print_json(&agents)?;
        return Ok(());
    }

    print_table(
        &["AGENT", "STATUS", "TASK", "CAPABILITIES"],
        state
            .agents
            .values()
            .map(|a| {
                vec![
                    a.agent_id.clone(),
                    a.status.to_string(),
                    a.current_task.clone().unwrap_or_else(|| "-".into()),
                    a.capabilities.iter().cloned().collect::<Vec<_>>().join(","),
                ]
            })
            .collect(),
    );
    Ok(())
}

fn stale(root: &Path, json: bool) -> anyhow::Result<()> {
    let (config, manager) = super::open(root)?;
    let stale = manager.stale_agents(config.stale_threshold());

    if json {
        print_json(&serde_json::json!({ "stale_agents": stale }))?;
    } else if stale.is_empty() {
        println!("No stale agents (threshold: {}m)", config.stale_after_minutes);
    } else {
        for id in stale {
            println!("{id}");
        }
    }
    Ok(())
}
