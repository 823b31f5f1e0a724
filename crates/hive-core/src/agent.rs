use crate::types::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One tracked agent process. Agents are registered once and mutated in
/// place; they are never deleted — an agent that stops updating
/// `last_activity` past the staleness threshold is presumed dead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    pub name: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task: Option<String>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl AgentState {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            status: AgentStatus::Idle,
            current_task: None,
            last_activity: Utc::now(),
            session_id: String::new(),
            port: 0,
            capabilities: BTreeSet::new(),
            error_message: None,
        }
    }

    pub fn is_stale(&self, threshold: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_activity > threshold
    }
}

/// Optional-field merge applied by `StateManager::update_agent_status`.
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AgentUpdate {
    pub current_task: Option<Option<String>>,
    pub session_id: Option<String>,
    pub port: Option<u16>,
    pub capabilities: Option<BTreeSet<String>>,
    pub error_message: Option<Option<String>>,
}

impl AgentUpdate {
    pub fn apply(&self, agent: &mut AgentState) {
        if let Some(task) = &self.current_task {
            agent.current_task = task.clone();
        }
        if let Some(session) = &self.session_id {
            agent.session_id = session.clone();
        }
        if let Some(port) = self.port {
            agent.port = port;
        }
        if let Some(caps) = &self.capabilities {
            agent.capabilities = caps.clone();
        }
        if let Some(msg) = &self.error_message {
            agent.error_message = msg.clone();
        }
    }
}
