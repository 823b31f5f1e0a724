use crate::agent::AgentState;
use crate::message::AgentMessage;
use crate::task::TaskInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// The single root document: every agent, task, and message in one
/// serializable value. One instance per deployment; the `StateManager`
/// owns the live copy and backends own the durable one.
///
/// `messages` is insertion-ordered (most recent last). A task's
/// `assigned_agent` is only checked against `agents` at assignment time;
/// nothing re-validates the reference afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentState>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskInfo>,
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            version: 1,
            agents: BTreeMap::new(),
            tasks: BTreeMap::new(),
            messages: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn insert_agent(&mut self, agent: AgentState) {
        self.agents.insert(agent.agent_id.clone(), agent);
        self.touch();
    }

    pub fn insert_task(&mut self, task: TaskInfo) {
        self.tasks.insert(task.task_id.clone(), task);
        self.touch();
    }

    pub fn push_message(&mut self, message: AgentMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Messages addressed to `agent_id`, directly or by broadcast,
    /// in insertion order.
    pub fn inbox_for(&self, agent_id: &str) -> Vec<&AgentMessage> {
        self.messages
            .iter()
            .filter(|m| m.recipient.addresses(agent_id))
            .collect()
    }

    /// Drop messages older than `retention`. Returns how many were removed.
    pub fn prune_messages(&mut self, retention: chrono::Duration, now: DateTime<Utc>) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| now - m.timestamp <= retention);
        let removed = before - self.messages.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Agent ids whose `last_activity` is older than `threshold`.
    pub fn stale_agents(&self, threshold: chrono::Duration, now: DateTime<Utc>) -> Vec<String> {
        self.agents
            .values()
            .filter(|a| a.is_stale(threshold, now))
            .map(|a| a.agent_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, Recipient};

    #[test]
    fn inbox_collects_direct_and_broadcast() {
        let mut state = SharedState::new();
        state.push_message(AgentMessage::new(
            "supervisor",
            Recipient::Direct("testing".into()),
            "Run suite",
            None,
            Priority::Medium,
        ));
        state.push_message(AgentMessage::new(
            "supervisor",
            Recipient::Broadcast,
            "Standup in 5",
            None,
            Priority::Low,
        ));
        state.push_message(AgentMessage::new(
            "supervisor",
            Recipient::Direct("backend-api".into()),
            "Not yours",
            None,
            Priority::Low,
        ));

        let inbox = state.inbox_for("testing");
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].content, "Run suite");
    }

    #[test]
    fn prune_removes_old_messages() {
        let mut state = SharedState::new();
        let mut old = AgentMessage::new(
            "a",
            Recipient::Broadcast,
            "ancient",
            None,
            Priority::Low,
        );
        old.timestamp = Utc::now() - chrono::Duration::days(60);
        state.messages.push(old);
        state.push_message(AgentMessage::new(
            "a",
            Recipient::Broadcast,
            "fresh",
            None,
            Priority::Low,
        ));

        let removed = state.prune_messages(chrono::Duration::days(30), Utc::now());
        assert_eq!(removed, 1);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "fresh");
    }

    #[test]
    fn stale_agents_by_threshold() {
        let mut state = SharedState::new();
        let now = Utc::now();
        let mut dead = AgentState::new("dead", "Dead");
        dead.last_activity = now - chrono::Duration::minutes(30);
        state.insert_agent(dead);
        state.insert_agent(AgentState::new("alive", "Alive"));

        let stale = state.stale_agents(chrono::Duration::minutes(10), now);
        assert_eq!(stale, vec!["dead".to_string()]);
    }
}
