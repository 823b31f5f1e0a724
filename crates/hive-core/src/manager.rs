use crate::agent::{AgentState, AgentUpdate};
use crate::backend::{BackupHandle, StateBackend};
use crate::error::{HiveError, Result};
use crate::message::AgentMessage;
use crate::observer::{Observers, StateEvent};
use crate::paths::validate_agent_id;
use crate::state::SharedState;
use crate::task::{TaskInfo, TaskOutcome};
use crate::types::{AgentStatus, Priority, Recipient};
use chrono::Utc;
use std::sync::{Mutex, RwLock};
use tracing::warn;

// ---------------------------------------------------------------------------
// StateManager
// ---------------------------------------------------------------------------

/// In-memory authoritative copy of [`SharedState`] plus its durable backend.
///
/// One coarse mutex serializes every mutation in this process; that bounds
/// throughput but rules out lost updates between threads. Two manager
/// instances in different processes pointed at the same backing file are
/// NOT coordinated — last writer wins at the file level, by design.
///
/// Persistence is best-effort: a failed save is logged and remembered in
/// `last_save_error`, the in-memory state is not rolled back, and the
/// mutation still succeeds. Callers who care should poll
/// [`persistence_healthy`](Self::persistence_healthy).
pub struct StateManager {
    inner: Mutex<Inner>,
    observers: RwLock<Observers>,
}

struct Inner {
    state: SharedState,
    backend: Box<dyn StateBackend>,
    last_save_error: Option<String>,
}

impl Inner {
    /// Best-effort save. Never fails the caller.
    fn persist(&mut self) {
        match self.backend.save(&self.state) {
            Ok(()) => self.last_save_error = None,
            Err(e) => {
                warn!(error = %e, "state save failed; continuing on in-memory state");
                self.last_save_error = Some(e.to_string());
            }
        }
    }
}

impl StateManager {
    /// Load the durable state (or start from a default document) and wrap
    /// it with the given backend.
    pub fn open(backend: Box<dyn StateBackend>) -> Result<Self> {
        let state = backend.load()?.unwrap_or_default();
        Ok(Self {
            inner: Mutex::new(Inner {
                state,
                backend,
                last_save_error: None,
            }),
            observers: RwLock::new(Observers::new()),
        })
    }

    pub fn add_observer(&self, callback: impl Fn(&StateEvent) + Send + Sync + 'static) {
        self.observers
            .write()
            .expect("observer lock poisoned")
            .add(callback);
    }

    fn notify(&self, event: StateEvent) {
        self.observers
            .read()
            .expect("observer lock poisoned")
            .notify(&event);
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Insert or replace the agent keyed by `agent_state.agent_id`.
    /// Fails only on malformed input.
    pub fn register_agent(&self, agent: AgentState) -> Result<()> {
        validate_agent_id(&agent.agent_id)?;
        if agent.name.trim().is_empty() {
            return Err(HiveError::EmptyField("name"));
        }
        let agent_id = agent.agent_id.clone();
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            inner.state.insert_agent(agent);
            inner.persist();
        }
        self.notify(StateEvent::AgentRegistered { agent_id });
        Ok(())
    }

    /// Merge `update` into an existing agent and set its status.
    /// Refreshes `last_activity`; unknown ids are an error.
    pub fn update_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
        update: AgentUpdate,
    ) -> Result<()> {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            let agent = inner
                .state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| HiveError::AgentNotFound(agent_id.to_string()))?;
            agent.status = status;
            update.apply(agent);
            agent.last_activity = Utc::now();
            inner.state.touch();
            inner.persist();
        }
        self.notify(StateEvent::AgentUpdated {
            agent_id: agent_id.to_string(),
            status,
        });
        Ok(())
    }

    /// Refresh an agent's `last_activity` without any other change.
    pub fn touch_activity(&self, agent_id: &str) -> Result<()> {
        let status = {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            let agent = inner
                .state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| HiveError::AgentNotFound(agent_id.to_string()))?;
            agent.last_activity = Utc::now();
            let status = agent.status;
            inner.state.touch();
            inner.persist();
            status
        };
        self.notify(StateEvent::AgentUpdated {
            agent_id: agent_id.to_string(),
            status,
        });
        Ok(())
    }

    pub fn stale_agents(&self, threshold: chrono::Duration) -> Vec<String> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.state.stale_agents(threshold, Utc::now())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Create a PENDING task and return its id.
    pub fn create_task(&self, description: &str, priority: Priority) -> Result<String> {
        if description.trim().is_empty() {
            return Err(HiveError::EmptyField("description"));
        }
        let task = TaskInfo::new(description, priority);
        let task_id = task.task_id.clone();
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            inner.state.insert_task(task);
            inner.persist();
        }
        self.notify(StateEvent::TaskCreated {
            task_id: task_id.clone(),
        });
        Ok(task_id)
    }

    /// PENDING -> IN_PROGRESS; also marks the agent busy on this task.
    /// Both identifiers must exist. This is the only point where
    /// `assigned_agent` is checked against the agent map.
    pub fn assign_task(&self, task_id: &str, agent_id: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            if !inner.state.agents.contains_key(agent_id) {
                return Err(HiveError::AgentNotFound(agent_id.to_string()));
            }
            let task = inner
                .state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| HiveError::TaskNotFound(task_id.to_string()))?;
            task.assign(agent_id)?;

            let agent = inner
                .state
                .agents
                .get_mut(agent_id)
                .expect("agent checked above");
            agent.current_task = Some(task_id.to_string());
            agent.status = AgentStatus::Busy;
            agent.last_activity = Utc::now();

            inner.state.touch();
            inner.persist();
        }
        self.notify(StateEvent::TaskAssigned {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
        });
        Ok(())
    }

    /// IN_PROGRESS -> {COMPLETED, FAILED}; frees the assigned agent.
    pub fn complete_task(&self, task_id: &str, outcome: TaskOutcome) -> Result<()> {
        let status = {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            let task = inner
                .state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| HiveError::TaskNotFound(task_id.to_string()))?;
            task.finish(outcome)?;
            let status = task.status;
            let assigned = task.assigned_agent.clone();

            if let Some(agent) = assigned.and_then(|id| inner.state.agents.get_mut(&id)) {
                if agent.current_task.as_deref() == Some(task_id) {
                    agent.current_task = None;
                    agent.status = AgentStatus::Idle;
                    agent.last_activity = Utc::now();
                }
            }

            inner.state.touch();
            inner.persist();
            status
        };
        self.notify(StateEvent::TaskFinished {
            task_id: task_id.to_string(),
            status,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Append a message. Recipient existence is deliberately not checked
    /// against the agent map.
    pub fn send_message(
        &self,
        sender_id: &str,
        recipient: Recipient,
        content: &str,
        subject: Option<String>,
        priority: Priority,
    ) -> Result<String> {
        if sender_id.trim().is_empty() {
            return Err(HiveError::EmptyField("sender_id"));
        }
        if content.trim().is_empty() {
            return Err(HiveError::EmptyField("content"));
        }
        if let Recipient::Direct(id) = &recipient {
            if id.trim().is_empty() {
                return Err(HiveError::EmptyField("recipient"));
            }
        }
        let message = AgentMessage::new(sender_id, recipient, content, subject, priority);
        let message_id = message.message_id.clone();
        let recipient_wire = message.recipient.wire().to_string();
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            inner.state.push_message(message);
            inner.persist();
        }
        self.notify(StateEvent::MessageSent {
            message_id: message_id.clone(),
            recipient: recipient_wire,
        });
        Ok(message_id)
    }

    pub fn mark_message_read(&self, message_id: &str) -> Result<()> {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            let message = inner
                .state
                .messages
                .iter_mut()
                .find(|m| m.message_id == message_id)
                .ok_or_else(|| HiveError::MessageNotFound(message_id.to_string()))?;
            message.read = true;
            inner.state.touch();
            inner.persist();
        }
        self.notify(StateEvent::MessageRead {
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    pub fn inbox_for(&self, agent_id: &str) -> Vec<AgentMessage> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner
            .state
            .inbox_for(agent_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Retention cleanup. Returns how many messages were dropped.
    pub fn prune_messages(&self, retention: chrono::Duration) -> usize {
        let mut inner = self.inner.lock().expect("state lock poisoned");
        let removed = inner.state.prune_messages(retention, Utc::now());
        if removed > 0 {
            inner.persist();
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Snapshots and backups
    // -----------------------------------------------------------------------

    /// Owned copy of the current document. Mutating it does not touch the
    /// live state.
    pub fn snapshot(&self) -> SharedState {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.state.clone()
    }

    pub fn backup(&self) -> Result<BackupHandle> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.backend.backup()
    }

    /// Restore the durable copy from `handle` and reload it into memory.
    pub fn restore_from_backup(&self, handle: &BackupHandle) -> Result<()> {
        {
            let mut inner = self.inner.lock().expect("state lock poisoned");
            inner.backend.restore(handle)?;
            let restored = inner
                .backend
                .load()?
                .ok_or_else(|| HiveError::Persistence("restored state is empty".to_string()))?;
            inner.state = restored;
        }
        self.notify(StateEvent::StateRestored);
        Ok(())
    }

    pub fn persistence_healthy(&self) -> bool {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.last_save_error.is_none()
    }

    pub fn last_save_error(&self) -> Option<String> {
        let inner = self.inner.lock().expect("state lock poisoned");
        inner.last_save_error.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::json::JsonBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> StateManager {
        let backend = JsonBackend::new(dir.path().join("state.json"), 3);
        StateManager::open(Box::new(backend)).unwrap()
    }

    /// Backend whose saves always fail; loads succeed with nothing.
    struct BrokenBackend;

    impl StateBackend for BrokenBackend {
        fn save(&self, _state: &SharedState) -> Result<()> {
            Err(HiveError::Persistence("disk full".to_string()))
        }
        fn load(&self) -> Result<Option<SharedState>> {
            Ok(None)
        }
        fn backup(&self) -> Result<BackupHandle> {
            Err(HiveError::Persistence("disk full".to_string()))
        }
        fn restore(&self, _handle: &BackupHandle) -> Result<()> {
            Err(HiveError::Persistence("disk full".to_string()))
        }
    }

    #[test]
    fn register_create_assign_scenario() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        manager
            .register_agent(AgentState::new("backend-api", "Backend API"))
            .unwrap();
        let task_id = manager.create_task("Deploy v2", Priority::High).unwrap();
        manager.assign_task(&task_id, "backend-api").unwrap();

        let state = manager.snapshot();
        let task = &state.tasks[&task_id];
        assert_eq!(task.status, crate::types::TaskStatus::InProgress);
        assert_eq!(task.assigned_agent.as_deref(), Some("backend-api"));
        assert_eq!(
            state.agents["backend-api"].current_task.as_deref(),
            Some(task_id.as_str())
        );
        assert_eq!(state.agents["backend-api"].status, AgentStatus::Busy);
    }

    #[test]
    fn register_rejects_malformed_input() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        assert!(manager.register_agent(AgentState::new("", "No id")).is_err());
        assert!(manager
            .register_agent(AgentState::new("ok-id", "  "))
            .is_err());
    }

    #[test]
    fn update_unknown_agent_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let err = manager.update_agent_status("ghost", AgentStatus::Busy, AgentUpdate::default());
        assert!(matches!(err, Err(HiveError::AgentNotFound(_))));
    }

    #[test]
    fn status_update_is_idempotent_modulo_activity() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.register_agent(AgentState::new("a", "A")).unwrap();

        manager
            .update_agent_status("a", AgentStatus::Busy, AgentUpdate::default())
            .unwrap();
        let first = manager.snapshot();
        manager
            .update_agent_status("a", AgentStatus::Busy, AgentUpdate::default())
            .unwrap();
        let second = manager.snapshot();

        assert_eq!(first.agents["a"].status, second.agents["a"].status);
        assert_eq!(
            first.agents["a"].current_task,
            second.agents["a"].current_task
        );
        assert!(second.agents["a"].last_activity >= first.agents["a"].last_activity);
    }

    #[test]
    fn assign_to_unknown_agent_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let task_id = manager.create_task("Orphan", Priority::Low).unwrap();

        let err = manager.assign_task(&task_id, "nobody");
        assert!(matches!(err, Err(HiveError::AgentNotFound(_))));

        let state = manager.snapshot();
        assert_eq!(state.tasks[&task_id].status, crate::types::TaskStatus::Pending);
        assert!(state.tasks[&task_id].assigned_agent.is_none());
    }

    #[test]
    fn complete_pending_task_fails_and_preserves_status() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let task_id = manager.create_task("Not started", Priority::Low).unwrap();

        let err = manager.complete_task(&task_id, TaskOutcome::Completed("done".into()));
        assert!(matches!(err, Err(HiveError::InvalidTransition { .. })));
        assert_eq!(
            manager.snapshot().tasks[&task_id].status,
            crate::types::TaskStatus::Pending
        );
    }

    #[test]
    fn complete_task_frees_the_agent() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.register_agent(AgentState::new("w", "Worker")).unwrap();
        let task_id = manager.create_task("Work", Priority::Medium).unwrap();
        manager.assign_task(&task_id, "w").unwrap();

        manager
            .complete_task(&task_id, TaskOutcome::Failed("timeout".into()))
            .unwrap();

        let state = manager.snapshot();
        assert_eq!(state.tasks[&task_id].status, crate::types::TaskStatus::Failed);
        assert_eq!(state.tasks[&task_id].error.as_deref(), Some("timeout"));
        assert!(state.agents["w"].current_task.is_none());
        assert_eq!(state.agents["w"].status, AgentStatus::Idle);
    }

    #[test]
    fn send_message_then_inbox() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager
            .send_message(
                "supervisor",
                Recipient::Direct("testing".into()),
                "Run suite",
                None,
                Priority::Medium,
            )
            .unwrap();

        let inbox = manager.inbox_for("testing");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "Run suite");
        assert_eq!(inbox[0].sender_id, "supervisor");
        assert!(!inbox[0].read);
    }

    #[test]
    fn send_message_does_not_validate_recipient_existence() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        // No agents registered at all.
        let id = manager
            .send_message(
                "supervisor",
                Recipient::Direct("never-registered".into()),
                "hello",
                None,
                Priority::Low,
            )
            .unwrap();
        assert!(!id.is_empty());
    }

    #[test]
    fn mark_read_mutates_only_the_flag() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let id = manager
            .send_message("a", Recipient::Broadcast, "hi", None, Priority::Low)
            .unwrap();
        manager.mark_message_read(&id).unwrap();
        assert!(manager.snapshot().messages[0].read);
    }

    #[test]
    fn observer_failure_does_not_roll_back_mutation() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let second_called = Arc::new(AtomicUsize::new(0));

        manager.add_observer(|_| panic!("bad observer"));
        {
            let second_called = second_called.clone();
            manager.add_observer(move |_| {
                second_called.fetch_add(1, Ordering::SeqCst);
            });
        }

        let task_id = manager.create_task("Survives", Priority::Low).unwrap();
        assert_eq!(second_called.load(Ordering::SeqCst), 1);
        assert!(manager.snapshot().tasks.contains_key(&task_id));
    }

    #[test]
    fn observers_receive_event_payloads() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let seen: Arc<std::sync::Mutex<Vec<StateEvent>>> = Arc::default();
        {
            let seen = seen.clone();
            manager.add_observer(move |e| seen.lock().unwrap().push(e.clone()));
        }

        manager.register_agent(AgentState::new("a", "A")).unwrap();
        let task_id = manager.create_task("T", Priority::Low).unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(
            events[0],
            StateEvent::AgentRegistered {
                agent_id: "a".into()
            }
        );
        assert_eq!(events[1], StateEvent::TaskCreated { task_id });
    }

    #[test]
    fn failed_save_keeps_in_memory_state() {
        let manager = StateManager::open(Box::new(BrokenBackend)).unwrap();
        manager.register_agent(AgentState::new("a", "A")).unwrap();

        assert!(!manager.persistence_healthy());
        assert!(manager.last_save_error().unwrap().contains("disk full"));
        // The mutation landed in memory regardless.
        assert!(manager.snapshot().agents.contains_key("a"));
    }

    #[test]
    fn snapshot_is_detached_from_live_state() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let mut snap = manager.snapshot();
        snap.insert_agent(AgentState::new("ghost", "Ghost"));
        assert!(manager.snapshot().agents.is_empty());
    }

    #[test]
    fn manager_reloads_persisted_state() {
        let dir = TempDir::new().unwrap();
        {
            let manager = manager_in(&dir);
            manager.register_agent(AgentState::new("a", "A")).unwrap();
        }
        let reopened = manager_in(&dir);
        assert!(reopened.snapshot().agents.contains_key("a"));
    }

    #[test]
    fn backup_restore_through_manager() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        manager.register_agent(AgentState::new("keep", "Keep")).unwrap();
        let handle = manager.backup().unwrap();

        manager.register_agent(AgentState::new("extra", "Extra")).unwrap();
        manager.restore_from_backup(&handle).unwrap();

        let state = manager.snapshot();
        assert!(state.agents.contains_key("keep"));
        assert!(!state.agents.contains_key("extra"));
    }

    /// Two manager instances over the same file are not coordinated: the
    /// second save wins wholesale. This documents the failure mode rather
    /// than asserting a merge.
    #[test]
    fn concurrent_managers_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        {
            let seed = manager_in(&dir);
            seed.register_agent(AgentState::new("a", "A")).unwrap();
            seed.register_agent(AgentState::new("b", "B")).unwrap();
        }

        // Both load the same document.
        let first = manager_in(&dir);
        let second = manager_in(&dir);

        first
            .update_agent_status("a", AgentStatus::Busy, AgentUpdate::default())
            .unwrap();
        second
            .update_agent_status("b", AgentStatus::Error, AgentUpdate::default())
            .unwrap();

        // The file holds only the second writer's view; the first writer's
        // update to agent "a" was lost.
        let on_disk = manager_in(&dir).snapshot();
        assert_eq!(on_disk.agents["b"].status, AgentStatus::Error);
        assert_eq!(on_disk.agents["a"].status, AgentStatus::Idle);
    }
}
