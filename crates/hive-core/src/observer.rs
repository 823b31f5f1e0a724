use crate::types::{AgentStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

// ---------------------------------------------------------------------------
// StateEvent
// ---------------------------------------------------------------------------

/// Emitted once per successful mutation, after the persistence attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEvent {
    AgentRegistered { agent_id: String },
    AgentUpdated { agent_id: String, status: AgentStatus },
    TaskCreated { task_id: String },
    TaskAssigned { task_id: String, agent_id: String },
    TaskFinished { task_id: String, status: TaskStatus },
    MessageSent { message_id: String, recipient: String },
    MessageRead { message_id: String },
    StateRestored,
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

pub type ObserverFn = dyn Fn(&StateEvent) + Send + Sync;

/// Registered callbacks, invoked synchronously and in registration order.
///
/// Failure is isolated per observer: a panicking callback is caught and
/// logged, and neither blocks the remaining observers nor fails the
/// mutation that triggered it.
#[derive(Default)]
pub struct Observers {
    callbacks: Vec<Box<ObserverFn>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: impl Fn(&StateEvent) + Send + Sync + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn notify(&self, event: &StateEvent) {
        for (i, callback) in self.callbacks.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(observer = i, ?event, "observer panicked; continuing");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn observers_called_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        for _ in 0..3 {
            let calls = calls.clone();
            observers.add(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        observers.notify(&StateEvent::StateRestored);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_observer_does_not_block_the_next() {
        let called = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        observers.add(|_| panic!("bad observer"));
        {
            let called = called.clone();
            observers.add(move |_| {
                called.fetch_add(1, Ordering::SeqCst);
            });
        }
        observers.notify(&StateEvent::TaskCreated {
            task_id: "t-1".into(),
        });
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_serializes_with_tag() {
        let event = StateEvent::TaskAssigned {
            task_id: "t-1".into(),
            agent_id: "backend-api".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "task_assigned");
        assert_eq!(json["agent_id"], "backend-api");
    }
}
