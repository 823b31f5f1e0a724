use crate::error::{HiveError, Result};
use crate::types::{Priority, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal outcome passed to `complete_task`.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed(String),
    Failed(String),
}

impl TaskInfo {
    pub fn new(description: impl Into<String>, priority: Priority) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority,
            assigned_agent: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// PENDING -> IN_PROGRESS. Any other starting status is an error.
    pub fn assign(&mut self, agent_id: &str) -> Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(HiveError::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status.to_string(),
                to: TaskStatus::InProgress.to_string(),
            });
        }
        self.status = TaskStatus::InProgress;
        self.assigned_agent = Some(agent_id.to_string());
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// IN_PROGRESS -> {COMPLETED, FAILED}. Terminal; there is no requeue.
    pub fn finish(&mut self, outcome: TaskOutcome) -> Result<()> {
        if self.status != TaskStatus::InProgress {
            let to = match &outcome {
                TaskOutcome::Completed(_) => TaskStatus::Completed,
                TaskOutcome::Failed(_) => TaskStatus::Failed,
            };
            return Err(HiveError::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        match outcome {
            TaskOutcome::Completed(result) => {
                self.status = TaskStatus::Completed;
                self.result = Some(result);
            }
            TaskOutcome::Failed(error) => {
                self.status = TaskStatus::Failed;
                self.error = Some(error);
            }
        }
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

/// Human-readable summary: "2/5 completed, 1 in progress, 1 failed"
pub fn summarize<'a>(tasks: impl Iterator<Item = &'a TaskInfo>) -> String {
    let mut total = 0;
    let mut done = 0;
    let mut in_progress = 0;
    let mut failed = 0;
    for t in tasks {
        total += 1;
        match t.status {
            TaskStatus::Completed => done += 1,
            TaskStatus::InProgress => in_progress += 1,
            TaskStatus::Failed => failed += 1,
            TaskStatus::Pending => {}
        }
    }
    format!("{done}/{total} completed, {in_progress} in progress, {failed} failed")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_lifecycle() {
        let mut task = TaskInfo::new("Deploy v2", Priority::High);
        assert_eq!(task.status, TaskStatus::Pending);

        task.assign("backend-api").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assigned_agent.as_deref(), Some("backend-api"));
        assert!(task.started_at.is_some());

        task.finish(TaskOutcome::Completed("deployed".into())).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("deployed"));
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn finish_pending_task_is_rejected() {
        let mut task = TaskInfo::new("Not started", Priority::Low);
        let err = task.finish(TaskOutcome::Completed("nope".into()));
        assert!(matches!(err, Err(HiveError::InvalidTransition { .. })));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn assign_twice_is_rejected() {
        let mut task = TaskInfo::new("Once only", Priority::Medium);
        task.assign("a").unwrap();
        assert!(task.assign("b").is_err());
        assert_eq!(task.assigned_agent.as_deref(), Some("a"));
    }

    #[test]
    fn failed_outcome_sets_error() {
        let mut task = TaskInfo::new("Flaky", Priority::Medium);
        task.assign("a").unwrap();
        task.finish(TaskOutcome::Failed("timeout".into())).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("timeout"));
        assert!(task.result.is_none());
    }

    #[test]
    fn summary_counts() {
        let mut tasks = vec![
            TaskInfo::new("a", Priority::Low),
            TaskInfo::new("b", Priority::Low),
            TaskInfo::new("c", Priority::Low),
        ];
        tasks[0].assign("x").unwrap();
        tasks[0].finish(TaskOutcome::Completed("ok".into())).unwrap();
        tasks[1].assign("x").unwrap();
        assert_eq!(summarize(tasks.iter()), "1/3 completed, 1 in progress, 0 failed");
    }
}
