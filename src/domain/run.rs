//! Document run state reconstructed from journal events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{Event, EventType};

/// Summary of one processing pass over a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRun {
    /// Run identifier
    pub id: Uuid,

    /// Current state of the run
    pub state: RunState,

    /// When processing started
    pub started_at: DateTime<Utc>,

    /// When the final status was written (if it was)
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of tasks the resolver produced
    pub tasks_resolved: usize,

    /// Outcome per task index
    pub task_states: BTreeMap<usize, TaskState>,
}

impl DocumentRun {
    /// Reconstruct the latest run from a sequence of events.
    ///
    /// A journal may hold several runs when a document is re-submitted;
    /// only events of the last run are applied.
    pub fn from_events(events: &[Event]) -> Option<Self> {
        let last = events.last()?;
        let run_id = last.run_id;
        let mut run_events = events.iter().filter(|e| e.run_id == run_id);
        let first = run_events.next()?;

        let mut run = Self {
            id: run_id,
            state: RunState::Running,
            started_at: first.timestamp,
            completed_at: None,
            tasks_resolved: 0,
            task_states: BTreeMap::new(),
        };

        run.apply_event(first);
        for event in run_events {
            run.apply_event(event);
        }

        Some(run)
    }

    /// Apply a single event to update run state
    pub fn apply_event(&mut self, event: &Event) {
        match event.event_type {
            EventType::DocumentStarted => {
                self.state = RunState::Running;
                self.started_at = event.timestamp;
            }
            EventType::RequestParsed => {}
            EventType::TasksResolved => {
                self.tasks_resolved = event.task_count.unwrap_or(0);
            }
            EventType::TaskStarted => self.set_task(event, TaskState::Running),
            EventType::TaskCompleted => self.set_task(event, TaskState::Completed),
            EventType::TaskWarning => self.set_task(event, TaskState::Warning),
            EventType::TaskFailed => self.set_task(event, TaskState::Failed),
            EventType::DocumentCompleted => {
                self.state = RunState::Completed;
                self.completed_at = Some(event.timestamp);
            }
            EventType::DocumentFailed => {
                self.state = RunState::Failed {
                    error: event.error.clone().unwrap_or_default(),
                };
                self.completed_at = Some(event.timestamp);
            }
        }
    }

    fn set_task(&mut self, event: &Event, state: TaskState) {
        if let Some(idx) = event.task_index {
            self.task_states.insert(idx, state);
        }
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    /// Count tasks in a given state
    pub fn count(&self, state: TaskState) -> usize {
        self.task_states.values().filter(|s| **s == state).count()
    }
}

/// State of a document run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    Running,
    Completed,
    Failed { error: String },
}

/// State of an individual task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Completed,
    Warning,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_from_events() {
        let run_id = Uuid::new_v4();

        let events = vec![
            Event::new(run_id, None, EventType::DocumentStarted, "SD1+.txt"),
            Event::new(run_id, None, EventType::TasksResolved, "tasks resolved")
                .with_task_count(2),
            Event::new(run_id, Some(0), EventType::TaskStarted, "task 0"),
            Event::new(run_id, Some(0), EventType::TaskCompleted, "task 0"),
            Event::new(run_id, Some(1), EventType::TaskStarted, "task 1"),
            Event::new(run_id, Some(1), EventType::TaskFailed, "task 1").with_error("boom"),
            Event::new(run_id, None, EventType::DocumentFailed, "done").with_error("1 failed"),
        ];

        let run = DocumentRun::from_events(&events).unwrap();
        assert_eq!(run.tasks_resolved, 2);
        assert_eq!(run.count(TaskState::Completed), 1);
        assert_eq!(run.count(TaskState::Failed), 1);
        assert_eq!(
            run.state,
            RunState::Failed {
                error: "1 failed".to_string()
            }
        );
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_only_last_run_is_applied() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let events = vec![
            Event::new(first, None, EventType::DocumentStarted, "a"),
            Event::new(first, None, EventType::DocumentCompleted, "a"),
            Event::new(second, None, EventType::DocumentStarted, "b"),
        ];

        let run = DocumentRun::from_events(&events).unwrap();
        assert_eq!(run.id, second);
        assert!(run.is_running());
    }

    #[test]
    fn test_task_count_ignores_summary_text() {
        let run_id = Uuid::new_v4();
        let events = vec![
            Event::new(run_id, None, EventType::DocumentStarted, "SD7 v2+.txt"),
            Event::new(run_id, None, EventType::TasksResolved, "resolved 9 tasks"),
        ];
        assert_eq!(DocumentRun::from_events(&events).unwrap().tasks_resolved, 0);

        let events = vec![
            Event::new(run_id, None, EventType::DocumentStarted, "SD7 v2+.txt"),
            Event::new(run_id, None, EventType::TasksResolved, "branch 1000 status 2")
                .with_task_count(3),
        ];
        assert_eq!(DocumentRun::from_events(&events).unwrap().tasks_resolved, 3);
    }

    #[test]
    fn test_empty_events() {
        assert!(DocumentRun::from_events(&[]).is_none());
    }
}
