//! Journal events for document processing.
//!
//! Every document gets an append-only log of what happened to it. The
//! summary of a processed document can be reconstructed by replaying it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a document journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The processing run this event belongs to (one run per document pass)
    pub run_id: Uuid,

    /// Task index within the document (task events only)
    pub task_index: Option<usize>,

    /// Type of event
    pub event_type: EventType,

    /// Human-readable summary (NO credentials)
    pub payload_summary: String,

    /// Time taken in milliseconds (task completion events)
    pub duration_ms: Option<u64>,

    /// Error or warning text
    pub error: Option<String>,

    /// Number of tasks produced (resolution events)
    #[serde(default)]
    pub task_count: Option<usize>,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        task_index: Option<usize>,
        event_type: EventType,
        payload_summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            task_index,
            event_type,
            payload_summary: payload_summary.into(),
            duration_ms: None,
            error: None,
            task_count: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_task_count(mut self, count: usize) -> Self {
        self.task_count = Some(count);
        self
    }
}

/// Types of journal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Document claimed from the inbox
    DocumentStarted,

    /// Request parsed and validated
    RequestParsed,

    /// Tasks derived from the registry
    TasksResolved,

    /// Task execution started
    TaskStarted,

    /// Task finished cleanly
    TaskCompleted,

    /// Task finished, but the exported error list was not empty
    TaskWarning,

    /// Task skipped after a per-task failure
    TaskFailed,

    /// Final status written as OK
    DocumentCompleted,

    /// Final status written as error
    DocumentFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = Event::new(
            Uuid::new_v4(),
            Some(0),
            EventType::TaskStarted,
            "branch=1000 status=EDI",
        );

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type, EventType::TaskStarted);
        assert_eq!(parsed.task_index, Some(0));
        assert!(json.contains("\"task_started\""));
    }

    #[test]
    fn test_event_with_error() {
        let event = Event::new(Uuid::new_v4(), Some(2), EventType::TaskFailed, "skipped")
            .with_error("session unavailable")
            .with_duration(1500);

        assert_eq!(event.error.as_deref(), Some("session unavailable"));
        assert_eq!(event.duration_ms, Some(1500));
    }

    #[test]
    fn test_task_count_defaults_when_absent() {
        let event = Event::new(Uuid::new_v4(), None, EventType::TasksResolved, "resolved")
            .with_task_count(4);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.task_count, Some(4));

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value.as_object_mut().unwrap().remove("task_count");
        let legacy: Event = serde_json::from_value(value).unwrap();
        assert_eq!(legacy.task_count, None);
    }
}
