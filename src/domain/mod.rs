//! Domain types for the reconciliation robot.
//!
//! This module contains the core data structures:
//! - Request: validated snapshot of an incoming document
//! - Task: one resolved unit of work
//! - Events / DocumentRun: processing journal and its replayed state

pub mod events;
pub mod request;
pub mod run;
pub mod task;

// Re-export commonly used types
pub use events::{Event, EventType};
pub use request::{ReportStatus, Request, RequestType};
pub use run::{DocumentRun, RunState, TaskState};
pub use task::Task;
