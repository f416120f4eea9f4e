//! Core processing logic.
//!
//! This module contains:
//! - TaskResolver: request + registry to tasks
//! - Plans: interaction plans for the external system
//! - Poll: bounded wait-until-ready primitive
//! - TaskExecutor: acquire/execute/collect/release per task
//! - StatusReporter / Journal: write-back and per-document history
//! - Orchestrator: the document loop

pub mod executor;
pub mod journal;
pub mod orchestrator;
pub mod plan;
pub mod poll;
pub mod reporter;
pub mod resolver;

// Re-export commonly used types
pub use executor::{
    ExecutionError, ExecutionObserver, ExecutionOutcome, NoopObserver, TaskExecutor, TaskOutcome,
};
pub use journal::Journal;
pub use orchestrator::{aggregate_status, BatchSummary, DocumentReport, Orchestrator};
pub use plan::{Action, CategoryPlan, InteractionPlan};
pub use poll::{poll_until, PollError, PollPolicy, ProbeFuture};
pub use reporter::StatusReporter;
pub use resolver::{ResolveError, TaskResolver};
