//! reconbot - reconciliation-act request robot
//!
//! Picks up reconciliation requests dropped into an input folder, resolves
//! each one against the counterparty registry into concrete tasks, drives
//! every task through an external stateful session and writes a terminal
//! status back onto the request.
//!
//! # Processing
//!
//! - Documents are handled one at a time, tasks one at a time
//! - Each task acquires the external session and always releases it
//! - A failing task or category is skipped; the document carries on
//! - Every document gets an append-only journal next to it
//!
//! # Modules
//!
//! - `adapters`: External session bridge and artifact inspection
//! - `config`: YAML + environment configuration
//! - `core`: Resolver, executor, polling, reporting, orchestrator
//! - `domain`: Data structures (Request, Task, Event, DocumentRun)
//! - `ingest`: Request documents, parsing, inbox
//! - `registry`: Counterparty registry export
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process every pending request
//! reconbot run
//!
//! # Show the tasks a request would produce
//! reconbot resolve --document SD123+.txt --registry registry.csv
//!
//! # Replay a processed document's journal
//! reconbot status data/requests/input/SD123+
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod registry;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, TaskExecutor, TaskResolver};
pub use domain::{ReportStatus, Request, RequestType, Task};
pub use registry::RegistryTable;
