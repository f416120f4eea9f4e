//! Document loop.
//!
//! Coordinates inbox claiming, request parsing, registry resolution, task
//! execution, status write-back and journaling. Every document ends with a
//! status on it; no document failure escapes the loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{ArtifactInspector, Collaborator};
use crate::config::ResolvedConfig;
use crate::domain::{Event, EventType, ReportStatus, Request, RequestType, Task};
use crate::ingest::{Inbox, RequestDocument, RequestParser};
use crate::registry::RegistryTable;

use super::executor::{ExecutionObserver, ExecutionOutcome, TaskExecutor, TaskOutcome};
use super::journal::Journal;
use super::reporter::StatusReporter;
use super::resolver::TaskResolver;

/// Final result of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    /// Document path after claiming
    pub path: PathBuf,
    pub status: ReportStatus,
    pub message: String,
    /// Tasks resolved (and therefore attempted)
    pub tasks: usize,
}

/// Tally of one pass over the inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub documents: usize,
    pub ok: usize,
    pub failed: usize,
}

/// Final status for an execution outcome.
///
/// `OK` only when every task completed; otherwise `error` with the counts
/// and the first problem.
pub fn aggregate_status(outcome: &ExecutionOutcome) -> (ReportStatus, String) {
    if outcome.all_completed() {
        return (
            ReportStatus::Ok,
            format!(
                "Processed {} of {} tasks",
                outcome.completed(),
                outcome.total()
            ),
        );
    }

    let mut message = format!(
        "Processed {} of {} tasks: {} with warnings, {} failed",
        outcome.completed(),
        outcome.total(),
        outcome.warnings(),
        outcome.failures()
    );
    if let Some(problem) = outcome.first_problem() {
        message.push_str(". First problem: ");
        message.push_str(problem);
    }
    (ReportStatus::Error, message)
}

/// Journals task events and writes warnings onto the document as they happen
struct DocumentObserver<'a> {
    run_id: Uuid,
    journal: &'a Journal,
    reporter: StatusReporter,
    document: Mutex<RequestDocument>,
}

impl<'a> DocumentObserver<'a> {
    fn into_document(self) -> RequestDocument {
        self.document.into_inner()
    }
}

#[async_trait]
impl<'a> ExecutionObserver for DocumentObserver<'a> {
    async fn task_started(&self, index: usize, task: &Task) {
        self.journal
            .record(Event::new(
                self.run_id,
                Some(index),
                EventType::TaskStarted,
                task.describe(),
            ))
            .await;
    }

    async fn task_finished(
        &self,
        index: usize,
        _task: &Task,
        outcome: &TaskOutcome,
        duration_ms: u64,
    ) {
        let summary = format!("Task {}", index + 1);
        let event = match outcome {
            TaskOutcome::Completed => {
                Event::new(self.run_id, Some(index), EventType::TaskCompleted, summary)
            }
            TaskOutcome::Warning { message } => {
                Event::new(self.run_id, Some(index), EventType::TaskWarning, summary)
                    .with_error(message.as_str())
            }
            TaskOutcome::Failed { error } => {
                Event::new(self.run_id, Some(index), EventType::TaskFailed, summary)
                    .with_error(error.as_str())
            }
        }
        .with_duration(duration_ms);
        self.journal.record(event).await;

        if let TaskOutcome::Warning { message } = outcome {
            let mut doc = self.document.lock().await;
            self.reporter
                .report(&mut doc, ReportStatus::Error, message)
                .await;
        }
    }
}

/// Main document orchestrator
pub struct Orchestrator {
    inbox: Inbox,
    registry_path: PathBuf,
    required_columns: usize,
    parser: RequestParser,
    resolver: TaskResolver,
    executor: TaskExecutor,
    reporter: StatusReporter,
}

impl Orchestrator {
    /// Create an orchestrator from resolved configuration
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        Ok(Self {
            inbox: Inbox::new(config.folders.input.clone())?,
            registry_path: config.registry_path.clone(),
            required_columns: config.registry.required_columns,
            parser: RequestParser::new(config.request_types.clone()),
            resolver: TaskResolver::new(
                config.branch_codes.clone(),
                config.delimiters.clone(),
                config.registry.clone(),
            ),
            executor: TaskExecutor::new(&config.bridge, &config.folders),
            reporter: StatusReporter::new(),
        })
    }

    /// Process every pending document in the inbox.
    ///
    /// Only an unreadable input folder is an error; document failures are
    /// written onto the documents themselves.
    #[instrument(skip_all, fields(input = %self.inbox.input_dir().display()))]
    pub async fn run(
        &self,
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
    ) -> Result<BatchSummary> {
        let files = self.inbox.scan().await?;
        info!(documents = files.len(), "Inbox scanned");

        let mut summary = BatchSummary::default();
        for file in &files {
            let report = self.process_document(file, collaborator, inspector).await;
            summary.documents += 1;
            match report.status {
                ReportStatus::Ok => summary.ok += 1,
                ReportStatus::Error => summary.failed += 1,
            }
        }

        info!(
            documents = summary.documents,
            ok = summary.ok,
            failed = summary.failed,
            "No documents left to process"
        );
        Ok(summary)
    }

    /// Process one pending document end to end
    #[instrument(skip_all, fields(document = %file.display()))]
    pub async fn process_document(
        &self,
        file: &Path,
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
    ) -> DocumentReport {
        let path = self.inbox.claim(file).await;
        let journal = Journal::for_document(&path);
        let run_id = Uuid::new_v4();

        journal
            .record(Event::new(
                run_id,
                None,
                EventType::DocumentStarted,
                path.display().to_string(),
            ))
            .await;

        let mut doc = match RequestDocument::open(&path).await {
            Ok(doc) => doc,
            Err(e) => {
                // Nothing to write a status onto
                let message = e.to_string();
                error!(error = %message, "Failed to open document");
                self.journal_finish(&journal, run_id, ReportStatus::Error, &message)
                    .await;
                return DocumentReport {
                    path,
                    status: ReportStatus::Error,
                    message,
                    tasks: 0,
                };
            }
        };

        let (kind, tasks) = match self.prepare(&mut doc, &journal, run_id).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, "Document rejected");
                return self
                    .finish(doc, path, &journal, run_id, ReportStatus::Error, message, 0)
                    .await;
            }
        };

        if tasks.is_empty() {
            warn!(kind = %kind, "No tasks resolved");
            return self
                .finish(
                    doc,
                    path,
                    &journal,
                    run_id,
                    ReportStatus::Ok,
                    "No tasks resolved".to_string(),
                    0,
                )
                .await;
        }

        let observer = DocumentObserver {
            run_id,
            journal: &journal,
            reporter: self.reporter,
            document: Mutex::new(doc),
        };
        let outcome = self
            .executor
            .run(&tasks, collaborator, inspector, &observer)
            .await;
        let doc = observer.into_document();

        let (status, message) = aggregate_status(&outcome);
        self.finish(doc, path, &journal, run_id, status, message, tasks.len())
            .await
    }

    /// Parse and resolve without executing anything.
    ///
    /// `registry` overrides the configured registry export.
    pub async fn resolve_document(
        &self,
        path: &Path,
        registry: Option<&Path>,
    ) -> Result<(Request, Vec<Task>)> {
        let mut doc = RequestDocument::open(path).await?;
        let request = self.parser.parse(&mut doc)?;
        let table = self.load_registry(registry.unwrap_or(&self.registry_path))?;
        let tasks = self.resolver.resolve(&request, &table)?;
        Ok((request, tasks))
    }

    fn load_registry(&self, path: &Path) -> Result<RegistryTable> {
        RegistryTable::from_path(path, self.required_columns)
            .context("Registry export is not available")
    }

    /// Parse, load the registry and resolve tasks
    async fn prepare(
        &self,
        doc: &mut RequestDocument,
        journal: &Journal,
        run_id: Uuid,
    ) -> Result<(RequestType, Vec<Task>)> {
        let request = self.parser.parse(doc)?;
        info!("Request parsed:\n{}", request.summary());
        journal
            .record(Event::new(
                run_id,
                None,
                EventType::RequestParsed,
                format!("{} {}", request.id, request.request_type),
            ))
            .await;

        let table = self.load_registry(&self.registry_path)?;

        let tasks = self.resolver.resolve(&request, &table)?;
        journal
            .record(
                Event::new(
                    run_id,
                    None,
                    EventType::TasksResolved,
                    format!("resolved {} tasks", tasks.len()),
                )
                .with_task_count(tasks.len()),
            )
            .await;

        // Inventory reports resolution on its own, before execution
        if request.request_type == RequestType::FullInventory {
            self.reporter
                .report(
                    doc,
                    ReportStatus::Ok,
                    &format!("Tasks generated: {}", tasks.len()),
                )
                .await;
        }

        Ok((request.request_type, tasks))
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        mut doc: RequestDocument,
        path: PathBuf,
        journal: &Journal,
        run_id: Uuid,
        status: ReportStatus,
        message: String,
        tasks: usize,
    ) -> DocumentReport {
        self.reporter.report(&mut doc, status, &message).await;
        self.journal_finish(journal, run_id, status, &message).await;

        info!(status = %status, tasks, "Document finished");
        DocumentReport {
            path,
            status,
            message,
            tasks,
        }
    }

    async fn journal_finish(
        &self,
        journal: &Journal,
        run_id: Uuid,
        status: ReportStatus,
        message: &str,
    ) {
        let event = match status {
            ReportStatus::Ok => Event::new(run_id, None, EventType::DocumentCompleted, message),
            ReportStatus::Error => {
                Event::new(run_id, None, EventType::DocumentFailed, "Document failed")
                    .with_error(message)
            }
        };
        journal.record(event).await;
    }
}
