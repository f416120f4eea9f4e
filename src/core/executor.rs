//! Per-task execution against the collaborator.
//!
//! Tasks run strictly one after another, each in its own session:
//!
//! 1. acquire: start a session, refuse it if the status bar reports a block
//! 2. execute: fill the header, then run every account category; a failed
//!    category is logged and skipped
//! 3. collect: export the error list and look for the "no data" sentinel
//! 4. release: close the session and terminate the process, on every path
//!
//! Nothing here returns an error to the caller. Each task ends as
//! completed, warning or failed, and the next task runs regardless.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{ArtifactInspector, Collaborator};
use crate::config::{BridgeSettings, RequestFolders};
use crate::domain::Task;

use super::plan::{address, CategoryPlan, InteractionPlan};
use super::poll::{poll_until, PollError, PollPolicy};

/// Execution failures, split by how far they reach
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Session could not be acquired: {0}")]
    Session(String),

    #[error("Session is blocked: {0}")]
    Blocked(String),

    #[error("{element} did not appear after {attempts} attempts")]
    ElementTimeout {
        element: &'static str,
        attempts: u32,
    },

    #[error("Category {category}: no data ({status})")]
    NoData { category: String, status: String },

    #[error("Category {category} failed: {reason}")]
    Category { category: String, reason: String },

    #[error("Collaborator call failed: {0}")]
    Collaborator(String),
}

impl ExecutionError {
    /// Whether the error ends the whole task rather than one category
    pub fn is_task_fatal(&self) -> bool {
        !matches!(self, Self::NoData { .. } | Self::Category { .. })
    }

    fn category(code: &str, e: anyhow::Error) -> Self {
        Self::Category {
            category: code.to_string(),
            reason: format!("{:#}", e),
        }
    }
}

/// How a single task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Ran to the end, but the exported error list has rows
    Warning { message: String },
    /// Skipped after a task-level failure
    Failed { error: String },
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Warning or failure text
    pub fn problem(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Warning { message } => Some(message),
            Self::Failed { error } => Some(error),
        }
    }
}

/// Outcomes of a task batch, in task order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub outcomes: Vec<TaskOutcome>,
}

impl ExecutionOutcome {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn warnings(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Warning { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Failed { .. }))
            .count()
    }

    pub fn all_completed(&self) -> bool {
        self.outcomes.iter().all(TaskOutcome::is_completed)
    }

    /// First warning or failure text, in task order
    pub fn first_problem(&self) -> Option<&str> {
        self.outcomes.iter().find_map(TaskOutcome::problem)
    }
}

/// Hooks invoked around each task
#[async_trait]
pub trait ExecutionObserver: Send + Sync {
    async fn task_started(&self, _index: usize, _task: &Task) {}

    async fn task_finished(
        &self,
        _index: usize,
        _task: &Task,
        _outcome: &TaskOutcome,
        _duration_ms: u64,
    ) {
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Sequential task runner
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    blocking_markers: Vec<String>,
    no_data_markers: Vec<String>,
    export_sentinel: String,
    save_dialog: PollPolicy,
    error_folder: PathBuf,
    output_folder: PathBuf,
}

fn contains_any(text: &str, markers: &[String]) -> bool {
    let text = text.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.trim().is_empty())
        .any(|m| text.contains(&m.to_lowercase()))
}

/// File-name-safe rendering of a registry status
fn file_safe(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

impl TaskExecutor {
    pub fn new(bridge: &BridgeSettings, folders: &RequestFolders) -> Self {
        Self {
            blocking_markers: bridge.blocking_markers.clone(),
            no_data_markers: bridge.no_data_markers.clone(),
            export_sentinel: bridge.export_sentinel.clone(),
            save_dialog: bridge.save_dialog.clone(),
            error_folder: folders.error.clone(),
            output_folder: folders.output.clone(),
        }
    }

    /// Where the error list of task `index` is exported
    pub fn artifact_path(&self, index: usize, task: &Task) -> PathBuf {
        self.error_folder.join(format!(
            "errors_{}_{}_{}.txt",
            file_safe(&task.branch_code),
            file_safe(&task.status),
            index + 1
        ))
    }

    /// Run every task in order
    pub async fn run(
        &self,
        tasks: &[Task],
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
        observer: &dyn ExecutionObserver,
    ) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();

        for (index, task) in tasks.iter().enumerate() {
            info!(task = index + 1, total = tasks.len(), "{}", task.describe());
            observer.task_started(index, task).await;

            let started = Instant::now();
            let result = self.run_task(index, task, collaborator, inspector).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match &result {
                TaskOutcome::Completed => info!(task = index + 1, duration_ms, "Task completed"),
                TaskOutcome::Warning { message } => {
                    warn!(task = index + 1, duration_ms, "{}", message)
                }
                TaskOutcome::Failed { error } => {
                    error!(task = index + 1, duration_ms, error = %error, "Task failed, moving on")
                }
            }

            observer.task_finished(index, task, &result, duration_ms).await;
            outcome.outcomes.push(result);
        }

        outcome
    }

    /// One task, with release on every exit path
    #[instrument(skip_all, fields(task = index + 1, collaborator = collaborator.name()))]
    async fn run_task(
        &self,
        index: usize,
        task: &Task,
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
    ) -> TaskOutcome {
        let result = self.drive(index, task, collaborator, inspector).await;
        self.release(collaborator).await;

        match result {
            Ok(None) => TaskOutcome::Completed,
            Ok(Some(message)) => TaskOutcome::Warning { message },
            Err(e) => TaskOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn drive(
        &self,
        index: usize,
        task: &Task,
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
    ) -> Result<Option<String>, ExecutionError> {
        self.acquire(collaborator).await?;
        self.execute(task, collaborator).await?;
        self.collect(index, task, collaborator, inspector).await
    }

    async fn acquire(&self, collaborator: &mut dyn Collaborator) -> Result<(), ExecutionError> {
        collaborator
            .start_session()
            .await
            .map_err(|e| ExecutionError::Session(format!("{:#}", e)))?;

        let status = collaborator
            .status_text()
            .await
            .map_err(|e| ExecutionError::Session(format!("{:#}", e)))?;
        if contains_any(&status, &self.blocking_markers) {
            return Err(ExecutionError::Blocked(status));
        }

        debug!("Session acquired");
        Ok(())
    }

    async fn execute(
        &self,
        task: &Task,
        collaborator: &mut dyn Collaborator,
    ) -> Result<(), ExecutionError> {
        let plan = InteractionPlan::for_task(task);

        for action in &plan.header {
            collaborator
                .apply(action)
                .await
                .map_err(|e| ExecutionError::Collaborator(format!("{:#}", e)))?;
        }

        let mut processed = 0usize;
        for category in &plan.categories {
            match self.run_category(&plan, category, collaborator).await {
                Ok(()) => {
                    processed += 1;
                    info!(category = %category.code, "Category processed");
                }
                Err(e) if e.is_task_fatal() => return Err(e),
                Err(e) => {
                    warn!(category = %category.code, error = %e, "Skipping category");
                    if let Err(back) = collaborator.press(address::NAVIGATION_BACK).await {
                        debug!(error = %back, "Navigation back failed");
                    }
                }
            }
        }

        if processed == 0 {
            warn!(categories = plan.categories.len(), "No category was processed");
        }
        Ok(())
    }

    async fn run_category(
        &self,
        plan: &InteractionPlan,
        category: &CategoryPlan,
        collaborator: &mut dyn Collaborator,
    ) -> Result<(), ExecutionError> {
        let code = category.code.as_str();

        for action in &category.actions {
            collaborator
                .apply(action)
                .await
                .map_err(|e| ExecutionError::category(code, e))?;
        }

        let status = collaborator
            .status_text()
            .await
            .map_err(|e| ExecutionError::category(code, e))?;
        if contains_any(&status, &self.blocking_markers) {
            return Err(ExecutionError::Blocked(status));
        }
        if contains_any(&status, &self.no_data_markers) {
            return Err(ExecutionError::NoData {
                category: code.to_string(),
                status,
            });
        }

        for action in &plan.documents {
            collaborator
                .apply(action)
                .await
                .map_err(|e| ExecutionError::category(code, e))?;
        }

        let attempt = poll_until(&self.save_dialog, &mut *collaborator, |c| {
            c.save_dialog_ready()
        })
        .await
        .map_err(|PollError::Exhausted { attempts }| ExecutionError::ElementTimeout {
            element: "Save dialog",
            attempts,
        })?;
        debug!(category = code, attempt, "Save dialog ready");

        collaborator
            .confirm_save_dialog(&self.output_folder)
            .await
            .map_err(|e| ExecutionError::category(code, e))?;
        collaborator
            .press(address::NAVIGATION_BACK)
            .await
            .map_err(|e| ExecutionError::category(code, e))?;

        Ok(())
    }

    /// Export the error list and classify it. `Some(message)` is a warning.
    async fn collect(
        &self,
        index: usize,
        task: &Task,
        collaborator: &mut dyn Collaborator,
        inspector: &dyn ArtifactInspector,
    ) -> Result<Option<String>, ExecutionError> {
        let path = self.artifact_path(index, task);
        collaborator
            .export_artifact(&path)
            .await
            .map_err(|e| ExecutionError::Collaborator(format!("{:#}", e)))?;

        Ok(self.inspect(&path, task, inspector).await)
    }

    async fn inspect(
        &self,
        path: &Path,
        task: &Task,
        inspector: &dyn ArtifactInspector,
    ) -> Option<String> {
        match inspector.contains(path, &self.export_sentinel).await {
            Ok(Some(true)) => {
                debug!(path = %path.display(), "Error list is empty");
                None
            }
            Ok(Some(false)) => Some(format!(
                "Unformed reconciliation statements remain. Error list saved to {}. Status: {}.",
                path.display(),
                task.status
            )),
            Ok(None) => {
                warn!(path = %path.display(), "Expected error list not found");
                None
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to inspect error list");
                None
            }
        }
    }

    /// Close and terminate; both always attempted, failures only logged
    async fn release(&self, collaborator: &mut dyn Collaborator) {
        if let Err(e) = collaborator.close_session().await {
            warn!(error = %e, "Failed to close session");
        }
        if let Err(e) = collaborator.terminate().await {
            warn!(error = %e, "Failed to terminate collaborator");
        }
        debug!("Session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_scope() {
        assert!(ExecutionError::Session("x".into()).is_task_fatal());
        assert!(ExecutionError::Blocked("x".into()).is_task_fatal());
        assert!(ExecutionError::ElementTimeout {
            element: "Save dialog",
            attempts: 3
        }
        .is_task_fatal());
        assert!(!ExecutionError::Category {
            category: "62".into(),
            reason: "x".into()
        }
        .is_task_fatal());
        assert!(!ExecutionError::NoData {
            category: "60".into(),
            status: "не найдены".into()
        }
        .is_task_fatal());
    }

    #[test]
    fn test_outcome_aggregates() {
        let outcome = ExecutionOutcome {
            outcomes: vec![
                TaskOutcome::Completed,
                TaskOutcome::Failed {
                    error: "boom".into(),
                },
                TaskOutcome::Warning {
                    message: "rows".into(),
                },
            ],
        };
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.completed(), 1);
        assert_eq!(outcome.failures(), 1);
        assert_eq!(outcome.warnings(), 1);
        assert!(!outcome.all_completed());
        assert_eq!(outcome.first_problem(), Some("boom"));
    }

    #[test]
    fn test_marker_matching() {
        let markers = vec!["не найдены".to_string(), " ".to_string()];
        assert!(contains_any("Данные НЕ НАЙДЕНЫ", &markers));
        assert!(!contains_any("Report ready", &markers));
        assert_eq!(file_safe("non-EDI"), "non-EDI");
        assert_eq!(file_safe("Не ЭДО"), "Не_ЭДО");
    }
}
