//! Executor Integration Tests
//!
//! Drives the task executor against a scripted in-memory collaborator and
//! checks session lifecycle, failure isolation and error-list inspection.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reconbot::adapters::{Collaborator, TextInspector};
use reconbot::config::{BridgeSettings, RequestFolders};
use reconbot::core::plan::address;
use reconbot::core::{ExecutionObserver, NoopObserver, TaskExecutor, TaskOutcome};
use reconbot::domain::{RequestType, Task};
use tempfile::TempDir;

const SENTINEL: &str = "Список не содержит данных";

/// What the fake should do, by 1-based session number
#[derive(Default)]
struct Script {
    fail_start: Vec<usize>,
    fail_header: Vec<usize>,
    fail_export: Vec<usize>,
    fail_close: Vec<usize>,
    /// Status texts handed out in order; empty once drained
    statuses: VecDeque<String>,
    dialog_never_ready: bool,
    /// Written to the export path; `None` leaves no file behind
    artifact: Option<String>,
}

#[derive(Default)]
struct FakeCollaborator {
    script: Script,
    starts: usize,
    closes: usize,
    terminates: usize,
    dialog_confirms: usize,
    backs: usize,
    fields: Vec<(String, String)>,
    exports: Vec<PathBuf>,
}

impl FakeCollaborator {
    fn new(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    fn session(&self) -> usize {
        self.starts
    }
}

#[async_trait]
impl Collaborator for FakeCollaborator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn start_session(&mut self) -> Result<()> {
        self.starts += 1;
        if self.script.fail_start.contains(&self.session()) {
            bail!("logon failed");
        }
        Ok(())
    }

    async fn set_field(&mut self, address: &str, value: &str) -> Result<()> {
        if address == address::COMPANY_CODE && self.script.fail_header.contains(&self.session()) {
            bail!("field {} not found", address);
        }
        self.fields.push((address.to_string(), value.to_string()));
        Ok(())
    }

    async fn set_flag(&mut self, _address: &str, _on: bool) -> Result<()> {
        Ok(())
    }

    async fn press(&mut self, address: &str) -> Result<()> {
        if address == address::NAVIGATION_BACK {
            self.backs += 1;
        }
        Ok(())
    }

    async fn paste_list(&mut self, _address: &str, _values: &[String]) -> Result<()> {
        Ok(())
    }

    async fn status_text(&mut self) -> Result<String> {
        Ok(self.script.statuses.pop_front().unwrap_or_default())
    }

    async fn save_dialog_ready(&mut self) -> Result<bool> {
        Ok(!self.script.dialog_never_ready)
    }

    async fn confirm_save_dialog(&mut self, _folder: &Path) -> Result<()> {
        self.dialog_confirms += 1;
        Ok(())
    }

    async fn export_artifact(&mut self, path: &Path) -> Result<()> {
        if self.script.fail_export.contains(&self.session()) {
            bail!("export button disabled");
        }
        self.exports.push(path.to_path_buf());
        if let Some(ref content) = self.script.artifact {
            tokio::fs::write(path, content).await?;
        }
        Ok(())
    }

    async fn close_session(&mut self) -> Result<()> {
        self.closes += 1;
        if self.script.fail_close.contains(&self.session()) {
            bail!("window already gone");
        }
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminates += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl ExecutionObserver for RecordingObserver {
    async fn task_started(&self, index: usize, _task: &Task) {
        self.events.lock().unwrap().push(format!("start {}", index));
    }

    async fn task_finished(
        &self,
        index: usize,
        _task: &Task,
        outcome: &TaskOutcome,
        _duration_ms: u64,
    ) {
        let kind = match outcome {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Warning { .. } => "warning",
            TaskOutcome::Failed { .. } => "failed",
        };
        self.events.lock().unwrap().push(format!("finish {} {}", index, kind));
    }
}

fn task(kind: RequestType, branch_code: &str) -> Task {
    Task {
        kind,
        branch_code: branch_code.to_string(),
        inn: None,
        kpp: None,
        contract_numbers: Vec::new(),
        counterparty_ids: vec!["C1".to_string(), "C2".to_string()],
        signatory_ids: vec!["P1".to_string()],
        status: "EDI".to_string(),
        period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        period_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        cross_branch: false,
    }
}

fn executor(temp: &TempDir) -> TaskExecutor {
    let folders = RequestFolders::under(temp.path());
    folders.ensure().unwrap();
    TaskExecutor::new(&BridgeSettings::default(), &folders)
}

fn clean_artifact() -> Option<String> {
    Some(format!("Protocol\n{}\n", SENTINEL))
}

#[tokio::test]
async fn test_release_runs_once_per_task_whatever_fails() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks: Vec<Task> = (1..=4)
        .map(|i| task(RequestType::SingleCounterparty, &format!("{}000", i)))
        .collect();

    // Session 1 fails at acquire, 2 in the header, 3 at collect
    let mut collaborator = FakeCollaborator::new(Script {
        fail_start: vec![1],
        fail_header: vec![2],
        fail_export: vec![3],
        artifact: clean_artifact(),
        ..Script::default()
    });

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    assert_eq!(collaborator.starts, 4);
    assert_eq!(collaborator.closes, collaborator.starts);
    assert_eq!(collaborator.terminates, collaborator.starts);

    assert_eq!(outcome.total(), 4);
    assert!(matches!(outcome.outcomes[0], TaskOutcome::Failed { ref error } if error.contains("logon failed")));
    assert!(matches!(outcome.outcomes[1], TaskOutcome::Failed { ref error } if error.contains("not found")));
    assert!(matches!(outcome.outcomes[2], TaskOutcome::Failed { ref error } if error.contains("export")));
    assert_eq!(outcome.outcomes[3], TaskOutcome::Completed);
}

#[tokio::test]
async fn test_release_failure_does_not_stop_terminate() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![
        task(RequestType::SingleCounterparty, "1000"),
        task(RequestType::SingleCounterparty, "2000"),
    ];

    let mut collaborator = FakeCollaborator::new(Script {
        fail_close: vec![1],
        artifact: clean_artifact(),
        ..Script::default()
    });

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    assert_eq!(collaborator.terminates, 2);
    assert!(outcome.all_completed());
}

#[tokio::test]
async fn test_blocked_session_skips_task() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let blocked = BridgeSettings::default().blocking_markers[0].clone();
    let tasks = vec![
        task(RequestType::SingleCounterparty, "1000"),
        task(RequestType::SingleCounterparty, "2000"),
    ];

    let mut collaborator = FakeCollaborator::new(Script {
        statuses: VecDeque::from([blocked]),
        artifact: clean_artifact(),
        ..Script::default()
    });

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    assert!(matches!(outcome.outcomes[0], TaskOutcome::Failed { ref error } if error.contains("blocked")));
    assert_eq!(outcome.outcomes[1], TaskOutcome::Completed);
    // Only the second task got as far as the header
    let company_codes: Vec<_> = collaborator
        .fields
        .iter()
        .filter(|(a, _)| a == address::COMPANY_CODE)
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(company_codes, vec!["2000"]);
    assert_eq!(collaborator.closes, 2);
}

#[tokio::test]
async fn test_category_failure_is_isolated() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![task(RequestType::FullInventory, "1000")];

    // Acquire, then categories 60 / 62 / 76; 60 comes back empty
    let mut collaborator = FakeCollaborator::new(Script {
        statuses: VecDeque::from([
            String::new(),
            "Данные не найдены".to_string(),
            String::new(),
            String::new(),
        ]),
        artifact: clean_artifact(),
        ..Script::default()
    });

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    assert_eq!(outcome.outcomes, vec![TaskOutcome::Completed]);
    assert_eq!(collaborator.dialog_confirms, 2);
    assert_eq!(collaborator.backs, 3);
    assert_eq!(collaborator.exports.len(), 1);
}

#[tokio::test]
async fn test_error_list_with_rows_is_a_warning() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![task(RequestType::SingleCounterparty, "1000")];

    let mut collaborator = FakeCollaborator::new(Script {
        artifact: Some("Counterparty\tError\nC1\tno signatory\n".to_string()),
        ..Script::default()
    });

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    let expected_path = executor.artifact_path(0, &tasks[0]);
    assert_eq!(collaborator.exports, vec![expected_path.clone()]);
    match &outcome.outcomes[0] {
        TaskOutcome::Warning { message } => {
            assert!(message.contains(&expected_path.display().to_string()));
            assert!(message.contains("EDI"));
        }
        other => panic!("expected warning, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_error_list_keeps_task_completed() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![task(RequestType::SingleContract, "1000")];

    let mut collaborator = FakeCollaborator::new(Script::default());

    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    assert_eq!(outcome.outcomes, vec![TaskOutcome::Completed]);
}

#[tokio::test(start_paused = true)]
async fn test_save_dialog_exhaustion_fails_the_task() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![
        task(RequestType::SingleCounterparty, "1000"),
        task(RequestType::SingleCounterparty, "2000"),
    ];

    let mut collaborator = FakeCollaborator::new(Script {
        dialog_never_ready: true,
        ..Script::default()
    });

    let started = tokio::time::Instant::now();
    let outcome = executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &NoopObserver)
        .await;

    let policy = BridgeSettings::default().save_dialog;
    assert!(started.elapsed() >= policy.total_budget() * 2);

    for result in &outcome.outcomes {
        match result {
            TaskOutcome::Failed { error } => {
                assert!(error.contains("Save dialog did not appear after 3 attempts"))
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
    assert_eq!(collaborator.dialog_confirms, 0);
    assert!(collaborator.exports.is_empty());
    assert_eq!(collaborator.closes, 2);
    assert_eq!(collaborator.terminates, 2);
}

#[tokio::test]
async fn test_observer_sees_every_task_in_order() {
    let temp = TempDir::new().unwrap();
    let executor = executor(&temp);
    let tasks = vec![
        task(RequestType::SingleCounterparty, "1000"),
        task(RequestType::SingleCounterparty, "2000"),
    ];

    let mut collaborator = FakeCollaborator::new(Script {
        fail_start: vec![2],
        artifact: clean_artifact(),
        ..Script::default()
    });
    let observer = RecordingObserver::default();

    executor
        .run(&tasks, &mut collaborator, &TextInspector::new(), &observer)
        .await;

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec!["start 0", "finish 0 completed", "start 1", "finish 1 failed"]
    );
}
