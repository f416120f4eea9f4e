//! Command-line interface for reconbot.
//!
//! Provides commands for processing the inbox, resolving a single request
//! without touching the external system, replaying a document journal and
//! showing the resolved configuration.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fs2::FileExt;
use tracing::info;

use crate::adapters::{BridgeCollaborator, TextInspector};
use crate::config::{load_config, ResolvedConfig};
use crate::core::{Journal, Orchestrator};
use crate::domain::TaskState;

/// reconbot - reconciliation-act request robot
#[derive(Parser, Debug)]
#[command(name = "reconbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .reconbot/config.yaml in cwd or a parent)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every pending document in the input folder
    Run,

    /// Parse and resolve one request without executing it
    Resolve {
        /// Request document (JSON)
        #[arg(short, long)]
        document: PathBuf,

        /// Registry export (CSV); defaults to the configured one
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },

    /// Show the journal summary of a processed document
    Status {
        /// Document folder (or the journal file itself)
        path: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;

        match self.command {
            Commands::Run => run(&config).await,
            Commands::Resolve { document, registry } => {
                resolve(&config, &document, registry.as_deref()).await
            }
            Commands::Status { path } => show_status(&path).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Process the inbox while holding the single-instance lock
async fn run(config: &ResolvedConfig) -> Result<()> {
    std::fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create home: {}", config.home.display()))?;
    config.folders.ensure()?;

    let lock_path = config.lock_path();
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
    lock.try_lock_exclusive().with_context(|| {
        format!(
            "Another reconbot process holds {}; only one session may run per machine",
            lock_path.display()
        )
    })?;

    let orchestrator = Orchestrator::new(config)?;
    let mut collaborator = BridgeCollaborator::new(config.bridge.clone());
    let inspector = TextInspector::new();

    let summary = orchestrator.run(&mut collaborator, &inspector).await?;
    info!(
        documents = summary.documents,
        ok = summary.ok,
        failed = summary.failed,
        "Run finished"
    );

    lock.unlock()
        .with_context(|| format!("Failed to release lock: {}", lock_path.display()))?;
    Ok(())
}

/// Print resolved tasks as JSON
async fn resolve(config: &ResolvedConfig, document: &Path, registry: Option<&Path>) -> Result<()> {
    let orchestrator = Orchestrator::new(config)?;
    let (request, tasks) = orchestrator.resolve_document(document, registry).await?;

    eprintln!("{}", request.summary());
    println!(
        "{}",
        serde_json::to_string_pretty(&tasks).context("Failed to serialize tasks")?
    );
    eprintln!("\n[{} tasks resolved]", tasks.len());

    Ok(())
}

/// Replay a document journal
async fn show_status(path: &Path) -> Result<()> {
    let journal = if path.is_dir() {
        Journal::in_dir(path)
    } else {
        Journal::for_document(path)
    };

    let Some(run) = journal.summary().await? else {
        println!("No journal found at {}", journal.path().display());
        return Ok(());
    };

    println!("Journal: {}", journal.path().display());
    println!("Run ID: {}", run.id);
    println!("State: {:?}", run.state);
    println!("Started: {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed: {}", completed);
    }
    println!("Tasks resolved: {}", run.tasks_resolved);
    println!(
        "Tasks: {} completed, {} with warnings, {} failed",
        run.count(TaskState::Completed),
        run.count(TaskState::Warning),
        run.count(TaskState::Failed)
    );
    if !run.task_states.is_empty() {
        println!("\nTask states:");
        for (index, state) in &run.task_states {
            println!("  {}: {:?}", index + 1, state);
        }
    }

    Ok(())
}

fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("reconbot configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Registry: {}", cfg.registry_path.display());
    println!("  Input:    {}", cfg.folders.input.display());
    println!("  Error:    {}", cfg.folders.error.display());
    println!("  Output:   {}", cfg.folders.output.display());
    println!("  Logs:     {}", cfg.folders.logs.display());
    println!("  Temp:     {}", cfg.folders.temp.display());
    println!("  Lock:     {}", cfg.lock_path().display());
    println!();
    println!("Branch codes:");
    if cfg.branch_codes.is_empty() {
        println!("  (none configured)");
    } else {
        for (name, code) in cfg.branch_codes.iter() {
            println!("  {}: {}", name, code);
        }
    }
    println!();
    println!("Registry:");
    println!("  Statuses:         {}", cfg.registry.statuses.join(", "));
    println!("  Required columns: {}", cfg.registry.required_columns);
    println!();
    println!("Bridge:");
    println!("  Command:      {} {}", cfg.bridge.command, cfg.bridge.args.join(" "));
    println!(
        "  Stage:        {}",
        cfg.bridge.stage.as_deref().unwrap_or("(default)")
    );
    println!("  Call timeout: {}s", cfg.bridge.call_timeout_seconds);
    println!(
        "  User:         {}",
        cfg.bridge.user.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Password:     {}",
        if cfg.bridge.password.is_some() { "(set)" } else { "(not set)" }
    );
    println!(
        "  Save dialog:  {} attempts x {}s",
        cfg.bridge.save_dialog.max_attempts, cfg.bridge.save_dialog.attempt_timeout_seconds
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_command() {
        let cli = Cli::try_parse_from([
            "reconbot",
            "resolve",
            "--document",
            "SD1+.txt",
            "--registry",
            "registry.csv",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve { document, registry } => {
                assert_eq!(document, PathBuf::from("SD1+.txt"));
                assert_eq!(registry, Some(PathBuf::from("registry.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["reconbot", "run", "--config", "/etc/reconbot.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Run));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/reconbot.yaml")));
    }

    #[tokio::test]
    async fn test_status_without_journal() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(show_status(temp.path()).await.is_ok());
    }
}
