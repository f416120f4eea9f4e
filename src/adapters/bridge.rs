//! Collaborator backed by an external automation helper.
//!
//! Every operation is one invocation of the helper binary:
//!
//! ```text
//! <command> [args...] [--stage <stage>] <op> [op args...]
//! ```
//!
//! Ops: `start`, `set <addr> <value>`, `flag <addr> on|off`, `press <addr>`,
//! `paste <addr>` (values on stdin, one per line), `status`,
//! `dialog-ready`, `dialog-confirm <folder>`, `export <path>`, `close`,
//! `kill`. Credentials travel in the environment, never on the command
//! line. A non-zero exit is an error carrying the helper's stderr.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::BridgeSettings;

use super::Collaborator;

/// Subprocess-driven collaborator
pub struct BridgeCollaborator {
    settings: BridgeSettings,
}

impl BridgeCollaborator {
    pub fn new(settings: BridgeSettings) -> Self {
        Self { settings }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.call_timeout_seconds)
    }

    fn command(&self, op: &str, op_args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.settings.command);
        cmd.args(&self.settings.args);
        if let Some(ref stage) = self.settings.stage {
            cmd.args(["--stage", stage]);
        }
        cmd.arg(op).args(op_args);

        if let Some(ref user) = self.settings.user {
            cmd.env("RECONBOT_BRIDGE_USER", user);
        }
        if let Some(ref password) = self.settings.password {
            cmd.env("RECONBOT_BRIDGE_PASSWORD", password);
        }

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one op and return its stdout
    async fn call(&self, op: &str, op_args: &[&str], input: Option<&str>) -> Result<String> {
        debug!(op, args = ?op_args, "Bridge call");

        let mut child = self
            .command(op, op_args)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to spawn bridge '{}' for '{}'",
                    self.settings.command, op
                )
            })?;

        // Stdin is written inside the limit; a helper may never read it.
        let limit = self.call_timeout();
        let exchange = async {
            if let Some(mut stdin) = child.stdin.take() {
                if let Some(input) = input {
                    stdin
                        .write_all(input.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write bridge stdin for '{}'", op))?;
                }
            }
            let output = child
                .wait_with_output()
                .await
                .with_context(|| format!("Failed to wait for bridge op '{}'", op))?;
            Ok::<_, anyhow::Error>(output)
        };
        let output = timeout(limit, exchange)
            .await
            .with_context(|| format!("Bridge op '{}' timed out after {:?}", op, limit))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Bridge op '{}' failed with exit code {}: {}",
                op,
                exit_code,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Helper answers for yes/no probes
fn parse_flag(stdout: &str) -> bool {
    matches!(
        stdout.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "ready"
    )
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

#[async_trait]
impl Collaborator for BridgeCollaborator {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn start_session(&mut self) -> Result<()> {
        self.call("start", &[], None).await.map(|_| ())
    }

    async fn set_field(&mut self, address: &str, value: &str) -> Result<()> {
        self.call("set", &[address, value], None).await.map(|_| ())
    }

    async fn set_flag(&mut self, address: &str, on: bool) -> Result<()> {
        let state = if on { "on" } else { "off" };
        self.call("flag", &[address, state], None).await.map(|_| ())
    }

    async fn press(&mut self, address: &str) -> Result<()> {
        self.call("press", &[address], None).await.map(|_| ())
    }

    async fn paste_list(&mut self, address: &str, values: &[String]) -> Result<()> {
        let input = values.join("\n");
        self.call("paste", &[address], Some(&input)).await.map(|_| ())
    }

    async fn status_text(&mut self) -> Result<String> {
        self.call("status", &[], None).await
    }

    async fn save_dialog_ready(&mut self) -> Result<bool> {
        self.call("dialog-ready", &[], None).await.map(|out| parse_flag(&out))
    }

    async fn confirm_save_dialog(&mut self, folder: &Path) -> Result<()> {
        let folder = path_arg(folder)?;
        self.call("dialog-confirm", &[folder], None).await.map(|_| ())
    }

    async fn export_artifact(&mut self, path: &Path) -> Result<()> {
        let path = path_arg(path)?;
        self.call("export", &[path], None).await.map(|_| ())
    }

    async fn close_session(&mut self) -> Result<()> {
        self.call("close", &[], None).await.map(|_| ())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.call("kill", &[], None).await.map(|_| ())
    }
}
