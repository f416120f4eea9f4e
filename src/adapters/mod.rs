//! Interfaces to the external systems the executor drives.
//!
//! - `Collaborator`: the session-oriented system reconciliation statements
//!   are produced in (one active session at a time)
//! - `ArtifactInspector`: looks inside an exported artifact for a sentinel
//!
//! Field and control addresses are opaque logical names; only the
//! collaborator implementation knows what they map to.

pub mod bridge;
pub mod inspector;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::plan::Action;

pub use bridge::BridgeCollaborator;
pub use inspector::TextInspector;

/// Session-oriented external system
#[async_trait]
pub trait Collaborator: Send {
    /// Human-readable collaborator name
    fn name(&self) -> &str;

    /// Launch the system and open an isolated, logged-in session
    async fn start_session(&mut self) -> Result<()>;

    async fn set_field(&mut self, address: &str, value: &str) -> Result<()>;

    async fn set_flag(&mut self, address: &str, on: bool) -> Result<()>;

    async fn press(&mut self, address: &str) -> Result<()>;

    /// Paste a multi-value selection into a list control
    async fn paste_list(&mut self, address: &str, values: &[String]) -> Result<()>;

    /// Current status bar text (empty when there is none)
    async fn status_text(&mut self) -> Result<String>;

    /// Whether the save dialog is on screen and ready for input
    async fn save_dialog_ready(&mut self) -> Result<bool>;

    /// Point the save dialog at `folder` and confirm it
    async fn confirm_save_dialog(&mut self, folder: &Path) -> Result<()>;

    /// Export the current result list to `path`
    async fn export_artifact(&mut self, path: &Path) -> Result<()>;

    /// Close the session window
    async fn close_session(&mut self) -> Result<()>;

    /// Terminate the external process
    async fn terminate(&mut self) -> Result<()>;

    /// Perform one planned interaction
    async fn apply(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::SetField { address, value } => self.set_field(address, value).await,
            Action::SetFlag { address, on } => self.set_flag(address, *on).await,
            Action::Press { address } => self.press(address).await,
            Action::PasteList { address, values } => self.paste_list(address, values).await,
        }
    }
}

/// Reads exported artifacts
#[async_trait]
pub trait ArtifactInspector: Send + Sync {
    /// Whether `needle` occurs anywhere in the artifact.
    ///
    /// `Ok(None)` means the artifact does not exist.
    async fn contains(&self, path: &Path, needle: &str) -> Result<Option<bool>>;
}
