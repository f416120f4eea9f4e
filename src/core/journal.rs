//! Per-document processing journal.
//!
//! Events are stored as newline-delimited JSON (JSONL) next to the claimed
//! document, so the history of a request travels with it. Writes are best
//! effort: a journal that cannot be written never stops processing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::domain::{DocumentRun, Event};

/// Journal file name inside a document folder
pub const JOURNAL_FILE: &str = "journal.jsonl";

/// Append-only JSONL journal
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Journal living next to `document`
    pub fn for_document(document: &Path) -> Self {
        let dir = document.parent().unwrap_or(Path::new("."));
        Self::in_dir(dir)
    }

    /// Journal inside a document folder
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event, logging (not raising) any failure
    pub async fn record(&self, event: Event) {
        if let Err(e) = self.append(&event).await {
            warn!(path = %self.path.display(), error = %e, "Failed to write journal event");
        }
    }

    /// Append an event to the log
    pub async fn append(&self, event: &Event) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event")?;

        Ok(())
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse journal line: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Latest run reconstructed from the journal
    pub async fn summary(&self) -> Result<Option<DocumentRun>> {
        let events = self.replay().await?;
        Ok(DocumentRun::from_events(&events))
    }
}
