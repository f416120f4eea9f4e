//! Inbox of pending request documents.
//!
//! Pending documents are `SD*.txt` files with a `+` in the name, dropped
//! into the input folder by the upstream service desk export. Each one is
//! moved into its own subfolder before processing so its journal and any
//! side files live next to it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use glob::Pattern;
use tokio::fs;
use tracing::{error, info};

/// File-name pattern of pending documents
pub const DOCUMENT_PATTERN: &str = "SD*.txt";

/// Pending-document folder
#[derive(Debug, Clone)]
pub struct Inbox {
    input_dir: PathBuf,
    pattern: Pattern,
}

impl Inbox {
    pub fn new(input_dir: PathBuf) -> Result<Self> {
        let pattern = Pattern::new(DOCUMENT_PATTERN).context("Invalid document pattern")?;
        Ok(Self { input_dir, pattern })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Whether a bare file name looks like a pending document
    pub fn is_pending(&self, file_name: &str) -> bool {
        self.pattern.matches(file_name) && file_name.contains('+')
    }

    /// List pending documents directly inside the input folder, sorted by name
    pub async fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.input_dir).await.with_context(|| {
            format!("Failed to read input folder: {}", self.input_dir.display())
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.is_pending(name) {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Move a document into `<input>/<stem>/<file>`.
    ///
    /// On a name clash a timestamp suffix is added. A failed move is logged
    /// and the original path is returned so processing can still go ahead.
    pub async fn claim(&self, file: &Path) -> PathBuf {
        match Self::move_to_own_folder(file).await {
            Ok(dest) => {
                info!(file = %file.display(), dest = %dest.display(), "Document claimed");
                dest
            }
            Err(e) => {
                error!(file = %file.display(), error = %e, "Failed to move document into its own folder");
                file.to_path_buf()
            }
        }
    }

    async fn move_to_own_folder(file: &Path) -> Result<PathBuf> {
        let parent = file.parent().context("Document has no parent folder")?;
        let file_name = file.file_name().context("Document has no file name")?;
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Document name is not valid UTF-8")?;

        let target_dir = parent.join(stem);
        fs::create_dir_all(&target_dir)
            .await
            .with_context(|| format!("Failed to create {}", target_dir.display()))?;

        let mut dest = target_dir.join(file_name);
        if dest.exists() {
            let stamp = Local::now().format("%Y%m%d_%H%M%S");
            let ext = file
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{}", e))
                .unwrap_or_default();
            dest = target_dir.join(format!("{}_{}{}", stem, stamp, ext));
        }

        fs::rename(file, &dest)
            .await
            .with_context(|| format!("Failed to move {}", file.display()))?;
        Ok(dest)
    }
}
