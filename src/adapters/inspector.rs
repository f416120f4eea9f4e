//! Text artifact inspection.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::ArtifactInspector;

/// Scans an exported tabular text file for a sentinel phrase.
///
/// Exports may arrive in a legacy code page, so the bytes are decoded
/// lossily; matching ignores case.
#[derive(Debug, Clone, Default)]
pub struct TextInspector;

impl TextInspector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArtifactInspector for TextInspector {
    async fn contains(&self, path: &Path, needle: &str) -> Result<Option<bool>> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }

        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes).to_lowercase();

        Ok(Some(text.contains(&needle.to_lowercase())))
    }
}
