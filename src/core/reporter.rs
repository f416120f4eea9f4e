//! Terminal status write-back.

use tracing::{error, info};

use crate::domain::ReportStatus;
use crate::ingest::parser::keys;
use crate::ingest::{DocumentError, RequestDocument};

async fn write(
    doc: &mut RequestDocument,
    status: ReportStatus,
    message: &str,
) -> Result<(), DocumentError> {
    doc.set_str(keys::STATUS, status.as_str())?;
    doc.set_str(keys::MESSAGE, message)?;
    doc.save().await
}

/// Writes `status`/`message` onto a document and persists it.
///
/// Best effort: a failed write is logged and reported as `false`, never
/// raised.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReporter;

impl StatusReporter {
    pub fn new() -> Self {
        Self
    }

    pub async fn report(
        &self,
        doc: &mut RequestDocument,
        status: ReportStatus,
        message: &str,
    ) -> bool {
        match write(doc, status, message).await {
            Ok(()) => {
                info!(status = %status, message, "Status written");
                true
            }
            Err(e) => {
                let path = doc
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                error!(status = %status, path = %path, error = %e, "Failed to persist status");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_report_overwrites_and_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("SD1+.txt");
        tokio::fs::write(&path, r#"{"title": "SD1", "status": null}"#)
            .await
            .unwrap();

        let mut doc = RequestDocument::open(&path).await.unwrap();
        let reporter = StatusReporter::new();
        assert!(reporter.report(&mut doc, ReportStatus::Ok, "first").await);
        assert!(reporter.report(&mut doc, ReportStatus::Error, "second").await);

        let reloaded = RequestDocument::open(&path).await.unwrap();
        assert_eq!(reloaded.get_str("status").as_deref(), Some("error"));
        assert_eq!(reloaded.get_str("message").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        // No backing file
        let mut doc = RequestDocument::from_value(json!({ "title": "SD2" })).unwrap();
        let written = StatusReporter::new()
            .report(&mut doc, ReportStatus::Error, "boom")
            .await;

        assert!(!written);
        assert_eq!(doc.get_str("status").as_deref(), Some("error"));
    }
}
