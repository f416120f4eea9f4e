//! JSON request documents with dotted key-path access.
//!
//! Incoming documents come from two generations of the upstream form, so the
//! same datum may live under different paths (`organiz.title` vs
//! `orgEmpl.title`). Readers try each path in turn; writers create missing
//! intermediate objects.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;

/// Errors that can occur reading or writing a document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document root must be a JSON object")]
    NotAnObject,

    #[error("Invalid key path: '{0}'")]
    InvalidPath(String),

    #[error("Document has no backing file")]
    NoPath,
}

/// A request document held in memory
#[derive(Debug, Clone)]
pub struct RequestDocument {
    path: Option<PathBuf>,
    root: Value,
}

/// Split a key path; `:` is accepted as a separator alias
fn segments(key: &str) -> Vec<String> {
    key.replace(':', ".")
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl RequestDocument {
    /// Load a document from disk
    pub async fn open(path: &Path) -> Result<Self, DocumentError> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut doc = Self::parse(&content)?;
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    /// Parse a document held in memory (no backing file)
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        // Tolerate a UTF-8 BOM from Windows tooling
        let content = content.trim_start_matches('\u{feff}');
        let root: Value = serde_json::from_str(content)?;
        if !root.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        Ok(Self { path: None, root })
    }

    /// Wrap an existing JSON value
    pub fn from_value(root: Value) -> Result<Self, DocumentError> {
        if !root.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        Ok(Self { path: None, root })
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw value at a key path
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in segments(key) {
            current = match current {
                Value::Object(map) => map.get(&segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Scalar at a key path as text; null and blank strings count as absent
    pub fn get_str(&self, key: &str) -> Option<String> {
        let text = match self.get_value(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// First present value among alternate key paths
    pub fn get_first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get_str(k))
    }

    /// Set a value, creating intermediate objects as needed
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), DocumentError> {
        let parts = segments(key);
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| DocumentError::InvalidPath(key.to_string()))?;

        let mut current = &mut self.root;
        for part in parents {
            let map = current.as_object_mut().ok_or(DocumentError::NotAnObject)?;
            let entry = map
                .entry(part.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = entry;
        }

        let map = current.as_object_mut().ok_or(DocumentError::NotAnObject)?;
        map.insert(last.clone(), value);
        Ok(())
    }

    /// Set a string value
    pub fn set_str(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        self.set(key, Value::String(value.to_string()))
    }

    /// Replace an empty-string (or missing) field with an explicit null.
    /// Returns whether the document changed.
    pub fn normalize_empty(&mut self, key: &str) -> Result<bool, DocumentError> {
        let is_blank = match self.get_value(key) {
            None => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if !is_blank {
            return Ok(false);
        }
        self.set(key, Value::Null)?;
        Ok(true)
    }

    /// Write back to the backing file
    pub async fn save(&self) -> Result<(), DocumentError> {
        let path = self.path.as_deref().ok_or(DocumentError::NoPath)?;
        self.save_to(path).await
    }

    /// Write to an explicit path
    pub async fn save_to(&self, path: &Path) -> Result<(), DocumentError> {
        let content = serde_json::to_string_pretty(&self.root)?;
        fs::write(path, content)
            .await
            .map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> RequestDocument {
        RequestDocument::from_value(json!({
            "title": "SD-1",
            "orgEmpl": { "title": "ACME" },
            "innString": 7701234567u64,
            "status": "",
            "items": [{ "name": "first" }]
        }))
        .unwrap()
    }

    #[test]
    fn test_get_with_fallback_paths() {
        let doc = doc();
        assert_eq!(
            doc.get_first_str(&["organiz.title", "orgEmpl.title"]),
            Some("ACME".to_string())
        );
        assert_eq!(doc.get_str("orgEmpl:title"), Some("ACME".to_string()));
        assert_eq!(doc.get_str("innString"), Some("7701234567".to_string()));
        assert_eq!(doc.get_str("items.0.name"), Some("first".to_string()));
        assert_eq!(doc.get_str("status"), None);
        assert_eq!(doc.get_str("missing.path"), None);
    }

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut doc = doc();
        doc.set_str("result.details.code", "42").unwrap();
        assert_eq!(doc.get_str("result.details.code"), Some("42".to_string()));

        // A scalar in the way is replaced by an object
        doc.set_str("title.sub", "x").unwrap();
        assert_eq!(doc.get_str("title.sub"), Some("x".to_string()));
    }

    #[test]
    fn test_normalize_empty_is_idempotent() {
        let mut doc = doc();
        assert!(doc.normalize_empty("status").unwrap());
        assert_eq!(doc.get_value("status"), Some(&Value::Null));
        assert!(!doc.normalize_empty("status").unwrap());

        assert!(doc.normalize_empty("message").unwrap());
        assert_eq!(doc.get_value("message"), Some(&Value::Null));

        assert!(!doc.normalize_empty("title").unwrap());
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(
            RequestDocument::parse("[1, 2]"),
            Err(DocumentError::NotAnObject)
        ));
        assert!(RequestDocument::parse("\u{feff}{\"a\": 1}").is_ok());
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("SD1+.txt");
        tokio::fs::write(&path, r#"{"title": "SD1"}"#).await.unwrap();

        let mut doc = RequestDocument::open(&path).await.unwrap();
        doc.set_str("status", "OK").unwrap();
        doc.save().await.unwrap();

        let reloaded = RequestDocument::open(&path).await.unwrap();
        assert_eq!(reloaded.get_str("status"), Some("OK".to_string()));
    }
}
