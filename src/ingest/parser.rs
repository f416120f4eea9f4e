//! Request parsing and validation.

use serde_json::Value;
use thiserror::Error;

use crate::config::RequestTypeLabels;
use crate::domain::{Request, RequestType};

use super::dates::{parse_date, InvalidDate};
use super::document::{DocumentError, RequestDocument};

/// Key paths in the incoming document. Where two are listed, the first is
/// the current form and the second the older one.
pub mod keys {
    pub const ID: &str = "title";
    pub const ORGANIZATION: &[&str] = &["organiz.title", "orgEmpl.title"];
    pub const BRANCH: &[&str] = &["orgfilial.title", "orgFil.title"];
    pub const TYPE: &[&str] = &["formType.title", "formTypeInt.title"];
    pub const SERVICE: &str = "service.title";
    pub const DOC_NUMBER: &str = "docNumber";
    pub const CONTRACT_REFS: &str = "regNumbDoc";
    pub const INN: &str = "innString";
    pub const KPP: &str = "kppString";
    pub const PERIOD_START: &str = "startPeriod";
    pub const PERIOD_END: &str = "endPeriod";
    pub const STATUS: &str = "status";
    pub const MESSAGE: &str = "message";
}

/// Errors raised while turning a document into a [`Request`]
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid date in '{field}': {source}")]
    InvalidDate {
        field: &'static str,
        #[source]
        source: InvalidDate,
    },

    #[error("Unknown request type: '{0}'")]
    UnknownRequestType(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Converts request documents into validated [`Request`] values
#[derive(Debug, Clone, Default)]
pub struct RequestParser {
    labels: RequestTypeLabels,
}

fn required(value: Option<String>, what: &str) -> Result<String, RequestError> {
    value.ok_or_else(|| RequestError::MalformedRequest(format!("missing {}", what)))
}

fn date_field(
    doc: &RequestDocument,
    field: &'static str,
) -> Result<Option<chrono::NaiveDate>, RequestError> {
    parse_date(doc.get_str(field).as_deref())
        .map_err(|source| RequestError::InvalidDate { field, source })
}

/// Contract references may be one string or an array of strings
fn contract_refs(doc: &RequestDocument) -> Vec<String> {
    match doc.get_value(keys::CONTRACT_REFS) {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Number(n)) => vec![n.to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

impl RequestParser {
    pub fn new(labels: RequestTypeLabels) -> Self {
        Self { labels }
    }

    /// Parse and validate a document.
    ///
    /// Blank `status`/`message` fields on the document are rewritten to
    /// explicit nulls as a side effect (idempotent).
    pub fn parse(&self, doc: &mut RequestDocument) -> Result<Request, RequestError> {
        let status = doc.get_str(keys::STATUS);
        let message = doc.get_str(keys::MESSAGE);
        doc.normalize_empty(keys::STATUS)?;
        doc.normalize_empty(keys::MESSAGE)?;

        let id = required(doc.get_str(keys::ID), "request number (title)")?;

        let label = required(doc.get_first_str(keys::TYPE), "request type (formType.title)")?;
        let request_type = self
            .labels
            .classify(&label)
            .ok_or_else(|| RequestError::UnknownRequestType(label.clone()))?;

        let branch = required(doc.get_first_str(keys::BRANCH), "branch (orgfilial.title)")?;

        let inn = doc.get_str(keys::INN);
        let kpp = doc.get_str(keys::KPP);
        if request_type.is_single_counterparty() {
            required(inn.clone(), "INN (innString)")?;
            required(kpp.clone(), "KPP (kppString)")?;
        }

        let contract_refs = contract_refs(doc);
        if request_type == RequestType::SingleContract && contract_refs.is_empty() {
            return Err(RequestError::MalformedRequest(
                "missing contract references (regNumbDoc)".to_string(),
            ));
        }

        let period_start = date_field(doc, keys::PERIOD_START)?.ok_or_else(|| {
            RequestError::MalformedRequest("missing period start (startPeriod)".to_string())
        })?;
        let period_end = date_field(doc, keys::PERIOD_END)?.ok_or_else(|| {
            RequestError::MalformedRequest("missing period end (endPeriod)".to_string())
        })?;
        if period_start > period_end {
            return Err(RequestError::MalformedRequest(format!(
                "period start {} is after period end {}",
                period_start.format("%d.%m.%Y"),
                period_end.format("%d.%m.%Y")
            )));
        }

        Ok(Request {
            id,
            request_type,
            branch,
            organization: doc.get_first_str(keys::ORGANIZATION),
            service: doc.get_str(keys::SERVICE),
            inn,
            kpp,
            doc_number: doc.get_str(keys::DOC_NUMBER),
            contract_refs,
            period_start,
            period_end,
            status,
            message,
        })
    }
}
