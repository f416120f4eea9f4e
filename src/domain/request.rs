//! Validated request snapshot.
//!
//! A `Request` is built once by the parser from an incoming document and is
//! never re-parsed. Only the status/message pair on the *document* changes
//! after that; the request value itself is immutable.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Resolution policy selected by the request's form type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// One counterparty, every contract it has
    SingleCounterparty,

    /// One counterparty, restricted to the listed contracts
    SingleContract,

    /// Every counterparty of a branch, grouped by signatory and status
    FullInventory,
}

impl RequestType {
    /// Stable machine name (used in logs and journal summaries)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleCounterparty => "single_counterparty",
            Self::SingleContract => "single_contract",
            Self::FullInventory => "full_inventory",
        }
    }

    /// Whether the policy targets exactly one counterparty (needs INN/KPP)
    pub fn is_single_counterparty(&self) -> bool {
        matches!(self, Self::SingleCounterparty | Self::SingleContract)
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status written back onto a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "OK")]
    Ok,

    #[serde(rename = "error")]
    Error,
}

impl ReportStatus {
    /// Literal value stored in the document's `status` field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable snapshot of one incoming document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Document number (`title`)
    pub id: String,

    /// Resolution policy
    pub request_type: RequestType,

    /// Human-readable branch name, matched against the registry
    pub branch: String,

    /// Requesting organization (informational)
    pub organization: Option<String>,

    /// Requested service (informational)
    pub service: Option<String>,

    /// Counterparty INN (single-counterparty policies only)
    pub inn: Option<String>,

    /// Counterparty KPP (single-counterparty policies only)
    pub kpp: Option<String>,

    /// Paper contract number (informational)
    pub doc_number: Option<String>,

    /// Raw contract references, tokenized by the resolver
    pub contract_refs: Vec<String>,

    /// First day of the reconciliation period
    pub period_start: NaiveDate,

    /// Last day of the reconciliation period
    pub period_end: NaiveDate,

    /// Status found on the document at parse time
    pub status: Option<String>,

    /// Message found on the document at parse time
    pub message: Option<String>,
}

impl Request {
    /// Multi-line summary block written to the log after parsing
    pub fn summary(&self) -> String {
        let fmt_opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        format!(
            "request {id}\n  type: {ty}\n  service: {svc}\n  organization: {org}\n  branch: {branch}\n  INN: {inn}\n  KPP: {kpp}\n  contracts: {contracts}\n  period: {start} .. {end}",
            id = self.id,
            ty = self.request_type,
            svc = fmt_opt(&self.service),
            org = fmt_opt(&self.organization),
            branch = self.branch,
            inn = fmt_opt(&self.inn),
            kpp = fmt_opt(&self.kpp),
            contracts = if self.contract_refs.is_empty() {
                "-".to_string()
            } else {
                self.contract_refs.join(", ")
            },
            start = self.period_start.format("%d.%m.%Y"),
            end = self.period_end.format("%d.%m.%Y"),
        )
    }
}
