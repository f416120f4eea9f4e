//! Resolved units of work.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::request::RequestType;

/// One unit of work submitted to the external system.
///
/// Only the resolver builds tasks, and it never builds one with an empty
/// counterparty or signatory list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Policy that produced this task (drives the interaction plan)
    pub kind: RequestType,

    /// External branch code resolved from the branch name
    pub branch_code: String,

    /// Counterparty INN (`None` for inventory tasks)
    pub inn: Option<String>,

    /// Counterparty KPP (`None` for inventory tasks)
    pub kpp: Option<String>,

    /// Contract numbers (empty unless single-contract)
    pub contract_numbers: Vec<String>,

    /// External counterparty identifiers, never empty
    pub counterparty_ids: Vec<String>,

    /// Signatory personnel numbers, never empty
    pub signatory_ids: Vec<String>,

    /// Registry status shared by the task's counterparties
    pub status: String,

    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    /// Reserved; always false
    pub cross_branch: bool,
}

impl Task {
    /// Head signatory (first id)
    pub fn primary_signatory(&self) -> &str {
        self.signatory_ids.first().map(String::as_str).unwrap_or("")
    }

    /// Accountant signatory: second id, or the first when only one exists
    pub fn secondary_signatory(&self) -> &str {
        self.signatory_ids
            .get(1)
            .map(String::as_str)
            .unwrap_or_else(|| self.primary_signatory())
    }

    /// One-line description for logs
    pub fn describe(&self) -> String {
        format!(
            "branch={} INN={} KPP={} contracts=[{}] counterparties=[{}] signatories=[{}] status={} period={}..{}",
            self.branch_code,
            self.inn.as_deref().unwrap_or("null"),
            self.kpp.as_deref().unwrap_or("null"),
            self.contract_numbers.join(", "),
            self.counterparty_ids.join(", "),
            self.signatory_ids.join(", "),
            self.status,
            self.period_start.format("%d.%m.%Y"),
            self.period_end.format("%d.%m.%Y"),
        )
    }
}
