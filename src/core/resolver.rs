//! Request → task resolution against the registry.
//!
//! Three policies, one per [`RequestType`]:
//!
//! - single counterparty: exactly one registry row for (branch, INN, KPP)
//!   becomes exactly one task covering all contracts
//! - single contract: same match, plus the tokenized contract numbers
//! - full inventory: every (signatory, status) pair of the branch with at
//!   least one counterparty becomes a task; pairs with none are skipped

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{BranchCodes, DelimiterSets, RegistrySettings};
use crate::domain::{Request, RequestType, Task};
use crate::registry::{dedup_ci, split_dedup, Column, RegistryRow, RegistryTable, RowFilter};

/// Reasons a request cannot be turned into tasks
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No registry row for branch '{branch}', INN {inn}, KPP {kpp}")]
    NoMatch {
        branch: String,
        inn: String,
        kpp: String,
    },

    #[error(
        "Ambiguous match: {} registry rows for branch '{branch}', INN {inn}, KPP {kpp}: {}",
        .candidates.len(),
        .candidates.join("; ")
    )]
    AmbiguousMatch {
        branch: String,
        inn: String,
        kpp: String,
        candidates: Vec<String>,
    },

    #[error("Branch '{0}' has no branch code")]
    UnmappedBranch(String),

    #[error("No signatory personnel number for counterparty '{0}'")]
    EmptySignatory(String),

    #[error("No contract numbers supplied")]
    NoContractNumbers,

    #[error("Request is missing {0}")]
    MissingField(&'static str),
}

/// Applies the resolution policy selected by a request's type
#[derive(Debug, Clone)]
pub struct TaskResolver {
    branch_codes: BranchCodes,
    delimiters: DelimiterSets,
    registry: RegistrySettings,
}

impl TaskResolver {
    pub fn new(
        branch_codes: BranchCodes,
        delimiters: DelimiterSets,
        registry: RegistrySettings,
    ) -> Self {
        Self {
            branch_codes,
            delimiters,
            registry,
        }
    }

    /// Derive the tasks for a request.
    ///
    /// An empty result is only possible for full inventory requests.
    #[instrument(skip_all, fields(request = %request.id, kind = %request.request_type))]
    pub fn resolve(
        &self,
        request: &Request,
        table: &RegistryTable,
    ) -> Result<Vec<Task>, ResolveError> {
        let tasks = match request.request_type {
            RequestType::SingleCounterparty => {
                vec![self.single_counterparty(request, table, Vec::new())?]
            }
            RequestType::SingleContract => {
                let contracts = self.contract_numbers(request)?;
                vec![self.single_counterparty(request, table, contracts)?]
            }
            RequestType::FullInventory => self.full_inventory(request, table)?,
        };

        info!(tasks = tasks.len(), "Request resolved");
        Ok(tasks)
    }

    fn branch_code(&self, branch: &str) -> Result<String, ResolveError> {
        self.branch_codes
            .lookup(branch)
            .map(str::to_string)
            .ok_or_else(|| ResolveError::UnmappedBranch(branch.to_string()))
    }

    fn signatories(&self, raw: &str) -> Vec<String> {
        split_dedup(raw, &self.delimiters.signatory)
    }

    fn contract_numbers(&self, request: &Request) -> Result<Vec<String>, ResolveError> {
        let numbers = dedup_ci(
            request
                .contract_refs
                .iter()
                .flat_map(|r| split_dedup(r, &self.delimiters.contract)),
        );
        if numbers.is_empty() {
            return Err(ResolveError::NoContractNumbers);
        }
        Ok(numbers)
    }

    /// The one row for (branch, INN, KPP); no deduplication of identical rows
    fn unique_row<'t>(
        &self,
        request: &Request,
        table: &'t RegistryTable,
    ) -> Result<&'t RegistryRow, ResolveError> {
        let inn = request.inn.as_deref().ok_or(ResolveError::MissingField("INN"))?;
        let kpp = request.kpp.as_deref().ok_or(ResolveError::MissingField("KPP"))?;

        let filter = RowFilter::new()
            .eq(Column::Branch, &request.branch)
            .eq(Column::Inn, inn)
            .eq(Column::Kpp, kpp);
        let rows = table.filter(&filter);

        match rows.as_slice() {
            [] => Err(ResolveError::NoMatch {
                branch: request.branch.clone(),
                inn: inn.to_string(),
                kpp: kpp.to_string(),
            }),
            [row] => Ok(row),
            _ => Err(ResolveError::AmbiguousMatch {
                branch: request.branch.clone(),
                inn: inn.to_string(),
                kpp: kpp.to_string(),
                candidates: rows.iter().map(|r| r.to_string()).collect(),
            }),
        }
    }

    fn single_counterparty(
        &self,
        request: &Request,
        table: &RegistryTable,
        contract_numbers: Vec<String>,
    ) -> Result<Task, ResolveError> {
        let row = self.unique_row(request, table)?;
        debug!(row = %row, "Matched registry row");

        let branch_code = self.branch_code(&request.branch)?;

        let signatory_ids = self.signatories(&row.personnel_number);
        if signatory_ids.is_empty() {
            return Err(ResolveError::EmptySignatory(row.company_id.clone()));
        }

        Ok(Task {
            kind: request.request_type,
            branch_code,
            inn: request.inn.clone(),
            kpp: request.kpp.clone(),
            contract_numbers,
            counterparty_ids: vec![row.company_id.clone()],
            signatory_ids,
            status: row.status.clone(),
            period_start: request.period_start,
            period_end: request.period_end,
            cross_branch: false,
        })
    }

    fn full_inventory(
        &self,
        request: &Request,
        table: &RegistryTable,
    ) -> Result<Vec<Task>, ResolveError> {
        let branch_rows = table.filter(&RowFilter::new().eq(Column::Branch, &request.branch));
        let signatories = dedup_ci(branch_rows.iter().map(|r| r.personnel_number.as_str()));
        debug!(
            rows = branch_rows.len(),
            signatories = signatories.len(),
            "Branch scope collected"
        );

        // (raw signatory, status, counterparties) for every non-empty pair
        let mut groups = Vec::new();
        for signatory in &signatories {
            for status in &self.registry.statuses {
                let filter = RowFilter::new()
                    .eq(Column::PersonnelNumber, signatory)
                    .eq(Column::Status, status);
                let matched = filter.apply(branch_rows.iter().copied());
                let counterparties = dedup_ci(matched.iter().map(|r| r.company_id.as_str()));

                if counterparties.is_empty() {
                    debug!(signatory = %signatory, status = %status, "No counterparties for pair");
                    continue;
                }
                groups.push((signatory, status, counterparties));
            }
        }

        if groups.is_empty() {
            warn!(branch = %request.branch, "Full inventory produced no tasks");
            return Ok(Vec::new());
        }

        let branch_code = self.branch_code(&request.branch)?;

        groups
            .into_iter()
            .map(|(signatory, status, counterparty_ids)| {
                let signatory_ids = self.signatories(signatory);
                if signatory_ids.is_empty() {
                    return Err(ResolveError::EmptySignatory(signatory.clone()));
                }
                Ok(Task {
                    kind: RequestType::FullInventory,
                    branch_code: branch_code.clone(),
                    inn: None,
                    kpp: None,
                    contract_numbers: Vec::new(),
                    counterparty_ids,
                    signatory_ids,
                    status: status.clone(),
                    period_start: request.period_start,
                    period_end: request.period_end,
                    cross_branch: false,
                })
            })
            .collect()
    }
}
