//! In-memory view over the counterparty registry export.
//!
//! The export is a comma-separated file whose first line is a header. Every
//! field is usually quoted, doubled quotes escape a literal quote, and a
//! quoted field may contain commas. Every line is one record; lines that
//! cannot be read or have too few fields are dropped.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::REQUIRED_COLUMNS;

/// Registry columns in export order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    Number,
    Branch,
    CompanyName,
    CompanyId,
    Inn,
    Kpp,
    Status,
    SignatoryDocs,
    PersonnelNumber,
    SignatoryNote,
    Vgo,
}

impl Column {
    pub const ALL: [Column; REQUIRED_COLUMNS] = [
        Column::Number,
        Column::Branch,
        Column::CompanyName,
        Column::CompanyId,
        Column::Inn,
        Column::Kpp,
        Column::Status,
        Column::SignatoryDocs,
        Column::PersonnelNumber,
        Column::SignatoryNote,
        Column::Vgo,
    ];

    /// Zero-based position in the export
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// One counterparty/signatory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRow {
    pub number: String,
    pub branch: String,
    pub company_name: String,
    /// External-system counterparty id
    pub company_id: String,
    pub inn: String,
    pub kpp: String,
    /// Small fixed vocabulary, e.g. "EDI" / "non-EDI"
    pub status: String,
    pub signatory_docs: String,
    /// Raw, possibly multi-valued personnel number field
    pub personnel_number: String,
    pub signatory_note: String,
    pub vgo: String,
}

impl RegistryRow {
    /// Build a row from raw fields; `None` when fewer than eleven remain.
    ///
    /// Fields are expected already unescaped; only surrounding whitespace is
    /// trimmed so quotes that belong to the value are kept.
    pub fn from_fields<I, S>(fields: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = fields
            .into_iter()
            .map(|f| f.as_ref().trim().to_string())
            .collect();

        if fields.len() < REQUIRED_COLUMNS {
            return None;
        }

        let mut it = fields.into_iter();
        let mut next = || it.next().unwrap_or_default();
        Some(Self {
            number: next(),
            branch: next(),
            company_name: next(),
            company_id: next(),
            inn: next(),
            kpp: next(),
            status: next(),
            signatory_docs: next(),
            personnel_number: next(),
            signatory_note: next(),
            vgo: next(),
        })
    }

    /// Field value by column
    pub fn field(&self, column: Column) -> &str {
        match column {
            Column::Number => &self.number,
            Column::Branch => &self.branch,
            Column::CompanyName => &self.company_name,
            Column::CompanyId => &self.company_id,
            Column::Inn => &self.inn,
            Column::Kpp => &self.kpp,
            Column::Status => &self.status,
            Column::SignatoryDocs => &self.signatory_docs,
            Column::PersonnelNumber => &self.personnel_number,
            Column::SignatoryNote => &self.signatory_note,
            Column::Vgo => &self.vgo,
        }
    }

    /// All fields in export order
    pub fn fields(&self) -> Vec<&str> {
        Column::ALL.iter().map(|c| self.field(*c)).collect()
    }
}

impl fmt::Display for RegistryRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {} | {} | {} | {}",
            self.number,
            self.branch,
            self.company_name,
            self.company_id,
            self.inn,
            self.kpp,
            self.status,
            self.personnel_number
        )
    }
}

/// Per-column allowed-value constraints.
///
/// A row matches when, for every constrained column, its trimmed value is
/// non-blank and equal (case-insensitively) to one of the allowed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    constraints: BTreeMap<Column, HashSet<String>>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or widen) the allowed set for a column
    pub fn allow<I, S>(mut self, column: Column, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = self.constraints.entry(column).or_default();
        set.extend(values.into_iter().map(|v| v.as_ref().trim().to_lowercase()));
        self
    }

    /// Single-value shorthand for [`RowFilter::allow`]
    pub fn eq(self, column: Column, value: &str) -> Self {
        self.allow(column, [value])
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn matches(&self, row: &RegistryRow) -> bool {
        self.constraints.iter().all(|(column, allowed)| {
            let value = row.field(*column).trim();
            !value.is_empty() && allowed.contains(&value.to_lowercase())
        })
    }

    /// Apply to an arbitrary row sequence, preserving order
    pub fn apply<'a, I>(&self, rows: I) -> Vec<&'a RegistryRow>
    where
        I: IntoIterator<Item = &'a RegistryRow>,
    {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

/// Read-only registry snapshot for one request
#[derive(Debug, Clone, Default)]
pub struct RegistryTable {
    rows: Vec<RegistryRow>,
}

impl RegistryTable {
    /// Build from raw lines; the first line is the header and is skipped
    pub fn load<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_lines(lines, REQUIRED_COLUMNS)
    }

    /// Parse a whole export held in memory
    pub fn from_csv_str(text: &str) -> Self {
        Self::from_lines(text.lines(), REQUIRED_COLUMNS)
    }

    /// Parse an export file from disk
    pub fn from_path(path: &Path, required_columns: usize) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read registry export: {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let table = Self::from_lines(text.lines(), required_columns);
        debug!(rows = table.len(), path = %path.display(), "Registry loaded");
        Ok(table)
    }

    fn from_lines<I, S>(lines: I, required_columns: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rows = Vec::new();
        for (idx, line) in lines.into_iter().enumerate().skip(1) {
            let line = line.as_ref().trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let record = match parse_line(line) {
                Some(Ok(r)) => r,
                Some(Err(e)) => {
                    debug!(line = idx + 1, error = %e, "Skipping unreadable registry line");
                    continue;
                }
                None => continue,
            };
            if record.len() < required_columns {
                debug!(line = idx + 1, fields = record.len(), "Skipping short registry line");
                continue;
            }
            if let Some(row) = RegistryRow::from_fields(record.iter()) {
                rows.push(row);
            }
        }

        Self { rows }
    }

    /// Wrap already-parsed rows
    pub fn from_rows(rows: Vec<RegistryRow>) -> Self {
        Self { rows }
    }

    /// Rows satisfying every constraint, in file order
    pub fn filter(&self, filter: &RowFilter) -> Vec<&RegistryRow> {
        filter.apply(&self.rows)
    }

    pub fn rows(&self) -> &[RegistryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// First record of a single export line. Each line is read on its own so an
/// unbalanced quote cannot run into the following lines.
fn parse_line(line: &str) -> Option<csv::Result<csv::StringRecord>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
}
