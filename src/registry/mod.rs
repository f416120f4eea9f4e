//! Counterparty registry.
//!
//! - `table`: parsed registry export and column filtering
//! - `tokenize`: splitting of free-text list fields

pub mod table;
pub mod tokenize;

/// Number of fields a registry line must have to be kept
pub const REQUIRED_COLUMNS: usize = 11;

pub use table::{Column, RegistryRow, RegistryTable, RowFilter};
pub use tokenize::{dedup_ci, split_dedup};
