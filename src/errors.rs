//! Submodule defining the errors used across the crate.

use crate::bank::{BankId, VersionTag};
use crate::schema::ColumnType;
use crate::value::ValueKind;

/// Errors that can occur while editing, diffing and upgrading tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The provided index is out of bounds for the number of columns in the table.
    #[error("Column index {0} out of bounds for table with {1} columns")]
    ColumnIndexOutOfBounds(usize, usize),

    /// The provided row index is out of bounds for the number of rows in the table.
    #[error("Row index {0} out of bounds for table with {1} rows")]
    RowIndexOutOfBounds(usize, usize),

    /// A row carries a different number of cells than its schema has columns.
    #[error("Row has {found} cells but the schema defines {expected} columns")]
    CellCountMismatch {
        /// Number of columns in the schema.
        expected: usize,
        /// Number of cells in the row.
        found: usize,
    },

    /// A cell value does not match the kind of its column.
    #[error("Column {column} expects {expected:?} but got a {found:?} value")]
    CellTypeMismatch {
        /// Index of the offending column.
        column: usize,
        /// The column kind declared by the schema.
        expected: ColumnType,
        /// The kind of the value that was supplied.
        found: ValueKind,
    },

    /// Tables being compared or merged have different column layouts.
    #[error("Table `{0}` has mismatching column layouts across banks")]
    SchemaMismatch(String),

    /// A diff or merge was requested against a bank that is not loaded.
    #[error("Bank {0} is not loaded")]
    BankNotLoaded(BankId),

    /// The old baseline is not the baseline the primary bank derives from.
    #[error("Baseline version {found} does not match the primary bank origin {expected}")]
    VersionMismatch {
        /// The version the primary bank recorded as its origin.
        expected: VersionTag,
        /// The version of the loaded baseline.
        found: VersionTag,
    },

    /// The requested table does not exist in the bank.
    #[error("Table `{table}` not found in bank {bank}")]
    TableNotFound {
        /// The bank that was searched.
        bank: BankId,
        /// The missing table name.
        table: String,
    },

    /// The user table exists in both the primary bank and the new baseline
    /// but the old baseline has no counterpart to classify edits against.
    #[error("Table `{0}` is missing from the old baseline")]
    MissingBaselineTable(String),

    /// No bank with this identifier is registered.
    #[error("Unknown bank {0}")]
    UnknownBank(BankId),

    /// An auxiliary bank with this name is already registered.
    #[error("Bank {0} is already registered")]
    DuplicateBank(BankId),

    /// The bank does not accept edits.
    #[error("Bank {0} is read-only")]
    ReadOnlyBank(BankId),

    /// The operation was abandoned through its cancel token.
    #[error("Operation cancelled")]
    Cancelled,

    /// An external collaborator failed to load or persist a table.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Errors reported by [`TableSource`](crate::bank::TableSource) and
/// [`TableSink`](crate::bank::TableSink) implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// No schema definition is available for the table.
    #[error("No schema available for table `{0}`")]
    SchemaMissing(String),

    /// Reading or writing the table bytes failed.
    #[error("I/O failure on table `{table}`: {message}")]
    IoFailure {
        /// The table being read or written.
        table: String,
        /// Collaborator supplied description.
        message: String,
    },
}
