//! Collaborator traits through which banks are read and persisted.

use crate::errors::LoadError;
use crate::table::Table;

use super::{BankId, VersionTag};

/// Supplies the tables of a bank.
///
/// Sources are shared across loader threads, hence `Sync`.
pub trait TableSource: Sync {
    /// Names of the tables of `bank`, in load order.
    ///
    /// # Errors
    ///
    /// * `IoFailure` - If the bank cannot be listed.
    fn table_names(&self, bank: &BankId) -> Result<Vec<String>, LoadError>;

    /// Load a single table.
    ///
    /// # Errors
    ///
    /// * `SchemaMissing` - If no schema describes the table; the table is skipped.
    /// * `IoFailure` - If the table cannot be read; the whole load fails.
    fn load_table(&self, bank: &BankId, table: &str) -> Result<Table, LoadError>;

    /// Version of the data stored for `bank`.
    ///
    /// # Errors
    ///
    /// * `IoFailure` - If the version cannot be determined.
    fn version(&self, bank: &BankId) -> Result<VersionTag, LoadError>;

    /// Version of the baseline `bank` derives from, if recorded.
    ///
    /// # Errors
    ///
    /// * `IoFailure` - If the record exists but cannot be read.
    fn origin_version(&self, bank: &BankId) -> Result<Option<VersionTag>, LoadError> {
        let _ = bank;
        Ok(None)
    }
}

/// Persists tables of a bank.
pub trait TableSink {
    /// Store `table` as `name` in `bank`.
    ///
    /// # Errors
    ///
    /// * `IoFailure` - If the table cannot be written.
    fn save_table(&self, bank: &BankId, name: &str, table: &Table) -> Result<(), LoadError>;
}
