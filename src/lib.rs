#![doc = include_str!("../README.md")]
#![deny(clippy::mod_module_files)]

pub mod bank;
pub mod config;
pub mod diff;
pub mod errors;
pub mod schema;
pub mod table;
#[cfg(feature = "testing")]
pub mod testing;
pub mod upgrade;
pub mod value;

// Re-export main types
pub use bank::{
    Bank, BankId, BankRegistry, BankState, CancelToken, Comparison, LoadSummary, TableOutcome,
    TableReport, TableSink, TableSource, UpgradeReport, VersionTag,
};
pub use config::RegistryConfig;
pub use diff::{DiffCache, DiffState, changed_row_ids};
pub use schema::{ColumnDef, ColumnType, TableSchema};
pub use table::{Row, RowId, Table, rows_equal};
pub use upgrade::{
    EditKind, EditStats, MergedTable, RowConflict, TableUpgrade, UpgradePlan, upgrade_table,
};
pub use value::{Value, ValueKind};

// Re-export errors
pub use errors::{Error, LoadError};
