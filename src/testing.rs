//! Testing utilities shared by the integration tests, benches and fuzz targets.
//!
//! This module is gated behind the `testing` feature.
//!
//! # Provided helpers
//!
//! - [`MemoryStore`]: an in-memory [`TableSource`] and [`TableSink`]
//! - [`param_schema`], [`int_table`], [`named_table`]: single-column table builders
//! - [`check_upgrade_properties`]: assert the merge guarantees on three tables
//! - [`UpgradeInput`]: `arbitrary` input for the upgrade fuzzer

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::bank::{Bank, BankId, CancelToken, TableSink, TableSource, VersionTag};
use crate::errors::{Error, LoadError};
use crate::schema::{ColumnDef, ColumnType, TableSchema};
use crate::table::{Row, RowId, Table};
use crate::upgrade::{TableUpgrade, UpgradePlan, upgrade_table};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
struct StoredBank {
    version: VersionTag,
    origin: Option<VersionTag>,
    tables: Vec<Table>,
    schemaless: Vec<String>,
    broken: Vec<String>,
}

/// In-memory bank storage.
///
/// Tables can be marked schemaless (loads report `SchemaMissing`) or broken
/// (loads report `IoFailure`) to exercise the failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    banks: Mutex<HashMap<BankId, StoredBank>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tables` as bank `id` at `version`, replacing any previous content.
    pub fn put_bank(&self, id: BankId, version: &str, tables: impl IntoIterator<Item = Table>) {
        self.banks.lock().insert(
            id,
            StoredBank {
                version: VersionTag::new(version),
                tables: tables.into_iter().collect(),
                ..StoredBank::default()
            },
        );
    }

    /// Record the baseline version bank `id` derives from.
    pub fn set_origin(&self, id: &BankId, origin: &str) {
        self.banks.lock().entry(id.clone()).or_default().origin = Some(VersionTag::new(origin));
    }

    /// List a table in bank `id` that has no schema.
    pub fn put_schemaless(&self, id: &BankId, name: &str) {
        self.banks.lock().entry(id.clone()).or_default().schemaless.push(name.to_owned());
    }

    /// List a table in bank `id` whose reads fail.
    pub fn put_broken(&self, id: &BankId, name: &str) {
        self.banks.lock().entry(id.clone()).or_default().broken.push(name.to_owned());
    }

    /// The stored copy of a table.
    #[must_use]
    pub fn stored_table(&self, id: &BankId, name: &str) -> Option<Table> {
        self.banks
            .lock()
            .get(id)
            .and_then(|bank| bank.tables.iter().find(|table| table.name() == name).cloned())
    }

    /// Number of tables written through [`TableSink::save_table`].
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Load bank `id` detached from any registry, e.g. as an upgrade target.
    ///
    /// # Errors
    ///
    /// * `Load` - If the bank is unknown or a table is broken.
    pub fn load(&self, id: BankId) -> Result<Bank, Error> {
        Bank::load(id, self, &CancelToken::new())
    }

    fn with_bank<R>(&self, id: &BankId, f: impl FnOnce(&StoredBank) -> Result<R, LoadError>) -> Result<R, LoadError> {
        let banks = self.banks.lock();
        let bank = banks.get(id).ok_or_else(|| LoadError::IoFailure {
            table: String::new(),
            message: format!("no bank {id}"),
        })?;
        f(bank)
    }
}

impl TableSource for MemoryStore {
    fn table_names(&self, bank: &BankId) -> Result<Vec<String>, LoadError> {
        self.with_bank(bank, |stored| {
            Ok(stored
                .tables
                .iter()
                .map(|table| table.name().to_owned())
                .chain(stored.schemaless.iter().cloned())
                .chain(stored.broken.iter().cloned())
                .collect())
        })
    }

    fn load_table(&self, bank: &BankId, table: &str) -> Result<Table, LoadError> {
        self.with_bank(bank, |stored| {
            if stored.schemaless.iter().any(|name| name == table) {
                return Err(LoadError::SchemaMissing(table.to_owned()));
            }
            stored
                .tables
                .iter()
                .find(|t| t.name() == table)
                .filter(|_| !stored.broken.iter().any(|name| name == table))
                .cloned()
                .ok_or_else(|| LoadError::IoFailure {
                    table: table.to_owned(),
                    message: "unreadable".to_owned(),
                })
        })
    }

    fn version(&self, bank: &BankId) -> Result<VersionTag, LoadError> {
        self.with_bank(bank, |stored| Ok(stored.version.clone()))
    }

    fn origin_version(&self, bank: &BankId) -> Result<Option<VersionTag>, LoadError> {
        self.with_bank(bank, |stored| Ok(stored.origin.clone()))
    }
}

impl TableSink for MemoryStore {
    fn save_table(&self, bank: &BankId, name: &str, table: &Table) -> Result<(), LoadError> {
        let mut banks = self.banks.lock();
        let stored = banks.entry(bank.clone()).or_default();
        match stored.tables.iter_mut().find(|t| t.name() == name) {
            Some(slot) => *slot = table.clone(),
            None => stored.tables.push(table.clone()),
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Schema with a single `S32` column named `value`.
#[must_use]
pub fn param_schema() -> Arc<TableSchema> {
    TableSchema::shared("Param", vec![ColumnDef::new("value", ColumnType::S32)])
}

/// A [`param_schema`] table of unnamed `(id, value)` rows.
#[must_use]
pub fn int_table(name: &str, rows: &[(RowId, i32)]) -> Table {
    let rows = rows
        .iter()
        .map(|&(id, value)| Row::new(id, None, vec![Value::S32(value)]))
        .collect();
    Table::from_trusted_rows(name.to_owned(), param_schema(), rows)
}

/// A [`param_schema`] table of `(id, name, value)` rows; empty names mean unnamed.
#[must_use]
pub fn named_table(name: &str, rows: &[(RowId, &str, i32)]) -> Table {
    let rows = rows
        .iter()
        .map(|&(id, row_name, value)| {
            let row_name = (!row_name.is_empty()).then(|| row_name.to_owned());
            Row::new(id, row_name, vec![Value::S32(value)])
        })
        .collect();
    Table::from_trusted_rows(name.to_owned(), param_schema(), rows)
}

fn counts<'a>(rows: impl IntoIterator<Item = &'a Row>) -> HashMap<&'a Row, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row).or_insert(0) += 1;
    }
    counts
}

/// Assert the guarantees of [`upgrade_table`] on `source`, `old` and `new`.
///
/// * Upgrading onto `old` itself reproduces `source` (per id, in source order)
///   without conflicts.
/// * Every row the user added or modified survives the upgrade onto `new`.
/// * Every conflict names an id the new baseline carries, and the user's row
///   is the one emitted.
///
/// # Panics
///
/// Panics if a guarantee is violated or the tables do not share a layout.
pub fn check_upgrade_properties(source: &Table, old: &Table, new: &Table) {
    let identity = upgrade_table(source, old, old).unwrap();
    assert!(identity.conflicts().is_empty(), "conflicts against identical baselines");
    let identity = identity.into_table(old);
    assert_eq!(
        identity.sorted_by_id(),
        source.sorted_by_id(),
        "identical baselines must reproduce the source"
    );

    let plan = UpgradePlan::new(source, old);
    let merged = match upgrade_table(source, old, new).unwrap() {
        TableUpgrade::NoOp(_) => {
            assert!(plan.is_noop());
            return;
        }
        TableUpgrade::Merged(merged) => merged,
    };

    let emitted = counts(merged.table.rows());
    let mut required = counts(plan.added_rows());
    for row in source.rows() {
        let untouched = old.rows_with_id(row.id()).any(|old_row| old_row.data_eq(row));
        if !untouched && old.index_of_id(row.id()).is_some() {
            required.entry(row).or_insert(1);
        }
    }
    for (row, &count) in &required {
        let found = emitted.get(row).copied().unwrap_or(0);
        assert!(found >= count, "user row {row:?} emitted {found} times, expected {count}");
    }

    for conflict in &merged.conflicts {
        assert!(new.index_of_id(conflict.row_id).is_some(), "conflict on an id the new baseline lacks");
        assert!(emitted.contains_key(&conflict.user_row), "conflicting user row missing");
    }
}

/// Compact `arbitrary` input: three small tables over a narrow id and value
/// range, so ids collide often.
#[derive(Debug, Clone, arbitrary::Arbitrary)]
pub struct UpgradeInput {
    /// `(id, value, named)` rows of the user table.
    pub source: Vec<(i8, u8, bool)>,
    /// Rows of the old baseline.
    pub old: Vec<(i8, u8, bool)>,
    /// Rows of the new baseline.
    pub new: Vec<(i8, u8, bool)>,
}

impl UpgradeInput {
    fn table(rows: &[(i8, u8, bool)]) -> Table {
        let rows = rows
            .iter()
            .map(|&(id, value, named)| {
                let name = named.then(|| format!("row {}", value % 4));
                Row::new(RowId::from(id % 16), name, vec![Value::S32(i32::from(value % 4))])
            })
            .collect();
        Table::from_trusted_rows("Param".to_owned(), param_schema(), rows)
    }

    /// Build `(source, old, new)`.
    #[must_use]
    pub fn tables(&self) -> (Table, Table, Table) {
        (Self::table(&self.source), Self::table(&self.old), Self::table(&self.new))
    }
}

/// Run [`check_upgrade_properties`] on fuzzer input.
pub fn test_upgrade_input(input: &UpgradeInput) {
    let (source, old, new) = input.tables();
    check_upgrade_properties(&source, &old, &new);
}
