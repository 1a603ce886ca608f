//! The registry owning every bank of an open project and the diffs between them.
//!
//! Three diff relationships are maintained:
//!
//! * primary against vanilla,
//! * every auxiliary against vanilla,
//! * every auxiliary against primary.
//!
//! A relationship is computed once both of its banks are loaded and dropped
//! as soon as either side starts loading again. Bank locks are always taken
//! in rank order (primary, vanilla, auxiliary); diff caches are leaf locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;

use crate::config::RegistryConfig;
use crate::diff::{DiffCache, DiffState, refresh_all};
use crate::errors::Error;
use crate::table::{Row, RowId, Table};
use crate::upgrade::{TableUpgrade, upgrade_table};

use super::{
    Bank, BankId, BankState, CancelToken, IndexMap, TableOutcome, TableReport, TableSink,
    TableSource, UpgradeReport, VersionTag,
};

/// The bank a diff is taken against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Comparison {
    /// Against the vanilla baseline.
    Vanilla,
    /// Against the primary bank. Only auxiliaries compare against it.
    Primary,
}

/// Result of loading one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Number of tables loaded.
    pub tables: usize,
    /// Tables skipped for lack of a schema.
    pub skipped: Vec<String>,
    /// Version of the loaded data.
    pub version: Option<VersionTag>,
}

#[derive(Debug)]
struct BankSlot {
    id: BankId,
    bank: RwLock<Bank>,
    /// Bumped by every load and unload; a load publishes only if unchanged.
    generation: AtomicU64,
    against_vanilla: DiffCache,
    against_primary: DiffCache,
}

impl BankSlot {
    fn new(id: BankId) -> Self {
        Self {
            bank: RwLock::new(Bank::new(id.clone())),
            id,
            generation: AtomicU64::new(0),
            against_vanilla: DiffCache::new(),
            against_primary: DiffCache::new(),
        }
    }

    fn cache(&self, against: Comparison) -> &DiffCache {
        match against {
            Comparison::Vanilla => &self.against_vanilla,
            Comparison::Primary => &self.against_primary,
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Read-lock two banks in rank order, returning `(own, other)`.
fn read_pair<'a>(
    own: &'a BankSlot,
    other: &'a BankSlot,
) -> (RwLockReadGuard<'a, Bank>, RwLockReadGuard<'a, Bank>) {
    if own.id.rank() <= other.id.rank() {
        let own = own.bank.read();
        (own, other.bank.read())
    } else {
        let other = other.bank.read();
        (own.bank.read(), other)
    }
}

fn loaded_table_mut<'a>(bank: &'a mut Bank, table: &str) -> Result<&'a mut Table, Error> {
    let id = bank.id().clone();
    if !bank.is_loaded() {
        return Err(Error::BankNotLoaded(id));
    }
    bank.table_mut(table).ok_or(Error::TableNotFound {
        bank: id,
        table: table.to_owned(),
    })
}

fn id_run(table: &Table, id: RowId) -> Vec<&Row> {
    table.rows_with_id(id).collect()
}

/// Work item of a bank upgrade, one per table.
enum UpgradeJob<'a> {
    Merge {
        source: &'a Table,
        old: &'a Table,
        new: &'a Table,
    },
    Adopt(&'a Table),
    Retain(&'a str),
    MissingBaseline(&'a str),
}

impl UpgradeJob<'_> {
    fn plan<'a>(primary: &'a Bank, vanilla: &'a Bank, new: &'a Bank) -> Vec<UpgradeJob<'a>> {
        let mut jobs: Vec<UpgradeJob<'a>> = new
            .tables()
            .map(|new_table| {
                let name = new_table.name();
                match (primary.table(name), vanilla.table(name)) {
                    (Some(source), Some(old)) => UpgradeJob::Merge {
                        source,
                        old,
                        new: new_table,
                    },
                    (Some(source), None) => UpgradeJob::MissingBaseline(source.name()),
                    (None, _) => UpgradeJob::Adopt(new_table),
                }
            })
            .collect();
        jobs.extend(
            primary
                .tables()
                .filter(|table| new.table(table.name()).is_none())
                .map(|table| UpgradeJob::Retain(table.name())),
        );
        jobs
    }

    /// Run the job, returning its report and the table to install, if any.
    fn run(self, cancel: &CancelToken) -> (TableReport, Option<Table>) {
        if cancel.is_cancelled() {
            let report = TableReport {
                name: self.name().to_owned(),
                outcome: TableOutcome::Failed(Error::Cancelled),
            };
            return (report, None);
        }
        let (name, outcome, table) = match self {
            UpgradeJob::Merge { source, old, new } => match upgrade_table(source, old, new) {
                Ok(TableUpgrade::NoOp(stats)) => {
                    (new.name(), TableOutcome::Unmodified(stats), Some(new.clone()))
                }
                Ok(TableUpgrade::Merged(merged)) => {
                    if !merged.conflicts.is_empty() {
                        tracing::warn!(
                            table = new.name(),
                            conflicts = merged.conflicts.len(),
                            "row ids added on both sides, user rows kept"
                        );
                    }
                    let outcome = TableOutcome::Merged {
                        conflicts: merged.conflicts,
                        stats: merged.stats,
                    };
                    (new.name(), outcome, Some(merged.table))
                }
                Err(err) => {
                    tracing::warn!(table = new.name(), error = %err, "table upgrade failed, keeping user table");
                    (new.name(), TableOutcome::Failed(err), None)
                }
            },
            UpgradeJob::Adopt(new) => (new.name(), TableOutcome::Adopted, Some(new.clone())),
            UpgradeJob::Retain(name) => (name, TableOutcome::Retained, None),
            UpgradeJob::MissingBaseline(name) => {
                tracing::warn!(table = name, "no old baseline table, keeping user table");
                let err = Error::MissingBaselineTable(name.to_owned());
                (name, TableOutcome::Failed(err), None)
            }
        };
        (
            TableReport {
                name: name.to_owned(),
                outcome,
            },
            table,
        )
    }

    fn name(&self) -> &str {
        match self {
            UpgradeJob::Merge { new, .. } => new.name(),
            UpgradeJob::Adopt(new) => new.name(),
            UpgradeJob::Retain(name) | UpgradeJob::MissingBaseline(name) => *name,
        }
    }
}

/// Owns the primary, vanilla and auxiliary banks of a project together with
/// their diff caches.
///
/// Every method takes `&self`; the registry is meant to be shared across
/// threads (for instance behind an `Arc`).
#[derive(Debug)]
pub struct BankRegistry {
    config: RegistryConfig,
    pool: Option<rayon::ThreadPool>,
    primary: Arc<BankSlot>,
    vanilla: Arc<BankSlot>,
    auxiliaries: RwLock<IndexMap<String, Arc<BankSlot>>>,
}

impl Default for BankRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl BankRegistry {
    /// Create a registry with unloaded primary and vanilla banks.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            pool: config.build_pool(),
            config,
            primary: Arc::new(BankSlot::new(BankId::Primary)),
            vanilla: Arc::new(BankSlot::new(BankId::Vanilla)),
            auxiliaries: RwLock::new(IndexMap::default()),
        }
    }

    /// The configuration the registry was built with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn slot(&self, id: &BankId) -> Result<Arc<BankSlot>, Error> {
        match id {
            BankId::Primary => Ok(Arc::clone(&self.primary)),
            BankId::Vanilla => Ok(Arc::clone(&self.vanilla)),
            BankId::Auxiliary(name) => self
                .auxiliaries
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnknownBank(id.clone())),
        }
    }

    fn auxiliary_slots(&self) -> Vec<Arc<BankSlot>> {
        self.auxiliaries.read().values().cloned().collect()
    }

    /// Map `items` on the worker pool, or sequentially when configured so.
    fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        if !self.config.parallel {
            return items.into_iter().map(f).collect();
        }
        match &self.pool {
            Some(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
            None => items.into_par_iter().map(f).collect(),
        }
    }

    /// Register an empty auxiliary bank.
    ///
    /// # Errors
    ///
    /// * `DuplicateBank` - If an auxiliary with this name exists.
    pub fn add_auxiliary(&self, name: impl Into<String>) -> Result<(), Error> {
        let name = name.into();
        let mut auxiliaries = self.auxiliaries.write();
        if auxiliaries.contains_key(&name) {
            return Err(Error::DuplicateBank(BankId::Auxiliary(name)));
        }
        tracing::info!(bank = %BankId::Auxiliary(name.clone()), "auxiliary bank registered");
        auxiliaries.insert(name.clone(), Arc::new(BankSlot::new(BankId::Auxiliary(name))));
        Ok(())
    }

    /// Drop an auxiliary bank and its diffs. A load in flight is discarded.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If no auxiliary has this name.
    pub fn remove_auxiliary(&self, name: &str) -> Result<(), Error> {
        let slot = self
            .auxiliaries
            .write()
            .shift_remove(name)
            .ok_or_else(|| Error::UnknownBank(BankId::Auxiliary(name.to_owned())))?;
        slot.next_generation();
        tracing::info!(bank = %slot.id, "auxiliary bank removed");
        Ok(())
    }

    /// Names of the registered auxiliary banks, in registration order.
    #[must_use]
    pub fn auxiliary_names(&self) -> Vec<String> {
        self.auxiliaries.read().keys().cloned().collect()
    }

    /// Drop the tables of a bank and every diff involving it.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    pub fn unload(&self, id: &BankId) -> Result<(), Error> {
        let slot = self.slot(id)?;
        slot.next_generation();
        slot.bank.write().clear(BankState::Unloaded);
        self.invalidate_involving(&slot);
        tracing::info!(bank = %id, "bank unloaded");
        Ok(())
    }

    fn invalidate_involving(&self, slot: &BankSlot) {
        match slot.id {
            BankId::Primary => {
                self.primary.against_vanilla.invalidate();
                for aux in self.auxiliary_slots() {
                    aux.against_primary.invalidate();
                }
            }
            BankId::Vanilla => {
                self.primary.against_vanilla.invalidate();
                for aux in self.auxiliary_slots() {
                    aux.against_vanilla.invalidate();
                }
            }
            BankId::Auxiliary(_) => {
                slot.against_vanilla.invalidate();
                slot.against_primary.invalidate();
            }
        }
    }

    /// Load one bank from `source`, then refresh the diffs it takes part in.
    ///
    /// The bank reports [`BankState::Loading`] until the whole table set is
    /// built; readers never see a partial set. A failed or cancelled load
    /// leaves the bank unloaded.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    /// * `Cancelled` - If `cancel` fired, or a newer load or unload superseded this one.
    /// * `Load` - If the source failed.
    pub fn load_bank(
        &self,
        id: &BankId,
        source: &dyn TableSource,
        cancel: &CancelToken,
    ) -> Result<LoadSummary, Error> {
        let slot = self.slot(id)?;
        let summary = self.load_slot(&slot, source, cancel)?;
        self.refresh_involving(&slot);
        Ok(summary)
    }

    /// Load primary, vanilla and every auxiliary concurrently, then compute
    /// every diff once.
    ///
    /// Loads are independent: one failing does not stop the others.
    #[must_use]
    pub fn load_all(
        &self,
        source: &dyn TableSource,
        cancel: &CancelToken,
    ) -> Vec<(BankId, Result<LoadSummary, Error>)> {
        let mut slots = vec![Arc::clone(&self.primary), Arc::clone(&self.vanilla)];
        slots.extend(self.auxiliary_slots());

        let results = self.map(slots, |slot| {
            let result = self.load_slot(&slot, source, cancel);
            (slot.id.clone(), result)
        });
        self.refresh_diffs();
        results
    }

    fn load_slot(
        &self,
        slot: &BankSlot,
        source: &dyn TableSource,
        cancel: &CancelToken,
    ) -> Result<LoadSummary, Error> {
        let generation = slot.next_generation();
        slot.bank.write().clear(BankState::Loading);
        self.invalidate_involving(slot);
        tracing::info!(bank = %slot.id, "loading bank");

        let loaded = Bank::load(slot.id.clone(), source, cancel);

        let mut bank = slot.bank.write();
        if slot.generation.load(Ordering::Acquire) != generation {
            tracing::debug!(bank = %slot.id, "load superseded, discarded");
            return Err(Error::Cancelled);
        }
        match loaded {
            Ok(loaded) => {
                let summary = LoadSummary {
                    tables: loaded.len(),
                    skipped: loaded.skipped_tables().to_vec(),
                    version: loaded.version().cloned(),
                };
                *bank = loaded;
                tracing::info!(
                    bank = %slot.id,
                    tables = summary.tables,
                    skipped = summary.skipped.len(),
                    "bank loaded"
                );
                Ok(summary)
            }
            Err(err) => {
                bank.clear(BankState::Unloaded);
                if err == Error::Cancelled {
                    tracing::warn!(bank = %slot.id, "load cancelled");
                } else {
                    tracing::warn!(bank = %slot.id, error = %err, "load failed");
                }
                Err(err)
            }
        }
    }

    /// The load state of a bank.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    pub fn state(&self, id: &BankId) -> Result<BankState, Error> {
        Ok(self.slot(id)?.bank.read().state())
    }

    /// The version of a bank's loaded data.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    pub fn version(&self, id: &BankId) -> Result<Option<VersionTag>, Error> {
        Ok(self.slot(id)?.bank.read().version().cloned())
    }

    /// The baseline version the primary bank derives from.
    #[must_use]
    pub fn primary_origin(&self) -> Option<VersionTag> {
        self.primary.bank.read().origin().cloned()
    }

    /// Run `f` on a bank under its read guard.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    pub fn with_bank<R>(&self, id: &BankId, f: impl FnOnce(&Bank) -> R) -> Result<R, Error> {
        let slot = self.slot(id)?;
        let bank = slot.bank.read();
        Ok(f(&bank))
    }

    /// Run `f` on a table of a loaded bank under the bank's read guard.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    /// * `BankNotLoaded` - If the bank is not loaded.
    /// * `TableNotFound` - If the bank has no such table.
    pub fn with_table<R>(
        &self,
        id: &BankId,
        table: &str,
        f: impl FnOnce(&Table) -> R,
    ) -> Result<R, Error> {
        let slot = self.slot(id)?;
        let bank = slot.bank.read();
        if !bank.is_loaded() {
            return Err(Error::BankNotLoaded(id.clone()));
        }
        let table = bank.table(table).ok_or_else(|| Error::TableNotFound {
            bank: id.clone(),
            table: table.to_owned(),
        })?;
        Ok(f(table))
    }

    /// Table names of a loaded bank.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    /// * `BankNotLoaded` - If the bank is not loaded.
    pub fn table_names(&self, id: &BankId) -> Result<Vec<String>, Error> {
        let slot = self.slot(id)?;
        let bank = slot.bank.read();
        if !bank.is_loaded() {
            return Err(Error::BankNotLoaded(id.clone()));
        }
        Ok(bank.table_names())
    }

    /// Run `f` on the cache of `id` against `against`, if the relationship
    /// exists and both banks are loaded.
    fn with_diff<R>(
        &self,
        id: &BankId,
        against: Comparison,
        f: impl FnOnce(&DiffCache) -> Option<R>,
    ) -> Option<R> {
        let other = match (id, against) {
            (BankId::Primary | BankId::Auxiliary(_), Comparison::Vanilla) => &self.vanilla,
            (BankId::Auxiliary(_), Comparison::Primary) => &self.primary,
            _ => return None,
        };
        let slot = self.slot(id).ok()?;
        let (own, other) = read_pair(&slot, other);
        if !(own.is_loaded() && other.is_loaded()) {
            return None;
        }
        f(slot.cache(against))
    }

    /// The changed-row set of `table` in bank `id` against `against`.
    ///
    /// Unavailable unless both banks are loaded and the diff was computed.
    #[must_use]
    pub fn diff_state(&self, id: &BankId, against: Comparison, table: &str) -> DiffState {
        self.with_diff(id, against, |cache| Some(cache.state(table)))
            .unwrap_or_default()
    }

    /// Whether row `row_id` of `table` differs, or `None` when unavailable.
    #[must_use]
    pub fn is_row_changed(
        &self,
        id: &BankId,
        against: Comparison,
        table: &str,
        row_id: RowId,
    ) -> Option<bool> {
        self.with_diff(id, against, |cache| cache.is_changed(table, row_id))
    }

    /// Recompute every diff relationship from scratch.
    pub fn refresh_diffs(&self) {
        self.refresh_relationship(&self.primary, &self.vanilla, Comparison::Vanilla);
        for aux in self.auxiliary_slots() {
            self.refresh_relationship(&aux, &self.vanilla, Comparison::Vanilla);
            self.refresh_relationship(&aux, &self.primary, Comparison::Primary);
        }
    }

    fn refresh_involving(&self, slot: &BankSlot) {
        match slot.id {
            BankId::Primary => {
                self.refresh_relationship(&self.primary, &self.vanilla, Comparison::Vanilla);
                for aux in self.auxiliary_slots() {
                    self.refresh_relationship(&aux, &self.primary, Comparison::Primary);
                }
            }
            BankId::Vanilla => {
                self.refresh_relationship(&self.primary, &self.vanilla, Comparison::Vanilla);
                for aux in self.auxiliary_slots() {
                    self.refresh_relationship(&aux, &self.vanilla, Comparison::Vanilla);
                }
            }
            BankId::Auxiliary(_) => {
                self.refresh_relationship(slot, &self.vanilla, Comparison::Vanilla);
                self.refresh_relationship(slot, &self.primary, Comparison::Primary);
            }
        }
    }

    fn refresh_relationship(&self, own: &BankSlot, other: &BankSlot, against: Comparison) {
        let (own_guard, other_guard) = read_pair(own, other);
        let cache = own.cache(against);
        if !(own_guard.is_loaded() && other_guard.is_loaded()) {
            cache.invalidate();
            return;
        }
        let other_bank: &Bank = &other_guard;
        let tables: Vec<&Table> = own_guard.tables().collect();
        let states = self.map(tables, |table| {
            (table.name().to_owned(), refresh_all(table, other_bank.table(table.name())))
        });
        tracing::debug!(bank = %own.id, against = %other.id, tables = states.len(), "diff refreshed");
        cache.replace_all(states.into_iter().collect());
    }

    /// Update the cached membership of `ids` in `table` after a primary edit.
    ///
    /// Must run under the primary's write guard that performed the edit.
    fn refresh_primary_ids(&self, primary: &Bank, table: &str, ids: &[RowId]) {
        let mut ids = ids.to_vec();
        ids.dedup();
        let Some(own) = primary.table(table) else {
            return;
        };

        {
            let vanilla = self.vanilla.bank.read();
            if let Some(other) = vanilla.table(table) {
                for &id in &ids {
                    self.primary
                        .against_vanilla
                        .refresh_one(table, id, &id_run(own, id), &id_run(other, id));
                }
            }
        }

        for aux in self.auxiliary_slots() {
            let aux_bank = aux.bank.read();
            if let Some(aux_table) = aux_bank.table(table) {
                for &id in &ids {
                    aux.against_primary
                        .refresh_one(table, id, &id_run(aux_table, id), &id_run(own, id));
                }
            }
        }
    }

    /// Edit a row in place through `f`.
    ///
    /// The edited row is validated against the schema; on violation the
    /// table keeps the original row. Diffs are updated for the row's old and
    /// new id.
    ///
    /// # Errors
    ///
    /// * `UnknownBank` - If the bank is not registered.
    /// * `ReadOnlyBank` - If `id` is not the primary bank.
    /// * `BankNotLoaded` / `TableNotFound` / `RowIndexOutOfBounds` - If there is no such row.
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the edited row does not fit the schema.
    pub fn edit_row<R>(
        &self,
        id: &BankId,
        table: &str,
        index: usize,
        f: impl FnOnce(&mut Row) -> R,
    ) -> Result<R, Error> {
        self.slot(id)?;
        if *id != BankId::Primary {
            return Err(Error::ReadOnlyBank(id.clone()));
        }

        let mut bank = self.primary.bank.write();
        let target = loaded_table_mut(&mut bank, table)?;
        let mut row = target
            .row(index)
            .cloned()
            .ok_or(Error::RowIndexOutOfBounds(index, target.len()))?;
        let old_id = row.id();
        let result = f(&mut row);
        let new_id = row.id();
        target.replace_row(index, row)?;

        tracing::debug!(table, index, old_id, new_id, "primary row edited");
        self.refresh_primary_ids(&bank, table, &[old_id, new_id]);
        Ok(result)
    }

    /// [`BankRegistry::edit_row`] on the primary bank.
    ///
    /// # Errors
    ///
    /// See [`BankRegistry::edit_row`].
    pub fn edit_primary_row<R>(
        &self,
        table: &str,
        index: usize,
        f: impl FnOnce(&mut Row) -> R,
    ) -> Result<R, Error> {
        self.edit_row(&BankId::Primary, table, index, f)
    }

    /// Append a row to a primary table, returning its index.
    ///
    /// # Errors
    ///
    /// * `BankNotLoaded` / `TableNotFound` - If there is no such table.
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the row does not fit the schema.
    pub fn push_primary_row(&self, table: &str, row: Row) -> Result<usize, Error> {
        let id = row.id();
        let mut bank = self.primary.bank.write();
        let target = loaded_table_mut(&mut bank, table)?;
        target.push_row(row)?;
        let index = target.len() - 1;
        self.refresh_primary_ids(&bank, table, &[id]);
        Ok(index)
    }

    /// Insert a row into a primary table at `index`.
    ///
    /// # Errors
    ///
    /// * `BankNotLoaded` / `TableNotFound` - If there is no such table.
    /// * `RowIndexOutOfBounds` - If `index` is past the end.
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the row does not fit the schema.
    pub fn insert_primary_row(&self, table: &str, index: usize, row: Row) -> Result<(), Error> {
        let id = row.id();
        let mut bank = self.primary.bank.write();
        loaded_table_mut(&mut bank, table)?.insert_row(index, row)?;
        self.refresh_primary_ids(&bank, table, &[id]);
        Ok(())
    }

    /// Remove and return a row of a primary table.
    ///
    /// # Errors
    ///
    /// * `BankNotLoaded` / `TableNotFound` / `RowIndexOutOfBounds` - If there is no such row.
    pub fn remove_primary_row(&self, table: &str, index: usize) -> Result<Row, Error> {
        let mut bank = self.primary.bank.write();
        let row = loaded_table_mut(&mut bank, table)?.remove_row(index)?;
        self.refresh_primary_ids(&bank, table, &[row.id()]);
        Ok(row)
    }

    /// Persist primary tables through `sink`, in the given order.
    ///
    /// # Errors
    ///
    /// * `BankNotLoaded` - If the primary bank is not loaded.
    /// * `TableNotFound` - If a named table does not exist; earlier tables stay written.
    /// * `Load` - If the sink fails.
    pub fn commit(&self, sink: &dyn TableSink, tables: &[&str]) -> Result<(), Error> {
        let bank = self.primary.bank.read();
        if !bank.is_loaded() {
            return Err(Error::BankNotLoaded(BankId::Primary));
        }
        for &name in tables {
            let table = bank.table(name).ok_or_else(|| Error::TableNotFound {
                bank: BankId::Primary,
                table: name.to_owned(),
            })?;
            sink.save_table(&BankId::Primary, name, table)?;
        }
        tracing::info!(tables = tables.len(), "primary tables committed");
        Ok(())
    }

    /// Upgrade the primary bank onto `new_baseline`.
    ///
    /// The vanilla bank must be the baseline the primary derives from. Every
    /// table is merged independently; a failing table keeps the user's copy
    /// and is reported as [`TableOutcome::Failed`]. Once all tables are done
    /// the merged tables replace the primary's, `new_baseline` becomes the
    /// vanilla bank and the primary's origin becomes its version.
    ///
    /// The primary bank stays write-locked for the whole operation, so no
    /// edit can interleave with the merge.
    ///
    /// # Errors
    ///
    /// * `BankNotLoaded` - If the primary, vanilla or new baseline bank is not loaded.
    /// * `VersionMismatch` - If the vanilla version is not the primary's recorded origin.
    /// * `Cancelled` - If `cancel` fired before the results were installed.
    pub fn upgrade(&self, new_baseline: Bank, cancel: &CancelToken) -> Result<UpgradeReport, Error> {
        if !new_baseline.is_loaded() {
            return Err(Error::BankNotLoaded(new_baseline.id().clone()));
        }

        let mut primary = self.primary.bank.write();
        let (from, outcomes) = {
            let vanilla = self.vanilla.bank.read();
            check_baseline(&primary, &vanilla)?;
            let jobs = UpgradeJob::plan(&primary, &vanilla, &new_baseline);
            tracing::info!(tables = jobs.len(), to = ?new_baseline.version(), "upgrading primary bank");
            let outcomes = self.map(jobs, |job| job.run(cancel));
            (primary.origin().cloned(), outcomes)
        };

        if cancel.is_cancelled() {
            tracing::warn!("upgrade cancelled, banks untouched");
            return Err(Error::Cancelled);
        }

        let mut previous = primary.take_tables();
        let mut merged = IndexMap::default();
        let mut reports = Vec::with_capacity(outcomes.len());
        for (report, table) in outcomes {
            if let Some(table) = table.or_else(|| previous.shift_remove(&report.name)) {
                merged.insert(report.name.clone(), table);
            }
            reports.push(report);
        }
        primary.set_tables(merged);

        let to = new_baseline.version().cloned();
        primary.set_origin(to.clone());

        // Every relationship involves primary or vanilla; caches are dropped
        // under both write guards and recomputed after release.
        self.vanilla.next_generation();
        let mut vanilla = self.vanilla.bank.write();
        *vanilla = new_baseline.into_id(BankId::Vanilla);
        self.invalidate_involving(&self.primary);
        self.invalidate_involving(&self.vanilla);
        drop(vanilla);
        drop(primary);
        self.refresh_diffs();

        let report = UpgradeReport {
            from,
            to,
            tables: reports,
        };
        tracing::info!(
            changed = report.changed_tables().len(),
            conflicts = report.conflicts().len(),
            failed = report.failed().len(),
            "upgrade installed"
        );
        Ok(report)
    }
}

/// Check that `vanilla` is the baseline `primary` was derived from.
fn check_baseline(primary: &Bank, vanilla: &Bank) -> Result<(), Error> {
    if !primary.is_loaded() {
        return Err(Error::BankNotLoaded(BankId::Primary));
    }
    if !vanilla.is_loaded() {
        return Err(Error::BankNotLoaded(BankId::Vanilla));
    }
    match primary.origin() {
        Some(origin) => {
            let found = vanilla.version().cloned().unwrap_or_default();
            if *origin != found {
                return Err(Error::VersionMismatch {
                    expected: origin.clone(),
                    found,
                });
            }
        }
        None => {
            tracing::warn!("primary bank records no origin version, baseline check skipped");
        }
    }
    Ok(())
}
