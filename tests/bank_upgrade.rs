//! Tests for upgrading a whole primary bank onto a new baseline.
//!
//! This module tests:
//! - Per-table outcomes: merged, unmodified, adopted, retained, failed
//! - Installation: merged tables, new vanilla bank, new primary origin, fresh diffs
//! - Preconditions: loaded banks and matching baseline version
//! - Cancellation and failure isolation leave banks untouched

#![cfg(feature = "testing")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use param_diff_rs::testing::{MemoryStore, int_table};
use param_diff_rs::{
    Bank, BankId, BankRegistry, CancelToken, ColumnDef, ColumnType, Comparison, Error,
    RegistryConfig, Row, Table, TableOutcome, TableSchema, Value, VersionTag,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn next() -> BankId {
    BankId::Auxiliary("next".to_owned())
}

fn float_table(name: &str) -> Table {
    let schema = TableSchema::shared("Float", vec![ColumnDef::new("value", ColumnType::F32)]);
    Table::from_rows(name, schema, vec![Row::new(1, None, vec![Value::F32(1.0)])]).unwrap()
}

/// Vanilla 1.0, a primary derived from it and a 2.0 baseline under `next`.
fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store.put_bank(
        BankId::Vanilla,
        "1.0",
        [
            int_table("Weapons", &[(1, 10), (2, 20), (3, 30)]),
            int_table("Armor", &[(1, 5), (2, 6)]),
            int_table("Legacy", &[(1, 1)]),
        ],
    );
    store.put_bank(
        BankId::Primary,
        "user",
        [
            int_table("Weapons", &[(1, 10), (2, 25), (4, 40)]),
            int_table("Armor", &[(1, 5), (2, 6)]),
            int_table("Legacy", &[(1, 1)]),
            int_table("Custom", &[(7, 7)]),
            int_table("Orphan", &[(1, 1)]),
        ],
    );
    store.set_origin(&BankId::Primary, "1.0");
    store.put_bank(
        next(),
        "2.0",
        [
            int_table("Weapons", &[(1, 11), (2, 22), (3, 33), (4, 44), (5, 55)]),
            int_table("Armor", &[(1, 50), (2, 6), (3, 7)]),
            int_table("Orphan", &[(1, 2)]),
            int_table("Shields", &[(1, 1)]),
        ],
    );
    store
}

fn loaded(store: &MemoryStore, config: RegistryConfig) -> BankRegistry {
    let registry = BankRegistry::new(config);
    let cancel = CancelToken::new();
    registry.load_bank(&BankId::Primary, store, &cancel).unwrap();
    registry.load_bank(&BankId::Vanilla, store, &cancel).unwrap();
    registry
}

fn primary_table(registry: &BankRegistry, name: &str) -> Table {
    registry
        .with_table(&BankId::Primary, name, Clone::clone)
        .unwrap()
}

// =============================================================================
// Outcomes
// =============================================================================

#[test]
fn test_upgrade_outcomes_per_table() {
    init_tracing();
    for config in [RegistryConfig::sequential(), RegistryConfig::default()] {
        let store = store();
        let registry = loaded(&store, config);
        let target = store.load(next()).unwrap();

        let report = registry.upgrade(target, &CancelToken::new()).unwrap();

        let names: Vec<&str> = report.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Weapons", "Armor", "Orphan", "Shields", "Legacy", "Custom"]);
        assert!(matches!(report.outcome("Weapons"), Some(TableOutcome::Merged { .. })));
        assert!(matches!(report.outcome("Armor"), Some(TableOutcome::Unmodified(_))));
        assert_eq!(report.outcome("Shields"), Some(&TableOutcome::Adopted));
        assert_eq!(report.outcome("Legacy"), Some(&TableOutcome::Retained));
        assert_eq!(report.outcome("Custom"), Some(&TableOutcome::Retained));
        assert_eq!(
            report.failed(),
            vec![("Orphan", &Error::MissingBaselineTable("Orphan".to_owned()))]
        );
        assert_eq!(report.changed_tables(), vec!["Weapons", "Armor", "Shields"]);
        assert!(!report.is_noop());
        assert_eq!(report.from, Some(VersionTag::new("1.0")));
        assert_eq!(report.to, Some(VersionTag::new("2.0")));
    }
}

#[test]
fn test_upgrade_reports_add_add_conflicts() {
    init_tracing();
    let store = store();
    let registry = loaded(&store, RegistryConfig::sequential());
    let report = registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap();

    assert_eq!(report.conflicts(), vec![("Weapons", 4)]);
    let (table, conflict) = report.row_conflicts().next().unwrap();
    assert_eq!(table, "Weapons");
    assert_eq!(conflict.user_row, Row::new(4, None, vec![Value::S32(40)]));
    assert_eq!(conflict.baseline_row, Row::new(4, None, vec![Value::S32(44)]));
}

#[test]
fn test_upgrade_installs_results() {
    let store = store();
    let registry = loaded(&store, RegistryConfig::sequential());
    registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap();

    assert_eq!(
        primary_table(&registry, "Weapons"),
        int_table("Weapons", &[(1, 11), (2, 25), (4, 40), (5, 55)])
    );
    assert_eq!(
        primary_table(&registry, "Armor"),
        int_table("Armor", &[(1, 50), (2, 6), (3, 7)])
    );
    assert_eq!(primary_table(&registry, "Orphan"), int_table("Orphan", &[(1, 1)]));
    assert_eq!(primary_table(&registry, "Shields"), int_table("Shields", &[(1, 1)]));
    assert_eq!(primary_table(&registry, "Custom"), int_table("Custom", &[(7, 7)]));
    assert_eq!(
        registry.table_names(&BankId::Primary).unwrap(),
        ["Weapons", "Armor", "Orphan", "Shields", "Legacy", "Custom"].map(str::to_owned)
    );

    assert_eq!(registry.version(&BankId::Vanilla), Ok(Some(VersionTag::new("2.0"))));
    assert_eq!(registry.primary_origin(), Some(VersionTag::new("2.0")));

    let weapons = registry.diff_state(&BankId::Primary, Comparison::Vanilla, "Weapons");
    let mut ids: Vec<i32> = weapons.changed_ids().unwrap().iter().copied().collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 4]);
    assert_eq!(
        registry.is_row_changed(&BankId::Primary, Comparison::Vanilla, "Legacy", 1),
        None
    );
}

#[test]
fn test_commit_changed_tables() {
    let store = store();
    let registry = loaded(&store, RegistryConfig::sequential());
    let report = registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap();

    registry.commit(&store, &report.changed_tables()).unwrap();
    assert_eq!(store.save_count(), 3);
    assert_eq!(
        store.stored_table(&BankId::Primary, "Weapons"),
        Some(primary_table(&registry, "Weapons"))
    );
    assert_eq!(
        store.stored_table(&BankId::Primary, "Orphan"),
        Some(int_table("Orphan", &[(1, 1)]))
    );
}

#[test]
fn test_schema_mismatch_is_isolated() {
    let store = store();
    let registry = loaded(&store, RegistryConfig::sequential());
    let target = Bank::from_tables(
        next(),
        VersionTag::new("2.0"),
        [
            float_table("Weapons"),
            int_table("Armor", &[(1, 50), (2, 6)]),
        ],
    );

    let report = registry.upgrade(target, &CancelToken::new()).unwrap();
    assert_eq!(
        report.outcome("Weapons"),
        Some(&TableOutcome::Failed(Error::SchemaMismatch("Weapons".to_owned())))
    );
    assert!(matches!(report.outcome("Armor"), Some(TableOutcome::Unmodified(_))));
    assert_eq!(
        primary_table(&registry, "Weapons"),
        int_table("Weapons", &[(1, 10), (2, 25), (4, 40)])
    );
    assert_eq!(primary_table(&registry, "Armor"), int_table("Armor", &[(1, 50), (2, 6)]));
}

#[test]
fn test_untouched_primary_is_noop() {
    let store = store();
    store.put_bank(
        BankId::Primary,
        "user",
        [int_table("Weapons", &[(1, 10), (2, 20), (3, 30)])],
    );
    store.set_origin(&BankId::Primary, "1.0");
    let registry = loaded(&store, RegistryConfig::sequential());

    let report = registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap();
    assert!(report.is_noop());
    assert!(report.conflicts().is_empty());
    assert_eq!(
        primary_table(&registry, "Weapons"),
        int_table("Weapons", &[(1, 11), (2, 22), (3, 33), (4, 44), (5, 55)])
    );
}

#[test]
fn test_readers_never_see_diffs_of_replaced_banks() {
    for config in [RegistryConfig::sequential(), RegistryConfig::default()] {
        for _ in 0..50 {
            let store = MemoryStore::new();
            store.put_bank(BankId::Vanilla, "1.0", [int_table("Weapons", &[(1, 10), (2, 20)])]);
            store.put_bank(BankId::Primary, "user", [int_table("Weapons", &[(1, 10), (2, 25)])]);
            store.set_origin(&BankId::Primary, "1.0");
            store.put_bank(next(), "2.0", [int_table("Weapons", &[(1, 10), (2, 25)])]);
            let registry = loaded(&store, config.clone());
            let target = store.load(next()).unwrap();
            let done = AtomicBool::new(false);

            let stale = thread::scope(|scope| {
                let reader = scope.spawn(|| {
                    let mut stale = 0_usize;
                    while !done.load(Ordering::Acquire) {
                        let upgraded = registry
                            .version(&BankId::Vanilla)
                            .unwrap()
                            .is_some_and(|version| version.as_str() == "2.0");
                        let changed = registry.is_row_changed(
                            &BankId::Primary,
                            Comparison::Vanilla,
                            "Weapons",
                            2,
                        );
                        if upgraded && changed == Some(true) {
                            stale += 1;
                        }
                    }
                    stale
                });
                registry.upgrade(target, &CancelToken::new()).unwrap();
                done.store(true, Ordering::Release);
                reader.join().unwrap()
            });

            assert_eq!(stale, 0);
            assert_eq!(
                registry.is_row_changed(&BankId::Primary, Comparison::Vanilla, "Weapons", 2),
                Some(false)
            );
        }
    }
}

// =============================================================================
// Preconditions
// =============================================================================

#[test]
fn test_version_mismatch_mutates_nothing() {
    let store = store();
    store.set_origin(&BankId::Primary, "0.9");
    let registry = loaded(&store, RegistryConfig::sequential());

    let err = registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap_err();
    assert_eq!(
        err,
        Error::VersionMismatch {
            expected: VersionTag::new("0.9"),
            found: VersionTag::new("1.0"),
        }
    );
    assert_eq!(registry.version(&BankId::Vanilla), Ok(Some(VersionTag::new("1.0"))));
    assert_eq!(
        primary_table(&registry, "Weapons"),
        int_table("Weapons", &[(1, 10), (2, 25), (4, 40)])
    );
}

#[test]
fn test_unrecorded_origin_skips_version_check() {
    let store = store();
    store.put_bank(
        BankId::Primary,
        "user",
        [int_table("Weapons", &[(1, 10), (2, 25), (4, 40)])],
    );
    let registry = loaded(&store, RegistryConfig::sequential());
    assert_eq!(registry.primary_origin(), None);

    let report = registry
        .upgrade(store.load(next()).unwrap(), &CancelToken::new())
        .unwrap();
    assert_eq!(report.from, None);
    assert_eq!(registry.primary_origin(), Some(VersionTag::new("2.0")));
}

#[test]
fn test_unloaded_banks_are_rejected() {
    let store = store();
    let registry = BankRegistry::new(RegistryConfig::sequential());
    let target = store.load(next()).unwrap();

    assert_eq!(
        registry.upgrade(target.clone(), &CancelToken::new()),
        Err(Error::BankNotLoaded(BankId::Primary))
    );
    registry
        .load_bank(&BankId::Primary, &store, &CancelToken::new())
        .unwrap();
    assert_eq!(
        registry.upgrade(target, &CancelToken::new()),
        Err(Error::BankNotLoaded(BankId::Vanilla))
    );
    assert_eq!(
        registry.upgrade(Bank::new(next()), &CancelToken::new()),
        Err(Error::BankNotLoaded(next()))
    );
}

#[test]
fn test_cancelled_upgrade_mutates_nothing() {
    let store = store();
    let registry = loaded(&store, RegistryConfig::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    assert_eq!(
        registry.upgrade(store.load(next()).unwrap(), &cancel),
        Err(Error::Cancelled)
    );
    assert_eq!(registry.primary_origin(), Some(VersionTag::new("1.0")));
    assert_eq!(registry.version(&BankId::Vanilla), Ok(Some(VersionTag::new("1.0"))));
    assert_eq!(
        primary_table(&registry, "Weapons"),
        int_table("Weapons", &[(1, 10), (2, 25), (4, 40)])
    );
    assert!(
        registry
            .diff_state(&BankId::Primary, Comparison::Vanilla, "Weapons")
            .is_available()
    );
}
