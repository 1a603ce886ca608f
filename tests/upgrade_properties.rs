//! Property and scenario tests for the table diff and the three-way merge.
//!
//! Random tables use a narrow id range so duplicate ids and Add/Add
//! collisions are frequent. Every case goes through
//! [`check_upgrade_properties`], the same checker the fuzzer runs.

#![cfg(feature = "testing")]

use param_diff_rs::testing::{
    UpgradeInput, check_upgrade_properties, int_table, named_table, test_upgrade_input,
};
use param_diff_rs::diff::refresh_all;
use param_diff_rs::{
    DiffState, RowId, Table, TableUpgrade, Value, changed_row_ids, upgrade_table,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_table(rng: &mut StdRng, len: usize) -> Table {
    let rows: Vec<(RowId, i32)> = (0..len)
        .map(|_| (rng.random_range(-2..10), rng.random_range(0..3)))
        .collect();
    int_table("Param", &rows)
}

/// Derive a table from `base` by dropping, editing and adding rows.
fn mutate(rng: &mut StdRng, base: &Table) -> Table {
    let mut rows: Vec<(RowId, i32)> = Vec::new();
    for row in base.rows() {
        if rng.random_bool(0.15) {
            continue;
        }
        let value = if rng.random_bool(0.2) {
            rng.random_range(0..3)
        } else {
            let Value::S32(value) = row.cells()[0] else {
                panic!("param tables hold S32 cells");
            };
            value
        };
        rows.push((row.id(), value));
        if rng.random_bool(0.1) {
            rows.push((rng.random_range(-2..12), rng.random_range(0..3)));
        }
    }
    int_table("Param", &rows)
}

#[test]
fn test_random_related_tables() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..500 {
        let len = rng.random_range(0..24);
        let old = random_table(&mut rng, len);
        let source = mutate(&mut rng, &old);
        let new = mutate(&mut rng, &old);
        check_upgrade_properties(&source, &old, &new);
    }
}

#[test]
fn test_random_unrelated_tables() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let lens: [usize; 3] = [
            rng.random_range(0..12),
            rng.random_range(0..12),
            rng.random_range(0..12),
        ];
        let source = random_table(&mut rng, lens[0]);
        let old = random_table(&mut rng, lens[1]);
        let new = random_table(&mut rng, lens[2]);
        check_upgrade_properties(&source, &old, &new);
    }
}

#[test]
fn test_fuzz_regression_inputs() {
    let inputs = [
        UpgradeInput {
            source: vec![(5, 0, false), (5, 1, true)],
            old: vec![(5, 0, false)],
            new: vec![(5, 0, false), (5, 3, false)],
        },
        UpgradeInput {
            source: vec![(-1, 2, true), (-17, 2, false)],
            old: vec![],
            new: vec![(-1, 2, true)],
        },
        UpgradeInput {
            source: vec![],
            old: vec![(3, 1, false), (3, 1, false)],
            new: vec![(3, 1, false)],
        },
    ];
    for input in &inputs {
        test_upgrade_input(input);
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_run_based_diff_scenarios() {
    let own = int_table("T", &[(1, 10)]);
    let other = int_table("T", &[(1, 10), (1, 20)]);
    assert!(changed_row_ids(own.rows(), other.rows()).is_empty());

    let own = int_table("T", &[(2, 5)]);
    assert_eq!(refresh_all(&own, None), DiffState::Unavailable);
    let empty = int_table("T", &[]);
    assert_eq!(
        refresh_all(&own, Some(&empty)).is_changed(2),
        Some(true)
    );
}

#[test]
fn test_end_to_end_merge() {
    let old = int_table("T", &[(1, 1)]);
    let source = int_table("T", &[(1, 1), (2, 9)]);
    let new = int_table("T", &[(1, 2), (3, 7)]);
    let upgrade = upgrade_table(&source, &old, &new).unwrap();
    assert!(upgrade.conflicts().is_empty());
    assert_eq!(upgrade.into_table(&new), int_table("T", &[(1, 2), (2, 9), (3, 7)]));
}

#[test]
fn test_duplicate_ids_pair_positionally() {
    let old = named_table("T", &[(5, "A", 1), (5, "B", 2)]);
    let source = named_table("T", &[(5, "A", 1), (5, "C", 3)]);
    let new = named_table("T", &[(5, "A'", 10)]);
    let TableUpgrade::Merged(merged) = upgrade_table(&source, &old, &new).unwrap() else {
        panic!("the user modified a row");
    };
    assert_eq!(merged.table, named_table("T", &[(5, "A'", 10), (5, "C", 3)]));
    check_upgrade_properties(&source, &old, &new);
}

#[test]
fn test_untouched_rows_follow_new_baseline() {
    let old = named_table("T", &[(1, "a", 1), (2, "b", 2), (3, "c", 3)]);
    let source = named_table("T", &[(1, "a", 1), (2, "bee", 2), (3, "c", 30)]);
    let new = named_table("T", &[(1, "a", 100), (2, "b", 200), (3, "c", 300)]);
    let upgrade = upgrade_table(&source, &old, &new).unwrap();
    assert_eq!(
        upgrade.into_table(&new),
        named_table("T", &[(1, "a", 100), (2, "bee", 200), (3, "c", 30)])
    );
}
