//! Diff fuzzer: the run-based merge scan must agree with a per-id brute force.

use honggfuzz::fuzz;
use param_diff_rs::testing::UpgradeInput;
use param_diff_rs::{Row, changed_row_ids, rows_equal};

fn main() {
    loop {
        fuzz!(|input: UpgradeInput| {
            let (own, other, _) = input.tables();
            let changed = changed_row_ids(own.rows(), other.rows());
            for row in own.rows() {
                let expected = own.rows_with_id(row.id()).any(|mine: &Row| {
                    !other.rows_with_id(row.id()).any(|theirs| rows_equal(mine, theirs))
                });
                assert_eq!(changed.contains(&row.id()), expected, "row id {}", row.id());
            }
            assert!(changed.iter().all(|id| own.index_of_id(*id).is_some()));
        });
    }
}
