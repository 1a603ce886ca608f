//! Run-based row comparison.

use hashbrown::HashSet;

use crate::table::{Row, RowId, Table, rows_equal};

use super::DiffState;

/// Length of the leading run of rows carrying `id`.
#[inline]
fn run_len(rows: &[&Row], id: RowId) -> usize {
    rows.iter().take_while(|row| row.id() == id).count()
}

/// Sort rows by id, keeping table order among equal ids.
fn sorted(rows: &[Row]) -> Vec<&Row> {
    let mut sorted: Vec<&Row> = rows.iter().collect();
    sorted.sort_by_key(|row| row.id());
    sorted
}

/// Returns true if some row of `own_run` has no equal row in `other_run`.
///
/// Both slices hold rows of a single id. An empty `other_run` marks every own
/// row changed; an empty `own_run` is never changed.
#[must_use]
pub fn row_id_changed(own_run: &[&Row], other_run: &[&Row]) -> bool {
    own_run
        .iter()
        .any(|own| !other_run.iter().any(|other| rows_equal(own, other)))
}

/// Compute the ids of `own` whose rows differ from `other`.
///
/// Both sides are sorted by id (stable), then merge-scanned run by run.
#[must_use]
pub fn changed_row_ids(own: &[Row], other: &[Row]) -> HashSet<RowId> {
    let own = sorted(own);
    let other = sorted(other);
    let mut changed = HashSet::new();

    let mut i = 0;
    let mut j = 0;
    while i < own.len() {
        let id = own[i].id();
        let own_end = i + run_len(&own[i..], id);

        while j < other.len() && other[j].id() < id {
            j += 1;
        }
        let other_end = j + run_len(&other[j..], id);

        if row_id_changed(&own[i..own_end], &other[j..other_end]) {
            changed.insert(id);
        }

        i = own_end;
        j = other_end;
    }

    changed
}

/// Compute the diff of `own` against the same-named table of a comparison bank.
///
/// A missing comparison table, or one stored with a different layout, yields
/// [`DiffState::Unavailable`] rather than an error.
#[must_use]
pub fn refresh_all(own: &Table, other: Option<&Table>) -> DiffState {
    match other {
        Some(other) if own.schema().same_layout(other.schema()) => {
            DiffState::Ready(changed_row_ids(own.rows(), other.rows()))
        }
        Some(other) => {
            tracing::debug!(
                table = own.name(),
                own_layout = own.schema().type_name(),
                other_layout = other.schema().type_name(),
                "layouts differ, diff unavailable"
            );
            DiffState::Unavailable
        }
        None => DiffState::Unavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, TableSchema};
    use crate::value::Value;

    fn row(id: RowId, a: i32) -> Row {
        Row::new(id, None, vec![Value::S32(a)])
    }

    fn table(rows: Vec<Row>) -> Table {
        let schema = TableSchema::shared("T", vec![ColumnDef::new("a", ColumnType::S32)]);
        Table::from_rows("T", schema, rows).unwrap()
    }

    fn ids(set: &HashSet<RowId>) -> Vec<RowId> {
        let mut ids: Vec<_> = set.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_own_row_matches_one_of_duplicates() {
        let changed = changed_row_ids(&[row(1, 10)], &[row(1, 10), row(1, 20)]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_absent_id_is_changed() {
        let changed = changed_row_ids(&[row(1, 10), row(2, 5)], &[row(1, 10)]);
        assert_eq!(ids(&changed), vec![2]);
    }

    #[test]
    fn test_added_duplicate_is_changed() {
        // The extra id-3 row equals neither other row with id 3.
        let changed = changed_row_ids(&[row(3, 1), row(3, 99)], &[row(3, 1), row(3, 2)]);
        assert_eq!(ids(&changed), vec![3]);
    }

    #[test]
    fn test_duplicates_compared_as_runs_not_positions() {
        // Same multiset in swapped order: no change.
        let changed = changed_row_ids(&[row(3, 2), row(3, 1)], &[row(3, 1), row(3, 2)]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_unsorted_inputs() {
        let own = [row(9, 0), row(-4, 1), row(5, 7)];
        let other = [row(5, 8), row(9, 0), row(-4, 1)];
        assert_eq!(ids(&changed_row_ids(&own, &other)), vec![5]);
    }

    #[test]
    fn test_rows_missing_from_own_are_not_reported() {
        let changed = changed_row_ids(&[row(2, 2)], &[row(1, 1), row(2, 2), row(3, 3)]);
        assert!(changed.is_empty());
    }

    #[test]
    fn test_row_id_changed() {
        let a = row(1, 1);
        let b = row(1, 2);
        assert!(!row_id_changed(&[&a], &[&b, &a]));
        assert!(row_id_changed(&[&a, &b], &[&a]));
        assert!(row_id_changed(&[&a], &[]));
        assert!(!row_id_changed(&[], &[&a]));
    }

    #[test]
    fn test_refresh_all_missing_table_is_unavailable() {
        let own = table(vec![row(2, 5)]);
        assert_eq!(refresh_all(&own, None), DiffState::Unavailable);
    }

    #[test]
    fn test_refresh_all_layout_mismatch_is_unavailable() {
        let own = table(vec![row(2, 5)]);
        let schema = TableSchema::shared("T", vec![ColumnDef::new("a", ColumnType::U32)]);
        let other = Table::from_rows("T", schema, vec![Row::new(2, None, vec![Value::U32(5)])]).unwrap();
        assert_eq!(refresh_all(&own, Some(&other)), DiffState::Unavailable);
    }

    #[test]
    fn test_refresh_all_ready() {
        let own = table(vec![row(1, 1), row(2, 5)]);
        let other = table(vec![row(1, 1), row(2, 6)]);
        let state = refresh_all(&own, Some(&other));
        assert_eq!(state.is_changed(2), Some(true));
        assert_eq!(state.is_changed(1), Some(false));
    }
}
