//! Assembly phase: walk the new baseline and apply the plan.

use std::collections::{BTreeMap, VecDeque, btree_map::Entry};
use std::sync::Arc;

use crate::table::{Row, RowId, Table};

use super::{MergedTable, RowConflict, UpgradePlan, plan::EditOp};

/// Emit every pending add whose id is below `id`, ascending.
///
/// The pool is consumed in ascending order, so everything left in it is at
/// least the last id flushed.
fn flush_below(added: &mut BTreeMap<RowId, VecDeque<&Row>>, id: RowId, out: &mut Vec<Row>) {
    while let Some(entry) = added.first_entry() {
        if *entry.key() >= id {
            break;
        }
        out.extend(entry.remove().into_iter().cloned());
    }
}

/// Take the next pending add carrying exactly `id`.
fn pop_added<'a>(added: &mut BTreeMap<RowId, VecDeque<&'a Row>>, id: RowId) -> Option<&'a Row> {
    let Entry::Occupied(mut entry) = added.entry(id) else {
        return None;
    };
    let row = entry.get_mut().pop_front();
    if entry.get().is_empty() {
        entry.remove();
    }
    row
}

/// Merge the plan into the new baseline.
pub(super) fn assemble(plan: UpgradePlan<'_>, new: &Table) -> MergedTable {
    let UpgradePlan {
        mut ops,
        mut added,
        stats,
    } = plan;

    let mut rows = Vec::with_capacity(new.len() + stats.added);
    let mut conflicts = Vec::new();
    let mut inherited = 0;

    for base_row in new.rows() {
        let id = base_row.id();
        flush_below(&mut added, id, &mut rows);

        match ops.get_mut(&id).and_then(VecDeque::pop_front) {
            Some(EditOp::Match) => rows.push(base_row.clone()),
            Some(EditOp::Delete) => {}
            Some(EditOp::Modify(user_row)) => rows.push(user_row.clone()),
            Some(EditOp::NameChange(name)) => rows.push(base_row.with_name(name.map(str::to_owned))),
            None => match pop_added(&mut added, id) {
                Some(user_row) => {
                    tracing::warn!(table = new.name(), row_id = id, "both sides added this row id");
                    rows.push(user_row.clone());
                    conflicts.push(RowConflict {
                        row_id: id,
                        user_row: user_row.clone(),
                        baseline_row: base_row.clone(),
                    });
                }
                None => {
                    inherited += 1;
                    rows.push(base_row.clone());
                }
            },
        }
    }

    // Rows the user modified but the new baseline dropped are kept, ordered
    // with the remaining adds by id, modifications first within an id.
    let mut tail: Vec<(RowId, bool, &Row)> = Vec::new();
    for (id, queue) in ops {
        tail.extend(queue.into_iter().filter_map(|op| match op {
            EditOp::Modify(user_row) => Some((id, false, user_row)),
            _ => None,
        }));
    }
    let kept_modified = tail.len();
    for (id, queue) in added {
        tail.extend(queue.into_iter().map(|user_row| (id, true, user_row)));
    }
    tail.sort_by_key(|(id, is_add, _)| (*id, *is_add));
    rows.extend(tail.into_iter().map(|(_, _, row)| row.clone()));

    if kept_modified > 0 {
        tracing::debug!(
            table = new.name(),
            rows = kept_modified,
            "kept user modifications of rows removed by the new baseline"
        );
    }

    MergedTable {
        table: Table::from_trusted_rows(new.name().to_owned(), Arc::clone(new.schema()), rows),
        conflicts,
        stats,
        inherited,
        kept_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn row(id: RowId) -> Row {
        Row::new(id, None, vec![Value::S32(id)])
    }

    #[test]
    fn test_flush_below_is_exclusive() {
        let (a, b, c) = (row(1), row(2), row(3));
        let mut added: BTreeMap<RowId, VecDeque<&Row>> = BTreeMap::new();
        for r in [&a, &b, &c] {
            added.entry(r.id()).or_default().push_back(r);
        }
        let mut out = Vec::new();
        flush_below(&mut added, 3, &mut out);
        assert_eq!(out.iter().map(Row::id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(added.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_pop_added_drains_queue() {
        let (a, b) = (row(4), Row::new(4, Some("second".into()), vec![Value::S32(0)]));
        let mut added: BTreeMap<RowId, VecDeque<&Row>> = BTreeMap::new();
        added.entry(4).or_default().extend([&a, &b]);
        assert_eq!(pop_added(&mut added, 4), Some(&a));
        assert_eq!(pop_added(&mut added, 4), Some(&b));
        assert!(added.is_empty());
        assert_eq!(pop_added(&mut added, 4), None);
    }
}
