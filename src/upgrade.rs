//! Three-way upgrade merge of a user table onto a newer baseline.
//!
//! Given the user's table (`source`), the baseline it was derived from
//! (`old`) and the baseline being upgraded to (`new`), the merge keeps the
//! new baseline's order and content for every row the user never touched,
//! and the user's content for every row the user added, modified or renamed.
//!
//! # Policy
//!
//! | Classification | New baseline has the id | Emitted row |
//! |----------------|-------------------------|-------------|
//! | `Match`        | yes                     | new baseline row |
//! | `NameChange`   | yes                     | new baseline data, user name |
//! | `Modify`       | yes / no                | user row |
//! | `Delete`       | yes                     | nothing |
//! | `Add`          | no                      | user row, before the next greater id |
//! | `Add`          | yes, unclassified       | user row, reported as a [`RowConflict`] |
//! | none           | yes                     | new baseline row |
//!
//! # Example
//!
//! ```
//! use param_diff_rs::{ColumnDef, ColumnType, Row, Table, TableSchema, TableUpgrade, upgrade_table};
//!
//! let schema = TableSchema::shared("T", vec![ColumnDef::new("v", ColumnType::S32)]);
//! let table = |rows: &[(i32, i32)]| {
//!     let rows = rows.iter().map(|&(id, v)| Row::new(id, None, vec![v.into()])).collect();
//!     Table::from_rows("T", schema.clone(), rows).unwrap()
//! };
//!
//! let old = table(&[(1, 1)]);
//! let source = table(&[(1, 1), (2, 9)]);
//! let new = table(&[(1, 2), (3, 7)]);
//!
//! let TableUpgrade::Merged(merged) = upgrade_table(&source, &old, &new).unwrap() else {
//!     panic!("the user added a row");
//! };
//! assert_eq!(merged.table, table(&[(1, 2), (2, 9), (3, 7)]));
//! assert!(merged.conflicts.is_empty());
//! ```

mod assembly;
mod plan;

pub use plan::{EditKind, EditOp, EditStats, UpgradePlan};

use crate::errors::Error;
use crate::table::{Row, RowId, Table};

/// A row id both the user and the new baseline introduced independently.
///
/// The user's row is the one kept in the merged table; the new baseline's
/// row is retained here for review.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RowConflict {
    /// The contested id.
    pub row_id: RowId,
    /// The user's row, as emitted.
    pub user_row: Row,
    /// The new baseline's row that was overridden.
    pub baseline_row: Row,
}

/// Output of a merge that had user changes to carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTable {
    /// The merged table, with the new baseline's name and schema.
    pub table: Table,
    /// Add/Add collisions, in emission order.
    pub conflicts: Vec<RowConflict>,
    /// Classification counts from the planning phase.
    pub stats: EditStats,
    /// New baseline rows emitted with no user classification at all.
    pub inherited: usize,
    /// User modifications kept although the new baseline removed the row.
    pub kept_modified: usize,
}

/// Result of upgrading a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableUpgrade {
    /// The user table is unmodified relative to the old baseline: the new
    /// baseline is the result as is.
    NoOp(EditStats),
    /// User changes were merged onto the new baseline.
    Merged(MergedTable),
}

impl TableUpgrade {
    /// The resulting table, cloning `new` for a no-op.
    #[must_use]
    pub fn into_table(self, new: &Table) -> Table {
        match self {
            TableUpgrade::NoOp(_) => new.clone(),
            TableUpgrade::Merged(merged) => merged.table,
        }
    }

    /// The conflicts of this upgrade.
    #[must_use]
    pub fn conflicts(&self) -> &[RowConflict] {
        match self {
            TableUpgrade::NoOp(_) => &[],
            TableUpgrade::Merged(merged) => &merged.conflicts,
        }
    }

    /// Returns true for [`TableUpgrade::NoOp`].
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, TableUpgrade::NoOp(_))
    }
}

/// Merge `source`, derived from `old`, onto `new`.
///
/// This is a pure computation over three snapshots; none of them is mutated.
///
/// # Errors
///
/// * `SchemaMismatch` - If the three tables do not share one column layout.
pub fn upgrade_table(source: &Table, old: &Table, new: &Table) -> Result<TableUpgrade, Error> {
    if !source.schema().same_layout(old.schema()) || !old.schema().same_layout(new.schema()) {
        return Err(Error::SchemaMismatch(new.name().to_owned()));
    }

    let plan = UpgradePlan::new(source, old);
    let stats = plan.stats();
    if plan.is_noop() {
        tracing::debug!(table = new.name(), "user table untouched, taking new baseline");
        return Ok(TableUpgrade::NoOp(stats));
    }

    let merged = assembly::assemble(plan, new);
    tracing::debug!(
        table = new.name(),
        added = stats.added,
        deleted = stats.deleted,
        modified = stats.modified,
        renamed = stats.renamed,
        matched = stats.matched,
        conflicts = merged.conflicts.len(),
        "merged table"
    );
    Ok(TableUpgrade::Merged(merged))
}
