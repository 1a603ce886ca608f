//! Outcome of a bank-level upgrade.

use crate::errors::Error;
use crate::table::RowId;
use crate::upgrade::{EditStats, RowConflict};

use super::VersionTag;

/// What happened to one table during an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// User changes were merged onto the new baseline.
    Merged {
        /// Add/Add collisions; the user's rows were kept.
        conflicts: Vec<RowConflict>,
        /// Classification counts.
        stats: EditStats,
    },
    /// The user never touched the table; the new baseline replaced it.
    Unmodified(EditStats),
    /// The table is new to the primary bank and was taken verbatim.
    Adopted,
    /// The new baseline lacks the table; the primary's copy was kept.
    Retained,
    /// The table could not be merged; the primary's copy was kept.
    Failed(Error),
}

/// Outcome of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    /// Table name.
    pub name: String,
    /// What happened to it.
    pub outcome: TableOutcome,
}

impl TableReport {
    /// Returns true if the primary's table content was replaced.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(
            self.outcome,
            TableOutcome::Merged { .. } | TableOutcome::Unmodified(_) | TableOutcome::Adopted
        )
    }
}

/// Per-table outcomes of [`BankRegistry::upgrade`](crate::BankRegistry::upgrade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Baseline version the primary derived from before the upgrade.
    pub from: Option<VersionTag>,
    /// Baseline version the primary derives from now.
    pub to: Option<VersionTag>,
    /// One entry per table, new-baseline tables first.
    pub tables: Vec<TableReport>,
}

impl UpgradeReport {
    /// Every conflict as `(table, row id)`, in table order.
    #[must_use]
    pub fn conflicts(&self) -> Vec<(&str, RowId)> {
        self.row_conflicts()
            .map(|(table, conflict)| (table, conflict.row_id))
            .collect()
    }

    /// Every conflict with both contested rows.
    pub fn row_conflicts(&self) -> impl Iterator<Item = (&str, &RowConflict)> {
        self.tables.iter().flat_map(|report| {
            let conflicts: &[RowConflict] = match &report.outcome {
                TableOutcome::Merged { conflicts, .. } => conflicts,
                _ => &[],
            };
            conflicts.iter().map(move |conflict| (report.name.as_str(), conflict))
        })
    }

    /// Tables that failed, with their error.
    #[must_use]
    pub fn failed(&self) -> Vec<(&str, &Error)> {
        self.tables
            .iter()
            .filter_map(|report| match &report.outcome {
                TableOutcome::Failed(err) => Some((report.name.as_str(), err)),
                _ => None,
            })
            .collect()
    }

    /// Returns true if no table carried user changes: the upgrade amounts to
    /// taking the new baseline.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.tables.iter().all(|report| {
            matches!(
                report.outcome,
                TableOutcome::Unmodified(_) | TableOutcome::Adopted | TableOutcome::Retained
            )
        })
    }

    /// Names of the tables whose primary content was replaced.
    #[must_use]
    pub fn changed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|report| report.is_changed())
            .map(|report| report.name.as_str())
            .collect()
    }

    /// The outcome of `table`, if it was part of the upgrade.
    #[must_use]
    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|report| report.name == table)
            .map(|report| &report.outcome)
    }
}
