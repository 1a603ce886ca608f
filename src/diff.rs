//! Changed-row tracking between a bank and a comparison bank.
//!
//! A row id is *changed* when at least one own row carrying it has no
//! structurally equal counterpart among the comparison rows with the same id.
//! Rows are compared run against run, never positionally, because ids repeat
//! in practice and a duplicate added by the user must not be flagged against
//! an unrelated duplicate.

mod cache;
mod runs;

pub use cache::DiffCache;
pub use runs::{changed_row_ids, refresh_all, row_id_changed};

use hashbrown::HashSet;

use crate::table::RowId;

/// Result of comparing one table against a comparison bank.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DiffState {
    /// No diff can be shown: the comparison bank is not loaded, lacks the
    /// table, or stores it with another layout. Consumers must not render
    /// this as "unchanged".
    #[default]
    Unavailable,
    /// The set of row ids judged changed.
    Ready(HashSet<RowId>),
}

impl DiffState {
    /// Returns whether `id` is changed, or `None` if no diff is available.
    #[must_use]
    pub fn is_changed(&self, id: RowId) -> Option<bool> {
        match self {
            DiffState::Unavailable => None,
            DiffState::Ready(ids) => Some(ids.contains(&id)),
        }
    }

    /// Returns true if a diff has been computed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, DiffState::Ready(_))
    }

    /// The changed ids, if available.
    #[must_use]
    pub fn changed_ids(&self) -> Option<&HashSet<RowId>> {
        match self {
            DiffState::Unavailable => None,
            DiffState::Ready(ids) => Some(ids),
        }
    }

    /// Number of changed ids, if available.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.changed_ids().map(HashSet::len)
    }
}
