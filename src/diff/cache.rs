//! Per-relationship cache of changed row ids.

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::table::{Row, RowId};

use super::{DiffState, row_id_changed};

/// Changed-row sets of every table of one bank against one comparison bank.
///
/// The cache is either absent (never computed, or invalidated because one
/// side started loading) or fully consistent with both sides. Every mutation
/// happens under the write guard, so readers never observe a half-updated
/// set.
#[derive(Debug, Default)]
pub struct DiffCache {
    tables: RwLock<Option<HashMap<String, DiffState>>>,
}

impl DiffCache {
    /// Create an absent cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the cache holds a computed diff.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.tables.read().is_some()
    }

    /// Drop every cached set.
    pub fn invalidate(&self) {
        *self.tables.write() = None;
    }

    /// Install a wholesale recomputed diff.
    pub fn replace_all(&self, tables: HashMap<String, DiffState>) {
        *self.tables.write() = Some(tables);
    }

    /// The diff state of `table`. Absent caches and unknown tables report
    /// [`DiffState::Unavailable`].
    #[must_use]
    pub fn state(&self, table: &str) -> DiffState {
        self.tables
            .read()
            .as_ref()
            .and_then(|tables| tables.get(table).cloned())
            .unwrap_or_default()
    }

    /// Whether row `id` of `table` is changed, or `None` if unavailable.
    #[must_use]
    pub fn is_changed(&self, table: &str, id: RowId) -> Option<bool> {
        self.tables
            .read()
            .as_ref()
            .and_then(|tables| tables.get(table))
            .and_then(|state| state.is_changed(id))
    }

    /// Recompute the membership of a single id after an edit.
    ///
    /// `own_run` holds every own row currently carrying `id`, `other_run`
    /// every comparison row carrying it. Absent caches and tables whose diff
    /// is unavailable are left as they are. Returns the new membership, if
    /// the table has an available diff.
    pub fn refresh_one(
        &self,
        table: &str,
        id: RowId,
        own_run: &[&Row],
        other_run: &[&Row],
    ) -> Option<bool> {
        let mut guard = self.tables.write();
        let Some(DiffState::Ready(ids)) = guard.as_mut().and_then(|tables| tables.get_mut(table))
        else {
            return None;
        };
        let changed = row_id_changed(own_run, other_run);
        if changed {
            ids.insert(id);
        } else {
            ids.remove(&id);
        }
        Some(changed)
    }
}
