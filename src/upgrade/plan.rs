//! Planning phase: classify every user row against the old baseline.
//!
//! The source rows are bucketed by id into an ordered pool of pending adds.
//! Walking the old baseline, each row pops the front of its id's queue:
//!
//! | Pool for id | Cells equal | Names equal | Classification |
//! |-------------|-------------|-------------|----------------|
//! | empty       | -           | -           | `Delete`       |
//! | row         | yes         | yes         | `Match`        |
//! | row         | yes         | no          | `NameChange`   |
//! | row         | no          | -           | `Modify`       |
//!
//! Whatever is left in the pool afterwards was introduced by the user: `Add`.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashMap;

use crate::table::{Row, RowId, Table, rows_equal};

/// Classification tag of a user/old-baseline pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EditKind {
    /// The user introduced a row with no old-baseline counterpart.
    Add,
    /// The user removed an old-baseline row.
    Delete,
    /// The user changed the row's cell data.
    Modify,
    /// The user only renamed the row.
    NameChange,
    /// The user left the row untouched.
    Match,
}

/// A classification together with what assembly needs to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp<'a> {
    /// See [`EditKind::Delete`].
    Delete,
    /// See [`EditKind::Modify`]; carries the user's row.
    Modify(&'a Row),
    /// See [`EditKind::NameChange`]; carries the user's name.
    NameChange(Option<&'a str>),
    /// See [`EditKind::Match`].
    Match,
}

impl EditOp<'_> {
    /// The tag of this operation.
    #[must_use]
    pub fn kind(&self) -> EditKind {
        match self {
            EditOp::Delete => EditKind::Delete,
            EditOp::Modify(_) => EditKind::Modify,
            EditOp::NameChange(_) => EditKind::NameChange,
            EditOp::Match => EditKind::Match,
        }
    }
}

/// Number of rows per classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EditStats {
    /// Rows the user added.
    pub added: usize,
    /// Old-baseline rows the user deleted.
    pub deleted: usize,
    /// Rows whose data the user changed.
    pub modified: usize,
    /// Rows the user only renamed.
    pub renamed: usize,
    /// Rows the user left untouched.
    pub matched: usize,
}

impl EditStats {
    /// Count of `kind`.
    #[must_use]
    pub fn count(&self, kind: EditKind) -> usize {
        match kind {
            EditKind::Add => self.added,
            EditKind::Delete => self.deleted,
            EditKind::Modify => self.modified,
            EditKind::NameChange => self.renamed,
            EditKind::Match => self.matched,
        }
    }

    /// Returns true if the user made no change at all.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.added == 0 && self.deleted == 0 && self.modified == 0 && self.renamed == 0
    }

    fn record(&mut self, kind: EditKind) {
        match kind {
            EditKind::Add => self.added += 1,
            EditKind::Delete => self.deleted += 1,
            EditKind::Modify => self.modified += 1,
            EditKind::NameChange => self.renamed += 1,
            EditKind::Match => self.matched += 1,
        }
    }
}

/// Per-id classifications of a user table against its old baseline.
#[derive(Debug, Clone)]
pub struct UpgradePlan<'a> {
    /// Classifications of old-baseline rows, in old-baseline order per id.
    pub(super) ops: HashMap<RowId, VecDeque<EditOp<'a>>>,
    /// Rows the user added, ascending by id, source order within an id.
    pub(super) added: BTreeMap<RowId, VecDeque<&'a Row>>,
    pub(super) stats: EditStats,
}

impl<'a> UpgradePlan<'a> {
    /// Classify `source` against `old`.
    #[must_use]
    pub fn new(source: &'a Table, old: &'a Table) -> Self {
        let mut pending: BTreeMap<RowId, VecDeque<&'a Row>> = BTreeMap::new();
        for row in source.rows() {
            pending.entry(row.id()).or_default().push_back(row);
        }

        let mut ops: HashMap<RowId, VecDeque<EditOp<'a>>> = HashMap::new();
        let mut stats = EditStats::default();

        for old_row in old.rows() {
            let id = old_row.id();
            let op = match pending.get_mut(&id).and_then(VecDeque::pop_front) {
                None => EditOp::Delete,
                Some(user_row) if !rows_equal(user_row, old_row) => EditOp::Modify(user_row),
                Some(user_row) if user_row.name() == old_row.name() => EditOp::Match,
                Some(user_row) => EditOp::NameChange(user_row.name()),
            };
            if pending.get(&id).is_some_and(VecDeque::is_empty) {
                pending.remove(&id);
            }
            stats.record(op.kind());
            ops.entry(id).or_default().push_back(op);
        }

        stats.added = pending.values().map(VecDeque::len).sum();

        Self {
            ops,
            added: pending,
            stats,
        }
    }

    /// Row counts per classification.
    #[must_use]
    pub fn stats(&self) -> EditStats {
        self.stats
    }

    /// Returns true if the user table is unmodified relative to the old
    /// baseline, so the upgrade result is the new baseline itself.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stats.is_untouched()
    }

    /// The classifications queued for `id`, in old-baseline order. Adds are
    /// not included; see [`UpgradePlan::added_rows`].
    #[must_use]
    pub fn ops_for(&self, id: RowId) -> Vec<EditKind> {
        self.ops
            .get(&id)
            .map(|queue| queue.iter().map(EditOp::kind).collect())
            .unwrap_or_default()
    }

    /// The rows the user added, ascending by id.
    pub fn added_rows(&self) -> impl Iterator<Item = &'a Row> + '_ {
        self.added.values().flat_map(|queue| queue.iter().copied())
    }
}
