//! Banks: named sets of tables representing one version of the data.
//!
//! A registry holds one editable *primary* bank (the user's working copy),
//! one read-only *vanilla* bank (the unmodified baseline) and any number of
//! read-only *auxiliary* banks used for comparison.

mod cancel;
mod registry;
mod report;
mod source;

pub use cancel::CancelToken;
pub use registry::{BankRegistry, Comparison, LoadSummary};
pub use report::{TableOutcome, TableReport, UpgradeReport};
pub use source::{TableSink, TableSource};

use core::fmt;

use crate::errors::{Error, LoadError};
use crate::table::Table;

/// `IndexMap` alias using hashbrown's default hasher, as elsewhere in the crate.
pub(crate) type IndexMap<K, V> = indexmap::IndexMap<K, V, hashbrown::DefaultHashBuilder>;

/// Identifies a bank within a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BankId {
    /// The user's working copy.
    Primary,
    /// The unmodified baseline.
    Vanilla,
    /// A third-party comparison copy.
    Auxiliary(String),
}

impl BankId {
    /// Lock acquisition rank: primary, then vanilla, then auxiliaries.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            BankId::Primary => 0,
            BankId::Vanilla => 1,
            BankId::Auxiliary(_) => 2,
        }
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankId::Primary => write!(f, "primary"),
            BankId::Vanilla => write!(f, "vanilla"),
            BankId::Auxiliary(name) => write!(f, "aux:{name}"),
        }
    }
}

/// Opaque version identifier of a loaded bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionTag(String);

impl VersionTag {
    /// Create a version tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Load state of a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BankState {
    /// No tables are available.
    #[default]
    Unloaded,
    /// Tables are being loaded; nothing is exposed yet.
    Loading,
    /// Tables are available.
    Loaded,
}

/// A set of tables representing one version of the data.
#[derive(Debug, Clone)]
pub struct Bank {
    id: BankId,
    state: BankState,
    version: Option<VersionTag>,
    origin: Option<VersionTag>,
    tables: IndexMap<String, Table>,
    skipped: Vec<String>,
}

impl Bank {
    /// An unloaded, empty bank.
    #[must_use]
    pub fn new(id: BankId) -> Self {
        Self {
            id,
            state: BankState::Unloaded,
            version: None,
            origin: None,
            tables: IndexMap::default(),
            skipped: Vec::new(),
        }
    }

    /// A loaded bank holding `tables`, keyed by their names.
    #[must_use]
    pub fn from_tables(id: BankId, version: VersionTag, tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            id,
            state: BankState::Loaded,
            version: Some(version),
            origin: None,
            tables: tables
                .into_iter()
                .map(|table| (table.name().to_owned(), table))
                .collect(),
            skipped: Vec::new(),
        }
    }

    /// Record the baseline version this bank derives from.
    #[must_use]
    pub fn with_origin(mut self, origin: VersionTag) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Load every table of `id` from `source`.
    ///
    /// Tables whose schema is missing are skipped and listed in
    /// [`Bank::skipped_tables`]; any other failure aborts the load.
    ///
    /// # Errors
    ///
    /// * `Cancelled` - If `cancel` fires between two tables.
    /// * `Load` - If the source fails to list, version or read the bank.
    pub fn load(id: BankId, source: &dyn TableSource, cancel: &CancelToken) -> Result<Self, Error> {
        let version = source.version(&id)?;
        let origin = source.origin_version(&id)?;
        let names = source.table_names(&id)?;

        let mut bank = Self::new(id);
        for name in names {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match source.load_table(&bank.id, &name) {
                Ok(table) => {
                    bank.tables.insert(name, table);
                }
                Err(LoadError::SchemaMissing(_)) => {
                    tracing::warn!(bank = %bank.id, table = %name, "no schema, table skipped");
                    bank.skipped.push(name);
                }
                Err(err) => return Err(err.into()),
            }
        }

        bank.state = BankState::Loaded;
        bank.version = Some(version);
        bank.origin = origin;
        Ok(bank)
    }

    /// The bank identifier.
    #[must_use]
    pub fn id(&self) -> &BankId {
        &self.id
    }

    /// The load state.
    #[must_use]
    pub fn state(&self) -> BankState {
        self.state
    }

    /// Returns true if the bank is loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == BankState::Loaded
    }

    /// The version of the loaded data.
    #[must_use]
    pub fn version(&self) -> Option<&VersionTag> {
        self.version.as_ref()
    }

    /// The baseline version this bank derives from, if recorded.
    #[must_use]
    pub fn origin(&self) -> Option<&VersionTag> {
        self.origin.as_ref()
    }

    /// Get a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// The tables, in load order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// The table names, in load order.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if the bank holds no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables skipped during load for lack of a schema.
    #[must_use]
    pub fn skipped_tables(&self) -> &[String] {
        &self.skipped
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub(crate) fn take_tables(&mut self) -> IndexMap<String, Table> {
        core::mem::take(&mut self.tables)
    }

    pub(crate) fn set_tables(&mut self, tables: IndexMap<String, Table>) {
        self.tables = tables;
    }

    pub(crate) fn set_origin(&mut self, origin: Option<VersionTag>) {
        self.origin = origin;
    }

    pub(crate) fn into_id(mut self, id: BankId) -> Self {
        self.id = id;
        self
    }

    /// Reset to an empty bank in `state`.
    pub(crate) fn clear(&mut self, state: BankState) {
        self.state = state;
        self.version = None;
        self.origin = None;
        self.tables.clear();
        self.skipped.clear();
    }
}
