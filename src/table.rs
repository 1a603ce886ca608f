//! In-memory tables: a name, a shared schema and an ordered sequence of rows.

use std::sync::Arc;

use crate::errors::Error;
use crate::schema::TableSchema;
use crate::value::Value;

mod row;

pub use row::{Row, RowId, rows_equal};

/// A named, schema-typed, ordered collection of rows.
///
/// Every row of the table holds one cell per schema column, of the column's
/// kind. The mutating methods enforce this; [`Table::from_rows`] checks it for
/// rows handed over by a loader.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table {
    name: String,
    schema: Arc<TableSchema>,
    rows: Vec<Row>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.schema.same_layout(&other.schema)
            && self.rows == other.rows
    }
}

impl Eq for Table {}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Arc<TableSchema>) -> Self {
        Self {
            name: name.into(),
            schema,
            rows: Vec::new(),
        }
    }

    /// Create a table from already decoded rows, validating each of them.
    ///
    /// # Errors
    ///
    /// * `CellCountMismatch` / `CellTypeMismatch` - If a row does not fit the schema.
    pub fn from_rows(
        name: impl Into<String>,
        schema: Arc<TableSchema>,
        rows: Vec<Row>,
    ) -> Result<Self, Error> {
        for row in &rows {
            schema.validate_cells(row.cells())?;
        }
        Ok(Self {
            name: name.into(),
            schema,
            rows,
        })
    }

    /// Build a table from rows whose cells were taken from tables of the same
    /// layout, skipping validation.
    pub(crate) fn from_trusted_rows(name: String, schema: Arc<TableSchema>, rows: Vec<Row>) -> Self {
        Self { name, schema, rows }
    }

    /// The table name, unique within a bank.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared schema.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// The rows in table order.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the row at `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Iterate over every row carrying `id`, in table order.
    pub fn rows_with_id(&self, id: RowId) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| row.id() == id)
    }

    /// Index of the first row carrying `id`.
    #[must_use]
    pub fn index_of_id(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|row| row.id() == id)
    }

    /// The rows ordered by id. Rows sharing an id keep their table order.
    #[must_use]
    pub fn sorted_by_id(&self) -> Vec<&Row> {
        let mut sorted: Vec<&Row> = self.rows.iter().collect();
        sorted.sort_by_key(|row| row.id());
        sorted
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the row does not fit the schema.
    pub fn push_row(&mut self, row: Row) -> Result<(), Error> {
        self.schema.validate_cells(row.cells())?;
        self.rows.push(row);
        Ok(())
    }

    /// Insert a row at `index`, shifting later rows.
    ///
    /// # Errors
    ///
    /// * `RowIndexOutOfBounds` - If `index > len()`.
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the row does not fit the schema.
    pub fn insert_row(&mut self, index: usize, row: Row) -> Result<(), Error> {
        if index > self.rows.len() {
            return Err(Error::RowIndexOutOfBounds(index, self.rows.len()));
        }
        self.schema.validate_cells(row.cells())?;
        self.rows.insert(index, row);
        Ok(())
    }

    /// Replace the row at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// * `RowIndexOutOfBounds` - If there is no row at `index`.
    /// * `CellCountMismatch` / `CellTypeMismatch` - If the row does not fit the schema.
    pub fn replace_row(&mut self, index: usize, row: Row) -> Result<Row, Error> {
        let len = self.rows.len();
        self.schema.validate_cells(row.cells())?;
        let slot = self
            .rows
            .get_mut(index)
            .ok_or(Error::RowIndexOutOfBounds(index, len))?;
        Ok(core::mem::replace(slot, row))
    }

    /// Remove and return the row at `index`.
    ///
    /// # Errors
    ///
    /// * `RowIndexOutOfBounds` - If there is no row at `index`.
    pub fn remove_row(&mut self, index: usize) -> Result<Row, Error> {
        if index >= self.rows.len() {
            return Err(Error::RowIndexOutOfBounds(index, self.rows.len()));
        }
        Ok(self.rows.remove(index))
    }

    /// Set one cell of the row at `index`.
    ///
    /// # Errors
    ///
    /// * `RowIndexOutOfBounds` - If there is no row at `index`.
    /// * `ColumnIndexOutOfBounds` / `CellTypeMismatch` - If the value does not fit the column.
    pub fn set_cell(&mut self, index: usize, col_idx: usize, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        self.schema.validate_cell(col_idx, &value)?;
        let len = self.rows.len();
        self.rows
            .get_mut(index)
            .ok_or(Error::RowIndexOutOfBounds(index, len))?
            .set_cell(col_idx, value)
    }
}
