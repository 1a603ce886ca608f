//! A single record of a table.

use crate::errors::Error;
use crate::value::Value;

/// Row identifier. Not unique within a table and not necessarily sorted.
pub type RowId = i32;

/// One record: an identifier, an optional display name and one cell per column.
///
/// Rows are owned by exactly one [`Table`](crate::Table). Merging never moves
/// a row between tables: it builds a fresh row for the destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "testing", derive(arbitrary::Arbitrary))]
pub struct Row {
    id: RowId,
    name: Option<String>,
    cells: Vec<Value>,
}

impl Row {
    /// Create a row. Cells are not checked against any schema here; use
    /// [`Table::push_row`](crate::Table::push_row) for validated insertion.
    #[must_use]
    pub fn new(id: RowId, name: Option<String>, cells: Vec<Value>) -> Self {
        Self { id, name, cells }
    }

    /// The row identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// The display name, if any.
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The cell values in schema order.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Value] {
        &self.cells
    }

    /// Get the value at column `col_idx`.
    #[must_use]
    pub fn cell(&self, col_idx: usize) -> Option<&Value> {
        self.cells.get(col_idx)
    }

    /// Change the row identifier.
    pub fn set_id(&mut self, id: RowId) {
        self.id = id;
    }

    /// Change the display name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Sets the value for a specific column by index.
    ///
    /// # Errors
    ///
    /// * `ColumnIndexOutOfBounds` - If the provided column index is out of bounds for the row.
    pub fn set_cell(&mut self, col_idx: usize, value: impl Into<Value>) -> Result<(), Error> {
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(col_idx)
            .ok_or(Error::ColumnIndexOutOfBounds(col_idx, len))?;
        *cell = value.into();
        Ok(())
    }

    /// Structural equality of the cell data, ignoring the row id and name.
    #[inline]
    #[must_use]
    pub fn data_eq(&self, other: &Self) -> bool {
        rows_equal(self, other)
    }

    /// A copy of this row carrying `name` instead of its own.
    #[must_use]
    pub fn with_name(&self, name: Option<String>) -> Self {
        Self {
            id: self.id,
            name,
            cells: self.cells.clone(),
        }
    }
}

/// Returns true iff every cell of `a` equals the corresponding cell of `b`.
///
/// The display name is excluded: renames are tracked separately from data
/// changes. Both rows must come from tables of the same layout.
#[must_use]
pub fn rows_equal(a: &Row, b: &Row) -> bool {
    debug_assert_eq!(a.cells.len(), b.cells.len(), "rows of different layouts");
    a.cells == b.cells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_equal_ignores_name() {
        let a = Row::new(1, Some("Dagger".into()), vec![Value::S32(10)]);
        let b = Row::new(1, Some("Knife".into()), vec![Value::S32(10)]);
        assert!(rows_equal(&a, &b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_rows_equal_detects_cell_change() {
        let a = Row::new(1, None, vec![Value::S32(10), Value::F32(1.0)]);
        let b = Row::new(1, None, vec![Value::S32(10), Value::F32(1.5)]);
        assert!(!a.data_eq(&b));
    }

    #[test]
    fn test_set_cell_bounds() {
        let mut row = Row::new(7, None, vec![Value::U8(0)]);
        row.set_cell(0, 5u8).unwrap();
        assert_eq!(row.cell(0), Some(&Value::U8(5)));
        assert_eq!(row.set_cell(1, 5u8), Err(Error::ColumnIndexOutOfBounds(1, 1)));
    }

    #[test]
    fn test_with_name_keeps_data() {
        let row = Row::new(3, None, vec![Value::from("x")]);
        let renamed = row.with_name(Some("Named".into()));
        assert_eq!(renamed.name(), Some("Named"));
        assert!(rows_equal(&row, &renamed));
        assert_eq!(renamed.id(), 3);
    }
}
