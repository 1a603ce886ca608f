//! Column layout of a table.
//!
//! A [`TableSchema`] is supplied by the external schema loader and never
//! changes for the lifetime of the tables using it. Tables hold it behind an
//! [`Arc`] so that the primary, baseline and auxiliary copies of a table can
//! share one definition.

use std::sync::Arc;

use crate::errors::Error;
use crate::value::Value;

use super::{ColumnDef, ColumnType};

/// An ordered list of typed columns.
///
/// # Example
///
/// ```
/// use param_diff_rs::{ColumnDef, ColumnType, TableSchema};
///
/// let schema = TableSchema::new(
///     "EQUIP_PARAM_WEAPON_ST",
///     vec![
///         ColumnDef::new("weight", ColumnType::F32),
///         ColumnDef::new("sortId", ColumnType::S32),
///     ],
/// );
/// assert_eq!(schema.number_of_columns(), 2);
/// assert_eq!(schema.column_index("sortId"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TableSchema {
    /// Identifier of the layout (the definition name, not the table name).
    type_name: String,
    /// Columns in storage order.
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Create a new schema.
    #[must_use]
    pub fn new(type_name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            type_name: type_name.into(),
            columns,
        }
    }

    /// Convenience constructor returning the schema already shared.
    #[must_use]
    pub fn shared(type_name: impl Into<String>, columns: Vec<ColumnDef>) -> Arc<Self> {
        Arc::new(Self::new(type_name, columns))
    }

    /// The layout identifier.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The columns, in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// The number of columns.
    #[inline]
    #[must_use]
    pub fn number_of_columns(&self) -> usize {
        self.columns.len()
    }

    /// Get the column index by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get the kind of the column at `index`.
    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| c.kind)
    }

    /// Returns true if both schemas store the same column kinds in the same
    /// order. Column names and the layout identifier are not compared.
    #[must_use]
    pub fn same_layout(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.kind == b.kind)
    }

    /// Cells for a new row holding the default value of every column.
    #[must_use]
    pub fn default_cells(&self) -> Vec<Value> {
        self.columns.iter().map(|c| c.kind.default_value()).collect()
    }

    /// Check that `cells` has one value per column, each of the column's kind.
    ///
    /// # Errors
    ///
    /// * `CellCountMismatch` - If the number of cells differs from the number of columns.
    /// * `CellTypeMismatch` - If a cell does not fit its column.
    pub fn validate_cells(&self, cells: &[Value]) -> Result<(), Error> {
        if cells.len() != self.columns.len() {
            return Err(Error::CellCountMismatch {
                expected: self.columns.len(),
                found: cells.len(),
            });
        }
        for (column, (def, cell)) in self.columns.iter().zip(cells).enumerate() {
            Self::check_cell(column, def.kind, cell)?;
        }
        Ok(())
    }

    /// Check a single cell against column `column`.
    ///
    /// # Errors
    ///
    /// * `ColumnIndexOutOfBounds` - If the column does not exist.
    /// * `CellTypeMismatch` - If the value does not fit the column.
    pub fn validate_cell(&self, column: usize, cell: &Value) -> Result<(), Error> {
        let kind = self
            .column_type(column)
            .ok_or(Error::ColumnIndexOutOfBounds(column, self.columns.len()))?;
        Self::check_cell(column, kind, cell)
    }

    #[inline]
    fn check_cell(column: usize, kind: ColumnType, cell: &Value) -> Result<(), Error> {
        if kind.accepts(cell) {
            Ok(())
        } else {
            Err(Error::CellTypeMismatch {
                column,
                expected: kind,
                found: cell.kind(),
            })
        }
    }
}
