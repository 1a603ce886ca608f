//! Table schemas: the typed column layout shared by every row of a table.
mod column;
mod table_schema;

pub use column::{ColumnDef, ColumnType};
pub use table_schema::TableSchema;
