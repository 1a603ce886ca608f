//! Column descriptors.

use crate::value::{Value, ValueKind};

/// The storage kind of a column, fixed when the schema is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnType {
    /// Signed 8-bit integer.
    S8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    S16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    S32,
    /// Unsigned 32-bit integer.
    U32,
    /// Single precision float.
    F32,
    /// Double precision float.
    F64,
    /// Byte blob of exactly this many bytes.
    Fixed(usize),
    /// Variable length UTF-8 string.
    Text,
}

impl ColumnType {
    /// Returns the value a freshly created cell of this column holds.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            ColumnType::S8 => Value::S8(0),
            ColumnType::U8 => Value::U8(0),
            ColumnType::S16 => Value::S16(0),
            ColumnType::U16 => Value::U16(0),
            ColumnType::S32 => Value::S32(0),
            ColumnType::U32 => Value::U32(0),
            ColumnType::F32 => Value::F32(0.0),
            ColumnType::F64 => Value::F64(0.0),
            ColumnType::Fixed(len) => Value::Bytes(vec![0; len]),
            ColumnType::Text => Value::Text(String::new()),
        }
    }

    /// Returns true if `value` can be stored in a column of this kind.
    ///
    /// Fixed blobs must match the declared length exactly.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (ColumnType::Fixed(len), Value::Bytes(bytes)) => bytes.len() == len,
            (kind, value) => kind.value_kind() == value.kind(),
        }
    }

    /// The [`ValueKind`] cells of this column carry.
    #[must_use]
    pub fn value_kind(self) -> ValueKind {
        match self {
            ColumnType::S8 => ValueKind::S8,
            ColumnType::U8 => ValueKind::U8,
            ColumnType::S16 => ValueKind::S16,
            ColumnType::U16 => ValueKind::U16,
            ColumnType::S32 => ValueKind::S32,
            ColumnType::U32 => ValueKind::U32,
            ColumnType::F32 => ValueKind::F32,
            ColumnType::F64 => ValueKind::F64,
            ColumnType::Fixed(_) => ValueKind::Bytes,
            ColumnType::Text => ValueKind::Text,
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnDef {
    /// Display name of the column.
    pub name: String,
    /// Storage kind.
    pub kind: ColumnType,
}

impl ColumnDef {
    /// Create a new column descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values_are_accepted() {
        for kind in [
            ColumnType::S8,
            ColumnType::U8,
            ColumnType::S16,
            ColumnType::U16,
            ColumnType::S32,
            ColumnType::U32,
            ColumnType::F32,
            ColumnType::F64,
            ColumnType::Fixed(4),
            ColumnType::Text,
        ] {
            assert!(kind.accepts(&kind.default_value()), "{kind:?}");
        }
    }

    #[test]
    fn test_fixed_length_enforced() {
        assert!(ColumnType::Fixed(2).accepts(&Value::Bytes(vec![1, 2])));
        assert!(!ColumnType::Fixed(2).accepts(&Value::Bytes(vec![1, 2, 3])));
        assert!(!ColumnType::Fixed(0).accepts(&Value::Text(String::new())));
    }

    #[test]
    fn test_integer_widths_are_distinct() {
        assert!(!ColumnType::S32.accepts(&Value::U32(1)));
        assert!(ColumnType::U16.accepts(&Value::U16(1)));
    }
}
