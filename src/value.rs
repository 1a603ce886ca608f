//! Typed cell values.
//!
//! Every cell of a row is one [`Value`], bound positionally to the column of
//! the table schema. The set of kinds is closed and mirrors
//! [`ColumnType`](crate::schema::ColumnType): the kind of each column is
//! decided once when the schema is loaded and never re-derived per access.

use core::hash::{Hash, Hasher};

mod display;

/// A single typed cell value.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "testing", derive(arbitrary::Arbitrary))]
pub enum Value {
    /// Signed 8-bit integer.
    S8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    S16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    S32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// IEEE 754 single precision float.
    F32(f32),
    /// IEEE 754 double precision float.
    F64(f64),
    /// Fixed-size byte blob (padding, packed bit fields).
    Bytes(Vec<u8>),
    /// UTF-8 string.
    Text(String),
}

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// See [`Value::S8`].
    S8,
    /// See [`Value::U8`].
    U8,
    /// See [`Value::S16`].
    S16,
    /// See [`Value::U16`].
    U16,
    /// See [`Value::S32`].
    S32,
    /// See [`Value::U32`].
    U32,
    /// See [`Value::F32`].
    F32,
    /// See [`Value::F64`].
    F64,
    /// See [`Value::Bytes`].
    Bytes,
    /// See [`Value::Text`].
    Text,
}

impl Value {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::S8(_) => ValueKind::S8,
            Value::U8(_) => ValueKind::U8,
            Value::S16(_) => ValueKind::S16,
            Value::U16(_) => ValueKind::U16,
            Value::S32(_) => ValueKind::S32,
            Value::U32(_) => ValueKind::U32,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Text(_) => ValueKind::Text,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::S8(a), Value::S8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::S16(a), Value::S16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::S32(a), Value::S32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            // Bit equality: a stored NaN equals itself, 0.0 and -0.0 differ.
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must stay consistent with PartialEq, hence floats hash their bits.
        self.kind().hash(state);
        match self {
            Value::S8(v) => v.hash(state),
            Value::U8(v) => v.hash(state),
            Value::S16(v) => v.hash(state),
            Value::U16(v) => v.hash(state),
            Value::S32(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::S8(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::S16(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::S32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}
