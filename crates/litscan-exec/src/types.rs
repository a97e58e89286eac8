//! Data types of runtime values.

use std::fmt;

/// SQL data type of a column or expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Type of an untyped NULL literal.
    Null,
    /// Boolean type.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    BigInt,
    /// 64-bit floating point.
    Double,
    /// Unlimited text.
    Text,
    /// Binary data.
    Blob,
    /// Array of the given element type.
    Array(Box<DataType>),
}

impl DataType {
    /// Returns true for numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::BigInt | DataType::Double)
    }

    /// Returns the common type two operands are promoted to in arithmetic.
    pub fn promote(&self, other: &DataType) -> DataType {
        match (self, other) {
            (DataType::Null, t) | (t, DataType::Null) => t.clone(),
            (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
            (a, b) if a.is_numeric() && b.is_numeric() => DataType::BigInt,
            (a, _) => a.clone(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Int => write!(f, "INT"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}
