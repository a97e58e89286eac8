//! Runtime values for query execution.
//!
//! This module defines the `Value` type which represents runtime SQL values
//! during query execution, including expanded arrays whose backing buffer
//! may be shared between several readers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use litscan_common::EvalError;
use parking_lot::RwLock;

use crate::types::DataType;

/// How a handle to an expanded array may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayAccess {
    /// The holder may modify the shared buffer in place. Every alias of the
    /// buffer observes the change.
    ReadWrite,
    /// The buffer is immutable through this handle; modifications copy it
    /// first.
    ReadOnly,
}

/// An array value in expanded (directly mutable) form.
///
/// Cloning the handle aliases the same buffer; use [`ExpandedArray::to_read_only`]
/// before handing it to readers that must not see each other's writes.
/// Read-only access is transitive: nested arrays read through a read-only
/// handle come back read-only as well.
#[derive(Clone)]
pub struct ExpandedArray {
    elems: Arc<RwLock<Vec<Value>>>,
    access: ArrayAccess,
}

impl ExpandedArray {
    /// Creates a read-write array owning a fresh buffer.
    pub fn new(elems: Vec<Value>) -> Self {
        Self {
            elems: Arc::new(RwLock::new(elems)),
            access: ArrayAccess::ReadWrite,
        }
    }

    /// Returns the access mode of this handle.
    pub fn access(&self) -> ArrayAccess {
        self.access
    }

    /// Returns true if writes through this handle copy the buffer first.
    pub fn is_read_only(&self) -> bool {
        self.access == ArrayAccess::ReadOnly
    }

    /// Returns a read-only handle to the same buffer.
    pub fn to_read_only(&self) -> Self {
        Self {
            elems: Arc::clone(&self.elems),
            access: ArrayAccess::ReadOnly,
        }
    }

    /// Returns true if both handles point at the same buffer.
    pub fn shares_buffer_with(&self, other: &ExpandedArray) -> bool {
        Arc::ptr_eq(&self.elems, &other.elems)
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elems.read().len()
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.elems.read().is_empty()
    }

    /// Returns a copy of the element at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        let elem = self.elems.read().get(index).cloned()?;
        Some(self.restrict(elem))
    }

    /// Copies the elements out.
    pub fn to_vec(&self) -> Vec<Value> {
        let elems = self.elems.read();
        match self.access {
            ArrayAccess::ReadWrite => elems.clone(),
            ArrayAccess::ReadOnly => elems.iter().cloned().map(Value::make_read_only).collect(),
        }
    }

    /// Appends an element.
    pub fn push(&mut self, value: Value) {
        self.make_private();
        self.elems.write().push(value);
    }

    /// Replaces the element at `index`. Returns false if out of bounds.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index >= self.len() {
            return false;
        }
        self.make_private();
        self.elems.write()[index] = value;
        true
    }

    /// Bytes held by the element buffer.
    pub fn heap_size(&self) -> usize {
        let elems = self.elems.read();
        elems.len() * std::mem::size_of::<Value>()
            + elems.iter().map(Value::heap_size).sum::<usize>()
    }

    /// Applies this handle's access mode to an element read out of it.
    fn restrict(&self, elem: Value) -> Value {
        match self.access {
            ArrayAccess::ReadWrite => elem,
            ArrayAccess::ReadOnly => elem.make_read_only(),
        }
    }

    /// Detaches a read-only handle onto its own copy of the buffer.
    ///
    /// The copy is shallow; nested arrays in it stay read-only so they are
    /// copied in turn before any write.
    fn make_private(&mut self) {
        if self.access == ArrayAccess::ReadOnly {
            let copy = self.to_vec();
            self.elems = Arc::new(RwLock::new(copy));
            self.access = ArrayAccess::ReadWrite;
        }
    }
}

impl PartialEq for ExpandedArray {
    fn eq(&self, other: &Self) -> bool {
        self.shares_buffer_with(other) || *self.elems.read() == *other.elems.read()
    }
}

impl fmt::Debug for ExpandedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpandedArray")
            .field("access", &self.access)
            .field("elems", &*self.elems.read())
            .finish()
    }
}

/// A runtime value during query execution.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    BigInt(i64),
    /// 64-bit floating point.
    Double(f64),
    /// String value.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Expanded array.
    Array(ExpandedArray),
}

impl Value {
    /// Creates a NULL value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Creates a boolean value.
    pub fn boolean(v: bool) -> Self {
        Value::Boolean(v)
    }

    /// Creates an integer value.
    pub fn int(v: i32) -> Self {
        Value::Int(v)
    }

    /// Creates a bigint value.
    pub fn bigint(v: i64) -> Self {
        Value::BigInt(v)
    }

    /// Creates a double value.
    pub fn double(v: f64) -> Self {
        Value::Double(v)
    }

    /// Creates a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    /// Creates a read-write array value over a fresh buffer.
    pub fn array(elems: Vec<Value>) -> Self {
        Value::Array(ExpandedArray::new(elems))
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value can be modified in place by its holder.
    pub fn is_read_write(&self) -> bool {
        matches!(self, Value::Array(a) if !a.is_read_only())
    }

    /// Forces any read-write expanded representation to read-only.
    ///
    /// Nested arrays are covered too, since everything read through a
    /// read-only handle is itself read-only. Values that are NULL or not
    /// expanded are returned unchanged.
    pub fn make_read_only(self) -> Value {
        match self {
            Value::Array(a) if !a.is_read_only() => Value::Array(a.to_read_only()),
            other => other,
        }
    }

    /// Returns true if this value is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(i) => *i != 0,
            Value::Double(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::Array(a) => !a.is_empty(),
        }
    }

    /// Converts this value to a boolean.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(*b),
            _ => Some(self.is_truthy()),
        }
    }

    /// Converts this value to an i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(i64::from(*i)),
            Value::BigInt(i) => Some(*i),
            Value::Double(f) => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Null | Value::Bytes(_) | Value::Array(_) => None,
        }
    }

    /// Converts this value to an f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(f64::from(*i)),
            Value::BigInt(i) => Some(*i as f64),
            Value::Double(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            Value::Null | Value::Bytes(_) | Value::Array(_) => None,
        }
    }

    /// Converts this value to a string.
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Returns the data type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int(_) => DataType::Int,
            Value::BigInt(_) => DataType::BigInt,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::Text,
            Value::Bytes(_) => DataType::Blob,
            Value::Array(a) => {
                let elem = a
                    .get(0)
                    .map(|v| v.data_type())
                    .unwrap_or(DataType::Null);
                DataType::Array(Box::new(elem))
            }
        }
    }

    /// Bytes held outside the value itself.
    pub fn heap_size(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            Value::Array(a) => a.heap_size(),
            _ => 0,
        }
    }

    /// Casts this value to the specified type.
    pub fn cast(&self, target: &DataType) -> Result<Value, EvalError> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        let fail = || EvalError::Cast {
            value: self.to_string(),
            target: target.to_string(),
        };

        match target {
            DataType::Null => Err(fail()),
            DataType::Boolean => self.to_bool().map(Value::Boolean).ok_or_else(fail),
            DataType::Int => self
                .to_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int)
                .ok_or_else(fail),
            DataType::BigInt => self.to_i64().map(Value::BigInt).ok_or_else(fail),
            DataType::Double => self.to_f64().map(Value::Double).ok_or_else(fail),
            DataType::Text => self.to_string_value().map(Value::String).ok_or_else(fail),
            DataType::Blob => match self {
                Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
                Value::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
                _ => Err(fail()),
            },
            DataType::Array(elem) => match self {
                Value::Array(a) => {
                    let elems = a
                        .to_vec()
                        .iter()
                        .map(|v| v.cast(elem))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::array(elems))
                }
                _ => Err(fail()),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Cross-type numeric comparisons
            (a, b) => {
                if let (Some(a_f), Some(b_f)) = (a.numeric(), b.numeric()) {
                    (a_f - b_f).abs() < f64::EPSILON
                } else {
                    false
                }
            }
        }
    }
}

impl Eq for Value {}

impl Value {
    fn numeric(&self) -> Option<f64> {
        match self {
            Value::Int(_) | Value::BigInt(_) | Value::Double(_) => self.to_f64(),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NULL comparisons: NULL is considered less than any non-NULL value
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,

            // Same-type comparisons
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.to_vec().cmp(&b.to_vec()),

            // Cross-type numeric comparisons via f64
            (a, b) => {
                if let (Some(a_f), Some(b_f)) = (a.numeric(), b.numeric()) {
                    a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                } else {
                    // Fall back to string comparison for incompatible types
                    let a_s = a.to_string_value().unwrap_or_default();
                    let b_s = b.to_string_value().unwrap_or_default();
                    a_s.cmp(&b_s)
                }
            }
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::BigInt(i) => i.hash(state),
            Value::Double(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Array(a) => a.to_vec().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::BigInt(i) => write!(f, "{}", i),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Array(a) => {
                write!(f, "{{")?;
                for (i, v) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "}}")
            }
        }
    }
}
