//! Row representation for query execution.
//!
//! This module defines the owned `Row` type and the `RowSlot` buffer that
//! operators fill in place and hand to their consumers.

use std::fmt;

use super::Value;

/// A single row of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    /// The values in this row.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Creates an empty row.
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    /// Returns the number of columns in this row.
    pub fn num_columns(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at the given index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the values as a slice.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row and returns the values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Whether a slot currently holds a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No row is stored.
    Empty,
    /// The slot holds evaluated values directly, without a physical copy.
    Virtual,
}

/// A fixed-width output buffer of `(value, is_null)` pairs.
///
/// The width is set when the slot is created and never changes. Operators
/// clear the slot, write every column, then mark it virtual.
#[derive(Debug, Clone)]
pub struct RowSlot {
    values: Vec<Value>,
    isnull: Vec<bool>,
    state: SlotState,
}

impl RowSlot {
    /// Creates an empty slot with the given number of columns.
    pub fn new(arity: usize) -> Self {
        Self {
            values: vec![Value::Null; arity],
            isnull: vec![true; arity],
            state: SlotState::Empty,
        }
    }

    /// Returns the number of columns.
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Returns the slot state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Returns true if no row is stored.
    pub fn is_empty(&self) -> bool {
        self.state == SlotState::Empty
    }

    /// Drops any stored row, releasing references to its values.
    pub fn clear(&mut self) {
        for value in &mut self.values {
            *value = Value::Null;
        }
        self.isnull.fill(true);
        self.state = SlotState::Empty;
    }

    /// Writes one column of the row under construction.
    ///
    /// Out-of-range writes are ignored; callers check widths up front.
    pub fn set(&mut self, index: usize, value: Value) {
        if index < self.values.len() {
            self.isnull[index] = value.is_null();
            self.values[index] = value;
        }
    }

    /// Marks the slot as holding the values written since the last clear.
    pub fn store_virtual(&mut self) {
        self.state = SlotState::Virtual;
    }

    /// Returns the `(value, is_null)` pair at `index` of the stored row.
    pub fn get(&self, index: usize) -> Option<(&Value, bool)> {
        if self.is_empty() {
            return None;
        }
        self.values.get(index).map(|v| (v, self.isnull[index]))
    }

    /// Returns the stored values. Empty slots yield all NULLs.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the null flags of the stored row.
    pub fn nulls(&self) -> &[bool] {
        &self.isnull
    }

    /// Copies the stored row out of the slot.
    pub fn to_row(&self) -> Option<Row> {
        if self.is_empty() {
            None
        } else {
            Some(Row::new(self.values.clone()))
        }
    }
}
