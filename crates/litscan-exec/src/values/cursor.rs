//! Bidirectional scan position over a VALUES list.

use crate::context::ScanDirection;

/// Index over `[-1, len]`.
///
/// `-1` and `len` are the end sentinels for backward and forward scans.
/// Steps past a sentinel leave the index where it is, so the cursor never
/// leaves that range however the direction changes between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCursor {
    index: isize,
    len: isize,
}

impl RowCursor {
    /// Creates a cursor before the first of `len` rows.
    pub fn new(len: usize) -> Self {
        Self {
            index: -1,
            len: isize::try_from(len).unwrap_or(isize::MAX),
        }
    }

    /// Moves one row in `direction`.
    pub fn advance(&mut self, direction: ScanDirection) {
        match direction {
            ScanDirection::Forward => {
                if self.index < self.len {
                    self.index += 1;
                }
            }
            ScanDirection::Backward => {
                if self.index >= 0 {
                    self.index -= 1;
                }
            }
        }
    }

    /// Returns to the position before the first row.
    pub fn reset(&mut self) {
        self.index = -1;
    }

    /// Returns the raw index, sentinels included.
    pub fn index(&self) -> isize {
        self.index
    }

    /// Returns the current row, or `None` when positioned on a sentinel.
    pub fn position(&self) -> Option<usize> {
        if (0..self.len).contains(&self.index) {
            usize::try_from(self.index).ok()
        } else {
            None
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        usize::try_from(self.len).unwrap_or(0)
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
