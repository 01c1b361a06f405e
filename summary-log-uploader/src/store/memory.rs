use tracing::debug;

use super::{trim_trailing_blanks, SheetStore};
use crate::error::StoreError;

/// An in-process sheet. Writes past `capacity` fail just like they do against a
/// real grid, so callers still have to grow it first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    rows: Vec<Vec<String>>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::new(),
            capacity,
        }
    }

    pub fn with_rows(rows: Vec<Vec<String>>, capacity: usize) -> Self {
        Self {
            capacity: capacity.max(rows.len()),
            rows,
        }
    }

    /// Every used row, including blank ones in between.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn check_bounds(&self, row: usize) -> Result<(), StoreError> {
        if row == 0 || row > self.capacity {
            return Err(StoreError::OutOfBounds {
                row,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl SheetStore for MemoryStore {
    fn column(&self, index: usize) -> Result<Vec<String>, StoreError> {
        let Some(index) = index.checked_sub(1) else {
            return Ok(Vec::new());
        };
        let values = self
            .rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect();
        Ok(trim_trailing_blanks(values))
    }

    fn row(&self, index: usize) -> Result<Vec<String>, StoreError> {
        let Some(index) = index.checked_sub(1) else {
            return Ok(Vec::new());
        };
        let row = self.rows.get(index).cloned().unwrap_or_default();
        Ok(trim_trailing_blanks(row))
    }

    fn write_row(&mut self, index: usize, values: &[String]) -> Result<(), StoreError> {
        self.write_block(index, &[values.to_vec()])
    }

    fn write_block(&mut self, start_row: usize, rows: &[Vec<String>]) -> Result<(), StoreError> {
        self.check_bounds(start_row)?;
        self.check_bounds(start_row + rows.len().saturating_sub(1))?;
        if self.rows.len() < start_row - 1 + rows.len() {
            self.rows.resize(start_row - 1 + rows.len(), Vec::new());
        }
        for (offset, row) in rows.iter().enumerate() {
            self.rows[start_row - 1 + offset] = row.clone();
        }
        debug!("wrote {} rows starting at row {start_row}", rows.len());
        Ok(())
    }

    fn row_capacity(&self) -> Result<usize, StoreError> {
        Ok(self.capacity)
    }

    fn resize_rows(&mut self, rows: usize) -> Result<(), StoreError> {
        self.capacity = rows;
        self.rows.truncate(rows);
        Ok(())
    }
}
