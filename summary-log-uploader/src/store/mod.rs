use crate::error::StoreError;

pub mod auth;
pub mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::SheetsClient;

/// A grid of string cells we append summary rows to. Rows and columns are 1-based.
///
/// Calls are blocking and are not retried; a failed call is reported to the caller
/// as-is.
pub trait SheetStore {
    /// The values of one column, top to bottom, without trailing blank cells.
    fn column(&self, index: usize) -> Result<Vec<String>, StoreError>;

    /// The values of one row, without trailing blank cells. Empty if the row is unused.
    fn row(&self, index: usize) -> Result<Vec<String>, StoreError>;

    fn write_row(&mut self, index: usize, values: &[String]) -> Result<(), StoreError>;

    /// Writes a rectangular block whose top-left cell is column 1 of `start_row`.
    fn write_block(&mut self, start_row: usize, rows: &[Vec<String>]) -> Result<(), StoreError>;

    /// How many rows the sheet currently has room for.
    fn row_capacity(&self) -> Result<usize, StoreError>;

    fn resize_rows(&mut self, rows: usize) -> Result<(), StoreError>;
}

impl<S: SheetStore + ?Sized> SheetStore for Box<S> {
    fn column(&self, index: usize) -> Result<Vec<String>, StoreError> {
        (**self).column(index)
    }

    fn row(&self, index: usize) -> Result<Vec<String>, StoreError> {
        (**self).row(index)
    }

    fn write_row(&mut self, index: usize, values: &[String]) -> Result<(), StoreError> {
        (**self).write_row(index, values)
    }

    fn write_block(&mut self, start_row: usize, rows: &[Vec<String>]) -> Result<(), StoreError> {
        (**self).write_block(start_row, rows)
    }

    fn row_capacity(&self) -> Result<usize, StoreError> {
        (**self).row_capacity()
    }

    fn resize_rows(&mut self, rows: usize) -> Result<(), StoreError> {
        (**self).resize_rows(rows)
    }
}

/// Spreadsheet column letters for a 1-based column number: 1 is `A`, 27 is `AA`.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let remainder = (index - 1) % 26;
        letters.push(char::from(b'A' + remainder as u8));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Drops trailing blank cells, the way the spreadsheet API reports ranges.
pub(crate) fn trim_trailing_blanks(mut values: Vec<String>) -> Vec<String> {
    while values.last().is_some_and(|v| v.is_empty()) {
        values.pop();
    }
    values
}
