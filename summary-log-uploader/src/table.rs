use serde::Serialize;
use tracing::warn;

use crate::parse::{
    record::{render, LogRecord, HEADER, SENTINEL},
    values::try_parse_duration_ms,
};

/// Longest value a destination cell accepts before we cut it.
pub const MAX_CELL_LENGTH: usize = 40_000;
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// A header row plus data rows, every cell a string. Rows are never narrower than the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Appends a row, right-padding it with sentinel cells if it is short.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() < self.width() {
            warn!(
                "row has {} cells but the header has {}, padding",
                row.len(),
                self.width()
            );
            row.resize(self.width(), SENTINEL.to_string());
        }
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab separated, header first. Cells are written as-is.
    pub fn to_tsv(&self) -> String {
        std::iter::once(&self.header)
            .chain(&self.rows)
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Projects records into a table with the canonical 34-column header.
pub fn project<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Table {
    project_columns(records, &HEADER)
}

/// Projects records into a table with the given columns, looked up by name.
/// Columns that are not record fields come out as sentinel cells.
pub fn project_columns<'a>(
    records: impl IntoIterator<Item = &'a LogRecord>,
    columns: &[&str],
) -> Table {
    let mut table = Table::new(columns.iter().map(|c| c.to_string()).collect());
    for record in records {
        let row = columns
            .iter()
            .map(|column| project_cell(column, record.get(column)))
            .collect();
        table.push_row(row);
    }
    table
}

fn project_cell(column: &str, value: Option<&str>) -> String {
    let value = render(value);

    let value = if column.contains("Duration") && value != SENTINEL {
        // Destination stores bare milliseconds
        match try_parse_duration_ms(value) {
            Some(ms) => ms.to_string(),
            None => SENTINEL.to_string(),
        }
    } else {
        value.to_string()
    };

    truncate_cell(value)
}

fn truncate_cell(value: String) -> String {
    match value.char_indices().nth(MAX_CELL_LENGTH) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &value[..cut]),
        None => value,
    }
}
