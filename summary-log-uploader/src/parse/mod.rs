use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Error};

use crate::table::{project, Table};

pub mod decode;
pub mod format;
pub mod record;
pub mod values;

use record::LogRecord;

pub struct Parsed<T> {
    pub data: T,
    // How many lines of the input were read to produce the data
    pub consumed: usize,
}

/// The summary records of one log file, in file order. Built once and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSet {
    records: Vec<LogRecord>,
}

impl LogSet {
    pub fn from_records(records: Vec<LogRecord>) -> Self {
        Self { records }
    }

    pub fn from_reader<R: std::io::BufRead>(reader: R) -> Result<Self, Error> {
        let parsed = format::summary_lines(reader)?;
        Ok(Self::from_records(parsed.data))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open log file {path:?}"))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to read log file {path:?}"))
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Projects every record into the canonical destination table.
    pub fn to_table(&self) -> Table {
        project(&self.records)
    }
}

impl<'a> IntoIterator for &'a LogSet {
    type Item = &'a LogRecord;
    type IntoIter = std::slice::Iter<'a, LogRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
