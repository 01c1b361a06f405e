use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::{
    error::StoreError,
    parse::record::{canonical_header, END_DATE_TIME_INDEX, START_DATE_TIME_INDEX},
    store::SheetStore,
    table::Table,
};

pub const DEFAULT_GROW_ROWS: usize = 1000;

/// Identity keys of rows already in the destination, or admitted during this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    keys: HashSet<String>,
}

impl IdentitySet {
    pub fn identity_key(start: &str, end: &str) -> String {
        format!("{start}_{end}")
    }

    /// The key of a projected row, read by column position.
    pub fn key_for_row(row: &[String]) -> Option<String> {
        let start = row.get(START_DATE_TIME_INDEX)?;
        let end = row.get(END_DATE_TIME_INDEX)?;
        Some(Self::identity_key(start, end))
    }

    /// Reads the start and end time columns of the destination, skipping the header.
    /// Rows missing either value are not remembered.
    pub fn seed<S: SheetStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let starts = store.column(START_DATE_TIME_INDEX + 1)?;
        let ends = store.column(END_DATE_TIME_INDEX + 1)?;

        let keys = starts
            .iter()
            .zip(ends.iter())
            .skip(1)
            .filter(|(start, end)| !start.is_empty() && !end.is_empty())
            .map(|(start, end)| Self::identity_key(start, end))
            .collect();

        Ok(Self { keys })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns false if the key was already known.
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Rows to write, and the 1-based row the first of them goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendPlan {
    pub start_row: usize,
    pub rows: Vec<Vec<String>>,
}

impl AppendPlan {
    pub fn end_row(&self) -> usize {
        self.start_row + self.rows.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    NothingToUpload,
    Appended { start_row: usize, rows: usize },
    Failed,
}

/// Appends new rows to the end of a sheet, skipping rows whose identity key is
/// already there. Owns the identity set for the whole run, so it must stay the
/// only writer to its store.
pub struct Appender<S: SheetStore> {
    store: S,
    identities: IdentitySet,
    grow_rows: usize,
}

impl<S: SheetStore> Appender<S> {
    /// Fixes up the header row and loads the identity keys already in the store.
    /// Neither step is fatal: failures are logged and we carry on with what we have.
    pub fn new(store: S, grow_rows: usize) -> Self {
        let mut appender = Self {
            store,
            identities: IdentitySet::default(),
            grow_rows,
        };

        if let Err(e) = appender.ensure_headers() {
            error!("Failed to check the header row: {}", e);
        }

        appender.identities = match IdentitySet::seed(&appender.store) {
            Ok(identities) => {
                info!("Loaded {} existing identity keys", identities.len());
                identities
            }
            Err(e) => {
                error!(
                    "Failed to load existing rows, duplicates may be re-uploaded: {}",
                    e
                );
                IdentitySet::default()
            }
        };

        appender
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn identities(&self) -> &IdentitySet {
        &self.identities
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Overwrites row 1 with the canonical header unless it already matches.
    /// Returns whether it wrote.
    pub fn ensure_headers(&mut self) -> Result<bool, StoreError> {
        let header = canonical_header();
        if self.store.row(1)? == header {
            return Ok(false);
        }
        info!("Header row is missing or different, rewriting it");
        self.store.write_row(1, &header)?;
        Ok(true)
    }

    /// Keeps the rows whose identity key has not been seen yet, in order, and
    /// remembers their keys straight away. A later row with the same key as an
    /// earlier one in the same table is dropped too.
    pub fn filter_duplicates(&mut self, table: &Table) -> Table {
        let mut fresh = Table::new(table.header.clone());
        let mut duplicates = 0;

        for row in &table.rows {
            let Some(key) = IdentitySet::key_for_row(row) else {
                warn!("Row has {} cells, too short to identify, skipping", row.len());
                continue;
            };
            if self.identities.insert(key) {
                fresh.push_row(row.clone());
            } else {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            info!("Skipping {} rows that are already uploaded", duplicates);
            metrics::counter!("summary_rows_duplicate_total").increment(duplicates);
        }
        fresh
    }

    /// Places the data rows of `table` right after the last used row, going by
    /// the first column.
    pub fn plan_append(&self, table: &Table) -> Result<AppendPlan, StoreError> {
        let used = self.store.column(1)?.len();
        Ok(AppendPlan {
            start_row: used + 1,
            rows: table.rows.clone(),
        })
    }

    /// Grows the sheet when `required` rows would not fit, leaving `grow_rows` spare.
    /// Failures are only logged, the write is attempted anyway.
    fn ensure_capacity(&mut self, required: usize) {
        let capacity = match self.store.row_capacity() {
            Ok(capacity) => capacity,
            Err(e) => {
                error!("Failed to read the sheet size: {}", e);
                return;
            }
        };
        if required <= capacity {
            return;
        }

        let target = required + self.grow_rows;
        info!("Growing sheet from {} to {} rows", capacity, target);
        if let Err(e) = self.store.resize_rows(target) {
            error!("Failed to grow the sheet to {} rows: {}", target, e);
        }
    }

    pub fn append(&mut self, plan: &AppendPlan) -> Result<(), StoreError> {
        if plan.rows.is_empty() {
            return Ok(());
        }
        self.ensure_capacity(plan.end_row());
        self.store.write_block(plan.start_row, &plan.rows)?;
        debug!("Appended rows {} to {}", plan.start_row, plan.end_row());
        Ok(())
    }

    /// Drops known rows and appends the rest. Errors are logged and reported as
    /// `UploadOutcome::Failed`.
    pub fn upload(&mut self, table: &Table) -> UploadOutcome {
        let fresh = self.filter_duplicates(table);
        if fresh.is_empty() {
            info!("No new rows to upload");
            return UploadOutcome::NothingToUpload;
        }

        let plan = match self.plan_append(&fresh) {
            Ok(plan) => plan,
            Err(e) => {
                error!("Failed to find the end of the sheet: {}", e);
                return UploadOutcome::Failed;
            }
        };

        match self.append(&plan) {
            Ok(()) => {
                info!(
                    "Uploaded {} rows starting at row {}",
                    plan.rows.len(),
                    plan.start_row
                );
                metrics::counter!("summary_rows_appended_total").increment(plan.rows.len() as u64);
                UploadOutcome::Appended {
                    start_row: plan.start_row,
                    rows: plan.rows.len(),
                }
            }
            Err(e) => {
                error!("Failed to write {} rows: {}", plan.rows.len(), e);
                UploadOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parse::record::{COLUMN_COUNT, HEADER},
        store::MemoryStore,
    };

    fn data_row(start: &str, end: &str, tag: &str) -> Vec<String> {
        let mut row = vec![" ".to_string(); COLUMN_COUNT];
        row[0] = "Summary data".to_string();
        row[1] = tag.to_string();
        row[START_DATE_TIME_INDEX] = start.to_string();
        row[END_DATE_TIME_INDEX] = end.to_string();
        row
    }

    fn table(rows: Vec<Vec<String>>) -> Table {
        Table {
            header: canonical_header(),
            rows,
        }
    }

    fn seeded_store(data_rows: usize, capacity: usize) -> MemoryStore {
        let mut rows = vec![canonical_header()];
        for i in 0..data_rows {
            rows.push(data_row(&format!("s{i}"), &format!("e{i}"), "old"));
        }
        MemoryStore::with_rows(rows, capacity)
    }

    fn boom() -> StoreError {
        StoreError::Api {
            status: 500,
            body: "boom".to_string(),
        }
    }

    /// Wraps a memory store, failing the chosen calls and counting block writes.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fail_row: bool,
        fail_column: bool,
        fail_resize: bool,
        block_writes: usize,
    }

    impl SheetStore for FaultyStore {
        fn column(&self, index: usize) -> Result<Vec<String>, StoreError> {
            if self.fail_column {
                return Err(boom());
            }
            self.inner.column(index)
        }

        fn row(&self, index: usize) -> Result<Vec<String>, StoreError> {
            if self.fail_row {
                return Err(boom());
            }
            self.inner.row(index)
        }

        fn write_row(&mut self, index: usize, values: &[String]) -> Result<(), StoreError> {
            self.inner.write_row(index, values)
        }

        fn write_block(&mut self, start: usize, rows: &[Vec<String>]) -> Result<(), StoreError> {
            self.block_writes += 1;
            self.inner.write_block(start, rows)
        }

        fn row_capacity(&self) -> Result<usize, StoreError> {
            self.inner.row_capacity()
        }

        fn resize_rows(&mut self, rows: usize) -> Result<(), StoreError> {
            if self.fail_resize {
                return Err(boom());
            }
            self.inner.resize_rows(rows)
        }
    }

    #[test]
    fn test_header_written_to_empty_store() {
        let appender = Appender::new(MemoryStore::new(10), DEFAULT_GROW_ROWS);
        assert_eq!(appender.store().rows()[0], HEADER.to_vec());
        assert!(appender.identities().is_empty());
    }

    #[test]
    fn test_wrong_header_is_overwritten() {
        let store = MemoryStore::with_rows(vec![vec!["Old".to_string(), "Header".to_string()]], 10);
        let mut appender = Appender::new(store, DEFAULT_GROW_ROWS);

        assert_eq!(appender.store().rows()[0], canonical_header());
        assert!(!appender.ensure_headers().unwrap());
    }

    #[test]
    fn test_seeds_identities_from_store() {
        let appender = Appender::new(seeded_store(3, 10), DEFAULT_GROW_ROWS);
        let identities = appender.identities();

        assert_eq!(identities.len(), 3);
        assert!(identities.contains("s0_e0"));
        assert!(identities.contains("s2_e2"));
        // the header row is never an identity
        assert!(!identities.contains("Start DateTime_End DateTime"));
    }

    #[test]
    fn test_seed_skips_rows_missing_a_timestamp() {
        let mut store = seeded_store(2, 10);
        store.write_row(4, &data_row("s9", "", "old")).unwrap();

        let identities = IdentitySet::seed(&store).unwrap();
        assert_eq!(identities.len(), 2);
    }

    #[test]
    fn test_appends_after_existing_rows() {
        let mut appender = Appender::new(seeded_store(10, 100), DEFAULT_GROW_ROWS);
        let before = appender.store().rows()[..11].to_vec();

        let outcome = appender.upload(&table(vec![
            data_row("a", "b", "new1"),
            data_row("c", "d", "new2"),
            data_row("e", "f", "new3"),
        ]));

        assert_eq!(
            outcome,
            UploadOutcome::Appended {
                start_row: 12,
                rows: 3
            }
        );
        let rows = appender.store().rows();
        assert_eq!(rows.len(), 14);
        assert_eq!(&rows[..11], &before[..]);
        assert_eq!(rows[11][1], "new1");
        assert_eq!(rows[13][1], "new3");
    }

    #[test]
    fn test_filter_duplicates_is_idempotent() {
        let mut appender = Appender::new(seeded_store(2, 100), DEFAULT_GROW_ROWS);
        let batch = table(vec![
            data_row("s0", "e0", "already there"),
            data_row("x", "y", "new"),
        ]);

        let first = appender.filter_duplicates(&batch);
        assert_eq!(first.rows.len(), 1);
        assert_eq!(first.rows[0][1], "new");
        assert_eq!(first.header, batch.header);

        let second = appender.filter_duplicates(&batch);
        assert!(second.is_empty());
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut appender = Appender::new(MemoryStore::new(100), DEFAULT_GROW_ROWS);
        let fresh = appender.filter_duplicates(&table(vec![
            data_row("a", "b", "first"),
            data_row("a", "b", "second"),
            data_row("a", "c", "third"),
        ]));

        let tags: Vec<&str> = fresh.rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(tags, vec!["first", "third"]);
    }

    #[test]
    fn test_nothing_to_upload() {
        let mut appender = Appender::new(seeded_store(1, 10), DEFAULT_GROW_ROWS);
        let outcome = appender.upload(&table(vec![data_row("s0", "e0", "dup")]));

        assert_eq!(outcome, UploadOutcome::NothingToUpload);
        assert_eq!(appender.store().rows().len(), 2);
    }

    #[test]
    fn test_grows_sheet_when_full() {
        let mut appender = Appender::new(seeded_store(2, 3), 5);
        let outcome = appender.upload(&table(vec![
            data_row("a", "b", "new1"),
            data_row("c", "d", "new2"),
        ]));

        assert_eq!(
            outcome,
            UploadOutcome::Appended {
                start_row: 4,
                rows: 2
            }
        );
        // rows 4 and 5 were needed, plus 5 spare
        assert_eq!(appender.store().row_capacity().unwrap(), 10);
    }

    #[test]
    fn test_seeding_failure_yields_empty_identities() {
        let store = FaultyStore {
            inner: seeded_store(2, 10),
            fail_column: true,
            ..Default::default()
        };
        let appender = Appender::new(store, DEFAULT_GROW_ROWS);
        assert!(appender.identities().is_empty());
    }

    #[test]
    fn test_header_read_failure_still_seeds() {
        let mut inner = seeded_store(2, 10);
        inner.write_row(1, &["Custom".to_string()]).unwrap();
        let store = FaultyStore {
            inner,
            fail_row: true,
            ..Default::default()
        };

        let appender = Appender::new(store, DEFAULT_GROW_ROWS);

        assert_eq!(appender.identities().len(), 2);
        assert!(appender.identities().contains("s1_e1"));
        // the header could not be checked, so it was left alone
        assert_eq!(appender.store().inner.rows()[0], vec!["Custom"]);
    }

    #[test]
    fn test_failed_upload_is_reported() {
        let store = FaultyStore {
            inner: seeded_store(2, 10),
            fail_column: true,
            ..Default::default()
        };
        let mut appender = Appender::new(store, DEFAULT_GROW_ROWS);
        let outcome = appender.upload(&table(vec![data_row("a", "b", "new")]));
        assert_eq!(outcome, UploadOutcome::Failed);
        assert_eq!(appender.store().block_writes, 0);
    }

    #[test]
    fn test_resize_failure_still_attempts_the_write() {
        let store = FaultyStore {
            inner: seeded_store(2, 3),
            fail_resize: true,
            ..Default::default()
        };
        let mut appender = Appender::new(store, DEFAULT_GROW_ROWS);

        let outcome = appender.upload(&table(vec![
            data_row("a", "b", "new1"),
            data_row("c", "d", "new2"),
        ]));

        // rows 4 and 5 do not fit in a 3 row sheet that could not grow
        assert_eq!(outcome, UploadOutcome::Failed);
        assert_eq!(appender.store().block_writes, 1);
        assert_eq!(appender.store().inner.rows().len(), 3);
    }

    #[test]
    fn test_append_plan_end_row() {
        let plan = AppendPlan {
            start_row: 12,
            rows: vec![vec![]; 3],
        };
        assert_eq!(plan.end_row(), 14);
    }
}
