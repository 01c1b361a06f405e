use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    appender::{Appender, UploadOutcome},
    error::SourceError,
    parse::LogSet,
    source::FolderSource,
    store::SheetStore,
};

/// What happened across one run over a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_seen: usize,
    pub files_uploaded: usize,
    pub files_unchanged: usize,
    pub files_failed: Vec<String>,
    pub records_parsed: usize,
    pub rows_appended: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.files_failed.is_empty()
    }
}

/// Uploads every log file in `source`, in name order, through one appender so
/// duplicates are caught across files as well as within them. A file that cannot
/// be read or written is logged and skipped; only failing to list the directory
/// stops the run.
pub fn upload_folder<S: SheetStore>(
    source: &FolderSource,
    appender: &mut Appender<S>,
) -> Result<RunSummary, SourceError> {
    let keys = source.keys()?;
    let mut summary = RunSummary {
        files_seen: keys.len(),
        ..Default::default()
    };

    if keys.is_empty() {
        warn!(
            "No .{} files found in {:?}",
            source.extension, source.path
        );
        return Ok(summary);
    }

    for key in keys {
        info!("Processing {}", key);
        metrics::counter!("summary_files_processed_total").increment(1);

        let logs = match source
            .path_for(&key)
            .map_err(anyhow::Error::from)
            .and_then(LogSet::load)
        {
            Ok(logs) => logs,
            Err(e) => {
                error!("Skipping {}: {:?}", key, e);
                metrics::counter!("summary_files_failed_total").increment(1);
                summary.files_failed.push(key);
                continue;
            }
        };
        summary.records_parsed += logs.len();
        info!("Parsed {} summary records from {}", logs.len(), key);

        match appender.upload(&logs.to_table()) {
            UploadOutcome::Appended { rows, .. } => {
                summary.files_uploaded += 1;
                summary.rows_appended += rows;
            }
            UploadOutcome::NothingToUpload => summary.files_unchanged += 1,
            UploadOutcome::Failed => {
                metrics::counter!("summary_files_failed_total").increment(1);
                summary.files_failed.push(key);
            }
        }
    }

    info!(
        "Run finished: {} files, {} rows appended, {} failed",
        summary.files_seen,
        summary.rows_appended,
        summary.files_failed.len()
    );
    Ok(summary)
}
