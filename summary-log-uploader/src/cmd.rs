use std::path::{Path, PathBuf};

use anyhow::{Context, Error};
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::{
    appender::Appender,
    config::Config,
    context::AppContext,
    error::ToUserError,
    parse::{values::parse_date_bound, LogSet},
    query::{DurationMeanMode, RecordFilter},
    run::{upload_folder, RunSummary},
    source::FolderSource,
    store::{MemoryStore, SheetStore},
    table::{project, Table},
};

#[derive(Parser)]
#[command(version, about = "Uploads camera summary logs to a spreadsheet", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse every log file in a directory and append the new rows to the spreadsheet
    Upload {
        /// Directory holding the log files
        dir: PathBuf,

        /// Plan the upload against an empty in-memory sheet instead of the spreadsheet
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print record counts, time range and per-attempt statistics for one log file
    Stats {
        file: PathBuf,

        /// How unparsable durations count towards the mean. Defaults to DURATION_MEAN_MODE
        #[arg(long, value_enum)]
        mean_mode: Option<DurationMeanMode>,
    },
    /// Print the rows of one log file, optionally filtered
    Export {
        file: PathBuf,

        /// Earliest start time, either a full log timestamp or YYYY-MM-DD
        #[arg(long, value_parser = parse_date_bound)]
        from: Option<DateTime<FixedOffset>>,

        /// Latest start time, either a full log timestamp or YYYY-MM-DD
        #[arg(long, value_parser = parse_date_bound)]
        to: Option<DateTime<FixedOffset>>,

        /// Keep records where any attempt has this status code. Repeatable
        #[arg(long = "status")]
        statuses: Vec<String>,

        #[arg(long)]
        min_duration: Option<i64>,

        #[arg(long)]
        max_duration: Option<i64>,

        #[arg(long, value_enum, default_value_t = ExportFormat::Tsv)]
        format: ExportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Tsv,
    Json,
}

impl Cli {
    pub fn run(config: &Config) -> Result<(), Error> {
        Cli::parse().execute(config)
    }

    pub fn execute(&self, config: &Config) -> Result<(), Error> {
        match &self.command {
            Commands::Upload { dir, dry_run } => {
                let summary = upload(config, dir, *dry_run)?;
                if !summary.is_clean() {
                    warn!("Some files failed: {:?}", summary.files_failed);
                }
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Commands::Stats { file, mean_mode } => {
                let logs = load(file)?;
                let stats = logs.statistics(mean_mode.unwrap_or(config.duration_mean_mode));
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Commands::Export {
                file,
                from,
                to,
                statuses,
                min_duration,
                max_duration,
                format,
            } => {
                let filter = RecordFilter {
                    start: *from,
                    end: *to,
                    status_codes: statuses.clone(),
                    min_duration_ms: *min_duration,
                    max_duration_ms: *max_duration,
                };
                let table = export(&load(file)?, &filter);
                match format {
                    ExportFormat::Tsv => println!("{}", table.to_tsv()),
                    ExportFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
                }
            }
        }

        Ok(())
    }
}

fn load(file: &Path) -> Result<LogSet, Error> {
    LogSet::load(file).with_context(|| format!("Failed to parse {}", file.display()))
}

pub fn export(logs: &LogSet, filter: &RecordFilter) -> Table {
    let records = logs.filter(filter);
    info!("{} of {} records match", records.len(), logs.len());
    project(records)
}

pub fn upload(config: &Config, dir: &Path, dry_run: bool) -> Result<RunSummary, Error> {
    let source = FolderSource::new(dir, config.log_file_extension.0.clone())
        .user_error(format!("Log directory {} does not exist", dir.display()))?;

    let store: Box<dyn SheetStore> = if dry_run {
        info!("Dry run, nothing will be written to the spreadsheet");
        Box::new(MemoryStore::new(config.grow_rows))
    } else {
        Box::new(AppContext::new(config)?.sheets_client()?)
    };

    let mut appender = Appender::new(store, config.grow_rows);
    let summary = upload_folder(&source, &mut appender)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    Ok(summary)
}
