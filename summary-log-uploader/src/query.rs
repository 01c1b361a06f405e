use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::parse::{
    record::{LogRecord, ATTEMPT_SLOTS},
    values::{parse_duration_ms, parse_timestamp, try_parse_duration_ms},
    LogSet,
};

/// How unparsable durations contribute to the per-slot mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DurationMeanMode {
    /// Count them as 0 ms. Pulls the mean towards zero when slots are often empty.
    #[default]
    #[value(name = "zero_fill")]
    ZeroFill,
    /// Leave them out of the mean entirely.
    #[value(name = "skip")]
    Skip,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseDurationMeanModeError(pub String);

impl std::fmt::Display for ParseDurationMeanModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown duration mean mode {:?}, expected zero_fill or skip", self.0)
    }
}

impl std::error::Error for ParseDurationMeanModeError {}

impl FromStr for DurationMeanMode {
    type Err = ParseDurationMeanModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zero_fill" => Ok(Self::ZeroFill),
            "skip" => Ok(Self::Skip),
            other => Err(ParseDurationMeanModeError(other.to_string())),
        }
    }
}

/// Record-level predicates. An empty filter keeps everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub status_codes: Vec<String>,
    pub min_duration_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
}

impl RecordFilter {
    pub fn matches(&self, record: &LogRecord) -> bool {
        in_date_range(record, self.start, self.end)
            && (self.status_codes.is_empty() || has_status(record, &self.status_codes))
            && has_duration_within(record, self.min_duration_ms, self.max_duration_ms)
    }
}

/// Start time within `[start, end]`. Once either bound is set, records whose start
/// time does not parse never match.
pub fn in_date_range(
    record: &LogRecord,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    let Some(started) = record.start_date_time.as_deref().and_then(parse_timestamp) else {
        return false;
    };
    start.map_or(true, |s| started >= s) && end.map_or(true, |e| started <= e)
}

/// Any attempt carries one of `codes`.
pub fn has_status(record: &LogRecord, codes: &[String]) -> bool {
    record
        .status_codes()
        .flatten()
        .any(|code| codes.iter().any(|c| c == code))
}

/// Any attempt's duration lies within the bounds. Missing or unparsable durations
/// count as 0 ms here, so with no lower bound an empty slot always matches.
pub fn has_duration_within(record: &LogRecord, min: Option<i64>, max: Option<i64>) -> bool {
    record.durations().any(|duration| {
        let ms = parse_duration_ms(duration.unwrap_or_default());
        min.map_or(true, |m| ms >= m) && max.map_or(true, |m| ms <= m)
    })
}

impl LogSet {
    pub fn filter(&self, filter: &RecordFilter) -> Vec<&LogRecord> {
        self.iter().filter(|r| filter.matches(r)).collect()
    }

    pub fn filter_by_date(
        &self,
        start: Option<DateTime<FixedOffset>>,
        end: Option<DateTime<FixedOffset>>,
    ) -> Vec<&LogRecord> {
        self.iter()
            .filter(|r| in_date_range(r, start, end))
            .collect()
    }

    pub fn filter_by_status(&self, codes: &[u16]) -> Vec<&LogRecord> {
        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        self.iter().filter(|r| has_status(r, &codes)).collect()
    }

    pub fn filter_by_duration(&self, min: Option<i64>, max: Option<i64>) -> Vec<&LogRecord> {
        self.iter()
            .filter(|r| has_duration_within(r, min, max))
            .collect()
    }

    pub fn statistics(&self, mode: DurationMeanMode) -> Statistics {
        Statistics::compute(self.records(), mode)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttemptStatistics {
    /// 1-based attempt slot
    pub slot: usize,
    pub status_codes: BTreeMap<String, usize>,
    /// Records with no status code in this slot
    pub absent: usize,
    pub mean_duration_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_records: usize,
    pub date_range: DateRange,
    pub attempts: Vec<AttemptStatistics>,
    pub duration_mean_mode: DurationMeanMode,
}

impl Statistics {
    pub fn compute(records: &[LogRecord], mode: DurationMeanMode) -> Self {
        let starts: Vec<_> = records
            .iter()
            .filter_map(|r| r.start_date_time.as_deref().and_then(parse_timestamp))
            .collect();

        let attempts = (0..ATTEMPT_SLOTS)
            .map(|slot| slot_statistics(records, slot, mode))
            .collect();

        Self {
            total_records: records.len(),
            date_range: DateRange {
                start: starts.iter().min().copied(),
                end: starts.iter().max().copied(),
            },
            attempts,
            duration_mean_mode: mode,
        }
    }
}

fn slot_statistics(records: &[LogRecord], slot: usize, mode: DurationMeanMode) -> AttemptStatistics {
    let mut stats = AttemptStatistics {
        slot: slot + 1,
        ..Default::default()
    };

    for record in records {
        match record.attempts[slot].status_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                *stats.status_codes.entry(code.to_string()).or_default() += 1;
            }
            _ => stats.absent += 1,
        }
    }

    let durations = records
        .iter()
        .map(|r| r.attempts[slot].duration.as_deref().and_then(try_parse_duration_ms));
    let values: Vec<i64> = match mode {
        DurationMeanMode::ZeroFill => durations.map(|d| d.unwrap_or(0)).collect(),
        DurationMeanMode::Skip => durations.flatten().collect(),
    };
    // Summed as f64, log durations are unbounded and an i64 sum can overflow
    if !values.is_empty() {
        let total: f64 = values.iter().map(|&ms| ms as f64).sum();
        stats.mean_duration_ms = Some(total / values.len() as f64);
    }

    stats
}
