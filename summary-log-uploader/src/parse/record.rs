/// Marker carried in the first field of every line we care about.
pub const SUMMARY_MARKER: &str = "Summary data";

/// Placeholder written for any field that is absent or blank once a record leaves the process.
pub const SENTINEL: &str = " ";

/// Number of retried sub-requests a single summary line can describe.
pub const ATTEMPT_SLOTS: usize = 5;

/// Fields per attempt group: status code, error, duration, request id, timestamp.
pub const ATTEMPT_WIDTH: usize = 5;

/// Fixed fields at the start of a line, before the first attempt group.
pub const PREAMBLE_LEN: usize = 7;

/// Fields at the very end of a line (hash and session id).
pub const TRAILER_LEN: usize = 2;

pub const COLUMN_COUNT: usize = PREAMBLE_LEN + ATTEMPT_SLOTS * ATTEMPT_WIDTH + TRAILER_LEN;

/// Canonical column order, shared by the table projection and the destination header row.
pub const HEADER: [&str; COLUMN_COUNT] = [
    "Type",
    "CameraSystemName",
    "BestShotId",
    "Start DateTime",
    "Quality",
    "QualityErrors",
    "End DateTime",
    "Status Code 1",
    "Error 1",
    "Duration 1",
    "Request ID 1",
    "DateTime 1",
    "Status Code 2",
    "Error 2",
    "Duration 2",
    "Request ID 2",
    "DateTime 2",
    "Status Code 3",
    "Error 3",
    "Duration 3",
    "Request ID 3",
    "DateTime 3",
    "Status Code 4",
    "Error 4",
    "Duration 4",
    "Request ID 4",
    "DateTime 4",
    "Status Code 5",
    "Error 5",
    "Duration 5",
    "Request ID 5",
    "DateTime 5",
    "Hash",
    "Session ID",
];

/// 0-based positions of the identity columns within `HEADER`.
pub const START_DATE_TIME_INDEX: usize = 3;
pub const END_DATE_TIME_INDEX: usize = 6;

pub fn canonical_header() -> Vec<String> {
    HEADER.iter().map(|h| h.to_string()).collect()
}

/// Renders an optional field the way the destination expects it: absent and blank
/// values both collapse to the sentinel.
pub fn render(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => SENTINEL,
    }
}

/// One sub-request attempt. `None` means the line ran out before this field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempt {
    pub status_code: Option<String>,
    pub error: Option<String>,
    pub duration: Option<String>,
    pub request_id: Option<String>,
    pub date_time: Option<String>,
}

impl Attempt {
    fn fields(&self) -> [Option<&str>; ATTEMPT_WIDTH] {
        [
            self.status_code.as_deref(),
            self.error.as_deref(),
            self.duration.as_deref(),
            self.request_id.as_deref(),
            self.date_time.as_deref(),
        ]
    }
}

/// A decoded summary line. Always carries every column of `HEADER`; missing
/// positions are `None` rather than a placeholder string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    pub record_type: String,
    pub camera_system_name: Option<String>,
    pub best_shot_id: Option<String>,
    pub start_date_time: Option<String>,
    pub quality: Option<String>,
    pub quality_errors: Option<String>,
    pub end_date_time: Option<String>,
    pub attempts: [Attempt; ATTEMPT_SLOTS],
    pub hash: Option<String>,
    pub session_id: Option<String>,
}

impl LogRecord {
    /// Every field in canonical column order.
    pub fn fields(&self) -> Vec<Option<&str>> {
        let mut fields = Vec::with_capacity(COLUMN_COUNT);
        fields.extend([
            Some(self.record_type.as_str()),
            self.camera_system_name.as_deref(),
            self.best_shot_id.as_deref(),
            self.start_date_time.as_deref(),
            self.quality.as_deref(),
            self.quality_errors.as_deref(),
            self.end_date_time.as_deref(),
        ]);
        for attempt in &self.attempts {
            fields.extend(attempt.fields());
        }
        fields.extend([self.hash.as_deref(), self.session_id.as_deref()]);
        fields
    }

    /// Looks a field up by its column name. Unknown columns and absent fields are both `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = HEADER.iter().position(|h| *h == column)?;
        self.fields()[index]
    }

    pub fn status_codes(&self) -> impl Iterator<Item = Option<&str>> {
        self.attempts.iter().map(|a| a.status_code.as_deref())
    }

    pub fn durations(&self) -> impl Iterator<Item = Option<&str>> {
        self.attempts.iter().map(|a| a.duration.as_deref())
    }
}
