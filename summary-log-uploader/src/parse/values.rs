use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

/// `2024-12-02 18:00:00.000000 +0300`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Parses a log timestamp. Anything that does not match the log format is `None`, not an error.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if !has_log_shape(value) {
        return None;
    }
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

// chrono treats the fraction as optional and takes `+03:00` for `%z`, the log
// format always has both a fraction and a `+HHMM` offset
fn has_log_shape(value: &str) -> bool {
    let mut parts = value.split(' ');
    let (Some(_), Some(time), Some(offset), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let has_fraction = time.split_once('.').is_some_and(|(_, fraction)| {
        !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit())
    });
    let has_offset = offset.len() == 5
        && offset.starts_with(['+', '-'])
        && offset[1..].bytes().all(|b| b.is_ascii_digit());

    has_fraction && has_offset
}

/// Accepts either a full log timestamp or a bare `YYYY-MM-DD`, which is read as midnight UTC.
pub fn parse_date_bound(value: &str) -> Result<DateTime<FixedOffset>, String> {
    if let Some(ts) = parse_timestamp(value) {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD or a log timestamp, got {value:?}: {e}"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid date {value:?}"))?;
    Ok(Utc.from_utc_datetime(&midnight).fixed_offset())
}

/// Parses `"<n> ms"` into milliseconds, or `None` if the value is not a number once the unit is removed.
pub fn try_parse_duration_ms(value: &str) -> Option<i64> {
    value.replace(" ms", "").trim().parse().ok()
}

/// Like `try_parse_duration_ms`, but unparsable values count as zero. Callers that need
/// to tell "no duration" from "zero duration" should use the fallible version.
pub fn parse_duration_ms(value: &str) -> i64 {
    try_parse_duration_ms(value).unwrap_or(0)
}
