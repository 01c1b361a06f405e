use super::record::{
    Attempt, LogRecord, ATTEMPT_WIDTH, PREAMBLE_LEN, SUMMARY_MARKER, TRAILER_LEN,
};

const DELIMITER: char = ';';

/// True if the line's first field, trimmed, is the summary marker.
pub fn is_summary_line(line: &str) -> bool {
    line.trim()
        .split(DELIMITER)
        .next()
        .is_some_and(|first| first.trim() == SUMMARY_MARKER)
}

/// Decodes a line if it is a summary line, and skips it otherwise.
pub fn decode(line: &str) -> Option<LogRecord> {
    is_summary_line(line).then(|| decode_line(line))
}

/// Decodes one `;`-delimited line into a full record. Never fails: any position the
/// line does not reach is left as `None`.
///
/// Layout is positional: seven preamble fields, then up to five groups of
/// (status code, error, duration, request id, timestamp), then hash and session id.
/// Once a line has room for the trailer, the last two tokens are always the
/// hash and session id, and attempt groups are only read from the tokens in
/// between. A shorter line is read as preamble plus whatever attempt fields it has.
pub fn decode_line(line: &str) -> LogRecord {
    let tokens: Vec<&str> = line.trim().split(DELIMITER).collect();
    let token = |index: usize| tokens.get(index).map(|t| t.to_string());

    let has_trailer = tokens.len() >= PREAMBLE_LEN + TRAILER_LEN;
    let attempts_end = if has_trailer {
        tokens.len() - TRAILER_LEN
    } else {
        tokens.len()
    };
    let attempt_token = |index: usize| {
        if index < attempts_end {
            token(index)
        } else {
            None
        }
    };

    let mut record = LogRecord {
        record_type: tokens[0].to_string(),
        camera_system_name: token(1),
        best_shot_id: token(2),
        start_date_time: token(3),
        quality: token(4),
        quality_errors: token(5),
        end_date_time: token(6),
        ..Default::default()
    };

    let mut cursor = PREAMBLE_LEN;
    for attempt in record.attempts.iter_mut() {
        // Input exhausted, every remaining group stays empty
        if cursor >= attempts_end {
            break;
        }
        *attempt = Attempt {
            status_code: attempt_token(cursor),
            error: attempt_token(cursor + 1),
            // Anything without a unit is a shifted field, not a duration
            duration: attempt_token(cursor + 2).filter(|d| d.contains("ms")),
            request_id: attempt_token(cursor + 3),
            date_time: attempt_token(cursor + 4),
        };
        cursor += ATTEMPT_WIDTH;
    }

    if has_trailer {
        record.hash = token(tokens.len() - 2);
        record.session_id = token(tokens.len() - 1);
    }

    record
}
