use std::io::BufRead;

use anyhow::{Context, Error};
use tracing::{debug, trace};

use super::{decode::decode, record::LogRecord, Parsed};

const NEWLINE_DELIM: u8 = b'\n';

/// Reads newline-delimited text and hands every line to `inner`, collecting what it keeps.
///
/// Lines are split on raw bytes and converted lossily, so a stray invalid utf8 sequence
/// costs us one garbled field rather than the whole file.
pub fn newline_delim<T, R: BufRead>(
    mut reader: R,
    inner: impl Fn(&str) -> Option<T>,
) -> Result<Parsed<Vec<T>>, Error> {
    let mut buffer = Vec::new();
    let mut output = Vec::new();
    let mut consumed = 0;

    loop {
        buffer.clear();
        let read = reader
            .read_until(NEWLINE_DELIM, &mut buffer)
            .with_context(|| format!("Failed to read line {}", consumed + 1))?;
        if read == 0 {
            break;
        }
        consumed += 1;

        let line = String::from_utf8_lossy(&buffer);
        match inner(&line) {
            Some(parsed) => output.push(parsed),
            None => trace!("skipping line {consumed}"),
        }
    }

    Ok(Parsed {
        data: output,
        consumed,
    })
}

/// Decodes every summary line of a log, discarding the rest.
pub fn summary_lines<R: BufRead>(reader: R) -> Result<Parsed<Vec<LogRecord>>, Error> {
    let parsed = newline_delim(reader, decode)?;
    debug!(
        "read {} lines, kept {} summary records",
        parsed.consumed,
        parsed.data.len()
    );
    Ok(parsed)
}
