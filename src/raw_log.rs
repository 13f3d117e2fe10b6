//! Raw acquisition log reader and corrected-table writer.
//!
//! The log holds one JSON object per line. The first line is a full snapshot,
//! every following line carries only the fields that changed. The table is CSV
//! with the time expressed in fractional days since a fixed epoch.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

use crate::calendar::DAY_SECONDS;
use crate::model::{DataPoint, RawDiff};

pub const TABLE_HEADERS: [&str; 7] = [
    "day_offset",
    "currently",
    "today",
    "past_week",
    "since_installation",
    "integrated_day",
    "day_max",
];

#[derive(Debug, Error)]
pub enum RawLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse raw log line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Parses every non-blank line of `reader` into a diff. Line numbers in
/// errors are 1-based.
pub fn read_raw_log<R: BufRead>(reader: R) -> Result<Vec<RawDiff>, RawLogError> {
    let mut diffs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let diff = serde_json::from_str::<RawDiff>(trimmed).map_err(|err| RawLogError::Parse {
            line: idx + 1,
            message: err.to_string(),
        })?;
        diffs.push(diff);
    }
    Ok(diffs)
}

pub fn read_raw_log_file(path: &Path) -> Result<Vec<RawDiff>, RawLogError> {
    let file = File::open(path)?;
    read_raw_log(BufReader::new(file))
}

pub fn day_offset(time: i64, epoch_start: i64) -> f64 {
    (time - epoch_start) as f64 / DAY_SECONDS as f64
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes the corrected series as CSV. Unknown values become empty cells.
pub fn write_table<'a, W, P>(points: P, epoch_start: i64, writer: W) -> Result<u64, RawLogError>
where
    W: Write,
    P: IntoIterator<Item = &'a DataPoint>,
{
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(TABLE_HEADERS)?;

    let mut rows = 0_u64;
    for point in points {
        out.write_record([
            day_offset(point.time, epoch_start).to_string(),
            cell(point.currently),
            cell(point.today),
            cell(point.past_week),
            cell(point.since_installation),
            cell(point.integrated_day),
            cell(point.day_max),
        ])?;
        rows += 1;
    }

    out.flush()?;
    Ok(rows)
}
