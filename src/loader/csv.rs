//! CSV loader.
//!
//! The first record is the header. Every following record must have the
//! same width; a ragged record or invalid UTF-8 makes the whole blob
//! malformed rather than being patched up.

use super::columns::{RawCell, TextPolicy, build_table};
use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use csv::{ErrorKind as CsvErrorKind, ReaderBuilder, StringRecord};
use tracing::debug;

pub fn load(blob: &[u8]) -> Result<UniformTable> {
    let blob = blob.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(blob);
    if blob.iter().all(u8::is_ascii_whitespace) {
        return Err(WorkbenchError::EmptyInput {
            format: DataFormat::Csv,
        });
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(blob);

    let header: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record).map_err(malformed)? {
        rows.push(
            record
                .iter()
                .map(|field| RawCell::Text(field.to_string()))
                .collect(),
        );
    }

    debug!(
        "Parsed CSV with {} columns and {} records",
        header.len(),
        rows.len()
    );

    build_table(header, rows, TextPolicy::Infer)
}

fn malformed(error: csv::Error) -> WorkbenchError {
    let reason = match error.kind() {
        CsvErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.as_ref().map_or(0, |pos| pos.line());
            format!("line {line} has {len} fields, expected {expected_len}")
        }
        CsvErrorKind::Utf8 { pos, .. } => {
            let line = pos.as_ref().map_or(0, |pos| pos.line());
            format!("line {line} is not valid UTF-8")
        }
        _ => error.to_string(),
    };
    WorkbenchError::malformed(DataFormat::Csv, reason)
}
