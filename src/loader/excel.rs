//! Excel loader for both `.xlsx` and legacy `.xls` workbooks.
//!
//! Only the first worksheet is read. Its first row is the header; numeric
//! and boolean cells keep their type, text is never re-parsed. Spreadsheets
//! store every number as a double, so whole numbers load as integers and a
//! column of them comes back as `Int64`.

use super::columns::{RawCell, TextPolicy, build_table};
use crate::constants::{MAX_EXACT_FLOAT_INT, SPREADSHEET_DATETIME_FORMAT};
use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::debug;

pub fn load(blob: &[u8]) -> Result<UniformTable> {
    let format = sniff_format(blob);
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(blob))
        .map_err(|e| WorkbenchError::malformed(format, e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbenchError::EmptyInput { format })?
        .map_err(|e| WorkbenchError::malformed(format, e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(header_text).collect(),
        None => return Err(WorkbenchError::EmptyInput { format }),
    };

    let body: Vec<Vec<RawCell>> = rows
        .map(|cells| cells.iter().map(to_raw_cell).collect())
        .collect();

    debug!(
        "Read worksheet {:?}: {} columns, {} rows",
        sheet_names.first(),
        header.len(),
        body.len()
    );

    build_table(header, body, TextPolicy::Keep)
}

/// Zip containers are OOXML; anything else is treated as a legacy workbook
fn sniff_format(blob: &[u8]) -> DataFormat {
    if blob.starts_with(b"PK\x03\x04") {
        DataFormat::Xlsx
    } else {
        DataFormat::Xls
    }
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
        other => other.to_string(),
    }
}

fn to_raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Empty,
        Data::Int(v) => RawCell::Int(*v),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < MAX_EXACT_FLOAT_INT => {
            RawCell::Int(*v as i64)
        }
        Data::Float(v) => RawCell::Float(*v),
        Data::Bool(v) => RawCell::Bool(*v),
        Data::String(s) => RawCell::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(datetime) => {
                RawCell::Text(datetime.format(SPREADSHEET_DATETIME_FORMAT).to_string())
            }
            None => RawCell::Text(cell.to_string()),
        },
    }
}
