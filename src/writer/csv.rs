//! CSV writer backed by the polars CSV serialiser.

use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use polars::prelude::{CsvWriter, SerWriter};

/// Options for CSV output
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub separator: u8,
    /// Fixed number of fractional digits for float columns; `None` keeps
    /// the shortest exact representation
    pub float_precision: Option<usize>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            float_precision: None,
        }
    }
}

pub fn write(table: &UniformTable) -> Result<Vec<u8>> {
    write_with_options(table, &CsvOptions::default())
}

/// Write `table` as CSV; the header row is always present
pub fn write_with_options(table: &UniformTable, options: &CsvOptions) -> Result<Vec<u8>> {
    let mut frame = table.frame().clone();
    let mut buffer = Vec::new();

    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(options.separator)
        .with_float_precision(options.float_precision)
        .finish(&mut frame)
        .map_err(|e| WorkbenchError::write_failed(DataFormat::Csv, e.to_string()))?;

    Ok(buffer)
}
