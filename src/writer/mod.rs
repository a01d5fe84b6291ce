//! Tabular writers: serialise a [`UniformTable`] into a target format.
//!
//! Column order and names are written exactly as they appear in the table.
//! Typed targets keep numeric and boolean cells typed; text targets render
//! numbers in a locale-independent form.

pub mod csv;
pub mod xlsx;

#[cfg(test)]
pub mod tests;

use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use polars::prelude::DataType;
use tracing::debug;

/// Write `table` as `format`
pub fn write(table: &UniformTable, format: DataFormat) -> Result<Vec<u8>> {
    let writer = format
        .descriptor()
        .writer
        .ok_or(WorkbenchError::WriterUnavailable { format })?;

    let bytes = writer(table)?;
    debug!(
        "Wrote {} rows x {} columns as {} ({} bytes)",
        table.height(),
        table.width(),
        format,
        bytes.len()
    );
    Ok(bytes)
}

/// Dtypes written as numbers by typed targets
pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
