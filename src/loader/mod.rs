//! Tabular loaders: turn an uploaded blob into a [`UniformTable`].
//!
//! The loader for a format is looked up in the format registry. Delimited
//! and sheet formats take their column names from the first row; Stata
//! files take them from the variable labels. Every loader funnels its cells
//! through [`columns`] so type inference, null handling and duplicate name
//! resolution behave the same regardless of the source encoding.

pub mod columns;
pub mod csv;
pub mod excel;
pub mod stata;

#[cfg(test)]
pub mod tests;

use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use tracing::debug;

/// Load `blob` as `format`
pub fn load(blob: &[u8], format: DataFormat) -> Result<UniformTable> {
    let descriptor = format.descriptor();
    let loader = descriptor
        .loader
        .ok_or(WorkbenchError::LoaderUnavailable { format })?;

    let table = loader(blob)?;
    debug!(
        "Loaded {} blob ({} bytes): {} columns, {} rows",
        format,
        blob.len(),
        table.width(),
        table.height()
    );
    Ok(table)
}

/// Load and insist on at least one data row
pub fn load_non_empty(blob: &[u8], format: DataFormat) -> Result<UniformTable> {
    let table = load(blob, format)?;
    if table.is_empty() {
        return Err(WorkbenchError::EmptyInput { format });
    }
    Ok(table)
}
