//! XLSX writer.
//!
//! One worksheet, header in the first row. Null cells stay blank, as do
//! non-finite floats which a worksheet cannot hold. The document creation
//! time is pinned so the same table always yields the same bytes.

use super::is_numeric;
use crate::constants::{XLSX_MAX_COLUMNS, XLSX_MAX_ROWS, XLSX_SHEET_NAME};
use crate::error::{Result, WorkbenchError};
use crate::formats::DataFormat;
use crate::models::UniformTable;
use polars::prelude::{Column, DataType};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet, XlsxError};

pub fn write(table: &UniformTable) -> Result<Vec<u8>> {
    let frame = table.frame();
    if frame.height() >= XLSX_MAX_ROWS {
        return Err(WorkbenchError::write_failed(
            DataFormat::Xlsx,
            format!(
                "{} rows do not fit in one worksheet (limit {})",
                frame.height(),
                XLSX_MAX_ROWS - 1
            ),
        ));
    }
    if frame.width() > XLSX_MAX_COLUMNS {
        return Err(WorkbenchError::write_failed(
            DataFormat::Xlsx,
            format!(
                "{} columns do not fit in one worksheet (limit {})",
                frame.width(),
                XLSX_MAX_COLUMNS
            ),
        ));
    }

    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(2000, 1, 1).map_err(xlsx_error)?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(XLSX_SHEET_NAME).map_err(xlsx_error)?;

    for (index, column) in frame.get_columns().iter().enumerate() {
        let col = index as u16;
        worksheet
            .write_string(0, col, column.name().as_str())
            .map_err(xlsx_error)?;
        write_column(worksheet, col, column)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_column(worksheet: &mut Worksheet, col: u16, column: &Column) -> Result<()> {
    let series = column.as_materialized_series();
    let dtype = series.dtype();

    if is_numeric(dtype) {
        let values = series.cast(&DataType::Float64)?;
        for (row, value) in values.f64()?.into_iter().enumerate() {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                worksheet
                    .write_number(sheet_row(row), col, value)
                    .map_err(xlsx_error)?;
            }
        }
    } else if dtype == &DataType::Boolean {
        for (row, value) in series.bool()?.into_iter().enumerate() {
            if let Some(value) = value {
                worksheet
                    .write_boolean(sheet_row(row), col, value)
                    .map_err(xlsx_error)?;
            }
        }
    } else {
        let values = series.cast(&DataType::String)?;
        for (row, value) in values.str()?.into_iter().enumerate() {
            if let Some(value) = value {
                worksheet
                    .write_string(sheet_row(row), col, value)
                    .map_err(xlsx_error)?;
            }
        }
    }

    Ok(())
}

/// Worksheet row for a data row; row 0 holds the header
fn sheet_row(row: usize) -> u32 {
    (row + 1) as u32
}

fn xlsx_error(error: XlsxError) -> WorkbenchError {
    WorkbenchError::write_failed(DataFormat::Xlsx, error.to_string())
}
