//! Tests for the tabular writers


use crate::models::UniformTable;
use polars::prelude::Column;

/// Small mixed-type table used by the writer tests
pub fn readings_table() -> UniformTable {
    UniformTable::from_columns(vec![
        Column::new("station".into(), &[Some("HEATHROW"), Some("KEW"), None]),
        Column::new("reading".into(), &[Some(12.5), None, Some(-3.25)]),
        Column::new("count".into(), &[3i64, 0, 7]),
        Column::new("valid".into(), &[Some(true), Some(false), None]),
    ])
    .unwrap()
}
