//! Core data structures shared by the loaders, writers and GPS registry.
//!
//! [`UniformTable`] is the pivot between every input and output format;
//! [`GeoPoint`] is one entry of the GPS point registry.

use crate::error::Result;
use polars::prelude::{AnyValue, Column, DataFrame, DataType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Format-independent table: ordered, uniquely named columns of equal length
///
/// Backed by a polars [`DataFrame`], which already rejects duplicate column
/// names and ragged columns. Constructed once per load and never mutated.
#[derive(Debug, Clone)]
pub struct UniformTable {
    frame: DataFrame,
}

impl UniformTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Build a table from already named, equal-length columns
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        Ok(Self::new(DataFrame::new(columns)?))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Column names in declared order
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn dtypes(&self) -> Vec<DataType> {
        self.frame.dtypes()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// First `rows` rows as a new table; the source is left untouched
    pub fn head(&self, rows: usize) -> UniformTable {
        Self::new(self.frame.head(Some(rows)))
    }

    /// One row as a column name to scalar mapping, in column order
    pub fn row(&self, index: usize) -> Result<Map<String, Value>> {
        let mut row = Map::with_capacity(self.width());
        for column in self.frame.get_columns() {
            let value = column.get(index)?;
            row.insert(column.name().to_string(), scalar_to_json(&value));
        }
        Ok(row)
    }
}

/// Convert a polars scalar into its transport form
///
/// Non-finite floats have no JSON representation and become null.
pub fn scalar_to_json(value: &AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => float_to_json(f64::from(*v)),
        AnyValue::Float64(v) => float_to_json(*v),
        AnyValue::String(s) => Value::String((*s).to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// A stored GPS coordinate
///
/// Serialised with the `ID` / `Latitude` / `Longitude` field names used by
/// the HTTP listing and the CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample_table() -> UniformTable {
        UniformTable::from_columns(vec![
            Column::new("name".into(), &["ada", "grace", "linus"]),
            Column::new("score".into(), &[Some(9.5), None, Some(f64::NAN)]),
            Column::new("active".into(), &[true, false, true]),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_names_keep_order() {
        let table = sample_table();
        assert_eq!(table.column_names(), vec!["name", "score", "active"]);
        assert_eq!(table.width(), 3);
        assert_eq!(table.height(), 3);
    }

    #[test]
    fn test_row_mapping() {
        let table = sample_table();

        let first = table.row(0).unwrap();
        let keys: Vec<_> = first.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "score", "active"]);
        assert_eq!(first["name"], Value::from("ada"));
        assert_eq!(first["score"], Value::from(9.5));
        assert_eq!(first["active"], Value::Bool(true));

        // Null and NaN both surface as JSON null
        assert_eq!(table.row(1).unwrap()["score"], Value::Null);
        assert_eq!(table.row(2).unwrap()["score"], Value::Null);
    }

    #[test]
    fn test_head_does_not_touch_source() {
        let table = sample_table();
        let head = table.head(2);
        assert_eq!(head.height(), 2);
        assert_eq!(table.height(), 3);

        let beyond = table.head(50);
        assert_eq!(beyond.height(), 3);
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let result = UniformTable::from_columns(vec![
            Column::new("a".into(), &[1i64]),
            Column::new("a".into(), &[2i64]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_geo_point_field_names() {
        let point = GeoPoint {
            id: 1,
            latitude: 51.5072,
            longitude: -0.1276,
        };
        let json = serde_json::to_value(point).unwrap();
        assert_eq!(json["ID"], Value::from(1));
        assert_eq!(json["Latitude"], Value::from(51.5072));
        assert_eq!(json["Longitude"], Value::from(-0.1276));
    }
}
