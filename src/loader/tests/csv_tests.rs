//! Tests for the CSV loader

use crate::error::ErrorKind;
use crate::formats::DataFormat;
use crate::loader::{load, load_non_empty};
use polars::prelude::DataType;
use serde_json::Value;

const CITIES: &str = "city,population,area_km2,capital
London,8982000,1572.0,True
Paris,2161000,105.4,True
Manchester,553230,115.6,False
";

#[test]
fn test_load_header_and_rows() {
    let table = load(CITIES.as_bytes(), DataFormat::Csv).unwrap();

    assert_eq!(
        table.column_names(),
        vec!["city", "population", "area_km2", "capital"]
    );
    assert_eq!(table.height(), 3);
    assert_eq!(
        table.dtypes(),
        vec![
            DataType::String,
            DataType::Int64,
            DataType::Float64,
            DataType::Boolean
        ]
    );

    let row = table.row(2).unwrap();
    assert_eq!(row["city"], Value::from("Manchester"));
    assert_eq!(row["population"], Value::from(553230));
    assert_eq!(row["capital"], Value::Bool(false));
}

#[test]
fn test_quoted_fields() {
    let blob = "name,notes\n\"Smith, Jane\",\"said \"\"hi\"\"\"\n";
    let table = load(blob.as_bytes(), DataFormat::Csv).unwrap();
    let row = table.row(0).unwrap();
    assert_eq!(row["name"], Value::from("Smith, Jane"));
    assert_eq!(row["notes"], Value::from("said \"hi\""));
}

#[test]
fn test_header_only_is_empty_table() {
    let table = load(b"id,name,score\n", DataFormat::Csv).unwrap();
    assert_eq!(table.column_names(), vec!["id", "name", "score"]);
    assert_eq!(table.height(), 0);
}

#[test]
fn test_header_only_rejected_when_rows_required() {
    let error = load_non_empty(b"id,name\n", DataFormat::Csv).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::EmptyInput);
}

#[test]
fn test_blank_blob_is_empty_input() {
    for blob in [&b""[..], &b"\n\n  \n"[..]] {
        let error = load(blob, DataFormat::Csv).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::EmptyInput);
    }
}

#[test]
fn test_ragged_rows_are_malformed() {
    let blob = "a,b,c\n1,2,3\n4,5\n";
    let error = load(blob.as_bytes(), DataFormat::Csv).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedInput);
    assert!(error.to_string().contains("expected 3"));
}

#[test]
fn test_invalid_utf8_is_malformed() {
    let blob = b"name\n\xff\xfe\xfd\n";
    let error = load(blob, DataFormat::Csv).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MalformedInput);
}

#[test]
fn test_duplicate_headers_are_suffixed() {
    let blob = "id,value,value\n1,a,b\n";
    let table = load(blob.as_bytes(), DataFormat::Csv).unwrap();
    assert_eq!(table.column_names(), vec!["id", "value", "value.1"]);
    let row = table.row(0).unwrap();
    assert_eq!(row["value"], Value::from("a"));
    assert_eq!(row["value.1"], Value::from("b"));
}

#[test]
fn test_byte_order_mark_is_ignored() {
    let blob = b"\xEF\xBB\xBFid,name\n1,x\n";
    let table = load(blob, DataFormat::Csv).unwrap();
    assert_eq!(table.column_names(), vec!["id", "name"]);
}

#[test]
fn test_missing_markers_load_as_null() {
    let blob = "id,reading\n1,NA\n2,\n3,4.25\n";
    let table = load(blob.as_bytes(), DataFormat::Csv).unwrap();
    let reading = table.frame().column("reading").unwrap();
    assert_eq!(reading.dtype(), &DataType::Float64);
    assert_eq!(reading.null_count(), 2);
    assert_eq!(table.row(0).unwrap()["reading"], Value::Null);
}
