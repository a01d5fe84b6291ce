//! Tests for the tabular loaders
//!
//! Spreadsheet fixtures are produced with the xlsx writer and Stata fixtures
//! with a small release 118 encoder, so no binary files live in the repo.

pub mod csv_tests;
