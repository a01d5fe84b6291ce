//! Dataset Workbench Library
//!
//! Uploads, previews and converts tabular datasets, and keeps an in-memory
//! registry of GPS points.
//!
//! This library provides tools for:
//! - Resolving dataset formats through a static capability table
//! - Loading CSV, Excel (xlsx/xls) and Stata (dta 117-119) files into one
//!   uniform table representation
//! - Bounded, non-destructive previews
//! - Writing tables as CSV or XLSX
//! - A GPS point registry with CSV export and Leaflet map rendering
//! - An axum HTTP service exposing all of the above

pub mod config;
pub mod constants;
pub mod converter;
pub mod error;
pub mod formats;
pub mod gps;
pub mod loader;
pub mod models;
pub mod preview;
pub mod server;
pub mod storage;
pub mod writer;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{IdPolicy, MapConfig, WorkbenchConfig};
pub use converter::{ConvertedDataset, Converter, UploadedDataset};
pub use error::{ErrorKind, Result, WorkbenchError};
pub use formats::{DataFormat, FormatDescriptor};
pub use gps::PointRegistry;
pub use models::{GeoPoint, UniformTable};
pub use preview::DatasetPreview;
pub use storage::UploadStore;
