//! Format registry: the supported dataset formats as data.
//!
//! Each [`FormatDescriptor`] binds an extension token to the loader and
//! writer that handle it. Formats on the upload allow-list without a bound
//! loader or writer still resolve; asking them to load or write fails with
//! a dedicated error instead of being skipped.

use crate::error::{Result, WorkbenchError};
use crate::loader::{csv as csv_loader, excel, stata};
use crate::models::UniformTable;
use crate::writer::{csv as csv_writer, xlsx};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Parses a blob into a uniform table
pub type LoaderFn = fn(&[u8]) -> Result<UniformTable>;

/// Serialises a uniform table into a byte stream
pub type WriterFn = fn(&UniformTable) -> Result<Vec<u8>>;

/// Dataset formats on the upload allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Xlsx,
    Xls,
    Sas7bdat,
    Sav,
    Dta,
    #[serde(rename = "rdata")]
    RData,
}

/// Registry entry for one format
#[derive(Debug, Clone, Copy)]
pub struct FormatDescriptor {
    pub format: DataFormat,
    pub extension: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
    pub loader: Option<LoaderFn>,
    pub writer: Option<WriterFn>,
}

impl FormatDescriptor {
    pub fn can_load(&self) -> bool {
        self.loader.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.writer.is_some()
    }
}

/// Every supported format. Extensions are lowercase and unique.
pub static FORMATS: [FormatDescriptor; 7] = [
    FormatDescriptor {
        format: DataFormat::Csv,
        extension: "csv",
        description: "Comma-separated values",
        mime_type: "text/csv",
        loader: Some(csv_loader::load),
        writer: Some(csv_writer::write),
    },
    FormatDescriptor {
        format: DataFormat::Xlsx,
        extension: "xlsx",
        description: "Excel 2007+ workbook",
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        loader: Some(excel::load),
        writer: Some(xlsx::write),
    },
    FormatDescriptor {
        format: DataFormat::Xls,
        extension: "xls",
        description: "Excel 97-2003 workbook",
        mime_type: "application/vnd.ms-excel",
        loader: Some(excel::load),
        writer: None,
    },
    FormatDescriptor {
        format: DataFormat::Sas7bdat,
        extension: "sas7bdat",
        description: "SAS dataset",
        mime_type: "application/x-sas-data",
        loader: None,
        writer: None,
    },
    FormatDescriptor {
        format: DataFormat::Sav,
        extension: "sav",
        description: "SPSS system file",
        mime_type: "application/x-spss-sav",
        loader: None,
        writer: None,
    },
    FormatDescriptor {
        format: DataFormat::Dta,
        extension: "dta",
        description: "Stata dataset (release 117+)",
        mime_type: "application/x-stata-dta",
        loader: Some(stata::load),
        writer: None,
    },
    FormatDescriptor {
        format: DataFormat::RData,
        extension: "rdata",
        description: "R workspace",
        mime_type: "application/x-r-data",
        loader: None,
        writer: None,
    },
];

impl DataFormat {
    /// Registry entry for this format
    pub fn descriptor(self) -> &'static FormatDescriptor {
        let index = match self {
            DataFormat::Csv => 0,
            DataFormat::Xlsx => 1,
            DataFormat::Xls => 2,
            DataFormat::Sas7bdat => 3,
            DataFormat::Sav => 4,
            DataFormat::Dta => 5,
            DataFormat::RData => 6,
        };
        &FORMATS[index]
    }

    pub fn extension(self) -> &'static str {
        self.descriptor().extension
    }

    pub fn mime_type(self) -> &'static str {
        self.descriptor().mime_type
    }

    /// Look up a format by extension token, ignoring case and a leading dot
    pub fn from_extension(extension: &str) -> Option<Self> {
        let token = extension.trim().trim_start_matches('.');
        FORMATS
            .iter()
            .find(|descriptor| descriptor.extension.eq_ignore_ascii_case(token))
            .map(|descriptor| descriptor.format)
    }

    /// Format implied by a file name or path's final extension
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resolve an extension token against the registry
pub fn resolve(extension: &str) -> Result<&'static FormatDescriptor> {
    DataFormat::from_extension(extension)
        .map(DataFormat::descriptor)
        .ok_or_else(|| WorkbenchError::UnsupportedFormat {
            format: extension.to_string(),
        })
}

/// Formats that can be produced by conversion
pub fn writable_formats() -> impl Iterator<Item = DataFormat> {
    FORMATS
        .iter()
        .filter(|descriptor| descriptor.can_write())
        .map(|descriptor| descriptor.format)
}
