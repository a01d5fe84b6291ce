//! Error handling for dataset and GPS registry operations.
//!
//! Every failure is classified into an [`ErrorKind`] so the transport layer
//! can hand callers a stable, machine-readable indicator next to the
//! human-readable message.

use crate::formats::DataFormat;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("No file part")]
    NoFileProvided,

    #[error("No selected file")]
    EmptyFilename,

    #[error("File type not allowed")]
    FileTypeNotAllowed { file_name: String },

    #[error("Unsupported format")]
    UnsupportedFormat { format: String },

    #[error("No loader is available for {format} files")]
    LoaderUnavailable { format: DataFormat },

    #[error("No writer is available for {format} files")]
    WriterUnavailable { format: DataFormat },

    #[error("Could not determine the format of '{reference}'")]
    FormatResolution { reference: String },

    #[error("Malformed {format} input: {reason}")]
    MalformedInput { format: DataFormat, reason: String },

    #[error("The {format} input contains no header or rows")]
    EmptyInput { format: DataFormat },

    #[error("Invalid GPS coordinates: {reason}")]
    InvalidCoordinates { reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Uploaded dataset not found: {}", path.display())]
    BlobNotFound { path: PathBuf },

    #[error("Failed to write {format} output: {reason}")]
    WriteFailed { format: DataFormat, reason: String },

    #[error("Map rendering failed: {reason}")]
    Render { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Stable classification of a [`WorkbenchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NoFileProvided,
    EmptyFilename,
    UnsupportedFormat,
    MalformedInput,
    EmptyInput,
    InvalidCoordinates,
    FormatResolutionError,
    BadRequest,
    NotFound,
    WriteFailed,
    Configuration,
    Io,
    Internal,
}

impl WorkbenchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkbenchError::NoFileProvided => ErrorKind::NoFileProvided,
            WorkbenchError::EmptyFilename => ErrorKind::EmptyFilename,
            WorkbenchError::FileTypeNotAllowed { .. }
            | WorkbenchError::UnsupportedFormat { .. }
            | WorkbenchError::LoaderUnavailable { .. }
            | WorkbenchError::WriterUnavailable { .. } => ErrorKind::UnsupportedFormat,
            WorkbenchError::FormatResolution { .. } => ErrorKind::FormatResolutionError,
            WorkbenchError::MalformedInput { .. } => ErrorKind::MalformedInput,
            WorkbenchError::EmptyInput { .. } => ErrorKind::EmptyInput,
            WorkbenchError::InvalidCoordinates { .. } => ErrorKind::InvalidCoordinates,
            WorkbenchError::InvalidRequest { .. } => ErrorKind::BadRequest,
            WorkbenchError::BlobNotFound { .. } => ErrorKind::NotFound,
            WorkbenchError::WriteFailed { .. } => ErrorKind::WriteFailed,
            WorkbenchError::Configuration { .. } => ErrorKind::Configuration,
            WorkbenchError::Io(_) => ErrorKind::Io,
            WorkbenchError::Render { .. }
            | WorkbenchError::Polars(_)
            | WorkbenchError::TaskFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Create a malformed input error for the given format
    pub fn malformed(format: DataFormat, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            format,
            reason: reason.into(),
        }
    }

    /// Create an invalid coordinates error
    pub fn invalid_coordinates(reason: impl Into<String>) -> Self {
        Self::InvalidCoordinates {
            reason: reason.into(),
        }
    }

    /// Create a write failure for the given target format
    pub fn write_failed(format: DataFormat, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            format,
            reason: reason.into(),
        }
    }

    /// True when the caller sent something we cannot act on, as opposed to a
    /// failure on our side
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Io | ErrorKind::Internal | ErrorKind::Configuration
        )
    }
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_variants_share_kind() {
        let errors = [
            WorkbenchError::FileTypeNotAllowed {
                file_name: "payload.exe".to_string(),
            },
            WorkbenchError::UnsupportedFormat {
                format: "parquet".to_string(),
            },
            WorkbenchError::LoaderUnavailable {
                format: DataFormat::Sav,
            },
            WorkbenchError::WriterUnavailable {
                format: DataFormat::Xls,
            },
        ];

        for error in &errors {
            assert_eq!(error.kind(), ErrorKind::UnsupportedFormat);
            assert!(error.is_client_error());
        }
    }

    #[test]
    fn test_loader_unavailable_message_is_distinct() {
        let missing_loader = WorkbenchError::LoaderUnavailable {
            format: DataFormat::Sas7bdat,
        };
        let unknown = WorkbenchError::UnsupportedFormat {
            format: "sas7bdat".to_string(),
        };
        assert_ne!(missing_loader.to_string(), unknown.to_string());
        assert!(missing_loader.to_string().contains("sas7bdat"));
    }

    #[test]
    fn test_io_is_server_side() {
        let error = WorkbenchError::from(std::io::Error::other("disk gone"));
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(!error.is_client_error());
    }
}
