//! Conversion orchestration: format registry, loader and writer composed
//! into the upload and convert operations.
//!
//! Failures from any stage keep their own classification. Parsing and
//! serialisation run on the blocking pool so they never stall the runtime.

use crate::constants::CONVERTED_FILE_STEM;
use crate::error::{Result, WorkbenchError};
use crate::formats::{self, DataFormat};
use crate::loader;
use crate::preview::{DatasetPreview, preview};
use crate::storage::{UploadStore, sanitize_filename};
use crate::writer;
use serde::Serialize;
use tokio::task;
use tracing::{debug, info, warn};

/// Bytes of a converted dataset plus the format they are in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDataset {
    pub format: DataFormat,
    pub bytes: Vec<u8>,
}

impl ConvertedDataset {
    /// Download name, `converted_dataset.<ext>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", CONVERTED_FILE_STEM, self.format.extension())
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Result of an upload: where the blob was stored and a preview of it
#[derive(Debug, Clone, Serialize)]
pub struct UploadedDataset {
    pub file_path: String,
    #[serde(flatten)]
    pub preview: DatasetPreview,
}

/// Check an uploaded file name against the allow-list
///
/// Runs before any byte of the upload is read. The name the blob will be
/// stored under must resolve to the same format, otherwise the stored
/// reference could not be converted later.
pub fn check_upload_name(file_name: &str) -> Result<DataFormat> {
    if file_name.trim().is_empty() {
        return Err(WorkbenchError::EmptyFilename);
    }
    let not_allowed = |why: &str| {
        warn!("Rejected upload '{}': {}", file_name, why);
        WorkbenchError::FileTypeNotAllowed {
            file_name: file_name.to_string(),
        }
    };

    let format =
        DataFormat::from_path(file_name).ok_or_else(|| not_allowed("file type not allowed"))?;

    let stored_name = sanitize_filename(file_name);
    if stored_name.is_empty() {
        return Err(WorkbenchError::EmptyFilename);
    }
    if DataFormat::from_path(&stored_name) != Some(format) {
        return Err(not_allowed("extension lost when sanitising the name"));
    }
    Ok(format)
}

/// Work out the source format from an explicit hint or the blob reference
pub fn resolve_source(reference: &str, hint: Option<&str>) -> Result<DataFormat> {
    match hint.map(str::trim).filter(|hint| !hint.is_empty()) {
        Some(hint) => DataFormat::from_extension(hint).ok_or_else(|| {
            WorkbenchError::FormatResolution {
                reference: hint.to_string(),
            }
        }),
        None => {
            DataFormat::from_path(reference).ok_or_else(|| WorkbenchError::FormatResolution {
                reference: reference.to_string(),
            })
        }
    }
}

/// Resolve a target format token to a format that has a writer
pub fn resolve_target(target: &str) -> Result<DataFormat> {
    let descriptor = formats::resolve(target)?;
    if !descriptor.can_write() {
        return Err(WorkbenchError::WriterUnavailable {
            format: descriptor.format,
        });
    }
    Ok(descriptor.format)
}

/// Load `blob` as `source` and write it as `target`
pub fn convert_blob(
    blob: &[u8],
    source: DataFormat,
    target: DataFormat,
) -> Result<ConvertedDataset> {
    let table = loader::load(blob, source)?;
    let bytes = writer::write(&table, target)?;
    Ok(ConvertedDataset {
        format: target,
        bytes,
    })
}

/// Upload and conversion operations over one [`UploadStore`]
#[derive(Debug, Clone)]
pub struct Converter {
    store: UploadStore,
}

impl Converter {
    pub fn new(store: UploadStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Store an uploaded dataset and preview its first `preview_rows` rows
    pub async fn ingest(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        preview_rows: usize,
    ) -> Result<UploadedDataset> {
        let format = check_upload_name(file_name)?;
        let path = self.store.save(file_name, &bytes).await?;

        let preview = task::spawn_blocking(move || {
            let table = loader::load(&bytes, format)?;
            preview(&table, preview_rows)
        })
        .await
        .map_err(|e| WorkbenchError::TaskFailed {
            reason: format!("Failed to load upload: {}", e),
        })??;

        info!(
            "Ingested {} as {} ({} columns)",
            path.display(),
            format,
            preview.columns.len()
        );

        Ok(UploadedDataset {
            file_path: path.to_string_lossy().into_owned(),
            preview,
        })
    }

    /// Convert a stored blob into `target`
    ///
    /// The target is checked before anything is read. The source comes from
    /// `source_hint` when given, otherwise from the reference's extension.
    pub async fn convert(
        &self,
        reference: &str,
        source_hint: Option<&str>,
        target: &str,
    ) -> Result<ConvertedDataset> {
        let target = resolve_target(target)?;
        let source = resolve_source(reference, source_hint)?;
        let blob = self.store.read(reference).await?;

        debug!(
            "Converting {} ({} bytes) from {} to {}",
            reference,
            blob.len(),
            source,
            target
        );

        let converted = task::spawn_blocking(move || convert_blob(&blob, source, target))
            .await
            .map_err(|e| WorkbenchError::TaskFailed {
                reason: format!("Failed to convert dataset: {}", e),
            })??;

        info!(
            "Converted {} to {} ({} bytes)",
            reference,
            converted.file_name(),
            converted.bytes.len()
        );
        Ok(converted)
    }
}
