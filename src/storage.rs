//! Upload store: uploaded datasets kept as opaque blobs in one directory.
//!
//! Blobs are keyed by a sanitised file name. Any reference handed back in
//! (for a later conversion) is reduced to its sanitised final component, so
//! it always resolves inside the store directory.

use crate::error::{Result, WorkbenchError};
use regex::Regex;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::debug;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

/// Reduce an uploaded file name to a safe, portable one
///
/// Non-ASCII characters are dropped, path separators and whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing dots and underscores are stripped. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Store rooted at `root`; the directory is not touched until [`open`](Self::open)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the store directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).await?;
        debug!("Upload store ready at {}", store.root.display());
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a blob reference maps to inside the store
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let last_component = reference.rsplit(['/', '\\']).next().unwrap_or_default();
        let name = sanitize_filename(last_component);
        if name.is_empty() {
            return Err(WorkbenchError::BlobNotFound {
                path: PathBuf::from(reference),
            });
        }
        Ok(self.root.join(name))
    }

    /// Store `bytes` under the sanitised `file_name`, replacing any previous
    /// upload of the same name
    pub async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = sanitize_filename(file_name);
        if name.is_empty() {
            return Err(WorkbenchError::EmptyFilename);
        }

        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name);
        fs::write(&path, bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read the blob a reference points to
    pub async fn read(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.resolve(reference)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(WorkbenchError::BlobNotFound { path })
            }
            Err(e) => Err(e.into()),
        }
    }
}
