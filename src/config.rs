//! Configuration management and validation.
//!
//! Settings for the HTTP service, the upload store, previews, the GPS
//! registry and the map renderer. Defaults come from [`crate::constants`];
//! a JSON file and command line flags are layered on top.

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_MAP_CENTER, DEFAULT_MAP_ZOOM, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_PREVIEW_ROWS, DEFAULT_TILE_ATTRIBUTION, DEFAULT_TILE_URL, DEFAULT_UPLOAD_DIR,
    MAX_MAP_ZOOM, MAX_PREVIEW_ROWS,
};
use crate::error::{Result, WorkbenchError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How the GPS registry numbers new points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// One more than the highest ID ever handed out; IDs are never reused
    #[default]
    Monotonic,
    /// Current point count plus one. A delete followed by an add can hand
    /// out an ID that is still in use.
    CurrentCount,
}

/// Map rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Initial camera latitude
    pub center_lat: f64,

    /// Initial camera longitude
    pub center_lon: f64,

    /// Initial zoom level
    pub zoom_start: u8,

    /// Tile URL template
    pub tile_url: String,

    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: DEFAULT_MAP_CENTER.0,
            center_lon: DEFAULT_MAP_CENTER.1,
            zoom_start: DEFAULT_MAP_ZOOM,
            tile_url: DEFAULT_TILE_URL.to_string(),
            attribution: DEFAULT_TILE_ATTRIBUTION.to_string(),
        }
    }
}

/// Global configuration for the workbench
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Address the HTTP server listens on
    pub bind: String,

    /// Directory uploaded datasets are stored in
    pub upload_dir: PathBuf,

    /// Rows in an upload preview when the request does not say
    pub preview_rows: usize,

    /// Upper bound for requested preview rows
    pub max_preview_rows: usize,

    /// Request body limit for uploads, in bytes
    pub max_upload_bytes: usize,

    /// GPS point numbering
    pub id_policy: IdPolicy,

    pub map: MapConfig,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            max_preview_rows: MAX_PREVIEW_ROWS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            id_policy: IdPolicy::default(),
            map: MapConfig::default(),
        }
    }
}

impl WorkbenchConfig {
    /// Load a configuration file; fields it omits keep their defaults
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| WorkbenchError::Configuration {
            message: format!("Cannot read {}: {}", path.display(), e),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| WorkbenchError::Configuration {
                message: format!("Invalid configuration in {}: {}", path.display(), e),
            })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the listen address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set the upload directory
    pub fn with_upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = upload_dir.into();
        self
    }

    /// Set the default preview size
    pub fn with_preview_rows(mut self, preview_rows: usize) -> Self {
        self.preview_rows = preview_rows;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Set the GPS ID policy
    pub fn with_id_policy(mut self, id_policy: IdPolicy) -> Self {
        self.id_policy = id_policy;
        self
    }

    pub fn with_map(mut self, map: MapConfig) -> Self {
        self.map = map;
        self
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| WorkbenchError::Configuration {
                message: format!("Invalid bind address '{}': {}", self.bind, e),
            })
    }

    /// Check the configuration for values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.upload_dir.as_os_str().is_empty() {
            return Err(config_error("Upload directory must not be empty"));
        }
        if self.max_preview_rows > MAX_PREVIEW_ROWS {
            return Err(config_error(format!(
                "max_preview_rows {} exceeds the limit of {}",
                self.max_preview_rows, MAX_PREVIEW_ROWS
            )));
        }
        if self.preview_rows > self.max_preview_rows {
            return Err(config_error(format!(
                "preview_rows {} exceeds max_preview_rows {}",
                self.preview_rows, self.max_preview_rows
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(config_error("max_upload_bytes must be greater than zero"));
        }

        let map = &self.map;
        if !(-90.0..=90.0).contains(&map.center_lat) || !(-180.0..=180.0).contains(&map.center_lon)
        {
            return Err(config_error(format!(
                "Map centre ({}, {}) is outside the valid coordinate range",
                map.center_lat, map.center_lon
            )));
        }
        if map.zoom_start > MAX_MAP_ZOOM {
            return Err(config_error(format!(
                "Map zoom {} exceeds the maximum of {}",
                map.zoom_start, MAX_MAP_ZOOM
            )));
        }
        if map.tile_url.trim().is_empty() {
            return Err(config_error("Map tile URL must not be empty"));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> WorkbenchError {
    WorkbenchError::Configuration {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkbenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.preview_rows, 10);
        assert_eq!(config.id_policy, IdPolicy::Monotonic);
        assert_eq!(config.map.zoom_start, 2);
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
    }

    #[test]
    fn test_builders() {
        let config = WorkbenchConfig::default()
            .with_bind("0.0.0.0:8080")
            .with_upload_dir("/tmp/datasets")
            .with_preview_rows(25)
            .with_id_policy(IdPolicy::CurrentCount);

        assert_eq!(config.bind_addr().unwrap().port(), 8080);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/datasets"));
        assert_eq!(config.preview_rows, 25);
        assert_eq!(config.id_policy, IdPolicy::CurrentCount);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_bind = WorkbenchConfig::default().with_bind("not an address");
        assert!(bad_bind.validate().is_err());

        let oversized_preview = WorkbenchConfig::default().with_preview_rows(MAX_PREVIEW_ROWS + 1);
        assert!(oversized_preview.validate().is_err());

        let bad_centre = WorkbenchConfig::default().with_map(MapConfig {
            center_lat: 91.0,
            ..MapConfig::default()
        });
        assert!(bad_centre.validate().is_err());

        let bad_zoom = WorkbenchConfig::default().with_map(MapConfig {
            zoom_start: 30,
            ..MapConfig::default()
        });
        assert!(bad_zoom.validate().is_err());

        let no_body = WorkbenchConfig::default().with_max_upload_bytes(0);
        assert!(no_body.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"preview_rows": 5, "id_policy": "current_count", "map": {{"zoom_start": 4}}}}"#
        )
        .unwrap();

        let config = WorkbenchConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.preview_rows, 5);
        assert_eq!(config.id_policy, IdPolicy::CurrentCount);
        assert_eq!(config.map.zoom_start, 4);
        assert_eq!(config.map.center_lat, 0.0);
        assert_eq!(config.bind, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let error = WorkbenchConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(error, WorkbenchError::Configuration { .. }));
    }
}
