//! GPS point registry.
//!
//! An ordered, in-memory collection of [`GeoPoint`]s shared by every
//! request. All operations serialise on one lock. The listing lives behind
//! an `Arc` and is replaced wholesale on each mutation, so a snapshot handed
//! to a reader never changes underneath it.

pub mod map;

#[cfg(test)]
pub mod tests;

use crate::config::IdPolicy;
use crate::constants::{COORDINATE_DECIMALS, GPS_CSV_COLUMNS};
use crate::error::{Result, WorkbenchError};
use crate::models::{GeoPoint, UniformTable};
use crate::writer::csv::{CsvOptions, write_with_options};
use map::{MapArtifact, MapMarker, MapRenderer};
use polars::prelude::Column;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Immutable view of the registry at one point in time
pub type Snapshot = Arc<Vec<GeoPoint>>;

#[derive(Debug, Default)]
struct RegistryState {
    points: Snapshot,
    /// Highest ID handed out so far
    last_id: u64,
}

#[derive(Debug, Default)]
pub struct PointRegistry {
    state: Mutex<RegistryState>,
    id_policy: IdPolicy,
}

impl PointRegistry {
    pub fn new(id_policy: IdPolicy) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            id_policy,
        }
    }

    pub fn id_policy(&self) -> IdPolicy {
        self.id_policy
    }

    /// Append a point and return it together with the updated listing
    ///
    /// Both coordinates must be present, finite and in range. They are stored
    /// rounded to [`COORDINATE_DECIMALS`] fractional digits. Nothing is
    /// appended when validation fails.
    pub async fn add(
        &self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<(GeoPoint, Snapshot)> {
        let (latitude, longitude) = validate_coordinates(latitude, longitude).inspect_err(|e| {
            warn!("Rejected GPS point: {}", e);
        })?;

        let mut state = self.state.lock().await;
        let id = match self.id_policy {
            IdPolicy::Monotonic => state.last_id + 1,
            IdPolicy::CurrentCount => state.points.len() as u64 + 1,
        };
        let point = GeoPoint {
            id,
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
        };

        let mut points = Vec::with_capacity(state.points.len() + 1);
        points.extend(state.points.iter().copied());
        points.push(point);
        state.points = Arc::new(points);
        state.last_id = state.last_id.max(id);

        debug!(
            "Added GPS point {} at ({}, {})",
            point.id, point.latitude, point.longitude
        );
        Ok((point, Arc::clone(&state.points)))
    }

    /// Remove every point with `id` and return the updated listing
    ///
    /// Deleting an absent ID leaves the listing as it was.
    pub async fn delete(&self, id: u64) -> Snapshot {
        let mut state = self.state.lock().await;
        if state.points.iter().any(|point| point.id == id) {
            let remaining: Vec<GeoPoint> = state
                .points
                .iter()
                .filter(|point| point.id != id)
                .copied()
                .collect();
            state.points = Arc::new(remaining);
            debug!("Deleted GPS point {}", id);
        } else {
            debug!("No GPS point with ID {} to delete", id);
        }
        Arc::clone(&state.points)
    }

    /// Current listing in insertion order
    pub async fn list(&self) -> Snapshot {
        Arc::clone(&self.state.lock().await.points)
    }

    /// The listing as CSV with an `ID,Latitude,Longitude` header
    pub async fn export_csv(&self) -> Result<Vec<u8>> {
        let points = self.list().await;
        let table = points_table(&points)?;
        write_with_options(
            &table,
            &CsvOptions {
                float_precision: Some(COORDINATE_DECIMALS),
                ..CsvOptions::default()
            },
        )
    }

    /// Render the listing with `renderer`, one marker per point
    pub async fn render_map(&self, renderer: &dyn MapRenderer) -> Result<MapArtifact> {
        let points = self.list().await;
        let markers: Vec<MapMarker> = points.iter().map(MapMarker::from).collect();
        renderer.render(&markers)
    }
}

/// Check that both coordinates are present, finite and within range
pub fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(f64, f64)> {
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(WorkbenchError::invalid_coordinates(
            "latitude and longitude are both required",
        ));
    };
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(WorkbenchError::invalid_coordinates(
            "coordinates must be finite numbers",
        ));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(WorkbenchError::invalid_coordinates(format!(
            "latitude {latitude} is outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(WorkbenchError::invalid_coordinates(format!(
            "longitude {longitude} is outside [-180, 180]"
        )));
    }
    Ok((latitude, longitude))
}

/// Round to [`COORDINATE_DECIMALS`] fractional digits
///
/// Goes through decimal formatting, which rounds the exact binary value
/// correctly instead of scaling by a power of ten.
pub fn round_coordinate(value: f64) -> f64 {
    format!("{:.*}", COORDINATE_DECIMALS, value)
        .parse()
        .unwrap_or(value)
}

fn points_table(points: &[GeoPoint]) -> Result<UniformTable> {
    let [id, latitude, longitude] = GPS_CSV_COLUMNS;
    UniformTable::from_columns(vec![
        Column::new(
            id.into(),
            points.iter().map(|point| point.id).collect::<Vec<u64>>(),
        ),
        Column::new(
            latitude.into(),
            points.iter().map(|point| point.latitude).collect::<Vec<f64>>(),
        ),
        Column::new(
            longitude.into(),
            points
                .iter()
                .map(|point| point.longitude)
                .collect::<Vec<f64>>(),
        ),
    ])
}
