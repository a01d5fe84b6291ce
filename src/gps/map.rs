//! Map rendering for the GPS registry.
//!
//! The registry only hands a list of labelled markers to a [`MapRenderer`];
//! how the map is drawn is up to the renderer. [`LeafletRenderer`] builds a
//! standalone HTML page that loads Leaflet from its CDN.

use crate::config::MapConfig;
use crate::constants::LEAFLET_VERSION;
use crate::error::{Result, WorkbenchError};
use crate::models::GeoPoint;
use serde::Serialize;

/// One labelled position on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl From<&GeoPoint> for MapMarker {
    fn from(point: &GeoPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            label: format!("ID: {}", point.id),
        }
    }
}

/// A rendered, displayable map document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapArtifact {
    pub html: String,
}

pub trait MapRenderer: Send + Sync {
    fn render(&self, markers: &[MapMarker]) -> Result<MapArtifact>;
}

#[derive(Debug, Clone, Default)]
pub struct LeafletRenderer {
    config: MapConfig,
}

impl LeafletRenderer {
    pub fn new(config: MapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }
}

impl MapRenderer for LeafletRenderer {
    fn render(&self, markers: &[MapMarker]) -> Result<MapArtifact> {
        let markers = script_json(&markers)?;
        let tile_url = script_json(&self.config.tile_url)?;
        let attribution = script_json(&self.config.attribution)?;
        let center = script_json(&[self.config.center_lat, self.config.center_lon])?;

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>GPS points</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{version}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{version}/dist/leaflet.js"></script>
<style>html, body, #map {{ width: 100%; height: 100%; margin: 0; padding: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var map = L.map("map").setView({center}, {zoom});
L.tileLayer({tile_url}, {{ attribution: {attribution} }}).addTo(map);
var markers = {markers};
markers.forEach(function (m) {{
  L.marker([m.latitude, m.longitude]).bindPopup(m.label).addTo(map);
}});
</script>
</body>
</html>
"#,
            version = LEAFLET_VERSION,
            center = center,
            zoom = self.config.zoom_start,
            tile_url = tile_url,
            attribution = attribution,
            markers = markers,
        );

        Ok(MapArtifact { html })
    }
}

/// JSON for embedding inside a `<script>` element
///
/// `<` is escaped so no value can close the script early.
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value).map_err(|e| WorkbenchError::Render {
        reason: e.to_string(),
    })?;
    Ok(json.replace('<', "\\u003c"))
}
