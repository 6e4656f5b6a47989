//! Renderable map layers.
//!
//! A [`Layer`] is an immutable description of something the browser client
//! draws: the basemap tiles, the mesh wireframe, the raster or a tap-driven
//! time-series. Render primitives fill in `spec` with whatever the client
//! needs; the controller only looks at the identity, kind and ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A closed coordinate interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Longitude/latitude display window of a map layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub lon: Range,
    pub lat: Range,
}

impl ZoomRange {
    pub fn new(lon: Range, lat: Range) -> Self {
        Self { lon, lat }
    }

    /// Whole-globe window.
    pub fn global() -> Self {
        Self {
            lon: Range::new(-180.0, 180.0),
            lat: Range::new(-90.0, 90.0),
        }
    }
}

/// Unique identity of a built layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Tiles,
    Wireframe,
    Raster,
    TimeSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    lon_range: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lat_range: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extent: Option<ZoomRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fontscale: Option<f64>,
    spec: serde_json::Value,
}

impl Layer {
    pub fn new(kind: LayerKind, spec: serde_json::Value) -> Self {
        Self {
            id: LayerId::new(),
            kind,
            lon_range: None,
            lat_range: None,
            extent: None,
            fontscale: None,
            spec,
        }
    }

    /// Set the ranges the layer is initially displayed with. `None` auto-fits.
    pub fn with_ranges(mut self, lon_range: Option<Range>, lat_range: Option<Range>) -> Self {
        self.lon_range = lon_range;
        self.lat_range = lat_range;
        self
    }

    /// Set the data extent, used as the display range when auto-fitting.
    pub fn with_extent(mut self, extent: Option<ZoomRange>) -> Self {
        self.extent = extent;
        self
    }

    pub fn set_fontscale(&mut self, fontscale: f64) {
        self.fontscale = Some(fontscale);
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn lon_range(&self) -> Option<Range> {
        self.lon_range
    }

    pub fn lat_range(&self) -> Option<Range> {
        self.lat_range
    }

    pub fn extent(&self) -> Option<ZoomRange> {
        self.extent
    }

    pub fn fontscale(&self) -> Option<f64> {
        self.fontscale
    }

    pub fn spec(&self) -> &serde_json::Value {
        &self.spec
    }

    /// Range the layer shows when nothing has panned it: the ranges it was
    /// built with, falling back to its extent.
    pub fn initial_range(&self) -> Option<ZoomRange> {
        match (self.lon_range, self.lat_range) {
            (Some(lon), Some(lat)) => Some(ZoomRange::new(lon, lat)),
            _ => self.extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layer_ids_are_unique() {
        let a = Layer::new(LayerKind::Raster, json!({}));
        let b = Layer::new(LayerKind::Raster, json!({}));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_initial_range_prefers_build_ranges() {
        let zoom = ZoomRange::new(Range::new(0.0, 10.0), Range::new(40.0, 50.0));
        let layer = Layer::new(LayerKind::Raster, json!({}))
            .with_ranges(Some(zoom.lon), Some(zoom.lat))
            .with_extent(Some(ZoomRange::global()));
        assert_eq!(layer.initial_range(), Some(zoom));
    }

    #[test]
    fn test_initial_range_falls_back_to_extent() {
        let layer = Layer::new(LayerKind::Raster, json!({}))
            .with_ranges(Some(Range::new(0.0, 1.0)), None)
            .with_extent(Some(ZoomRange::global()));
        assert_eq!(layer.initial_range(), Some(ZoomRange::global()));
    }

    #[test]
    fn test_layer_serialization_skips_unset_fields() {
        let layer = Layer::new(LayerKind::Tiles, json!({"url": "https://tiles/{Z}/{X}/{Y}.png"}));
        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(value["kind"], "tiles");
        assert!(value.get("lon_range").is_none());
        assert!(value.get("fontscale").is_none());
    }
}
