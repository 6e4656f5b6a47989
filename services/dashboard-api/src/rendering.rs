//! Render primitives producing layer specs for the browser client.
//!
//! Nothing is rasterized on the server. Each primitive validates its inputs
//! against the dataset and emits a serializable description the client
//! turns into a WebGL layer.

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use seareport_common::{
    Dataset, DatasetError, Layer, LayerKind, Range, RenderError, RenderPrimitives, Timestamp,
    ZoomRange, TIME_DIM,
};

const NODE_DIM: &str = "node";

/// Triangulated surface of one variable at one time step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimeshSpec {
    pub dataset_id: String,
    pub variable: String,
    pub time: Option<Timestamp>,
    pub extent: Option<ZoomRange>,
    pub node_count: usize,
    pub face_count: usize,
}

#[derive(Debug, Clone)]
pub struct LayerSpecRenderer {
    basemap_url: String,
}

impl LayerSpecRenderer {
    pub fn new(basemap_url: impl Into<String>) -> Self {
        Self {
            basemap_url: basemap_url.into(),
        }
    }

    fn mesh_spec(geometry: &TrimeshSpec) -> serde_json::Value {
        json!({
            "dataset": geometry.dataset_id,
            "nodes": geometry.node_count,
            "faces": geometry.face_count,
        })
    }
}

impl RenderPrimitives for LayerSpecRenderer {
    type Geometry = TrimeshSpec;

    fn build_trimesh(&self, dataset: &Dataset, variable: &str) -> Result<TrimeshSpec, RenderError> {
        let var = dataset
            .variable(variable)
            .ok_or_else(|| DatasetError::VariableNotFound(variable.to_string()))?;

        if var.is_time_dependent() {
            return Err(RenderError::Unrenderable {
                variable: variable.to_string(),
                reason: "select a time step".to_string(),
            });
        }
        if !var.has_dim(NODE_DIM) {
            return Err(RenderError::Unrenderable {
                variable: variable.to_string(),
                reason: "not defined on mesh nodes".to_string(),
            });
        }

        debug!(dataset = %dataset.id(), variable, nodes = dataset.node_count(), "Built trimesh");
        Ok(TrimeshSpec {
            dataset_id: dataset.id().to_string(),
            variable: variable.to_string(),
            time: dataset.selected_time(),
            extent: dataset.extent(),
            node_count: dataset.node_count(),
            face_count: dataset.face_count(),
        })
    }

    fn build_wireframe(
        &self,
        geometry: &TrimeshSpec,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError> {
        Ok(Layer::new(LayerKind::Wireframe, Self::mesh_spec(geometry))
            .with_ranges(lon_range, lat_range)
            .with_extent(geometry.extent))
    }

    fn build_raster(
        &self,
        geometry: &TrimeshSpec,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError> {
        let mut spec = Self::mesh_spec(geometry);
        spec["variable"] = json!(geometry.variable);
        spec["time"] = json!(geometry.time);

        Ok(Layer::new(LayerKind::Raster, spec)
            .with_ranges(lon_range, lat_range)
            .with_extent(geometry.extent))
    }

    fn build_tap_timeseries(
        &self,
        dataset: &Dataset,
        variable: &str,
        source: &Layer,
        fontscale: f64,
    ) -> Result<Layer, RenderError> {
        let var = dataset
            .variable(variable)
            .ok_or_else(|| DatasetError::VariableNotFound(variable.to_string()))?;
        if !var.is_time_dependent() {
            return Err(DatasetError::NoTimeDimension.into());
        }

        let mut layer = Layer::new(
            LayerKind::TimeSeries,
            json!({
                "dataset": dataset.id(),
                "variable": variable,
                "source": source.id(),
                "times": dataset.times(),
            }),
        );
        layer.set_fontscale(fontscale);
        Ok(layer)
    }

    fn basemap_tiles(&self) -> Layer {
        Layer::new(LayerKind::Tiles, json!({ "url": self.basemap_url }))
    }

    fn filter_visualizable_variables(&self, dataset: &Dataset, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|name| {
                dataset.variable(name).is_some_and(|v| {
                    v.has_dim(NODE_DIM) && v.dims.iter().all(|d| d == NODE_DIM || d == TIME_DIM)
                })
            })
            .cloned()
            .collect()
    }
}
