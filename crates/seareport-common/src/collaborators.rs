//! Collaborator interfaces consumed by the dashboard controller.
//!
//! The controller never talks to storage or plotting code directly; it goes
//! through these traits so the heavy lifting can be swapped or faked.

use async_trait::async_trait;

use crate::dataset::Dataset;
use crate::error::{CatalogError, NotifyError, OpenError, RenderError};
use crate::layer::{Layer, Range};

/// Opens datasets by identifier.
pub trait DatasetSource: Send + Sync {
    /// Open and normalize a dataset. Every call returns a fresh handle.
    fn open_dataset(&self, identifier: &str) -> Result<Dataset, OpenError>;
}

/// Enumerates the datasets available for selection.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Identifiers ordered most recent first, reserved entry excluded.
    async fn list_dataset_identifiers(&self) -> Result<Vec<String>, CatalogError>;
}

/// Rendering primitives turning datasets into map layers.
pub trait RenderPrimitives: Send {
    /// Triangulated surface the wireframe and raster are derived from.
    type Geometry;

    fn build_trimesh(&self, dataset: &Dataset, variable: &str) -> Result<Self::Geometry, RenderError>;

    fn build_wireframe(
        &self,
        geometry: &Self::Geometry,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError>;

    fn build_raster(
        &self,
        geometry: &Self::Geometry,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError>;

    /// Time-series plot of `variable` at the point tapped on `source`.
    fn build_tap_timeseries(
        &self,
        dataset: &Dataset,
        variable: &str,
        source: &Layer,
        fontscale: f64,
    ) -> Result<Layer, RenderError>;

    fn basemap_tiles(&self) -> Layer;

    /// Narrow raw variable names to the ones that can be shown, keeping order.
    fn filter_visualizable_variables(&self, dataset: &Dataset, candidates: &[String]) -> Vec<String>;
}

/// Best-effort human-visible notification backend.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}
