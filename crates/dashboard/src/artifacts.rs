//! Render artifacts kept between renders.
//!
//! Superseding an artifact is a plain assignment to `None`. Nothing else in
//! the controller holds strong references to the raster or the composite, so
//! once they are released here and the main region has been replaced, their
//! memory is gone.

use std::sync::Arc;

use seareport_common::{Layer, LayerId, ZoomRange};

use crate::colorbar::ColorbarRow;
use crate::layout::Overlay;

/// The raster of the last render and the viewport the client reported for it.
#[derive(Debug, Clone)]
pub struct RasterArtifact {
    layer: Arc<Layer>,
    viewport: Option<ZoomRange>,
}

impl RasterArtifact {
    pub fn new(layer: Arc<Layer>) -> Self {
        Self {
            layer,
            viewport: None,
        }
    }

    pub fn layer(&self) -> &Arc<Layer> {
        &self.layer
    }

    pub fn id(&self) -> LayerId {
        self.layer.id()
    }

    pub fn viewport(&self) -> Option<ZoomRange> {
        self.viewport
    }

    /// Current display range: the reported viewport, else the ranges the
    /// raster was built with, else the data extent.
    pub fn display_range(&self) -> Option<ZoomRange> {
        self.viewport.or_else(|| self.layer.initial_range())
    }

    pub(crate) fn set_viewport(&mut self, range: ZoomRange) {
        self.viewport = Some(range);
    }
}

#[derive(Debug, Default)]
pub struct RenderArtifacts {
    mesh: Option<Arc<Layer>>,
    raster: Option<RasterArtifact>,
    colorbar: Option<Arc<ColorbarRow>>,
    overlay: Option<Arc<Overlay>>,
}

impl RenderArtifacts {
    pub fn mesh(&self) -> Option<&Arc<Layer>> {
        self.mesh.as_ref()
    }

    pub fn raster(&self) -> Option<&RasterArtifact> {
        self.raster.as_ref()
    }

    pub fn colorbar(&self) -> Option<&Arc<ColorbarRow>> {
        self.colorbar.as_ref()
    }

    pub fn overlay(&self) -> Option<&Arc<Overlay>> {
        self.overlay.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_none() && self.raster.is_none() && self.colorbar.is_none() && self.overlay.is_none()
    }

    /// Drop the composite and the raster ahead of a rebuild. The mesh and
    /// the colorbar row survive.
    pub(crate) fn release_for_rebuild(&mut self) {
        self.overlay = None;
        self.raster = None;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn reset_colorbar(&mut self) {
        self.colorbar = None;
    }

    pub(crate) fn reset_mesh(&mut self) {
        self.mesh = None;
    }

    pub(crate) fn set_mesh(&mut self, mesh: Arc<Layer>) {
        self.mesh = Some(mesh);
    }

    pub(crate) fn set_raster(&mut self, raster: RasterArtifact) {
        self.raster = Some(raster);
    }

    pub(crate) fn raster_mut(&mut self) -> Option<&mut RasterArtifact> {
        self.raster.as_mut()
    }

    pub(crate) fn set_colorbar(&mut self, row: Arc<ColorbarRow>) {
        self.colorbar = Some(row);
    }

    pub(crate) fn set_overlay(&mut self, overlay: Arc<Overlay>) {
        self.overlay = Some(overlay);
    }
}
