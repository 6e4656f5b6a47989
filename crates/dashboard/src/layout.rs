//! Published layout: the sidebar and main regions.
//!
//! Both regions live in `tokio::sync::watch` channels. Publishing replaces
//! the whole value in one `send_replace`, so readers see either the old list
//! or the new one, and the old list is dropped as soon as the last reader
//! lets go of it.

use std::ops::Mul;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use seareport_common::{Layer, LayerKind};

use crate::colorbar::ColorbarRow;
use crate::selection::SelectionState;

/// Height of the spacer above the time-series plot, in pixels.
pub const TIMESERIES_SPACER_HEIGHT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Info,
    Danger,
}

/// Placeholder message shown in the main region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: &'static str,
}

pub const CHOOSE_DATASET: Alert = Alert {
    kind: AlertKind::Info,
    message: "## Please select a *Dataset* and click on the **Render** button.",
};

pub const PLEASE_RENDER: Alert = Alert {
    kind: AlertKind::Info,
    message: "## Please click on the **Render** button to visualize the selected *Variable*",
};

pub const UNKNOWN_FORMAT: Alert = Alert {
    kind: AlertKind::Danger,
    message: "## The selected dataset is in an unknown format. Please choose a different file.",
};

pub const LOAD_FAILED: Alert = Alert {
    kind: AlertKind::Danger,
    message: "## The selected dataset could not be loaded. Please try again later or choose a different file.",
};

pub const RENDER_FAILED: Alert = Alert {
    kind: AlertKind::Danger,
    message: "## Rendering failed. Please check your selection and click on the **Render** button again.",
};

/// Map overlay composed bottom-up with `*`.
#[derive(Debug, Clone, Serialize)]
pub struct Overlay {
    layers: Vec<Arc<Layer>>,
}

impl Overlay {
    pub fn new(base: Arc<Layer>) -> Self {
        Self { layers: vec![base] }
    }

    /// Layers from bottom to top.
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|l| l.kind()).collect()
    }
}

impl Mul<Arc<Layer>> for Overlay {
    type Output = Overlay;

    /// Stack `rhs` on top.
    fn mul(mut self, rhs: Arc<Layer>) -> Overlay {
        self.layers.push(rhs);
        self
    }
}

impl Mul<Option<Arc<Layer>>> for Overlay {
    type Output = Overlay;

    fn mul(self, rhs: Option<Arc<Layer>>) -> Overlay {
        match rhs {
            Some(layer) => self * layer,
            None => self,
        }
    }
}

/// Tap-driven time-series plot with its leading spacer.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSeriesBlock {
    spacer_height: u32,
    plot: Arc<Layer>,
}

impl TimeSeriesBlock {
    pub fn new(plot: Layer) -> Self {
        Self {
            spacer_height: TIMESERIES_SPACER_HEIGHT,
            plot: Arc::new(plot),
        }
    }

    pub fn spacer_height(&self) -> u32 {
        self.spacer_height
    }

    pub fn plot(&self) -> &Arc<Layer> {
        &self.plot
    }
}

/// One entry of the main region.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Panel {
    Alert(Alert),
    Spinner,
    Overlay(Arc<Overlay>),
    Colorbar(Arc<ColorbarRow>),
    TimeSeries(Arc<TimeSeriesBlock>),
}

impl Panel {
    pub fn as_alert(&self) -> Option<&Alert> {
        match self {
            Panel::Alert(alert) => Some(alert),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Panel::Alert(_) => "alert",
            Panel::Spinner => "spinner",
            Panel::Overlay(_) => "overlay",
            Panel::Colorbar(_) => "colorbar",
            Panel::TimeSeries(_) => "time_series",
        }
    }
}

pub type MainContent = Arc<Vec<Panel>>;

/// Point-in-time view of both regions.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutSnapshot {
    pub sidebar: Arc<SelectionState>,
    pub main: MainContent,
}

/// Write side of the layout, owned by the controller.
#[derive(Debug)]
pub struct LayoutPublisher {
    sidebar: watch::Sender<Arc<SelectionState>>,
    main: watch::Sender<MainContent>,
}

impl LayoutPublisher {
    pub fn new(sidebar: &SelectionState, main: Vec<Panel>) -> Self {
        let (sidebar, _) = watch::channel(Arc::new(sidebar.clone()));
        let (main, _) = watch::channel(Arc::new(main));
        Self { sidebar, main }
    }

    /// Replace the main region. The previous list is dropped here unless a
    /// reader still holds it.
    pub fn publish_main(&self, panels: Vec<Panel>) {
        drop(self.main.send_replace(Arc::new(panels)));
    }

    pub fn publish_sidebar(&self, state: &SelectionState) {
        drop(self.sidebar.send_replace(Arc::new(state.clone())));
    }

    pub fn main(&self) -> MainContent {
        self.main.borrow().clone()
    }

    pub fn sidebar(&self) -> Arc<SelectionState> {
        self.sidebar.borrow().clone()
    }

    pub fn handle(&self) -> LayoutHandle {
        LayoutHandle {
            sidebar: self.sidebar.subscribe(),
            main: self.main.subscribe(),
        }
    }
}

/// Read side of the layout, for hosts.
#[derive(Debug, Clone)]
pub struct LayoutHandle {
    sidebar: watch::Receiver<Arc<SelectionState>>,
    main: watch::Receiver<MainContent>,
}

impl LayoutHandle {
    pub fn main(&self) -> MainContent {
        self.main.borrow().clone()
    }

    pub fn sidebar(&self) -> Arc<SelectionState> {
        self.sidebar.borrow().clone()
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            sidebar: self.sidebar(),
            main: self.main(),
        }
    }

    /// Wait until the main region is replaced.
    pub async fn main_changed(&mut self) -> bool {
        self.main.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(kind: LayerKind) -> Arc<Layer> {
        Arc::new(Layer::new(kind, json!({})))
    }

    #[test]
    fn test_overlay_order() {
        let overlay = Overlay::new(layer(LayerKind::Tiles))
            * layer(LayerKind::Raster)
            * Some(layer(LayerKind::Wireframe));
        assert_eq!(
            overlay.kinds(),
            vec![LayerKind::Tiles, LayerKind::Raster, LayerKind::Wireframe]
        );

        let without_mesh = Overlay::new(layer(LayerKind::Tiles)) * layer(LayerKind::Raster) * None;
        assert_eq!(without_mesh.kinds(), vec![LayerKind::Tiles, LayerKind::Raster]);
    }

    #[test]
    fn test_publish_replaces_whole_list() {
        let publisher = LayoutPublisher::new(&SelectionState::new(), vec![Panel::Alert(CHOOSE_DATASET)]);
        let handle = publisher.handle();

        publisher.publish_main(vec![Panel::Spinner]);
        let main = handle.main();
        assert_eq!(main.len(), 1);
        assert!(matches!(main[0], Panel::Spinner));
    }

    #[test]
    fn test_publish_drops_previous_objects() {
        let publisher = LayoutPublisher::new(&SelectionState::new(), Vec::new());
        let raster = layer(LayerKind::Raster);
        let weak = Arc::downgrade(&raster);

        publisher.publish_main(vec![Panel::Overlay(Arc::new(Overlay::new(raster)))]);
        assert!(weak.upgrade().is_some());

        publisher.publish_main(vec![Panel::Spinner]);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_panel_serialization_is_tagged() {
        let value = serde_json::to_value(Panel::Alert(UNKNOWN_FORMAT)).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["kind"], "danger");

        let block = TimeSeriesBlock::new(Layer::new(LayerKind::TimeSeries, json!({})));
        let value = serde_json::to_value(Panel::TimeSeries(Arc::new(block))).unwrap();
        assert_eq!(value["spacer_height"], 50);
    }

    #[tokio::test]
    async fn test_handle_observes_changes() {
        let publisher = LayoutPublisher::new(&SelectionState::new(), Vec::new());
        let mut handle = publisher.handle();

        publisher.publish_main(vec![Panel::Alert(PLEASE_RENDER)]);
        assert!(handle.main_changed().await);
        assert_eq!(handle.main()[0].as_alert(), Some(&PLEASE_RENDER));
    }
}
