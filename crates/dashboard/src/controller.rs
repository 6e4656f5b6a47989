//! Dashboard controller: selection transitions and the render pipeline.
//!
//! The controller owns the selection state, the loaded dataset, the render
//! artifacts and the layout publisher. It is driven from a single thread
//! (see [`crate::events`]), so transitions never interleave.

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use seareport_common::{
    Dataset, DatasetSource, Layer, LayerId, OpenError, RenderPrimitives, Timestamp, ZoomRange,
};

use crate::artifacts::{RasterArtifact, RenderArtifacts};
use crate::colorbar::{ColorLimits, ColorbarRow, ColorbarRule};
use crate::error::{DashboardError, DashboardResult};
use crate::layout::{
    Alert, LayoutHandle, LayoutPublisher, MainContent, Overlay, Panel, TimeSeriesBlock, CHOOSE_DATASET,
    LOAD_FAILED, PLEASE_RENDER, RENDER_FAILED, UNKNOWN_FORMAT,
};
use crate::memory;
use crate::selection::SelectionState;
use crate::timing::{timed, Stopwatch};

/// Controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Font scale applied to the raster and the time-series plot
    pub fontscale: f64,
    /// Variable selected by default when a dataset has it
    pub preferred_variable: String,
    pub colorbar: ColorbarRule,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fontscale: 1.4,
            preferred_variable: "elev_max".to_string(),
            colorbar: ColorbarRule::default(),
        }
    }
}

/// The dataset behind the current selection and the lists derived from it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    dataset: Dataset,
    variables: Vec<String>,
    time_dependent: Vec<String>,
}

impl LoadedDataset {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Visualizable variables in source order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn time_dependent(&self) -> &[String] {
        &self.time_dependent
    }
}

/// Inputs of one render, copied out of the selection state.
#[derive(Debug, Clone)]
struct RenderRequest {
    dataset_id: String,
    variable: String,
    timestamp: Option<Timestamp>,
    ts_variable: Option<String>,
    keep_zoom: bool,
    show_mesh: bool,
}

/// Summary of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub raster: LayerId,
    /// Ranges the raster was built with; `None` means auto-fit
    pub zoom: Option<ZoomRange>,
    pub mesh_built: bool,
    pub panels: usize,
}

pub struct DashboardController<R: RenderPrimitives> {
    config: ControllerConfig,
    source: Arc<dyn DatasetSource>,
    renderer: R,
    tiles: Arc<Layer>,
    selection: SelectionState,
    loaded: Option<LoadedDataset>,
    artifacts: RenderArtifacts,
    layout: LayoutPublisher,
}

impl<R: RenderPrimitives> DashboardController<R> {
    pub fn new(config: ControllerConfig, source: Arc<dyn DatasetSource>, renderer: R) -> Self {
        let selection = SelectionState::new();
        let layout = LayoutPublisher::new(&selection, vec![Panel::Alert(CHOOSE_DATASET)]);
        let tiles = Arc::new(renderer.basemap_tiles());
        debug!("UI setup: done");

        Self {
            config,
            source,
            renderer,
            tiles,
            selection,
            loaded: None,
            artifacts: RenderArtifacts::default(),
            layout,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn loaded(&self) -> Option<&LoadedDataset> {
        self.loaded.as_ref()
    }

    pub fn artifacts(&self) -> &RenderArtifacts {
        &self.artifacts
    }

    pub fn main(&self) -> MainContent {
        self.layout.main()
    }

    pub fn layout_handle(&self) -> LayoutHandle {
        self.layout.handle()
    }

    // ========================================================================
    // Selection transitions
    // ========================================================================

    /// Replace the dataset options with the latest listing.
    ///
    /// A selected dataset that is no longer listed is cleared and the UI is
    /// reset as if the user had cleared it. Otherwise only the options change.
    pub fn apply_dataset_list(&mut self, ids: Vec<String>) {
        let count = ids.len();
        if let Some(dropped) = self.selection.set_dataset_options(ids) {
            info!(dataset = %dropped, "Selected dataset is no longer listed, resetting the UI");
            self.reset_ui(CHOOSE_DATASET);
        }
        debug!(count, "Updated dataset files");
        self.publish_sidebar();
    }

    pub fn select_dataset(&mut self, id: &str) -> DashboardResult<()> {
        self.selection.choose_dataset(id)?;
        let result = self.load_selected_dataset();
        self.publish_sidebar();
        result
    }

    pub fn select_variable(&mut self, name: &str) -> DashboardResult<()> {
        self.selection.choose_variable(name)?;
        self.on_variable_change();
        self.publish_sidebar();
        Ok(())
    }

    pub fn select_time(&mut self, time: Option<Timestamp>) -> DashboardResult<()> {
        self.selection.choose_time(time)?;
        self.publish_sidebar();
        Ok(())
    }

    pub fn select_ts_variable(&mut self, name: &str) -> DashboardResult<()> {
        self.selection.choose_ts_variable(name)?;
        self.publish_sidebar();
        Ok(())
    }

    pub fn set_keep_zoom(&mut self, value: bool) -> DashboardResult<()> {
        self.selection.set_keep_zoom(value)?;
        self.publish_sidebar();
        Ok(())
    }

    pub fn set_show_mesh(&mut self, value: bool) -> DashboardResult<()> {
        self.selection.set_show_mesh(value)?;
        self.publish_sidebar();
        Ok(())
    }

    /// Record the viewport the client reports for the current raster.
    /// Reports for a superseded raster are ignored.
    pub fn update_viewport(&mut self, layer: LayerId, range: ZoomRange) -> DashboardResult<()> {
        match self.artifacts.raster_mut() {
            Some(raster) if raster.id() == layer => {
                raster.set_viewport(range);
                debug!(layer = %layer, ?range, "Viewport updated");
            }
            _ => debug!(layer = %layer, "Ignoring viewport of a superseded raster"),
        }
        Ok(())
    }

    /// Apply new colorbar widget values and republish the main region.
    pub fn update_color_limits(&mut self, limits: ColorLimits) -> DashboardResult<()> {
        let row = self.artifacts.colorbar().ok_or(DashboardError::NoColorbar)?;
        let row = Arc::new(row.with_limits(limits));
        self.artifacts.set_colorbar(row.clone());

        let panels = self
            .layout
            .main()
            .iter()
            .map(|panel| match panel {
                Panel::Colorbar(_) => Panel::Colorbar(row.clone()),
                other => other.clone(),
            })
            .collect();
        self.layout.publish_main(panels);
        debug!(?limits, "Colorbar limits updated");
        Ok(())
    }

    fn load_selected_dataset(&mut self) -> DashboardResult<()> {
        debug!("Update dataset: Start");
        let Some(id) = self.selection.dataset_id().map(str::to_string) else {
            debug!("No dataset has been selected. Resetting the UI.");
            self.reset_ui(CHOOSE_DATASET);
            return Ok(());
        };

        let result = match timed("load_dataset", || self.open_for_selection(&id)) {
            Ok(loaded) => {
                counter!("dashboard_dataset_loads_total", "outcome" => "ok").increment(1);
                self.apply_loaded(loaded);
                Ok(())
            }
            Err(OpenError::Format(reason)) => {
                counter!("dashboard_dataset_loads_total", "outcome" => "format_error").increment(1);
                warn!(dataset = %id, %reason, "Normalization failed. Resetting the UI");
                self.reset_ui(UNKNOWN_FORMAT);
                Ok(())
            }
            Err(e) => {
                counter!("dashboard_dataset_loads_total", "outcome" => "error").increment(1);
                error!(dataset = %id, error = %e, "Failed to load dataset. Resetting the UI");
                self.reset_ui(LOAD_FAILED);
                Err(e.into())
            }
        };
        debug!("Update dataset: Finish");
        result
    }

    fn open_for_selection(&self, id: &str) -> Result<LoadedDataset, OpenError> {
        let dataset = self.source.open_dataset(id)?;
        let variables = self
            .renderer
            .filter_visualizable_variables(&dataset, &dataset.data_var_names());
        if variables.is_empty() {
            return Err(OpenError::format(format!("{} has no visualizable variables", id)));
        }
        let time_dependent = variables
            .iter()
            .filter(|v| dataset.is_time_dependent(v))
            .cloned()
            .collect();

        Ok(LoadedDataset {
            dataset,
            variables,
            time_dependent,
        })
    }

    fn apply_loaded(&mut self, loaded: LoadedDataset) {
        let default_variable = if loaded.variables.contains(&self.config.preferred_variable) {
            self.config.preferred_variable.clone()
        } else {
            loaded.variables[0].clone()
        };
        info!(
            dataset = %loaded.dataset.id(),
            variables = ?loaded.variables,
            default = %default_variable,
            "Normalization succeeded. Setting widgets"
        );

        // the wireframe belongs to the previous mesh
        let same_dataset = self
            .loaded
            .as_ref()
            .is_some_and(|previous| previous.dataset.id() == loaded.dataset.id());
        if !same_dataset {
            self.artifacts.reset_mesh();
        }

        self.selection
            .populate_variables(&loaded.variables, &loaded.time_dependent, &default_variable);
        self.loaded = Some(loaded);
        self.layout.publish_main(vec![Panel::Alert(PLEASE_RENDER)]);
        self.artifacts.reset_colorbar();
        self.on_variable_change();
    }

    fn on_variable_change(&mut self) {
        let times = match (&self.loaded, self.selection.variable()) {
            (Some(loaded), Some(variable)) if loaded.dataset.is_time_dependent(variable) => {
                Some(loaded.dataset.times().to_vec())
            }
            _ => None,
        };
        match times {
            Some(times) => self.selection.offer_times(&times),
            None => self.selection.clear_times(),
        }
        self.selection.enable_render();
        self.artifacts.reset_colorbar();
    }

    fn reset_ui(&mut self, message: Alert) {
        self.selection.reset_dependents();
        self.loaded = None;
        timed("reset_ui", || self.layout.publish_main(vec![Panel::Alert(message)]));
        self.artifacts.clear();
    }

    fn publish_sidebar(&self) {
        self.layout.publish_sidebar(&self.selection);
    }

    // ========================================================================
    // Render pipeline
    // ========================================================================

    pub fn render(&mut self) -> DashboardResult<RenderOutcome> {
        self.selection.render_button().validate()?;
        let request = self.render_request()?;

        let _stopwatch = Stopwatch::start("render");
        info!(dataset = %request.dataset_id, variable = %request.variable, "Rendering: start");
        counter!("dashboard_renders_total").increment(1);
        self.log_widgets();

        let zoom = self.capture_zoom(&request);
        self.teardown();

        let result = self.build_and_publish(&request, zoom);
        if let Err(e) = &result {
            counter!("dashboard_render_failures_total").increment(1);
            error!(
                dataset = %request.dataset_id,
                variable = %request.variable,
                timestamp = ?request.timestamp,
                error = %e,
                "Something went wrong"
            );
            self.layout.publish_main(vec![Panel::Alert(RENDER_FAILED)]);
        }
        info!("Rendering: finished");
        result
    }

    fn render_request(&self) -> DashboardResult<RenderRequest> {
        let selection = &self.selection;
        let (Some(dataset_id), Some(variable)) = (selection.dataset_id(), selection.variable()) else {
            return Err(DashboardError::NoDatasetLoaded);
        };

        Ok(RenderRequest {
            dataset_id: dataset_id.to_string(),
            variable: variable.to_string(),
            timestamp: selection.timestamp(),
            ts_variable: selection.ts_variable().map(str::to_string),
            keep_zoom: selection.keep_zoom(),
            show_mesh: selection.show_mesh(),
        })
    }

    fn log_widgets(&self) {
        debug!("Widget values:");
        for (name, value) in self.selection.widget_values() {
            debug!(widget = name, %value, "{}: {}", name, value);
        }
    }

    /// Step 1: ranges of the outgoing raster, when zoom is kept.
    fn capture_zoom(&self, request: &RenderRequest) -> Option<ZoomRange> {
        let zoom = if request.keep_zoom {
            self.artifacts.raster().and_then(RasterArtifact::display_range)
        } else {
            None
        };
        debug!(?zoom, "Captured zoom");
        zoom
    }

    /// Step 2: release the composite and the raster, replace the main
    /// region with the spinner, then hint reclamation.
    fn teardown(&mut self) {
        let _stopwatch = Stopwatch::start("spinner");
        self.artifacts.release_for_rebuild();
        self.layout.publish_main(vec![Panel::Spinner]);
        memory::reclamation_hint();
    }

    /// Steps 3 to 10.
    fn build_and_publish(
        &mut self,
        request: &RenderRequest,
        zoom: Option<ZoomRange>,
    ) -> DashboardResult<RenderOutcome> {
        let dataset = timed("open_dataset", || self.source.open_dataset(&request.dataset_id))?;
        let sliced = match request.timestamp {
            Some(ts) => Some(dataset.sel_time(ts)?),
            None => None,
        };
        let view = sliced.as_ref().unwrap_or(&dataset);

        let trimesh = timed("trimesh", || self.renderer.build_trimesh(view, &request.variable))?;
        let lon_range = zoom.map(|z| z.lon);
        let lat_range = zoom.map(|z| z.lat);

        let mut mesh_built = false;
        if request.show_mesh && self.artifacts.mesh().is_none() {
            let mesh = timed("mesh", || self.renderer.build_wireframe(&trimesh, lon_range, lat_range))?;
            self.artifacts.set_mesh(Arc::new(mesh));
            mesh_built = true;
        }

        let raster = timed("raster", || -> DashboardResult<Arc<Layer>> {
            let mut raster = self.renderer.build_raster(&trimesh, lon_range, lat_range)?;
            raster.set_fontscale(self.config.fontscale);
            Ok(Arc::new(raster))
        })?;
        self.artifacts.set_raster(RasterArtifact::new(raster.clone()));
        drop(trimesh);

        let colorbar = timed("colorbar", || {
            let limits = self
                .config
                .colorbar
                .limits_for(&request.variable, self.artifacts.colorbar().map(Arc::as_ref));
            Arc::new(ColorbarRow::new(raster.id(), limits))
        });
        self.artifacts.set_colorbar(colorbar.clone());

        let mesh = if request.show_mesh {
            self.artifacts.mesh().cloned()
        } else {
            None
        };
        let overlay = timed("compose", || Arc::new(Overlay::new(self.tiles.clone()) * raster.clone() * mesh));
        self.artifacts.set_overlay(overlay.clone());

        let timeseries = match &request.ts_variable {
            Some(ts_variable) => {
                let plot = timed("timeseries", || {
                    self.renderer
                        .build_tap_timeseries(&dataset, ts_variable, &raster, self.config.fontscale)
                })?;
                Some(Arc::new(TimeSeriesBlock::new(plot)))
            }
            None => None,
        };

        let mut panels = vec![Panel::Overlay(overlay), Panel::Colorbar(colorbar)];
        panels.extend(timeseries.map(Panel::TimeSeries));
        let count = panels.len();
        timed("publish", || self.layout.publish_main(panels));

        Ok(RenderOutcome {
            raster: raster.id(),
            zoom,
            mesh_built,
            panels: count,
        })
    }
}
