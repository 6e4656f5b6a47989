//! Selection state: the sidebar widgets and their dependency rules.
//!
//! Every mutation goes through a named transition. The controller decides
//! which transitions to run; this module only keeps the widgets consistent:
//! the dependent controls have options only while a dataset is loaded.

use serde::Serialize;

use seareport_common::Timestamp;

use crate::error::DashboardResult;
use crate::widgets::{Button, Checkbox, Select, TimeSelect};

/// User-chosen inputs of a render, plus their enablement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    dataset_file: Select,
    variable: Select,
    time: TimeSelect,
    ts_variable: Select,
    keep_zoom: Checkbox,
    show_mesh: Checkbox,
    render: Button,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    /// Startup state: only the dataset selector is enabled, with no datasets
    /// listed yet.
    pub fn new() -> Self {
        let mut dataset_file = Select::new("Dataset file");
        dataset_file.set_options(vec![String::new()]);
        dataset_file.enable();

        Self {
            dataset_file,
            variable: Select::new("Plot Variable"),
            time: TimeSelect::new("Time"),
            ts_variable: Select::new("Timeseries Variable"),
            keep_zoom: Checkbox::new("Keep Zoom", true),
            show_mesh: Checkbox::new("Overlay Mesh", false),
            render: Button::new("Render"),
        }
    }

    // ------------------------------------------------------------------
    // Widgets
    // ------------------------------------------------------------------

    pub fn dataset_file(&self) -> &Select {
        &self.dataset_file
    }

    pub fn variable_select(&self) -> &Select {
        &self.variable
    }

    pub fn time_select(&self) -> &TimeSelect {
        &self.time
    }

    pub fn ts_variable_select(&self) -> &Select {
        &self.ts_variable
    }

    pub fn keep_zoom_checkbox(&self) -> &Checkbox {
        &self.keep_zoom
    }

    pub fn show_mesh_checkbox(&self) -> &Checkbox {
        &self.show_mesh
    }

    pub fn render_button(&self) -> &Button {
        &self.render
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_file.selected()
    }

    pub fn variable(&self) -> Option<&str> {
        self.variable.selected()
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.time.value()
    }

    pub fn ts_variable(&self) -> Option<&str> {
        self.ts_variable.selected()
    }

    pub fn keep_zoom(&self) -> bool {
        self.keep_zoom.value()
    }

    pub fn show_mesh(&self) -> bool {
        self.show_mesh.value()
    }

    /// Name/value pairs of every widget, for logging.
    pub fn widget_values(&self) -> Vec<(&'static str, String)> {
        let time = self
            .time
            .value()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_default();

        vec![
            (self.dataset_file.name(), self.dataset_file.value().to_string()),
            (self.variable.name(), self.variable.value().to_string()),
            (self.time.name(), time),
            (self.ts_variable.name(), self.ts_variable.value().to_string()),
            (self.keep_zoom.name(), self.keep_zoom.value().to_string()),
            (self.show_mesh.name(), self.show_mesh.value().to_string()),
        ]
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Replace the dataset options with `""` followed by `ids`.
    ///
    /// Returns the previously selected id if it is no longer listed; the
    /// selection is cleared in that case.
    pub(crate) fn set_dataset_options(&mut self, ids: Vec<String>) -> Option<String> {
        let mut options = Vec::with_capacity(ids.len() + 1);
        options.push(String::new());
        options.extend(ids);

        let dropped = self
            .dataset_id()
            .filter(|current| !options.iter().any(|o| o == current))
            .map(str::to_string);
        if dropped.is_some() {
            self.dataset_file.set_value("");
        }
        self.dataset_file.set_options(options);
        dropped
    }

    pub(crate) fn choose_dataset(&mut self, id: &str) -> DashboardResult<()> {
        self.dataset_file.validate(id)?;
        self.dataset_file.set_value(id);
        Ok(())
    }

    /// Disable and clear every control that depends on a loaded dataset.
    /// The checkboxes keep their values.
    pub(crate) fn reset_dependents(&mut self) {
        self.variable.disable_and_clear();
        self.ts_variable.disable_and_clear();
        self.time.disable_and_clear();
        self.keep_zoom.set_disabled(true);
        self.show_mesh.set_disabled(true);
        self.render.set_disabled(true);
    }

    /// Populate the dependent controls for a freshly loaded dataset.
    pub(crate) fn populate_variables(
        &mut self,
        variables: &[String],
        time_dependent: &[String],
        default_variable: &str,
    ) {
        self.variable.set_options(variables.to_vec());
        self.variable.set_value(default_variable);
        self.variable.enable();

        let mut ts_options = Vec::with_capacity(time_dependent.len() + 1);
        ts_options.push(String::new());
        ts_options.extend(time_dependent.iter().cloned());
        self.ts_variable.set_options(ts_options);
        self.ts_variable.set_value("");
        self.ts_variable.enable();

        self.keep_zoom.set_disabled(false);
        self.show_mesh.set_disabled(false);
    }

    pub(crate) fn choose_variable(&mut self, name: &str) -> DashboardResult<()> {
        self.variable.validate(name)?;
        self.variable.set_value(name);
        Ok(())
    }

    /// Offer `times` for selection, with nothing selected.
    pub(crate) fn offer_times(&mut self, times: &[Timestamp]) {
        self.time.populate(times);
    }

    pub(crate) fn clear_times(&mut self) {
        self.time.disable_and_clear();
    }

    pub(crate) fn enable_render(&mut self) {
        self.render.set_disabled(false);
    }

    pub(crate) fn choose_time(&mut self, time: Option<Timestamp>) -> DashboardResult<()> {
        self.time.validate(time)?;
        self.time.set_value(time);
        Ok(())
    }

    pub(crate) fn choose_ts_variable(&mut self, name: &str) -> DashboardResult<()> {
        self.ts_variable.validate(name)?;
        self.ts_variable.set_value(name);
        Ok(())
    }

    pub(crate) fn set_keep_zoom(&mut self, value: bool) -> DashboardResult<()> {
        self.keep_zoom.validate()?;
        self.keep_zoom.set_value(value);
        Ok(())
    }

    pub(crate) fn set_show_mesh(&mut self, value: bool) -> DashboardResult<()> {
        self.show_mesh.validate()?;
        self.show_mesh.set_value(value);
        Ok(())
    }
}
