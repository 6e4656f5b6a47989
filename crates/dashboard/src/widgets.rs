//! Sidebar widget models.
//!
//! Widgets only hold values and enablement; validation of user input happens
//! here so a rejected change never reaches the controller state.

use serde::Serialize;

use seareport_common::Timestamp;

use crate::error::{DashboardError, DashboardResult};

/// Drop-down over string options. The empty string means "nothing selected".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Select {
    name: &'static str,
    options: Vec<String>,
    value: String,
    disabled: bool,
}

impl Select {
    /// A disabled select without options.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            options: Vec::new(),
            value: String::new(),
            disabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value, or `None` for the empty selection.
    pub fn selected(&self) -> Option<&str> {
        (!self.value.is_empty()).then_some(self.value.as_str())
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Check that a user may pick `value`.
    pub fn validate(&self, value: &str) -> DashboardResult<()> {
        if self.disabled {
            return Err(DashboardError::invalid_selection(self.name, "control is disabled"));
        }
        if !self.options.iter().any(|o| o == value) {
            return Err(DashboardError::invalid_selection(
                self.name,
                format!("'{}' is not one of the options", value),
            ));
        }
        Ok(())
    }

    pub(crate) fn set_options(&mut self, options: Vec<String>) {
        self.options = options;
    }

    pub(crate) fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub(crate) fn enable(&mut self) {
        self.disabled = false;
    }

    pub(crate) fn disable_and_clear(&mut self) {
        self.options.clear();
        self.value.clear();
        self.disabled = true;
    }
}

/// Drop-down over the time coordinate of the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSelect {
    name: &'static str,
    options: Vec<Timestamp>,
    value: Option<Timestamp>,
    disabled: bool,
}

impl TimeSelect {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            options: Vec::new(),
            value: None,
            disabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn options(&self) -> &[Timestamp] {
        &self.options
    }

    pub fn value(&self) -> Option<Timestamp> {
        self.value
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// `None` clears the selection and is always allowed on an enabled control.
    pub fn validate(&self, value: Option<Timestamp>) -> DashboardResult<()> {
        if self.disabled {
            return Err(DashboardError::invalid_selection(self.name, "control is disabled"));
        }
        match value {
            Some(ts) if !self.options.contains(&ts) => Err(DashboardError::invalid_selection(
                self.name,
                format!("{} is not one of the options", ts.to_rfc3339()),
            )),
            _ => Ok(()),
        }
    }

    /// Replace the options and select the first one.
    pub(crate) fn populate(&mut self, options: &[Timestamp]) {
        self.options = options.to_vec();
        self.value = self.options.first().copied();
        self.disabled = false;
    }

    pub(crate) fn set_value(&mut self, value: Option<Timestamp>) {
        self.value = value;
    }

    pub(crate) fn disable_and_clear(&mut self) {
        self.options.clear();
        self.value = None;
        self.disabled = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Checkbox {
    name: &'static str,
    value: bool,
    disabled: bool,
}

impl Checkbox {
    /// A disabled checkbox holding `value`.
    pub fn new(name: &'static str, value: bool) -> Self {
        Self {
            name,
            value,
            disabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn validate(&self) -> DashboardResult<()> {
        if self.disabled {
            return Err(DashboardError::invalid_selection(self.name, "control is disabled"));
        }
        Ok(())
    }

    pub(crate) fn set_value(&mut self, value: bool) {
        self.value = value;
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    name: &'static str,
    disabled: bool,
}

impl Button {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            disabled: true,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn validate(&self) -> DashboardResult<()> {
        if self.disabled {
            return Err(DashboardError::invalid_selection(self.name, "control is disabled"));
        }
        Ok(())
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}
