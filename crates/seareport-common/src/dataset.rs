//! Normalized dataset handle.
//!
//! Datasets are unstructured triangular meshes: every data variable lives on
//! the `node` dimension and may additionally depend on `time`. The handle
//! only carries metadata; array data stays in storage and is fetched by the
//! render primitives on demand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::layer::ZoomRange;

/// Opaque, totally ordered time coordinate value.
pub type Timestamp = DateTime<Utc>;

/// Name of the time dimension in the canonical layout.
pub const TIME_DIM: &str = "time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
}

impl Variable {
    pub fn new<I, S>(name: impl Into<String>, dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dims: dims.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn is_time_dependent(&self) -> bool {
        self.has_dim(TIME_DIM)
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    id: String,
    variables: Vec<Variable>,
    times: Arc<[Timestamp]>,
    selected_time: Option<Timestamp>,
    node_count: usize,
    face_count: usize,
    extent: Option<ZoomRange>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, node_count: usize, face_count: usize) -> Self {
        Self {
            id: id.into(),
            variables: Vec::new(),
            times: Arc::from(Vec::new()),
            selected_time: None,
            node_count,
            face_count,
            extent: None,
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_times(mut self, times: Vec<Timestamp>) -> Self {
        self.times = Arc::from(times);
        self
    }

    pub fn with_extent(mut self, extent: Option<ZoomRange>) -> Self {
        self.extent = extent;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Data variables in source order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn data_var_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn is_time_dependent(&self, name: &str) -> bool {
        self.variable(name).is_some_and(Variable::is_time_dependent)
    }

    /// Values of the time coordinate in their native order.
    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    /// The timestamp this view was sliced at, if any.
    pub fn selected_time(&self) -> Option<Timestamp> {
        self.selected_time
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn extent(&self) -> Option<ZoomRange> {
        self.extent
    }

    /// Select a single time step.
    ///
    /// The returned view drops the `time` dimension from every variable and
    /// keeps `timestamp` as its scalar time coordinate.
    pub fn sel_time(&self, timestamp: Timestamp) -> Result<Dataset, DatasetError> {
        if self.times.is_empty() {
            return Err(DatasetError::NoTimeDimension);
        }
        if !self.times.contains(&timestamp) {
            return Err(DatasetError::TimeNotFound(timestamp.to_rfc3339()));
        }

        let variables = self
            .variables
            .iter()
            .map(|v| Variable {
                name: v.name.clone(),
                dims: v.dims.iter().filter(|d| *d != TIME_DIM).cloned().collect(),
            })
            .collect();

        Ok(Dataset {
            id: self.id.clone(),
            variables,
            times: Arc::from(Vec::new()),
            selected_time: Some(timestamp),
            node_count: self.node_count,
            face_count: self.face_count,
            extent: self.extent,
        })
    }
}
