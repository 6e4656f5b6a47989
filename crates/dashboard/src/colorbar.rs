//! Colorbar limits row.
//!
//! The row is linked to the raster's colour mapper on the client by layer id.
//! It holds no reference to the raster itself, so dropping the raster
//! artifact releases it even while the row is kept for the next render.

use serde::{Deserialize, Serialize};

use seareport_common::LayerId;

/// Colour mapper bounds. `None` lets the client auto-scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorLimits {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ColorLimits {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn unset() -> Self {
        Self::default()
    }
}

/// Default limits for variables whose name contains `pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorbarRule {
    pub pattern: String,
    pub min: f64,
    pub max: f64,
}

impl Default for ColorbarRule {
    fn default() -> Self {
        Self {
            pattern: "elev".to_string(),
            min: 0.2,
            max: 0.8,
        }
    }
}

impl ColorbarRule {
    pub fn defaults_for(&self, variable: &str) -> ColorLimits {
        if variable.contains(&self.pattern) {
            ColorLimits::new(Some(self.min), Some(self.max))
        } else {
            ColorLimits::unset()
        }
    }

    /// Limits for the next row: the previous row's values win over the
    /// defaults, including unset ones.
    pub fn limits_for(&self, variable: &str, previous: Option<&ColorbarRow>) -> ColorLimits {
        match previous {
            Some(row) => row.limits(),
            None => self.defaults_for(variable),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorbarRow {
    raster: LayerId,
    limits: ColorLimits,
}

impl ColorbarRow {
    pub fn new(raster: LayerId, limits: ColorLimits) -> Self {
        Self { raster, limits }
    }

    /// Layer whose colour mapper the row drives.
    pub fn raster(&self) -> LayerId {
        self.raster
    }

    pub fn limits(&self) -> ColorLimits {
        self.limits
    }

    /// The same row with new widget values.
    pub fn with_limits(&self, limits: ColorLimits) -> Self {
        Self {
            raster: self.raster,
            limits,
        }
    }
}
