//! Common types shared by the seareport dashboard crates.
//!
//! Holds the normalized dataset handle, the renderable layer model and the
//! collaborator traits the dashboard controller is written against.

pub mod collaborators;
pub mod dataset;
pub mod error;
pub mod layer;

pub use collaborators::{DatasetCatalog, DatasetSource, Notifier, RenderPrimitives};
pub use dataset::{Dataset, Timestamp, Variable, TIME_DIM};
pub use error::{CatalogError, DatasetError, NotifyError, OpenError, RenderError};
pub use layer::{Layer, LayerId, LayerKind, Range, ZoomRange};
