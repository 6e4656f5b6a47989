//! Seareport dashboard core.
//!
//! Provides:
//! - The selection state (sidebar widgets and their dependency rules)
//! - The render controller and its teardown-before-build pipeline
//! - The published layout (sidebar and main regions)
//! - The event loop serializing UI callbacks, and the periodic dataset refresh
//! - The fault reporter wrapping every externally triggered callback

pub mod artifacts;
pub mod colorbar;
pub mod controller;
pub mod error;
pub mod events;
pub mod fault;
pub mod layout;
pub mod memory;
pub mod notify;
pub mod refresh;
pub mod selection;
pub mod timing;
pub mod widgets;

pub use artifacts::{RasterArtifact, RenderArtifacts};
pub use colorbar::{ColorLimits, ColorbarRow, ColorbarRule};
pub use controller::{ControllerConfig, DashboardController, LoadedDataset, RenderOutcome};
pub use error::{DashboardError, DashboardResult};
pub use events::{EventLoop, EventLoopHandle, EventSender, UiEvent, DEFAULT_QUEUE_CAPACITY};
pub use fault::{FaultReport, FaultReporter};
pub use layout::{
    Alert, AlertKind, LayoutHandle, LayoutSnapshot, MainContent, Overlay, Panel, TimeSeriesBlock,
};
pub use notify::{CommandNotifier, NotifyConfig};
pub use refresh::{RefreshConfig, RefreshTask};
pub use selection::SelectionState;
