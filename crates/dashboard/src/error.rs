//! Error types for the dashboard controller.

use seareport_common::{CatalogError, DatasetError, OpenError, RenderError};
use thiserror::Error;

/// Result type alias using DashboardError.
pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    // === Selection Errors ===
    #[error("Invalid selection for '{control}': {message}")]
    InvalidSelection { control: String, message: String },

    #[error("No dataset is loaded")]
    NoDatasetLoaded,

    #[error("No colorbar to update; render first")]
    NoColorbar,

    // === Collaborator Errors ===
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    // === Infrastructure Errors ===
    #[error("Callback panicked: {0}")]
    Panic(String),

    #[error("Dashboard event loop has shut down")]
    Closed,
}

impl DashboardError {
    /// [`DashboardError::is_client_error`] over a type-erased error.
    pub fn is_client_fault(err: &(dyn std::error::Error + 'static)) -> bool {
        err.downcast_ref::<DashboardError>()
            .is_some_and(DashboardError::is_client_error)
    }

    pub fn invalid_selection(control: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelection {
            control: control.into(),
            message: message.into(),
        }
    }

    /// Whether the error was caused by the request rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelection { .. } | Self::NoDatasetLoaded | Self::NoColorbar
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(DashboardError::invalid_selection("variable", "disabled").is_client_error());
        assert!(DashboardError::NoColorbar.is_client_error());
        assert!(!DashboardError::Open(OpenError::storage("timeout")).is_client_error());
        assert!(!DashboardError::Panic("boom".into()).is_client_error());
    }

    #[test]
    fn test_client_fault_downcast() {
        let err = DashboardError::NoDatasetLoaded;
        assert!(DashboardError::is_client_fault(&err));
        assert!(!DashboardError::is_client_fault(&OpenError::format("x")));
    }

    #[test]
    fn test_transparent_messages() {
        let err: DashboardError = OpenError::format("bad layout").into();
        assert_eq!(err.to_string(), "unrecognized dataset format: bad layout");
    }
}
