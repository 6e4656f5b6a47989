//! Error types shared across the dashboard crates.

use thiserror::Error;

/// Failure to open a dataset.
///
/// `Format` is the expected failure: the source exists but cannot be
/// normalized into the canonical mesh layout. Everything else is `Storage`.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("unrecognized dataset format: {0}")]
    Format(String),

    #[error("failed to read dataset: {0}")]
    Storage(String),
}

impl OpenError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Errors raised while deriving views of an open dataset.
#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    #[error("time not present in dataset: {0}")]
    TimeNotFound(String),

    #[error("dataset has no time dimension")]
    NoTimeDimension,
}

/// Errors raised by the render primitives.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("variable {variable} cannot be rendered: {reason}")]
    Unrenderable { variable: String, reason: String },

    #[error("rendering failed: {0}")]
    Failed(String),
}

/// Errors raised while enumerating the dataset catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to list datasets under {prefix}: {message}")]
    Listing { prefix: String, message: String },
}

/// Errors raised by a notification backend.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with status {status}")]
    Failed { program: String, status: i32 },
}
