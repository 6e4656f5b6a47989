//! Seareport dashboard host service.
//!
//! Wires the storage adapters, the render primitives and the dashboard
//! controller together and exposes them over HTTP.

pub mod config;
pub mod rendering;
pub mod server;

pub use config::Config;
pub use rendering::{LayerSpecRenderer, TrimeshSpec};
pub use server::{create_router, AppState};
