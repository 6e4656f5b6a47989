//! Shared test utilities for the seareport dashboard workspace.
//!
//! This crate provides:
//! - Dataset fixtures shaped like the normalized mesh datasets
//! - Fakes for every collaborator the controller depends on
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;

/// Macro for approximate equality of two [`seareport_common::Range`] values.
///
/// ```ignore
/// use test_utils::assert_range_approx_eq;
///
/// assert_range_approx_eq!(Range::new(0.0, 1.0), Range::new(0.0, 1.0000001), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_range_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: seareport_common::Range = $left;
        let right: seareport_common::Range = $right;
        let epsilon: f64 = $epsilon;
        let diff = (left.min - right.min).abs().max((left.max - right.max).abs());
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
