//! Dataset fixtures.
//!
//! The shapes mirror the storm-surge model output the dashboard is used
//! with: a mesh-only maximum-elevation field, a bathymetry field and an
//! hourly elevation time series.

use chrono::{Duration, TimeZone, Utc};
use seareport_common::{Dataset, Range, Timestamp, Variable, ZoomRange};

/// Identifier of the default fixture dataset.
pub const GLOBAL_ID: &str = "global-v1/20240101.zarr";

/// Extent of the fixture mesh.
pub fn fixture_extent() -> ZoomRange {
    ZoomRange::new(Range::new(-180.0, 180.0), Range::new(-75.0, 75.0))
}

/// `count` hourly timestamps starting at 2024-01-01T00:00Z.
pub fn hourly_times(count: usize) -> Vec<Timestamp> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|h| start + Duration::hours(h as i64))
        .collect()
}

/// Dataset whose variables have no time dimension.
pub fn static_dataset(id: &str, variables: &[&str]) -> Dataset {
    variables
        .iter()
        .fold(Dataset::new(id, 1_000, 1_900), |ds, name| {
            ds.with_variable(Variable::new(*name, ["node"]))
        })
        .with_extent(Some(fixture_extent()))
}

/// Dataset with a time-dependent `elev` plus static `elev_max` and `depth`.
pub fn surge_dataset(id: &str, steps: usize) -> Dataset {
    Dataset::new(id, 1_000, 1_900)
        .with_variable(Variable::new("elev", ["time", "node"]))
        .with_variable(Variable::new("elev_max", ["node"]))
        .with_variable(Variable::new("depth", ["node"]))
        .with_variable(Variable::new("triface_nodes", ["face", "three"]))
        .with_times(hourly_times(steps))
        .with_extent(Some(fixture_extent()))
}
