//! In-memory fakes for the controller's collaborators.
//!
//! Each fake keeps its state behind an `Arc` so a test can hand the fake to
//! the controller and still inspect what happened through a cloned handle.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use seareport_common::{
    CatalogError, Dataset, DatasetCatalog, DatasetSource, Layer, LayerId, LayerKind, Notifier,
    NotifyError, OpenError, Range, RenderError, RenderPrimitives, Timestamp,
};
use serde_json::json;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Dataset source
// ============================================================================

#[derive(Debug, Clone)]
enum Scripted {
    Ok(Dataset),
    Format(String),
    Storage(String),
}

/// Dataset source answering from a scripted table.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    datasets: Arc<Mutex<HashMap<String, Scripted>>>,
    opens: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }

    pub fn with_format_error(self, id: &str) -> Self {
        lock(&self.datasets).insert(id.to_string(), Scripted::Format(format!("no handler for {id}")));
        self
    }

    pub fn with_storage_error(self, id: &str) -> Self {
        lock(&self.datasets).insert(id.to_string(), Scripted::Storage(format!("connection reset reading {id}")));
        self
    }

    pub fn insert(&self, dataset: Dataset) {
        lock(&self.datasets).insert(dataset.id().to_string(), Scripted::Ok(dataset));
    }

    /// Identifiers opened so far, in call order.
    pub fn opens(&self) -> Vec<String> {
        lock(&self.opens).clone()
    }

    pub fn open_count(&self, id: &str) -> usize {
        lock(&self.opens).iter().filter(|o| o.as_str() == id).count()
    }
}

impl DatasetSource for FakeSource {
    fn open_dataset(&self, identifier: &str) -> Result<Dataset, OpenError> {
        lock(&self.opens).push(identifier.to_string());
        match lock(&self.datasets).get(identifier) {
            Some(Scripted::Ok(dataset)) => Ok(dataset.clone()),
            Some(Scripted::Format(msg)) => Err(OpenError::format(msg.clone())),
            Some(Scripted::Storage(msg)) => Err(OpenError::storage(msg.clone())),
            None => Err(OpenError::storage(format!("{identifier} does not exist"))),
        }
    }
}

// ============================================================================
// Render primitives
// ============================================================================

/// Geometry produced by [`RecordingRenderer::build_trimesh`].
#[derive(Debug, Clone, PartialEq)]
pub struct FakeTrimesh {
    pub dataset_id: String,
    pub variable: String,
    pub time: Option<Timestamp>,
    pub extent: Option<seareport_common::ZoomRange>,
}

/// Pipeline stage a [`RecordingRenderer`] can be told to fail at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Trimesh,
    Wireframe,
    Raster,
    TimeSeries,
}

/// One call made to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Trimesh {
        variable: String,
        time: Option<Timestamp>,
    },
    Wireframe {
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    },
    Raster {
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    },
    TimeSeries {
        variable: String,
        source: LayerId,
        sliced: bool,
        fontscale: f64,
    },
}

type AliveCheck = Box<dyn Fn() -> bool + Send>;

#[derive(Default)]
struct RecorderState {
    calls: Mutex<Vec<RenderCall>>,
    fail_at: Mutex<Option<FailAt>>,
    alive_checks: Mutex<Vec<AliveCheck>>,
    alive_at_trimesh: Mutex<Vec<bool>>,
}

/// Render primitives that build lightweight layers and record every call.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    state: Arc<RecorderState>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle sharing this renderer's log; keep it after moving the renderer.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        lock(&self.state.calls).clone()
    }

    pub fn count(&self, pred: impl Fn(&RenderCall) -> bool) -> usize {
        lock(&self.state.calls).iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.calls).clear();
    }

    pub fn fail_at(&self, stage: Option<FailAt>) {
        *lock(&self.state.fail_at) = stage;
    }

    /// Watch an object; whether it is still alive is sampled every time a
    /// trimesh is built.
    pub fn watch<T: Send + Sync + 'static>(&self, weak: Weak<T>) {
        lock(&self.state.alive_checks).push(Box::new(move || weak.upgrade().is_some()));
    }

    /// For every trimesh build so far: was any watched object still alive?
    pub fn watched_alive_at_trimesh(&self) -> Vec<bool> {
        lock(&self.state.alive_at_trimesh).clone()
    }

    fn record(&self, call: RenderCall) {
        lock(&self.state.calls).push(call);
    }

    fn check(&self, stage: FailAt) -> Result<(), RenderError> {
        if *lock(&self.state.fail_at) == Some(stage) {
            return Err(RenderError::Failed(format!("injected failure at {stage:?}")));
        }
        Ok(())
    }
}

impl RenderPrimitives for RecordingRenderer {
    type Geometry = FakeTrimesh;

    fn build_trimesh(&self, dataset: &Dataset, variable: &str) -> Result<FakeTrimesh, RenderError> {
        let alive = lock(&self.state.alive_checks).iter().any(|alive| alive());
        lock(&self.state.alive_at_trimesh).push(alive);

        self.record(RenderCall::Trimesh {
            variable: variable.to_string(),
            time: dataset.selected_time(),
        });
        self.check(FailAt::Trimesh)?;

        if dataset.variable(variable).is_none() {
            return Err(seareport_common::DatasetError::VariableNotFound(variable.to_string()).into());
        }
        Ok(FakeTrimesh {
            dataset_id: dataset.id().to_string(),
            variable: variable.to_string(),
            time: dataset.selected_time(),
            extent: dataset.extent(),
        })
    }

    fn build_wireframe(
        &self,
        geometry: &FakeTrimesh,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError> {
        self.record(RenderCall::Wireframe { lon_range, lat_range });
        self.check(FailAt::Wireframe)?;
        Ok(Layer::new(LayerKind::Wireframe, json!({ "dataset": geometry.dataset_id }))
            .with_ranges(lon_range, lat_range)
            .with_extent(geometry.extent))
    }

    fn build_raster(
        &self,
        geometry: &FakeTrimesh,
        lon_range: Option<Range>,
        lat_range: Option<Range>,
    ) -> Result<Layer, RenderError> {
        self.record(RenderCall::Raster { lon_range, lat_range });
        self.check(FailAt::Raster)?;
        Ok(Layer::new(
            LayerKind::Raster,
            json!({
                "dataset": geometry.dataset_id,
                "variable": geometry.variable,
                "time": geometry.time,
            }),
        )
        .with_ranges(lon_range, lat_range)
        .with_extent(geometry.extent))
    }

    fn build_tap_timeseries(
        &self,
        dataset: &Dataset,
        variable: &str,
        source: &Layer,
        fontscale: f64,
    ) -> Result<Layer, RenderError> {
        self.record(RenderCall::TimeSeries {
            variable: variable.to_string(),
            source: source.id(),
            sliced: dataset.selected_time().is_some(),
            fontscale,
        });
        self.check(FailAt::TimeSeries)?;
        Ok(Layer::new(
            LayerKind::TimeSeries,
            json!({ "variable": variable, "source": source.id() }),
        ))
    }

    fn basemap_tiles(&self) -> Layer {
        Layer::new(LayerKind::Tiles, json!({ "url": "https://tiles.test/{Z}/{X}/{Y}.png" }))
    }

    fn filter_visualizable_variables(&self, dataset: &Dataset, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|name| dataset.variable(name).is_some_and(|v| v.has_dim("node")))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Notifier that stores messages instead of showing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose backend always fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        lock(&self.messages).push(message.to_string());
        if self.failing {
            return Err(NotifyError::Failed {
                program: "recording".to_string(),
                status: 1,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Catalog returning scripted listings; the last listing repeats.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    listings: Arc<Mutex<VecDeque<Option<Vec<String>>>>>,
    last: Arc<Mutex<Vec<String>>>,
    calls: Arc<Mutex<usize>>,
}

impl StaticCatalog {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog = Self::default();
        *lock(&catalog.last) = ids.into_iter().map(Into::into).collect();
        catalog
    }

    /// Queue the next listing.
    pub fn push_listing<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.listings).push_back(Some(ids.into_iter().map(Into::into).collect()));
    }

    /// Queue a failing listing.
    pub fn push_failure(&self) {
        lock(&self.listings).push_back(None);
    }

    pub fn calls(&self) -> usize {
        *lock(&self.calls)
    }
}

#[async_trait]
impl DatasetCatalog for StaticCatalog {
    async fn list_dataset_identifiers(&self) -> Result<Vec<String>, CatalogError> {
        *lock(&self.calls) += 1;
        match lock(&self.listings).pop_front() {
            Some(Some(ids)) => {
                *lock(&self.last) = ids.clone();
                Ok(ids)
            }
            Some(None) => Err(CatalogError::Listing {
                prefix: "global-v1/".to_string(),
                message: "listing timed out".to_string(),
            }),
            None => Ok(lock(&self.last).clone()),
        }
    }
}
