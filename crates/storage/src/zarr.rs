//! Dataset source over consolidated Zarr (v2) stores.
//!
//! Only metadata and the `time` coordinate are read when a dataset is
//! opened; the heavy node arrays are left in storage for the renderer.
//!
//! A store is accepted when it follows the normalized unstructured-mesh
//! layout:
//! - `lon`, `lat` on `(node,)`
//! - `triface_nodes` on `(face, three)`
//! - data variables on `(node,)` or `(time, node)`
//! - an optional `time` coordinate with CF units
//!
//! Anything else is reported as [`OpenError::Format`].

use std::collections::BTreeMap;
use std::sync::Arc;

use object_store::ObjectStore;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};
use zarrs::array::{Array, ArrayCreateError, ArrayError, DataType, ElementOwned};
use zarrs_object_store::AsyncObjectStore;

use seareport_common::{
    Dataset, DatasetSource, OpenError, Range, Timestamp, Variable, ZoomRange, TIME_DIM,
};

use crate::cf_time::{check_calendar, CfTimeError, TimeUnits};
use crate::error::StorageError;
use crate::object_store::ObjectStorage;

const CONSOLIDATED_KEY: &str = ".zmetadata";
const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";
const COORDINATES: [&str; 3] = ["lon", "lat", TIME_DIM];

/// zarrs view of the same object store.
type ZarrStore = AsyncObjectStore<Arc<dyn ObjectStore>>;

/// The part of a `.zarray` document the layout check needs. Chunk
/// decoding is left to zarrs.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayMeta {
    pub shape: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct ConsolidatedDoc {
    metadata: Map<String, Value>,
}

/// One array of the store with its dimension names and attributes.
#[derive(Debug, Clone)]
pub struct ArrayEntry {
    pub meta: ArrayMeta,
    pub dims: Vec<String>,
    pub attrs: Map<String, Value>,
}

/// Parsed consolidated metadata of a store.
#[derive(Debug, Clone, Default)]
pub struct StoreMetadata {
    pub arrays: BTreeMap<String, ArrayEntry>,
    pub attrs: Map<String, Value>,
}

impl StoreMetadata {
    /// Parse a `.zmetadata` document.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let doc: ConsolidatedDoc =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid consolidated metadata: {}", e))?;

        let mut metadata = StoreMetadata::default();
        if let Some(Value::Object(attrs)) = doc.metadata.get(".zattrs") {
            metadata.attrs = attrs.clone();
        }

        for (key, value) in &doc.metadata {
            let Some(name) = key.strip_suffix("/.zarray") else {
                continue;
            };
            // nested groups are not part of the layout
            if name.contains('/') {
                continue;
            }

            let meta: ArrayMeta = serde_json::from_value(value.clone())
                .map_err(|e| format!("invalid .zarray for {}: {}", name, e))?;
            let attrs = match doc.metadata.get(&format!("{}/.zattrs", name)) {
                Some(Value::Object(attrs)) => attrs.clone(),
                _ => Map::new(),
            };
            let dims = attrs
                .get(DIMENSIONS_ATTR)
                .and_then(Value::as_array)
                .ok_or_else(|| format!("array {} has no {} attribute", name, DIMENSIONS_ATTR))?
                .iter()
                .map(|d| d.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| format!("array {} has non-string dimension names", name))?;

            if dims.len() != meta.shape.len() {
                return Err(format!(
                    "array {} declares {} dimensions for a {}-d shape",
                    name,
                    dims.len(),
                    meta.shape.len()
                ));
            }

            metadata.arrays.insert(name.to_string(), ArrayEntry { meta, dims, attrs });
        }

        Ok(metadata)
    }

    fn array_with_dims(&self, name: &str, dims: &[&str]) -> Result<&ArrayEntry, String> {
        let entry = self
            .arrays
            .get(name)
            .ok_or_else(|| format!("missing `{}` array", name))?;
        if entry.dims.iter().map(String::as_str).ne(dims.iter().copied()) {
            return Err(format!("`{}` has dimensions {:?}, expected {:?}", name, entry.dims, dims));
        }
        Ok(entry)
    }

    /// Check the mesh layout and derive the dataset shape.
    pub fn normalize(&self) -> Result<MeshLayout, String> {
        let lon = self.array_with_dims("lon", &["node"])?;
        let lat = self.array_with_dims("lat", &["node"])?;
        if lon.meta.shape != lat.meta.shape {
            return Err("`lon` and `lat` differ in length".to_string());
        }
        let faces = self.array_with_dims("triface_nodes", &["face", "three"])?;
        if faces.meta.shape[1] != 3 {
            return Err("`triface_nodes` is not a triangle table".to_string());
        }

        let time = match self.arrays.get(TIME_DIM) {
            Some(_) => Some(self.array_with_dims(TIME_DIM, &[TIME_DIM])?.clone()),
            None => None,
        };

        let mut variables = Vec::new();
        for (name, entry) in &self.arrays {
            if COORDINATES.contains(&name.as_str()) {
                continue;
            }
            // dimension coordinates such as `node(node)`
            if entry.dims.len() == 1 && entry.dims[0] == *name {
                continue;
            }
            if time.is_none() && entry.dims.iter().any(|d| d == TIME_DIM) {
                return Err(format!("`{}` depends on time but the store has no time coordinate", name));
            }
            variables.push(Variable::new(name.clone(), entry.dims.iter().cloned()));
        }

        Ok(MeshLayout {
            node_count: lon.meta.shape[0],
            face_count: faces.meta.shape[0],
            variables,
            time,
            extent: self.extent(),
        })
    }

    /// Mesh extent from the ACDD `geospatial_*` global attributes.
    fn extent(&self) -> Option<ZoomRange> {
        let attr = |key: &str| self.attrs.get(key).and_then(Value::as_f64);
        Some(ZoomRange::new(
            Range::new(attr("geospatial_lon_min")?, attr("geospatial_lon_max")?),
            Range::new(attr("geospatial_lat_min")?, attr("geospatial_lat_max")?),
        ))
    }
}

/// Shape of a store that passed normalization.
#[derive(Debug, Clone)]
pub struct MeshLayout {
    pub node_count: usize,
    pub face_count: usize,
    pub variables: Vec<Variable>,
    pub time: Option<ArrayEntry>,
    pub extent: Option<ZoomRange>,
}

/// Dataset source reading consolidated Zarr stores from object storage.
pub struct ZarrDatasetSource {
    storage: Arc<ObjectStorage>,
    zarr: Arc<ZarrStore>,
    runtime: Handle,
}

impl ZarrDatasetSource {
    /// `runtime` drives the async storage calls of [`DatasetSource::open_dataset`].
    pub fn new(storage: Arc<ObjectStorage>, runtime: Handle) -> Self {
        let zarr = Arc::new(AsyncObjectStore::new(storage.store()));
        Self {
            storage,
            zarr,
            runtime,
        }
    }

    #[instrument(skip(self))]
    pub async fn open_async(&self, identifier: &str) -> Result<Dataset, OpenError> {
        let root = identifier.trim_end_matches('/');
        let format_err = |msg: String| OpenError::format(format!("{}: {}", root, msg));

        let bytes = match self.storage.get(&format!("{}/{}", root, CONSOLIDATED_KEY)).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                return Err(format_err("no consolidated zarr metadata".to_string()));
            }
            Err(e) => return Err(OpenError::storage(e.to_string())),
        };

        let layout = StoreMetadata::parse(&bytes)
            .and_then(|metadata| metadata.normalize())
            .map_err(format_err)?;

        let times = match &layout.time {
            Some(entry) => self.read_time(root, entry).await?,
            None => Vec::new(),
        };

        info!(
            dataset = %root,
            variables = layout.variables.len(),
            nodes = layout.node_count,
            faces = layout.face_count,
            timesteps = times.len(),
            "Opened dataset"
        );

        let dataset = layout
            .variables
            .into_iter()
            .fold(Dataset::new(root, layout.node_count, layout.face_count), Dataset::with_variable)
            .with_times(times)
            .with_extent(layout.extent);
        Ok(dataset)
    }

    async fn read_time(&self, root: &str, entry: &ArrayEntry) -> Result<Vec<Timestamp>, OpenError> {
        let format_err = |msg: String| OpenError::format(format!("{}: time coordinate: {}", root, msg));

        let units = entry
            .attrs
            .get("units")
            .and_then(Value::as_str)
            .ok_or(CfTimeError::MissingUnits)
            .and_then(TimeUnits::parse)
            .map_err(|e| format_err(e.to_string()))?;
        check_calendar(entry.attrs.get("calendar").and_then(Value::as_str))
            .map_err(|e| format_err(e.to_string()))?;

        let path = format!("/{}/{}", root.trim_start_matches('/'), TIME_DIM);
        let array = Array::async_open(self.zarr.clone(), &path)
            .await
            .map_err(|e| match e {
                ArrayCreateError::StorageError(e) => OpenError::storage(e.to_string()),
                e => format_err(e.to_string()),
            })?;

        let times = match array.data_type() {
            DataType::Int64 => read_elements(&array, |v: i64| units.decode_i64(v)).await,
            DataType::Int32 => read_elements(&array, |v: i32| units.decode_i64(v.into())).await,
            DataType::UInt32 => read_elements(&array, |v: u32| units.decode_i64(v.into())).await,
            DataType::UInt64 => {
                read_elements(&array, |v: u64| {
                    i64::try_from(v)
                        .map_err(|_| CfTimeError::OutOfRange(v.to_string()))
                        .and_then(|v| units.decode_i64(v))
                })
                .await
            }
            DataType::Float32 => read_elements(&array, |v: f32| units.decode(v.into())).await,
            DataType::Float64 => read_elements(&array, |v: f64| units.decode(v)).await,
            other => return Err(format_err(format!("unsupported data type {}", other))),
        };

        let times = times.map_err(|e| match e {
            TimeError::Read(ArrayError::StorageError(e)) => OpenError::storage(e.to_string()),
            TimeError::Read(e) => format_err(e.to_string()),
            TimeError::Decode(e) => format_err(e.to_string()),
        })?;
        debug!(count = times.len(), dtype = %array.data_type(), "Decoded time coordinate");
        Ok(times)
    }
}

enum TimeError {
    Read(ArrayError),
    Decode(CfTimeError),
}

/// Read the whole time array and decode it element by element. Integer
/// types reach `decode` without a float detour.
async fn read_elements<T: ElementOwned + Send + Sync>(
    array: &Array<ZarrStore>,
    decode: impl Fn(T) -> Result<Timestamp, CfTimeError>,
) -> Result<Vec<Timestamp>, TimeError> {
    array
        .async_retrieve_array_subset_elements::<T>(&array.subset_all())
        .await
        .map_err(TimeError::Read)?
        .into_iter()
        .map(|v| decode(v).map_err(TimeError::Decode))
        .collect()
}

impl DatasetSource for ZarrDatasetSource {
    /// Blocks on the configured runtime; call it from outside the runtime's
    /// worker threads.
    fn open_dataset(&self, identifier: &str) -> Result<Dataset, OpenError> {
        self.runtime.block_on(self.open_async(identifier))
    }
}
