//! Opening consolidated Zarr stores through the dataset source.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use serde_json::{json, Value};

use seareport_common::{DatasetCatalog, DatasetSource, OpenError};
use storage::{BlobCatalog, ObjectStorage, ZarrDatasetSource};

const STORE: &str = "global-v1/20240101.zarr";

fn array(shape: &[usize], dtype: &str, compressor: Value) -> Value {
    json!({
        "shape": shape,
        "chunks": shape,
        "dtype": dtype,
        "compressor": compressor,
        "fill_value": 0,
        "filters": null,
        "order": "C",
        "zarr_format": 2
    })
}

fn dims(names: &[&str]) -> Value {
    json!({ "_ARRAY_DIMENSIONS": names })
}

/// Metadata of a small surge run: 4 nodes, 2 faces, 3 hourly steps.
fn surge_metadata() -> Value {
    json!({
        "zarr_consolidated_format": 1,
        "metadata": {
            ".zgroup": { "zarr_format": 2 },
            ".zattrs": {
                "geospatial_lon_min": -10.0,
                "geospatial_lon_max": 10.0,
                "geospatial_lat_min": 40.0,
                "geospatial_lat_max": 50.0
            },
            "lon/.zarray": array(&[4], "<f8", Value::Null),
            "lon/.zattrs": dims(&["node"]),
            "lat/.zarray": array(&[4], "<f8", Value::Null),
            "lat/.zattrs": dims(&["node"]),
            "triface_nodes/.zarray": array(&[2, 3], "<i4", Value::Null),
            "triface_nodes/.zattrs": dims(&["face", "three"]),
            "time/.zarray": array(&[3], "<i8", json!({ "id": "gzip", "level": 1 })),
            "time/.zattrs": {
                "_ARRAY_DIMENSIONS": ["time"],
                "units": "hours since 2024-01-01 00:00:00",
                "calendar": "proleptic_gregorian"
            },
            "elev/.zarray": array(&[3, 4], "<f4", Value::Null),
            "elev/.zattrs": dims(&["time", "node"]),
            "elev_max/.zarray": array(&[4], "<f4", Value::Null),
            "elev_max/.zattrs": dims(&["node"]),
            "depth/.zarray": array(&[4], "<f4", Value::Null),
            "depth/.zattrs": dims(&["node"])
        }
    })
}

fn gzip(data: &[u8]) -> Bytes {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    Bytes::from(encoder.finish().unwrap())
}

fn time_chunk(hours: &[i64]) -> Bytes {
    let raw: Vec<u8> = hours.iter().flat_map(|h| h.to_le_bytes()).collect();
    gzip(&raw)
}

/// A blosc frame whose payload is stored uncompressed (the `memcpyed` flag),
/// as c-blosc writes when compression does not pay off.
fn blosc_memcpyed(data: &[u8], typesize: u8) -> Bytes {
    let nbytes = data.len() as u32;
    let mut frame = vec![2, 1, 0x02, typesize];
    frame.extend_from_slice(&nbytes.to_le_bytes());
    frame.extend_from_slice(&nbytes.to_le_bytes());
    frame.extend_from_slice(&(nbytes + 16).to_le_bytes());
    frame.extend_from_slice(data);
    Bytes::from(frame)
}

/// Write the consolidated document, the per-array documents it mirrors and
/// the time chunk.
async fn write_metadata(storage: &ObjectStorage, id: &str, metadata: &Value) {
    storage
        .put(&format!("{id}/.zmetadata"), Bytes::from(metadata.to_string()))
        .await
        .unwrap();
    for (key, doc) in metadata["metadata"].as_object().unwrap() {
        storage
            .put(&format!("{id}/{key}"), Bytes::from(doc.to_string()))
            .await
            .unwrap();
    }
}

async fn write_store(storage: &ObjectStorage, id: &str, metadata: &Value) {
    write_metadata(storage, id, metadata).await;
    storage.put(&format!("{id}/time/0"), time_chunk(&[0, 1, 2])).await.unwrap();
}

fn memory_storage() -> Arc<ObjectStorage> {
    Arc::new(ObjectStorage::from_store(Arc::new(InMemory::new()), "memory://test"))
}

fn source(storage: Arc<ObjectStorage>) -> ZarrDatasetSource {
    ZarrDatasetSource::new(storage, tokio::runtime::Handle::current())
}

#[tokio::test]
async fn test_open_normalized_store() {
    let storage = memory_storage();
    write_store(&storage, STORE, &surge_metadata()).await;

    let dataset = source(storage).open_async(STORE).await.unwrap();

    assert_eq!(dataset.id(), STORE);
    assert_eq!(dataset.node_count(), 4);
    assert_eq!(dataset.face_count(), 2);
    // sorted by name; coordinates are not data variables
    assert_eq!(dataset.data_var_names(), vec!["depth", "elev", "elev_max", "triface_nodes"]);
    assert!(dataset.is_time_dependent("elev"));
    assert!(!dataset.is_time_dependent("elev_max"));

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(dataset.times().len(), 3);
    assert_eq!(dataset.times()[0], start);
    assert_eq!(dataset.times()[2], Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap());

    let extent = dataset.extent().unwrap();
    assert_eq!(extent.lon.min, -10.0);
    assert_eq!(extent.lat.max, 50.0);
}

#[tokio::test]
async fn test_trailing_slash_in_identifier() {
    let storage = memory_storage();
    write_store(&storage, STORE, &surge_metadata()).await;

    let dataset = source(storage).open_async(&format!("{STORE}/")).await.unwrap();
    assert_eq!(dataset.id(), STORE);
}

#[tokio::test]
async fn test_missing_metadata_is_format_error() {
    let storage = memory_storage();
    storage
        .put("global-v1/notes.txt/readme", Bytes::from_static(b"hello"))
        .await
        .unwrap();

    let err = source(storage).open_async("global-v1/notes.txt").await.unwrap_err();
    assert!(err.is_format(), "{err}");
}

#[tokio::test]
async fn test_missing_mesh_is_format_error() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    let entries = metadata["metadata"].as_object_mut().unwrap();
    entries.remove("triface_nodes/.zarray");
    entries.remove("triface_nodes/.zattrs");
    write_store(&storage, STORE, &metadata).await;

    let err = source(storage).open_async(STORE).await.unwrap_err();
    match err {
        OpenError::Format(msg) => assert!(msg.contains("triface_nodes"), "{msg}"),
        other => panic!("expected format error, got {other}"),
    }
}

#[tokio::test]
async fn test_time_without_units_is_format_error() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zattrs"] = dims(&["time"]);
    write_store(&storage, STORE, &metadata).await;

    let err = source(storage).open_async(STORE).await.unwrap_err();
    assert!(err.is_format());
    assert!(err.to_string().contains("missing time units"), "{err}");
}

#[tokio::test]
async fn test_blosc_compressed_time_coordinate() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zarray"]["compressor"] =
        json!({ "id": "blosc", "cname": "lz4", "clevel": 5, "shuffle": 1, "blocksize": 0 });
    write_metadata(&storage, STORE, &metadata).await;
    let raw: Vec<u8> = [0i64, 6, 12].iter().flat_map(|h| h.to_le_bytes()).collect();
    storage
        .put(&format!("{STORE}/time/0"), blosc_memcpyed(&raw, 8))
        .await
        .unwrap();

    let dataset = source(storage).open_async(STORE).await.unwrap();
    assert_eq!(dataset.times().len(), 3);
    assert_eq!(dataset.times()[2], Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
}

#[tokio::test]
async fn test_unknown_compressor_is_format_error() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zarray"]["compressor"] = json!({ "id": "snappy-ish" });
    write_store(&storage, STORE, &metadata).await;

    let err = source(storage).open_async(STORE).await.unwrap_err();
    assert!(err.is_format(), "{err}");
}

#[tokio::test]
async fn test_float_time_coordinate() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zarray"] = array(&[3], "<f8", Value::Null);
    metadata["metadata"]["time/.zattrs"]["units"] = json!("days since 2024-01-01");
    write_metadata(&storage, STORE, &metadata).await;
    let raw: Vec<u8> = [0.0f64, 0.25, 0.5].iter().flat_map(|d| d.to_le_bytes()).collect();
    storage.put(&format!("{STORE}/time/0"), Bytes::from(raw)).await.unwrap();

    let dataset = source(storage).open_async(STORE).await.unwrap();
    assert_eq!(dataset.times()[1], Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap());
    assert_eq!(dataset.times()[2], Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
}

#[tokio::test]
async fn test_nanosecond_time_coordinate_is_exact() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zattrs"]["units"] = json!("nanoseconds since 1970-01-01");
    write_metadata(&storage, STORE, &metadata).await;
    // one nanosecond steps that an f64 cannot tell apart
    let base: i64 = 1_704_067_200_000_000_000;
    storage
        .put(&format!("{STORE}/time/0"), time_chunk(&[base, base + 1, base + 2]))
        .await
        .unwrap();

    let dataset = source(storage).open_async(STORE).await.unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(dataset.times()[0], start);
    assert_eq!(dataset.times()[2], start + Duration::nanoseconds(2));
}

#[tokio::test]
async fn test_time_dependent_variable_without_time_is_format_error() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    let entries = metadata["metadata"].as_object_mut().unwrap();
    entries.remove("time/.zarray");
    entries.remove("time/.zattrs");
    write_store(&storage, STORE, &metadata).await;

    let err = source(storage).open_async(STORE).await.unwrap_err();
    assert!(err.is_format());
}

#[tokio::test]
async fn test_chunked_time_coordinate() {
    let storage = memory_storage();
    let mut metadata = surge_metadata();
    metadata["metadata"]["time/.zarray"]["shape"] = json!([5]);
    metadata["metadata"]["time/.zarray"]["chunks"] = json!([2]);
    write_metadata(&storage, STORE, &metadata).await;
    // the last chunk is padded to full size
    for (i, hours) in [[0i64, 6], [12, 18], [24, -1]].iter().enumerate() {
        storage
            .put(&format!("{STORE}/time/{i}"), time_chunk(hours))
            .await
            .unwrap();
    }

    let dataset = source(storage).open_async(STORE).await.unwrap();
    assert_eq!(dataset.times().len(), 5);
    assert_eq!(dataset.times()[4], Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn test_time_array_document_missing_is_format_error() {
    let storage = memory_storage();
    // only the consolidated document; `time/.zarray` itself is absent
    storage
        .put(&format!("{STORE}/.zmetadata"), Bytes::from(surge_metadata().to_string()))
        .await
        .unwrap();

    let err = source(storage).open_async(STORE).await.unwrap_err();
    assert!(err.is_format(), "{err}");
    assert!(err.to_string().contains("time coordinate"), "{err}");
}

#[test]
fn test_sync_open_blocks_on_runtime() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let storage = memory_storage();
    runtime.block_on(write_store(&storage, STORE, &surge_metadata()));

    let source = ZarrDatasetSource::new(storage, runtime.handle().clone());
    let dataset = source.open_dataset(STORE).unwrap();
    assert_eq!(dataset.times().len(), 3);
}

#[tokio::test]
async fn test_local_store_and_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalFileSystem::new_with_prefix(dir.path()).unwrap();
    let storage = Arc::new(ObjectStorage::from_store(Arc::new(store), "file://test"));

    for day in ["20240101", "20240102", "20240103"] {
        write_store(&storage, &format!("global-v1/{day}.zarr"), &surge_metadata()).await;
    }

    let catalog = BlobCatalog::new(storage.clone(), "global-v1/");
    let ids = catalog.list_dataset_identifiers().await.unwrap();
    assert_eq!(ids, vec!["global-v1/20240102.zarr", "global-v1/20240101.zarr"]);

    let dataset = source(storage).open_async(&ids[0]).await.unwrap();
    assert_eq!(dataset.id(), "global-v1/20240102.zarr");
}
