//! Render pipeline behaviour: zoom carry-over, caching, teardown ordering,
//! colorbar carry-over and failure handling.

use std::sync::Arc;

use dashboard::layout::RENDER_FAILED;
use dashboard::{
    ColorLimits, ControllerConfig, DashboardController, DashboardError, Panel,
};
use seareport_common::{LayerKind, Range, RenderError, ZoomRange};
use test_utils::{
    assert_range_approx_eq, fixture_extent, static_dataset, surge_dataset, FailAt, FakeSource,
    RecordingRenderer, RenderCall, GLOBAL_ID,
};

const STATIC_ID: &str = "global-v1/20231231.zarr";

struct Harness {
    controller: DashboardController<RecordingRenderer>,
    renderer: RecordingRenderer,
    source: FakeSource,
}

fn harness() -> Harness {
    let source = FakeSource::new()
        .with_dataset(surge_dataset(GLOBAL_ID, 3))
        .with_dataset(static_dataset(STATIC_ID, &["elev_max", "depth"]));
    let renderer = RecordingRenderer::new();
    let mut controller = DashboardController::new(
        ControllerConfig::default(),
        Arc::new(source.clone()),
        renderer.handle(),
    );
    controller.apply_dataset_list(vec![GLOBAL_ID.to_string(), STATIC_ID.to_string()]);
    controller.select_dataset(GLOBAL_ID).unwrap();

    Harness {
        controller,
        renderer,
        source,
    }
}

fn kinds(main: &[Panel]) -> Vec<&'static str> {
    main.iter().map(Panel::kind_name).collect()
}

fn raster_range(h: &Harness) -> Option<ZoomRange> {
    h.controller.artifacts().raster().and_then(|r| r.display_range())
}

#[test]
fn test_keep_zoom_renders_identical_ranges() {
    let mut h = harness();
    assert!(h.controller.selection().keep_zoom());

    h.controller.render().unwrap();
    let first = raster_range(&h).unwrap();

    let outcome = h.controller.render().unwrap();
    let second = raster_range(&h).unwrap();

    assert_eq!(outcome.zoom, Some(first));
    assert_range_approx_eq!(first.lon, second.lon, 1e-12);
    assert_range_approx_eq!(first.lat, second.lat, 1e-12);
}

#[test]
fn test_keep_zoom_carries_client_viewport() {
    let mut h = harness();
    h.controller.render().unwrap();

    let panned = ZoomRange::new(Range::new(100.0, 120.0), Range::new(-10.0, 5.0));
    let raster = h.controller.artifacts().raster().unwrap().id();
    h.controller.update_viewport(raster, panned).unwrap();

    h.renderer.clear_calls();
    let outcome = h.controller.render().unwrap();
    assert_eq!(outcome.zoom, Some(panned));
    assert_eq!(
        h.renderer.calls().iter().find(|c| matches!(c, RenderCall::Raster { .. })),
        Some(&RenderCall::Raster {
            lon_range: Some(panned.lon),
            lat_range: Some(panned.lat),
        })
    );
}

#[test]
fn test_without_keep_zoom_ranges_are_unset() {
    let mut h = harness();
    h.controller.render().unwrap();
    let raster = h.controller.artifacts().raster().unwrap().id();
    h.controller
        .update_viewport(raster, ZoomRange::new(Range::new(0.0, 1.0), Range::new(0.0, 1.0)))
        .unwrap();

    h.controller.set_keep_zoom(false).unwrap();
    h.controller.set_show_mesh(true).unwrap();
    h.renderer.clear_calls();

    let outcome = h.controller.render().unwrap();
    assert_eq!(outcome.zoom, None);
    for call in h.renderer.calls() {
        match call {
            RenderCall::Raster { lon_range, lat_range } | RenderCall::Wireframe { lon_range, lat_range } => {
                assert_eq!((lon_range, lat_range), (None, None));
            }
            _ => {}
        }
    }
    // auto-fit falls back to the data extent
    assert_eq!(raster_range(&h), Some(fixture_extent()));
}

#[test]
fn test_mesh_is_built_once_and_reused() {
    let mut h = harness();
    h.controller.render().unwrap();
    assert!(h.controller.artifacts().mesh().is_none());

    h.controller.set_show_mesh(true).unwrap();
    let outcome = h.controller.render().unwrap();
    assert!(outcome.mesh_built);
    let mesh = h.controller.artifacts().mesh().cloned().unwrap();

    h.controller.select_variable("depth").unwrap();
    let outcome = h.controller.render().unwrap();
    assert!(!outcome.mesh_built);
    assert!(Arc::ptr_eq(&mesh, h.controller.artifacts().mesh().unwrap()));
    assert_eq!(h.renderer.count(|c| matches!(c, RenderCall::Wireframe { .. })), 1);

    let overlay = h.controller.artifacts().overlay().unwrap();
    assert_eq!(
        overlay.kinds(),
        vec![LayerKind::Tiles, LayerKind::Raster, LayerKind::Wireframe]
    );
    assert!(Arc::ptr_eq(&overlay.layers()[2], &mesh));
}

#[test]
fn test_trimesh_and_raster_are_rebuilt_every_render() {
    let mut h = harness();
    let first = h.controller.render().unwrap();
    let second = h.controller.render().unwrap();

    assert_ne!(first.raster, second.raster);
    assert_eq!(h.renderer.count(|c| matches!(c, RenderCall::Trimesh { .. })), 2);
    assert_eq!(h.renderer.count(|c| matches!(c, RenderCall::Raster { .. })), 2);
    // one open for the selection, one per render
    assert_eq!(h.source.open_count(GLOBAL_ID), 3);
}

#[test]
fn test_mesh_hidden_when_show_mesh_is_unset() {
    let mut h = harness();
    h.controller.set_show_mesh(true).unwrap();
    h.controller.render().unwrap();

    h.controller.set_show_mesh(false).unwrap();
    h.controller.render().unwrap();
    let overlay = h.controller.artifacts().overlay().unwrap();
    assert_eq!(overlay.kinds(), vec![LayerKind::Tiles, LayerKind::Raster]);
    // still cached for later
    assert!(h.controller.artifacts().mesh().is_some());
}

#[test]
fn test_main_list_without_time_series() {
    let mut h = harness();
    h.controller.render().unwrap();
    assert_eq!(kinds(&h.controller.main()), vec!["overlay", "colorbar"]);
}

#[test]
fn test_main_list_with_time_series() {
    let mut h = harness();
    h.controller.select_variable("elev").unwrap();
    let t1 = surge_dataset(GLOBAL_ID, 3).times()[1];
    h.controller.select_time(Some(t1)).unwrap();
    h.controller.select_ts_variable("elev").unwrap();

    let outcome = h.controller.render().unwrap();
    assert_eq!(outcome.panels, 3);

    let main = h.controller.main();
    assert_eq!(kinds(&main), vec!["overlay", "colorbar", "time_series"]);
    match &main[2] {
        Panel::TimeSeries(block) => {
            assert_eq!(block.spacer_height(), 50);
            assert_eq!(block.plot().kind(), LayerKind::TimeSeries);
        }
        other => panic!("unexpected panel {:?}", other),
    }

    let calls = h.renderer.calls();
    assert!(calls.contains(&RenderCall::Trimesh {
        variable: "elev".to_string(),
        time: Some(t1),
    }));
    // the time-series spans every timestamp and is tapped on the new raster
    assert!(calls.contains(&RenderCall::TimeSeries {
        variable: "elev".to_string(),
        source: outcome.raster,
        sliced: false,
        fontscale: 1.4,
    }));
}

#[test]
fn test_time_dependent_variable_renders_first_step_by_default() {
    let mut h = harness();
    h.controller.select_variable("elev").unwrap();
    h.controller.render().unwrap();

    let t0 = surge_dataset(GLOBAL_ID, 3).times()[0];
    assert!(h.renderer.calls().contains(&RenderCall::Trimesh {
        variable: "elev".to_string(),
        time: Some(t0),
    }));
}

#[test]
fn test_raster_carries_fontscale() {
    let mut h = harness();
    h.controller.render().unwrap();
    let raster = h.controller.artifacts().raster().unwrap();
    assert_eq!(raster.layer().fontscale(), Some(1.4));
}

#[test]
fn test_previous_raster_is_released_before_trimesh() {
    let mut h = harness();
    h.controller.select_ts_variable("elev").unwrap();
    h.controller.render().unwrap();

    let raster = Arc::downgrade(h.controller.artifacts().raster().unwrap().layer());
    let overlay = Arc::downgrade(h.controller.artifacts().overlay().unwrap());
    h.renderer.watch(raster.clone());
    h.renderer.watch(overlay.clone());
    assert!(raster.upgrade().is_some());

    h.controller.render().unwrap();
    assert_eq!(h.renderer.watched_alive_at_trimesh().last(), Some(&false));
    assert!(raster.upgrade().is_none());
    assert!(overlay.upgrade().is_none());
}

#[test]
fn test_failed_render_releases_previous_raster() {
    let mut h = harness();
    h.controller.render().unwrap();
    let raster = Arc::downgrade(h.controller.artifacts().raster().unwrap().layer());

    h.renderer.fail_at(Some(FailAt::Trimesh));
    assert!(h.controller.render().is_err());
    assert!(raster.upgrade().is_none());
}

#[test]
fn test_colorbar_defaults_by_variable_name() {
    let mut h = harness();
    h.controller.render().unwrap();
    let row = h.controller.artifacts().colorbar().unwrap();
    assert_eq!(row.limits(), ColorLimits::new(Some(0.2), Some(0.8)));
    assert_eq!(row.raster(), h.controller.artifacts().raster().unwrap().id());

    h.controller.select_variable("depth").unwrap();
    h.controller.render().unwrap();
    assert_eq!(h.controller.artifacts().colorbar().unwrap().limits(), ColorLimits::unset());
}

#[test]
fn test_user_colorbar_limits_survive_rerender() {
    let mut h = harness();
    h.controller.render().unwrap();

    let custom = ColorLimits::new(Some(-0.5), Some(3.0));
    h.controller.update_color_limits(custom).unwrap();
    match &h.controller.main()[1] {
        Panel::Colorbar(row) => assert_eq!(row.limits(), custom),
        other => panic!("unexpected panel {:?}", other),
    }

    let outcome = h.controller.render().unwrap();
    let row = h.controller.artifacts().colorbar().unwrap();
    assert_eq!(row.limits(), custom);
    assert_eq!(row.raster(), outcome.raster);

    // a variable change discards them
    h.controller.select_variable("elev").unwrap();
    assert!(h.controller.artifacts().colorbar().is_none());
    h.controller.render().unwrap();
    assert_eq!(
        h.controller.artifacts().colorbar().unwrap().limits(),
        ColorLimits::new(Some(0.2), Some(0.8))
    );
}

#[test]
fn test_color_limits_require_a_render() {
    let mut h = harness();
    let err = h.controller.update_color_limits(ColorLimits::unset()).unwrap_err();
    assert!(matches!(err, DashboardError::NoColorbar));
}

#[test]
fn test_failed_render_keeps_selection_interactive() {
    let mut h = harness();
    h.controller.render().unwrap();
    let before = h.controller.selection().clone();

    h.renderer.fail_at(Some(FailAt::Raster));
    let err = h.controller.render().unwrap_err();
    assert!(matches!(err, DashboardError::Render(RenderError::Failed(_))));

    let main = h.controller.main();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].as_alert(), Some(&RENDER_FAILED));
    assert_eq!(h.controller.selection(), &before);
    drop(main);

    // widgets still respond and the next render succeeds
    h.renderer.fail_at(None);
    h.controller.select_variable("depth").unwrap();
    h.controller.render().unwrap();
    assert_eq!(kinds(&h.controller.main()), vec!["overlay", "colorbar"]);
}

#[test]
fn test_time_series_failure_is_reported() {
    let mut h = harness();
    h.controller.select_ts_variable("elev").unwrap();
    h.renderer.fail_at(Some(FailAt::TimeSeries));

    assert!(h.controller.render().is_err());
    assert_eq!(h.controller.main()[0].as_alert(), Some(&RENDER_FAILED));
}

#[test]
fn test_storage_failure_during_render() {
    let mut h = harness();
    h.source.clone().with_storage_error(GLOBAL_ID);

    let err = h.controller.render().unwrap_err();
    assert!(matches!(err, DashboardError::Open(_)));
    assert_eq!(h.renderer.count(|c| matches!(c, RenderCall::Trimesh { .. })), 0);
    assert_eq!(h.controller.main()[0].as_alert(), Some(&RENDER_FAILED));
}

#[test]
fn test_switching_dataset_drops_cached_mesh() {
    let mut h = harness();
    h.controller.set_show_mesh(true).unwrap();
    h.controller.render().unwrap();
    assert!(h.controller.artifacts().mesh().is_some());

    h.controller.select_dataset(STATIC_ID).unwrap();
    assert!(h.controller.artifacts().mesh().is_none());
    // the raster is kept so the zoom carries over to the new dataset
    assert!(h.controller.artifacts().raster().is_some());
}
