use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use ndarray::Array2;
use ndvi_composite::core::CrsSource;
use ndvi_composite::io::ExportReceipt;
use ndvi_composite::{
    BoundingBox, CloudProbabilityRaster, CompositeConfig, CompositePipeline, CompositeResult,
    CompositeStatus, ExportRequest, Exporter, GeoTransform, InMemoryCatalog, Roi, Scene,
};
use std::cell::RefCell;
use std::collections::HashMap;

const ROWS: usize = 3;
const COLS: usize = 4;

fn footprint() -> BoundingBox {
    BoundingBox { min_lon: 11.0, max_lon: 13.0, min_lat: 44.0, max_lat: 46.0 }
}

fn config() -> CompositeConfig {
    CompositeConfig::new(Roi::from_bounds(11.8, 44.8, 12.2, 45.2), "2024-01-01", "2024-12-31")
}

/// Scene whose clear pixels all carry the given NDVI
fn scene_with_ndvi(id: &str, month: u32, ndvi: f32, cloud_fraction: f32) -> Scene {
    let red = 0.1f32;
    let nir = red * (1.0 + ndvi) / (1.0 - ndvi);
    let mut bands = HashMap::new();
    bands.insert("B8".to_string(), Array2::from_elem((ROWS, COLS), nir));
    bands.insert("B4".to_string(), Array2::from_elem((ROWS, COLS), red));
    Scene {
        id: id.to_string(),
        acquired: NaiveDate::from_ymd_opt(2024, month, 10).unwrap(),
        cloud_fraction,
        footprint: footprint(),
        bands,
        classification: Array2::from_elem((ROWS, COLS), 4),
        geo_transform: None,
    }
}

fn probability(id: &str, month: u32, value: f32) -> CloudProbabilityRaster {
    CloudProbabilityRaster {
        id: id.to_string(),
        acquired: NaiveDate::from_ymd_opt(2024, month, 10).unwrap(),
        footprint: footprint(),
        probability: Array2::from_elem((ROWS, COLS), value),
    }
}

#[derive(Default)]
struct RecordingExporter {
    requests: RefCell<Vec<(String, String, usize, usize)>>,
}

impl Exporter for RecordingExporter {
    fn export(&self, request: &ExportRequest<'_>) -> CompositeResult<ExportReceipt> {
        let (height, width) = request.composite.dim();
        self.requests.borrow_mut().push((
            request.file_name_prefix.clone(),
            request.crs.clone(),
            width,
            height,
        ));
        Ok(ExportReceipt {
            location: format!("memory://{}", request.file_name_prefix),
            width,
            height,
            crs: request.crs.clone(),
        })
    }
}

#[test]
fn test_end_to_end_median_and_export() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut catalog = InMemoryCatalog::default();
    for (id, month, ndvi) in [("s1", 3, 0.2), ("s2", 6, 0.5), ("s3", 9, 0.8)] {
        catalog.add_scene(scene_with_ndvi(id, month, ndvi, 2.0));
        catalog.add_probability(probability(id, month, 5.0));
    }
    // Rejected by the scene-level cloud filter
    catalog.add_scene(scene_with_ndvi("cloudy", 7, -0.5, 80.0));
    catalog.add_probability(probability("cloudy", 7, 5.0));

    let pipeline = CompositePipeline::new(config()).unwrap();
    let exporter = RecordingExporter::default();
    let run = pipeline.run_and_export(&catalog, &exporter).unwrap();

    assert_eq!(run.outcome.status, CompositeStatus::Ready);
    assert_eq!(run.outcome.scene_reports.len(), 3);
    assert_eq!(run.outcome.valid_scene_count, 3);
    for row in 0..ROWS {
        for col in 0..COLS {
            assert_abs_diff_eq!(run.outcome.composite.get(row, col).unwrap(), 0.5, epsilon = 1e-5);
        }
    }

    assert_eq!(run.outcome.crs.crs, "EPSG:32633");
    let receipt = run.export.unwrap();
    assert_eq!(receipt.crs, "EPSG:32633");
    assert_eq!(
        exporter.requests.borrow().as_slice(),
        &[("NDVI_median_2024-01-01_2024-12-31".to_string(), "EPSG:32633".to_string(), COLS, ROWS)]
    );
}

#[test]
fn test_even_count_averages_middle_values() {
    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("a", 4, 0.2, 1.0), scene_with_ndvi("b", 5, 0.8, 1.0)],
        vec![probability("a", 4, 0.0), probability("b", 5, 0.0)],
    );

    let outcome = CompositePipeline::new(config()).unwrap().run(&catalog).unwrap();

    assert_abs_diff_eq!(outcome.composite.get(1, 1).unwrap(), 0.5, epsilon = 1e-5);
    assert_eq!(outcome.composite.contributors[[1, 1]], 2);
}

#[test]
fn test_cloud_probability_threshold_masks_scene() {
    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("clear", 4, 0.3, 1.0), scene_with_ndvi("hazy", 5, 0.9, 1.0)],
        vec![probability("clear", 4, 39.0), probability("hazy", 5, 40.0)],
    );

    let outcome = CompositePipeline::new(config()).unwrap().run(&catalog).unwrap();

    assert_abs_diff_eq!(outcome.composite.get(0, 0).unwrap(), 0.3, epsilon = 1e-5);
    assert_eq!(outcome.valid_scene_count, 1);
    assert_eq!(outcome.scene_reports[1].valid_pixels, 0);
    assert!(outcome.scene_reports[1].matched);
}

#[test]
fn test_zero_valid_scenes_skips_export() {
    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("unpaired", 4, 0.3, 1.0)],
        vec![probability("someone-else", 4, 0.0)],
    );
    let exporter = RecordingExporter::default();

    let run = CompositePipeline::new(config()).unwrap().run_and_export(&catalog, &exporter).unwrap();

    assert_eq!(run.outcome.status, CompositeStatus::NoValidScenes);
    assert!(run.outcome.composite.is_empty());
    assert_eq!(run.outcome.composite.dim(), (ROWS, COLS));
    assert!(run.export.is_none());
    assert!(exporter.requests.borrow().is_empty());
}

#[test]
fn test_pixel_budget_blocks_export() {
    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("a", 4, 0.3, 1.0)],
        vec![probability("a", 4, 0.0)],
    );
    let mut cfg = config();
    cfg.max_pixels = 5;
    let exporter = RecordingExporter::default();

    let err = CompositePipeline::new(cfg).unwrap().run_and_export(&catalog, &exporter).unwrap_err();

    assert!(!err.is_retryable());
    assert!(exporter.requests.borrow().is_empty());
}

#[test]
fn test_runs_are_bit_identical() {
    let build = || {
        InMemoryCatalog::new(
            vec![
                scene_with_ndvi("a", 2, 0.13, 1.0),
                scene_with_ndvi("b", 3, 0.61, 1.0),
                scene_with_ndvi("c", 4, 0.47, 1.0),
                scene_with_ndvi("d", 5, -0.05, 1.0),
            ],
            vec![
                probability("c", 4, 1.0),
                probability("a", 2, 1.0),
                probability("d", 5, 1.0),
                probability("b", 3, 1.0),
            ],
        )
    };
    let pipeline = CompositePipeline::new(config()).unwrap();

    let first = pipeline.run(&build()).unwrap();
    let second = pipeline.run(&build()).unwrap();

    let bits = |o: &ndvi_composite::CompositeOutcome| -> Vec<Option<u32>> {
        o.composite.values.iter().map(|v| v.map(f32::to_bits)).collect()
    };
    assert_eq!(bits(&first), bits(&second));
    assert_eq!(first.composite, second.composite);
}

#[test]
fn test_dynamic_utm_disabled_exports_geographic() {
    let mut cfg = config();
    cfg.use_dynamic_utm = false;
    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("a", 4, 0.3, 1.0)],
        vec![probability("a", 4, 0.0)],
    );

    let outcome = CompositePipeline::new(cfg).unwrap().run(&catalog).unwrap();

    assert_eq!(outcome.crs.crs, "EPSG:4326");
    assert_eq!(outcome.crs.source, CrsSource::Geographic);
}

#[test]
fn test_acquisition_on_end_date_is_excluded() {
    let mut last_day = scene_with_ndvi("new-year-eve", 12, 0.9, 1.0);
    last_day.acquired = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let mut last_probability = probability("new-year-eve", 12, 0.0);
    last_probability.acquired = last_day.acquired;

    let catalog = InMemoryCatalog::new(
        vec![scene_with_ndvi("a", 4, 0.3, 1.0), last_day],
        vec![probability("a", 4, 0.0), last_probability],
    );

    let outcome = CompositePipeline::new(config()).unwrap().run(&catalog).unwrap();

    assert_eq!(outcome.scene_reports.len(), 1);
    assert_eq!(outcome.scene_reports[0].scene_id, "a");
    assert_abs_diff_eq!(outcome.composite.get(0, 0).unwrap(), 0.3, epsilon = 1e-5);
}

#[test]
fn test_export_covers_only_the_roi() {
    let mut cfg = CompositeConfig::new(Roi::from_bounds(11.0, 45.0, 12.0, 46.0), "2024-01-01", "2024-12-31");
    cfg.use_dynamic_utm = false;

    // One-degree cells over lon 10-14, lat 45-48
    let mut scene = scene_with_ndvi("a", 4, 0.5, 1.0);
    scene.geo_transform = Some(GeoTransform::from_array([10.0, 1.0, 0.0, 48.0, 0.0, -1.0]));
    let catalog = InMemoryCatalog::new(vec![scene], vec![probability("a", 4, 0.0)]);

    let outcome = CompositePipeline::new(cfg).unwrap().run(&catalog).unwrap();

    assert_eq!(outcome.composite.present_count(), 1);
    assert_eq!(outcome.composite.get(0, 0), None);
    assert_abs_diff_eq!(outcome.composite.get(2, 1).unwrap(), 0.5, epsilon = 1e-5);
}
