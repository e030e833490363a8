#![cfg(feature = "gdal")]

use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use ndvi_composite::io::{GeoTiffExporter, LocalCatalog};
use ndvi_composite::{CompositeConfig, CompositePipeline, CompositeStatus, Roi};
use std::path::Path;

const WIDTH: usize = 3;
const HEIGHT: usize = 2;
// 10 m grid in UTM zone 33N next to the projected ROI centroid (12E, 45N)
const TRANSFORM: [f64; 6] = [263_500.0, 10.0, 0.0, 4_987_400.0, 0.0, -10.0];

fn write_tiff<T: gdal::raster::GdalType + Copy>(path: &Path, data: Vec<T>) {
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver");
    let mut dataset = driver
        .create_with_band_type::<T, _>(path, WIDTH as isize, HEIGHT as isize, 1)
        .expect("create GeoTIFF");
    dataset.set_geo_transform(&TRANSFORM).expect("geotransform");
    let mut band = dataset.rasterband(1).expect("band");
    band.write((0, 0), (WIDTH, HEIGHT), &Buffer::new((WIDTH, HEIGHT), data))
        .expect("write band");
}

fn scene_xml(id: &str, date: &str, cloud: f32) -> String {
    format!(
        "<scene><id>{id}</id><date>{date}</date><cloudFraction>{cloud}</cloudFraction>\
         <footprint><minLon>11.0</minLon><maxLon>13.0</maxLon><minLat>44.0</minLat><maxLat>46.0</maxLat></footprint>\
         <band><name>B4</name><path>{id}_B04.tif</path></band>\
         <band><name>B8</name><path>{id}_B08.tif</path></band>\
         <classification>{id}_SCL.tif</classification></scene>"
    )
}

fn probability_xml(id: &str, date: &str) -> String {
    format!(
        "<probability><id>{id}</id><date>{date}</date>\
         <footprint><minLon>11.0</minLon><maxLon>13.0</maxLon><minLat>44.0</minLat><maxLat>46.0</maxLat></footprint>\
         <path>{id}_PROB.tif</path></probability>"
    )
}

#[test]
fn test_local_catalog_to_geotiff() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    // NDVI 1/3 and 1/2, last pixel clouded in both
    for (id, nir) in [("a", 0.4f32), ("b", 0.6f32)] {
        write_tiff(&root.join(format!("{id}_B04.tif")), vec![0.2f32; WIDTH * HEIGHT]);
        write_tiff(&root.join(format!("{id}_B08.tif")), vec![nir; WIDTH * HEIGHT]);
        write_tiff(&root.join(format!("{id}_SCL.tif")), vec![4u8, 4, 5, 6, 7, 9]);
        write_tiff(&root.join(format!("{id}_PROB.tif")), vec![0.0f32; WIDTH * HEIGHT]);
    }

    let manifest = format!(
        "<catalog><scenes>{}{}</scenes><probabilities>{}{}</probabilities></catalog>",
        scene_xml("a", "2024-05-01", 1.0),
        scene_xml("b", "2024-08-01", 4.0),
        probability_xml("a", "2024-05-01"),
        probability_xml("b", "2024-08-01"),
    );
    std::fs::write(root.join("catalog.xml"), manifest).expect("manifest");

    let catalog = LocalCatalog::open(root).expect("open catalog");
    let config = CompositeConfig::new(Roi::from_bounds(11.8, 44.8, 12.2, 45.2), "2024-01-01", "2024-12-31");
    let pipeline = CompositePipeline::new(config).expect("pipeline");
    let out_dir = root.join("out");
    let exporter = GeoTiffExporter::new(&out_dir).with_compression(None);

    let run = pipeline.run_and_export(&catalog, &exporter).expect("run");

    assert_eq!(run.outcome.status, CompositeStatus::Ready);
    assert_eq!(run.outcome.composite.dim(), (HEIGHT, WIDTH));
    assert_eq!(run.outcome.composite.get(1, 2), None);

    let receipt = run.export.expect("exported");
    assert_eq!((receipt.width, receipt.height), (WIDTH, HEIGHT));
    let written = Dataset::open(Path::new(&receipt.location)).expect("reopen");
    assert_eq!(written.geo_transform().expect("geotransform"), TRANSFORM);
    let values = written
        .rasterband(1)
        .expect("band")
        .read_as::<f32>((0, 0), (WIDTH, HEIGHT), (WIDTH, HEIGHT), None)
        .expect("read")
        .data;

    // (0.4-0.2)/(0.4+0.2) and (0.6-0.2)/(0.6+0.2) average to (1/3 + 1/2) / 2
    let expected = (1.0f32 / 3.0 + 0.5) / 2.0;
    for v in &values[..5] {
        assert!((v - expected).abs() < 1e-5, "got {}", v);
    }
    assert!(values[5].is_nan());
}
