use crate::types::{CompositeError, CompositeRaster, CompositeResult, Roi};

/// Everything an export sink needs to persist a composite
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub composite: &'a CompositeRaster,
    pub roi: &'a Roi,
    /// Ground sample distance in metres
    pub scale_m: f64,
    pub crs: String,
    pub max_pixels: u64,
    pub file_name_prefix: String,
    pub description: String,
}

impl ExportRequest<'_> {
    pub fn pixel_count(&self) -> u64 {
        let (rows, cols) = self.composite.dim();
        rows as u64 * cols as u64
    }

    /// Reject rasters above the pixel bound
    pub fn check_pixel_budget(&self) -> CompositeResult<()> {
        let pixels = self.pixel_count();
        if pixels > self.max_pixels {
            return Err(CompositeError::Export {
                message: format!(
                    "{} has {} pixels, above the limit of {}",
                    self.file_name_prefix, pixels, self.max_pixels
                ),
                retryable: false,
            });
        }
        Ok(())
    }
}

/// Where and how a composite was written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReceipt {
    pub location: String,
    pub width: usize,
    pub height: usize,
    pub crs: String,
}

/// Sink for finished composites
pub trait Exporter {
    fn export(&self, request: &ExportRequest<'_>) -> CompositeResult<ExportReceipt>;
}

#[cfg(feature = "gdal")]
pub use geotiff::GeoTiffExporter;

#[cfg(feature = "gdal")]
mod geotiff {
    use super::{ExportReceipt, ExportRequest, Exporter};
    use crate::types::CompositeResult;
    use gdal::raster::{Buffer, RasterCreationOption};
    use gdal::spatial_ref::SpatialRef;
    use gdal::{DriverManager, Metadata};
    use std::path::{Path, PathBuf};

    /// Writes composites as single-band Float32 GeoTIFFs, NaN = no data
    pub struct GeoTiffExporter {
        output_dir: PathBuf,
        compression: Option<String>,
    }

    impl GeoTiffExporter {
        pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
            Self {
                output_dir: output_dir.as_ref().to_path_buf(),
                compression: Some("DEFLATE".to_string()),
            }
        }

        pub fn with_compression(mut self, compression: Option<&str>) -> Self {
            self.compression = compression.map(str::to_string);
            self
        }

        pub fn output_path(&self, request: &ExportRequest<'_>) -> PathBuf {
            self.output_dir.join(format!("{}.tif", request.file_name_prefix))
        }
    }

    impl Exporter for GeoTiffExporter {
        fn export(&self, request: &ExportRequest<'_>) -> CompositeResult<ExportReceipt> {
            request.check_pixel_budget()?;

            let path = self.output_path(request);
            let (height, width) = request.composite.dim();
            log::info!(
                "Saving composite as GeoTIFF: {} ({}x{}, {}, {}m)",
                path.display(),
                width,
                height,
                request.crs,
                request.scale_m
            );

            std::fs::create_dir_all(&self.output_dir)?;
            let driver = DriverManager::get_driver_by_name("GTiff")?;
            let options: Vec<RasterCreationOption> = self
                .compression
                .iter()
                .map(|c| RasterCreationOption { key: "COMPRESS", value: c.as_str() })
                .collect();
            let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
                &path,
                width as isize,
                height as isize,
                1,
                &options,
            )?;

            if let Some(transform) = request.composite.geo_transform {
                dataset.set_geo_transform(&transform.to_array())?;
            }
            let srs = SpatialRef::from_definition(&request.crs)?;
            dataset.set_spatial_ref(&srs)?;
            dataset.set_metadata_item("DESCRIPTION", &request.description, "")?;
            dataset.set_metadata_item("SCALE_M", &request.scale_m.to_string(), "")?;

            let mut rasterband = dataset.rasterband(1)?;
            let flat: Vec<f32> = request.composite.to_nan_filled().iter().cloned().collect();
            let buffer = Buffer::new((width, height), flat);
            rasterband.write((0, 0), (width, height), &buffer)?;
            rasterband.set_no_data_value(Some(f64::NAN))?;

            log::info!("GeoTIFF saved: {}", path.display());
            Ok(ExportReceipt {
                location: path.display().to_string(),
                width,
                height,
                crs: request.crs.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn composite(rows: usize, cols: usize) -> CompositeRaster {
        CompositeRaster {
            values: Array2::from_elem((rows, cols), Some(0.4)),
            contributors: Array2::from_elem((rows, cols), 1),
            geo_transform: None,
        }
    }

    #[test]
    fn test_pixel_budget() {
        let raster = composite(4, 5);
        let roi = Roi::from_bounds(0.0, 0.0, 1.0, 1.0);
        let mut request = ExportRequest {
            composite: &raster,
            roi: &roi,
            scale_m: 10.0,
            crs: "EPSG:32631".to_string(),
            max_pixels: 20,
            file_name_prefix: "NDVI_median_2024-01-01_2024-12-31".to_string(),
            description: "NDVI_median_2024".to_string(),
        };

        assert_eq!(request.pixel_count(), 20);
        assert!(request.check_pixel_budget().is_ok());

        request.max_pixels = 19;
        let err = request.check_pixel_budget().unwrap_err();
        assert!(!err.is_retryable());
    }
}
