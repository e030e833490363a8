use crate::io::catalog::{CatalogQuery, SceneCatalog};
use crate::io::manifest::{CatalogManifest, ProbabilityEntry, SceneEntry};
use crate::types::{
    BoundingBox, CloudProbabilityRaster, CompositeError, CompositeResult, GeoTransform, Scene,
};
use gdal::Dataset;
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Scene catalog backed by GeoTIFFs on disk and an XML manifest.
///
/// Rasters are served on the grid they were stored on; producing them on
/// the query's CRS and scale is left to whoever populated the directory.
pub struct LocalCatalog {
    root: PathBuf,
    manifest: CatalogManifest,
}

impl LocalCatalog {
    /// Open `<root>/catalog.xml`
    pub fn open<P: AsRef<Path>>(root: P) -> CompositeResult<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest = CatalogManifest::from_file(root.join("catalog.xml"))?;
        Ok(Self::with_manifest(root, manifest))
    }

    pub fn with_manifest<P: AsRef<Path>>(root: P, manifest: CatalogManifest) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            manifest,
        }
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn open_dataset(&self, relative: &str) -> CompositeResult<Dataset> {
        let path = self.resolve(relative);
        Dataset::open(&path).map_err(|e| CompositeError::Catalog {
            message: format!("Failed to open {}: {}", path.display(), e),
            retryable: false,
        })
    }

    fn read_band<T: gdal::raster::GdalType + Copy>(
        &self,
        relative: &str,
    ) -> CompositeResult<(Array2<T>, Option<GeoTransform>)> {
        let dataset = self.open_dataset(relative)?;
        let (width, height) = dataset.raster_size();
        let geo_transform = dataset.geo_transform().ok().map(GeoTransform::from_array);

        let rasterband = dataset.rasterband(1)?;
        let buffer = rasterband.read_as::<T>((0, 0), (width, height), (width, height), None)?;
        let array = Array2::from_shape_vec((height, width), buffer.data)?;

        log::debug!("Read {}: {}x{}", relative, height, width);
        Ok((array, geo_transform))
    }

    fn load_scene(&self, entry: &SceneEntry) -> CompositeResult<Scene> {
        let (classification, geo_transform) = self.read_band::<u8>(&entry.classification)?;

        let mut bands = HashMap::with_capacity(entry.bands.len());
        for band in &entry.bands {
            let (data, _) = self.read_band::<f32>(&band.path)?;
            bands.insert(band.name.clone(), data);
        }

        Ok(Scene {
            id: entry.id.clone(),
            acquired: entry.date,
            cloud_fraction: entry.cloud_fraction,
            footprint: BoundingBox::from(&entry.footprint),
            bands,
            classification,
            geo_transform,
        })
    }

    fn load_probability(&self, entry: &ProbabilityEntry) -> CompositeResult<CloudProbabilityRaster> {
        let (probability, _) = self.read_band::<f32>(&entry.path)?;
        Ok(CloudProbabilityRaster {
            id: entry.id.clone(),
            acquired: entry.date,
            footprint: BoundingBox::from(&entry.footprint),
            probability,
        })
    }
}

impl SceneCatalog for LocalCatalog {
    fn fetch_scenes(&self, query: &CatalogQuery) -> CompositeResult<Vec<Scene>> {
        let entries = self.manifest.select_scenes(query);
        log::info!(
            "Loading {} scenes from {} (target grid {} @ {}m)",
            entries.len(),
            self.root.display(),
            query.crs,
            query.scale_m
        );

        // Each worker opens its own datasets; order follows the manifest
        entries
            .par_iter()
            .map(|entry| self.load_scene(entry))
            .collect()
    }

    fn fetch_cloud_probabilities(&self, query: &CatalogQuery) -> CompositeResult<Vec<CloudProbabilityRaster>> {
        let entries = self.manifest.select_probabilities(query);
        log::info!("Loading {} cloud probability rasters", entries.len());

        entries
            .par_iter()
            .map(|entry| self.load_probability(entry))
            .collect()
    }
}
