use crate::config::DateRange;
use crate::types::{BoundingBox, CloudProbabilityRaster, CompositeError, CompositeResult, Roi, Scene};
use chrono::NaiveDate;

/// Spatial, temporal and quality filter sent to a scene catalog,
/// together with the grid the rasters should be delivered on.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub roi: Roi,
    pub bounds: BoundingBox,
    pub date_range: DateRange,
    /// Scenes must have a cloudy-pixel percentage strictly below this
    pub max_cloud_fraction: f32,
    /// Target CRS of the delivered rasters; geotransforms are expressed in it
    pub crs: String,
    /// Target ground sample distance in metres
    pub scale_m: f64,
}

impl CatalogQuery {
    pub fn new(
        roi: Roi,
        date_range: DateRange,
        max_cloud_fraction: f32,
        crs: String,
        scale_m: f64,
    ) -> CompositeResult<Self> {
        let bounds = roi.bounding_box().ok_or_else(|| {
            CompositeError::InvalidConfig("ROI has no vertices".to_string())
        })?;
        Ok(Self {
            roi,
            bounds,
            date_range,
            max_cloud_fraction,
            crs,
            scale_m,
        })
    }

    /// ROI and date filter shared by both collections
    pub fn covers(&self, acquired: NaiveDate, footprint: &BoundingBox) -> bool {
        self.date_range.contains(acquired) && self.bounds.intersects(footprint)
    }

    /// Full filter for reflectance scenes
    pub fn accepts_scene(&self, acquired: NaiveDate, footprint: &BoundingBox, cloud_fraction: f32) -> bool {
        self.covers(acquired, footprint) && cloud_fraction < self.max_cloud_fraction
    }
}

/// Source of reflectance scenes and cloud-probability rasters.
///
/// Both lists come back in a deterministic order; pairing relies on it to
/// resolve duplicate ids.
pub trait SceneCatalog {
    fn fetch_scenes(&self, query: &CatalogQuery) -> CompositeResult<Vec<Scene>>;

    /// Filtered by ROI and date only
    fn fetch_cloud_probabilities(&self, query: &CatalogQuery) -> CompositeResult<Vec<CloudProbabilityRaster>>;
}

/// Catalog over rasters already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    scenes: Vec<Scene>,
    probabilities: Vec<CloudProbabilityRaster>,
}

impl InMemoryCatalog {
    pub fn new(scenes: Vec<Scene>, probabilities: Vec<CloudProbabilityRaster>) -> Self {
        Self {
            scenes,
            probabilities,
        }
    }

    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    pub fn add_probability(&mut self, raster: CloudProbabilityRaster) {
        self.probabilities.push(raster);
    }
}

impl SceneCatalog for InMemoryCatalog {
    fn fetch_scenes(&self, query: &CatalogQuery) -> CompositeResult<Vec<Scene>> {
        let scenes: Vec<Scene> = self
            .scenes
            .iter()
            .filter(|s| query.accepts_scene(s.acquired, &s.footprint, s.cloud_fraction))
            .cloned()
            .collect();
        log::info!(
            "Catalog returned {}/{} scenes for {} to {} (cloud < {}%)",
            scenes.len(),
            self.scenes.len(),
            query.date_range.start,
            query.date_range.end,
            query.max_cloud_fraction
        );
        Ok(scenes)
    }

    fn fetch_cloud_probabilities(&self, query: &CatalogQuery) -> CompositeResult<Vec<CloudProbabilityRaster>> {
        let rasters: Vec<CloudProbabilityRaster> = self
            .probabilities
            .iter()
            .filter(|p| query.covers(p.acquired, &p.footprint))
            .cloned()
            .collect();
        log::info!(
            "Catalog returned {}/{} cloud probability rasters",
            rasters.len(),
            self.probabilities.len()
        );
        Ok(rasters)
    }
}
