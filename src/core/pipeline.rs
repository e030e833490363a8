use crate::config::CompositeConfig;
use crate::core::clip::clip_to_roi;
use crate::core::composite::TemporalCompositor;
use crate::core::index::IndexComputer;
use crate::core::masking::{MaskingParams, ValidityMasker};
use crate::core::pairing::{pair_scenes, ScenePair};
use crate::core::projection::{CrsSelection, ProjectionSelector};
use crate::io::catalog::{CatalogQuery, SceneCatalog};
use crate::io::export::{ExportReceipt, ExportRequest, Exporter};
use crate::types::{CloudProbabilityRaster, CompositeRaster, CompositeResult, IndexRaster, Scene};
use chrono::NaiveDate;

/// Per-scene bookkeeping from the masking and index stages
#[derive(Debug, Clone, PartialEq)]
pub struct SceneReport {
    pub scene_id: String,
    pub acquired: NaiveDate,
    /// A cloud-probability raster was found for the scene
    pub matched: bool,
    pub valid_pixels: usize,
    /// Pixels with a defined index value after masking
    pub present_pixels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeStatus {
    Ready,
    /// No scene contributed a single pixel; the composite is all absent
    NoValidScenes,
}

/// Result of a compositing run
#[derive(Debug, Clone)]
pub struct CompositeOutcome {
    pub composite: CompositeRaster,
    pub crs: CrsSelection,
    pub scene_reports: Vec<SceneReport>,
    /// Scenes with at least one present index pixel
    pub valid_scene_count: usize,
    pub status: CompositeStatus,
}

impl CompositeOutcome {
    pub fn has_valid_scenes(&self) -> bool {
        self.status == CompositeStatus::Ready
    }
}

/// Composite plus what happened at export
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub outcome: CompositeOutcome,
    /// `None` when export was skipped
    pub export: Option<ExportReceipt>,
}

/// Catalog → pairing → masking → NDVI → median, driven by one configuration
pub struct CompositePipeline {
    config: CompositeConfig,
    masker: ValidityMasker,
    index: IndexComputer,
    compositor: TemporalCompositor,
    projection: ProjectionSelector,
}

impl CompositePipeline {
    pub fn new(config: CompositeConfig) -> CompositeResult<Self> {
        config.validate()?;

        let masker = ValidityMasker::new(MaskingParams {
            allowed_classes: config.allowed_classes.clone(),
            probability_threshold: config.probability_threshold,
        });
        let index = IndexComputer::ndvi(&config.nir_band, &config.red_band);
        let projection = ProjectionSelector::new(config.crs_override.clone(), config.use_dynamic_utm);

        Ok(Self {
            config,
            masker,
            index,
            compositor: TemporalCompositor::new(),
            projection,
        })
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    pub fn select_projection(&self) -> CrsSelection {
        self.projection.select_for_roi(&self.config.roi)
    }

    pub fn query(&self, crs: &CrsSelection) -> CompositeResult<CatalogQuery> {
        CatalogQuery::new(
            self.config.roi.clone(),
            self.config.date_range()?,
            self.config.max_cloud_fraction,
            crs.crs.clone(),
            self.config.scale_m,
        )
    }

    /// Fetch from `catalog` and composite
    pub fn run<C: SceneCatalog + ?Sized>(&self, catalog: &C) -> CompositeResult<CompositeOutcome> {
        let crs = self.select_projection();
        let query = self.query(&crs)?;

        let scenes = catalog.fetch_scenes(&query)?;
        let probabilities = catalog.fetch_cloud_probabilities(&query)?;

        self.composite_with_crs(&scenes, &probabilities, crs)
    }

    /// Run, then hand the composite to `exporter` unless nothing was valid
    pub fn run_and_export<C, E>(&self, catalog: &C, exporter: &E) -> CompositeResult<PipelineRun>
    where
        C: SceneCatalog + ?Sized,
        E: Exporter + ?Sized,
    {
        let outcome = self.run(catalog)?;
        let export = self.export(&outcome, exporter)?;
        Ok(PipelineRun { outcome, export })
    }

    pub fn export<E: Exporter + ?Sized>(
        &self,
        outcome: &CompositeOutcome,
        exporter: &E,
    ) -> CompositeResult<Option<ExportReceipt>> {
        if !outcome.has_valid_scenes() {
            log::warn!("Skipping export of {}: no valid scenes", self.config.output_prefix());
            return Ok(None);
        }

        let request = self.export_request(outcome);
        request.check_pixel_budget()?;
        exporter.export(&request).map(Some)
    }

    pub fn export_request<'a>(&'a self, outcome: &'a CompositeOutcome) -> ExportRequest<'a> {
        ExportRequest {
            composite: &outcome.composite,
            roi: &self.config.roi,
            scale_m: self.config.scale_m,
            crs: outcome.crs.crs.clone(),
            max_pixels: self.config.max_pixels,
            file_name_prefix: self.config.output_prefix(),
            description: self.config.output_description(),
        }
    }

    /// Composite already-fetched scenes and probability rasters
    pub fn composite_scenes(
        &self,
        scenes: &[Scene],
        probabilities: &[CloudProbabilityRaster],
    ) -> CompositeResult<CompositeOutcome> {
        self.composite_with_crs(scenes, probabilities, self.select_projection())
    }

    fn composite_with_crs(
        &self,
        scenes: &[Scene],
        probabilities: &[CloudProbabilityRaster],
        crs: CrsSelection,
    ) -> CompositeResult<CompositeOutcome> {
        let pairs = pair_scenes(scenes, probabilities);

        let processed = self.process_pairs(&pairs)?;
        let (stack, scene_reports): (Vec<IndexRaster>, Vec<SceneReport>) = processed.into_iter().unzip();

        // Grid of the first contributing scene, else of the first scene
        let grid_scene = scene_reports
            .iter()
            .position(|r| r.present_pixels > 0)
            .and_then(|i| scenes.get(i))
            .or_else(|| scenes.first());
        let dim = grid_scene.map(Scene::dim).unwrap_or((0, 0));
        let geo_transform = grid_scene.and_then(|s| s.geo_transform);
        let mut composite = self.compositor.composite(&stack, dim, geo_transform)?;
        clip_to_roi(&mut composite, &self.config.roi, &crs);

        let valid_scene_count = scene_reports.iter().filter(|r| r.present_pixels > 0).count();
        log::info!("Valid scenes: {}/{}", valid_scene_count, scene_reports.len());

        let status = if valid_scene_count == 0 {
            log::warn!(
                "No valid scenes for {} to {}: composite is empty",
                self.config.start,
                self.config.end
            );
            CompositeStatus::NoValidScenes
        } else {
            CompositeStatus::Ready
        };

        Ok(CompositeOutcome {
            composite,
            crs,
            scene_reports,
            valid_scene_count,
            status,
        })
    }

    fn process_pair(&self, pair: &ScenePair<'_>) -> CompositeResult<(IndexRaster, SceneReport)> {
        let mask = self.masker.mask(pair)?;
        let raster = self.index.compute(pair.scene, &mask)?;

        let report = SceneReport {
            scene_id: pair.scene.id.clone(),
            acquired: pair.scene.acquired,
            matched: pair.is_matched(),
            valid_pixels: mask.iter().filter(|&&v| v).count(),
            present_pixels: raster.present_count(),
        };
        Ok((raster, report))
    }

    #[cfg(feature = "parallel")]
    fn process_pairs(&self, pairs: &[ScenePair<'_>]) -> CompositeResult<Vec<(IndexRaster, SceneReport)>> {
        use rayon::prelude::*;

        log::debug!("Masking {} scenes on {} threads", pairs.len(), rayon::current_num_threads());
        pairs.par_iter().map(|pair| self.process_pair(pair)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn process_pairs(&self, pairs: &[ScenePair<'_>]) -> CompositeResult<Vec<(IndexRaster, SceneReport)>> {
        pairs.iter().map(|pair| self.process_pair(pair)).collect()
    }
}
