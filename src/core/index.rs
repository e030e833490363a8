use crate::types::{
    ensure_same_dim, BandImage, CompositeResult, IndexRaster, Scene, SparseImage, ValidityMask,
};
use ndarray::{Array2, Zip};

/// Band selection for a normalized difference index
#[derive(Debug, Clone)]
pub struct IndexParams {
    /// Positive term (near-infrared for NDVI)
    pub band_a: String,
    /// Negative term (red for NDVI)
    pub band_b: String,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            band_a: "B8".to_string(),
            band_b: "B4".to_string(),
        }
    }
}

/// `(a - b) / (a + b)`, or `None` where the result is undefined.
pub fn normalized_difference_pixel(a: f32, b: f32) -> Option<f32> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    let sum = a + b;
    if sum == 0.0 {
        return None;
    }
    let value = (a - b) / sum;
    value.is_finite().then_some(value)
}

/// Normalized difference over whole grids, without masking
pub fn normalized_difference(band_a: &BandImage, band_b: &BandImage) -> CompositeResult<SparseImage> {
    ensure_same_dim("normalized difference bands", band_a.dim(), band_b.dim())?;
    Ok(Zip::from(band_a)
        .and(band_b)
        .map_collect(|&a, &b| normalized_difference_pixel(a, b)))
}

/// Computes the masked vegetation index of a scene
#[derive(Debug, Clone, Default)]
pub struct IndexComputer {
    params: IndexParams,
}

impl IndexComputer {
    pub fn new(params: IndexParams) -> Self {
        Self { params }
    }

    /// NDVI from the given near-infrared and red band names
    pub fn ndvi(nir_band: &str, red_band: &str) -> Self {
        Self::new(IndexParams {
            band_a: nir_band.to_string(),
            band_b: red_band.to_string(),
        })
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    /// Index value where `mask` is set, absent elsewhere
    pub fn compute(&self, scene: &Scene, mask: &ValidityMask) -> CompositeResult<IndexRaster> {
        let band_a = scene.band(&self.params.band_a)?;
        let band_b = scene.band(&self.params.band_b)?;
        let dim = scene.dim();
        ensure_same_dim(&format!("band {} of scene {}", self.params.band_a, scene.id), dim, band_a.dim())?;
        ensure_same_dim(&format!("band {} of scene {}", self.params.band_b, scene.id), dim, band_b.dim())?;
        ensure_same_dim(&format!("validity mask of scene {}", scene.id), dim, mask.dim())?;

        let mut values: SparseImage = Array2::from_elem(dim, None);
        Zip::from(&mut values)
            .and(mask)
            .and(band_a)
            .and(band_b)
            .for_each(|out, &valid, &a, &b| {
                if valid {
                    *out = normalized_difference_pixel(a, b);
                }
            });

        let raster = IndexRaster {
            scene_id: scene.id.clone(),
            values,
        };
        log::debug!(
            "Scene {}: {} present index values",
            scene.id,
            raster.present_count()
        );
        Ok(raster)
    }
}
