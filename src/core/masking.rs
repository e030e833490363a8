use crate::config::DEFAULT_ALLOWED_CLASSES;
use crate::core::pairing::ScenePair;
use crate::types::{ensure_same_dim, CompositeResult, ValidityMask};
use ndarray::{Array2, Zip};
use std::collections::BTreeSet;

/// Pixel validity parameters
#[derive(Debug, Clone)]
pub struct MaskingParams {
    /// Classification codes treated as clear observations
    pub allowed_classes: BTreeSet<u8>,
    /// Cloud probability (percent) at or above which a pixel is rejected
    pub probability_threshold: f32,
}

impl Default for MaskingParams {
    fn default() -> Self {
        Self {
            allowed_classes: DEFAULT_ALLOWED_CLASSES.into_iter().collect(),
            probability_threshold: 40.0,
        }
    }
}

/// Builds per-scene validity masks from scene classification and cloud probability
#[derive(Debug, Clone)]
pub struct ValidityMasker {
    params: MaskingParams,
    /// Lookup table over all u8 codes
    allowed: [bool; 256],
}

impl ValidityMasker {
    pub fn new(params: MaskingParams) -> Self {
        let mut allowed = [false; 256];
        for &code in &params.allowed_classes {
            allowed[code as usize] = true;
        }
        Self { params, allowed }
    }

    pub fn standard() -> Self {
        Self::new(MaskingParams::default())
    }

    pub fn params(&self) -> &MaskingParams {
        &self.params
    }

    pub fn is_allowed(&self, code: u8) -> bool {
        self.allowed[code as usize]
    }

    /// `class ∈ allowed && probability < threshold` per pixel.
    ///
    /// A scene without a probability companion yields an all-false mask.
    pub fn mask(&self, pair: &ScenePair<'_>) -> CompositeResult<ValidityMask> {
        let scene = pair.scene;
        let dim = scene.dim();

        let Some(companion) = pair.probability else {
            log::debug!("Scene {}: no cloud probability, masking all pixels", scene.id);
            return Ok(Array2::from_elem(dim, false));
        };
        ensure_same_dim(
            &format!("cloud probability of scene {}", scene.id),
            dim,
            companion.probability.dim(),
        )?;

        let threshold = self.params.probability_threshold;
        let mut mask = Array2::from_elem(dim, false);
        Zip::from(&mut mask)
            .and(&scene.classification)
            .and(&companion.probability)
            .for_each(|valid, &class, &prob| {
                // NaN compares false, so missing probabilities stay invalid
                *valid = self.is_allowed(class) && prob < threshold;
            });

        let valid = mask.iter().filter(|&&v| v).count();
        log::debug!(
            "Scene {}: {}/{} pixels valid ({:.1}%)",
            scene.id,
            valid,
            mask.len(),
            if mask.is_empty() { 0.0 } else { valid as f64 * 100.0 / mask.len() as f64 }
        );

        Ok(mask)
    }
}

impl Default for ValidityMasker {
    fn default() -> Self {
        Self::standard()
    }
}
