use crate::types::{CloudProbabilityRaster, Scene};
use std::collections::HashMap;

/// A reflectance scene and its cloud-probability companion, if one was found
#[derive(Debug, Clone, Copy)]
pub struct ScenePair<'a> {
    pub scene: &'a Scene,
    pub probability: Option<&'a CloudProbabilityRaster>,
}

impl ScenePair<'_> {
    pub fn is_matched(&self) -> bool {
        self.probability.is_some()
    }
}

/// Left join of scenes onto cloud-probability rasters by scene id.
///
/// Every scene is kept, in input order. When the probability list repeats an
/// id, the first occurrence wins.
pub fn pair_scenes<'a>(
    scenes: &'a [Scene],
    probabilities: &'a [CloudProbabilityRaster],
) -> Vec<ScenePair<'a>> {
    let mut by_id: HashMap<&str, &CloudProbabilityRaster> =
        HashMap::with_capacity(probabilities.len());
    for raster in probabilities {
        by_id.entry(raster.id.as_str()).or_insert(raster);
    }

    let pairs: Vec<ScenePair<'a>> = scenes
        .iter()
        .map(|scene| ScenePair {
            scene,
            probability: by_id.get(scene.id.as_str()).copied(),
        })
        .collect();

    let matched = pairs.iter().filter(|p| p.is_matched()).count();
    log::info!(
        "Paired {} scenes with {} probability rasters: {} matched, {} unmatched",
        scenes.len(),
        probabilities.len(),
        matched,
        pairs.len() - matched
    );
    for pair in pairs.iter().filter(|p| !p.is_matched()) {
        log::warn!("No cloud probability for scene {}, it will be fully masked", pair.scene.id);
    }

    pairs
}
