//! Masking and compositing stages

pub mod pairing;
pub mod masking;
pub mod index;
pub mod composite;
pub mod projection;
pub mod clip;
pub mod palette;
pub mod pipeline;

// Re-export main types
pub use pairing::{pair_scenes, ScenePair};
pub use masking::{MaskingParams, ValidityMasker};
pub use index::{normalized_difference, normalized_difference_pixel, IndexComputer, IndexParams};
pub use composite::{median_in_place, TemporalCompositor};
pub use projection::{
    lonlat_to_utm, parse_utm_epsg, utm_epsg, utm_zone, CrsSelection, CrsSource, Hemisphere,
    ProjectionSelector, GEOGRAPHIC_CRS,
};
pub use clip::{clip_to_roi, RoiClipper};
pub use pipeline::{CompositeOutcome, CompositePipeline, CompositeStatus, PipelineRun, SceneReport};
