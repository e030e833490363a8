use crate::types::{CompositeError, CompositeResult, Roi};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Scene classification codes kept by default: vegetation (4),
/// not-vegetated (5), bare soil / unclassified land (6) and water (7).
pub const DEFAULT_ALLOWED_CLASSES: [u8; 4] = [4, 5, 6, 7];

/// Acquisition date range, start inclusive and end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Parse ISO 8601 calendar dates (`YYYY-MM-DD`)
    pub fn parse(start: &str, end: &str) -> CompositeResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                CompositeError::InvalidConfig(format!("Invalid date '{}': {}", s, e))
            })
        };
        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if range.start >= range.end {
            return Err(CompositeError::InvalidConfig(format!(
                "Start date {} is not before end date {}",
                range.start, range.end
            )));
        }
        Ok(range)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Run configuration for the compositing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConfig {
    pub roi: Roi,
    /// First acquisition date, ISO 8601
    pub start: String,
    /// End of the acquisition window (exclusive), ISO 8601
    pub end: String,
    /// Scenes with a cloudy-pixel percentage at or above this are skipped
    pub max_cloud_fraction: f32,
    /// Pixels with cloud probability at or above this are masked
    pub probability_threshold: f32,
    /// Explicit export CRS, e.g. "EPSG:3035"
    pub crs_override: Option<String>,
    /// Derive a UTM zone from the ROI centroid; otherwise export geographic
    pub use_dynamic_utm: bool,
    /// Index band (positive term), near-infrared by default
    pub nir_band: String,
    /// Index band (negative term), red by default
    pub red_band: String,
    pub allowed_classes: BTreeSet<u8>,
    /// Ground sample distance of the export in metres
    pub scale_m: f64,
    /// Upper bound on exported pixel count
    pub max_pixels: u64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            roi: Roi::new(Vec::new()),
            start: "2024-01-01".to_string(),
            end: "2024-12-31".to_string(),
            max_cloud_fraction: 10.0,
            probability_threshold: 40.0,
            crs_override: None,
            use_dynamic_utm: true,
            nir_band: "B8".to_string(),
            red_band: "B4".to_string(),
            allowed_classes: DEFAULT_ALLOWED_CLASSES.into_iter().collect(),
            scale_m: 10.0,
            max_pixels: 10_000_000_000_000,
        }
    }
}

impl CompositeConfig {
    /// Default parameters over the given ROI and dates
    pub fn new(roi: Roi, start: &str, end: &str) -> Self {
        Self {
            roi,
            start: start.to_string(),
            end: end.to_string(),
            ..Self::default()
        }
    }

    pub fn date_range(&self) -> CompositeResult<DateRange> {
        DateRange::parse(&self.start, &self.end)
    }

    pub fn validate(&self) -> CompositeResult<()> {
        self.date_range()?;

        if self.roi.vertex_count() < 3 {
            return Err(CompositeError::InvalidConfig(format!(
                "ROI needs at least 3 vertices, got {}",
                self.roi.vertex_count()
            )));
        }
        for (name, value) in [
            ("max_cloud_fraction", self.max_cloud_fraction),
            ("probability_threshold", self.probability_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CompositeError::InvalidConfig(format!(
                    "{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }
        if self.nir_band.trim().is_empty() || self.red_band.trim().is_empty() {
            return Err(CompositeError::InvalidConfig(
                "Index band names must not be empty".to_string(),
            ));
        }
        if self.nir_band == self.red_band {
            return Err(CompositeError::InvalidConfig(format!(
                "Index bands must differ, both are {}",
                self.nir_band
            )));
        }
        if self.allowed_classes.is_empty() {
            return Err(CompositeError::InvalidConfig(
                "At least one classification code must be allowed".to_string(),
            ));
        }
        if !(self.scale_m.is_finite() && self.scale_m > 0.0) {
            return Err(CompositeError::InvalidConfig(format!(
                "Export scale must be positive, got {}",
                self.scale_m
            )));
        }
        if self.max_pixels == 0 {
            return Err(CompositeError::InvalidConfig(
                "max_pixels must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// File name prefix: `NDVI_median_<start>_<end>`
    pub fn output_prefix(&self) -> String {
        format!("NDVI_median_{}_{}", self.start.trim(), self.end.trim())
    }

    /// Task description: `NDVI_median_<start year>`
    pub fn output_description(&self) -> String {
        match self.date_range() {
            Ok(range) => format!("NDVI_median_{}", range.start.year()),
            Err(_) => format!(
                "NDVI_median_{}",
                self.start.trim().chars().take(4).collect::<String>()
            ),
        }
    }
}
