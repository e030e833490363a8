use chrono::NaiveDate;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Surface reflectance value
pub type Reflectance = f32;

/// 2D reflectance grid (rows x cols)
pub type BandImage = Array2<Reflectance>;

/// 2D scene classification grid (one integer code per pixel)
pub type ClassImage = Array2<u8>;

/// Per-pixel validity, `true` = usable observation
pub type ValidityMask = Array2<bool>;

/// Per-pixel optional value, `None` = absent (masked or undefined)
pub type SparseImage = Array2<Option<f32>>;

/// Sparse copy of a dense grid; NaN and infinities become absent
pub fn from_nan_filled(values: ArrayView2<'_, f32>) -> SparseImage {
    values.mapv(|v| v.is_finite().then_some(v))
}

/// Dense copy with NaN standing in for absent pixels
pub fn to_nan_filled(values: &SparseImage) -> Array2<f32> {
    values.mapv(|v| v.unwrap_or(f32::NAN))
}

/// Geospatial bounding box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Boxes sharing an edge count as intersecting
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_centre(&self, row: usize, col: usize) -> (f64, f64) {
        let (px, py) = (col as f64 + 0.5, row as f64 + 0.5);
        (
            self.top_left_x + px * self.pixel_width + py * self.rotation_x,
            self.top_left_y + px * self.rotation_y + py * self.pixel_height,
        )
    }

    pub fn from_array(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

/// Region of interest: a single polygon ring of (lon, lat) vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub exterior: Vec<(f64, f64)>,
}

impl Roi {
    pub fn new(exterior: Vec<(f64, f64)>) -> Self {
        Self { exterior }
    }

    /// Axis-aligned rectangle ROI
    pub fn from_bounds(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self::new(vec![
            (min_lon, min_lat),
            (max_lon, min_lat),
            (max_lon, max_lat),
            (min_lon, max_lat),
        ])
    }

    /// Distinct vertices, ignoring an explicit closing vertex
    pub fn ring(&self) -> &[(f64, f64)] {
        match (self.exterior.first(), self.exterior.last()) {
            (Some(first), Some(last)) if self.exterior.len() > 1 && first == last => {
                &self.exterior[..self.exterior.len() - 1]
            }
            _ => &self.exterior,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.ring().len()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let ring = self.ring();
        if ring.is_empty() {
            return None;
        }

        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for &(lon, lat) in ring {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }

    /// Area-weighted centroid (lon, lat) of the ring.
    ///
    /// Zero-area rings (collinear or repeated points) fall back to the vertex
    /// mean. Returns `None` for an empty ring, non-finite vertices, or a
    /// result outside the valid lon/lat range.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let ring = self.ring();
        if ring.is_empty() {
            return None;
        }
        if ring.iter().any(|(lon, lat)| !lon.is_finite() || !lat.is_finite()) {
            return None;
        }

        // Accumulate relative to the bbox centre so symmetric rings are exact
        let bbox = self.bounding_box()?;
        let ox = (bbox.min_lon + bbox.max_lon) / 2.0;
        let oy = (bbox.min_lat + bbox.max_lat) / 2.0;

        let mut twice_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..ring.len() {
            let (x0, y0) = (ring[i].0 - ox, ring[i].1 - oy);
            let next = ring[(i + 1) % ring.len()];
            let (x1, y1) = (next.0 - ox, next.1 - oy);
            let cross = x0 * y1 - x1 * y0;
            twice_area += cross;
            cx += (x0 + x1) * cross;
            cy += (y0 + y1) * cross;
        }

        let (lon, lat) = if twice_area.abs() > 1e-12 {
            (ox + cx / (3.0 * twice_area), oy + cy / (3.0 * twice_area))
        } else {
            let n = ring.len() as f64;
            (
                ring.iter().map(|(lon, _)| lon).sum::<f64>() / n,
                ring.iter().map(|(_, lat)| lat).sum::<f64>() / n,
            )
        };

        if (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat) {
            Some((lon, lat))
        } else {
            None
        }
    }
}

/// One optical acquisition (surface reflectance product)
#[derive(Debug, Clone)]
pub struct Scene {
    /// Identity key shared with the cloud-probability product
    pub id: String,
    pub acquired: NaiveDate,
    /// Scene-level cloudy pixel percentage (0-100)
    pub cloud_fraction: f32,
    pub footprint: BoundingBox,
    /// Spectral bands by name (e.g. "B4", "B8")
    pub bands: HashMap<String, BandImage>,
    /// Scene classification layer
    pub classification: ClassImage,
    pub geo_transform: Option<GeoTransform>,
}

impl Scene {
    pub fn dim(&self) -> (usize, usize) {
        self.classification.dim()
    }

    pub fn band(&self, name: &str) -> CompositeResult<&BandImage> {
        self.bands.get(name).ok_or_else(|| CompositeError::MissingBand {
            scene_id: self.id.clone(),
            band: name.to_string(),
        })
    }
}

/// Per-pixel cloud probability (0-100) for one scene
#[derive(Debug, Clone)]
pub struct CloudProbabilityRaster {
    pub id: String,
    pub acquired: NaiveDate,
    pub footprint: BoundingBox,
    pub probability: BandImage,
}

/// Masked vegetation index of a single scene
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRaster {
    pub scene_id: String,
    pub values: SparseImage,
}

impl IndexRaster {
    /// Wrap a dense grid that marks absent pixels with NaN
    pub fn from_nan_filled(scene_id: impl Into<String>, values: ArrayView2<'_, f32>) -> Self {
        Self {
            scene_id: scene_id.into(),
            values: from_nan_filled(values),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Temporal median composite
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRaster {
    pub values: SparseImage,
    /// Number of scenes with a present value at each pixel
    pub contributors: Array2<u32>,
    pub geo_transform: Option<GeoTransform>,
}

impl CompositeRaster {
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.values.get((row, col)).copied().flatten()
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when no pixel has a value
    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    /// Dense copy with NaN standing in for absent pixels
    pub fn to_nan_filled(&self) -> Array2<f32> {
        to_nan_filled(&self.values)
    }
}

/// Error types for NDVI compositing
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scene {scene_id} has no band named {band}")]
    MissingBand { scene_id: String, band: String },

    #[error("Dimension mismatch for {what}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Catalog error: {message}")]
    Catalog { message: String, retryable: bool },

    #[error("Export error: {message}")]
    Export { message: String, retryable: bool },
}

impl CompositeError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CompositeError::Io(_) => true,
            CompositeError::Catalog { retryable, .. } => *retryable,
            CompositeError::Export { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Result type for compositing operations
pub type CompositeResult<T> = Result<T, CompositeError>;

/// Check two grids share a shape
pub(crate) fn ensure_same_dim(
    what: &str,
    expected: (usize, usize),
    found: (usize, usize),
) -> CompositeResult<()> {
    if expected != found {
        return Err(CompositeError::DimensionMismatch {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}
