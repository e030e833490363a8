//! Clipping composites to the region of interest

use crate::core::projection::{lonlat_to_utm, CrsSelection};
use crate::types::{CompositeRaster, Roi};
use geo::{Contains, Coord, LineString, Point, Polygon};
use ndarray::Zip;

/// ROI polygon expressed in the CRS of the composite grid
#[derive(Debug, Clone)]
pub struct RoiClipper {
    polygon: Polygon<f64>,
}

impl RoiClipper {
    /// Project `roi` into `crs`.
    ///
    /// Only the geographic CRS and WGS 84 / UTM zones are supported; `None`
    /// otherwise, or when the ring has fewer than three vertices.
    pub fn new(roi: &Roi, crs: &CrsSelection) -> Option<Self> {
        let ring = roi.ring();
        if ring.len() < 3 {
            return None;
        }

        let coords: Vec<Coord<f64>> = if crs.is_geographic() {
            ring.iter().map(|&(x, y)| Coord { x, y }).collect()
        } else {
            let (zone, hemisphere) = crs.utm()?;
            ring.iter()
                .map(|&(lon, lat)| {
                    let (x, y) = lonlat_to_utm(lon, lat, zone, hemisphere);
                    Coord { x, y }
                })
                .collect()
        };

        Some(Self {
            polygon: Polygon::new(LineString::from(coords), vec![]),
        })
    }

    /// Strict interior test; points on the boundary are outside
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.contains(&Point::new(x, y))
    }

    /// Mark pixels whose centre falls outside the ROI as absent.
    ///
    /// Returns the number of present pixels cleared. A composite without a
    /// geotransform is left untouched.
    pub fn clip(&self, composite: &mut CompositeRaster) -> usize {
        let Some(gt) = composite.geo_transform else {
            return 0;
        };

        let mut cleared = 0;
        Zip::indexed(&mut composite.values)
            .and(&mut composite.contributors)
            .for_each(|(row, col), value, count| {
                let (x, y) = gt.pixel_centre(row, col);
                if !self.contains(x, y) {
                    if value.take().is_some() {
                        cleared += 1;
                    }
                    *count = 0;
                }
            });
        cleared
    }
}

/// Clip `composite` to `roi`, assuming its grid is in `crs`.
///
/// Grids without a geotransform, or in a CRS the ROI cannot be projected
/// to, are returned unchanged.
pub fn clip_to_roi(composite: &mut CompositeRaster, roi: &Roi, crs: &CrsSelection) -> usize {
    if composite.geo_transform.is_none() {
        log::debug!("Composite has no geotransform, skipping ROI clip");
        return 0;
    }

    match RoiClipper::new(roi, crs) {
        Some(clipper) => {
            let cleared = clipper.clip(composite);
            log::info!("ROI clip cleared {} pixels outside the region", cleared);
            cleared
        }
        None => {
            log::warn!("Cannot project the ROI into {}, composite left unclipped", crs);
            0
        }
    }
}
