use crate::types::Roi;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal geographic CRS (WGS 84 lat/lon)
pub const GEOGRAPHIC_CRS: &str = "EPSG:4326";

/// EPSG base code of WGS 84 / UTM north zones (32601-32660)
const UTM_NORTH_BASE: u32 = 32600;
/// EPSG base code of WGS 84 / UTM south zones (32701-32760)
const UTM_SOUTH_BASE: u32 = 32700;

// WGS 84 ellipsoid and UTM grid constants
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * FLATTENING - FLATTENING * FLATTENING;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const UTM_SCALE: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Latitude 0.0 (and -0.0) counts as north
    pub fn from_latitude(lat: f64) -> Self {
        if lat < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }
}

/// How the export CRS was decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrsSource {
    /// Caller-supplied identifier, used verbatim
    Override,
    /// Derived from the ROI centroid
    Utm { zone: u8, hemisphere: Hemisphere },
    /// Dynamic UTM disabled by configuration
    Geographic,
    /// Centroid could not be resolved
    Fallback,
}

/// Resolved export CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsSelection {
    pub crs: String,
    pub source: CrsSource,
}

impl CrsSelection {
    pub fn is_geographic(&self) -> bool {
        self.crs.trim().eq_ignore_ascii_case(GEOGRAPHIC_CRS)
    }

    /// UTM zone and hemisphere, also for overrides naming a UTM code
    pub fn utm(&self) -> Option<(u8, Hemisphere)> {
        match self.source {
            CrsSource::Utm { zone, hemisphere } => Some((zone, hemisphere)),
            _ => parse_utm_epsg(&self.crs),
        }
    }
}

impl fmt::Display for CrsSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            CrsSource::Override => write!(f, "{} (override)", self.crs),
            CrsSource::Utm { zone, hemisphere } => {
                let h = match hemisphere {
                    Hemisphere::North => 'N',
                    Hemisphere::South => 'S',
                };
                write!(f, "{} (UTM zone {}{})", self.crs, zone, h)
            }
            CrsSource::Geographic => write!(f, "{} (geographic)", self.crs),
            CrsSource::Fallback => write!(f, "{} (fallback)", self.crs),
        }
    }
}

/// UTM zone (1-60) containing `lon`, or `None` for non-finite or
/// out-of-range input. +180 maps to zone 60.
pub fn utm_zone(lon: f64) -> Option<u8> {
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    let zone = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    Some(zone.clamp(1, 60) as u8)
}

/// EPSG code of the WGS 84 / UTM zone at (lon, lat)
pub fn utm_epsg(lon: f64, lat: f64) -> Option<u32> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    let zone = utm_zone(lon)? as u32;
    let base = match Hemisphere::from_latitude(lat) {
        Hemisphere::North => UTM_NORTH_BASE,
        Hemisphere::South => UTM_SOUTH_BASE,
    };
    Some(base + zone)
}

/// Zone and hemisphere of a `EPSG:326ZZ` / `EPSG:327ZZ` identifier
pub fn parse_utm_epsg(crs: &str) -> Option<(u8, Hemisphere)> {
    let (authority, code) = crs.trim().split_once(':')?;
    if !authority.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    let code: u32 = code.parse().ok()?;
    match code {
        32601..=32660 => Some(((code - UTM_NORTH_BASE) as u8, Hemisphere::North)),
        32701..=32760 => Some(((code - UTM_SOUTH_BASE) as u8, Hemisphere::South)),
        _ => None,
    }
}

/// Forward transverse Mercator (Snyder 1987, eqs. 8-9 and 8-10): WGS 84
/// (lon, lat) in degrees to UTM (easting, northing) in metres.
pub fn lonlat_to_utm(lon: f64, lat: f64, zone: u8, hemisphere: Hemisphere) -> (f64, f64) {
    let phi = lat.to_radians();
    let lambda0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = SEMI_MAJOR_AXIS / (1.0 - E2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = E_PRIME2 * cos_phi * cos_phi;
    let a = cos_phi * (lon.to_radians() - lambda0);
    let a2 = a * a;
    let a4 = a2 * a2;

    let easting = UTM_SCALE
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    let northing = UTM_SCALE
        * (meridional_arc(phi)
            + n * tan_phi
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a4 * a2 / 720.0));

    match hemisphere {
        Hemisphere::North => (easting, northing),
        Hemisphere::South => (easting, northing + FALSE_NORTHING_SOUTH),
    }
}

/// Distance along the meridian from the equator to `phi` (radians)
fn meridional_arc(phi: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    SEMI_MAJOR_AXIS
        * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// `AUTHORITY:CODE` form, e.g. `EPSG:32633` or `ESRI:102003`
pub fn is_well_formed_crs(crs: &str) -> bool {
    match regex::Regex::new(r"^[A-Za-z][A-Za-z0-9_]*:[A-Za-z0-9_.\-]+$") {
        Ok(re) => re.is_match(crs),
        Err(_) => false,
    }
}

/// Export projection policy
#[derive(Debug, Clone)]
pub struct ProjectionSelector {
    crs_override: Option<String>,
    use_dynamic_utm: bool,
}

impl ProjectionSelector {
    pub fn new(crs_override: Option<String>, use_dynamic_utm: bool) -> Self {
        Self {
            crs_override,
            use_dynamic_utm,
        }
    }

    /// Dynamic UTM, no override
    pub fn dynamic() -> Self {
        Self::new(None, true)
    }

    /// Resolve the CRS from a centroid that may have failed to compute.
    ///
    /// A well-formed override wins; then the UTM zone of the centroid; then
    /// the geographic CRS. Never fails.
    pub fn select(&self, centroid: Option<(f64, f64)>) -> CrsSelection {
        if let Some(raw) = self.crs_override.as_deref() {
            let trimmed = raw.trim();
            if is_well_formed_crs(trimmed) {
                log::info!("Export CRS: {} (override)", trimmed);
                return CrsSelection {
                    crs: trimmed.to_string(),
                    source: CrsSource::Override,
                };
            }
            if !trimmed.is_empty() {
                log::warn!("Ignoring malformed CRS override '{}'", raw);
            }
        }

        if !self.use_dynamic_utm {
            log::info!("Export CRS: {} (dynamic UTM disabled)", GEOGRAPHIC_CRS);
            return CrsSelection {
                crs: GEOGRAPHIC_CRS.to_string(),
                source: CrsSource::Geographic,
            };
        }

        let suggestion = centroid.and_then(|(lon, lat)| {
            let epsg = utm_epsg(lon, lat)?;
            let zone = utm_zone(lon)?;
            Some(CrsSelection {
                crs: format!("EPSG:{}", epsg),
                source: CrsSource::Utm {
                    zone,
                    hemisphere: Hemisphere::from_latitude(lat),
                },
            })
        });

        match suggestion {
            Some(selection) => {
                log::info!("Export CRS: {}", selection);
                selection
            }
            None => {
                log::warn!(
                    "Could not derive a UTM zone from centroid {:?}, falling back to {}",
                    centroid,
                    GEOGRAPHIC_CRS
                );
                CrsSelection {
                    crs: GEOGRAPHIC_CRS.to_string(),
                    source: CrsSource::Fallback,
                }
            }
        }
    }

    pub fn select_for_roi(&self, roi: &Roi) -> CrsSelection {
        self.select(roi.centroid())
    }
}

impl Default for ProjectionSelector {
    fn default() -> Self {
        Self::dynamic()
    }
}
