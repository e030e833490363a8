use crate::io::catalog::CatalogQuery;
use crate::types::{BoundingBox, CompositeError, CompositeResult};
use chrono::NaiveDate;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;

/// Root `<catalog>` element of a local scene manifest.
///
/// ```xml
/// <catalog>
///   <scenes>
///     <scene>
///       <id>20240612T101559_20240612T102248_T32TQR</id>
///       <date>2024-06-12</date>
///       <cloudFraction>3.4</cloudFraction>
///       <footprint><minLon>11.6</minLon><maxLon>13.0</maxLon><minLat>44.1</minLat><maxLat>45.1</maxLat></footprint>
///       <band><name>B4</name><path>T32TQR/B04.tif</path></band>
///       <band><name>B8</name><path>T32TQR/B08.tif</path></band>
///       <classification>T32TQR/SCL.tif</classification>
///     </scene>
///   </scenes>
///   <probabilities>
///     <probability>
///       <id>20240612T101559_20240612T102248_T32TQR</id>
///       <date>2024-06-12</date>
///       <footprint>...</footprint>
///       <path>T32TQR/probability.tif</path>
///     </probability>
///   </probabilities>
/// </catalog>
/// ```
#[derive(Debug, Deserialize)]
pub struct CatalogManifest {
    #[serde(default)]
    pub scenes: SceneList,
    #[serde(default)]
    pub probabilities: ProbabilityList,
}

#[derive(Debug, Default, Deserialize)]
pub struct SceneList {
    #[serde(rename = "scene", default)]
    pub scenes: Vec<SceneEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbabilityList {
    #[serde(rename = "probability", default)]
    pub probabilities: Vec<ProbabilityEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FootprintEntry {
    #[serde(rename = "minLon")]
    pub min_lon: f64,
    #[serde(rename = "maxLon")]
    pub max_lon: f64,
    #[serde(rename = "minLat")]
    pub min_lat: f64,
    #[serde(rename = "maxLat")]
    pub max_lat: f64,
}

impl From<&FootprintEntry> for BoundingBox {
    fn from(f: &FootprintEntry) -> Self {
        BoundingBox {
            min_lon: f.min_lon,
            max_lon: f.max_lon,
            min_lat: f.min_lat,
            max_lat: f.max_lat,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneEntry {
    pub id: String,
    pub date: NaiveDate,
    #[serde(rename = "cloudFraction")]
    pub cloud_fraction: f32,
    pub footprint: FootprintEntry,
    #[serde(rename = "band", default)]
    pub bands: Vec<BandEntry>,
    pub classification: String,
}

impl SceneEntry {
    pub fn band_path(&self, name: &str) -> Option<&str> {
        self.bands.iter().find(|b| b.name == name).map(|b| b.path.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbabilityEntry {
    pub id: String,
    pub date: NaiveDate,
    pub footprint: FootprintEntry,
    pub path: String,
}

impl CatalogManifest {
    pub fn from_xml(xml: &str) -> CompositeResult<Self> {
        from_str(xml).map_err(|e| CompositeError::XmlParsing(format!("Invalid catalog manifest: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> CompositeResult<Self> {
        log::info!("Reading catalog manifest: {}", path.as_ref().display());
        let xml = std::fs::read_to_string(path.as_ref())?;
        Self::from_xml(&xml)
    }

    /// Scene entries passing the query, in manifest order
    pub fn select_scenes(&self, query: &CatalogQuery) -> Vec<&SceneEntry> {
        self.scenes
            .scenes
            .iter()
            .filter(|e| query.accepts_scene(e.date, &BoundingBox::from(&e.footprint), e.cloud_fraction))
            .collect()
    }

    /// Probability entries passing the ROI and date filter, in manifest order
    pub fn select_probabilities(&self, query: &CatalogQuery) -> Vec<&ProbabilityEntry> {
        self.probabilities
            .probabilities
            .iter()
            .filter(|e| query.covers(e.date, &BoundingBox::from(&e.footprint)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateRange;
    use crate::types::Roi;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog>
  <scenes>
    <scene>
      <id>S2A_0612</id>
      <date>2024-06-12</date>
      <cloudFraction>3.4</cloudFraction>
      <footprint><minLon>11.6</minLon><maxLon>13.0</maxLon><minLat>44.1</minLat><maxLat>45.1</maxLat></footprint>
      <band><name>B4</name><path>0612/B04.tif</path></band>
      <band><name>B8</name><path>0612/B08.tif</path></band>
      <classification>0612/SCL.tif</classification>
    </scene>
    <scene>
      <id>S2B_0617</id>
      <date>2024-06-17</date>
      <cloudFraction>62.0</cloudFraction>
      <footprint><minLon>11.6</minLon><maxLon>13.0</maxLon><minLat>44.1</minLat><maxLat>45.1</maxLat></footprint>
      <band><name>B4</name><path>0617/B04.tif</path></band>
      <band><name>B8</name><path>0617/B08.tif</path></band>
      <classification>0617/SCL.tif</classification>
    </scene>
  </scenes>
  <probabilities>
    <probability>
      <id>S2A_0612</id>
      <date>2024-06-12</date>
      <footprint><minLon>11.6</minLon><maxLon>13.0</maxLon><minLat>44.1</minLat><maxLat>45.1</maxLat></footprint>
      <path>0612/probability.tif</path>
    </probability>
    <probability>
      <id>S2B_0617</id>
      <date>2024-06-17</date>
      <footprint><minLon>11.6</minLon><maxLon>13.0</maxLon><minLat>44.1</minLat><maxLat>45.1</maxLat></footprint>
      <path>0617/probability.tif</path>
    </probability>
  </probabilities>
</catalog>"#;

    fn query() -> CatalogQuery {
        CatalogQuery::new(
            Roi::from_bounds(12.0, 44.5, 12.5, 44.8),
            DateRange::parse("2024-06-01", "2024-06-30").unwrap(),
            10.0,
            "EPSG:32632".to_string(),
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = CatalogManifest::from_xml(MANIFEST).unwrap();

        assert_eq!(manifest.scenes.scenes.len(), 2);
        assert_eq!(manifest.probabilities.probabilities.len(), 2);

        let first = &manifest.scenes.scenes[0];
        assert_eq!(first.id, "S2A_0612");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert_eq!(first.band_path("B8"), Some("0612/B08.tif"));
        assert_eq!(first.band_path("B11"), None);
        assert_eq!(first.classification, "0612/SCL.tif");
    }

    #[test]
    fn test_selection_applies_cloud_filter_to_scenes_only() {
        let manifest = CatalogManifest::from_xml(MANIFEST).unwrap();
        let q = query();

        let scenes: Vec<&str> = manifest.select_scenes(&q).iter().map(|e| e.id.as_str()).collect();
        let probs: Vec<&str> = manifest.select_probabilities(&q).iter().map(|e| e.id.as_str()).collect();

        assert_eq!(scenes, vec!["S2A_0612"]);
        assert_eq!(probs, vec!["S2A_0612", "S2B_0617"]);
    }

    #[test]
    fn test_invalid_manifest() {
        let err = CatalogManifest::from_xml("<catalog><scenes><scene><id>x</id></scene></scenes></catalog>")
            .unwrap_err();
        assert!(matches!(err, CompositeError::XmlParsing(_)));
    }
}
