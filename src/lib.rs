//! ndvi_composite: cloud-filtered median NDVI composites from Sentinel-2
//!
//! Joins surface reflectance scenes with their cloud-probability rasters,
//! masks clouds and shadows per pixel, computes NDVI per scene and reduces
//! the stack to a per-pixel temporal median, ready for export in a UTM
//! projection chosen from the region of interest.

pub mod types;
pub mod config;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use crate::types::{
    BoundingBox, CloudProbabilityRaster, CompositeError, CompositeRaster, CompositeResult,
    GeoTransform, IndexRaster, Roi, Scene,
};
pub use crate::config::{CompositeConfig, DateRange};
pub use crate::core::{CompositeOutcome, CompositePipeline, CompositeStatus, CrsSelection, ProjectionSelector};
pub use crate::io::{CatalogQuery, ExportRequest, Exporter, InMemoryCatalog, SceneCatalog};

#[cfg(feature = "python")]
mod python {
    use crate::core::{self as processing, ProjectionSelector, TemporalCompositor};
    use crate::types::{to_nan_filled, CompositeError, IndexRaster};
    use ndarray::Axis;
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::prelude::*;

    fn to_py_err(e: CompositeError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Export CRS for a centroid, honouring an optional override
    #[pyfunction]
    #[pyo3(signature = (lon, lat, crs_override=None, use_dynamic_utm=true))]
    fn suggest_crs(lon: f64, lat: f64, crs_override: Option<String>, use_dynamic_utm: bool) -> String {
        ProjectionSelector::new(crs_override, use_dynamic_utm)
            .select(Some((lon, lat)))
            .crs
    }

    #[pyfunction]
    fn utm_zone(lon: f64) -> Option<u8> {
        processing::utm_zone(lon)
    }

    /// `(a - b) / (a + b)` with NaN where undefined
    #[pyfunction]
    fn normalized_difference<'py>(
        py: Python<'py>,
        band_a: PyReadonlyArray2<'py, f32>,
        band_b: PyReadonlyArray2<'py, f32>,
    ) -> PyResult<&'py PyArray2<f32>> {
        let a = band_a.as_array().to_owned();
        let b = band_b.as_array().to_owned();
        let result = processing::normalized_difference(&a, &b).map_err(to_py_err)?;
        Ok(to_nan_filled(&result).into_pyarray(py))
    }

    /// Per-pixel median over a (time, rows, cols) stack; NaN marks absent values
    #[pyfunction]
    fn median_composite<'py>(
        py: Python<'py>,
        stack: PyReadonlyArray3<'py, f32>,
    ) -> PyResult<&'py PyArray2<f32>> {
        let view = stack.as_array();
        let (depth, rows, cols) = view.dim();

        let rasters: Vec<IndexRaster> = (0..depth)
            .map(|i| IndexRaster::from_nan_filled(i.to_string(), view.index_axis(Axis(0), i)))
            .collect();

        let composite = TemporalCompositor::new()
            .composite(&rasters, (rows, cols), None)
            .map_err(to_py_err)?;
        Ok(composite.to_nan_filled().into_pyarray(py))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(suggest_crs, m)?)?;
        m.add_function(wrap_pyfunction!(utm_zone, m)?)?;
        m.add_function(wrap_pyfunction!(normalized_difference, m)?)?;
        m.add_function(wrap_pyfunction!(median_composite, m)?)?;
        Ok(())
    }
}
