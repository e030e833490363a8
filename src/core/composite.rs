use crate::types::{
    ensure_same_dim, CompositeRaster, CompositeResult, GeoTransform, IndexRaster,
};
use ndarray::Array2;
use num_traits::Float;

/// Median of the values, averaging the two middle ranks for even counts.
///
/// Sorts `values` in place. Returns `None` when empty.
pub fn median_in_place<T: Float>(values: &mut [T]) -> Option<T> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid])
    } else {
        let two = T::one() + T::one();
        Some((values[mid - 1] + values[mid]) / two)
    }
}

/// Reduces a stack of per-scene index rasters to a per-pixel median
#[derive(Debug, Clone, Default)]
pub struct TemporalCompositor;

impl TemporalCompositor {
    pub fn new() -> Self {
        Self
    }

    /// Per-pixel median of present values across `stack`.
    ///
    /// Rasters with at least one present value must share `dim`; all-absent
    /// rasters contribute nothing and are skipped whatever their shape.
    /// Pixels without any present value stay absent. An empty stack gives an
    /// all-absent raster of `dim`.
    pub fn composite(
        &self,
        stack: &[IndexRaster],
        dim: (usize, usize),
        geo_transform: Option<GeoTransform>,
    ) -> CompositeResult<CompositeRaster> {
        let contributing: Vec<&IndexRaster> = stack.iter().filter(|r| r.present_count() > 0).collect();
        for raster in &contributing {
            ensure_same_dim(
                &format!("index raster of scene {}", raster.scene_id),
                dim,
                raster.dim(),
            )?;
        }

        let (rows, cols) = dim;
        log::info!(
            "Compositing {} of {} index rasters over a {}x{} grid",
            contributing.len(),
            stack.len(),
            rows,
            cols
        );

        let row_results = self.reduce_rows(&contributing, rows, cols);

        let mut values = Vec::with_capacity(rows * cols);
        let mut contributors = Vec::with_capacity(rows * cols);
        for row in row_results {
            for (value, count) in row {
                values.push(value);
                contributors.push(count);
            }
        }

        let composite = CompositeRaster {
            values: Array2::from_shape_vec(dim, values)?,
            contributors: Array2::from_shape_vec(dim, contributors)?,
            geo_transform,
        };

        log::info!(
            "Composite complete: {}/{} pixels present",
            composite.present_count(),
            rows * cols
        );
        Ok(composite)
    }

    fn reduce_row(stack: &[&IndexRaster], row: usize, cols: usize) -> Vec<(Option<f32>, u32)> {
        let mut samples: Vec<f32> = Vec::with_capacity(stack.len());
        (0..cols)
            .map(|col| {
                samples.clear();
                samples.extend(stack.iter().filter_map(|r| r.values[[row, col]]));
                let count = samples.len() as u32;
                (median_in_place(&mut samples), count)
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn reduce_rows(&self, stack: &[&IndexRaster], rows: usize, cols: usize) -> Vec<Vec<(Option<f32>, u32)>> {
        use rayon::prelude::*;

        (0..rows)
            .into_par_iter()
            .map(|row| Self::reduce_row(stack, row, cols))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn reduce_rows(&self, stack: &[&IndexRaster], rows: usize, cols: usize) -> Vec<Vec<(Option<f32>, u32)>> {
        (0..rows)
            .map(|row| Self::reduce_row(stack, row, cols))
            .collect()
    }
}
