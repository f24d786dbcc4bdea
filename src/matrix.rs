//! All-pairs distance matrices between file headers.
//!
//! Distances are stored as `f16` to keep the N×N matrix small for large
//! collections; when even that allocation fails the matrix falls back to a
//! coordinate map of the computed cells.

use std::collections::BTreeMap;
use std::path::PathBuf;

use half::f16;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::warn;

use crate::distance::FileDistance;
use crate::error::ClusterError;
use crate::record::{HeaderRecord, RecordReader};

/// Upper-triangular pairwise distance matrix.
#[derive(Debug, Clone)]
pub enum DistanceMatrix {
    Dense(Array2<f16>),
    Sparse {
        n: usize,
        cells: BTreeMap<(usize, usize), f16>,
    },
}

impl DistanceMatrix {
    /// Zero matrix of side `n`; dense when the allocation succeeds, sparse
    /// otherwise.
    pub fn zeros(n: usize) -> Self {
        match Self::try_dense(n) {
            Some(matrix) => Self::Dense(matrix),
            None => {
                warn!(n, "dense distance matrix allocation failed, using sparse cells");
                Self::sparse(n)
            }
        }
    }

    fn try_dense(n: usize) -> Option<Array2<f16>> {
        let len = n.checked_mul(n)?;
        let mut buffer: Vec<f16> = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, f16::ZERO);
        Array2::from_shape_vec((n, n), buffer).ok()
    }

    fn sparse(n: usize) -> Self {
        Self::Sparse {
            n,
            cells: BTreeMap::new(),
        }
    }

    /// Side length of the matrix.
    pub fn n(&self) -> usize {
        match self {
            Self::Dense(matrix) => matrix.nrows(),
            Self::Sparse { n, .. } => *n,
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f16 {
        match self {
            Self::Dense(matrix) => matrix[(i, j)],
            Self::Sparse { cells, .. } => cells.get(&(i, j)).copied().unwrap_or(f16::ZERO),
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: f16) {
        match self {
            Self::Dense(matrix) => matrix[(i, j)] = value,
            Self::Sparse { cells, .. } => {
                cells.insert((i, j), value);
            }
        }
    }

    /// Cell values on and above the diagonal offset by `k`, row-major.
    fn triangle_values(&self, k: i64) -> Vec<f32> {
        let n = self.n();
        let mut values = Vec::new();
        for i in 0..n {
            for j in Self::triangle_start(i, k)..n {
                values.push(self.get(i, j).to_f32());
            }
        }
        values
    }

    fn triangle_start(i: usize, k: i64) -> usize {
        (i as i64 + k).clamp(0, i64::MAX) as usize
    }

    /// Binarize the `k`-offset upper triangle against the `perc`-th
    /// percentile of its values.
    ///
    /// A cell is set when its distance is strictly below the percentile
    /// cutoff, selecting the most-similar pairs. Cells outside the
    /// considered triangle are always unset, and a degenerate matrix (side
    /// ≤ 1, or an empty triangle) yields an all-false result.
    pub fn percentile_threshold(&self, perc: f64, k: i64) -> Array2<bool> {
        let n = self.n();
        let mut selected = Array2::from_elem((n, n), false);

        let mut values = self.triangle_values(k);
        if values.is_empty() {
            return selected;
        }
        let cutoff = percentile(&mut values, perc);

        for i in 0..n {
            for j in Self::triangle_start(i, k)..n {
                selected[(i, j)] = self.get(i, j).to_f32() < cutoff;
            }
        }
        selected
    }
}

/// `perc`-th percentile of `values` with linear interpolation between order
/// statistics. `values` must not be empty; it is sorted in place.
fn percentile(values: &mut [f32], perc: f64) -> f32 {
    values.sort_unstable_by(f32::total_cmp);
    let last = values.len() - 1;
    let rank = perc.clamp(0.0, 100.0) / 100.0 * last as f64;
    let low = rank.floor() as usize;
    let high = rank.ceil() as usize;
    let fraction = (rank - low as f64) as f32;
    values[low] + (values[high] - values[low]) * fraction
}

/// Indices of all set cells of a boolean matrix, row-major, as parallel
/// (row, column) vectors ready for [`ClusterStore::merge`].
///
/// [`ClusterStore::merge`]: crate::cluster::ClusterStore::merge
pub fn matrix_where(mask: &Array2<bool>) -> (Vec<usize>, Vec<usize>) {
    let mut rows = Vec::new();
    let mut columns = Vec::new();
    for ((i, j), &set) in mask.indexed_iter() {
        if set {
            rows.push(i);
            columns.push(j);
        }
    }
    (rows, columns)
}

/// Pairwise distances between the headers of `paths` under `distance`.
///
/// Only the upper triangle (`i < j`) is populated; the measure is treated
/// as symmetric and the diagonal stays zero. Rows are computed in parallel,
/// each worker reading records only and writing disjoint cells. A read
/// failure aborts with the offending path attached.
pub fn calculate_file_distances<R, D>(
    reader: &R,
    paths: &[PathBuf],
    distance: &D,
) -> Result<DistanceMatrix, ClusterError>
where
    R: RecordReader,
    D: FileDistance + Sync,
{
    let records: Vec<HeaderRecord> = paths
        .iter()
        .map(|path| reader.read(path))
        .collect::<Result<_, _>>()?;

    let n = records.len();
    let mut matrix = DistanceMatrix::zeros(n);

    let rows: Vec<Vec<f16>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| f16::from_f64(distance.distance(&records[i], &records[j])))
                .collect()
        })
        .collect();

    for (i, row) in rows.into_iter().enumerate() {
        for (offset, value) in row.into_iter().enumerate() {
            matrix.set(i, i + 1 + offset, value);
        }
    }

    Ok(matrix)
}
