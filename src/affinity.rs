//! Similarity graphs.
//!
//! An affinity matrix `A` is the weighted adjacency of the similarity graph:
//! square, symmetric, non-negative, with large entries for similar points.
//!
//! ```text
//! Rbf          A[i,j] = exp(-γ ||x_i - x_j||²)       γ defaults to 1/d, diag = 1
//! Knn          A = 0.5 (K + Kᵀ)                      K[i,j] = 1 iff j ∈ kNN(i)
//! Precomputed  the input itself, validated
//! Custom       a caller closure, validated like Precomputed
//! ```
//!
//! In the k-NN graph a one-directional neighbor relation has weight 0.5 and a
//! mutual one 1.0. With `include_self` the point itself occupies one of the
//! `n_neighbors` slots, so isolated points keep a non-zero diagonal.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use ndarray::{Array2, ArrayView2};

use crate::distance::squared_euclidean_distances;
use crate::error::{Error, Result};

/// Tolerance used for affinity symmetry and sign checks.
pub const AFFINITY_TOL: f64 = 1e-6;

/// Something that turns a feature matrix into an affinity matrix.
pub trait AffinitySource: fmt::Debug + Send + Sync {
    /// Build the `n × n` affinity matrix for `points`.
    fn affinity(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Gaussian (RBF) kernel affinity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rbf {
    /// Kernel coefficient; `None` means `1 / n_features`.
    pub gamma: Option<f64>,
}

impl Rbf {
    pub fn new(gamma: Option<f64>) -> Self {
        Self { gamma }
    }
}

impl AffinitySource for Rbf {
    fn affinity(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        rbf_affinity(points, self.gamma)
    }

    fn name(&self) -> &'static str {
        "rbf"
    }
}

/// k-nearest-neighbor connectivity affinity.
#[derive(Debug, Clone, Copy)]
pub struct Knn {
    pub n_neighbors: usize,
    pub include_self: bool,
}

impl Knn {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            include_self: true,
        }
    }

    pub fn include_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }
}

impl AffinitySource for Knn {
    fn affinity(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        knn_affinity(points, self.n_neighbors, self.include_self)
    }

    fn name(&self) -> &'static str {
        "nearest_neighbors"
    }
}

/// The input is already an affinity matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Precomputed;

impl AffinitySource for Precomputed {
    fn affinity(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        validate_affinity(points)?;
        Ok(points.to_owned())
    }

    fn name(&self) -> &'static str {
        "precomputed"
    }
}

type AffinityFn = dyn Fn(ArrayView2<'_, f64>) -> Array2<f64> + Send + Sync;

/// Caller-supplied similarity function.
///
/// Its output goes through the same validation as a precomputed matrix.
#[derive(Clone)]
pub struct Custom(Arc<AffinityFn>);

impl Custom {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Array2<f64> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Custom(<fn>)")
    }
}

impl AffinitySource for Custom {
    fn affinity(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let a = (self.0)(points);
        validate_affinity(a.view())?;
        if a.nrows() != points.nrows() {
            return Err(Error::DimensionMismatch {
                expected: points.nrows(),
                found: a.nrows(),
            });
        }
        Ok(a)
    }

    fn name(&self) -> &'static str {
        "custom"
    }
}

/// RBF affinity `exp(-γ ||x_i - x_j||²)`.
///
/// The kernel matrix is averaged with its transpose and its diagonal forced to
/// exactly 1.
pub fn rbf_affinity(points: ArrayView2<'_, f64>, gamma: Option<f64>) -> Result<Array2<f64>> {
    let (n, d) = points.dim();
    if n == 0 || d == 0 {
        return Err(Error::EmptyInput);
    }
    let gamma = gamma.unwrap_or(1.0 / d as f64);
    if !(gamma.is_finite() && gamma > 0.0) {
        return Err(Error::InvalidParameter {
            name: "gamma",
            message: format!("must be a positive finite number, got {gamma}"),
        });
    }
    trace!("rbf affinity: n={n}, d={d}, gamma={gamma}");

    let mut a = squared_euclidean_distances(points);
    a.mapv_inplace(|d2| (-gamma * d2).exp());

    for i in 0..n {
        a[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let avg = 0.5 * (a[[i, j]] + a[[j, i]]);
            a[[i, j]] = avg;
            a[[j, i]] = avg;
        }
    }
    Ok(a)
}

/// k-NN connectivity affinity, symmetrized as `0.5 (K + Kᵀ)`.
///
/// Neighbors are ranked by squared Euclidean distance. Among equal distances
/// the point itself ranks first, then the remaining candidates by ascending
/// index, so with `include_self` the self-edge is always kept even when
/// duplicates of the point come earlier in the input. With `include_self`
/// the point counts as its own nearest neighbor, so `n_neighbors` may be at
/// most `n`; otherwise it must be below `n`.
pub fn knn_affinity(
    points: ArrayView2<'_, f64>,
    n_neighbors: usize,
    include_self: bool,
) -> Result<Array2<f64>> {
    let n = points.nrows();
    if n == 0 || points.ncols() == 0 {
        return Err(Error::EmptyInput);
    }
    if n_neighbors == 0 {
        return Err(Error::InvalidParameter {
            name: "n_neighbors",
            message: "must be a positive integer".to_string(),
        });
    }
    let limit = if include_self { n } else { n - 1 };
    if n_neighbors > limit {
        return Err(Error::InvalidParameter {
            name: "n_neighbors",
            message: format!(
                "{n_neighbors} neighbors requested but only {limit} available for {n} samples"
            ),
        });
    }

    let distances = squared_euclidean_distances(points);
    let mut k_graph = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let mut order: Vec<(usize, f64)> = (0..n)
            .filter(|&j| include_self || j != i)
            .map(|j| (j, distances[[i, j]]))
            .collect();

        // Self first among equals, then ascending index.
        order.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| (a.0 != i).cmp(&(b.0 != i)))
                .then_with(|| a.0.cmp(&b.0))
        });

        for &(j, _) in order.iter().take(n_neighbors) {
            k_graph[[i, j]] = 1.0;
        }
    }

    let a = (&k_graph + &k_graph.t()) * 0.5;
    debug!(
        "knn affinity: n={n}, n_neighbors={n_neighbors}, include_self={include_self}, edges={}",
        a.iter().filter(|&&v| v > 0.0).count()
    );
    Ok(a)
}

/// Check that `a` is a usable affinity matrix: square, symmetric within
/// [`AFFINITY_TOL`], non-negative within [`AFFINITY_TOL`], finite and not all zero.
pub fn validate_affinity(a: ArrayView2<'_, f64>) -> Result<()> {
    let (n, m) = a.dim();
    if n != m {
        return Err(Error::NotSquare(n, m));
    }
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite);
    }

    let mut max_diff = 0.0f64;
    for i in 0..n {
        for j in (i + 1)..n {
            max_diff = max_diff.max((a[[i, j]] - a[[j, i]]).abs());
        }
    }
    if max_diff > AFFINITY_TOL {
        return Err(Error::Asymmetric { max_diff });
    }

    let min = a.iter().copied().fold(f64::INFINITY, f64::min);
    if min < -AFFINITY_TOL {
        return Err(Error::NegativeEntries { min });
    }

    ensure_nonzero(a)
}

/// An all-zero affinity matrix has no edges and no degrees.
pub fn ensure_nonzero(a: ArrayView2<'_, f64>) -> Result<()> {
    if a.iter().all(|&v| v == 0.0) {
        return Err(Error::ZeroAffinity);
    }
    Ok(())
}

/// Read-only summary of an affinity matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityStats {
    pub shape: (usize, usize),
    /// Number of non-zero entries.
    pub nnz: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl AffinityStats {
    pub fn from_matrix(a: ArrayView2<'_, f64>) -> Self {
        let len = a.len();
        let (min, max, sum, nnz) = a.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize),
            |(mn, mx, s, z), &v| (mn.min(v), mx.max(v), s + v, z + usize::from(v != 0.0)),
        );
        Self {
            shape: a.dim(),
            nnz,
            min: if len == 0 { 0.0 } else { min },
            max: if len == 0 { 0.0 } else { max },
            mean: if len == 0 { 0.0 } else { sum / len as f64 },
        }
    }
}
