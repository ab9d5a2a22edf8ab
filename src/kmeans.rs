//! Point clustering of the embedded rows.
//!
//! The spectral pipeline only needs "n rows in, n labels out"; [`PointClusterer`]
//! is that seam. [`KMeans`] is the default implementation: k-means++ seeding,
//! Lloyd iterations and `n_init` restarts keeping the lowest inertia.

use std::fmt;

use log::{debug, trace};
use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::distance::squared_euclidean;
use crate::error::{Error, Result};

/// Clusters the rows of an embedding.
///
/// Implementations must be deterministic for a given `seed` and must not
/// modify the embedding.
pub trait PointClusterer: fmt::Debug + Send + Sync {
    /// Return one label in `0..n_clusters` per row of `embedding`.
    fn cluster(
        &self,
        embedding: ArrayView2<'_, f64>,
        n_clusters: usize,
        seed: Option<u64>,
    ) -> Result<Vec<usize>>;
}

/// Lloyd's algorithm settings.
#[derive(Debug, Clone, Copy)]
pub struct KMeansConfig {
    pub max_iter: usize,
    /// Stop when the total squared centroid shift or the relative inertia
    /// change drops to this.
    pub tol: f64,
    /// Independent k-means++ restarts.
    pub n_init: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-4,
            n_init: 10,
        }
    }
}

/// Result of a single k-means fit.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    /// `k × d`.
    pub centroids: Array2<f64>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    /// Lloyd iterations of the winning restart.
    pub n_iter: usize,
}

#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Run `n_init` seeded restarts and keep the best.
    pub fn fit(&self, x: ArrayView2<'_, f64>, k: usize, seed: Option<u64>) -> Result<KMeansFit> {
        let (n, _) = x.dim();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if k == 0 || k > n {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: n,
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFinite);
        }
        if self.config.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                message: "must be at least 1".to_string(),
            });
        }

        let mut rng: Box<dyn RngCore> = match seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        let mut best: Option<KMeansFit> = None;
        for run in 0..self.config.n_init {
            let fit = self.lloyd(x, k, &mut rng);
            trace!("kmeans run {run}: inertia={:.6e}, iters={}", fit.inertia, fit.n_iter);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        // n_init >= 1 was checked above.
        best.ok_or(Error::EmptyInput)
    }

    fn lloyd<R: Rng + ?Sized>(&self, x: ArrayView2<'_, f64>, k: usize, rng: &mut R) -> KMeansFit {
        let mut centroids = kmeans_plus_plus(x, k, rng);
        let mut labels = vec![0usize; x.nrows()];
        let mut inertia = assign(x, &centroids, &mut labels);
        let mut n_iter = 0;

        for it in 0..self.config.max_iter {
            n_iter = it + 1;
            let shift = update_centroids(x, &labels, &mut centroids);
            let next = assign(x, &centroids, &mut labels);
            let relative = (inertia - next).abs() / inertia.max(f64::MIN_POSITIVE);
            inertia = next;
            if shift <= self.config.tol || relative <= self.config.tol {
                break;
            }
        }

        KMeansFit {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }
}

impl PointClusterer for KMeans {
    fn cluster(
        &self,
        embedding: ArrayView2<'_, f64>,
        n_clusters: usize,
        seed: Option<u64>,
    ) -> Result<Vec<usize>> {
        let fit = self.fit(embedding, n_clusters, seed)?;
        debug!(
            "kmeans: k={n_clusters}, inertia={:.6e}, iters={}",
            fit.inertia, fit.n_iter
        );
        Ok(fit.labels)
    }
}

/// k-means++ seeding: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn kmeans_plus_plus<R: Rng + ?Sized>(x: ArrayView2<'_, f64>, k: usize, rng: &mut R) -> Array2<f64> {
    let (n, d) = x.dim();
    let mut centroids = Array2::<f64>::zeros((k, d));
    let mut chosen = vec![false; n];

    let first = rng.random_range(0..n);
    centroids.row_mut(0).assign(&x.row(first));
    chosen[first] = true;

    let mut d2: Vec<f64> = (0..n)
        .map(|i| squared_euclidean(x.row(i), x.row(first)))
        .collect();

    for c in 1..k {
        let total: f64 = d2.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = None;
            for (i, &w) in d2.iter().enumerate() {
                acc += w;
                if w > 0.0 && acc >= target {
                    pick = Some(i);
                    break;
                }
            }
            // Round-off can leave `acc` a hair below `target`.
            pick.or_else(|| d2.iter().rposition(|&w| w > 0.0))
        } else {
            None
        };
        // All remaining mass is zero (duplicate points): take the first unused row.
        let pick = pick
            .or_else(|| chosen.iter().position(|&used| !used))
            .unwrap_or(0);

        centroids.row_mut(c).assign(&x.row(pick));
        chosen[pick] = true;
        for (i, slot) in d2.iter_mut().enumerate() {
            let dist = squared_euclidean(x.row(i), x.row(pick));
            if dist < *slot {
                *slot = dist;
            }
        }
    }

    centroids
}

/// Nearest-centroid assignment (ties to the lower index). Returns the inertia.
fn assign(x: ArrayView2<'_, f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (i, label) in labels.iter_mut().enumerate() {
        let row = x.row(i);
        let mut best = 0usize;
        let mut best_d = f64::INFINITY;
        for (c, centroid) in centroids.outer_iter().enumerate() {
            let dist = squared_euclidean(row, centroid);
            if dist < best_d {
                best_d = dist;
                best = c;
            }
        }
        *label = best;
        inertia += best_d;
    }
    inertia
}

/// Move each centroid to the mean of its members; empty clusters stay put.
/// Returns the total squared shift.
fn update_centroids(x: ArrayView2<'_, f64>, labels: &[usize], centroids: &mut Array2<f64>) -> f64 {
    let (k, d) = centroids.dim();
    let mut sums = Array2::<f64>::zeros((k, d));
    let mut counts = vec![0usize; k];
    for (i, &c) in labels.iter().enumerate() {
        let mut row = sums.row_mut(c);
        row += &x.row(i);
        counts[c] += 1;
    }

    let mut shift = 0.0;
    for c in 0..k {
        if counts[c] == 0 {
            continue;
        }
        let mean = sums.row(c).mapv(|v| v / counts[c] as f64);
        shift += squared_euclidean(mean.view(), centroids.row(c));
        centroids.row_mut(c).assign(&mean);
    }
    shift
}
