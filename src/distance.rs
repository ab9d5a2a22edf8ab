//! Dense pairwise distances between the rows of a feature matrix.
//!
//! Every metric returns an `n × n` matrix that is symmetric (averaged with its
//! transpose) and has an exactly-zero diagonal, so downstream affinity kernels
//! never see round-off asymmetry.

use ndarray::{Array2, ArrayView1, ArrayView2};

#[cfg(feature = "parallel")]
use ndarray::parallel::prelude::*;

/// Distance metric between two feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// ℓ2 distance.
    #[default]
    Euclidean,
    /// Squared ℓ2 distance, clamped at 0.
    SquaredEuclidean,
    /// ℓ1 distance.
    Manhattan,
    /// 1 − cosine similarity. A zero-norm row is at distance 1 from every other row.
    Cosine,
}

impl Metric {
    #[inline]
    pub fn distance(self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            Metric::Euclidean => squared_euclidean(a, b).sqrt(),
            Metric::SquaredEuclidean => squared_euclidean(a, b),
            Metric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            Metric::Cosine => {
                let dot = a.dot(&b);
                let na = a.dot(&a).sqrt();
                let nb = b.dot(&b).sqrt();
                if na == 0.0 || nb == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (na * nb)
                }
            }
        }
    }
}

#[inline]
pub(crate) fn squared_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let d: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    d.max(0.0)
}

/// Compute the `n × n` distance matrix for the rows of `points`.
///
/// # Arguments
///
/// * `points` - n × d matrix (n points, d dimensions)
/// * `metric` - distance metric
pub fn pairwise_distances(points: ArrayView2<'_, f64>, metric: Metric) -> Array2<f64> {
    let n = points.nrows();
    let mut dist = Array2::<f64>::zeros((n, n));

    #[cfg(feature = "parallel")]
    {
        dist.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let xi = points.row(i);
                for j in 0..n {
                    if j != i {
                        row[j] = metric.distance(xi, points.row(j));
                    }
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        for i in 0..n {
            let xi = points.row(i);
            for j in (i + 1)..n {
                let d = metric.distance(xi, points.row(j));
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }
    }

    symmetrize_zero_diagonal(&mut dist);
    dist
}

/// Squared Euclidean distances, the input of the RBF kernel and k-NN ranking.
pub fn squared_euclidean_distances(points: ArrayView2<'_, f64>) -> Array2<f64> {
    pairwise_distances(points, Metric::SquaredEuclidean)
}

fn symmetrize_zero_diagonal(m: &mut Array2<f64>) {
    let n = m.nrows();
    for i in 0..n {
        m[[i, i]] = 0.0;
        for j in (i + 1)..n {
            let avg = 0.5 * (m[[i, j]] + m[[j, i]]);
            m[[i, j]] = avg;
            m[[j, i]] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn euclidean_matches_hand_computation() {
        let pts = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let d = pairwise_distances(pts.view(), Metric::Euclidean);
        assert!((d[[0, 1]] - 5.0).abs() < 1e-12);
        assert!((d[[0, 2]] - 10.0).abs() < 1e-12);
        assert!((d[[2, 1]] - 5.0).abs() < 1e-12);
        for i in 0..3 {
            assert_eq!(d[[i, i]], 0.0);
        }
    }

    #[test]
    fn squared_is_square_of_euclidean() {
        let pts = array![[1.0, 2.0, 3.0], [-1.0, 0.5, 2.0], [0.0, 0.0, 0.0]];
        let d = pairwise_distances(pts.view(), Metric::Euclidean);
        let d2 = squared_euclidean_distances(pts.view());
        for i in 0..3 {
            for j in 0..3 {
                assert!((d[[i, j]] * d[[i, j]] - d2[[i, j]]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn manhattan_distance() {
        let pts = array![[0.0, 0.0], [1.0, -2.0]];
        let d = pairwise_distances(pts.view(), Metric::Manhattan);
        assert!((d[[0, 1]] - 3.0).abs() < 1e-12);
        assert!((d[[1, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cosine_distance_orthogonal_and_parallel() {
        let pts = array![[1.0, 0.0], [0.0, 2.0], [3.0, 0.0], [0.0, 0.0]];
        let d = pairwise_distances(pts.view(), Metric::Cosine);
        assert!((d[[0, 1]] - 1.0).abs() < 1e-12);
        assert!(d[[0, 2]].abs() < 1e-12);
        // zero vector
        assert!((d[[3, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(d[[3, 3]], 0.0);
    }

    #[test]
    fn single_point() {
        let pts = array![[1.0, 1.0]];
        let d = pairwise_distances(pts.view(), Metric::Euclidean);
        assert_eq!(d.dim(), (1, 1));
        assert_eq!(d[[0, 0]], 0.0);
    }
}
