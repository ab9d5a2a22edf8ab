//! Spectral embeddings: the `n × k` point coordinates handed to the point
//! clusterer.
//!
//! Two branches:
//!
//! | Graph | Embedding |
//! |-------|-----------|
//! | disconnected, enough components, labels trusted | component indicators |
//! | otherwise | smallest eigenvectors of `L_sym`, rescaled |
//!
//! On a disconnected graph eigenvalue 0 is degenerate and the solver may
//! return any rotation of the null space, so exact membership is used instead.
//!
//! # Rescaling
//!
//! | [`EmbeddingScaling`] | row / column transform |
//! |----------------------|------------------------|
//! | `Degree` | row `i` divided by `degree[i]` (zero-degree rows untouched) |
//! | `DiffusionMap` | column `j` multiplied by `√max(0, 1 − λ_j)` |
//! | `Identity` | none |

use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};

use crate::components::{component_indicators, ComponentReport};
use crate::eigenpairs::EigenPairs;
use crate::error::{Error, Result};

/// An eigenpair with `|1 − λ|` at or below this carries no signal.
pub const DEFAULT_INFORMATIVE_TOL: f64 = 1e-3;

/// Row/column rescaling applied on the eigenvector branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingScaling {
    #[default]
    Degree,
    DiffusionMap,
    Identity,
}

/// Which branch produced an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Indicator,
    Spectral,
}

/// Embedded points, one row per input point.
#[derive(Debug, Clone)]
pub struct SpectralEmbedding {
    pub matrix: Array2<f64>,
    pub kind: EmbeddingKind,
    /// Eigenvalues of the embedding columns (all 0 for indicators).
    pub eigenvalues: Array1<f64>,
}

impl SpectralEmbedding {
    pub fn dim(&self) -> (usize, usize) {
        self.matrix.dim()
    }
}

/// Options for the eigenvector branch.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingOptions {
    pub scaling: EmbeddingScaling,
    pub row_normalize: bool,
    pub informative_tolerance: f64,
}

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            scaling: EmbeddingScaling::default(),
            row_normalize: false,
            informative_tolerance: DEFAULT_INFORMATIVE_TOL,
        }
    }
}

/// Indicator embedding from trusted component labels.
pub fn indicator_embedding(labels: &[usize], n_components: usize) -> Result<SpectralEmbedding> {
    let matrix = component_indicators(labels, n_components)?;
    Ok(SpectralEmbedding {
        matrix,
        kind: EmbeddingKind::Indicator,
        eigenvalues: Array1::zeros(n_components),
    })
}

/// Number of eigenvalues with `|1 − λ| > tol`.
pub fn count_informative(eigenvalues: ArrayView1<'_, f64>, tol: f64) -> usize {
    eigenvalues.iter().filter(|&&l| (1.0 - l).abs() > tol).count()
}

/// Eigenvector embedding of dimension `k`.
///
/// Fails with [`Error::InsufficientEigenvectors`] when more than `k`
/// eigenvalues are near zero without the traversal finding as many
/// components, or when fewer than `k` of the selected eigenpairs are
/// informative.
pub fn assemble_spectral(
    pairs: &EigenPairs,
    degree: ArrayView1<'_, f64>,
    k: usize,
    report: &ComponentReport,
    opts: &EmbeddingOptions,
) -> Result<SpectralEmbedding> {
    let n = pairs.len();
    if k == 0 || k > n {
        return Err(Error::InvalidEmbeddingDim { k, n });
    }
    if degree.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            found: degree.len(),
        });
    }

    let insufficient = |informative| Error::InsufficientEigenvectors {
        requested: k,
        informative,
        zero_eigenvalues: report.zero_eigenvalues,
        components: report.traversal_components,
    };

    let zeros = report.zero_eigenvalues;
    if zeros > k && report.traversal_components < zeros {
        return Err(insufficient(count_informative(
            pairs.smallest(k),
            opts.informative_tolerance,
        )));
    }

    let m = k.max(report.n_components).min(n);
    let candidates = pairs.eigenvectors.slice(s![.., ..m]);
    let mut matrix = candidates.slice(s![.., ..k]).to_owned();
    let eigenvalues = pairs.eigenvalues.slice(s![..k]).to_owned();

    let informative = count_informative(eigenvalues.view(), opts.informative_tolerance);
    if informative < k {
        return Err(insufficient(informative));
    }

    match opts.scaling {
        EmbeddingScaling::Degree => {
            for (mut row, &d) in matrix.axis_iter_mut(Axis(0)).zip(degree.iter()) {
                if d > 0.0 {
                    row.mapv_inplace(|v| v / d);
                }
            }
        }
        EmbeddingScaling::DiffusionMap => {
            for (mut col, &l) in matrix.axis_iter_mut(Axis(1)).zip(eigenvalues.iter()) {
                let w = (1.0 - l).max(0.0).sqrt();
                col.mapv_inplace(|v| v * w);
            }
        }
        EmbeddingScaling::Identity => {}
    }

    if opts.row_normalize {
        row_normalize(&mut matrix);
    }

    debug!(
        "spectral embedding: n={n}, k={k}, scaling={:?}, row_normalize={}",
        opts.scaling, opts.row_normalize
    );
    Ok(SpectralEmbedding {
        matrix,
        kind: EmbeddingKind::Spectral,
        eigenvalues,
    })
}

/// Scale every non-zero row to unit ℓ2 norm.
pub fn row_normalize(m: &mut Array2<f64>) {
    for mut row in m.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

/// Pick the branch for `k` clusters and build the embedding.
pub fn embed(
    pairs: &EigenPairs,
    degree: ArrayView1<'_, f64>,
    k: usize,
    report: &ComponentReport,
    opts: &EmbeddingOptions,
) -> Result<SpectralEmbedding> {
    if !report.is_fully_connected {
        match &report.labels {
            Some(labels) if report.n_components >= k => {
                debug!(
                    "indicator embedding: {} components for {k} clusters",
                    report.n_components
                );
                return indicator_embedding(labels, report.n_components);
            }
            Some(_) => warn!(
                "disconnected graph has {} components, fewer than {k} clusters; using eigenvectors",
                report.n_components
            ),
            None => {}
        }
    }
    assemble_spectral(pairs, degree, k, report, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn connected_report() -> ComponentReport {
        ComponentReport {
            n_components: 1,
            is_fully_connected: true,
            zero_eigenvalues: 1,
            traversal_components: 1,
            labels: None,
        }
    }

    fn pairs() -> EigenPairs {
        EigenPairs {
            eigenvalues: array![0.0, 0.5, 1.5],
            eigenvectors: array![[0.5, 1.0, 0.0], [0.5, -1.0, 2.0], [1.0, 0.0, -2.0]],
        }
    }

    #[test]
    fn degree_scaling_divides_rows() {
        let degree = array![2.0, 4.0, 0.0];
        let e = assemble_spectral(
            &pairs(),
            degree.view(),
            2,
            &connected_report(),
            &EmbeddingOptions::default(),
        )
        .unwrap();
        assert_eq!(e.kind, EmbeddingKind::Spectral);
        assert_eq!(e.matrix, array![[0.25, 0.5], [0.125, -0.25], [1.0, 0.0]]);
        assert_eq!(e.eigenvalues.to_vec(), vec![0.0, 0.5]);
    }

    #[test]
    fn diffusion_scaling_weights_columns() {
        let degree = array![1.0, 1.0, 1.0];
        let opts = EmbeddingOptions {
            scaling: EmbeddingScaling::DiffusionMap,
            ..EmbeddingOptions::default()
        };
        let e = assemble_spectral(&pairs(), degree.view(), 3, &connected_report(), &opts).unwrap();
        let w = 0.5f64.sqrt();
        assert!((e.matrix[[0, 1]] - w).abs() < 1e-12);
        assert_eq!(e.matrix[[0, 0]], 0.5);
        // λ > 1 clamps the weight to zero
        assert_eq!(e.matrix[[1, 2]], 0.0);
    }

    #[test]
    fn row_normalization_gives_unit_rows() {
        let mut m = array![[3.0, 4.0], [0.0, 0.0]];
        row_normalize(&mut m);
        assert_eq!(m, array![[0.6, 0.8], [0.0, 0.0]]);
    }

    #[test]
    fn uninformative_directions_are_rejected() {
        let p = EigenPairs {
            eigenvalues: array![0.0, 0.9998, 1.0001],
            eigenvectors: Array2::eye(3),
        };
        let degree = array![1.0, 1.0, 1.0];
        let err = assemble_spectral(
            &p,
            degree.view(),
            3,
            &connected_report(),
            &EmbeddingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientEigenvectors {
                requested: 3,
                informative: 1,
                ..
            }
        ));
    }

    #[test]
    fn unexplained_zero_eigenvalues_are_rejected() {
        let p = EigenPairs {
            eigenvalues: array![0.0, 0.0, 0.0, 0.7],
            eigenvectors: Array2::eye(4),
        };
        let report = ComponentReport {
            n_components: 3,
            is_fully_connected: false,
            zero_eigenvalues: 3,
            traversal_components: 1,
            labels: None,
        };
        let degree = array![1.0, 1.0, 1.0, 1.0];
        let err =
            assemble_spectral(&p, degree.view(), 2, &report, &EmbeddingOptions::default())
                .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientEigenvectors {
                zero_eigenvalues: 3,
                components: 1,
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_dimension() {
        let degree = array![1.0, 1.0, 1.0];
        for k in [0, 4] {
            assert!(matches!(
                assemble_spectral(
                    &pairs(),
                    degree.view(),
                    k,
                    &connected_report(),
                    &EmbeddingOptions::default()
                ),
                Err(Error::InvalidEmbeddingDim { .. })
            ));
        }
    }

    #[test]
    fn disconnected_graph_uses_indicators() {
        let report = ComponentReport {
            n_components: 2,
            is_fully_connected: false,
            zero_eigenvalues: 2,
            traversal_components: 2,
            labels: Some(vec![0, 1, 0]),
        };
        let degree = array![1.0, 1.0, 1.0];
        let e = embed(&pairs(), degree.view(), 2, &report, &EmbeddingOptions::default()).unwrap();
        assert_eq!(e.kind, EmbeddingKind::Indicator);
        assert_eq!(e.matrix.row(0), e.matrix.row(2));
        assert_eq!(e.matrix[[1, 1]], 1.0);
    }

    #[test]
    fn too_few_components_fall_back_to_eigenvectors() {
        let report = ComponentReport {
            n_components: 2,
            is_fully_connected: false,
            zero_eigenvalues: 2,
            traversal_components: 2,
            labels: Some(vec![0, 1, 0]),
        };
        let p = EigenPairs {
            eigenvalues: array![0.0, 0.0, 0.4],
            eigenvectors: Array2::eye(3),
        };
        let degree = array![1.0, 1.0, 1.0];
        let e = embed(&p, degree.view(), 3, &report, &EmbeddingOptions::default()).unwrap();
        assert_eq!(e.kind, EmbeddingKind::Spectral);
        assert_eq!(e.dim(), (3, 3));
    }
}
