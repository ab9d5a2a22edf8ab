//! Read-only snapshots of a fit, for debugging and tests.

use std::collections::BTreeSet;

use crate::affinity::AffinityStats;
use crate::components::ComponentReport;
use crate::embedding::{EmbeddingKind, EmbeddingScaling, SpectralEmbedding};

/// Number of smallest eigenvalues kept in [`Diagnostics::spectrum`].
pub const SPECTRUM_SAMPLE: usize = 10;

/// Values closer than this count as the same when counting distinct entries.
const DISTINCT_RESOLUTION: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingStats {
    pub shape: (usize, usize),
    /// Distinct values per column, after rounding to `1e-10`.
    pub distinct_per_dim: Vec<usize>,
    pub kind: EmbeddingKind,
    /// `None` for indicator embeddings, which are never rescaled.
    pub scaling: Option<EmbeddingScaling>,
}

impl EmbeddingStats {
    pub fn from_embedding(embedding: &SpectralEmbedding, scaling: EmbeddingScaling) -> Self {
        let distinct_per_dim = embedding
            .matrix
            .columns()
            .into_iter()
            .map(|col| {
                col.iter()
                    .map(|&v| (v / DISTINCT_RESOLUTION).round() as i64)
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .collect();

        Self {
            shape: embedding.matrix.dim(),
            distinct_per_dim,
            kind: embedding.kind,
            scaling: match embedding.kind {
                EmbeddingKind::Indicator => None,
                EmbeddingKind::Spectral => Some(scaling),
            },
        }
    }
}

/// Per-stage statistics of the last successful fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub affinity: AffinityStats,
    /// Up to [`SPECTRUM_SAMPLE`] smallest Laplacian eigenvalues.
    pub spectrum: Vec<f64>,
    /// Jacobi sweeps used (0 for library backends).
    pub sweeps: usize,
    pub converged: bool,
    pub embedding: EmbeddingStats,
    pub components: ComponentReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn distinct_values_are_rounded() {
        let embedding = SpectralEmbedding {
            matrix: array![[0.5, 1.0], [0.5 + 1e-13, 2.0], [0.25, 3.0]],
            kind: EmbeddingKind::Spectral,
            eigenvalues: array![0.0, 0.3],
        };
        let stats = EmbeddingStats::from_embedding(&embedding, EmbeddingScaling::Degree);
        assert_eq!(stats.shape, (3, 2));
        assert_eq!(stats.distinct_per_dim, vec![2, 3]);
        assert_eq!(stats.scaling, Some(EmbeddingScaling::Degree));
    }

    #[test]
    fn indicator_embeddings_report_no_scaling() {
        let embedding = SpectralEmbedding {
            matrix: array![[1.0, 0.0], [0.0, 1.0]],
            kind: EmbeddingKind::Indicator,
            eigenvalues: array![0.0, 0.0],
        };
        let stats = EmbeddingStats::from_embedding(&embedding, EmbeddingScaling::DiffusionMap);
        assert_eq!(stats.scaling, None);
        assert_eq!(stats.distinct_per_dim, vec![2, 2]);
    }
}
