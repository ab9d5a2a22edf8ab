//! The spectral clustering estimator.
//!
//! ```text
//! X ──affinity──▶ A ──normalized_laplacian──▶ L ──eigendecompose──▶ (λ, V)
//!                 │                                                   │
//!                 └────────────── detect components ◀─── canonicalize ┘
//!                                        │
//!                           indicators or rescaled eigenvectors
//!                                        │
//!                                    k-means ──▶ labels
//! ```

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};

use crate::affinity::{
    ensure_nonzero, AffinitySource, AffinityStats, Custom, Knn, Precomputed, Rbf,
};
use crate::components::{
    detect_components_from_spectrum, ComponentReport, DEFAULT_COMPONENT_PROBE,
    DEFAULT_COMPONENT_TOL,
};
use crate::diagnostics::{Diagnostics, EmbeddingStats, SPECTRUM_SAMPLE};
use crate::eigen::{eigendecompose, EigenConfig};
use crate::eigenpairs::{canonicalize, EigenPairs};
use crate::embedding::{
    embed, EmbeddingOptions, EmbeddingScaling, SpectralEmbedding, DEFAULT_INFORMATIVE_TOL,
};
use crate::error::{Error, Result};
use crate::kmeans::{KMeans, KMeansConfig, PointClusterer};
use crate::laplacian::normalized_laplacian;

/// How the similarity graph is built.
#[derive(Debug, Clone, Default)]
pub enum Affinity {
    /// Gaussian kernel on squared Euclidean distance.
    #[default]
    Rbf,
    /// Symmetrized k-nearest-neighbor connectivity.
    NearestNeighbors,
    /// The input is the affinity matrix.
    Precomputed,
    /// Caller-supplied similarity function.
    Custom(Custom),
}

impl Affinity {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(ArrayView2<'_, f64>) -> Array2<f64> + Send + Sync + 'static,
    {
        Affinity::Custom(Custom::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Affinity::Rbf => "rbf",
            Affinity::NearestNeighbors => "nearest_neighbors",
            Affinity::Precomputed => "precomputed",
            Affinity::Custom(_) => "custom",
        }
    }
}

impl FromStr for Affinity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rbf" => Ok(Affinity::Rbf),
            "nearest_neighbors" => Ok(Affinity::NearestNeighbors),
            "precomputed" => Ok(Affinity::Precomputed),
            other => Err(Error::InvalidAffinity(other.to_string())),
        }
    }
}

/// Estimator configuration.
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    pub n_clusters: usize,
    pub affinity: Affinity,
    /// RBF kernel coefficient; `None` means `1 / n_features`. Only valid with
    /// [`Affinity::Rbf`].
    pub gamma: Option<f64>,
    /// Neighbors per point; `None` means `round(log2(n))`, at least 1. Only
    /// valid with [`Affinity::NearestNeighbors`].
    pub n_neighbors: Option<usize>,
    /// Whether a point counts among its own nearest neighbors.
    pub include_self: bool,
    /// Seed forwarded to the point clusterer.
    pub random_state: Option<u64>,
    /// k-means restarts of the default clusterer.
    pub n_init: usize,
    pub embedding_scaling: EmbeddingScaling,
    pub row_normalize: bool,
    pub eigen: EigenConfig,
    /// Eigenvalues at or below this count as zero for component detection.
    pub component_tolerance: f64,
    /// Smallest eigenvalues inspected for component detection (raised to
    /// `n_clusters + 1` when smaller). A window that is entirely near zero
    /// is extended over the rest of the spectrum.
    pub component_probe: usize,
    /// Eigenpairs with `|1 − λ|` at or below this are uninformative.
    pub informative_tolerance: f64,
    pub capture_diagnostics: bool,
}

impl SpectralConfig {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            affinity: Affinity::default(),
            gamma: None,
            n_neighbors: None,
            include_self: true,
            random_state: None,
            n_init: KMeansConfig::default().n_init,
            embedding_scaling: EmbeddingScaling::default(),
            row_normalize: false,
            eigen: EigenConfig::laplacian(),
            component_tolerance: DEFAULT_COMPONENT_TOL,
            component_probe: DEFAULT_COMPONENT_PROBE,
            informative_tolerance: DEFAULT_INFORMATIVE_TOL,
            capture_diagnostics: false,
        }
    }

    pub fn affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = Some(n_neighbors);
        self
    }

    pub fn include_self(mut self, include_self: bool) -> Self {
        self.include_self = include_self;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn embedding_scaling(mut self, scaling: EmbeddingScaling) -> Self {
        self.embedding_scaling = scaling;
        self
    }

    pub fn row_normalize(mut self, row_normalize: bool) -> Self {
        self.row_normalize = row_normalize;
        self
    }

    pub fn eigen(mut self, eigen: EigenConfig) -> Self {
        self.eigen = eigen;
        self
    }

    pub fn component_tolerance(mut self, tol: f64) -> Self {
        self.component_tolerance = tol;
        self
    }

    pub fn component_probe(mut self, probe: usize) -> Self {
        self.component_probe = probe;
        self
    }

    pub fn informative_tolerance(mut self, tol: f64) -> Self {
        self.informative_tolerance = tol;
        self
    }

    pub fn capture_diagnostics(mut self, capture: bool) -> Self {
        self.capture_diagnostics = capture;
        self
    }

    /// Reject inconsistent settings before any computation runs.
    pub fn validate(&self) -> Result<()> {
        let invalid =
            |name: &'static str, message: String| Err(Error::InvalidParameter { name, message });

        if self.n_clusters < 1 {
            return invalid("n_clusters", "must be a positive integer (>= 1)".into());
        }

        let mode = self.affinity.name();
        match (&self.affinity, self.gamma) {
            (Affinity::Rbf, Some(g)) if !(g.is_finite() && g > 0.0) => {
                return invalid("gamma", format!("must be a positive finite number, got {g}"));
            }
            (Affinity::Rbf, _) | (_, None) => {}
            (_, Some(_)) => {
                return invalid("gamma", format!("only applicable with rbf affinity, not {mode}"));
            }
        }
        match (&self.affinity, self.n_neighbors) {
            (Affinity::NearestNeighbors, Some(0)) => {
                return invalid("n_neighbors", "must be a positive integer (>= 1)".into());
            }
            (Affinity::NearestNeighbors, _) | (_, None) => {}
            (_, Some(_)) => {
                return invalid(
                    "n_neighbors",
                    format!("only applicable with nearest_neighbors affinity, not {mode}"),
                );
            }
        }

        if self.n_init < 1 {
            return invalid("n_init", "must be at least 1".into());
        }
        if !(self.component_tolerance.is_finite() && self.component_tolerance >= 0.0) {
            return invalid("component_tolerance", "must be finite and non-negative".into());
        }
        if !(self.informative_tolerance.is_finite() && self.informative_tolerance >= 0.0) {
            return invalid("informative_tolerance", "must be finite and non-negative".into());
        }
        if self.eigen.max_sweeps < 1 {
            return invalid("max_sweeps", "must be at least 1".into());
        }
        if !(self.eigen.tolerance.is_finite() && self.eigen.tolerance > 0.0) {
            return invalid("tolerance", "must be a positive finite number".into());
        }
        Ok(())
    }
}

/// Canonical Laplacian spectrum plus the degree vector needed for rescaling.
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub pairs: EigenPairs,
    pub degree: Array1<f64>,
    pub sweeps: usize,
    pub converged: bool,
}

/// Spectral clustering.
///
/// # Example
///
/// ```rust
/// use ndarray::array;
/// use specclust::{SpectralClustering, SpectralConfig};
///
/// let x = array![
///     [0.0, 0.0], [0.1, 0.0], [0.0, 0.1],
///     [5.0, 5.0], [5.1, 5.0], [5.0, 5.1],
/// ];
/// let mut model = SpectralClustering::new(SpectralConfig::new(2).random_state(0)).unwrap();
/// let labels = model.fit_predict(x.view()).unwrap();
/// assert_eq!(labels[0], labels[2]);
/// assert_ne!(labels[0], labels[3]);
/// ```
pub struct SpectralClustering {
    config: SpectralConfig,
    clusterer: Box<dyn PointClusterer>,
    labels: Option<Vec<usize>>,
    affinity: Option<Array2<f64>>,
    diagnostics: Option<Diagnostics>,
}

impl fmt::Debug for SpectralClustering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralClustering")
            .field("config", &self.config)
            .field("clusterer", &self.clusterer)
            .field("fitted", &self.labels.is_some())
            .finish()
    }
}

impl SpectralClustering {
    /// Validate `config` and build an unfitted estimator.
    pub fn new(config: SpectralConfig) -> Result<Self> {
        config.validate()?;
        let clusterer = KMeans::new(KMeansConfig {
            n_init: config.n_init,
            ..KMeansConfig::default()
        });
        Ok(Self {
            config,
            clusterer: Box::new(clusterer),
            labels: None,
            affinity: None,
            diagnostics: None,
        })
    }

    /// Replace the default k-means collaborator.
    pub fn with_clusterer(mut self, clusterer: impl PointClusterer + 'static) -> Self {
        self.clusterer = Box::new(clusterer);
        self
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Labels of the last successful fit.
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Affinity matrix of the last successful fit.
    pub fn affinity_matrix(&self) -> Option<&Array2<f64>> {
        self.affinity.as_ref()
    }

    /// Only populated when `capture_diagnostics` is set.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        self.diagnostics.as_ref()
    }

    fn reset(&mut self) {
        self.labels = None;
        self.affinity = None;
        self.diagnostics = None;
    }

    /// Fit on `x` (features, or the affinity matrix itself for
    /// [`Affinity::Precomputed`]).
    ///
    /// Results of any previous fit are dropped first; on error the estimator
    /// stays unfitted.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()> {
        self.reset();

        let affinity = self.compute_affinity(x)?;
        let n = affinity.nrows();
        let k = self.config.n_clusters;
        if k > n {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: n,
            });
        }

        let spectrum = self.compute_spectrum(affinity.view())?;
        let (embedding, components) = self.compute_embedding(affinity.view(), &spectrum)?;
        let labels = self
            .clusterer
            .cluster(embedding.matrix.view(), k, self.config.random_state)?;
        if labels.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: labels.len(),
            });
        }

        info!(
            "spectral clustering: n={n}, k={k}, affinity={}, embedding={:?}, components={}",
            self.config.affinity.name(),
            embedding.kind,
            components.n_components
        );

        if self.config.capture_diagnostics {
            self.diagnostics = Some(Diagnostics {
                affinity: AffinityStats::from_matrix(affinity.view()),
                spectrum: spectrum.pairs.smallest(SPECTRUM_SAMPLE).to_vec(),
                sweeps: spectrum.sweeps,
                converged: spectrum.converged,
                embedding: EmbeddingStats::from_embedding(
                    &embedding,
                    self.config.embedding_scaling,
                ),
                components,
            });
        }
        self.labels = Some(labels);
        self.affinity = Some(affinity);
        Ok(())
    }

    /// [`fit`](Self::fit) and return a copy of the labels.
    pub fn fit_predict(&mut self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        self.fit(x)?;
        self.labels
            .clone()
            .ok_or_else(|| Error::Backend("fit produced no labels".to_string()))
    }

    fn affinity_source(&self, n: usize) -> Box<dyn AffinitySource> {
        match &self.config.affinity {
            Affinity::Rbf => Box::new(Rbf::new(self.config.gamma)),
            Affinity::NearestNeighbors => {
                let k = self
                    .config
                    .n_neighbors
                    .unwrap_or_else(|| default_n_neighbors(n));
                Box::new(Knn::new(k).include_self(self.config.include_self))
            }
            Affinity::Precomputed => Box::new(Precomputed),
            Affinity::Custom(c) => Box::new(c.clone()),
        }
    }

    /// Stage 1: the validated, non-zero affinity matrix.
    pub fn compute_affinity(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (n, d) = x.dim();
        if n == 0 || d == 0 {
            return Err(Error::EmptyInput);
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(Error::NonFinite);
        }

        let source = self.affinity_source(n);
        let a = source.affinity(x)?;
        ensure_nonzero(a.view())?;
        debug!("affinity [{}]: shape={:?}", source.name(), a.dim());
        Ok(a)
    }

    /// Stage 2: normalized Laplacian and its canonical eigenpairs.
    ///
    /// The Laplacian itself is dropped once decomposed.
    pub fn compute_spectrum(&self, affinity: ArrayView2<'_, f64>) -> Result<Spectrum> {
        let (matrix, degree, _) = normalized_laplacian(affinity)?.into_parts();
        let eig = eigendecompose(matrix.view(), &self.config.eigen)?;
        drop(matrix);
        let pairs = canonicalize(eig.eigenvalues.view(), eig.eigenvectors.view())?;
        debug!(
            "spectrum: smallest={:?}",
            pairs.smallest(self.config.n_clusters + 1).to_vec()
        );
        Ok(Spectrum {
            pairs,
            degree,
            sweeps: eig.sweeps,
            converged: eig.converged,
        })
    }

    /// Stage 3: component detection and the `n × k` (or indicator) embedding.
    pub fn compute_embedding(
        &self,
        affinity: ArrayView2<'_, f64>,
        spectrum: &Spectrum,
    ) -> Result<(SpectralEmbedding, ComponentReport)> {
        let k = self.config.n_clusters;
        let probe = self.config.component_probe.max(k + 1);
        let report = detect_components_from_spectrum(
            affinity,
            spectrum.pairs.eigenvalues.view(),
            self.config.component_tolerance,
            probe,
        );
        let opts = EmbeddingOptions {
            scaling: self.config.embedding_scaling,
            row_normalize: self.config.row_normalize,
            informative_tolerance: self.config.informative_tolerance,
        };
        let embedding = embed(&spectrum.pairs, spectrum.degree.view(), k, &report, &opts)?;
        Ok((embedding, report))
    }
}

/// `round(log2(n))`, at least 1.
pub fn default_n_neighbors(n: usize) -> usize {
    if n < 2 {
        return 1;
    }
    ((n as f64).log2().round() as usize).max(1)
}
