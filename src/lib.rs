//! # specclust
//!
//! Spectral clustering on dense data: similarity graphs, the normalized
//! Laplacian, a deterministic Jacobi eigensolver and spectral embeddings.
//!
//! ## The Core Idea
//!
//! Points become vertices of a weighted graph. The normalized Laplacian
//! `L_sym = I - D^{-1/2} A D^{-1/2}` of that graph has small eigenvalues whose
//! eigenvectors vary slowly across well-connected regions, so k-means on the
//! rows of those eigenvectors recovers the communities.
//!
//! ## Key Types and Functions
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`SpectralClustering`] | The estimator: `fit`, `fit_predict`, stage methods |
//! | [`SpectralConfig`] | Cluster count, affinity mode, tolerances |
//! | [`rbf_affinity`], [`knn_affinity`] | Similarity graphs from features |
//! | [`normalized_laplacian`] | `L_sym` plus the degree vectors |
//! | [`eigendecompose`] | Cyclic Jacobi (or `faer`) symmetric eigensolver |
//! | [`canonicalize`] | Ascending order, deterministic eigenvector signs |
//! | [`detect_components`] | Zero-eigenvalue count and component labels |
//! | [`embed`] | Indicator or rescaled eigenvector embedding |
//! | [`KMeans`] | Default [`PointClusterer`] |
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use specclust::{Affinity, SpectralClustering, SpectralConfig};
//!
//! let x = array![
//!     [0.0, 0.0], [0.1, 0.0], [0.0, 0.1],
//!     [9.0, 9.0], [9.1, 9.0], [9.0, 9.1],
//! ];
//! let config = SpectralConfig::new(2)
//!     .affinity("nearest_neighbors".parse::<Affinity>().unwrap())
//!     .n_neighbors(2)
//!     .random_state(42);
//! let labels = SpectralClustering::new(config).unwrap().fit_predict(x.view()).unwrap();
//! assert_ne!(labels[0], labels[5]);
//! ```
//!
//! ## The Pipeline
//!
//! ```text
//! 1. Affinity   A          rbf | nearest_neighbors | precomputed | custom
//! 2. Laplacian  L_sym      isolated vertices get identity rows
//! 3. Spectrum   (λ, V)     ascending, sign-fixed, PSD-clamped
//! 4. Components            count λ ≈ 0; traverse edges
//! 5. Embedding  n × k      indicators if disconnected, else rescaled V
//! 6. k-means    labels
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Disconnected graph**: eigenvalue 0 is degenerate and the eigenvectors
//!    are an arbitrary basis of the null space. Component indicators are used
//!    instead when there are at least `k` components.
//! 2. **Over-smoothed kernel**: with a tiny `gamma` every pair is equally
//!    similar and `L_sym` is close to `I - J/n`. The non-trivial eigenvalues
//!    sit at 1 and carry no signal; the fit fails with
//!    [`Error::InsufficientEigenvectors`] rather than returning arbitrary labels.
//! 3. **Scaling**: dense O(n²) affinity and O(n³) Jacobi sweeps. Fine for a few
//!    thousand points, not beyond.
//!
//! ## References
//!
//! - Ng, Jordan, Weiss (2001). "On Spectral Clustering"
//! - von Luxburg (2007). "A Tutorial on Spectral Clustering"
//! - Golub & Van Loan. "Matrix Computations", §8.5 (Jacobi methods)

pub mod affinity;
pub mod cluster;
pub mod components;
pub mod diagnostics;
pub mod distance;
pub mod eigen;
pub mod eigenpairs;
pub mod embedding;
pub mod error;
pub mod kmeans;
pub mod laplacian;

pub use affinity::{
    knn_affinity, rbf_affinity, validate_affinity, AffinitySource, AffinityStats, Custom, Knn,
    Precomputed, Rbf,
};
pub use cluster::{default_n_neighbors, Affinity, SpectralClustering, SpectralConfig, Spectrum};
pub use components::{
    component_indicators, detect_components, detect_components_from_spectrum,
    traverse_components, ComponentReport,
};
pub use diagnostics::{Diagnostics, EmbeddingStats};
pub use distance::{pairwise_distances, Metric};
pub use eigen::{eigendecompose, EigenConfig, EigenDecomposition, SolverBackend};
pub use eigenpairs::{canonicalize, EigenPairs};
pub use embedding::{
    assemble_spectral, embed, indicator_embedding, EmbeddingKind, EmbeddingOptions,
    EmbeddingScaling, SpectralEmbedding,
};
pub use error::{Error, Result};
pub use kmeans::{KMeans, KMeansConfig, KMeansFit, PointClusterer};
pub use laplacian::{laplacian_quadratic_form, normalized_laplacian, Laplacian};
