use thiserror::Error;

/// Errors returned by the spectral pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Input matrix has no rows or no columns.
    #[error("empty input")]
    EmptyInput,

    /// Input contains NaN or infinite values.
    #[error("input contains non-finite values")]
    NonFinite,

    /// Invalid configuration value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// Unrecognized affinity name.
    #[error("invalid affinity '{0}': must be one of rbf, nearest_neighbors, precomputed")]
    InvalidAffinity(String),

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Two inputs disagree on a dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected size.
        expected: usize,
        /// Found size.
        found: usize,
    },

    /// Matrix that must be square has shape `rows x cols`.
    #[error("matrix is not square: {0} x {1}")]
    NotSquare(usize, usize),

    /// Affinity matrix differs from its transpose beyond tolerance.
    #[error("matrix is not symmetric: max |A - A^T| = {max_diff:e}")]
    Asymmetric {
        /// Largest `|A[i,j] - A[j,i]|`.
        max_diff: f64,
    },

    /// Affinity matrix has entries below the negative tolerance.
    #[error("matrix has negative entries (min = {min:e})")]
    NegativeEntries {
        /// Smallest entry.
        min: f64,
    },

    /// Affinity matrix has no non-zero entry, so there is no graph.
    #[error("affinity matrix contains only zeros; cannot define a graph")]
    ZeroAffinity,

    /// Embedding width is zero or exceeds the number of items.
    #[error("invalid embedding dimension k={k} for n={n}")]
    InvalidEmbeddingDim {
        /// Requested embedding width.
        k: usize,
        /// Number of items.
        n: usize,
    },

    /// The spectrum cannot support the requested number of clusters.
    #[error(
        "insufficient informative eigenvectors: requested {requested} clusters, \
         {informative} informative eigenvectors, {zero_eigenvalues} near-zero eigenvalues, \
         {components} connected components"
    )]
    InsufficientEigenvectors {
        /// Requested number of clusters.
        requested: usize,
        /// Selected eigenpairs with `|1 - λ|` above the informative tolerance.
        informative: usize,
        /// Near-zero eigenvalues at the bottom of the spectrum.
        zero_eigenvalues: usize,
        /// Components found by graph traversal.
        components: usize,
    },

    /// Failure reported by an optional linear-algebra backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
