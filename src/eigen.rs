//! Symmetric eigendecomposition.
//!
//! The default backend is a cyclic Jacobi solver: O(n³) per sweep, but
//! deterministic and stable for the moderate sizes a dense affinity matrix
//! allows. With the `faer` feature a library routine can be selected instead;
//! both backends return the same contract:
//!
//! - eigenvalues ascending, ties in original column order
//! - eigenvectors as the columns of an orthonormal matrix
//! - with `assume_psd`, eigenvalues below `psd_floor` snapped to exactly 0
//!
//! ## The rotation
//!
//! For a pivot `(p, q)` the rotation that zeroes `a_pq` is
//!
//! ```text
//! θ = (a_qq - a_pp) / (2 a_pq)
//! t = sign(θ) / (|θ| + √(1 + θ²))      (smaller root of t² + 2tθ - 1 = 0)
//! c = 1 / √(1 + t²),  s = t c,  τ = s / (1 + c)
//! a_pp ← a_pp - t a_pq,  a_qq ← a_qq + t a_pq
//! ```
//!
//! Off-pivot entries are updated with the `τ` form, which loses less precision
//! than applying `c` and `s` directly.

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView2};

#[cfg(feature = "faer")]
use faer::{Mat, Side};

use crate::error::{Error, Result};
use crate::laplacian::ensure_square;

/// Maximum asymmetry accepted by the solvers.
pub const SYMMETRY_TOL: f64 = 1e-6;

/// Which eigensolver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    /// Built-in cyclic Jacobi.
    #[default]
    Jacobi,
    /// `faer` dense self-adjoint eigendecomposition.
    #[cfg(feature = "faer")]
    Faer,
}

/// Configuration for [`eigendecompose`].
#[derive(Debug, Clone)]
pub struct EigenConfig {
    /// Maximum number of full Jacobi sweeps over all `(p, q)` pairs.
    ///
    /// Hitting the cap is not an error; the best approximation is returned
    /// and a warning logged.
    pub max_sweeps: usize,
    /// Relative tolerance: the initial rotation threshold is
    /// `tolerance × ||M||_F`.
    pub tolerance: f64,
    /// Treat the input as positive semidefinite and clamp eigenvalues below
    /// `psd_floor` to exactly 0.
    pub assume_psd: bool,
    pub psd_floor: f64,
    pub backend: SolverBackend,
}

impl Default for EigenConfig {
    fn default() -> Self {
        Self {
            max_sweeps: 3000,
            tolerance: 1e-14,
            assume_psd: false,
            psd_floor: 1e-8,
            backend: SolverBackend::default(),
        }
    }
}

impl EigenConfig {
    /// Settings used for normalized Laplacians.
    pub fn laplacian() -> Self {
        Self {
            assume_psd: true,
            ..Self::default()
        }
    }

    pub fn max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn assume_psd(mut self, assume_psd: bool) -> Self {
        self.assume_psd = assume_psd;
        self
    }

    pub fn psd_floor(mut self, psd_floor: f64) -> Self {
        self.psd_floor = psd_floor;
        self
    }

    pub fn backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }
}

/// Eigenpairs of a symmetric matrix, sorted ascending.
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    pub eigenvalues: Array1<f64>,
    /// Column `j` is the eigenvector of `eigenvalues[j]`.
    pub eigenvectors: Array2<f64>,
    /// Full sweeps performed (0 on the diagonal fast path and for `faer`).
    pub sweeps: usize,
    /// False when the sweep cap was hit.
    pub converged: bool,
}

/// Decompose the symmetric matrix `m` with the backend chosen in `cfg`.
pub fn eigendecompose(m: ArrayView2<'_, f64>, cfg: &EigenConfig) -> Result<EigenDecomposition> {
    let n = ensure_square(m)?;
    if m.iter().any(|v| !v.is_finite()) {
        return Err(Error::NonFinite);
    }
    let max_diff = max_asymmetry(m);
    if max_diff > SYMMETRY_TOL {
        return Err(Error::Asymmetric { max_diff });
    }

    let raw = match cfg.backend {
        SolverBackend::Jacobi => jacobi_eigh(m, cfg.tolerance, cfg.max_sweeps),
        #[cfg(feature = "faer")]
        SolverBackend::Faer => faer_eigh(m)?,
    };
    debug!(
        "eigendecompose: n={n}, backend={:?}, sweeps={}, converged={}",
        cfg.backend, raw.sweeps, raw.converged
    );

    let mut values = raw.values;
    if cfg.assume_psd {
        clamp_psd(&mut values, cfg.psd_floor);
    }
    Ok(sort_ascending(values, raw.vectors, raw.sweeps, raw.converged))
}

fn max_asymmetry(m: ArrayView2<'_, f64>) -> f64 {
    let n = m.nrows();
    let mut max_diff = 0.0f64;
    for i in 0..n {
        for j in (i + 1)..n {
            max_diff = max_diff.max((m[[i, j]] - m[[j, i]]).abs());
        }
    }
    max_diff
}

/// Snap everything below `floor` to exactly 0. For a PSD matrix, anything
/// down there (including negatives) is rotation residue.
pub fn clamp_psd(values: &mut Array1<f64>, floor: f64) {
    values.mapv_inplace(|v| if v < floor { 0.0 } else { v });
}

struct RawEigen {
    values: Array1<f64>,
    vectors: Array2<f64>,
    sweeps: usize,
    converged: bool,
}

fn sort_ascending(
    values: Array1<f64>,
    vectors: Array2<f64>,
    sweeps: usize,
    converged: bool,
) -> EigenDecomposition {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    // Stable: equal eigenvalues keep their column order.
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut eigenvalues = Array1::<f64>::zeros(n);
    let mut eigenvectors = Array2::<f64>::zeros((vectors.nrows(), n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvalues[dst] = values[src];
        eigenvectors.column_mut(dst).assign(&vectors.column(src));
    }

    EigenDecomposition {
        eigenvalues,
        eigenvectors,
        sweeps,
        converged,
    }
}

/// Frobenius norm of the strictly off-diagonal part.
fn off_diagonal_norm(d: &Array2<f64>) -> f64 {
    let n = d.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += d[[i, j]] * d[[i, j]];
        }
    }
    (2.0 * sum).sqrt()
}

/// Cyclic Jacobi eigenvalue algorithm for symmetric matrices.
///
/// Returns unsorted eigenpairs; eigenvectors are columns.
fn jacobi_eigh(a: ArrayView2<'_, f64>, tol: f64, max_sweeps: usize) -> RawEigen {
    let n = a.nrows();

    // Already (almost) diagonal: typical of a graph made of isolated vertices.
    let diag_tol = 10.0 * tol;
    let nearly_diagonal = (0..n).all(|i| (0..n).all(|j| i == j || a[[i, j]].abs() <= diag_tol));
    if nearly_diagonal {
        return RawEigen {
            values: a.diag().to_owned(),
            vectors: Array2::eye(n),
            sweeps: 0,
            converged: true,
        };
    }

    let mut d = a.to_owned();
    let mut v = Array2::<f64>::eye(n);

    let frobenius = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mut threshold = tol * frobenius;

    let mut sweeps = 0usize;
    let mut rotated = true;

    while rotated && sweeps < max_sweeps {
        rotated = false;

        for p in 0..n - 1 {
            for q in (p + 1)..n {
                let apq = d[[p, q]];
                if apq.abs() <= threshold {
                    continue;
                }
                rotated = true;

                let app = d[[p, p]];
                let aqq = d[[q, q]];
                let diff = aqq - app;

                let t = if apq.abs() < diff.abs() * 1e-15 {
                    // θ is huge; t ≈ 1/(2θ).
                    apq / diff
                } else {
                    let theta = diff / (2.0 * apq);
                    let t = 1.0 / (theta.abs() + (1.0 + theta * theta).sqrt());
                    if theta < 0.0 {
                        -t
                    } else {
                        t
                    }
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;
                let tau = s / (1.0 + c);

                d[[p, p]] = app - t * apq;
                d[[q, q]] = aqq + t * apq;
                d[[p, q]] = 0.0;
                d[[q, p]] = 0.0;

                for j in 0..n {
                    if j == p || j == q {
                        continue;
                    }
                    let g = d[[j, p]];
                    let h = d[[j, q]];
                    let gp = g - s * (h + g * tau);
                    let hq = h + s * (g - h * tau);
                    d[[j, p]] = gp;
                    d[[p, j]] = gp;
                    d[[j, q]] = hq;
                    d[[q, j]] = hq;
                }

                // Accumulate v = v J.
                for j in 0..n {
                    let g = v[[j, p]];
                    let h = v[[j, q]];
                    v[[j, p]] = g - s * (h + g * tau);
                    v[[j, q]] = h + s * (g - h * tau);
                }
            }
        }

        sweeps += 1;

        // Every 5 sweeps, tighten the threshold once the off-diagonal mass
        // has come down to its scale.
        if sweeps % 5 == 0 && off_diagonal_norm(&d) < threshold * n as f64 {
            threshold *= 0.1;
        }
    }

    let converged = !rotated;
    if !converged {
        warn!(
            "Jacobi solver reached max sweeps ({max_sweeps}); final off-diagonal norm: {:.3e}",
            off_diagonal_norm(&d)
        );
    }

    RawEigen {
        values: d.diag().to_owned(),
        vectors: v,
        sweeps,
        converged,
    }
}

/// Dense self-adjoint eigendecomposition via `faer`.
///
/// faer returns nondecreasing eigenvalues; the common sort/clamp path still
/// runs so both backends share one output contract.
#[cfg(feature = "faer")]
fn faer_eigh(a: ArrayView2<'_, f64>) -> Result<RawEigen> {
    let n = a.nrows();
    if n == 0 {
        return Ok(RawEigen {
            values: Array1::zeros(0),
            vectors: Array2::zeros((0, 0)),
            sweeps: 0,
            converged: true,
        });
    }

    let mut m = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            m[(i, j)] = a[[i, j]];
        }
    }

    let evd = m
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| Error::Backend(format!("faer self_adjoint_eigen: {e:?}")))?;
    let u = evd.U();
    let s = evd.S().column_vector();

    let mut values = Array1::<f64>::zeros(n);
    let mut vectors = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        values[j] = s[j];
        for i in 0..n {
            vectors[[i, j]] = u[(i, j)];
        }
    }

    Ok(RawEigen {
        values,
        vectors,
        sweeps: 0,
        converged: true,
    })
}
