//! Symmetric normalized graph Laplacian.
//!
//! ```text
//! L_sym = I - D^{-1/2} A D^{-1/2}
//!   - Eigenvalues in [0, 2]
//!   - Multiplicity of eigenvalue 0 = number of connected components
//!   - Eigenvector of 0 on a component is D^{1/2} 1 restricted to it
//! ```
//!
//! # Zero-degree nodes
//!
//! If a node has zero degree (isolated), \(D^{-1/2}\) is undefined. We treat
//! \(D^{-1/2}=0\) for such nodes, which yields:
//! - diagonal entry \(L_{ii}=1\)
//! - row/column i otherwise 0
//!
//! so the isolated vertex is its own component.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Normalized Laplacian together with the degree information later stages need.
#[derive(Debug, Clone)]
pub struct Laplacian {
    /// `I - D^{-1/2} A D^{-1/2}`.
    pub matrix: Array2<f64>,
    /// `degree[i] = Σ_j A[i,j]`.
    pub degree: Array1<f64>,
    /// `degree[i]^{-1/2}`, or 0 for isolated vertices.
    pub inv_sqrt_degree: Array1<f64>,
}

impl Laplacian {
    pub fn n(&self) -> usize {
        self.degree.len()
    }

    /// Hand the matrix to the eigensolver and keep only the degree vectors.
    pub fn into_parts(self) -> (Array2<f64>, Array1<f64>, Array1<f64>) {
        (self.matrix, self.degree, self.inv_sqrt_degree)
    }
}

pub(crate) fn ensure_square(a: ArrayView2<'_, f64>) -> Result<usize> {
    let (n, m) = a.dim();
    if n != m {
        return Err(Error::NotSquare(n, m));
    }
    Ok(n)
}

/// Compute degree vector from adjacency matrix.
pub fn degree_vector(adj: ArrayView2<'_, f64>) -> Array1<f64> {
    adj.sum_axis(Axis(1))
}

/// `degree^{-1/2}` with the isolated-vertex rule (`0` where `degree <= 0`).
pub fn inv_sqrt_degree(degree: ArrayView1<'_, f64>) -> Array1<f64> {
    degree.mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 })
}

/// Symmetric normalized Laplacian: L_sym = I - D^{-1/2} A D^{-1/2}
///
/// The affinity is only read; the returned [`Laplacian`] owns fresh buffers.
pub fn normalized_laplacian(adj: ArrayView2<'_, f64>) -> Result<Laplacian> {
    let n = ensure_square(adj)?;
    let degree = degree_vector(adj);
    let d_inv_sqrt = inv_sqrt_degree(degree.view());

    let mut l_sym = Array2::eye(n);
    for i in 0..n {
        let di = d_inv_sqrt[i];
        if di == 0.0 {
            continue;
        }
        for j in 0..n {
            let w = adj[[i, j]];
            if w != 0.0 {
                l_sym[[i, j]] -= di * w * d_inv_sqrt[j];
            }
        }
    }

    // Round-off can break exact symmetry in the product above.
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (l_sym[[i, j]] + l_sym[[j, i]]);
            l_sym[[i, j]] = avg;
            l_sym[[j, i]] = avg;
        }
    }

    Ok(Laplacian {
        matrix: l_sym,
        degree,
        inv_sqrt_degree: d_inv_sqrt,
    })
}

/// Compute Laplacian quadratic form: x^T L x
///
/// For the normalized Laplacian this is
/// (1/2) Σ_{ij} A_{ij} (x_i/√d_i - x_j/√d_j)² ≥ 0, and the Rayleigh
/// quotient x^T L x / x^T x lies in [0, 2].
pub fn laplacian_quadratic_form(lap: ArrayView2<'_, f64>, x: ArrayView1<'_, f64>) -> f64 {
    let lx = lap.dot(&x);
    x.dot(&lx)
}
