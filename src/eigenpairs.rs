//! Canonical form for eigenpairs.
//!
//! Eigenvectors are only defined up to sign, and solvers disagree on which
//! sign they return. Downstream clustering is sign-sensitive (k-means seeds on
//! coordinates), so every spectrum goes through [`canonicalize`] before use:
//!
//! 1. stable ascending sort by eigenvalue
//! 2. per column, the entry of largest magnitude is made non-negative
//!    (first such row on ties)

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Error, Result};

/// Sorted, sign-fixed eigenpairs. Column `j` of `eigenvectors` belongs to
/// `eigenvalues[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenPairs {
    pub eigenvalues: Array1<f64>,
    pub eigenvectors: Array2<f64>,
}

impl EigenPairs {
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// The `k` smallest eigenvalues (or all of them if fewer).
    pub fn smallest(&self, k: usize) -> ArrayView1<'_, f64> {
        let k = k.min(self.len());
        self.eigenvalues.slice(ndarray::s![..k])
    }
}

/// Put raw solver output into canonical order and sign.
///
/// Rejects an eigenvector matrix that is not square or whose size disagrees
/// with the number of eigenvalues.
pub fn canonicalize(
    eigenvalues: ArrayView1<'_, f64>,
    eigenvectors: ArrayView2<'_, f64>,
) -> Result<EigenPairs> {
    let (rows, cols) = eigenvectors.dim();
    if rows != cols {
        return Err(Error::NotSquare(rows, cols));
    }
    if cols != eigenvalues.len() {
        return Err(Error::DimensionMismatch {
            expected: eigenvalues.len(),
            found: cols,
        });
    }

    let n = cols;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigenvalues[i].total_cmp(&eigenvalues[j]));

    let mut values = Array1::<f64>::zeros(n);
    let mut vectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        values[dst] = eigenvalues[src];

        let col = eigenvectors.column(src);
        let mut pivot = 0usize;
        let mut best = f64::NEG_INFINITY;
        for (r, &v) in col.iter().enumerate() {
            if v.abs() > best {
                best = v.abs();
                pivot = r;
            }
        }
        let sign = if col[pivot] < 0.0 { -1.0 } else { 1.0 };
        vectors.column_mut(dst).assign(&col.mapv(|v| sign * v));
    }

    Ok(EigenPairs {
        eigenvalues: values,
        eigenvectors: vectors,
    })
}
