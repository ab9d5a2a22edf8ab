//! Connected components of the similarity graph.
//!
//! Two views of the same quantity:
//!
//! - spectral: the multiplicity of eigenvalue 0 of the normalized Laplacian,
//!   counted as the contiguous run of eigenvalues `<= tol` from the bottom of
//!   the ascending spectrum
//! - combinatorial: a breadth-first traversal over edges heavier than `tol`
//!
//! The spectral count decides whether the graph is fully connected. Component
//! labels are only trusted (and an indicator embedding only built) when both
//! counts agree.

use std::collections::VecDeque;

use log::{debug, warn};
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::eigen::{eigendecompose, EigenConfig};
use crate::eigenpairs::canonicalize;
use crate::error::{Error, Result};
use crate::laplacian::{ensure_square, normalized_laplacian};

/// Eigenvalues at or below this are treated as zero when counting components.
pub const DEFAULT_COMPONENT_TOL: f64 = 1e-2;

/// How many of the smallest eigenvalues are inspected by default.
pub const DEFAULT_COMPONENT_PROBE: usize = 10;

/// Outcome of component detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentReport {
    /// Spectral component count (at least 1).
    pub n_components: usize,
    pub is_fully_connected: bool,
    /// Contiguous near-zero eigenvalues at the bottom of the spectrum.
    pub zero_eigenvalues: usize,
    /// Components found by graph traversal.
    pub traversal_components: usize,
    /// Per-point component id, present only for a disconnected graph whose
    /// traversal agrees with the spectrum.
    pub labels: Option<Vec<usize>>,
}

/// Length of the run of eigenvalues `<= tol` starting at index 0.
///
/// Assumes ascending order; counting stops at the first value above `tol`.
pub fn count_zero_eigenvalues(eigenvalues: ArrayView1<'_, f64>, tol: f64) -> usize {
    eigenvalues.iter().take_while(|&&v| v <= tol).count()
}

/// Breadth-first component labelling over edges with weight `> tol`.
///
/// Self-loops are ignored. Component ids are assigned in order of each
/// component's lowest-index vertex. Returns `(count, labels)`.
pub fn traverse_components(adj: ArrayView2<'_, f64>, tol: f64) -> (usize, Vec<usize>) {
    let n = adj.nrows();
    let mut labels = vec![usize::MAX; n];
    let mut count = 0usize;
    let mut queue = VecDeque::new();

    for start in 0..n {
        if labels[start] != usize::MAX {
            continue;
        }
        labels[start] = count;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for j in 0..n {
                if j != node && labels[j] == usize::MAX && adj[[node, j]] > tol {
                    labels[j] = count;
                    queue.push_back(j);
                }
            }
        }
        count += 1;
    }

    (count, labels)
}

/// `n × n_components` membership matrix.
///
/// Column `c` holds `1/√|c|` for members of component `c` and 0 elsewhere, so
/// every column has unit norm.
pub fn component_indicators(labels: &[usize], n_components: usize) -> Result<Array2<f64>> {
    let mut sizes = vec![0usize; n_components];
    for &c in labels {
        if c >= n_components {
            return Err(Error::InvalidParameter {
                name: "labels",
                message: format!("component id {c} out of range for {n_components} components"),
            });
        }
        sizes[c] += 1;
    }

    let mut indicators = Array2::<f64>::zeros((labels.len(), n_components));
    for (i, &c) in labels.iter().enumerate() {
        indicators[[i, c]] = 1.0 / (sizes[c] as f64).sqrt();
    }
    Ok(indicators)
}

/// Classify connectivity from an already-canonical ascending spectrum of the
/// normalized Laplacian of `affinity`.
///
/// The first `probe` eigenvalues are inspected. When all of them are near
/// zero the run is followed into the rest of the spectrum, so graphs with
/// more than `probe` components are still counted exactly.
pub fn detect_components_from_spectrum(
    affinity: ArrayView2<'_, f64>,
    eigenvalues: ArrayView1<'_, f64>,
    tol: f64,
    probe: usize,
) -> ComponentReport {
    let probe = probe.min(eigenvalues.len());
    let mut zero_eigenvalues =
        count_zero_eigenvalues(eigenvalues.slice(ndarray::s![..probe]), tol);
    if zero_eigenvalues == probe {
        zero_eigenvalues = count_zero_eigenvalues(eigenvalues, tol);
    }
    let n_components = zero_eigenvalues.max(1);
    let is_fully_connected = n_components == 1;

    let (traversal_components, traversal_labels) = traverse_components(affinity, tol);
    debug!(
        "components: zero_eigenvalues={zero_eigenvalues}, traversal={traversal_components}, probe={probe}"
    );

    let labels = if is_fully_connected {
        None
    } else {
        warn!("graph is not fully connected: {n_components} components");
        if traversal_components == n_components {
            Some(traversal_labels)
        } else {
            warn!(
                "spectrum shows {n_components} components but traversal finds \
                 {traversal_components}; component labels discarded"
            );
            None
        }
    };

    ComponentReport {
        n_components,
        is_fully_connected,
        zero_eigenvalues,
        traversal_components,
        labels,
    }
}

/// Standalone detection: Laplacian, eigendecomposition and classification.
pub fn detect_components(
    affinity: ArrayView2<'_, f64>,
    tol: f64,
    probe: usize,
) -> Result<ComponentReport> {
    let n = ensure_square(affinity)?;
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    let lap = normalized_laplacian(affinity)?;
    let eig = eigendecompose(lap.matrix.view(), &EigenConfig::laplacian())?;
    let pairs = canonicalize(eig.eigenvalues.view(), eig.eigenvectors.view())?;
    Ok(detect_components_from_spectrum(
        affinity,
        pairs.eigenvalues.view(),
        tol,
        probe,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blocks() -> Array2<f64> {
        array![
            [1.0, 1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 1.0],
        ]
    }

    #[test]
    fn zero_run_stops_at_first_gap() {
        let vals = array![0.0, 0.005, 0.5, 0.0];
        assert_eq!(count_zero_eigenvalues(vals.view(), 1e-2), 2);
        let none = array![0.2, 0.0];
        assert_eq!(count_zero_eigenvalues(none.view(), 1e-2), 0);
    }

    #[test]
    fn traversal_ignores_self_loops_and_light_edges() {
        let adj = array![[1.0, 0.001, 0.0], [0.001, 1.0, 0.5], [0.0, 0.5, 1.0]];
        let (count, labels) = traverse_components(adj.view(), 1e-2);
        assert_eq!(count, 2);
        assert_eq!(labels, vec![0, 1, 1]);
    }

    #[test]
    fn indicators_have_unit_columns() {
        let ind = component_indicators(&[0, 0, 1, 0], 2).unwrap();
        let third = 1.0 / 3.0f64.sqrt();
        assert!((ind[[0, 0]] - third).abs() < 1e-15);
        assert_eq!(ind[[2, 0]], 0.0);
        assert_eq!(ind[[2, 1]], 1.0);
        for c in 0..2 {
            let norm: f64 = ind.column(c).iter().map(|v| v * v).sum();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        assert!(component_indicators(&[0, 2], 2).is_err());
    }

    #[test]
    fn block_diagonal_graph_is_split() {
        let report = detect_components(two_blocks().view(), DEFAULT_COMPONENT_TOL, 10).unwrap();
        assert_eq!(report.n_components, 2);
        assert!(!report.is_fully_connected);
        assert_eq!(report.zero_eigenvalues, 2);
        assert_eq!(report.labels, Some(vec![0, 0, 0, 1, 1]));
    }

    #[test]
    fn block_members_share_indicator_rows() {
        let report = detect_components(two_blocks().view(), DEFAULT_COMPONENT_TOL, 10).unwrap();
        let labels = report.labels.unwrap();
        let ind = component_indicators(&labels, report.n_components).unwrap();
        assert_eq!(ind.row(0), ind.row(1));
        assert_eq!(ind.row(1), ind.row(2));
        assert_eq!(ind.row(3), ind.row(4));
        assert_ne!(ind.row(0), ind.row(3));
    }

    #[test]
    fn connected_graph_has_one_component() {
        let adj = array![[1.0, 0.8, 0.1], [0.8, 1.0, 0.6], [0.1, 0.6, 1.0]];
        let report = detect_components(adj.view(), DEFAULT_COMPONENT_TOL, 10).unwrap();
        assert_eq!(report.n_components, 1);
        assert!(report.is_fully_connected);
        assert_eq!(report.traversal_components, 1);
        assert!(report.labels.is_none());
    }

    #[test]
    fn saturated_window_keeps_counting() {
        let adj = Array2::<f64>::eye(4);
        let report = detect_components(adj.view(), DEFAULT_COMPONENT_TOL, 2).unwrap();
        assert_eq!(report.zero_eigenvalues, 4);
        assert_eq!(report.traversal_components, 4);
        assert_eq!(report.labels, Some(vec![0, 1, 2, 3]));
    }

    #[test]
    fn more_components_than_default_window() {
        // 12 disjoint pairs
        let n = 24;
        let mut adj = Array2::<f64>::zeros((n, n));
        for p in 0..12 {
            let (i, j) = (2 * p, 2 * p + 1);
            adj[[i, i]] = 1.0;
            adj[[j, j]] = 1.0;
            adj[[i, j]] = 1.0;
            adj[[j, i]] = 1.0;
        }
        let report =
            detect_components(adj.view(), DEFAULT_COMPONENT_TOL, DEFAULT_COMPONENT_PROBE).unwrap();
        assert_eq!(report.n_components, 12);
        assert_eq!(report.zero_eigenvalues, 12);
        assert_eq!(report.traversal_components, 12);
        let labels = report.labels.unwrap();
        for p in 0..12 {
            assert_eq!(labels[2 * p], p);
            assert_eq!(labels[2 * p + 1], p);
        }
    }

    #[test]
    fn disagreeing_counts_withhold_labels() {
        let spectrum = array![0.0, 0.0, 0.0, 0.5, 1.0];
        let report =
            detect_components_from_spectrum(two_blocks().view(), spectrum.view(), 1e-2, 10);
        assert_eq!(report.zero_eigenvalues, 3);
        assert_eq!(report.traversal_components, 2);
        assert!(!report.is_fully_connected);
        assert!(report.labels.is_none());
    }
}
