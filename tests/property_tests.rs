use ndarray::Array2;
use proptest::prelude::*;
use specclust::{
    canonicalize, eigendecompose, knn_affinity, normalized_laplacian, rbf_affinity, EigenConfig,
    KMeans, PointClusterer,
};

fn points(n: usize, d: usize, flat: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |(i, j)| flat[(i * d + j) % flat.len()])
}

fn max_asymmetry(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut m = 0.0f64;
    for i in 0..n {
        for j in 0..n {
            m = m.max((a[[i, j]] - a[[j, i]]).abs());
        }
    }
    m
}

proptest! {
    #[test]
    fn prop_rbf_is_symmetric_with_unit_diagonal(
        n in 1usize..15,
        d in 1usize..4,
        flat in prop::collection::vec(-5.0f64..5.0, 1..60),
        gamma in prop::option::of(0.01f64..5.0),
    ) {
        let x = points(n, d, &flat);
        let a = rbf_affinity(x.view(), gamma).unwrap();
        prop_assert!(max_asymmetry(&a) <= 1e-6);
        for i in 0..n {
            prop_assert_eq!(a[[i, i]], 1.0);
        }
        prop_assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn prop_knn_is_symmetric_with_half_weights(
        n in 2usize..15,
        flat in prop::collection::vec(-5.0f64..5.0, 1..40),
        k_frac in 0.0f64..1.0,
        include_self in any::<bool>(),
    ) {
        let x = points(n, 2, &flat);
        let limit = if include_self { n } else { n - 1 };
        let k = 1 + ((limit - 1) as f64 * k_frac) as usize;
        let a = knn_affinity(x.view(), k, include_self).unwrap();
        prop_assert!(max_asymmetry(&a) <= 1e-6);
        prop_assert!(a.iter().all(|&v| v == 0.0 || v == 0.5 || v == 1.0));
        for i in 0..n {
            let expected = if include_self { 1.0 } else { 0.0 };
            prop_assert_eq!(a[[i, i]], expected);
        }
    }

    #[test]
    fn prop_eigendecomposition_reconstructs(
        n in 1usize..10,
        flat in prop::collection::vec(-3.0f64..3.0, 1..100),
    ) {
        let mut m = Array2::<f64>::zeros((n, n));
        let mut idx = 0;
        for i in 0..n {
            for j in i..n {
                let v = flat[idx % flat.len()];
                idx += 1;
                m[[i, j]] = v;
                m[[j, i]] = v;
            }
        }

        let e = eigendecompose(m.view(), &EigenConfig::default()).unwrap();
        let v = &e.eigenvectors;
        let rec = v.dot(&Array2::from_diag(&e.eigenvalues)).dot(&v.t());
        let err = (&rec - &m).iter().map(|x| x * x).sum::<f64>().sqrt();
        prop_assert!(err <= 1e-6, "reconstruction error {}", err);

        let vtv = v.t().dot(v);
        let ortho = (&vtv - &Array2::<f64>::eye(n)).iter().map(|x| x * x).sum::<f64>().sqrt();
        prop_assert!(ortho <= 1e-6, "orthogonality error {}", ortho);

        for w in e.eigenvalues.windows(2) {
            prop_assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn prop_canonical_form_is_deterministic(
        n in 2usize..10,
        flat in prop::collection::vec(-5.0f64..5.0, 2..40),
    ) {
        let x = points(n, 2, &flat);
        let a = rbf_affinity(x.view(), Some(0.5)).unwrap();
        let lap = normalized_laplacian(a.view()).unwrap();
        let e = eigendecompose(lap.matrix.view(), &EigenConfig::laplacian()).unwrap();

        let once = canonicalize(e.eigenvalues.view(), e.eigenvectors.view()).unwrap();
        let again = canonicalize(e.eigenvalues.view(), e.eigenvectors.view()).unwrap();
        prop_assert_eq!(&once, &again);

        // Flipping every input sign does not change the canonical form.
        let flipped = e.eigenvectors.mapv(|v| -v);
        let from_flipped = canonicalize(e.eigenvalues.view(), flipped.view()).unwrap();
        prop_assert_eq!(&once, &from_flipped);

        prop_assert!(once.eigenvalues.iter().all(|&l| l >= 0.0 && l <= 2.0 + 1e-9));
    }

    #[test]
    fn prop_kmeans_labels_in_range(
        n in 1usize..25,
        flat in prop::collection::vec(-10.0f64..10.0, 1..60),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        prop_assume!(k <= n);
        let x = points(n, 2, &flat);
        let labels = KMeans::default().cluster(x.view(), k, Some(seed)).unwrap();
        prop_assert_eq!(labels.len(), n);
        prop_assert!(labels.iter().all(|&l| l < k));
    }
}
