use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use implicit_qr::{DenseMatrix, Eigen, QrError, Svd, SymmetricEigen};

const TOL: f64 = 1e-8;

fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
    assert!((a - b).abs() < tol, "{}: {} vs {}", msg, a, b);
}

fn random_matrix(rng: &mut SmallRng, m: usize, n: usize) -> DenseMatrix<f64> {
    DenseMatrix::from_fn(m, n, |_, _| rng.gen::<f64>() * 2.0 - 1.0)
}

fn random_symmetric(rng: &mut SmallRng, n: usize) -> DenseMatrix<f64> {
    let mut a = random_matrix(rng, n, n);
    for i in 0..n {
        for j in 0..i {
            let v = a[(i, j)];
            a[(j, i)] = v;
        }
    }
    a
}

/// Frobenius norm of `A - Q·diag(λ)·Qᵀ` relative to the matrix scale.
fn symmetric_residual(a: &DenseMatrix<f64>, eig: &SymmetricEigen<f64>) -> f64 {
    let n = a.nrows();
    let q = eig.eigenvectors();
    let mut err = 0.0;
    let mut scale = 1.0_f64;
    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += q[(i, k)] * eig.eigenvalues()[k] * q[(j, k)];
            }
            err += (sum - a[(i, j)]).powi(2);
            scale = scale.max(a[(i, j)].abs());
        }
    }
    err.sqrt() / scale
}

fn assert_orthonormal_rows(m: &DenseMatrix<f64>, tol: f64) {
    let n = m.nrows();
    for i in 0..n {
        for j in 0..n {
            let mut dot = 0.0;
            for k in 0..m.ncols() {
                dot += m[(i, k)] * m[(j, k)];
            }
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_near(dot, expected, tol, &format!("rows {} and {}", i, j));
        }
    }
}

// ── Symmetric ───────────────────────────────────────────────────────

#[test]
fn symmetric_random_sizes() {
    let mut rng = SmallRng::seed_from_u64(17);
    for &n in &[1usize, 2, 3, 5, 10, 50] {
        let a = random_symmetric(&mut rng, n);
        let eig = SymmetricEigen::new(&a).unwrap();

        assert!(symmetric_residual(&a, &eig) < TOL, "n = {}", n);
        assert_orthonormal_rows(&eig.eigenvectors().transpose(), TOL);
        for w in eig.eigenvalues().windows(2) {
            assert!(w[0] <= w[1], "eigenvalues not ascending at n = {}", n);
        }

        let only = SymmetricEigen::eigenvalues_only(&a).unwrap();
        for (full, fast) in eig.eigenvalues().iter().zip(&only) {
            assert_near(*full, *fast, 1e-9, "values-only pass");
        }
    }
}

#[test]
fn symmetric_repeated_eigenvalues() {
    // 3·I has a triple eigenvalue; any orthonormal basis works
    let a = DenseMatrix::from_fn(4, 4, |i, j| if i == j { 3.0 } else { 0.0 });
    let eig = SymmetricEigen::new(&a).unwrap();
    for v in eig.eigenvalues() {
        assert_near(*v, 3.0, 1e-12, "triple eigenvalue");
    }
    assert_orthonormal_rows(eig.eigenvectors(), 1e-12);
}

#[test]
fn symmetric_is_deterministic() {
    let mut rng = SmallRng::seed_from_u64(99);
    let a = random_symmetric(&mut rng, 12);
    let first = SymmetricEigen::new(&a).unwrap();
    let second = SymmetricEigen::new(&a).unwrap();
    for (x, y) in first.eigenvalues().iter().zip(second.eigenvalues()) {
        assert_eq!(x, y);
    }
}

#[test]
fn symmetric_large() {
    let mut rng = SmallRng::seed_from_u64(5);
    let a = random_symmetric(&mut rng, 120);
    let eig = SymmetricEigen::new(&a).unwrap();
    assert!(symmetric_residual(&a, &eig) < 1e-7);
}

// ── SVD ─────────────────────────────────────────────────────────────

fn svd_residual(a: &DenseMatrix<f64>, svd: &Svd<f64>) -> f64 {
    let m = a.nrows();
    let n = a.ncols();
    let u = svd.u();
    let vt = svd.vt();
    let mut err = 0.0;
    let mut scale = 1.0_f64;
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += u[(i, k)] * svd.singular_values()[k] * vt[(k, j)];
            }
            err += (sum - a[(i, j)]).powi(2);
            scale = scale.max(a[(i, j)].abs());
        }
    }
    err.sqrt() / scale
}

#[test]
fn svd_random_sizes() {
    let mut rng = SmallRng::seed_from_u64(31);
    for &(m, n) in &[(1usize, 1usize), (2, 2), (3, 2), (5, 5), (10, 7), (50, 50)] {
        let a = random_matrix(&mut rng, m, n);
        let svd = Svd::new(&a).unwrap();

        assert!(svd_residual(&a, &svd) < TOL, "{}x{}", m, n);
        assert_orthonormal_rows(&svd.u().transpose(), TOL);
        assert_orthonormal_rows(svd.vt(), TOL);
        for w in svd.singular_values().windows(2) {
            assert!(w[0] >= w[1], "not descending at {}x{}", m, n);
        }
        assert!(*svd.singular_values().last().unwrap() >= 0.0);

        let only = Svd::singular_values_only(&a).unwrap();
        for (full, fast) in svd.singular_values().iter().zip(&only) {
            assert_near(*full, *fast, 1e-9, "values-only pass");
        }
    }
}

#[test]
fn svd_known_values() {
    let a = DenseMatrix::from_rows(
        3,
        3,
        &[5.0, 2.0, 3.0, 1.5, -2.0, 8.0, -3.0, 4.7, -0.5],
    );
    let sv = Svd::singular_values_only(&a).unwrap();
    assert_near(sv[0], 9.59186, 1e-5, "sigma 0");
    assert_near(sv[1], 5.18005, 1e-5, "sigma 1");
    assert_near(sv[2], 4.55558, 1e-5, "sigma 2");
}

#[test]
fn svd_rank_deficient() {
    // columns 0 and 2 are parallel
    let a = DenseMatrix::from_rows(
        4,
        3,
        &[1.0, 2.0, 2.0, 3.0, 0.5, 6.0, -1.0, 1.0, -2.0, 2.0, 4.0, 4.0],
    );
    let svd = Svd::new(&a).unwrap();
    assert_eq!(svd.rank(1e-10), 2);
    assert!(svd_residual(&a, &svd) < TOL);
}

#[test]
fn svd_large() {
    let mut rng = SmallRng::seed_from_u64(7);
    let a = random_matrix(&mut rng, 120, 120);
    let svd = Svd::new(&a).unwrap();
    assert!(svd_residual(&a, &svd) < 1e-7);
}

// ── General eigen ───────────────────────────────────────────────────

#[test]
fn general_random_real_pairs_satisfy_definition() {
    let mut rng = SmallRng::seed_from_u64(41);
    for &n in &[1usize, 2, 3, 5, 10, 50] {
        let a = random_matrix(&mut rng, n, n);
        let eig = Eigen::new(&a, true).unwrap();
        assert_eq!(eig.eigenvalues().len(), n);

        let vectors = eig.eigenvectors().unwrap();
        for (value, vector) in eig.eigenvalues().iter().zip(vectors) {
            let Some(v) = vector else {
                assert!(value.im != 0.0, "real eigenvalue without a vector");
                continue;
            };
            let av = a.mul_vec(v);
            let mut norm = 0.0;
            for i in 0..n {
                norm += v[i] * v[i];
                assert_near(av[i], value.re * v[i], 1e-6, &format!("n = {}", n));
            }
            assert_near(norm.sqrt(), 1.0, 1e-10, "unit norm");
        }
    }
}

#[test]
fn general_complex_values_come_in_conjugate_pairs() {
    let mut rng = SmallRng::seed_from_u64(53);
    let a = random_matrix(&mut rng, 12, 12);
    let eig = Eigen::new(&a, false).unwrap();

    let mut unmatched: Vec<_> = eig
        .eigenvalues()
        .iter()
        .filter(|v| v.im != 0.0)
        .copied()
        .collect();
    while let Some(v) = unmatched.pop() {
        let partner = unmatched.iter().position(|w| {
            (w.re - v.re).abs() < 1e-8 && (w.im + v.im).abs() < 1e-8
        });
        assert!(partner.is_some(), "no conjugate for {:?}", v);
        unmatched.swap_remove(partner.unwrap());
    }
}

#[test]
fn general_matches_symmetric_on_symmetric_input() {
    let mut rng = SmallRng::seed_from_u64(61);
    let a = random_symmetric(&mut rng, 8);

    let sym = SymmetricEigen::new(&a).unwrap();
    let gen = Eigen::new(&a, false).unwrap();

    for v in gen.eigenvalues() {
        assert!(v.im.abs() < 1e-9, "symmetric input gave {:?}", v);
    }
    let mut general_values: Vec<f64> = gen.eigenvalues().iter().map(|v| v.re).collect();
    general_values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (s, g) in sym.eigenvalues().iter().zip(&general_values) {
        assert_near(*s, *g, 1e-8, "symmetric vs general");
    }
}

#[test]
fn general_companion_matrix_roots() {
    // companion of p(x) = x³ - 6x² + 11x - 6 = (x-1)(x-2)(x-3)
    let a = DenseMatrix::from_rows(
        3,
        3,
        &[6.0, -11.0, 6.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    );
    let eig = Eigen::new(&a, false).unwrap();
    let mut roots: Vec<f64> = eig.eigenvalues().iter().map(|v| v.re).collect();
    roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
    for (root, expected) in roots.iter().zip(&[1.0, 2.0, 3.0]) {
        assert_near(*root, *expected, 1e-8, "companion root");
    }
}

// ── Failure paths ───────────────────────────────────────────────────

#[test]
fn shape_errors() {
    let wide = DenseMatrix::zeros(2, 3, 0.0);
    assert_eq!(SymmetricEigen::new(&wide).err(), Some(QrError::InvalidShape));
    assert_eq!(Svd::new(&wide).err(), Some(QrError::InvalidShape));
    assert_eq!(Eigen::new(&wide, true).err(), Some(QrError::InvalidShape));
}
