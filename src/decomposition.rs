//! Top-level decompositions over dense matrices.
//!
//! Each wrapper reduces the input to a condensed form, runs a values-only
//! QR pass, then replays the converged values as shifts in a second pass
//! that carries the accumulator matrices. The replay converges in very few
//! steps per value, so vectors cost little more than values.
//!
//! A failed constructor returns `Err` and exposes no partial output.

use num_complex::Complex;

use crate::matrix::DenseMatrix;
use crate::qr::{BidiagQr, EigenvectorExtractor, HessenbergQr, QrError, TridiagQr};
use crate::reduce::{bidiagonalize, hessenberg_form, tridiagonalize};
use crate::traits::FloatScalar;

// ── Symmetric eigendecomposition ────────────────────────────────────

/// Eigendecomposition of a real symmetric matrix.
///
/// Householder tridiagonalization followed by implicit QR iteration with
/// Wilkinson shifts. Eigenvalues are sorted ascending; eigenvectors are
/// the columns of an orthogonal matrix Q with `A = Q·diag(λ)·Qᵀ`.
///
/// Only the lower triangle of the input is referenced; the caller is
/// responsible for the matrix actually being symmetric.
///
/// # Example
///
/// ```
/// use implicit_qr::{DenseMatrix, SymmetricEigen};
///
/// let a = DenseMatrix::from_rows(2, 2, &[2.0_f64, -1.0, -1.0, 2.0]);
/// let eig = SymmetricEigen::new(&a).unwrap();
/// assert!((eig.eigenvalues()[0] - 1.0).abs() < 1e-10);
/// assert!((eig.eigenvalues()[1] - 3.0).abs() < 1e-10);
///
/// // A·v ≈ λ·v for the first eigenpair
/// let q = eig.eigenvectors();
/// for i in 0..2 {
///     let av = a[(i, 0)] * q[(0, 0)] + a[(i, 1)] * q[(1, 0)];
///     assert!((av - eig.eigenvalues()[0] * q[(i, 0)]).abs() < 1e-10);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricEigen<T> {
    eigenvalues: Vec<T>,
    eigenvectors: DenseMatrix<T>,
}

impl<T: FloatScalar> SymmetricEigen<T> {
    /// Decompose a symmetric matrix.
    ///
    /// Returns `Err(InvalidShape)` for a non-square input and
    /// `Err(NonConvergence)` if QR iteration exhausts its budget.
    pub fn new(a: &DenseMatrix<T>) -> Result<Self, QrError> {
        if !a.is_square() {
            return Err(QrError::InvalidShape);
        }
        let n = a.nrows();
        if n == 0 {
            return Ok(Self {
                eigenvalues: Vec::new(),
                eigenvectors: DenseMatrix::zeros(0, 0, T::zero()),
            });
        }

        let mut diag = vec![T::zero(); n];
        let mut off = vec![T::zero(); n.saturating_sub(1)];
        let mut q = DenseMatrix::zeros(n, n, T::zero());
        tridiagonalize(a, &mut diag, &mut off, &mut q, true);

        // Values-only pass, then replay the values as shifts with the
        // accumulator attached. The accumulator is seeded with Qᵀ so its
        // rows end up as eigenvectors of A rather than of T.
        let mut fast = TridiagQr::new(diag.clone(), off.clone());
        fast.process()?;
        let script = fast.eigenvalues().to_vec();

        let mut engine = TridiagQr::new(diag, off)
            .with_q(q.transpose())
            .with_script(script);
        engine.process()?;
        let (mut values, _, qt) = engine.into_parts();
        let qt = qt.ok_or(QrError::InvalidShape)?;

        // Rows of the accumulator are eigenvectors; expose them as columns.
        let mut eigenvectors = qt.transpose();
        sort_ascending(&mut values, &mut eigenvectors);
        Ok(Self {
            eigenvalues: values,
            eigenvectors,
        })
    }

    /// Compute eigenvalues only (faster, no eigenvector accumulation).
    ///
    /// The result is sorted ascending.
    pub fn eigenvalues_only(a: &DenseMatrix<T>) -> Result<Vec<T>, QrError> {
        if !a.is_square() {
            return Err(QrError::InvalidShape);
        }
        let n = a.nrows();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut diag = vec![T::zero(); n];
        let mut off = vec![T::zero(); n.saturating_sub(1)];
        let mut unused = DenseMatrix::zeros(0, 0, T::zero());
        tridiagonalize(a, &mut diag, &mut off, &mut unused, false);

        let mut engine = TridiagQr::new(diag, off);
        engine.process()?;
        let (mut values, _, _) = engine.into_parts();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
        Ok(values)
    }

    /// The eigenvalues, sorted ascending.
    #[inline]
    pub fn eigenvalues(&self) -> &[T] {
        &self.eigenvalues
    }

    /// The eigenvector matrix Q (columns are eigenvectors).
    #[inline]
    pub fn eigenvectors(&self) -> &DenseMatrix<T> {
        &self.eigenvectors
    }
}

/// Sort eigenvalues ascending, permuting the eigenvector columns in step.
///
/// Selection sort keeps the permutation explicit; the sort is O(n²) against
/// the O(n³) iteration already done.
fn sort_ascending<T: FloatScalar>(values: &mut [T], q: &mut DenseMatrix<T>) {
    let n = values.len();
    for i in 0..n {
        let mut min_idx = i;
        for j in (i + 1)..n {
            if values[j] < values[min_idx] {
                min_idx = j;
            }
        }
        if min_idx != i {
            values.swap(i, min_idx);
            q.swap_columns(i, min_idx);
        }
    }
}

// ── Singular value decomposition ────────────────────────────────────

/// Singular value decomposition `A = U·Σ·Vᵀ` of a real M x N matrix.
///
/// Golub-Kahan bidiagonalization followed by implicit QR iteration on the
/// bidiagonal band. Singular values are non-negative and sorted descending.
///
/// Requires `M >= N`; transpose first for wide matrices.
///
/// # Example
///
/// ```
/// use implicit_qr::{DenseMatrix, Svd};
///
/// let a = DenseMatrix::from_rows(2, 2, &[3.0_f64, 4.0, 0.0, 5.0]);
/// let svd = Svd::new(&a).unwrap();
/// assert!((svd.singular_values()[0] - 45.0_f64.sqrt()).abs() < 1e-10);
/// assert!((svd.singular_values()[1] - 5.0_f64.sqrt()).abs() < 1e-10);
/// ```
#[derive(Debug, Clone)]
pub struct Svd<T> {
    u: DenseMatrix<T>,
    singular_values: Vec<T>,
    vt: DenseMatrix<T>,
}

impl<T: FloatScalar> Svd<T> {
    /// Compute the SVD of a matrix.
    ///
    /// Returns `Err(InvalidShape)` when `M < N` and `Err(NonConvergence)`
    /// if the bidiagonal QR iteration exhausts its budget.
    pub fn new(a: &DenseMatrix<T>) -> Result<Self, QrError> {
        let m = a.nrows();
        let n = a.ncols();
        if m < n {
            return Err(QrError::InvalidShape);
        }
        if n == 0 {
            return Ok(Self {
                u: DenseMatrix::eye(m, T::zero()),
                singular_values: Vec::new(),
                vt: DenseMatrix::zeros(0, 0, T::zero()),
            });
        }

        let mut work = a.clone();
        let mut diag = vec![T::zero(); n];
        let mut off = vec![T::zero(); n.saturating_sub(1)];
        let mut u = DenseMatrix::zeros(m, m, T::zero());
        let mut v = DenseMatrix::zeros(n, n, T::zero());
        bidiagonalize(&mut work, &mut diag, &mut off, &mut u, &mut v, true, true);

        let mut fast = BidiagQr::new(diag.clone(), off.clone());
        fast.process()?;
        let script = fast.singular_values().to_vec();

        // Accumulators are seeded transposed; after the run their rows are
        // the singular vectors of A.
        let mut engine = BidiagQr::new(diag, off)
            .with_ut(u.transpose())
            .with_vt(v.transpose())
            .with_script(script);
        engine.process()?;
        let (mut values, _, ut, vt) = engine.into_parts();
        let mut ut = ut.ok_or(QrError::InvalidShape)?;
        let mut vt = vt.ok_or(QrError::InvalidShape)?;

        sort_descending(&mut values, &mut ut, &mut vt);
        Ok(Self {
            u: ut.transpose(),
            singular_values: values,
            vt,
        })
    }

    /// Compute only the singular values (faster, no U/V accumulation).
    ///
    /// The result is sorted descending.
    pub fn singular_values_only(a: &DenseMatrix<T>) -> Result<Vec<T>, QrError> {
        let m = a.nrows();
        let n = a.ncols();
        if m < n {
            return Err(QrError::InvalidShape);
        }
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut work = a.clone();
        let mut diag = vec![T::zero(); n];
        let mut off = vec![T::zero(); n.saturating_sub(1)];
        let mut unused = DenseMatrix::zeros(0, 0, T::zero());
        let mut unused2 = DenseMatrix::zeros(0, 0, T::zero());
        bidiagonalize(
            &mut work,
            &mut diag,
            &mut off,
            &mut unused,
            &mut unused2,
            false,
            false,
        );

        let mut engine = BidiagQr::new(diag, off);
        engine.process()?;
        let (mut values, _, _, _) = engine.into_parts();
        values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(core::cmp::Ordering::Equal));
        Ok(values)
    }

    /// The singular values, sorted descending.
    #[inline]
    pub fn singular_values(&self) -> &[T] {
        &self.singular_values
    }

    /// The left singular vectors U (M x M orthogonal matrix).
    #[inline]
    pub fn u(&self) -> &DenseMatrix<T> {
        &self.u
    }

    /// The right singular vectors Vᵀ (N x N orthogonal matrix).
    /// Rows of Vᵀ are the right singular vectors.
    #[inline]
    pub fn vt(&self) -> &DenseMatrix<T> {
        &self.vt
    }

    /// Numerical rank: number of singular values above `tol`.
    pub fn rank(&self, tol: T) -> usize {
        self.singular_values.iter().filter(|&&s| s > tol).count()
    }

    /// Condition number: σ_max / σ_min.
    ///
    /// Returns infinity if the smallest singular value is zero.
    pub fn condition_number(&self) -> T {
        if self.singular_values.is_empty() {
            return T::one();
        }
        let s_max = self.singular_values[0];
        let s_min = self.singular_values[self.singular_values.len() - 1];
        if s_min == T::zero() {
            T::infinity()
        } else {
            s_max / s_min
        }
    }
}

/// Sort singular values descending, permuting both accumulators in step.
fn sort_descending<T: FloatScalar>(
    values: &mut [T],
    ut: &mut DenseMatrix<T>,
    vt: &mut DenseMatrix<T>,
) {
    let n = values.len();
    for i in 0..n {
        let mut max_idx = i;
        for j in (i + 1)..n {
            if values[j] > values[max_idx] {
                max_idx = j;
            }
        }
        if max_idx != i {
            values.swap(i, max_idx);
            ut.swap_rows(i, max_idx);
            vt.swap_rows(i, max_idx);
        }
    }
}

// ── General eigendecomposition ──────────────────────────────────────

/// Eigendecomposition of a general real square matrix.
///
/// Hessenberg reduction followed by Francis double-shift QR iteration.
/// Eigenvalues may be complex and come in conjugate pairs; they are
/// reported in the order the iteration deflates them, not sorted.
///
/// When vectors are requested, each real eigenvalue gets a unit-norm real
/// eigenvector; complex eigenvalues carry `None`.
///
/// # Example
///
/// ```
/// use implicit_qr::{DenseMatrix, Eigen};
///
/// // Rotation by 90 degrees: eigenvalues ±i.
/// let a = DenseMatrix::from_rows(2, 2, &[0.0_f64, -1.0, 1.0, 0.0]);
/// let eig = Eigen::new(&a, false).unwrap();
/// assert!(eig.eigenvalues()[0].im.abs() > 0.99);
/// ```
#[derive(Debug, Clone)]
pub struct Eigen<T> {
    eigenvalues: Vec<Complex<T>>,
    eigenvectors: Option<Vec<Option<Vec<T>>>>,
}

impl<T: FloatScalar> Eigen<T> {
    /// Decompose a general square matrix.
    ///
    /// Returns `Err(InvalidShape)` for a non-square input,
    /// `Err(NonConvergence)` if QR iteration exhausts its budget, and
    /// `Err(SingularInput)` if eigenvector back-substitution hits a
    /// singular block.
    pub fn new(a: &DenseMatrix<T>, compute_vectors: bool) -> Result<Self, QrError> {
        if !a.is_square() {
            return Err(QrError::InvalidShape);
        }
        let n = a.nrows();
        if n == 0 {
            return Ok(Self {
                eigenvalues: Vec::new(),
                eigenvectors: compute_vectors.then(Vec::new),
            });
        }

        let mut h = a.clone();
        let mut q = DenseMatrix::zeros(n, n, T::zero());
        hessenberg_form(&mut h, &mut q, compute_vectors);

        // Values pass on a copy of H; the vector pass replays the values
        // as shifts on the original.
        let mut fast = HessenbergQr::new(h.clone());
        fast.process()?;
        let script = fast.eigenvalues().to_vec();

        if !compute_vectors {
            return Ok(Self {
                eigenvalues: script,
                eigenvectors: None,
            });
        }

        let (eigenvalues, vectors) =
            EigenvectorExtractor::new(h, script).process(Some(&q))?;
        Ok(Self {
            eigenvalues,
            eigenvectors: Some(vectors),
        })
    }

    /// The eigenvalues, in deflation order.
    #[inline]
    pub fn eigenvalues(&self) -> &[Complex<T>] {
        &self.eigenvalues
    }

    /// The eigenvectors, if they were requested.
    ///
    /// Entry `i` pairs with `eigenvalues()[i]`; `None` marks a complex
    /// eigenvalue.
    #[inline]
    pub fn eigenvectors(&self) -> Option<&[Option<Vec<T>>]> {
        self.eigenvectors.as_deref()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} vs {b}");
    }

    #[test]
    fn symmetric_reconstructs() {
        let a = DenseMatrix::from_rows(
            3,
            3,
            &[4.0, 1.0, -2.0, 1.0, 2.0, 0.0, -2.0, 0.0, 3.0],
        );
        let eig = SymmetricEigen::new(&a).unwrap();
        let q = eig.eigenvectors();
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += q[(i, k)] * eig.eigenvalues()[k] * q[(j, k)];
                }
                assert_near(sum, a[(i, j)], 1e-10);
            }
        }
        // ascending
        assert!(eig.eigenvalues()[0] <= eig.eigenvalues()[1]);
        assert!(eig.eigenvalues()[1] <= eig.eigenvalues()[2]);
    }

    #[test]
    fn symmetric_values_match_full() {
        let a = DenseMatrix::from_rows(
            3,
            3,
            &[4.0, 1.0, -2.0, 1.0, 2.0, 0.0, -2.0, 0.0, 3.0],
        );
        let full = SymmetricEigen::new(&a).unwrap();
        let only = SymmetricEigen::eigenvalues_only(&a).unwrap();
        for (a, b) in full.eigenvalues().iter().zip(&only) {
            assert_near(*a, *b, 1e-10);
        }
    }

    #[test]
    fn non_square_is_an_error() {
        let a = DenseMatrix::zeros(2, 3, 0.0);
        assert_eq!(
            SymmetricEigen::new(&a).unwrap_err(),
            QrError::InvalidShape
        );
        assert_eq!(Eigen::new(&a, false).unwrap_err(), QrError::InvalidShape);
        // wide input to SVD
        assert_eq!(Svd::new(&a).unwrap_err(), QrError::InvalidShape);
    }

    #[test]
    fn svd_reconstructs_tall() {
        let a = DenseMatrix::from_rows(
            4,
            3,
            &[1.0, 2.0, 0.5, -1.0, 3.0, 2.0, 0.0, 1.0, -2.0, 2.5, 0.0, 1.0],
        );
        let svd = Svd::new(&a).unwrap();
        let u = svd.u();
        let vt = svd.vt();
        for i in 0..4 {
            for j in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += u[(i, k)] * svd.singular_values()[k] * vt[(k, j)];
                }
                assert_near(sum, a[(i, j)], 1e-10);
            }
        }
        assert!(svd.singular_values()[0] >= svd.singular_values()[1]);
        assert!(svd.singular_values()[1] >= svd.singular_values()[2]);
        assert!(svd.singular_values()[2] >= 0.0);
    }

    #[test]
    fn svd_rank_and_condition() {
        // rank 1: second row is a multiple of the first; iteration leaves
        // the null singular value at rounding size, not exactly zero
        let a = DenseMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 2.0, 4.0]);
        let svd = Svd::new(&a).unwrap();
        assert_eq!(svd.rank(1e-10), 1);
        assert!(svd.condition_number() > 1e12);

        // an exactly zero singular value survives untouched
        let z = DenseMatrix::from_rows(2, 2, &[1.0_f64, 0.0, 0.0, 0.0]);
        let svd = Svd::new(&z).unwrap();
        assert!(svd.condition_number().is_infinite());

        let b = DenseMatrix::from_rows(2, 2, &[3.0, 0.0, 0.0, 1.0]);
        let svd = Svd::new(&b).unwrap();
        assert_eq!(svd.rank(1e-10), 2);
        assert_near(svd.condition_number(), 3.0, 1e-12);
    }

    #[test]
    fn general_real_eigenpairs() {
        let a = DenseMatrix::from_rows(
            3,
            3,
            &[6.0, -1.0, 0.0, -1.0, 5.0, 2.0, 0.0, 2.0, 4.0],
        );
        let eig = Eigen::new(&a, true).unwrap();
        let vectors = eig.eigenvectors().unwrap();
        assert_eq!(vectors.len(), 3);
        for (value, vector) in eig.eigenvalues().iter().zip(vectors) {
            assert_near(value.im, 0.0, 1e-10);
            let v = vector.as_ref().unwrap();
            let av = a.mul_vec(v);
            for i in 0..3 {
                assert_near(av[i], value.re * v[i], 1e-8);
            }
        }
    }

    #[test]
    fn general_complex_pair() {
        let a = DenseMatrix::from_rows(2, 2, &[1.0, -5.0, 2.0, 1.0]);
        let eig = Eigen::new(&a, true).unwrap();
        let values = eig.eigenvalues();
        assert_near(values[0].re, 1.0, 1e-10);
        assert_near(values[0].im.abs(), 10.0_f64.sqrt(), 1e-10);
        assert_near(values[1].re, 1.0, 1e-10);
        let vectors = eig.eigenvectors().unwrap();
        assert!(vectors[0].is_none());
        assert!(vectors[1].is_none());
    }

    #[test]
    fn empty_inputs() {
        let a = DenseMatrix::zeros(0, 0, 0.0);
        assert!(SymmetricEigen::new(&a).unwrap().eigenvalues().is_empty());
        assert!(Svd::new(&a).unwrap().singular_values().is_empty());
        assert!(Eigen::new(&a, true).unwrap().eigenvalues().is_empty());
    }
}
