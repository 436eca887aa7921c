//! Eigenvector extraction for the general (Hessenberg) path.
//!
//! Runs a second, Q-accumulating iteration over the Hessenberg form,
//! replaying the eigenvalues found by a values-only pass as shifts so each
//! one deflates almost immediately. Once the matrix is quasi-triangular the
//! real eigenvectors are recovered by back-substitution and mapped through
//! the accumulated `Q` (and the reduction's own orthogonal matrix when the
//! caller started from a dense matrix). Complex pairs get no vector.

use num_complex::Complex;

use crate::matrix::DenseMatrix;
use crate::qr::hessenberg::HessenbergQr;
use crate::qr::{cst, QrError};
use crate::traits::FloatScalar;

/// Scripted vector pass over a Hessenberg matrix.
///
/// Consumes the matrix and the eigenvalue script; [`process`]
/// (EigenvectorExtractor::process) yields the re-derived eigenvalues (in
/// discovery order) and one optional unit vector per value.
///
/// [`process`]: EigenvectorExtractor::process
pub struct EigenvectorExtractor<T> {
    engine: HessenbergQr<T>,
    script: Vec<Complex<T>>,
    on_script: bool,
    index_val: usize,
}

impl<T: FloatScalar> EigenvectorExtractor<T> {
    /// `h` is the Hessenberg form; `script` the eigenvalues of a completed
    /// values-only pass over the same matrix, in discovery order.
    pub fn new(h: DenseMatrix<T>, script: Vec<Complex<T>>) -> Self {
        let n = h.nrows();
        assert_eq!(script.len(), n, "script length");
        let engine = HessenbergQr::new(h).with_q(DenseMatrix::eye(n, T::zero()));
        Self {
            engine,
            script,
            on_script: true,
            index_val: 0,
        }
    }

    /// Run the scripted pass and extract the vectors. `q_h` is the
    /// orthogonal matrix of the Hessenberg reduction, when the eigenproblem
    /// started from a dense matrix.
    ///
    /// Vector `i` pairs with eigenvalue `i`; complex eigenvalues map to
    /// `None`.
    pub fn process(
        mut self,
        q_h: Option<&DenseMatrix<T>>,
    ) -> Result<(Vec<Complex<T>>, Vec<Option<Vec<T>>>), QrError> {
        self.find_q_and_t()?;
        let vectors = self.extract_vectors(q_h)?;
        Ok((self.engine.eigenvalues, vectors))
    }

    /// The iteration skeleton of the values pass, with two differences: a
    /// real trailing 2x2 keeps iterating until it is truly triangular, and
    /// shifts come from the script while it holds.
    fn find_q_and_t(&mut self) -> Result<(), QrError> {
        let n = self.engine.a.nrows();
        loop {
            if self.engine.state.steps > self.engine.limits.max_iterations {
                return Err(QrError::NonConvergence);
            }
            let Some(w) = self.engine.state.window() else {
                if !self.engine.state.next_split() {
                    break;
                }
                continue;
            };
            self.engine.state.count_step();
            if w.len() == 1 {
                self.engine.add_eigen_at(w.x1);
                self.engine.state.shrink(1);
                self.index_val += 1;
            } else if w.len() == 2 && !self.engine.is_real_2x2(w.x1, w.x2) {
                self.engine.add_computed_eigen_2x2(w.x1, w.x2);
                self.engine.state.shrink(2);
                self.index_val += 2;
            } else if self.engine.state.steps - self.engine.state.last_exceptional
                > self.engine.limits.exceptional_threshold
            {
                if !self.engine.a[(w.x2, w.x2)].is_finite() {
                    return Err(QrError::NumericBlowup);
                }
                self.engine.exceptional_shift(w.x1, w.x2);
            } else if self.engine.sub_diag_is_negligible(w.x2) {
                self.engine.add_eigen_at(w.x2);
                self.engine.state.shrink(1);
                self.index_val += 1;
            } else if !self.engine.split(w) {
                self.shifted_step(w.x1, w.x2, n);
            }
        }
        if self.index_val < n {
            return Err(QrError::NonConvergence);
        }
        Ok(())
    }

    fn shifted_step(&mut self, x1: usize, x2: usize, n: usize) {
        if self.on_script {
            if self.engine.state.steps > self.engine.limits.exceptional_threshold / 2 {
                self.on_script = false;
                return;
            }
            let a = self.script[self.index_val];
            if a.im == T::zero() {
                self.engine.implicit_single_step(x1, x2, a.re);
            } else if double_step_fits(x1, x2, n) {
                self.engine.scripted_double_step(x1, x2, a.re, a.im);
            } else {
                self.on_script = false;
            }
        } else if x2 > x1 && double_step_fits(x1, x2, n) {
            self.engine.implicit_double_step(x1, x2);
        } else {
            let shift = self.engine.a[(x2, x2)];
            self.engine.implicit_single_step(x1, x2, shift);
        }
    }

    // ── Extraction ──────────────────────────────────────────────────

    fn extract_vectors(
        &mut self,
        q_h: Option<&DenseMatrix<T>>,
    ) -> Result<Vec<Option<Vec<T>>>, QrError> {
        let n = self.engine.a.nrows();
        let q = self
            .engine
            .q
            .take()
            .expect("accumulator attached at construction");
        let mut vectors: Vec<Option<Vec<T>>> = (0..n).map(|_| None).collect();

        // positions run top-left to bottom-right; eigenvalue storage is the
        // reverse (last found is at the top)
        let mut triangular = true;
        for i in 0..n {
            let c = self.engine.eigenvalues[n - i - 1];
            if triangular && c.im != T::zero() {
                triangular = false;
            }
            if c.im == T::zero() && vectors[n - i - 1].is_none() {
                self.solve_shared_prefix(&q, &mut vectors, c.re, i, triangular)?;
            }
        }

        if let Some(q_h) = q_h {
            for v in vectors.iter_mut().flatten() {
                *v = q_h.mul_vec(v);
            }
        }
        Ok(vectors)
    }

    /// Solve `(T[0:k,0:k] - lambda·I)·v = -T[0:k,k]` once and reuse the
    /// prefix for every eigenvalue equal to `lambda` within relative
    /// `100·eps`, giving each a distinct trailing unit entry.
    fn solve_shared_prefix(
        &mut self,
        q: &DenseMatrix<T>,
        vectors: &mut [Option<Vec<T>>],
        lambda: T,
        first: usize,
        triangular: bool,
    ) -> Result<(), QrError> {
        let n = self.engine.a.nrows();
        let mut scale = lambda.abs();
        if scale == T::zero() {
            scale = T::one();
        }

        let mut temp = vec![T::zero(); n];
        if first > 0 {
            if triangular {
                self.solve_using_triangle(lambda, first, &mut temp)?;
            } else {
                self.solve_with_lu(lambda, first, &mut temp)?;
            }
        }

        let dup_tol = cst::<T>(100.0) * T::epsilon();
        for i in first..n {
            let c = self.engine.eigenvalues[n - i - 1];
            if c.im == T::zero() && (c.re - lambda).abs() / scale < dup_tol {
                temp[i] = T::one();
                let mut v = q.tr_mul_vec(&temp);
                normalize(&mut v);
                vectors[n - i - 1] = Some(v);
                temp[i] = T::zero();
            }
        }
        Ok(())
    }

    /// Back-substitution over the truly triangular leading block. The diag
    /// shift is applied in place and undone afterwards.
    fn solve_using_triangle(
        &mut self,
        lambda: T,
        index: usize,
        r: &mut [T],
    ) -> Result<(), QrError> {
        let a = &mut self.engine.a;
        for i in 0..index {
            a[(i, i)] = a[(i, i)] - lambda;
        }
        for i in 0..index {
            r[i] = -a[(i, index)];
        }
        let mut singular = false;
        for i in (0..index).rev() {
            let mut sum = r[i];
            for j in i + 1..index {
                sum = sum - a[(i, j)] * r[j];
            }
            let pivot = a[(i, i)];
            if pivot == T::zero() {
                singular = true;
                break;
            }
            r[i] = sum / pivot;
        }
        for i in 0..index {
            a[(i, i)] = a[(i, i)] + lambda;
        }
        if singular {
            return Err(QrError::SingularInput);
        }
        Ok(())
    }

    /// Dense LU solve of the leading block when 2x2 bumps sit above.
    fn solve_with_lu(&mut self, lambda: T, index: usize, r: &mut [T]) -> Result<(), QrError> {
        let src = &self.engine.a;
        let mut block = DenseMatrix::from_fn(index, index, |i, j| {
            if i == j {
                src[(i, j)] - lambda
            } else {
                src[(i, j)]
            }
        });
        for i in 0..index {
            r[i] = -src[(i, index)];
        }
        lu_solve(&mut block, &mut r[..index])?;
        Ok(())
    }
}

/// A double step fits when the 3-row reflector stays inside the window;
/// a two-row window needs one row of slack below it (that row's reflector
/// coefficient is zero, so it is read but not altered).
#[inline]
fn double_step_fits(x1: usize, x2: usize, n: usize) -> bool {
    x1 + 2 <= x2 || x1 + 2 < n
}

/// In-place LU with partial pivoting, solving `A·x = b` into `b`.
fn lu_solve<T: FloatScalar>(a: &mut DenseMatrix<T>, b: &mut [T]) -> Result<(), QrError> {
    let n = a.nrows();
    for k in 0..n {
        let mut p = k;
        for i in k + 1..n {
            if a[(i, k)].abs() > a[(p, k)].abs() {
                p = i;
            }
        }
        if a[(p, k)] == T::zero() {
            return Err(QrError::SingularInput);
        }
        if p != k {
            a.swap_rows(p, k);
            b.swap(p, k);
        }
        let pivot = a[(k, k)];
        for i in k + 1..n {
            let f = a[(i, k)] / pivot;
            a[(i, k)] = f;
            for j in k + 1..n {
                a[(i, j)] = a[(i, j)] - f * a[(k, j)];
            }
            b[i] = b[i] - f * b[k];
        }
    }
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in i + 1..n {
            sum = sum - a[(i, j)] * b[j];
        }
        b[i] = sum / a[(i, i)];
    }
    Ok(())
}

fn normalize<T: FloatScalar>(v: &mut [T]) {
    let norm = v.iter().fold(T::zero(), |acc, &x| acc + x * x).sqrt();
    if norm > T::zero() {
        for x in v.iter_mut() {
            *x = *x / norm;
        }
    }
}
