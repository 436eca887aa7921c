//! Francis double-shift QR iteration on an upper Hessenberg matrix.
//!
//! Unlike the banded engines this one carries the full matrix: each step
//! builds a 3-element Householder reflector from the first column of
//! `(A - s1·I)(A - s2·I)`, with the two shifts taken from the trailing 2x2,
//! and chases the resulting 3x3 bulge down the sub-diagonal with further
//! reflectors. Real eigenvalues deflate one row at a time; complex pairs
//! converge to 2x2 blocks solved in closed form, so the iteration never
//! leaves real arithmetic.

use num_complex::Complex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::matrix::DenseMatrix;
use crate::qr::small::general_2x2_scaled;
use crate::qr::state::{IterState, Window};
use crate::qr::{cst, IterLimits, QrError};
use crate::traits::FloatScalar;

/// Hessenberg eigenvalue engine.
///
/// `process` runs the values-only pass; the scripted Q-accumulating pass is
/// driven externally by [`EigenvectorExtractor`](crate::qr::EigenvectorExtractor),
/// which replays the values found here as shifts.
pub struct HessenbergQr<T> {
    pub(crate) a: DenseMatrix<T>,
    pub(crate) q: Option<DenseMatrix<T>>,
    /// Eigenvalues in discovery order.
    pub(crate) eigenvalues: Vec<Complex<T>>,
    pub(crate) state: IterState,
    pub(crate) limits: IterLimits,
    tol: T,
    rng: SmallRng,
    /// Householder vector and scratch row for the rank-1 updates.
    u: Vec<T>,
    temp: Vec<T>,
    gamma: T,
}

impl<T: FloatScalar> HessenbergQr<T> {
    /// Take ownership of an upper Hessenberg matrix. Entries below the
    /// sub-diagonal are flushed to zero rather than trusted.
    pub fn new(mut a: DenseMatrix<T>) -> Self {
        assert!(a.is_square(), "Hessenberg iteration requires a square matrix");
        let n = a.nrows();
        for i in 2..n {
            for j in 0..i - 1 {
                a[(i, j)] = T::zero();
            }
        }
        Self {
            a,
            q: None,
            eigenvalues: Vec::with_capacity(n),
            state: IterState::new(n),
            limits: IterLimits::hessenberg(),
            tol: T::epsilon(),
            rng: SmallRng::seed_from_u64(0x2342),
            u: vec![T::zero(); n],
            temp: vec![T::zero(); n],
            gamma: T::zero(),
        }
    }

    /// Attach an accumulator; every reflector is applied to its rows.
    pub fn with_q(mut self, q: DenseMatrix<T>) -> Self {
        assert_eq!(q.nrows(), self.a.nrows(), "accumulator row count");
        self.q = Some(q);
        self
    }

    /// Override the default iteration budget.
    pub fn with_limits(mut self, limits: IterLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Eigenvalues in discovery order. Complete only after a successful run.
    pub fn eigenvalues(&self) -> &[Complex<T>] {
        &self.eigenvalues
    }

    /// Release the quasi-triangular matrix and the accumulator.
    pub fn into_parts(self) -> (DenseMatrix<T>, Option<DenseMatrix<T>>) {
        (self.a, self.q)
    }

    /// Values-only pass: trailing 2x2 windows are always solved in closed
    /// form, real or complex.
    pub fn process(&mut self) -> Result<(), QrError> {
        loop {
            if self.state.steps > self.limits.max_iterations {
                return Err(QrError::NonConvergence);
            }
            let Some(w) = self.state.window() else {
                if !self.state.next_split() {
                    return Ok(());
                }
                continue;
            };
            self.state.count_step();
            if w.len() == 1 {
                self.add_eigen_at(w.x1);
                self.state.shrink(1);
            } else if w.len() == 2 {
                self.add_computed_eigen_2x2(w.x1, w.x2);
                self.state.shrink(2);
            } else if self.state.steps - self.state.last_exceptional
                > self.limits.exceptional_threshold
            {
                if !self.a[(w.x2, w.x2)].is_finite() {
                    return Err(QrError::NumericBlowup);
                }
                self.exceptional_shift(w.x1, w.x2);
            } else if self.sub_diag_is_negligible(w.x2) {
                self.add_eigen_at(w.x2);
                self.state.shrink(1);
            } else if !self.split(w) {
                self.implicit_double_step(w.x1, w.x2);
            }
        }
    }

    // ── Deflation ───────────────────────────────────────────────────

    /// Eispack-style relative test of the sub-diagonal entry in row `r`.
    pub(crate) fn sub_diag_is_negligible(&self, r: usize) -> bool {
        let target = self.a[(r, r - 1)].abs();
        let above = self.a[(r - 1, r - 1)].abs();
        let right = self.a[(r, r)].abs();
        target <= cst::<T>(0.5) * self.tol * (above + right)
    }

    /// Scan the window for a negligible sub-diagonal boundary.
    pub(crate) fn split(&mut self, w: Window) -> bool {
        for i in (w.x1 + 1..=w.x2).rev() {
            if self.sub_diag_is_negligible(i) {
                self.state.split_at(i - 1);
                return true;
            }
        }
        false
    }

    pub(crate) fn add_eigen_at(&mut self, i: usize) {
        let v = self.a[(i, i)];
        self.eigenvalues.push(Complex::new(v, T::zero()));
        self.state.reset_steps();
    }

    /// Closed-form eigenvalues of the trailing 2x2, recorded in discovery
    /// order, conjugate pair together.
    pub(crate) fn add_computed_eigen_2x2(&mut self, x1: usize, x2: usize) {
        let (v0, v1) = general_2x2_scaled(
            self.a[(x1, x1)],
            self.a[(x1, x2)],
            self.a[(x2, x1)],
            self.a[(x2, x2)],
        );
        self.eigenvalues.push(v0);
        self.eigenvalues.push(v1);
        self.state.reset_steps();
    }

    /// Does the trailing 2x2 have real eigenvalues?
    pub(crate) fn is_real_2x2(&self, x1: usize, x2: usize) -> bool {
        general_2x2_scaled(
            self.a[(x1, x1)],
            self.a[(x1, x2)],
            self.a[(x2, x1)],
            self.a[(x2, x2)],
        )
        .0
        .im
            == T::zero()
    }

    // ── Shifts ──────────────────────────────────────────────────────

    /// Double shift from the trailing 2x2, in product form so the shifts
    /// themselves are never computed.
    pub(crate) fn implicit_double_step(&mut self, x1: usize, x2: usize) {
        let mut z11 = self.a[(x2 - 1, x2 - 1)];
        let mut z12 = self.a[(x2 - 1, x2)];
        let mut z21 = self.a[(x2, x2 - 1)];
        let mut z22 = self.a[(x2, x2)];

        let mut a11 = self.a[(x1, x1)];
        let mut a21 = self.a[(x1 + 1, x1)];
        let mut a12 = self.a[(x1, x1 + 1)];
        let mut a22 = self.a[(x1 + 1, x1 + 1)];
        let mut a32 = self.a[(x1 + 2, x1 + 1)];

        let max = [a11, a21, a12, a22, a32, z11, z22, z12, z21]
            .iter()
            .fold(T::zero(), |m, v| m.max(v.abs()));
        if max > T::zero() {
            a11 = a11 / max;
            a21 = a21 / max;
            a12 = a12 / max;
            a22 = a22 / max;
            a32 = a32 / max;
            z11 = z11 / max;
            z12 = z12 / max;
            z21 = z21 / max;
            z22 = z22 / max;
        }

        // first column of (A - s1 I)(A - s2 I), kept in product form to
        // resist overflow: the division by a21 is folded into all three
        let b11 = (a11 - z11) * (a11 - z22) - z21 * z12 + a12 * a21;
        let b21 = (a11 + a22 - z11 - z22) * a21;
        let b31 = a32 * a21;

        self.double_step_with_column(x1, x2, b11, b21, b31);
    }

    /// Double shift from an explicit conjugate eigenvalue pair.
    pub(crate) fn scripted_double_step(&mut self, x1: usize, x2: usize, real: T, imag: T) {
        let a11 = self.a[(x1, x1)];
        let a21 = self.a[(x1 + 1, x1)];
        let a12 = self.a[(x1, x1 + 1)];
        let a22 = self.a[(x1 + 1, x1 + 1)];
        let a32 = self.a[(x1 + 2, x1 + 1)];

        let sum = real + real;
        let product = real * real + imag * imag;

        let b11 = (a11 * a11 - sum * a11 + product) + a12 * a21;
        let b21 = (a11 + a22 - sum) * a21;
        let b31 = a32 * a21;

        self.double_step_with_column(x1, x2, b11, b21, b31);
    }

    fn double_step_with_column(&mut self, x1: usize, x2: usize, b11: T, b21: T, b31: T) {
        if !self.double_reflect(x1, b11, b21, b31, T::zero(), false) {
            return;
        }
        self.reflect_q(x1, x1 + 3);

        // chase the 3x3 bulge down the sub-diagonal
        let mut i = x1;
        while i + 2 < x2 {
            if self.double_reflect_at(i) {
                self.reflect_q(i + 1, i + 4);
            }
            i += 1;
        }
        // the last one has to be a single step
        if x2 >= 2 && self.single_reflect_at(x2 - 2) {
            self.reflect_q(x2 - 1, x2 + 1);
        }
    }

    /// Single shift by an explicit (real) eigenvalue estimate.
    pub(crate) fn implicit_single_step(&mut self, x1: usize, x2: usize, value: T) {
        let b11 = self.a[(x1, x1)] - value;
        let b21 = self.a[(x1 + 1, x1)];
        let threshold = self.a[(x1, x1)].abs() * self.tol;
        if !self.single_reflect(x1, b11, b21, threshold, false) {
            return;
        }
        self.reflect_q(x1, x1 + 2);

        let mut i = x1;
        while i + 1 < x2 {
            if self.single_reflect_at(i) {
                self.reflect_q(i + 1, i + 3);
            }
            i += 1;
        }
    }

    /// Random shift of the same magnitude as the trailing diagonal entry,
    /// approaching it as the exceptional count grows so repeated eigenvalue
    /// clusters still break loose.
    pub(crate) fn exceptional_shift(&mut self, x1: usize, x2: usize) {
        let mut val = self.a[(x2, x2)].abs();
        if val == T::zero() {
            val = T::one();
        }
        self.state.note_exceptional();
        let p = 1.0 - 0.1_f64.powi(self.state.num_exceptional as i32);
        let f: T = cst(p + 2.0 * (1.0 - p) * (self.rng.gen::<f64>() - 0.5));
        val = val * f;
        if self.rng.gen::<bool>() {
            val = -val;
        }
        self.implicit_single_step(x1, x2, val);
    }

    // ── Reflectors ──────────────────────────────────────────────────

    fn double_reflect_at(&mut self, i: usize) -> bool {
        let a11 = self.a[(i + 1, i)];
        let a21 = self.a[(i + 2, i)];
        let a31 = self.a[(i + 3, i)];
        let threshold = self.a[(i, i)].abs() * self.tol;
        self.double_reflect(i + 1, a11, a21, a31, threshold, true)
    }

    /// Build and apply a 3-element reflector zeroing `(a21, a31)` against
    /// `a11` at rows `i..i+3`. Below-threshold columns are not reflected;
    /// their sub-diagonal entries are flushed to exact zero instead.
    fn double_reflect(
        &mut self,
        i: usize,
        mut a11: T,
        mut a21: T,
        mut a31: T,
        threshold: T,
        set: bool,
    ) -> bool {
        let max = a11.abs().max(a21.abs()).max(a31.abs());
        if max <= threshold {
            if set {
                self.a[(i, i - 1)] = T::zero();
                self.a[(i + 1, i - 1)] = T::zero();
                self.a[(i + 2, i - 1)] = T::zero();
            }
            return false;
        }
        a11 = a11 / max;
        a21 = a21 / max;
        a31 = a31 / max;

        let mut tau = (a11 * a11 + a21 * a21 + a31 * a31).sqrt();
        if a11 < T::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u[i] = T::one();
        self.u[i + 1] = a21 / div;
        self.u[i + 2] = a31 / div;
        self.gamma = div / tau;

        let (u, gamma) = (&self.u, self.gamma);
        reflect_rows(&mut self.a, u, gamma, i, i + 3, &mut self.temp);
        if set {
            self.a[(i, i - 1)] = -max * tau;
            self.a[(i + 1, i - 1)] = T::zero();
            self.a[(i + 2, i - 1)] = T::zero();
        }
        reflect_cols(&mut self.a, u, gamma, i, i + 3);
        true
    }

    fn single_reflect_at(&mut self, i: usize) -> bool {
        let a11 = self.a[(i + 1, i)];
        let a21 = self.a[(i + 2, i)];
        let threshold = self.a[(i, i)].abs() * self.tol;
        self.single_reflect(i + 1, a11, a21, threshold, true)
    }

    fn single_reflect(
        &mut self,
        i: usize,
        mut a11: T,
        mut a21: T,
        threshold: T,
        set: bool,
    ) -> bool {
        let max = a11.abs().max(a21.abs());
        if max <= threshold {
            if set {
                self.a[(i, i - 1)] = T::zero();
                self.a[(i + 1, i - 1)] = T::zero();
            }
            return false;
        }
        a11 = a11 / max;
        a21 = a21 / max;

        let mut tau = (a11 * a11 + a21 * a21).sqrt();
        if a11 < T::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u[i] = T::one();
        self.u[i + 1] = a21 / div;
        self.gamma = div / tau;

        let (u, gamma) = (&self.u, self.gamma);
        reflect_rows(&mut self.a, u, gamma, i, i + 2, &mut self.temp);
        if set {
            self.a[(i, i - 1)] = -max * tau;
            self.a[(i + 1, i - 1)] = T::zero();
        }
        reflect_cols(&mut self.a, u, gamma, i, i + 2);
        true
    }

    fn reflect_q(&mut self, w0: usize, w1: usize) {
        if let Some(q) = self.q.as_mut() {
            reflect_rows(q, &self.u, self.gamma, w0, w1, &mut self.temp);
        }
    }
}

/// `A <- (I - gamma·u·uᵀ)·A`, touching only rows `w0..w1`.
fn reflect_rows<T: FloatScalar>(
    a: &mut DenseMatrix<T>,
    u: &[T],
    gamma: T,
    w0: usize,
    w1: usize,
    temp: &mut [T],
) {
    let ncols = a.ncols();
    for t in temp[..ncols].iter_mut() {
        *t = T::zero();
    }
    for i in w0..w1 {
        let ui = u[i];
        for (t, &v) in temp[..ncols].iter_mut().zip(a.row(i)) {
            *t = *t + ui * v;
        }
    }
    for i in w0..w1 {
        let g = gamma * u[i];
        for (v, &t) in a.row_mut(i).iter_mut().zip(temp[..ncols].iter()) {
            *v = *v - g * t;
        }
    }
}

/// `A <- A·(I - gamma·u·uᵀ)`, touching only columns `w0..w1`.
fn reflect_cols<T: FloatScalar>(a: &mut DenseMatrix<T>, u: &[T], gamma: T, w0: usize, w1: usize) {
    for i in 0..a.nrows() {
        let row = a.row_mut(i);
        let mut sum = T::zero();
        for j in w0..w1 {
            sum = sum + row[j] * u[j];
        }
        let g = gamma * sum;
        for j in w0..w1 {
            row[j] = row[j] - g * u[j];
        }
    }
}
