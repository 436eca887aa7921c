//! Implicit-shift QR iteration on a symmetric tridiagonal matrix.
//!
//! The matrix is carried as two vectors, `diag` and `off`, and never
//! materialized. Each step forms a plane rotation from the shifted leading
//! 2x2 of the active window and chases the resulting bulge down the band;
//! converged eigenvalues stay in `diag` in place, so no separate output
//! buffer is needed. An optional row-major accumulator `Qt` receives every
//! rotation, yielding the eigenvectors as its rows.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::matrix::DenseMatrix;
use crate::qr::small::sym_2x2_scaled;
use crate::qr::state::{IterState, Window};
use crate::qr::{cst, rotate_rows, IterLimits, QrError, Rotation};
use crate::traits::FloatScalar;

/// Scripted shifts are abandoned after this many fruitless steps on one
/// window and the engine falls back to the Wilkinson shift.
const SCRIPT_GIVE_UP: usize = 10;

/// Symmetric tridiagonal eigenvalue engine.
///
/// Two-pass use: a values-only run (no accumulator) takes the fast paths,
/// then a second engine seeded with [`with_script`](TridiagQr::with_script)
/// and [`with_q`](TridiagQr::with_q) replays the known eigenvalues as shifts
/// while accumulating rotations, which converges in one or two steps per
/// value.
pub struct TridiagQr<T> {
    diag: Vec<T>,
    off: Vec<T>,
    /// Transposed accumulator: row `i` is the `i`-th eigenvector.
    q: Option<DenseMatrix<T>>,
    script: Option<Vec<T>>,
    on_script: bool,
    state: IterState,
    limits: IterLimits,
    tol: T,
    rng: SmallRng,
    /// Solve trailing 2x2 windows in closed form. Only valid without an
    /// accumulator, where the rotations do not need to be realized.
    fast_values: bool,
    bulge: T,
}

impl<T: FloatScalar> TridiagQr<T> {
    /// Take ownership of the band. `off` must be one shorter than `diag`
    /// (both may be empty).
    pub fn new(diag: Vec<T>, off: Vec<T>) -> Self {
        assert!(
            diag.is_empty() && off.is_empty() || off.len() + 1 == diag.len(),
            "off-diagonal length {} does not match diagonal length {}",
            off.len(),
            diag.len(),
        );
        let n = diag.len();
        Self {
            diag,
            off,
            q: None,
            script: None,
            on_script: false,
            state: IterState::new(n),
            limits: IterLimits::banded(),
            tol: T::epsilon(),
            rng: SmallRng::seed_from_u64(0x34671e),
            fast_values: true,
            bulge: T::zero(),
        }
    }

    /// Attach a transposed accumulator; every rotation is applied to its
    /// rows. Disables the closed-form 2x2 fast path.
    pub fn with_q(mut self, qt: DenseMatrix<T>) -> Self {
        assert_eq!(qt.nrows(), self.diag.len(), "accumulator row count");
        self.q = Some(qt);
        self.fast_values = false;
        self
    }

    /// Replay previously computed eigenvalues (in their in-place positions
    /// from a values-only run) as shifts.
    pub fn with_script(mut self, values: Vec<T>) -> Self {
        assert_eq!(values.len(), self.diag.len(), "script length");
        self.on_script = !values.is_empty();
        self.script = Some(values);
        self
    }

    /// Override the default iteration budget.
    pub fn with_limits(mut self, limits: IterLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Converged eigenvalues, in band positions (unsorted).
    pub fn eigenvalues(&self) -> &[T] {
        &self.diag
    }

    /// Release the band buffers and the accumulator for reuse.
    pub fn into_parts(self) -> (Vec<T>, Vec<T>, Option<DenseMatrix<T>>) {
        (self.diag, self.off, self.q)
    }

    /// Run the iteration to completion.
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
            if w.len() == 1 {
                // converged value already sits in diag[x1]
                self.state.shrink(1);
                self.state.reset_steps();
            } else if w.len() == 2 && self.fast_values {
                self.eigenvalue_2x2(w.x1);
                self.state.shrink(2);
                self.state.reset_steps();
            } else if self.state.steps - self.state.last_exceptional
                > self.limits.exceptional_threshold
            {
                if !self.window_is_finite(w) {
                    return Err(QrError::NumericBlowup);
                }
                self.exceptional_shift(w);
            } else if self.off_is_negligible(w.x2 - 1) {
                self.off[w.x2 - 1] = T::zero();
                self.state.shrink(1);
                self.state.reset_steps();
            } else {
                self.step(w);
            }
        }
    }

    // ── Tick helpers ────────────────────────────────────────────────

    /// Relative negligibility of boundary `i` against its neighbors.
    fn off_is_negligible(&self, i: usize) -> bool {
        let bottom = self.diag[i].abs() + self.diag[i + 1].abs();
        self.off[i].abs() <= self.tol * bottom
    }

    fn window_is_finite(&self, w: Window) -> bool {
        self.diag[w.x1..=w.x2].iter().all(|v| v.is_finite())
            && self.off[w.x1..w.x2].iter().all(|v| v.is_finite())
    }

    /// Closed-form eigenvalues of the trailing 2x2, written in place.
    fn eigenvalue_2x2(&mut self, x1: usize) {
        let (l0, l1) = sym_2x2_scaled(self.diag[x1], self.off[x1], self.diag[x1 + 1]);
        self.diag[x1] = l0;
        self.diag[x1 + 1] = l1;
        self.off[x1] = T::zero();
    }

    /// Scan for a decoupling boundary; if none, one implicit shifted step.
    fn step(&mut self, w: Window) {
        for i in (w.x1..w.x2 - 1).rev() {
            if self.off_is_negligible(i) {
                self.off[i] = T::zero();
                self.state.split_at(i);
                self.state.reset_steps();
                self.on_script = false;
                return;
            }
        }
        let lambda = if self.on_script {
            if self.state.steps > SCRIPT_GIVE_UP {
                self.on_script = false;
                return;
            }
            self.script.as_ref().map(|s| s[w.x2]).unwrap_or_else(T::zero)
        } else {
            self.wilkinson_shift(w)
        };
        let rot = Rotation::from_run_rise(self.diag[w.x1] - lambda, self.off[w.x1]);
        self.implicit_step(w, rot);
    }

    /// Eigenvalue of the trailing 2x2 closest to `diag[x2]`.
    fn wilkinson_shift(&self, w: Window) -> T {
        let c = self.diag[w.x2];
        let (l0, l1) = sym_2x2_scaled(self.diag[w.x2 - 1], self.off[w.x2 - 1], c);
        if (l0 - c).abs() < (l1 - c).abs() {
            l0
        } else {
            l1
        }
    }

    fn exceptional_shift(&mut self, w: Window) {
        let k = self.state.num_exceptional + 1;
        let mag = (0.05 * k as f64).min(1.0);
        let angle: T = cst(core::f64::consts::PI * (self.rng.gen::<f64>() - 0.5) * mag);
        self.implicit_step(w, Rotation::from_angle(angle));
        self.state.note_exceptional();
    }

    // ── Bulge chase ─────────────────────────────────────────────────

    fn implicit_step(&mut self, w: Window, rot: Rotation<T>) {
        if w.len() == 2 {
            self.create_bulge_2x2(w.x1, rot);
        } else {
            self.create_bulge(w, rot);
            let mut i = w.x1;
            while i < w.x2 - 2 && self.bulge != T::zero() {
                self.remove_bulge(i);
                i += 1;
            }
            if self.bulge != T::zero() {
                self.remove_bulge_end(w.x2 - 2);
            }
        }
        self.state.count_step();
    }

    /// Apply the similarity rotation to the leading 2x2 of the window,
    /// spilling the bulge into `off[x1+1]`'s neighbor.
    fn create_bulge(&mut self, w: Window, r: Rotation<T>) {
        let two: T = cst(2.0);
        let a11 = self.diag[w.x1];
        let a22 = self.diag[w.x1 + 1];
        let a12 = self.off[w.x1];
        self.diag[w.x1] = r.c2 * a11 + two * r.cs * a12 + r.s2 * a22;
        self.diag[w.x1 + 1] = r.c2 * a22 - two * r.cs * a12 + r.s2 * a11;
        self.off[w.x1] = a12 * (r.c2 - r.s2) + r.cs * (a22 - a11);
        let a23 = self.off[w.x1 + 1];
        self.bulge = r.s * a23;
        self.off[w.x1 + 1] = r.c * a23;
        self.rotate_q_rows(w.x1, w.x1 + 1, r.c, r.s);
    }

    /// Rotation zeroing the bulge against `off[i]`, advancing it one row.
    fn remove_bulge(&mut self, i: usize) {
        let r = Rotation::from_run_rise(self.off[i], self.bulge);
        let two: T = cst(2.0);
        let a22 = self.diag[i + 1];
        let a33 = self.diag[i + 2];
        let a23 = self.off[i + 1];
        self.off[i] = self.off[i] * r.c + self.bulge * r.s;
        self.diag[i + 1] = r.c2 * a22 + two * r.cs * a23 + r.s2 * a33;
        self.diag[i + 2] = r.c2 * a33 - two * r.cs * a23 + r.s2 * a22;
        self.off[i + 1] = a23 * (r.c2 - r.s2) + r.cs * (a33 - a22);
        let a34 = self.off[i + 2];
        self.bulge = r.s * a34;
        self.off[i + 2] = r.c * a34;
        self.rotate_q_rows(i + 1, i + 2, r.c, r.s);
    }

    /// Final chase step at the window bottom; nothing left to spill into.
    fn remove_bulge_end(&mut self, i: usize) {
        let r = Rotation::from_run_rise(self.off[i], self.bulge);
        let two: T = cst(2.0);
        let a22 = self.diag[i + 1];
        let a33 = self.diag[i + 2];
        let a23 = self.off[i + 1];
        self.off[i] = self.off[i] * r.c + self.bulge * r.s;
        self.diag[i + 1] = r.c2 * a22 + two * r.cs * a23 + r.s2 * a33;
        self.diag[i + 2] = r.c2 * a33 - two * r.cs * a23 + r.s2 * a22;
        self.off[i + 1] = a23 * (r.c2 - r.s2) + r.cs * (a33 - a22);
        self.bulge = T::zero();
        self.rotate_q_rows(i + 1, i + 2, r.c, r.s);
    }

    /// Two-row window: the rotation completes the similarity, no chase.
    fn create_bulge_2x2(&mut self, x1: usize, r: Rotation<T>) {
        let two: T = cst(2.0);
        let a11 = self.diag[x1];
        let a22 = self.diag[x1 + 1];
        let a12 = self.off[x1];
        self.diag[x1] = r.c2 * a11 + two * r.cs * a12 + r.s2 * a22;
        self.diag[x1 + 1] = r.c2 * a22 - two * r.cs * a12 + r.s2 * a11;
        self.off[x1] = a12 * (r.c2 - r.s2) + r.cs * (a22 - a11);
        self.rotate_q_rows(x1, x1 + 1, r.c, r.s);
    }

    fn rotate_q_rows(&mut self, m: usize, n: usize, c: T, s: T) {
        if let Some(q) = self.q.as_mut() {
            rotate_rows(q, m, n, c, s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{} vs {} (tol {})", a, b, tol);
    }

    fn sorted_values(qr: &TridiagQr<f64>) -> Vec<f64> {
        let mut v = qr.eigenvalues().to_vec();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v
    }

    #[test]
    fn known_three_by_three() {
        // diag [2 2 2], off [1 1]: eigenvalues 2 - sqrt(2), 2, 2 + sqrt(2)
        let mut qr = TridiagQr::new(vec![2.0, 2.0, 2.0], vec![1.0, 1.0]);
        qr.process().unwrap();
        let v = sorted_values(&qr);
        let r = 2.0_f64.sqrt();
        assert_near(v[0], 2.0 - r, 1e-5);
        assert_near(v[1], 2.0, 1e-5);
        assert_near(v[2], 2.0 + r, 1e-5);
    }

    #[test]
    fn trivial_sizes() {
        let mut qr = TridiagQr::<f64>::new(vec![], vec![]);
        qr.process().unwrap();
        assert!(qr.eigenvalues().is_empty());

        let mut qr = TridiagQr::new(vec![7.0], vec![]);
        qr.process().unwrap();
        assert_near(qr.eigenvalues()[0], 7.0, 0.0);

        // [3 1; 1 3] has eigenvalues 4 and 2
        let mut qr = TridiagQr::new(vec![3.0, 3.0], vec![1.0]);
        qr.process().unwrap();
        let v = sorted_values(&qr);
        assert_near(v[0], 2.0, 1e-12);
        assert_near(v[1], 4.0, 1e-12);
    }

    #[test]
    fn decoupled_blocks_split() {
        // zero boundary decouples into [1 2; 2 1] and [5]
        let mut qr = TridiagQr::new(vec![1.0, 1.0, 5.0], vec![2.0, 0.0]);
        qr.process().unwrap();
        let v = sorted_values(&qr);
        assert_near(v[0], -1.0, 1e-10);
        assert_near(v[1], 3.0, 1e-10);
        assert_near(v[2], 5.0, 1e-10);
    }

    #[test]
    fn scripted_pass_accumulates_vectors() {
        let diag = vec![2.0, 2.0, 2.0];
        let off = vec![1.0, 1.0];

        let mut values = TridiagQr::new(diag.clone(), off.clone());
        values.process().unwrap();
        let script = values.eigenvalues().to_vec();

        let mut vectors = TridiagQr::new(diag.clone(), off.clone())
            .with_q(DenseMatrix::eye(3, 0.0))
            .with_script(script);
        vectors.process().unwrap();

        let lambda = vectors.eigenvalues().to_vec();
        let (_, _, qt) = vectors.into_parts();
        let qt = qt.unwrap();

        // T * q_i = lambda_i * q_i for every accumulator row
        let t = DenseMatrix::from_rows(
            3,
            3,
            &[
                diag[0], off[0], 0.0, //
                off[0], diag[1], off[1], //
                0.0, off[1], diag[2],
            ],
        );
        for i in 0..3 {
            let q_i = qt.row(i);
            let t_q = t.mul_vec(q_i);
            for j in 0..3 {
                assert_near(t_q[j], lambda[i] * q_i[j], 1e-10);
            }
        }
        // rows orthonormal
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = qt.row(i).iter().zip(qt.row(j)).map(|(a, b)| a * b).sum();
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_near(dot, expect, 1e-10);
            }
        }
    }

    #[test]
    fn idempotent_across_instances() {
        let diag = vec![4.0, -1.0, 0.5, 3.0, 2.0];
        let off = vec![1.0, 0.25, -2.0, 0.75];
        let mut a = TridiagQr::new(diag.clone(), off.clone());
        a.process().unwrap();
        let mut b = TridiagQr::new(diag, off);
        b.process().unwrap();
        assert_eq!(sorted_values(&a), sorted_values(&b));
    }

    #[test]
    fn budget_exhaustion_is_an_error() {
        let limits = IterLimits {
            max_iterations: 0,
            exceptional_threshold: 15,
        };
        let mut qr =
            TridiagQr::new(vec![2.0, 2.0, 2.0], vec![1.0, 1.0]).with_limits(limits);
        // the first real step pushes steps past the zero budget
        assert!(matches!(qr.process(), Err(QrError::NonConvergence)));
    }
}
