//! Implicit-shift QR iteration on an upper-bidiagonal matrix (SVD core).
//!
//! Works on `B` through the eigenproblem of `BᵀB` without ever forming the
//! product: each step starts a bulge from the shifted leading 2x2 of `BᵀB`
//! and chases it off with alternating right (column) and left (row) plane
//! rotations, per Golub-Kahan. Right rotations accumulate into `Vt`, left
//! into `Ut`, both stored transposed so every update walks contiguous rows.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::matrix::DenseMatrix;
use crate::qr::small::sym_2x2;
use crate::qr::state::{IterState, Window};
use crate::qr::{cst, givens, rotate_rows, IterLimits, QrError};
use crate::traits::FloatScalar;

/// Scripted shifts are abandoned after this many fruitless steps.
const SCRIPT_GIVE_UP: usize = 10;
/// Steps spent probing with a zero shift before switching to Wilkinson.
const FINDING_ZEROS_STEPS: usize = 6;

/// Bidiagonal singular value engine.
///
/// Two-pass use mirrors the symmetric engine: a values-only run with
/// `fast_values` takes the closed-form 2x2 path, then a second run seeded
/// with [`with_script`](BidiagQr::with_script) replays the known singular
/// values as shifts while accumulating `Ut` and `Vt`.
pub struct BidiagQr<T> {
    diag: Vec<T>,
    off: Vec<T>,
    ut: Option<DenseMatrix<T>>,
    vt: Option<DenseMatrix<T>>,
    script: Option<Vec<T>>,
    on_script: bool,
    /// Probe with zero shifts first to reveal tiny singular values early.
    finding_zeros: bool,
    state: IterState,
    limits: IterLimits,
    tol: T,
    rng: SmallRng,
    fast_values: bool,
    /// Largest magnitude of the input band; zero means a zero matrix.
    max_value: T,
    bulge: T,
}

impl<T: FloatScalar> BidiagQr<T> {
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
        let mut max_value = T::zero();
        for v in diag.iter().chain(off.iter()) {
            if v.abs() > max_value {
                max_value = v.abs();
            }
        }
        Self {
            diag,
            off,
            ut: None,
            vt: None,
            script: None,
            on_script: false,
            finding_zeros: false,
            state: IterState::new(n),
            limits: IterLimits::banded(),
            tol: T::epsilon(),
            rng: SmallRng::seed_from_u64(0x34671e),
            fast_values: true,
            max_value,
            bulge: T::zero(),
        }
    }

    /// Attach the transposed left accumulator (row `i` is column `i` of `U`).
    pub fn with_ut(mut self, ut: DenseMatrix<T>) -> Self {
        assert!(ut.nrows() >= self.diag.len(), "Ut row count");
        self.ut = Some(ut);
        self.fast_values = false;
        self
    }

    /// Attach the transposed right accumulator.
    pub fn with_vt(mut self, vt: DenseMatrix<T>) -> Self {
        assert_eq!(vt.nrows(), self.diag.len(), "Vt row count");
        self.vt = Some(vt);
        self.fast_values = false;
        self
    }

    /// Replay previously computed singular values as shifts.
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

    /// Converged singular values, non-negative, in band positions (unsorted).
    pub fn singular_values(&self) -> &[T] {
        &self.diag
    }

    /// Release the band buffers and accumulators for reuse.
    pub fn into_parts(
        self,
    ) -> (Vec<T>, Vec<T>, Option<DenseMatrix<T>>, Option<DenseMatrix<T>>) {
        (self.diag, self.off, self.ut, self.vt)
    }

    /// Run the iteration to completion.
    pub fn process(&mut self) -> Result<(), QrError> {
        self.finding_zeros = !self.on_script;
        // a zero matrix is already decomposed
        if self.max_value == T::zero() {
            return Ok(());
        }
        loop {
            if self.state.steps > self.limits.max_iterations {
                return Err(QrError::NonConvergence);
            }
            let Some(w) = self.state.window() else {
                if !self.state.next_split() {
                    break;
                }
                continue;
            };
            if w.len() == 1 {
                self.state.shrink(1);
                self.state.reset_steps();
            } else if w.len() == 2 && self.fast_values {
                self.singular_2x2(w.x1);
                self.state.shrink(2);
                self.state.reset_steps();
            } else if self.state.steps - self.state.last_exceptional
                > self.limits.exceptional_threshold
            {
                if !self.window_is_finite(w) {
                    return Err(QrError::NumericBlowup);
                }
                self.exceptional_shift(w);
            } else if !self.handle_zeros(w) {
                if self.on_script {
                    self.scripted_step(w);
                } else {
                    self.dynamic_step(w);
                }
            }
        }
        self.make_values_positive();
        Ok(())
    }

    // ── Tick helpers ────────────────────────────────────────────────

    fn off_is_negligible(&self, i: usize) -> bool {
        let bottom = self.diag[i].abs() + self.diag[i + 1].abs();
        self.off[i].abs() <= self.tol * bottom
    }

    fn diag_is_negligible(&self, i: usize) -> bool {
        let bottom = self.diag[i + 1].abs() + self.off[i].abs();
        self.diag[i].abs() <= self.tol * bottom
    }

    fn window_is_finite(&self, w: Window) -> bool {
        self.diag[w.x1..=w.x2].iter().all(|v| v.is_finite())
            && self.off[w.x1..w.x2].iter().all(|v| v.is_finite())
    }

    /// Split at negligible off-diagonal entries, or push a negligible
    /// diagonal entry's neighbor off to the right and then split there.
    fn handle_zeros(&mut self, w: Window) -> bool {
        for i in (w.x1..w.x2).rev() {
            if self.off_is_negligible(i) {
                self.off[i] = T::zero();
                self.state.split_at(i);
                self.state.reset_steps();
                self.on_script = false;
                return true;
            }
        }
        for i in (w.x1..w.x2).rev() {
            if self.diag_is_negligible(i) {
                self.push_right(i);
                self.state.split_at(i);
                self.state.reset_steps();
                self.on_script = false;
                return true;
            }
        }
        false
    }

    /// Zero shifts first to reveal zero singular values, then Wilkinson.
    fn dynamic_step(&mut self, w: Window) {
        if self.finding_zeros && self.state.steps > FINDING_ZEROS_STEPS {
            self.finding_zeros = false;
        }
        let scale = self.bulge_scale(w);
        let lambda = if self.finding_zeros {
            T::zero()
        } else {
            self.wilkinson_shift(w, scale)
        };
        self.implicit_step(w, scale, lambda);
    }

    fn scripted_step(&mut self, w: Window) {
        if self.state.steps > SCRIPT_GIVE_UP {
            self.on_script = false;
            return;
        }
        let scale = self.bulge_scale(w);
        let s = self.script.as_ref().map(|v| v[w.x2]).unwrap_or_else(T::zero) / scale;
        self.implicit_step(w, scale, s * s);
    }

    fn exceptional_shift(&mut self, w: Window) {
        self.state.note_exceptional();
        let k = self.state.num_exceptional;
        let mag = (0.05 * k as f64).min(1.0);
        let angle = 2.0 * core::f64::consts::PI * (self.rng.gen::<f64>() - 0.5) * mag;
        self.implicit_step_by_angle(w, cst(angle));
    }

    /// Common scale for the shift and the bulge-creation step. Without it a
    /// large shift gets multiplied by the scale twice and overflows.
    fn bulge_scale(&self, w: Window) -> T {
        self.diag[w.x1].abs().max(self.off[w.x1].abs())
    }

    /// Wilkinson shift for `BᵀB`: the eigenvalue of its trailing 2x2
    /// closest to the bottom entry, at the supplied scale.
    fn wilkinson_shift(&self, w: Window, scale: T) -> T {
        let (a11, a12, a22) = if w.len() > 2 {
            let d1 = self.diag[w.x2 - 1] / scale;
            let o1 = self.off[w.x2 - 2] / scale;
            let d2 = self.diag[w.x2] / scale;
            let o2 = self.off[w.x2 - 1] / scale;
            (o1 * o1 + d1 * d1, o2 * d1, o2 * o2 + d2 * d2)
        } else {
            let a = self.diag[w.x2 - 1] / scale;
            let b = self.off[w.x2 - 1] / scale;
            let c = self.diag[w.x2] / scale;
            (a * a, a * b, b * b + c * c)
        };
        let (l0, l1) = sym_2x2(a11, a12, a22);
        if (l0 - a22).abs() < (l1 - a22).abs() {
            l0
        } else {
            l1
        }
    }

    /// Closed-form singular values of the trailing 2x2, written in place.
    /// The sign of a negative "value" is kept; it is fixed at the end.
    fn singular_2x2(&mut self, x1: usize) {
        let b11 = self.diag[x1];
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];
        let scale = b11.abs().max(b12.abs()).max(b22.abs());
        // all-zero block: nothing to solve
        if scale == T::zero() {
            return;
        }
        let b11 = b11 / scale;
        let b12 = b12 / scale;
        let b22 = b22 / scale;
        let (l0, l1) = sym_2x2(b11 * b11, b11 * b12, b12 * b12 + b22 * b22);
        self.off[x1] = T::zero();
        self.diag[x1] = scale * l0.sqrt();
        self.diag[x1 + 1] = l1.signum() * scale * l1.abs().sqrt();
    }

    fn make_values_positive(&mut self) {
        for i in 0..self.diag.len() {
            if self.diag[i] < T::zero() {
                self.diag[i] = -self.diag[i];
                if let Some(ut) = self.ut.as_mut() {
                    for v in ut.row_mut(i) {
                        *v = -*v;
                    }
                }
            }
        }
    }

    // ── Bulge chase ─────────────────────────────────────────────────

    fn implicit_step(&mut self, w: Window, scale: T, lambda: T) {
        let b11 = self.diag[w.x1];
        let b12 = self.off[w.x1];
        let u1 = (b11 / scale) * (b11 / scale) - lambda;
        let u2 = (b12 / scale) * (b11 / scale);
        let (c, s) = givens(u1, u2);
        self.chase(w, c, s);
    }

    fn implicit_step_by_angle(&mut self, w: Window, theta: T) {
        self.chase(w, theta.cos(), theta.sin());
    }

    fn chase(&mut self, w: Window, c: T, s: T) {
        self.create_bulge(w.x1, c, s);
        let mut i = w.x1;
        while i < w.x2 - 1 && self.bulge != T::zero() {
            self.remove_bulge_left(i, true);
            if self.bulge == T::zero() {
                break;
            }
            self.remove_bulge_right(i);
            i += 1;
        }
        if self.bulge != T::zero() {
            self.remove_bulge_left(w.x2 - 1, false);
        }
        self.state.count_step();
    }

    /// Right rotation on the leading column pair; starts the bulge below
    /// the diagonal.
    fn create_bulge(&mut self, x1: usize, c: T, s: T) {
        let b11 = self.diag[x1];
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];
        self.diag[x1] = b11 * c + b12 * s;
        self.off[x1] = b12 * c - b11 * s;
        self.diag[x1 + 1] = b22 * c;
        self.bulge = b22 * s;
        if let Some(vt) = self.vt.as_mut() {
            rotate_rows(vt, x1, x1 + 1, c, s);
        }
    }

    /// Left rotation zeroing the bulge below `diag[i]`; spills above the
    /// band when `not_last`.
    fn remove_bulge_left(&mut self, i: usize, not_last: bool) {
        let b11 = self.diag[i];
        let b12 = self.off[i];
        let b22 = self.diag[i + 1];
        let (c, s) = givens(b11, self.bulge);
        self.diag[i] = c * b11 + s * self.bulge;
        self.off[i] = c * b12 + s * b22;
        self.diag[i + 1] = c * b22 - s * b12;
        if not_last {
            let b23 = self.off[i + 1];
            self.bulge = s * b23;
            self.off[i + 1] = c * b23;
        }
        if let Some(ut) = self.ut.as_mut() {
            rotate_rows(ut, i, i + 1, c, s);
        }
    }

    /// Right rotation zeroing the bulge above the band; spills below again.
    fn remove_bulge_right(&mut self, i: usize) {
        let b12 = self.off[i];
        let b22 = self.diag[i + 1];
        let b23 = self.off[i + 1];
        let (c, s) = givens(b12, self.bulge);
        self.off[i] = b12 * c + self.bulge * s;
        self.diag[i + 1] = b22 * c + b23 * s;
        self.off[i + 1] = b23 * c - b22 * s;
        let b33 = self.diag[i + 2];
        self.diag[i + 2] = b33 * c;
        self.bulge = b33 * s;
        if let Some(vt) = self.vt.as_mut() {
            rotate_rows(vt, i + 1, i + 2, c, s);
        }
    }

    // ── Zero diagonal ───────────────────────────────────────────────

    /// A zero diagonal entry leaves a lone off-diagonal to its right; chase
    /// that entry off the end of the matrix with left rotations so the
    /// problem decouples at `row`.
    fn push_right(&mut self, row: usize) {
        if self.off_is_negligible(row) {
            self.off[row] = T::zero();
            return;
        }
        let n = self.diag.len();
        let b11 = self.off[row];
        let b21 = self.diag[row + 1];
        let (c, s) = givens(b21, -b11);
        self.off[row] = T::zero();
        self.diag[row + 1] = b21 * c - b11 * s;
        if row + 2 < n {
            let b22 = self.off[row + 1];
            self.off[row + 1] = b22 * c;
            self.bulge = b22 * s;
        } else {
            self.bulge = T::zero();
        }
        if let Some(ut) = self.ut.as_mut() {
            rotate_rows(ut, row, row + 1, c, s);
        }

        let mut offset = 2;
        while row + offset < n && self.bulge != T::zero() {
            let b11 = self.bulge;
            let b12 = self.diag[row + offset];
            let (c, s) = givens(b12, -b11);
            self.diag[row + offset] = b12 * c - b11 * s;
            if row + offset < n - 1 {
                let b22 = self.off[row + offset];
                self.off[row + offset] = b22 * c;
                self.bulge = b22 * s;
            } else {
                self.bulge = T::zero();
            }
            if let Some(ut) = self.ut.as_mut() {
                rotate_rows(ut, row, row + offset, c, s);
            }
            offset += 1;
        }
    }
}
