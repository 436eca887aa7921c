//! Implicit-shift QR iteration engines.
//!
//! Three variants share one control skeleton (shift → bulge chase → deflate
//! over a shrinking active window, with an explicit split stack):
//!
//! - [`TridiagQr`] — symmetric tridiagonal, single Wilkinson shift;
//! - [`BidiagQr`] — bidiagonal (Golub-Kahan), shifts taken from `BᵀB`;
//! - [`HessenbergQr`] — upper Hessenberg, Francis double shift, with
//!   eigenvector back-substitution in [`EigenvectorExtractor`].
//!
//! Each engine owns its reduced-form buffers (moved in, recoverable with
//! `into_parts`) and optionally one or two accumulator matrices that every
//! rotation or reflection is also applied to.

pub(crate) mod bidiag;
pub(crate) mod hessenberg;
pub(crate) mod small;
pub(crate) mod state;
pub(crate) mod tridiag;
pub(crate) mod vectors;

pub use bidiag::BidiagQr;
pub use hessenberg::HessenbergQr;
pub use tridiag::TridiagQr;
pub use vectors::EigenvectorExtractor;

use crate::traits::FloatScalar;

/// Errors from the QR iteration engines and decomposition wrappers.
///
/// Expected numerical failures are values, never panics: the caller of a
/// failed decomposition must treat its output buffers as undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrError {
    /// Step budget exhausted without deflating the current window.
    NonConvergence,
    /// An iterate became NaN or infinite.
    NumericBlowup,
    /// Non-square input to an eigenvalue decomposition.
    InvalidShape,
    /// Singular leading block during eigenvector back-substitution.
    /// Eigenvalues computed before the failure remain valid.
    SingularInput,
}

impl core::fmt::Display for QrError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            QrError::NonConvergence => write!(f, "QR iteration did not converge"),
            QrError::NumericBlowup => write!(f, "iterate became NaN or infinite"),
            QrError::InvalidShape => write!(f, "matrix must be square"),
            QrError::SingularInput => {
                write!(f, "singular block during eigenvector extraction")
            }
        }
    }
}

impl std::error::Error for QrError {}

/// Iteration budget for one engine run.
///
/// `steps` is reset every time a value converges or the window splits, so
/// `max_iterations` is a per-window budget — the total work scales with the
/// number of rows remaining, roughly "N iterations per eigenvalue".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterLimits {
    /// Steps allowed on one window before giving up.
    pub max_iterations: usize,
    /// Steps without deflation before an exceptional shift is forced.
    pub exceptional_threshold: usize,
}

impl IterLimits {
    /// Budget used by the tridiagonal and bidiagonal engines.
    pub const fn banded() -> Self {
        Self {
            max_iterations: 15 * 100,
            exceptional_threshold: 15,
        }
    }

    /// Budget used by the Hessenberg double-shift engine.
    pub const fn hessenberg() -> Self {
        Self {
            max_iterations: 20 * 20,
            exceptional_threshold: 20,
        }
    }
}

/// A plane rotation with its products cached.
///
/// One rotation touches several band entries; computing `c²`, `s²` and `cs`
/// once per rotation instead of per entry matters in the chase loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rotation<T> {
    pub c: T,
    pub s: T,
    pub c2: T,
    pub s2: T,
    pub cs: T,
}

impl<T: FloatScalar> Rotation<T> {
    /// Rotation zeroing `rise` against `run`: `[c s; -s c]·[run; rise] = [r; 0]`.
    ///
    /// Formed from the larger of the two ratios so the intermediate never
    /// exceeds one in magnitude.
    pub fn from_run_rise(run: T, rise: T) -> Self {
        if rise.abs() > run.abs() {
            let k = run / rise;
            let bottom = T::one() + k * k;
            let bottom_sq = bottom.sqrt();
            Self {
                s2: T::one() / bottom,
                c2: k * k / bottom,
                cs: k / bottom,
                s: T::one() / bottom_sq,
                c: k / bottom_sq,
            }
        } else {
            let t = rise / run;
            let bottom = T::one() + t * t;
            let bottom_sq = bottom.sqrt();
            Self {
                c2: T::one() / bottom,
                s2: t * t / bottom,
                cs: t / bottom,
                c: T::one() / bottom_sq,
                s: t / bottom_sq,
            }
        }
    }

    /// Rotation by an explicit angle. Used only by exceptional shifts.
    pub fn from_angle(theta: T) -> Self {
        let c = theta.cos();
        let s = theta.sin();
        Self {
            c,
            s,
            c2: c * c,
            s2: s * s,
            cs: c * s,
        }
    }
}

/// Givens pair `(c, s)` with `[c s; -s c]·[a; b] = [r; 0]`.
///
/// The plain form used where the squares are not reused.
#[inline]
pub(crate) fn givens<T: FloatScalar>(a: T, b: T) -> (T, T) {
    if b == T::zero() {
        (T::one(), T::zero())
    } else if b.abs() > a.abs() {
        let t = a / b;
        let s = T::one() / (T::one() + t * t).sqrt();
        (s * t, s)
    } else {
        let t = b / a;
        let c = T::one() / (T::one() + t * t).sqrt();
        (c, c * t)
    }
}

/// Apply `[c s; -s c]` to rows `m` and `n` of a transposed accumulator.
///
/// Row-major storage makes this two contiguous passes, which is the reason
/// the engines carry their accumulators transposed.
pub(crate) fn rotate_rows<T: FloatScalar>(
    q: &mut crate::matrix::DenseMatrix<T>,
    m: usize,
    n: usize,
    c: T,
    s: T,
) {
    let (row_m, row_n) = q.two_rows_mut(m, n);
    for (a, b) in row_m.iter_mut().zip(row_n.iter_mut()) {
        let (ta, tb) = (*a, *b);
        *a = c * ta + s * tb;
        *b = c * tb - s * ta;
    }
}

/// Promote an `f64` constant into the working scalar type.
///
/// Infallible for the `f32`/`f64` types this crate targets.
#[inline]
pub(crate) fn cst<T: FloatScalar>(v: f64) -> T {
    T::from(v).expect("float constant must be representable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_zeroes_rise() {
        let rot = Rotation::from_run_rise(3.0_f64, 4.0);
        // [c s; -s c] * [3; 4] = [5; 0]
        assert!((rot.c * 3.0 + rot.s * 4.0 - 5.0).abs() < 1e-12);
        assert!((-rot.s * 3.0 + rot.c * 4.0).abs() < 1e-12);
        assert!((rot.c2 - rot.c * rot.c).abs() < 1e-15);
        assert!((rot.s2 - rot.s * rot.s).abs() < 1e-15);
        assert!((rot.cs - rot.c * rot.s).abs() < 1e-15);
    }

    #[test]
    fn givens_zeroes_second_entry() {
        let (c, s) = givens(1.0_f64, -2.0);
        assert!((-s * 1.0 + c * -2.0).abs() < 1e-12);
        assert!((c * c + s * s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn givens_zero_b() {
        assert_eq!(givens(5.0_f64, 0.0), (1.0, 0.0));
    }
}
