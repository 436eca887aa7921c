//! Closed-form eigenvalues of 2×2 blocks.
//!
//! Every variant normalizes the block by its largest magnitude before the
//! quadratic solve. Without that, squaring the entries overflows (or
//! underflows to a meaningless zero discriminant) long before the input
//! itself is out of range.

use num_complex::Complex;

use crate::qr::cst;
use crate::traits::FloatScalar;

/// Eigenvalues of the symmetric block `[a11 a12; a12 a22]`, pre-scaled input.
///
/// Returns `(larger-by-trace, smaller)` as the pair `(λ₀, λ₁)` where
/// `λ₀ = tr/2 + r` and `λ₁ = tr/2 - r`.
#[inline]
pub(crate) fn sym_2x2<T: FloatScalar>(a11: T, a12: T, a22: T) -> (T, T) {
    let half: T = cst(0.5);
    let left = (a11 + a22) * half;
    let b = (a11 - a22) * half;
    let right = (b * b + a12 * a12).sqrt();
    (left + right, left - right)
}

/// Eigenvalues of a symmetric 2×2 block, normalized by its largest magnitude.
///
/// A zero block short-circuits to `(0, 0)` — the quadratic would otherwise
/// divide by zero scale.
pub(crate) fn sym_2x2_scaled<T: FloatScalar>(a11: T, a12: T, a22: T) -> (T, T) {
    let scale = a11.abs().max(a12.abs()).max(a22.abs());
    if scale == T::zero() {
        return (T::zero(), T::zero());
    }
    let (v0, v1) = sym_2x2(a11 / scale, a12 / scale, a22 / scale);
    (scale * v0, scale * v1)
}

/// Eigenvalues of a general 2×2 block `[a11 a12; a21 a22]`, normalized by
/// its largest magnitude.
///
/// A non-negative discriminant yields two real values; a negative one yields
/// a conjugate pair with the positive-imaginary member first.
pub(crate) fn general_2x2_scaled<T: FloatScalar>(
    a11: T,
    a12: T,
    a21: T,
    a22: T,
) -> (Complex<T>, Complex<T>) {
    let scale = a11.abs().max(a12.abs()).max(a21.abs()).max(a22.abs());
    if scale == T::zero() {
        return (Complex::new(T::zero(), T::zero()), Complex::new(T::zero(), T::zero()));
    }

    let a11 = a11 / scale;
    let a12 = a12 / scale;
    let a21 = a21 / scale;
    let a22 = a22 / scale;

    let half: T = cst(0.5);
    let left = (a11 + a22) * half;
    let width = (a11 - a22) * half;
    let inside = width * width + a12 * a21;

    if inside >= T::zero() {
        let r = inside.sqrt();
        (
            Complex::new(scale * (left + r), T::zero()),
            Complex::new(scale * (left - r), T::zero()),
        )
    } else {
        let r = (-inside).sqrt();
        (
            Complex::new(scale * left, scale * r),
            Complex::new(scale * left, -(scale * r)),
        )
    }
}
