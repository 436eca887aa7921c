use core::fmt::Debug;
use num_traits::{Float, Num, NumCast, One, Zero};

/// Trait for types that can be used as matrix elements.
///
/// Blanket-implemented for all types satisfying the bounds.
pub trait Scalar: Copy + PartialEq + Debug + Zero + One + Num {}

impl<T: Copy + PartialEq + Debug + Zero + One + Num> Scalar for T {}

/// Trait for real floating-point matrix elements.
///
/// Required by everything iterative in this crate: shifts, rotations and
/// negligibility tests all need `sqrt`, `abs` and machine epsilon.
/// Covers `f32` and `f64`.
pub trait FloatScalar: Scalar + Float + NumCast {}

impl<T: Scalar + Float + NumCast> FloatScalar for T {}

/// Read-only access to a matrix-like type.
///
/// The reduction collaborators are written against this seam rather than a
/// concrete storage type.
pub trait MatrixRef<T> {
    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
    fn get(&self, row: usize, col: usize) -> &T;
}

/// Mutable access to a matrix-like type.
///
/// Extends [`MatrixRef`] with mutable element access, enabling in-place
/// algorithms (Householder reduction, rotation accumulation) to work
/// generically.
pub trait MatrixMut<T>: MatrixRef<T> {
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T;
}
