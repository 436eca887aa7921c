//! # implicit-qr
//!
//! Implicit-shift QR iteration for dense eigenvalue and singular value
//! problems: symmetric and general eigendecompositions, and the SVD.
//!
//! ## Quick start
//!
//! ```
//! use implicit_qr::{DenseMatrix, SymmetricEigen};
//!
//! let a = DenseMatrix::from_rows(2, 2, &[2.0_f64, -1.0, -1.0, 2.0]);
//! let eig = SymmetricEigen::new(&a).unwrap();
//! assert!((eig.eigenvalues()[0] - 1.0).abs() < 1e-10); // then 3.0
//! ```
//!
//! ## Modules
//!
//! - [`matrix`] — Heap-allocated `DenseMatrix<T>` with runtime dimensions,
//!   `Vec<T>` row-major storage. Implements [`MatrixRef`] / [`MatrixMut`],
//!   so the reduction free functions work on it and on any other storage
//!   that does the same.
//!
//! - [`reduce`] — Householder reductions to condensed form: symmetric to
//!   tridiagonal, rectangular to bidiagonal, square to upper Hessenberg.
//!   Each optionally accumulates the orthogonal factor.
//!
//! - [`qr`] — The iteration engines ([`TridiagQr`], [`BidiagQr`],
//!   [`HessenbergQr`], [`EigenvectorExtractor`]). All three share one
//!   control skeleton: shift, bulge chase, deflation over a shrinking
//!   window with an explicit split stack. Values-only runs skip
//!   accumulator work; a converged run can be replayed with its values
//!   as shifts to attach vectors cheaply.
//!
//! - [`decomposition`] — The high-level wrappers: [`SymmetricEigen`],
//!   [`Svd`], [`Eigen`]. Reduction plus a two-pass engine run, with
//!   sorted output and sign-fixed singular values.
//!
//! - [`traits`] — [`Scalar`] and [`FloatScalar`] element bounds, and the
//!   [`MatrixRef`] / [`MatrixMut`] access traits.
//!
//! Expected numerical failures (non-convergence, NaN blowup, singular
//! blocks during eigenvector extraction) are reported as [`QrError`]
//! values, never panics.

pub mod decomposition;
pub mod matrix;
pub mod qr;
pub mod reduce;
pub mod traits;

pub use decomposition::{Eigen, Svd, SymmetricEigen};
pub use matrix::DenseMatrix;
pub use qr::{
    BidiagQr, EigenvectorExtractor, HessenbergQr, IterLimits, QrError, TridiagQr,
};
pub use traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};
