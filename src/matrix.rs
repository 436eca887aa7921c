use core::ops::{Index, IndexMut};

use crate::traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};

/// Dynamically-sized heap-allocated dense matrix.
///
/// Row-major `Vec<T>` storage: element `(i, j)` lives at `data[i * ncols + j]`,
/// so a matrix row is a contiguous slice. The QR engines exploit this — plane
/// rotations and rank-1 reflector updates walk whole rows of the accumulator
/// matrices, which is why `U` and `V` are carried in transposed form.
///
/// # Examples
///
/// ```
/// use implicit_qr::DenseMatrix;
///
/// let a = DenseMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 3.0, 4.0]);
/// assert_eq!(a[(0, 1)], 2.0);
/// assert_eq!(a.nrows(), 2);
///
/// let id = DenseMatrix::eye(3, 0.0_f64);
/// assert_eq!(id[(1, 1)], 1.0);
/// assert_eq!(id[(1, 2)], 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    data: Vec<T>,
    nrows: usize,
    ncols: usize,
}

// ── Constructors ────────────────────────────────────────────────────

impl<T: Scalar> DenseMatrix<T> {
    /// Create an `nrows x ncols` matrix of zeros.
    ///
    /// The `_zero` parameter is only used for type inference.
    pub fn zeros(nrows: usize, ncols: usize, _zero: T) -> Self {
        Self {
            data: vec![T::zero(); nrows * ncols],
            nrows,
            ncols,
        }
    }

    /// Create an `n x n` identity matrix.
    pub fn eye(n: usize, _zero: T) -> Self {
        let mut m = Self::zeros(n, n, T::zero());
        for i in 0..n {
            m[(i, i)] = T::one();
        }
        m
    }

    /// Create a matrix from a flat slice in row-major order.
    ///
    /// Panics if `row_major.len() != nrows * ncols`.
    pub fn from_rows(nrows: usize, ncols: usize, row_major: &[T]) -> Self {
        assert_eq!(
            row_major.len(),
            nrows * ncols,
            "slice length {} does not match {}x{} matrix",
            row_major.len(),
            nrows,
            ncols,
        );
        Self {
            data: row_major.to_vec(),
            nrows,
            ncols,
        }
    }

    /// Create a matrix by calling `f(row, col)` for each element.
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j));
            }
        }
        Self { data, nrows, ncols }
    }

    /// Reset to the identity in place. Requires a square matrix.
    pub fn set_identity(&mut self) {
        assert_eq!(self.nrows, self.ncols, "set_identity requires a square matrix");
        for i in 0..self.nrows {
            for j in 0..self.ncols {
                self.data[i * self.ncols + j] = if i == j { T::one() } else { T::zero() };
            }
        }
    }
}

// ── Access ──────────────────────────────────────────────────────────

impl<T> DenseMatrix<T> {
    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Whether the matrix is square.
    #[inline]
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Row `i` as a contiguous slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Row `i` as a contiguous mutable slice.
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Mutable slices of two distinct rows simultaneously.
    ///
    /// Panics if `a == b`. Used by the rotation updates, which mix a pair of
    /// accumulator rows in one pass.
    pub fn two_rows_mut(&mut self, a: usize, b: usize) -> (&mut [T], &mut [T]) {
        assert_ne!(a, b, "two_rows_mut requires distinct rows");
        let w = self.ncols;
        if a < b {
            let (lo, hi) = self.data.split_at_mut(b * w);
            (&mut lo[a * w..a * w + w], &mut hi[..w])
        } else {
            let (lo, hi) = self.data.split_at_mut(a * w);
            let row_b = &mut lo[b * w..b * w + w];
            (&mut hi[..w], row_b)
        }
    }
}

// ── Arithmetic helpers ──────────────────────────────────────────────

impl<T: FloatScalar> DenseMatrix<T> {
    /// Matrix product `self * rhs`.
    pub fn mul(&self, rhs: &Self) -> Self {
        assert_eq!(self.ncols, rhs.nrows, "dimension mismatch in matrix multiply");
        let mut out = Self::zeros(self.nrows, rhs.ncols, T::zero());
        for i in 0..self.nrows {
            for k in 0..self.ncols {
                let aik = self[(i, k)];
                for j in 0..rhs.ncols {
                    out[(i, j)] = out[(i, j)] + aik * rhs[(k, j)];
                }
            }
        }
        out
    }

    /// Matrix-vector product `self * v`.
    pub fn mul_vec(&self, v: &[T]) -> Vec<T> {
        assert_eq!(self.ncols, v.len(), "dimension mismatch in matrix-vector multiply");
        let mut out = vec![T::zero(); self.nrows];
        for i in 0..self.nrows {
            let row = self.row(i);
            let mut sum = T::zero();
            for j in 0..self.ncols {
                sum = sum + row[j] * v[j];
            }
            out[i] = sum;
        }
        out
    }

    /// Transposed matrix-vector product `selfᵀ * v`.
    pub fn tr_mul_vec(&self, v: &[T]) -> Vec<T> {
        assert_eq!(self.nrows, v.len(), "dimension mismatch in matrix-vector multiply");
        let mut out = vec![T::zero(); self.ncols];
        for i in 0..self.nrows {
            let row = self.row(i);
            let vi = v[i];
            for j in 0..self.ncols {
                out[j] = out[j] + row[j] * vi;
            }
        }
        out
    }

    /// Transpose copy.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[(j, i)])
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let (row_a, row_b) = self.two_rows_mut(a, b);
        row_a.swap_with_slice(row_b);
    }

    /// Swap two columns in place.
    pub fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for i in 0..self.nrows {
            self.data.swap(i * self.ncols + a, i * self.ncols + b);
        }
    }
}

// ── Indexing and trait impls ────────────────────────────────────────

impl<T> Index<(usize, usize)> for DenseMatrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        &self.data[i * self.ncols + j]
    }
}

impl<T> IndexMut<(usize, usize)> for DenseMatrix<T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        &mut self.data[i * self.ncols + j]
    }
}

impl<T> MatrixRef<T> for DenseMatrix<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> &T {
        &self.data[row * self.ncols + col]
    }
}

impl<T> MatrixMut<T> for DenseMatrix<T> {
    #[inline]
    fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.data[row * self.ncols + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_layout() {
        let m = DenseMatrix::from_rows(2, 3, &[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_fn_accepts_stateful_closure() {
        let mut next = 0.0_f64;
        let m = DenseMatrix::from_fn(2, 2, |_, _| {
            next += 1.0;
            next
        });
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert_eq!(m.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn two_rows_mut_disjoint() {
        let mut m = DenseMatrix::from_rows(3, 2, &[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        {
            let (a, b) = m.two_rows_mut(2, 0);
            a.swap(0, 1);
            b[0] = -1.0;
        }
        assert_eq!(m.row(2), &[6.0, 5.0]);
        assert_eq!(m[(0, 0)], -1.0);
    }

    #[test]
    fn multiply_and_transpose() {
        let a = DenseMatrix::from_rows(2, 2, &[1.0_f64, 2.0, 3.0, 4.0]);
        let b = DenseMatrix::eye(2, 0.0_f64);
        assert_eq!(a.mul(&b), a);
        let at = a.transpose();
        assert_eq!(at[(0, 1)], 3.0);
        assert_eq!(a.mul_vec(&[1.0, 1.0]), vec![3.0, 7.0]);
        assert_eq!(a.tr_mul_vec(&[1.0, 1.0]), vec![4.0, 6.0]);
    }

    #[test]
    fn swap_columns_in_place() {
        let mut a = DenseMatrix::from_rows(2, 3, &[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
        a.swap_columns(0, 2);
        assert_eq!(a.row(0), &[3.0, 2.0, 1.0]);
        assert_eq!(a.row(1), &[6.0, 5.0, 4.0]);
    }
}
