//! Householder reductions to the banded and Hessenberg forms the QR engines
//! iterate on.
//!
//! All three run in place over the trait seams, so callers can bring any
//! row-major storage. The accumulators are optional; values-only
//! decompositions skip them.

use crate::matrix::DenseMatrix;
use crate::qr::cst;
use crate::traits::{FloatScalar, MatrixMut, MatrixRef};

fn set_identity<T: FloatScalar>(q: &mut impl MatrixMut<T>) {
    for i in 0..q.nrows() {
        for j in 0..q.ncols() {
            *q.get_mut(i, j) = if i == j { T::one() } else { T::zero() };
        }
    }
}

/// Householder tridiagonalization of a symmetric matrix.
///
/// On return `diag` and `off` hold the tridiagonal form `T` and, when
/// `compute_q`, `q` satisfies `QᵀAQ = T`. The input is read, not modified;
/// only its lower triangle is referenced.
pub fn tridiagonalize<T: FloatScalar>(
    a: &impl MatrixRef<T>,
    diag: &mut [T],
    off: &mut [T],
    q: &mut impl MatrixMut<T>,
    compute_q: bool,
) {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "tridiagonalize requires a square matrix");
    assert!(diag.len() >= n);
    assert!(off.len() + 1 >= n);

    let mut w = DenseMatrix::from_fn(n, n, |i, j| *a.get(i, j));
    if compute_q {
        set_identity(q);
    }

    // scratch: Householder vector and the two rank-2 update vectors
    let mut v = vec![T::zero(); n];
    let mut p = vec![T::zero(); n];

    let eps = T::epsilon();
    let two: T = cst(2.0);

    for k in 0..n.saturating_sub(2) {
        let mut norm_sq = T::zero();
        for i in k + 1..n {
            norm_sq = norm_sq + w[(i, k)] * w[(i, k)];
        }
        if norm_sq <= eps * eps {
            off[k] = T::zero();
            continue;
        }

        let norm = norm_sq.sqrt();
        let head = w[(k + 1, k)];
        // sign chosen to avoid cancellation in the leading component
        let sigma = if head < T::zero() { -norm } else { norm };
        v[k + 1] = head + sigma;
        for i in k + 2..n {
            v[i] = w[(i, k)];
        }

        let mut v_norm_sq = T::zero();
        for i in k + 1..n {
            v_norm_sq = v_norm_sq + v[i] * v[i];
        }
        let tau = two / v_norm_sq;

        // p = tau * W_sub * v, then the symmetric correction along v
        for i in k + 1..n {
            let mut dot = T::zero();
            for j in k + 1..n {
                dot = dot + w[(i, j)] * v[j];
            }
            p[i] = tau * dot;
        }
        let mut vtp = T::zero();
        for i in k + 1..n {
            vtp = vtp + v[i] * p[i];
        }
        let correction = tau * vtp / two;
        for i in k + 1..n {
            p[i] = p[i] - correction * v[i];
        }

        // rank-2 update of the trailing block
        for i in k + 1..n {
            for j in k + 1..n {
                w[(i, j)] = w[(i, j)] - v[i] * p[j] - p[i] * v[j];
            }
        }

        // signed value, not the absolute, so the accumulator stays consistent
        off[k] = -sigma;

        if compute_q {
            // Q = Q * (I - tau v vᵀ)
            for row in 0..n {
                let mut dot = T::zero();
                for j in k + 1..n {
                    dot = dot + *q.get(row, j) * v[j];
                }
                dot = dot * tau;
                for j in k + 1..n {
                    *q.get_mut(row, j) = *q.get(row, j) - dot * v[j];
                }
            }
        }
    }

    for i in 0..n {
        diag[i] = w[(i, i)];
    }
    if n >= 2 {
        off[n - 2] = w[(n - 1, n - 2)];
    }
}

/// Householder bidiagonalization of an M x N matrix, M >= N.
///
/// `a` is overwritten with reflector data. On return `diag` and `off` hold
/// the upper bidiagonal form `B`, and the accumulators (when requested)
/// satisfy `A = U·B·Vᵀ` with `u` M x M and `v` N x N.
pub fn bidiagonalize<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    diag: &mut [T],
    off: &mut [T],
    u: &mut impl MatrixMut<T>,
    v: &mut impl MatrixMut<T>,
    compute_u: bool,
    compute_v: bool,
) {
    let m = a.nrows();
    let n = a.ncols();
    assert!(m >= n, "bidiagonalize requires M >= N");
    assert!(diag.len() >= n);
    assert!(off.len() + 1 >= n);

    if compute_u {
        set_identity(u);
    }
    if compute_v {
        set_identity(v);
    }

    let eps = T::epsilon();

    for k in 0..n {
        // left reflector zeroing a[k+1:m, k]
        let mut norm_sq = T::zero();
        for i in k..m {
            norm_sq = norm_sq + *a.get(i, k) * *a.get(i, k);
        }
        if norm_sq > eps * eps {
            let norm = norm_sq.sqrt();
            let head = *a.get(k, k);
            let sigma = if head < T::zero() { -norm } else { norm };
            let v0 = head + sigma;
            *a.get_mut(k, k) = v0;
            for i in k + 1..m {
                *a.get_mut(i, k) = *a.get(i, k) / v0;
            }
            let tau = v0 / sigma;

            for j in k + 1..n {
                let mut dot = *a.get(k, j);
                for i in k + 1..m {
                    dot = dot + *a.get(i, k) * *a.get(i, j);
                }
                dot = dot * tau;
                *a.get_mut(k, j) = *a.get(k, j) - dot;
                for i in k + 1..m {
                    let vi = *a.get(i, k);
                    *a.get_mut(i, j) = *a.get(i, j) - dot * vi;
                }
            }

            if compute_u {
                // U = U * (I - tau v vᵀ)
                for row in 0..m {
                    let mut dot = *u.get(row, k);
                    for i in k + 1..m {
                        dot = dot + *u.get(row, i) * *a.get(i, k);
                    }
                    dot = dot * tau;
                    *u.get_mut(row, k) = *u.get(row, k) - dot;
                    for i in k + 1..m {
                        let vi = *a.get(i, k);
                        *u.get_mut(row, i) = *u.get(row, i) - dot * vi;
                    }
                }
            }

            diag[k] = -sigma;
        } else {
            diag[k] = *a.get(k, k);
        }

        // right reflector zeroing a[k, k+2:n]
        if k + 2 < n {
            let mut norm_sq = T::zero();
            for j in k + 1..n {
                norm_sq = norm_sq + *a.get(k, j) * *a.get(k, j);
            }
            if norm_sq > eps * eps {
                let norm = norm_sq.sqrt();
                let head = *a.get(k, k + 1);
                let sigma = if head < T::zero() { -norm } else { norm };
                let v0 = head + sigma;
                *a.get_mut(k, k + 1) = v0;
                for j in k + 2..n {
                    *a.get_mut(k, j) = *a.get(k, j) / v0;
                }
                let tau = v0 / sigma;

                for i in k + 1..m {
                    let mut dot = *a.get(i, k + 1);
                    for j in k + 2..n {
                        dot = dot + *a.get(i, j) * *a.get(k, j);
                    }
                    dot = dot * tau;
                    *a.get_mut(i, k + 1) = *a.get(i, k + 1) - dot;
                    for j in k + 2..n {
                        let vj = *a.get(k, j);
                        *a.get_mut(i, j) = *a.get(i, j) - dot * vj;
                    }
                }

                if compute_v {
                    for row in 0..n {
                        let mut dot = *v.get(row, k + 1);
                        for j in k + 2..n {
                            dot = dot + *v.get(row, j) * *a.get(k, j);
                        }
                        dot = dot * tau;
                        *v.get_mut(row, k + 1) = *v.get(row, k + 1) - dot;
                        for j in k + 2..n {
                            let vj = *a.get(k, j);
                            *v.get_mut(row, j) = *v.get(row, j) - dot * vj;
                        }
                    }
                }

                off[k] = -sigma;
            } else {
                off[k] = *a.get(k, k + 1);
            }
        } else if k + 1 < n {
            off[k] = *a.get(k, k + 1);
        }
    }
}

/// Householder reduction of a square matrix to upper Hessenberg form.
///
/// `a` is overwritten with `H`; when `compute_q`, `q` satisfies `QᵀAQ = H`,
/// i.e. `A = Q·H·Qᵀ`.
pub fn hessenberg_form<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    q: &mut impl MatrixMut<T>,
    compute_q: bool,
) {
    let n = a.nrows();
    assert_eq!(n, a.ncols(), "hessenberg_form requires a square matrix");

    if compute_q {
        set_identity(q);
    }

    let eps = T::epsilon();

    for k in 0..n.saturating_sub(2) {
        let mut norm_sq = T::zero();
        for i in k + 1..n {
            norm_sq = norm_sq + *a.get(i, k) * *a.get(i, k);
        }
        if norm_sq <= eps * eps {
            continue;
        }

        let norm = norm_sq.sqrt();
        let head = *a.get(k + 1, k);
        let sigma = if head < T::zero() { -norm } else { norm };
        let v0 = head + sigma;

        // normalized reflector stored in the column being zeroed, v[0] = 1
        for i in k + 2..n {
            *a.get_mut(i, k) = *a.get(i, k) / v0;
        }
        let tau = v0 / sigma;

        // left: A[k+1:n, k+1:n] = (I - tau v vᵀ) A[k+1:n, k+1:n]
        for j in k + 1..n {
            let mut dot = *a.get(k + 1, j);
            for i in k + 2..n {
                dot = dot + *a.get(i, k) * *a.get(i, j);
            }
            dot = dot * tau;
            *a.get_mut(k + 1, j) = *a.get(k + 1, j) - dot;
            for i in k + 2..n {
                let vi = *a.get(i, k);
                *a.get_mut(i, j) = *a.get(i, j) - dot * vi;
            }
        }

        // right: A[0:n, k+1:n] = A[0:n, k+1:n] (I - tau v vᵀ)
        for i in 0..n {
            let mut dot = *a.get(i, k + 1);
            for j in k + 2..n {
                dot = dot + *a.get(i, j) * *a.get(j, k);
            }
            dot = dot * tau;
            *a.get_mut(i, k + 1) = *a.get(i, k + 1) - dot;
            for j in k + 2..n {
                let vj = *a.get(j, k);
                *a.get_mut(i, j) = *a.get(i, j) - dot * vj;
            }
        }

        if compute_q {
            for i in 0..n {
                let mut dot = *q.get(i, k + 1);
                for j in k + 2..n {
                    dot = dot + *q.get(i, j) * *a.get(j, k);
                }
                dot = dot * tau;
                *q.get_mut(i, k + 1) = *q.get(i, k + 1) - dot;
                for j in k + 2..n {
                    let vj = *a.get(j, k);
                    *q.get_mut(i, j) = *q.get(i, j) - dot * vj;
                }
            }
        }

        // clear the stored reflector and write the reduced column
        *a.get_mut(k + 1, k) = -sigma;
        for i in k + 2..n {
            *a.get_mut(i, k) = T::zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
    }

    fn tridiag_matrix(diag: &[f64], off: &[f64]) -> DenseMatrix<f64> {
        let n = diag.len();
        DenseMatrix::from_fn(n, n, |i, j| {
            if i == j {
                diag[i]
            } else if j + 1 == i {
                off[j]
            } else if i + 1 == j {
                off[i]
            } else {
                0.0
            }
        })
    }

    #[test]
    fn tridiagonalize_reconstructs() {
        let a = DenseMatrix::from_rows(
            4,
            4,
            &[
                4.0, 1.0, -2.0, 2.0, //
                1.0, 2.0, 0.0, 1.0, //
                -2.0, 0.0, 3.0, -2.0, //
                2.0, 1.0, -2.0, -1.0,
            ],
        );
        let mut diag = [0.0; 4];
        let mut off = [0.0; 3];
        let mut q = DenseMatrix::eye(4, 0.0);
        tridiagonalize(&a, &mut diag, &mut off, &mut q, true);

        // A = Q T Q'
        let t = tridiag_matrix(&diag, &off);
        let back = q.mul(&t).mul(&q.transpose());
        for i in 0..4 {
            for j in 0..4 {
                assert_near(back[(i, j)], a[(i, j)], 1e-10);
            }
        }
    }

    #[test]
    fn bidiagonalize_reconstructs_tall() {
        let a = DenseMatrix::from_rows(
            4,
            3,
            &[
                1.0, 2.0, 3.0, //
                4.0, 5.0, 6.0, //
                7.0, 8.0, 10.0, //
                -1.0, 0.5, 2.0,
            ],
        );
        let mut work = a.clone();
        let mut diag = [0.0; 3];
        let mut off = [0.0; 2];
        let mut u = DenseMatrix::eye(4, 0.0);
        let mut v = DenseMatrix::eye(3, 0.0);
        bidiagonalize(&mut work, &mut diag, &mut off, &mut u, &mut v, true, true);

        // A = U B V'
        let b = DenseMatrix::from_fn(4, 3, |i, j| {
            if i == j {
                diag[i]
            } else if i + 1 == j {
                off[i]
            } else {
                0.0
            }
        });
        let back = u.mul(&b).mul(&v.transpose());
        for i in 0..4 {
            for j in 0..3 {
                assert_near(back[(i, j)], a[(i, j)], 1e-10);
            }
        }
    }

    #[test]
    fn hessenberg_form_reconstructs() {
        let a = DenseMatrix::from_rows(
            4,
            4,
            &[
                1.0, 2.0, 3.0, 4.0, //
                5.0, 6.0, 7.0, 8.0, //
                9.0, 10.0, 11.0, 12.0, //
                13.0, 14.0, 15.0, 17.0,
            ],
        );
        let mut h = a.clone();
        let mut q = DenseMatrix::eye(4, 0.0);
        hessenberg_form(&mut h, &mut q, true);

        // below the sub-diagonal is exactly zero
        for i in 2..4 {
            for j in 0..i - 1 {
                assert_eq!(h[(i, j)], 0.0);
            }
        }
        // A = Q H Q'
        let back = q.mul(&h).mul(&q.transpose());
        for i in 0..4 {
            for j in 0..4 {
                assert_near(back[(i, j)], a[(i, j)], 1e-9);
            }
        }
    }
}
