//! Column-major dense kernels with LAPACK calling conventions
//!
//! These mirror `sgetrf`/`sgetrs`/`spotrf` closely enough that the reference
//! device reports the same `info` values the GPU library does: 1-based pivot
//! indices, `info = j` for the first exactly-zero pivot `U(j,j)`, and
//! `info = j` for the first leading minor that is not positive definite.
//!
//! All matrices are `n x n` column-major slices: element `(i, j)` is
//! `a[i + j * n]`.

use crate::solver::Transpose;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// LU factorization with partial pivoting, in place
///
/// On return `a` holds the unit-lower `L` below the diagonal and `U` on and
/// above it; `ipiv[j]` is the 1-based row swapped with row `j`. Returns
/// `info`: 0 on success, `j > 0` if `U(j,j)` is exactly zero. Factorization
/// still completes in that case.
pub(crate) fn sgetrf(n: usize, a: &mut [f32], ipiv: &mut [i32]) -> i32 {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(ipiv.len(), n);

    let mut info = 0i32;
    for j in 0..n {
        let mut p = j;
        let mut max = a[j + j * n].abs();
        for i in j + 1..n {
            let v = a[i + j * n].abs();
            if v > max {
                max = v;
                p = i;
            }
        }
        ipiv[j] = (p + 1) as i32;

        if a[p + j * n] == 0.0 {
            if info == 0 {
                info = (j + 1) as i32;
            }
            continue;
        }

        if p != j {
            for c in 0..n {
                a.swap(j + c * n, p + c * n);
            }
        }

        let pivot = a[j + j * n];
        for i in j + 1..n {
            a[i + j * n] /= pivot;
        }

        for c in j + 1..n {
            let f = a[j + c * n];
            if f == 0.0 {
                continue;
            }
            for i in j + 1..n {
                a[i + c * n] -= a[i + j * n] * f;
            }
        }
    }
    info
}

fn solve_column(trans: Transpose, n: usize, lu: &[f32], ipiv: &[i32], b: &mut [f32]) {
    match trans {
        Transpose::NoTrans => {
            for (i, &p) in ipiv.iter().enumerate() {
                let p = (p - 1) as usize;
                if p != i {
                    b.swap(i, p);
                }
            }
            // L y = P b
            for j in 0..n {
                let x = b[j];
                if x != 0.0 {
                    for i in j + 1..n {
                        b[i] -= x * lu[i + j * n];
                    }
                }
            }
            // U x = y
            for j in (0..n).rev() {
                b[j] /= lu[j + j * n];
                let x = b[j];
                for i in 0..j {
                    b[i] -= x * lu[i + j * n];
                }
            }
        }
        Transpose::Trans => {
            // U^T y = b
            for i in 0..n {
                let mut s = b[i];
                for k in 0..i {
                    s -= lu[k + i * n] * b[k];
                }
                b[i] = s / lu[i + i * n];
            }
            // L^T z = y
            for i in (0..n).rev() {
                let mut s = b[i];
                for k in i + 1..n {
                    s -= lu[k + i * n] * b[k];
                }
                b[i] = s;
            }
            for (i, &p) in ipiv.iter().enumerate().rev() {
                let p = (p - 1) as usize;
                if p != i {
                    b.swap(i, p);
                }
            }
        }
    }
}

/// Solve `op(A) X = B` from the output of [`sgetrf`], overwriting `b`
///
/// `b` is `n x nrhs` column-major. Columns are independent and solved in
/// parallel when the `rayon` feature is enabled.
pub(crate) fn sgetrs(
    trans: Transpose,
    n: usize,
    nrhs: usize,
    lu: &[f32],
    ipiv: &[i32],
    b: &mut [f32],
) {
    debug_assert_eq!(b.len(), n * nrhs);
    if n == 0 {
        return;
    }

    #[cfg(feature = "rayon")]
    b.par_chunks_mut(n)
        .for_each(|col| solve_column(trans, n, lu, ipiv, col));

    #[cfg(not(feature = "rayon"))]
    b.chunks_mut(n)
        .for_each(|col| solve_column(trans, n, lu, ipiv, col));
}

/// Cholesky factorization `A = L L^T` of the lower triangle, in place
///
/// Only the lower triangle is read or written. Returns `info`: 0 on success,
/// `j > 0` if the leading minor of order `j` is not positive definite, in
/// which case the offending diagonal value is left at `a(j-1, j-1)`.
pub(crate) fn spotrf_lower(n: usize, a: &mut [f32]) -> i32 {
    debug_assert_eq!(a.len(), n * n);

    for j in 0..n {
        let mut d = a[j + j * n];
        for k in 0..j {
            let l = a[j + k * n];
            d -= l * l;
        }
        // NaN fails this test too
        if !(d > 0.0) {
            a[j + j * n] = d;
            return (j + 1) as i32;
        }
        let d = d.sqrt();
        a[j + j * n] = d;

        for i in j + 1..n {
            let mut s = a[i + j * n];
            for k in 0..j {
                s -= a[i + k * n] * a[j + k * n];
            }
            a[i + j * n] = s / d;
        }
    }
    0
}

/// Zero everything above the diagonal
pub(crate) fn zero_strict_upper(n: usize, a: &mut [f32]) {
    for j in 1..n {
        a[j * n..j * n + j].fill(0.0);
    }
}

/// Out-of-place transpose of a `rows x cols` column-major matrix
pub(crate) fn transpose(rows: usize, cols: usize, src: &[f32], dst: &mut [f32]) {
    debug_assert_eq!(src.len(), rows * cols);
    debug_assert_eq!(dst.len(), rows * cols);
    for j in 0..cols {
        for i in 0..rows {
            dst[j + i * cols] = src[i + j * rows];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col_major(rows: &[&[f32]]) -> Vec<f32> {
        let n = rows.len();
        let mut out = vec![0.0; n * rows[0].len()];
        for (i, r) in rows.iter().enumerate() {
            for (j, &v) in r.iter().enumerate() {
                out[i + j * n] = v;
            }
        }
        out
    }

    #[test]
    fn test_sgetrf_pivots_on_largest() {
        let mut a = col_major(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let mut ipiv = [0; 2];
        assert_eq!(sgetrf(2, &mut a, &mut ipiv), 0);
        assert_eq!(ipiv, [2, 2]);
        // U = [[3, 4], [0, 2/3]], L21 = 1/3
        assert_eq!(a[0], 3.0);
        assert!((a[1] - 1.0 / 3.0).abs() < 1e-6);
        assert!((a[3] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sgetrf_reports_zero_pivot() {
        let mut a = col_major(&[&[1.0, 2.0], &[2.0, 4.0]]);
        let mut ipiv = [0; 2];
        assert_eq!(sgetrf(2, &mut a, &mut ipiv), 2);

        let mut z = vec![0.0; 9];
        let mut ipiv = [0; 3];
        assert_eq!(sgetrf(3, &mut z, &mut ipiv), 1);
    }

    #[test]
    fn test_sgetrs_both_orientations() {
        let a = col_major(&[&[4.0, 1.0, 0.0], &[2.0, 5.0, 1.0], &[0.0, 3.0, 6.0]]);
        let mut lu = a.clone();
        let mut ipiv = [0; 3];
        assert_eq!(sgetrf(3, &mut lu, &mut ipiv), 0);

        let x = [1.0f32, -2.0, 0.5];
        let mut b = [0.0f32; 3];
        let mut bt = [0.0f32; 3];
        for i in 0..3 {
            for j in 0..3 {
                b[i] += a[i + j * 3] * x[j];
                bt[i] += a[j + i * 3] * x[j];
            }
        }

        sgetrs(Transpose::NoTrans, 3, 1, &lu, &ipiv, &mut b);
        sgetrs(Transpose::Trans, 3, 1, &lu, &ipiv, &mut bt);
        for i in 0..3 {
            assert!((b[i] - x[i]).abs() < 1e-5, "{b:?}");
            assert!((bt[i] - x[i]).abs() < 1e-5, "{bt:?}");
        }
    }

    #[test]
    fn test_spotrf_known_factor() {
        // [[4, 2], [2, 5]] = L L^T with L = [[2, 0], [1, 2]]
        let mut a = col_major(&[&[4.0, 2.0], &[2.0, 5.0]]);
        assert_eq!(spotrf_lower(2, &mut a), 0);
        assert_eq!(a[0], 2.0);
        assert_eq!(a[1], 1.0);
        assert_eq!(a[3], 2.0);
        // upper triangle untouched
        assert_eq!(a[2], 2.0);
        zero_strict_upper(2, &mut a);
        assert_eq!(a[2], 0.0);
    }

    #[test]
    fn test_spotrf_reports_failing_minor() {
        let mut a = col_major(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 10.0]]);
        assert_eq!(spotrf_lower(3, &mut a), 2);

        let mut neg = col_major(&[&[-1.0, 0.0], &[0.0, -1.0]]);
        assert_eq!(spotrf_lower(2, &mut neg), 1);
    }

    #[test]
    fn test_transpose_rectangular() {
        let src = col_major(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let mut dst = vec![0.0; 6];
        transpose(2, 3, &src, &mut dst);
        assert_eq!(dst, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
