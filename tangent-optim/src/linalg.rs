use num_traits::Float;

/// Reduced QR factors `A = Q·R` of an `m × n` matrix with `m >= n`.
///
/// `q` is `m × n` with orthonormal columns, `r` is `n × n` upper triangular.
/// Both are stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct QrFactors<F> {
    pub q: Vec<Vec<F>>,
    pub r: Vec<Vec<F>>,
}

impl<F: Float> QrFactors<F> {
    /// Number of rows of the factored matrix.
    pub fn rows(&self) -> usize {
        self.q.len()
    }

    /// Number of columns of the factored matrix.
    pub fn cols(&self) -> usize {
        self.r.len()
    }

    /// Largest absolute diagonal entry of `R`.
    pub fn max_diag(&self) -> F {
        (0..self.cols()).fold(F::zero(), |acc, i| acc.max(self.r[i][i].abs()))
    }
}

/// Householder reduced QR of an `m × n` row-major matrix.
///
/// # Panics
///
/// Panics if `m < n`; callers transpose wide matrices first.
// Explicit indexing mirrors the reflector algebra
#[allow(clippy::needless_range_loop)]
pub fn householder_qr<F: Float>(a: &[Vec<F>]) -> QrFactors<F> {
    let m = a.len();
    let n = a.first().map_or(0, Vec::len);
    assert!(
        m >= n,
        "reduced QR needs at least as many rows as columns ({} x {})",
        m,
        n
    );
    debug_assert!(a.iter().all(|row| row.len() == n));

    let two = F::one() + F::one();
    let mut r: Vec<Vec<F>> = a.to_vec();
    let mut reflectors: Vec<Option<Vec<F>>> = Vec::with_capacity(n);

    for k in 0..n {
        let x_norm = (k..m)
            .fold(F::zero(), |acc, i| acc + r[i][k] * r[i][k])
            .sqrt();
        if x_norm == F::zero() {
            reflectors.push(None);
            continue;
        }
        let alpha = if r[k][k] >= F::zero() { -x_norm } else { x_norm };

        let mut v: Vec<F> = (k..m).map(|i| r[i][k]).collect();
        v[0] = v[0] - alpha;
        let v_norm = v.iter().fold(F::zero(), |acc, &vi| acc + vi * vi).sqrt();
        if v_norm == F::zero() {
            reflectors.push(None);
            continue;
        }
        for vi in v.iter_mut() {
            *vi = *vi / v_norm;
        }

        // R <- (I - 2 v v^T) R on the trailing block
        for j in k..n {
            let s = (0..v.len()).fold(F::zero(), |acc, i| acc + v[i] * r[k + i][j]);
            for i in 0..v.len() {
                r[k + i][j] = r[k + i][j] - two * s * v[i];
            }
        }
        reflectors.push(Some(v));
    }

    // Q = H_0 H_1 ... H_{n-1} applied to the first n columns of I_m
    let mut q = vec![vec![F::zero(); n]; m];
    for i in 0..n {
        q[i][i] = F::one();
    }
    for k in (0..n).rev() {
        if let Some(v) = &reflectors[k] {
            for j in 0..n {
                let s = (0..v.len()).fold(F::zero(), |acc, i| acc + v[i] * q[k + i][j]);
                for i in 0..v.len() {
                    q[k + i][j] = q[k + i][j] - two * s * v[i];
                }
            }
        }
    }

    let mut r_reduced: Vec<Vec<F>> = r.into_iter().take(n).collect();
    for (i, row) in r_reduced.iter_mut().enumerate() {
        for v in row.iter_mut().take(i) {
            *v = F::zero();
        }
    }

    QrFactors { q, r: r_reduced }
}

/// Solve `R·x = b` for upper triangular `R` by back substitution.
///
/// Components whose diagonal entry is at most `cutoff` in magnitude are set to
/// zero instead of divided through.
pub fn solve_upper<F: Float>(r: &[Vec<F>], b: &[F], cutoff: F) -> Vec<F> {
    let n = r.len();
    debug_assert_eq!(b.len(), n);
    let mut x = vec![F::zero(); n];
    for i in (0..n).rev() {
        if r[i][i].abs() <= cutoff {
            continue;
        }
        let sum = ((i + 1)..n).fold(b[i], |acc, j| acc - r[i][j] * x[j]);
        x[i] = sum / r[i][i];
    }
    x
}

/// Solve `R^T·x = b` for upper triangular `R` by forward substitution.
///
/// `R^T` is lower triangular; `R` is never transposed in memory. The same
/// diagonal cutoff as [`solve_upper`] applies.
pub fn solve_upper_transpose<F: Float>(r: &[Vec<F>], b: &[F], cutoff: F) -> Vec<F> {
    let n = r.len();
    debug_assert_eq!(b.len(), n);
    let mut x = vec![F::zero(); n];
    for i in 0..n {
        if r[i][i].abs() <= cutoff {
            continue;
        }
        let sum = (0..i).fold(b[i], |acc, j| acc - r[j][i] * x[j]);
        x[i] = sum / r[i][i];
    }
    x
}

/// `A·v` for a row-major matrix.
pub fn mat_vec<F: Float>(a: &[Vec<F>], v: &[F]) -> Vec<F> {
    a.iter()
        .map(|row| {
            debug_assert_eq!(row.len(), v.len());
            row.iter()
                .zip(v)
                .fold(F::zero(), |acc, (&aij, &vj)| acc + aij * vj)
        })
        .collect()
}

/// `A^T·v` for a row-major matrix with `cols` columns.
pub fn mat_t_vec<F: Float>(a: &[Vec<F>], v: &[F], cols: usize) -> Vec<F> {
    debug_assert_eq!(a.len(), v.len());
    let mut out = vec![F::zero(); cols];
    for (row, &vi) in a.iter().zip(v) {
        for (o, &aij) in out.iter_mut().zip(row) {
            *o = *o + aij * vi;
        }
    }
    out
}

/// Transpose an `m × n` matrix stored as `Vec<Vec<F>>`.
pub fn transpose<F: Float>(mat: &[Vec<F>]) -> Vec<Vec<F>> {
    let cols = mat.first().map_or(0, Vec::len);
    (0..cols)
        .map(|j| mat.iter().map(|row| row[j]).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mat_mul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let bt = transpose(b);
        a.iter().map(|row| mat_vec(&bt, row)).collect()
    }

    #[test]
    fn qr_reconstructs_tall_matrix() {
        let a = vec![
            vec![1.0, 2.0],
            vec![3.0, 4.0],
            vec![5.0, 6.0],
        ];
        let f = householder_qr(&a);
        assert_eq!(f.rows(), 3);
        assert_eq!(f.cols(), 2);
        let qr = mat_mul(&f.q, &f.r);
        for i in 0..3 {
            for j in 0..2 {
                assert_abs_diff_eq!(qr[i][j], a[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn q_has_orthonormal_columns() {
        let a = vec![
            vec![2.0, -1.0, 0.0],
            vec![1.0, 3.0, 1.0],
            vec![0.0, 1.0, 4.0],
            vec![1.0, 0.0, 1.0],
        ];
        let f = householder_qr(&a);
        let qtq = mat_mul(&transpose(&f.q), &f.q);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(qtq[i][j], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn r_is_upper_triangular() {
        let a = vec![vec![4.0, 1.0], vec![2.0, 3.0]];
        let f = householder_qr(&a);
        assert_eq!(f.r[1][0], 0.0);
    }

    #[test]
    fn zero_column_is_skipped() {
        let a = vec![vec![0.0, 1.0], vec![0.0, 2.0]];
        let f = householder_qr(&a);
        let qr = mat_mul(&f.q, &f.r);
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(qr[i][j], a[i][j], epsilon = 1e-12);
            }
        }
        assert_eq!(f.r[0][0], 0.0);
    }

    #[test]
    fn triangular_solves() {
        let r = vec![vec![2.0, 1.0], vec![0.0, 4.0]];
        let x = solve_upper(&r, &[4.0, 8.0], 0.0);
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-15);

        // R^T = [[2, 0], [1, 4]]
        let y = solve_upper_transpose(&r, &[2.0, 9.0], 0.0);
        assert_abs_diff_eq!(y[0], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(y[1], 2.0, epsilon = 1e-15);
    }

    #[test]
    fn cutoff_zeroes_small_pivots() {
        let r = vec![vec![1.0, 1.0], vec![0.0, 1e-20]];
        let x = solve_upper(&r, &[3.0, 1.0], 1e-12);
        assert_eq!(x[1], 0.0);
        assert_abs_diff_eq!(x[0], 3.0, epsilon = 1e-15);
    }

    #[test]
    fn mat_t_vec_matches_transpose() {
        let a = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        assert_eq!(mat_t_vec(&a, &[1.0, -1.0], 3), mat_vec(&transpose(&a), &[1.0, -1.0]));
    }
}
