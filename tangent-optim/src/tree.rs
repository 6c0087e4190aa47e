//! Flat-buffer helpers used wherever a solver combines candidates, steps and
//! residuals elementwise.

use num_traits::Float;

/// Compute the dot product of two vectors.
pub fn inner_prod<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .fold(F::zero(), |acc, (&x, &y)| acc + x * y)
}

/// Sum of the squares of every element.
pub fn sum_squares<F: Float>(v: &[F]) -> F {
    inner_prod(v, v)
}

/// Compute the L2 norm of a vector.
pub fn two_norm<F: Float>(v: &[F]) -> F {
    sum_squares(v).sqrt()
}

/// Largest absolute element, zero for an empty vector.
pub fn max_norm<F: Float>(v: &[F]) -> F {
    v.iter().fold(F::zero(), |acc, &x| acc.max(x.abs()))
}

/// `a + alpha * x`, elementwise.
pub fn axpy<F: Float>(alpha: F, x: &[F], a: &[F]) -> Vec<F> {
    debug_assert_eq!(x.len(), a.len());
    a.iter().zip(x).map(|(&ai, &xi)| ai + alpha * xi).collect()
}

/// `alpha * x`, elementwise.
pub fn scale<F: Float>(alpha: F, x: &[F]) -> Vec<F> {
    x.iter().map(|&xi| alpha * xi).collect()
}

/// `if_true` when `cond` holds, otherwise `if_false` (cloned).
pub fn tree_where<F: Float>(cond: bool, if_true: &[F], if_false: &[F]) -> Vec<F> {
    if cond {
        if_true.to_vec()
    } else {
        if_false.to_vec()
    }
}

/// A vector of `len` copies of `fill`.
pub fn tree_full<F: Float>(len: usize, fill: F) -> Vec<F> {
    vec![fill; len]
}

/// A vector of zeros shaped like `like`.
pub fn tree_zeros_like<F: Float>(like: &[F]) -> Vec<F> {
    tree_full(like.len(), F::zero())
}

/// `true` if every element is finite.
pub fn all_finite<F: Float>(v: &[F]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Cast an initial guess given in any primitive numeric type to floating point.
///
/// Unrepresentable entries become NaN so they surface as divergence rather than
/// being silently replaced.
pub fn inexact_asarray<F: Float, T: num_traits::ToPrimitive>(values: &[T]) -> Vec<F> {
    values
        .iter()
        .map(|v| v.to_f64().and_then(F::from).unwrap_or_else(F::nan))
        .collect()
}
