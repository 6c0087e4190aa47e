use crate::dual::Dual;
use crate::float::Float;

/// Evaluate `f` at `x` with zero tangents and return the primal outputs.
///
/// ```
/// let y = tangent::value(|x: &[tangent::Dual64]| vec![x[0] * x[1]], &[3.0, 4.0]);
/// assert_eq!(y, vec![12.0]);
/// ```
pub fn value<F: Float>(f: impl FnOnce(&[Dual<F>]) -> Vec<Dual<F>>, x: &[F]) -> Vec<F> {
    f(&Dual::constants(x)).iter().map(|d| d.re).collect()
}

/// Jacobian-vector product: `(f(x), J·v)`.
///
/// Evaluates `f` at `x` and computes the directional derivative in direction `v`.
pub fn jvp<F: Float>(
    f: impl FnOnce(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
    v: &[F],
) -> (Vec<F>, Vec<F>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let outputs = f(&Dual::seeded(x, v));
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    (values, tangents)
}

/// Compute the full Jacobian of `f : R^n → R^m`.
///
/// Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`, stored row-major.
pub fn jacobian<F: Float>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
) -> (Vec<F>, Vec<Vec<F>>) {
    let (values, jac, ()) = jacobian_with(|d| (f(d), ()), x);
    (values, jac)
}

/// Like [`jacobian`], for functions that also return a non-differentiated payload.
///
/// The payload is taken from the primal pass (all tangents zero).
pub fn jacobian_with<F: Float, A>(
    f: impl Fn(&[Dual<F>]) -> (Vec<Dual<F>>, A),
    x: &[F],
) -> (Vec<F>, Vec<Vec<F>>, A) {
    let n = x.len();

    // Primal pass fixes the output dimension.
    let (outputs, payload) = f(&Dual::constants(x));
    let values: Vec<F> = outputs.iter().map(|d| d.re).collect();
    let m = values.len();

    // One forward pass per input variable.
    let mut jac = vec![vec![F::zero(); n]; m];
    let mut inputs = Dual::constants(x);
    for j in 0..n {
        inputs[j].eps = F::one();
        let (outputs, _) = f(&inputs);
        assert_eq!(
            outputs.len(),
            m,
            "output dimension changed between passes ({} vs {})",
            outputs.len(),
            m
        );
        for (row, out) in jac.iter_mut().zip(outputs.iter()) {
            row[j] = out.eps;
        }
        inputs[j].eps = F::zero();
    }

    (values, jac, payload)
}

/// Gradient of a scalar function `f : R^n → R`: `(f(x), ∇f(x))`.
///
/// ```
/// let (v, g) = tangent::grad(|x: &[tangent::Dual64]| x[0] * x[0] + x[1] * x[1], &[3.0, 4.0]);
/// assert!((v - 25.0).abs() < 1e-12);
/// assert!((g[0] - 6.0).abs() < 1e-12);
/// assert!((g[1] - 8.0).abs() < 1e-12);
/// ```
pub fn grad<F: Float>(f: impl Fn(&[Dual<F>]) -> Dual<F>, x: &[F]) -> (F, Vec<F>) {
    let (values, jac) = jacobian(|d| vec![f(d)], x);
    let g = jac.into_iter().next().unwrap_or_else(|| vec![F::zero(); x.len()]);
    (values[0], g)
}
