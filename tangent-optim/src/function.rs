//! Problem functions and the evaluation helpers the solvers use on them.
//!
//! A problem function maps `(y, args)` to `(output, aux)`. It is written over
//! [`Dual`] numbers so that one definition serves plain evaluation (all tangents
//! zero) as well as Jacobian and gradient evaluation through `tangent`.

use tangent::{Dual, Float};

/// A residual-producing problem function: `(y, args) -> (r(y), aux)`.
///
/// Implemented for every closure `Fn(&[Dual<F>], &A) -> (Vec<Dual<F>>, Aux)`.
/// Wrap a closure without a payload in [`NoneAux`].
pub trait ResidualFn<F: Float, A> {
    /// Auxiliary payload returned alongside the residual.
    type Aux: Clone;

    /// Evaluate the residual and its payload.
    fn residual(&self, y: &[Dual<F>], args: &A) -> (Vec<Dual<F>>, Self::Aux);
}

impl<F, A, Aux, G> ResidualFn<F, A> for G
where
    F: Float,
    Aux: Clone,
    G: Fn(&[Dual<F>], &A) -> (Vec<Dual<F>>, Aux),
{
    type Aux = Aux;

    #[inline]
    fn residual(&self, y: &[Dual<F>], args: &A) -> (Vec<Dual<F>>, Aux) {
        self(y, args)
    }
}

/// A scalar-producing problem function: `(y, args) -> (f(y), aux)`.
pub trait ObjectiveFn<F: Float, A> {
    /// Auxiliary payload returned alongside the objective value.
    type Aux: Clone;

    /// Evaluate the objective and its payload.
    fn objective(&self, y: &[Dual<F>], args: &A) -> (Dual<F>, Self::Aux);
}

impl<F, A, Aux, G> ObjectiveFn<F, A> for G
where
    F: Float,
    Aux: Clone,
    G: Fn(&[Dual<F>], &A) -> (Dual<F>, Aux),
{
    type Aux = Aux;

    #[inline]
    fn objective(&self, y: &[Dual<F>], args: &A) -> (Dual<F>, Aux) {
        self(y, args)
    }
}

/// Adapter for functions without an auxiliary payload; the payload becomes `()`.
///
/// ```
/// use tangent::Dual64;
/// use tangent_optim::function::{eval_residual, NoneAux};
///
/// let fun = NoneAux(|y: &[Dual64], _: &()| vec![y[0] - 2.0]);
/// let (r, ()) = eval_residual(&fun, &[5.0], &());
/// assert_eq!(r, vec![3.0]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct NoneAux<G>(pub G);

impl<F, A, G> ResidualFn<F, A> for NoneAux<G>
where
    F: Float,
    G: Fn(&[Dual<F>], &A) -> Vec<Dual<F>>,
{
    type Aux = ();

    #[inline]
    fn residual(&self, y: &[Dual<F>], args: &A) -> (Vec<Dual<F>>, ()) {
        ((self.0)(y, args), ())
    }
}

impl<F, A, G> ObjectiveFn<F, A> for NoneAux<G>
where
    F: Float,
    G: Fn(&[Dual<F>], &A) -> Dual<F>,
{
    type Aux = ();

    #[inline]
    fn objective(&self, y: &[Dual<F>], args: &A) -> (Dual<F>, ()) {
        ((self.0)(y, args), ())
    }
}

/// Shape metadata of a function's primary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputStructure {
    /// Number of scalar outputs.
    pub len: usize,
}

impl OutputStructure {
    /// Structure of a scalar-producing function.
    pub const SCALAR: OutputStructure = OutputStructure { len: 1 };
}

/// Output structure of a residual function at `y`.
///
/// Runs a single primal evaluation; the residual length may depend only on the
/// length of `y`, never on its values.
pub fn eval_shape<F: Float, A, Fun: ResidualFn<F, A>>(
    fun: &Fun,
    y: &[F],
    args: &A,
) -> OutputStructure {
    let (r, _) = fun.residual(&Dual::constants(y), args);
    OutputStructure { len: r.len() }
}

/// Evaluate a residual function at `y` with zero tangents.
pub fn eval_residual<F: Float, A, Fun: ResidualFn<F, A>>(
    fun: &Fun,
    y: &[F],
    args: &A,
) -> (Vec<F>, Fun::Aux) {
    let (r, aux) = fun.residual(&Dual::constants(y), args);
    (r.iter().map(|d| d.re).collect(), aux)
}

/// Residual, Jacobian (`m × n`, row-major) and payload at `y`.
pub fn residual_jacobian<F: Float, A, Fun: ResidualFn<F, A>>(
    fun: &Fun,
    y: &[F],
    args: &A,
) -> (Vec<F>, Vec<Vec<F>>, Fun::Aux) {
    tangent::api::jacobian_with(|d| fun.residual(d, args), y)
}

/// Evaluate an objective function at `y` with zero tangents.
pub fn eval_objective<F: Float, A, Fun: ObjectiveFn<F, A>>(
    fun: &Fun,
    y: &[F],
    args: &A,
) -> (F, Fun::Aux) {
    let (f, aux) = fun.objective(&Dual::constants(y), args);
    (f.re, aux)
}

/// Objective value, gradient and payload at `y`.
pub fn objective_grad<F: Float, A, Fun: ObjectiveFn<F, A>>(
    fun: &Fun,
    y: &[F],
    args: &A,
) -> (F, Vec<F>, Fun::Aux) {
    let (values, jac, aux) = tangent::api::jacobian_with(
        |d| {
            let (f, aux) = fun.objective(d, args);
            (vec![f], aux)
        },
        y,
    );
    let grad = jac
        .into_iter()
        .next()
        .unwrap_or_else(|| vec![F::zero(); y.len()]);
    (values[0], grad, aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tangent::Dual64;

    fn rosen(y: &[Dual64], a: &f64) -> (Vec<Dual64>, usize) {
        (vec![(y[0] * -1.0) + *a, (y[1] - y[0] * y[0]) * 10.0], y.len())
    }

    #[test]
    fn residual_jacobian_matches_hand_derivative() {
        let (r, j, aux) = residual_jacobian(&rosen, &[2.0, 3.0], &1.0);
        assert_relative_eq!(r[0], -1.0);
        assert_relative_eq!(r[1], -10.0);
        assert_relative_eq!(j[0][0], -1.0);
        assert_relative_eq!(j[0][1], 0.0);
        assert_relative_eq!(j[1][0], -40.0);
        assert_relative_eq!(j[1][1], 10.0);
        assert_eq!(aux, 2);
    }

    #[test]
    fn eval_shape_reports_residual_length() {
        assert_eq!(eval_shape(&rosen, &[0.0, 0.0], &1.0), OutputStructure { len: 2 });
    }

    #[test]
    fn objective_grad_of_quadratic() {
        let fun = NoneAux(|y: &[Dual64], c: &f64| (y[0] - *c) * (y[0] - *c) + y[1] * y[1]);
        let (f, g, ()) = objective_grad(&fun, &[3.0, 1.0], &1.0);
        assert_relative_eq!(f, 5.0);
        assert_relative_eq!(g[0], 4.0);
        assert_relative_eq!(g[1], 2.0);
    }
}
