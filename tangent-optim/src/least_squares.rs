//! Least-squares problems and their reduction to other problem families.
//!
//! A least-squares problem is solved in one of three ways, chosen statically
//! by the solver's [`LeastSquaresMethod`] implementation:
//!
//! - a [`Minimiser`] minimises `sum(r(y)^2)`,
//! - a [`RootFinder`] solves `r(y) = 0` directly,
//! - a dedicated [`LeastSquaresSolver`] iterates on the residual itself.

use num_traits::ToPrimitive;
use tangent::{Dual, Float};
use tracing::debug;

use crate::error::SolveError;
use crate::function::{eval_shape, residual_jacobian, ObjectiveFn, ResidualFn};
use crate::iterate::{iterative_solve, IterativeSolver, SolveOptions, Tags};
use crate::linalg::mat_t_vec;
use crate::minimise::{minimise, Minimiser};
use crate::result::Solution;
use crate::root_find::{root_find, RootFinder};
use crate::tree::inexact_asarray;

/// Options for [`least_squares`].
pub type LeastSquaresOptions<F> = SolveOptions<F>;

/// Result type of a least-squares solve.
pub type LeastSquaresResult<F, Aux> = Result<Solution<Vec<F>, Aux>, SolveError<Vec<F>, Aux>>;

/// Marker for solvers that iterate on a residual directly.
pub trait LeastSquaresSolver {}

/// The objective `sum(r(y)^2)` of a residual function.
#[derive(Debug, Clone, Copy)]
pub struct ToMinimiseFn<G>(pub G);

impl<F, A, G> ObjectiveFn<F, A> for ToMinimiseFn<G>
where
    F: Float,
    G: ResidualFn<F, A>,
{
    type Aux = G::Aux;

    fn objective(&self, y: &[Dual<F>], args: &A) -> (Dual<F>, G::Aux) {
        let (r, aux) = self.0.residual(y, args);
        (r.iter().map(|&ri| ri * ri).sum(), aux)
    }
}

/// How a solver handles a least-squares problem.
///
/// Each solver implements this once, delegating to
/// [`least_squares_via_minimiser`], [`least_squares_via_root_finder`] or
/// [`least_squares_direct`] according to its family.
pub trait LeastSquaresMethod<F: Float, A, Fun: ResidualFn<F, A>> {
    /// Solver-specific options.
    type Options;
    /// Payload carried by the solution.
    type Aux;

    fn solve_least_squares(
        &self,
        fun: Fun,
        y0: &[F],
        args: &A,
        options: &Self::Options,
        solve_options: &LeastSquaresOptions<F>,
    ) -> LeastSquaresResult<F, Self::Aux>;
}

/// Solve `min_y sum(fun(y)^2)`.
///
/// `y0` is converted to floating point first. Errors are raised only for
/// structural misconfiguration, or for a failed solve when `throw` is set.
///
/// ```
/// use tangent::Dual64;
/// use tangent_optim::function::NoneAux;
/// use tangent_optim::least_squares::{least_squares, LeastSquaresOptions};
/// use tangent_optim::solvers::gauss_newton::GaussNewton;
///
/// // Fit y = a·exp(b·t) through three exact points with a = 2, b = 0.5.
/// let t = [0.0, 1.0, 2.0];
/// let obs: Vec<f64> = t.iter().map(|&ti: &f64| 2.0 * (0.5 * ti).exp()).collect();
/// let fun = NoneAux(|p: &[Dual64], data: &(Vec<f64>, Vec<f64>)| {
///     data.0
///         .iter()
///         .zip(&data.1)
///         .map(|(&ti, &oi)| p[0] * (p[1] * ti).exp() - oi)
///         .collect::<Vec<_>>()
/// });
/// let sol = least_squares(
///     fun,
///     &GaussNewton::<f64>::default(),
///     &[1.0, 0.0],
///     &(t.to_vec(), obs),
///     &(),
///     &LeastSquaresOptions::default(),
/// )
/// .unwrap();
/// assert!((sol.value[0] - 2.0).abs() < 1e-6);
/// assert!((sol.value[1] - 0.5).abs() < 1e-6);
/// ```
pub fn least_squares<F, A, Fun, S, T>(
    fun: Fun,
    solver: &S,
    y0: &[T],
    args: &A,
    options: &S::Options,
    solve_options: &LeastSquaresOptions<F>,
) -> LeastSquaresResult<F, S::Aux>
where
    F: Float,
    T: ToPrimitive,
    Fun: ResidualFn<F, A>,
    S: LeastSquaresMethod<F, A, Fun>,
{
    let y0: Vec<F> = inexact_asarray(y0);
    solver.solve_least_squares(fun, &y0, args, options, solve_options)
}

/// Options with tags removed, logging when any were given.
fn without_tags<F: Float>(solve_options: &SolveOptions<F>, target: &str) -> SolveOptions<F> {
    if !solve_options.tags.is_empty() {
        debug!(
            "least squares: discarding tags {:?} when delegating to a {}",
            solve_options.tags, target
        );
    }
    SolveOptions {
        tags: Tags::new(),
        ..solve_options.clone()
    }
}

/// Minimise `sum(fun(y)^2)` with a minimiser.
pub fn least_squares_via_minimiser<F, A, Fun, S>(
    fun: Fun,
    solver: &S,
    y0: &[F],
    args: &A,
    options: &S::Options,
    solve_options: &LeastSquaresOptions<F>,
) -> LeastSquaresResult<F, S::Aux>
where
    F: Float,
    Fun: ResidualFn<F, A>,
    S: Minimiser + IterativeSolver<F, ToMinimiseFn<Fun>, A, Y = Vec<F>>,
{
    let solve_options = without_tags(solve_options, "minimiser");
    minimise(&ToMinimiseFn(fun), solver, y0, args, options, &solve_options)
}

/// Solve `fun(y) = 0` with a root finder.
pub fn least_squares_via_root_finder<F, A, Fun, S>(
    fun: Fun,
    solver: &S,
    y0: &[F],
    args: &A,
    options: &S::Options,
    solve_options: &LeastSquaresOptions<F>,
) -> LeastSquaresResult<F, S::Aux>
where
    F: Float,
    Fun: ResidualFn<F, A>,
    S: RootFinder + IterativeSolver<F, Fun, A, Y = Vec<F>>,
{
    let solve_options = without_tags(solve_options, "root finder");
    root_find(&fun, solver, y0, args, options, &solve_options)
}

/// Iterate a dedicated least-squares solver on the residual.
///
/// The stationarity condition handed to the adjoint is the gradient of
/// `sum(r(y)^2)`, evaluated once at the final candidate.
pub fn least_squares_direct<F, A, Fun, S>(
    fun: Fun,
    solver: &S,
    y0: &[F],
    args: &A,
    options: &S::Options,
    solve_options: &LeastSquaresOptions<F>,
) -> LeastSquaresResult<F, S::Aux>
where
    F: Float,
    Fun: ResidualFn<F, A>,
    S: LeastSquaresSolver + IterativeSolver<F, Fun, A, Y = Vec<F>>,
{
    let f_struct = eval_shape(&fun, y0, args);
    let rewrite = |y: &Vec<F>| stationarity(&fun, y, args);
    iterative_solve(
        &fun,
        solver,
        y0.to_vec(),
        args,
        options,
        &f_struct,
        solve_options,
        Some(&rewrite),
    )
}

/// `∇_y sum(r(y)^2) = 2 J^T r`.
pub fn stationarity<F, A, Fun>(fun: &Fun, y: &[F], args: &A) -> Vec<F>
where
    F: Float,
    Fun: ResidualFn<F, A>,
{
    let (r, jac, _) = residual_jacobian(fun, y, args);
    let two = F::one() + F::one();
    mat_t_vec(&jac, &r, y.len())
        .into_iter()
        .map(|g| two * g)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{eval_objective, objective_grad, NoneAux};
    use approx::assert_relative_eq;
    use tangent::Dual64;

    fn residual(y: &[Dual64], _: &()) -> Vec<Dual64> {
        vec![y[0] - 1.0, (y[1] + 2.0) * 3.0]
    }

    #[test]
    fn to_minimise_sums_squares() {
        let obj = ToMinimiseFn(NoneAux(residual));
        let (f, ()) = eval_objective(&obj, &[2.0, -1.0], &());
        assert_relative_eq!(f, 1.0 + 9.0);
    }

    #[test]
    fn stationarity_is_gradient_of_sum_of_squares() {
        let fun = NoneAux(residual);
        let y = [2.0, -1.0];
        let (_, g, ()) = objective_grad(&ToMinimiseFn(fun), &y, &());
        let s = stationarity(&fun, &y, &());
        assert_relative_eq!(s[0], g[0], epsilon = 1e-12);
        assert_relative_eq!(s[1], g[1], epsilon = 1e-12);
    }

    #[test]
    fn discarding_tags_keeps_the_rest() {
        let opts = SolveOptions::<f64>::default()
            .with_max_steps(Some(7))
            .with_tags(Tags::new().with(crate::iterate::Tag::Symmetric));
        let stripped = without_tags(&opts, "minimiser");
        assert!(stripped.tags.is_empty());
        assert_eq!(stripped.max_steps, Some(7));
    }
}
