use tangent::Float;

use crate::error::SolveError;
use crate::function::{eval_residual, eval_shape, ResidualFn};
use crate::iterate::{iterative_solve, IterativeSolver, SolveOptions};
use crate::result::Solution;

/// Marker for solvers that find a zero of a residual function.
pub trait RootFinder {}

/// Find `y` with `fun(y) = 0`, starting from `y0`.
///
/// The residual itself is the stationarity condition handed to the adjoint.
pub fn root_find<F, A, Fun, S>(
    fun: &Fun,
    solver: &S,
    y0: &[F],
    args: &A,
    options: &S::Options,
    solve_options: &SolveOptions<F>,
) -> Result<Solution<Vec<F>, S::Aux>, SolveError<Vec<F>, S::Aux>>
where
    F: Float,
    Fun: ResidualFn<F, A>,
    S: RootFinder + IterativeSolver<F, Fun, A, Y = Vec<F>>,
{
    let f_struct = eval_shape(fun, y0, args);
    let rewrite = |y: &Vec<F>| eval_residual(fun, y, args).0;
    iterative_solve(
        fun,
        solver,
        y0.to_vec(),
        args,
        options,
        &f_struct,
        solve_options,
        Some(&rewrite),
    )
}
