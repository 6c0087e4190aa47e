use tangent::Float;

use crate::error::SolveError;
use crate::function::{objective_grad, ObjectiveFn, OutputStructure};
use crate::iterate::{iterative_solve, IterativeSolver, SolveOptions};
use crate::result::Solution;

/// Marker for solvers that minimise a scalar objective.
pub trait Minimiser {}

/// Minimise `fun` starting from `y0`.
///
/// The gradient of the objective at the solution is the stationarity
/// condition handed to the adjoint.
pub fn minimise<F, A, Fun, S>(
    fun: &Fun,
    solver: &S,
    y0: &[F],
    args: &A,
    options: &S::Options,
    solve_options: &SolveOptions<F>,
) -> Result<Solution<Vec<F>, S::Aux>, SolveError<Vec<F>, S::Aux>>
where
    F: Float,
    Fun: ObjectiveFn<F, A>,
    S: Minimiser + IterativeSolver<F, Fun, A, Y = Vec<F>>,
{
    let rewrite = |y: &Vec<F>| objective_grad(fun, y, args).1;
    iterative_solve(
        fun,
        solver,
        y0.to_vec(),
        args,
        options,
        &OutputStructure::SCALAR,
        solve_options,
        Some(&rewrite),
    )
}
