use std::sync::Arc;

use tangent::Float;
use tracing::{trace, warn};

use crate::convergence::ConvergenceParams;
use crate::error::{OptimError, OptimResult};
use crate::function::{eval_residual, residual_jacobian, OutputStructure, ResidualFn};
use crate::iterate::{iterative_solve, IterativeSolver, SolveOptions, Tags};
use crate::least_squares::{
    least_squares_direct, LeastSquaresMethod, LeastSquaresOptions, LeastSquaresResult,
    LeastSquaresSolver,
};
use crate::line_search::{BacktrackingArmijo, LineSearch, LineSearchEval, LineSearchOptions};
use crate::linear_solver::{LinearSolver, Qr};
use crate::operator::MatrixOperator;
use crate::result::Status;
use crate::tree::{all_finite, axpy, scale, sum_squares, tree_zeros_like};

/// Gauss-Newton least-squares solver.
///
/// Each step solves the linearised problem `J·d ≈ -r` with QR, then
/// backtracks along `d` with an Armijo line search in Gauss-Newton mode.
#[derive(Debug, Clone)]
pub struct GaussNewton<F> {
    /// Cauchy termination tolerances.
    pub convergence: ConvergenceParams<F>,
    /// Solver for the linearised step.
    pub linear_solver: Qr<F>,
    /// Line search along the Gauss-Newton direction.
    pub line_search: BacktrackingArmijo<F>,
    /// Step budget of each line search.
    pub line_search_max_steps: usize,
}

impl Default for GaussNewton<f64> {
    fn default() -> Self {
        GaussNewton {
            convergence: ConvergenceParams::default(),
            linear_solver: Qr::new(),
            line_search: BacktrackingArmijo::gauss_newton(),
            line_search_max_steps: 32,
        }
    }
}

impl Default for GaussNewton<f32> {
    fn default() -> Self {
        GaussNewton {
            convergence: ConvergenceParams::default(),
            linear_solver: Qr::new(),
            line_search: BacktrackingArmijo::gauss_newton(),
            line_search_max_steps: 24,
        }
    }
}

impl<F: Float> GaussNewton<F> {
    pub fn new(rtol: F, atol: F) -> Self {
        GaussNewton {
            convergence: ConvergenceParams::new(rtol, atol),
            linear_solver: Qr::new(),
            line_search: BacktrackingArmijo::gauss_newton(),
            line_search_max_steps: 32,
        }
    }

    /// Replace the line search; it must run in Gauss-Newton mode.
    pub fn with_line_search(
        mut self,
        line_search: BacktrackingArmijo<F>,
    ) -> OptimResult<Self> {
        if !line_search.is_gauss_newton() {
            return Err(OptimError::InvalidConfig(
                "GaussNewton needs a line search in Gauss-Newton mode".into(),
            ));
        }
        self.line_search = line_search;
        Ok(self)
    }

    pub fn with_line_search_max_steps(mut self, max_steps: usize) -> Self {
        self.line_search_max_steps = max_steps;
        self
    }

    pub fn with_linear_solver(mut self, linear_solver: Qr<F>) -> Self {
        self.linear_solver = linear_solver;
        self
    }
}

/// State of a [`GaussNewton`] solve.
#[derive(Debug, Clone)]
pub struct GaussNewtonState<F> {
    /// Number of completed steps.
    pub step: usize,
    /// `½·sum(r^2)` at the current candidate.
    pub f: F,
    /// Decrease of `½·sum(r^2)` over the last step.
    pub f_diff: F,
    /// Last accepted step.
    pub y_diff: Vec<F>,
    pub result: Status,
}

impl<F, A, Fun> IterativeSolver<F, Fun, A> for GaussNewton<F>
where
    F: Float,
    Fun: ResidualFn<F, A>,
{
    type Y = Vec<F>;
    type Options = ();
    type State = GaussNewtonState<F>;
    type Aux = Fun::Aux;

    fn init(
        &self,
        _fun: &Fun,
        y: &Vec<F>,
        _args: &A,
        _options: &(),
        _f_struct: &OutputStructure,
        _tags: &Tags,
    ) -> OptimResult<GaussNewtonState<F>> {
        Ok(GaussNewtonState {
            step: 0,
            f: F::infinity(),
            f_diff: F::infinity(),
            y_diff: tree_zeros_like(y),
            result: Status::Successful,
        })
    }

    fn step(
        &self,
        fun: &Fun,
        y: &Vec<F>,
        args: &A,
        _options: &(),
        state: &GaussNewtonState<F>,
        _tags: &Tags,
    ) -> (Vec<F>, GaussNewtonState<F>, Fun::Aux) {
        let (r, jac, aux) = residual_jacobian(fun, y, args);
        let half = F::lit(0.5);
        let f = half * sum_squares(&r);
        if !all_finite(&r) || !jac.iter().all(|row| all_finite(row)) {
            let new_state = GaussNewtonState {
                step: state.step + 1,
                f,
                f_diff: F::zero(),
                y_diff: tree_zeros_like(y),
                result: state.result.merge(Status::NonlinearDivergence),
            };
            return (y.clone(), new_state, aux);
        }

        let operator = MatrixOperator::new(jac);
        let qr = self.linear_solver.init(&operator);
        let (newton, linear_result) = self.linear_solver.compute(&qr, &r);
        let direction = scale(-F::one(), &newton);

        // Jᵀr is the gradient of ½·sum(r^2), so the search measures that.
        let search = |alpha: F| {
            let trial = axpy(alpha, &direction, y);
            let (r_trial, _) = eval_residual(fun, &trial, args);
            LineSearchEval {
                f_val: half * sum_squares(&r_trial),
                diff: scale(alpha, &direction),
                aux: (),
                result: Status::Successful,
            }
        };
        let ls_options = LineSearchOptions::new(r, Arc::new(operator)).with_diff(y.clone());
        let ls_solve = SolveOptions::default()
            .with_max_steps(Some(self.line_search_max_steps))
            .with_throw(false);
        let ls = iterative_solve(
            &search,
            &self.line_search,
            self.line_search.first_init(&ls_options),
            &(),
            &ls_options,
            &OutputStructure::SCALAR,
            &ls_solve,
            None,
        );

        let (y_diff, f_new, ls_result) = match ls {
            Ok(sol) => {
                trace!(
                    "gauss-newton: line search {} after {} steps",
                    sol.result,
                    sol.stats.num_steps
                );
                let status = Status::select(
                    sol.result == Status::NonlinearDivergence,
                    Status::NonlinearDivergence,
                    Status::Successful,
                );
                match sol.aux {
                    Some(ls_aux) => (ls_aux.running_min_diff, ls_aux.running_min, status),
                    None => (tree_zeros_like(y), f, status),
                }
            }
            Err(err) => {
                warn!("gauss-newton: line search could not start: {}", err);
                (tree_zeros_like(y), f, Status::NonlinearDivergence)
            }
        };

        let new_y: Vec<F> = y.iter().zip(&y_diff).map(|(&yi, &di)| yi + di).collect();
        let (_, new_aux) = eval_residual(fun, &new_y, args);
        let new_state = GaussNewtonState {
            step: state.step + 1,
            f: f_new,
            f_diff: f - f_new,
            y_diff,
            result: state.result.merge(linear_result).merge(ls_result),
        };
        (new_y, new_state, new_aux)
    }

    fn terminate(
        &self,
        _fun: &Fun,
        y: &Vec<F>,
        _args: &A,
        _options: &(),
        state: &GaussNewtonState<F>,
        _tags: &Tags,
    ) -> (bool, Status) {
        let result = Status::select(all_finite(y), state.result, Status::NonlinearDivergence);
        if state.step == 0 {
            return (false, result);
        }
        let converged = state.f == F::zero()
            || self
                .convergence
                .cauchy_converged(y, &state.y_diff, &[state.f], &[state.f_diff]);
        (converged, result)
    }

    fn buffers<'s>(&self, _state: &'s GaussNewtonState<F>) -> Vec<&'s [F]> {
        Vec::new()
    }
}

impl<F> LeastSquaresSolver for GaussNewton<F> {}

impl<F, A, Fun> LeastSquaresMethod<F, A, Fun> for GaussNewton<F>
where
    F: Float,
    Fun: ResidualFn<F, A>,
{
    type Options = ();
    type Aux = Fun::Aux;

    fn solve_least_squares(
        &self,
        fun: Fun,
        y0: &[F],
        args: &A,
        options: &(),
        solve_options: &LeastSquaresOptions<F>,
    ) -> LeastSquaresResult<F, Fun::Aux> {
        least_squares_direct(fun, self, y0, args, options, solve_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::NoneAux;
    use approx::assert_abs_diff_eq;
    use tangent::Dual64;

    #[test]
    fn linear_problem_converges() {
        // r(y) = A y - b with A full rank; solution is A^{-1} b
        let fun = NoneAux(|y: &[Dual64], _: &()| {
            vec![y[0] * 2.0 + y[1] - 3.0, y[0] - y[1], y[1] * 4.0 - 4.0]
        });
        let gn = GaussNewton::<f64>::default();
        let sol = least_squares_direct(
            fun,
            &gn,
            &[0.0, 0.0],
            &(),
            &(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert_eq!(sol.result, Status::Successful);
        assert_abs_diff_eq!(sol.value[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(sol.value[1], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn init_does_not_evaluate() {
        let gn = GaussNewton::<f64>::default();
        let calls = std::cell::Cell::new(0usize);
        let fun = NoneAux(|y: &[Dual64], _: &()| {
            calls.set(calls.get() + 1);
            vec![y[0]]
        });
        let state = gn
            .init(&fun, &vec![1.0], &(), &(), &OutputStructure { len: 1 }, &Tags::new())
            .unwrap();
        assert_eq!(state.step, 0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn accepted_step_satisfies_armijo_on_half_sum_of_squares() {
        // r(y) = atan(10y) from y = 1: the Newton step overshoots badly. On
        // the sum(r^2) scale alpha = 1/8 would already pass; on ½·sum(r^2)
        // it fails and the search backs off to alpha = 1/16.
        let fun = NoneAux(|y: &[Dual64], _: &()| vec![(y[0] * 10.0).atan()]);
        let gn = GaussNewton::<f64>::default();
        let tags = Tags::new();
        let y0 = vec![1.0];
        let state = gn
            .init(&fun, &y0, &(), &(), &OutputStructure { len: 1 }, &tags)
            .unwrap();
        let (y1, new_state, _) = gn.step(&fun, &y0, &(), &(), &state, &tags);

        let r0 = 10.0_f64.atan();
        let jac = 10.0 / 101.0;
        let newton = -r0 / jac;
        assert_abs_diff_eq!(y1[0], 1.0 + newton / 16.0, epsilon = 1e-10);

        let f0 = 0.5 * r0 * r0;
        let f1 = 0.5 * (10.0 * y1[0]).atan().powi(2);
        // Preset slope 0.1.
        assert!(f1 < f0 + 0.1 * jac * r0 * (y1[0] - y0[0]));
        assert_abs_diff_eq!(new_state.f, f1, epsilon = 1e-12);
        assert_abs_diff_eq!(new_state.f_diff, f0 - f1, epsilon = 1e-12);
        assert_eq!(new_state.result, Status::Successful);
    }

    #[test]
    fn rejects_gradient_mode_line_search() {
        let gn = GaussNewton::<f64>::default();
        assert!(gn.with_line_search(BacktrackingArmijo::gradient()).is_err());
    }
}
