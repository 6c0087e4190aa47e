use std::sync::Arc;

use tangent::Float;
use tracing::{trace, warn};

use crate::convergence::ConvergenceParams;
use crate::error::OptimResult;
use crate::function::{eval_objective, objective_grad, ObjectiveFn, OutputStructure, ResidualFn};
use crate::iterate::{iterative_solve, IterativeSolver, SolveOptions, Tags};
use crate::least_squares::{
    least_squares_via_minimiser, LeastSquaresMethod, LeastSquaresOptions, LeastSquaresResult,
};
use crate::line_search::{BacktrackingArmijo, LineSearch, LineSearchEval, LineSearchOptions};
use crate::minimise::Minimiser;
use crate::operator::IdentityOperator;
use crate::result::Status;
use crate::tree::{all_finite, axpy, inner_prod, scale, tree_zeros_like};

/// L-BFGS minimiser.
///
/// Builds its search direction with the two-loop recursion over the most recent
/// `memory` curvature pairs, then backtracks along it with an Armijo line search.
#[derive(Debug, Clone)]
pub struct Lbfgs<F> {
    /// Number of recent (s, y) pairs to store (default: 10).
    pub memory: usize,
    /// Cauchy termination tolerances.
    pub convergence: ConvergenceParams<F>,
    /// Line search along the quasi-Newton direction.
    pub line_search: BacktrackingArmijo<F>,
    /// Step budget of each line search.
    pub line_search_max_steps: usize,
}

impl Default for Lbfgs<f64> {
    fn default() -> Self {
        Lbfgs {
            memory: 10,
            convergence: ConvergenceParams::default(),
            line_search: BacktrackingArmijo::gradient(),
            line_search_max_steps: 32,
        }
    }
}

impl Default for Lbfgs<f32> {
    fn default() -> Self {
        Lbfgs {
            memory: 10,
            convergence: ConvergenceParams::default(),
            line_search: BacktrackingArmijo::gradient(),
            line_search_max_steps: 24,
        }
    }
}

impl<F: Float> Lbfgs<F> {
    pub fn new(rtol: F, atol: F) -> Self {
        Lbfgs {
            memory: 10,
            convergence: ConvergenceParams::new(rtol, atol),
            line_search: BacktrackingArmijo::gradient(),
            line_search_max_steps: 32,
        }
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory.max(1);
        self
    }

    pub fn with_line_search(mut self, line_search: BacktrackingArmijo<F>) -> Self {
        self.line_search = line_search;
        self
    }
}

/// State of an [`Lbfgs`] solve.
#[derive(Debug, Clone)]
pub struct LbfgsState<F> {
    /// Number of completed steps.
    pub step: usize,
    /// Objective and gradient at the current candidate, once evaluated.
    pub f: F,
    pub grad: Option<Vec<F>>,
    /// Decrease of the objective over the last step.
    pub f_diff: F,
    /// Last accepted step.
    pub y_diff: Vec<F>,
    pub result: Status,
    s_hist: Vec<Vec<F>>,
    y_hist: Vec<Vec<F>>,
    rho_hist: Vec<F>,
}

impl<F, A, Fun> IterativeSolver<F, Fun, A> for Lbfgs<F>
where
    F: Float,
    Fun: ObjectiveFn<F, A>,
{
    type Y = Vec<F>;
    type Options = ();
    type State = LbfgsState<F>;
    type Aux = Fun::Aux;

    fn init(
        &self,
        _fun: &Fun,
        y: &Vec<F>,
        _args: &A,
        _options: &(),
        _f_struct: &OutputStructure,
        _tags: &Tags,
    ) -> OptimResult<LbfgsState<F>> {
        Ok(LbfgsState {
            step: 0,
            f: F::infinity(),
            grad: None,
            f_diff: F::infinity(),
            y_diff: tree_zeros_like(y),
            result: Status::Successful,
            s_hist: Vec::with_capacity(self.memory),
            y_hist: Vec::with_capacity(self.memory),
            rho_hist: Vec::with_capacity(self.memory),
        })
    }

    fn step(
        &self,
        fun: &Fun,
        y: &Vec<F>,
        args: &A,
        _options: &(),
        state: &LbfgsState<F>,
        _tags: &Tags,
    ) -> (Vec<F>, LbfgsState<F>, Fun::Aux) {
        let (f, grad) = match &state.grad {
            Some(grad) => (state.f, grad.clone()),
            None => {
                let (f, grad, _) = objective_grad(fun, y, args);
                (f, grad)
            }
        };

        let d = two_loop_recursion(&grad, &state.s_hist, &state.y_hist, &state.rho_hist);

        let search = |alpha: F| {
            let trial = axpy(alpha, &d, y);
            let (f_val, _) = eval_objective(fun, &trial, args);
            LineSearchEval {
                f_val,
                diff: scale(alpha, &d),
                aux: (),
                result: Status::Successful,
            }
        };
        let ls_options = LineSearchOptions::new(
            grad.clone(),
            Arc::new(IdentityOperator { size: y.len() }),
        );
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

        let (s, ls_result) = match ls {
            Ok(sol) => {
                trace!(
                    "lbfgs: line search {} after {} steps",
                    sol.result,
                    sol.stats.num_steps
                );
                let status = Status::select(
                    sol.result == Status::NonlinearDivergence,
                    Status::NonlinearDivergence,
                    Status::Successful,
                );
                let s = sol
                    .aux
                    .map_or_else(|| tree_zeros_like(y), |a| a.running_min_diff);
                (s, status)
            }
            Err(err) => {
                warn!("lbfgs: line search could not start: {}", err);
                (tree_zeros_like(y), Status::NonlinearDivergence)
            }
        };

        let new_y: Vec<F> = y.iter().zip(&s).map(|(&yi, &si)| yi + si).collect();
        let (f_new, grad_new, aux) = objective_grad(fun, &new_y, args);

        // Update history
        let mut s_hist = state.s_hist.clone();
        let mut y_hist = state.y_hist.clone();
        let mut rho_hist = state.rho_hist.clone();
        let yk: Vec<F> = grad_new.iter().zip(&grad).map(|(&gn, &g)| gn - g).collect();
        let sy = inner_prod(&s, &yk);
        if sy > F::zero() && self.memory > 0 {
            if s_hist.len() == self.memory {
                s_hist.remove(0);
                y_hist.remove(0);
                rho_hist.remove(0);
            }
            rho_hist.push(F::one() / sy);
            s_hist.push(s.clone());
            y_hist.push(yk);
        }

        let new_state = LbfgsState {
            step: state.step + 1,
            f: f_new,
            grad: Some(grad_new),
            f_diff: f - f_new,
            y_diff: s,
            result: state.result.merge(ls_result),
            s_hist,
            y_hist,
            rho_hist,
        };
        (new_y, new_state, aux)
    }

    fn terminate(
        &self,
        _fun: &Fun,
        y: &Vec<F>,
        _args: &A,
        _options: &(),
        state: &LbfgsState<F>,
        _tags: &Tags,
    ) -> (bool, Status) {
        let finite = all_finite(y) && (state.step == 0 || state.f.is_finite());
        let result = Status::select(finite, state.result, Status::NonlinearDivergence);
        if state.step == 0 {
            return (false, result);
        }
        let converged = self
            .convergence
            .cauchy_converged(y, &state.y_diff, &[state.f], &[state.f_diff]);
        (converged, result)
    }

    fn buffers<'s>(&self, _state: &'s LbfgsState<F>) -> Vec<&'s [F]> {
        Vec::new()
    }
}

impl<F> Minimiser for Lbfgs<F> {}

impl<F, A, Fun> LeastSquaresMethod<F, A, Fun> for Lbfgs<F>
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
        least_squares_via_minimiser(fun, self, y0, args, options, solve_options)
    }
}

/// L-BFGS two-loop recursion: compute d = -H_k * g_k.
fn two_loop_recursion<F: Float>(
    grad: &[F],
    s_hist: &[Vec<F>],
    y_hist: &[Vec<F>],
    rho_hist: &[F],
) -> Vec<F> {
    let k = s_hist.len();

    // First loop: newest to oldest
    let mut q: Vec<F> = grad.to_vec();
    let mut alpha = vec![F::zero(); k];
    for i in (0..k).rev() {
        alpha[i] = rho_hist[i] * inner_prod(&s_hist[i], &q);
        q = axpy(-alpha[i], &y_hist[i], &q);
    }

    // H_0 = gamma * I with gamma = s^T y / y^T y from the most recent pair
    let mut r = q;
    if let (Some(s), Some(y)) = (s_hist.last(), y_hist.last()) {
        let yy = inner_prod(y, y);
        if yy > F::zero() {
            r = scale(inner_prod(s, y) / yy, &r);
        }
    }

    // Second loop: oldest to newest
    for i in 0..k {
        let beta = rho_hist[i] * inner_prod(&y_hist[i], &r);
        r = axpy(alpha[i] - beta, &s_hist[i], &r);
    }

    scale(-F::one(), &r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::NoneAux;
    use crate::minimise::minimise;
    use approx::assert_abs_diff_eq;
    use tangent::Dual64;

    fn rosenbrock(x: &[Dual64], _: &()) -> Dual64 {
        let a = (x[0] * -1.0) + 1.0;
        let b = x[1] - x[0] * x[0];
        a * a + b * b * 100.0
    }

    #[test]
    fn lbfgs_rosenbrock() {
        let solver = Lbfgs::new(1e-10, 1e-10);
        let opts = SolveOptions::default().with_max_steps(Some(500));
        let sol =
            minimise(&NoneAux(rosenbrock), &solver, &[0.0, 0.0], &(), &(), &opts).unwrap();
        assert_eq!(sol.result, Status::Successful);
        assert_abs_diff_eq!(sol.value[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(sol.value[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn two_loop_without_history_is_steepest_descent() {
        let d = two_loop_recursion(&[1.0, -2.0], &[], &[], &[]);
        assert_eq!(d, vec![-1.0, 2.0]);
    }
}
