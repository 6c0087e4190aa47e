use std::sync::Arc;

use tangent::Float;

use crate::error::{OptimError, OptimResult};
use crate::function::OutputStructure;
use crate::iterate::{IterativeSolver, Tags};
use crate::operator::LinearOperator;
use crate::result::Status;
use crate::tree::{inner_prod, tree_where, tree_zeros_like};

/// Side-channel data an outer solver passes to its line search.
#[derive(Debug, Clone)]
pub struct LineSearchOptions<F> {
    /// Descent vector: the gradient, or the residual in Gauss-Newton mode.
    pub vector: Option<Vec<F>>,
    /// Local linear model: the Jacobian in Gauss-Newton mode.
    pub operator: Option<Arc<dyn LinearOperator<F>>>,
    /// Template for the step difference (its length fixes the problem size).
    pub diff: Option<Vec<F>>,
    /// Objective value at the current position, if already known.
    pub f0: Option<F>,
    /// Whether `f0` must still be measured; read only when `f0` is given.
    pub compute_f0: Option<bool>,
    /// Initial step multiplier.
    pub init_line_search: Option<F>,
}

impl<F> Default for LineSearchOptions<F> {
    fn default() -> Self {
        LineSearchOptions {
            vector: None,
            operator: None,
            diff: None,
            f0: None,
            compute_f0: None,
            init_line_search: None,
        }
    }
}

impl<F: Float> LineSearchOptions<F> {
    pub fn new(vector: Vec<F>, operator: Arc<dyn LinearOperator<F>>) -> Self {
        LineSearchOptions {
            vector: Some(vector),
            operator: Some(operator),
            ..Default::default()
        }
    }

    pub fn with_diff(mut self, diff: Vec<F>) -> Self {
        self.diff = Some(diff);
        self
    }

    /// Supply the objective value at the current position.
    pub fn with_f0(mut self, f0: F, compute_f0: bool) -> Self {
        self.f0 = Some(f0);
        self.compute_f0 = Some(compute_f0);
        self
    }

    pub fn with_init_line_search(mut self, init: F) -> Self {
        self.init_line_search = Some(init);
        self
    }
}

/// What the line-search function returns for a trial step multiplier.
#[derive(Debug, Clone)]
pub struct LineSearchEval<F, Aux> {
    /// Objective value at the trial point.
    pub f_val: F,
    /// Difference between the trial point and the current position.
    pub diff: Vec<F>,
    /// Payload of the underlying problem function.
    pub aux: Aux,
    /// Status of the evaluation.
    pub result: Status,
}

/// Payload returned by each line-search step.
#[derive(Debug, Clone)]
pub struct LineSearchAux<F, Aux> {
    /// Best objective value seen so far.
    pub running_min: F,
    /// Step difference that achieved `running_min`.
    pub running_min_diff: Vec<F>,
    /// Payload from this step's evaluation.
    pub aux: Aux,
    /// Status of this step's evaluation.
    pub result: Status,
    /// Suggested initial multiplier for the next line search.
    pub next_init: F,
}

/// A line search.
///
/// Line searches are also [`IterativeSolver`]s over a scalar step multiplier,
/// driven with a function `Fn(F) -> LineSearchEval<F, Aux>` and
/// [`LineSearchOptions`].
pub trait LineSearch<F: Float> {
    /// Initial step multiplier for a fresh search.
    fn first_init(&self, options: &LineSearchOptions<F>) -> F;
}

/// Backtracking line search with an Armijo sufficient-decrease test.
///
/// The first evaluation is always at a zero step, so that `f0` is measured at
/// the current position. Each later step tries `y` and proposes
/// `y · decrease_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BacktrackingArmijo<F> {
    gauss_newton: bool,
    backtrack_slope: F,
    decrease_factor: F,
}

impl<F: Float> BacktrackingArmijo<F> {
    /// Create a line search.
    ///
    /// Fails if `decrease_factor` is not in `(eps, 1)`.
    pub fn new(
        gauss_newton: bool,
        backtrack_slope: F,
        decrease_factor: F,
    ) -> OptimResult<Self> {
        if !(decrease_factor > F::epsilon() && decrease_factor < F::one()) {
            return Err(OptimError::InvalidConfig(format!(
                "decrease_factor must lie in (eps, 1), got {}",
                decrease_factor
            )));
        }
        Ok(BacktrackingArmijo {
            gauss_newton,
            backtrack_slope,
            decrease_factor,
        })
    }

    /// Gradient mode, slope 0.1, decrease factor 0.5.
    pub fn gradient() -> Self {
        BacktrackingArmijo {
            gauss_newton: false,
            backtrack_slope: F::lit(0.1),
            decrease_factor: F::lit(0.5),
        }
    }

    /// Gauss-Newton mode, slope 0.1, decrease factor 0.5.
    pub fn gauss_newton() -> Self {
        BacktrackingArmijo {
            gauss_newton: true,
            ..Self::gradient()
        }
    }

    pub fn is_gauss_newton(&self) -> bool {
        self.gauss_newton
    }

    pub fn backtrack_slope(&self) -> F {
        self.backtrack_slope
    }

    pub fn decrease_factor(&self) -> F {
        self.decrease_factor
    }
}

/// State of a [`BacktrackingArmijo`] search.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktrackingState<F> {
    /// Number of completed steps.
    pub step: usize,
    pub running_min: F,
    pub running_min_diff: Vec<F>,
    /// Objective value from the latest evaluation.
    pub f_val: F,
    /// Objective value at the zero step.
    pub f0: F,
    /// Step difference from the latest evaluation.
    pub diff: Vec<F>,
    /// `true` until the zero step has been evaluated.
    pub compute_f0: bool,
    pub result: Status,
    /// `operator^T·vector` in Gauss-Newton mode, `vector` otherwise.
    grad: Vec<F>,
}

impl<F, G, Aux> IterativeSolver<F, G, ()> for BacktrackingArmijo<F>
where
    F: Float,
    G: Fn(F) -> LineSearchEval<F, Aux>,
    Aux: Clone,
{
    type Y = F;
    type Options = LineSearchOptions<F>;
    type State = BacktrackingState<F>;
    type Aux = LineSearchAux<F, Aux>;

    fn init(
        &self,
        _fun: &G,
        _y: &F,
        _args: &(),
        options: &LineSearchOptions<F>,
        _f_struct: &OutputStructure,
        _tags: &Tags,
    ) -> OptimResult<BacktrackingState<F>> {
        let vector = options
            .vector
            .as_ref()
            .ok_or(OptimError::MissingOption("vector"))?;
        let operator = options
            .operator
            .as_ref()
            .ok_or(OptimError::MissingOption("operator"))?;

        let grad = if self.gauss_newton {
            if operator.out_size() != vector.len() {
                return Err(OptimError::DimensionMismatch {
                    what: "line search vector",
                    expected: operator.out_size(),
                    got: vector.len(),
                });
            }
            operator.transpose().mv(vector)
        } else {
            vector.clone()
        };

        let zeros = match &options.diff {
            Some(diff) if diff.len() != grad.len() => {
                return Err(OptimError::DimensionMismatch {
                    what: "line search diff",
                    expected: grad.len(),
                    got: diff.len(),
                });
            }
            Some(diff) => tree_zeros_like(diff),
            None => tree_zeros_like(&grad),
        };

        let (f0, compute_f0) = match options.f0 {
            Some(f0) => (f0, options.compute_f0.unwrap_or(false)),
            None => (F::infinity(), true),
        };

        Ok(BacktrackingState {
            step: 0,
            running_min: f0,
            running_min_diff: zeros.clone(),
            f_val: f0,
            f0,
            diff: zeros,
            compute_f0,
            result: Status::Successful,
            grad,
        })
    }

    fn step(
        &self,
        fun: &G,
        y: &F,
        _args: &(),
        _options: &LineSearchOptions<F>,
        state: &BacktrackingState<F>,
        _tags: &Tags,
    ) -> (F, BacktrackingState<F>, LineSearchAux<F, Aux>) {
        let delta = if state.compute_f0 { F::zero() } else { *y };
        let eval = fun(delta);

        let improved = eval.f_val < state.running_min;
        let running_min = if improved {
            eval.f_val
        } else {
            state.running_min
        };
        let running_min_diff = tree_where(improved, &eval.diff, &state.running_min_diff);
        let f0 = if state.compute_f0 { eval.f_val } else { state.f0 };
        let result = state.result.merge(eval.result);

        let new_state = BacktrackingState {
            step: state.step + 1,
            running_min,
            running_min_diff: running_min_diff.clone(),
            f_val: eval.f_val,
            f0,
            diff: eval.diff,
            compute_f0: false,
            result,
            grad: state.grad.clone(),
        };
        let aux = LineSearchAux {
            running_min,
            running_min_diff,
            aux: eval.aux,
            result: eval.result,
            next_init: F::one() / self.decrease_factor,
        };
        (self.decrease_factor * *y, new_state, aux)
    }

    fn terminate(
        &self,
        _fun: &G,
        y: &F,
        _args: &(),
        _options: &LineSearchOptions<F>,
        state: &BacktrackingState<F>,
        _tags: &Tags,
    ) -> (bool, Status) {
        let diverged = !y.is_finite() || (state.step > 0 && !state.f_val.is_finite());
        let result = Status::select(diverged, Status::NonlinearDivergence, state.result);

        let predicted = inner_prod(&state.grad, &state.diff);
        let finished = state.f_val < state.f0 + self.backtrack_slope * predicted
            && state.step > 1
            && predicted < F::zero();
        (finished, result)
    }

    fn buffers<'s>(&self, _state: &'s BacktrackingState<F>) -> Vec<&'s [F]> {
        Vec::new()
    }
}

impl<F: Float> LineSearch<F> for BacktrackingArmijo<F> {
    fn first_init(&self, options: &LineSearchOptions<F>) -> F {
        options
            .init_line_search
            .unwrap_or_else(|| F::one() / self.decrease_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::IdentityOperator;

    fn quadratic_search(y0: f64, d: f64) -> impl Fn(f64) -> LineSearchEval<f64, ()> {
        move |alpha| {
            let y = y0 + alpha * d;
            LineSearchEval {
                f_val: y * y,
                diff: vec![alpha * d],
                aux: (),
                result: Status::Successful,
            }
        }
    }

    #[test]
    fn rejects_decrease_factor_outside_unit_interval() {
        assert!(BacktrackingArmijo::new(false, 0.1, 0.0_f64).is_err());
        assert!(BacktrackingArmijo::new(false, 0.1, -0.5_f64).is_err());
        assert!(BacktrackingArmijo::new(false, 0.1, 1.0_f64).is_err());
        assert!(BacktrackingArmijo::new(false, 0.1, f64::NAN).is_err());
        assert!(BacktrackingArmijo::new(false, 0.1, 0.5_f64).is_ok());
    }

    #[test]
    fn first_init_prefers_option() {
        let ls = BacktrackingArmijo::<f64>::gradient();
        let opts = LineSearchOptions::default();
        assert_eq!(ls.first_init(&opts), 2.0);
        let opts = opts.with_init_line_search(0.25);
        assert_eq!(ls.first_init(&opts), 0.25);
    }

    #[test]
    fn init_requires_vector_and_operator() {
        let ls = BacktrackingArmijo::<f64>::gradient();
        let fun = quadratic_search(1.0, -1.0);
        let opts = LineSearchOptions {
            operator: Some(Arc::new(IdentityOperator { size: 1 })),
            ..Default::default()
        };
        let err = ls
            .init(&fun, &1.0, &(), &opts, &OutputStructure::SCALAR, &Tags::new())
            .unwrap_err();
        assert_eq!(err, OptimError::MissingOption("vector"));

        let opts = LineSearchOptions {
            vector: Some(vec![2.0]),
            ..Default::default()
        };
        let err = ls
            .init(&fun, &1.0, &(), &opts, &OutputStructure::SCALAR, &Tags::new())
            .unwrap_err();
        assert_eq!(err, OptimError::MissingOption("operator"));
    }

    #[test]
    fn first_step_measures_zero_step() {
        let ls = BacktrackingArmijo::<f64>::gradient();
        let fun = quadratic_search(1.0, -2.0);
        let opts = LineSearchOptions::new(vec![2.0], Arc::new(IdentityOperator { size: 1 }));
        let state = ls
            .init(&fun, &2.0, &(), &opts, &OutputStructure::SCALAR, &Tags::new())
            .unwrap();
        assert!(state.compute_f0);
        assert_eq!(state.f0, f64::INFINITY);

        let (y, state, aux) = ls.step(&fun, &2.0, &(), &opts, &state, &Tags::new());
        assert_eq!(y, 1.0);
        assert_eq!(state.f0, 1.0);
        assert_eq!(state.diff, vec![0.0]);
        assert_eq!(aux.running_min, 1.0);
        assert!(!state.compute_f0);
    }
}
