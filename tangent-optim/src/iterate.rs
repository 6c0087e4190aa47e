//! The iterative solver protocol and the loop that drives it.
//!
//! Every solver is a state machine with four operations:
//!
//! - `init` builds the initial state from shape metadata,
//! - `step` performs exactly one iteration and returns a new state,
//! - `terminate` decides whether to stop, without evaluating the function,
//! - `buffers` names the scratch parts of the state.
//!
//! [`iterative_solve`] runs `init`, then alternates `terminate` and `step` until
//! the solver reports done, a step fails, or the step budget is exhausted.

use std::collections::BTreeSet;

use tangent::Float;
use tracing::{debug, trace};

use crate::adjoint::ImplicitAdjoint;
use crate::error::{OptimResult, SolveError};
use crate::function::OutputStructure;
use crate::result::{Solution, Stats, Status};

/// A structural hint about the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tag {
    Symmetric,
    PositiveSemidefinite,
    NegativeSemidefinite,
    Diagonal,
    LowerTriangular,
    UpperTriangular,
    Unit,
}

/// A set of [`Tag`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tags(BTreeSet<Tag>);

impl Tags {
    /// No tags.
    pub fn new() -> Self {
        Tags(BTreeSet::new())
    }

    /// Add a tag.
    pub fn with(mut self, tag: Tag) -> Self {
        self.0.insert(tag);
        self
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Tags(iter.into_iter().collect())
    }
}

/// Contract shared by every iterative solver.
///
/// `F` is the scalar type, `Fun` the problem function and `A` its arguments.
/// States are values: `step` never mutates the state it is given.
pub trait IterativeSolver<F: Float, Fun, A> {
    /// Candidate solution.
    type Y: Clone;
    /// Per-solve options passed to every operation.
    type Options;
    /// Solver state carried between iterations.
    type State: Clone;
    /// Auxiliary payload returned by `step`.
    type Aux: Clone;

    /// Build the initial state.
    ///
    /// `f_struct` describes the function's output without evaluating it.
    /// Structural misconfiguration is reported here, before any step runs.
    fn init(
        &self,
        fun: &Fun,
        y: &Self::Y,
        args: &A,
        options: &Self::Options,
        f_struct: &OutputStructure,
        tags: &Tags,
    ) -> OptimResult<Self::State>;

    /// Perform one iteration.
    fn step(
        &self,
        fun: &Fun,
        y: &Self::Y,
        args: &A,
        options: &Self::Options,
        state: &Self::State,
        tags: &Tags,
    ) -> (Self::Y, Self::State, Self::Aux);

    /// Decide whether to stop, and with what status.
    fn terminate(
        &self,
        fun: &Fun,
        y: &Self::Y,
        args: &A,
        options: &Self::Options,
        state: &Self::State,
        tags: &Tags,
    ) -> (bool, Status);

    /// Parts of the state that are pure scratch space.
    fn buffers<'s>(&self, state: &'s Self::State) -> Vec<&'s [F]>;
}

/// Options shared by every public entry point.
#[derive(Debug, Clone)]
pub struct SolveOptions<F> {
    /// Step budget; `None` runs until the solver reports done.
    pub max_steps: Option<usize>,
    /// Convert a non-successful terminal status into an error.
    pub throw: bool,
    /// Structural hints forwarded to the solver.
    pub tags: Tags,
    /// Strategy for differentiating through the solution.
    pub adjoint: ImplicitAdjoint<F>,
}

impl<F: Float> Default for SolveOptions<F> {
    fn default() -> Self {
        SolveOptions {
            max_steps: Some(256),
            throw: true,
            tags: Tags::new(),
            adjoint: ImplicitAdjoint::default(),
        }
    }
}

impl<F: Float> SolveOptions<F> {
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_throw(mut self, throw: bool) -> Self {
        self.throw = throw;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_adjoint(mut self, adjoint: ImplicitAdjoint<F>) -> Self {
        self.adjoint = adjoint;
        self
    }
}

/// Drive `solver` from `y0` until it terminates or the budget runs out.
///
/// After the loop, a run that never reported done but carries no failure is
/// marked [`Status::MaxStepsReached`]. A failed status stops the loop and is
/// never reset. When `rewrite` is given, it is evaluated at the final
/// candidate and handed to the adjoint.
#[allow(clippy::too_many_arguments)]
pub fn iterative_solve<F, Fun, A, S>(
    fun: &Fun,
    solver: &S,
    y0: S::Y,
    args: &A,
    options: &S::Options,
    f_struct: &OutputStructure,
    solve_options: &SolveOptions<F>,
    rewrite: Option<&dyn Fn(&S::Y) -> Vec<F>>,
) -> Result<Solution<S::Y, S::Aux>, SolveError<S::Y, S::Aux>>
where
    F: Float,
    S: IterativeSolver<F, Fun, A>,
{
    let tags = &solve_options.tags;
    let max_steps = solve_options.max_steps;
    debug!("iterative solve: starting (max_steps = {:?})", max_steps);

    let mut state = solver.init(fun, &y0, args, options, f_struct, tags)?;
    let mut y = y0;
    let mut aux = None;
    let mut num_steps = 0usize;

    let (mut done, mut result) = solver.terminate(fun, &y, args, options, &state, tags);
    while !done && result.is_successful() && max_steps.map_or(true, |m| num_steps < m) {
        let (new_y, new_state, new_aux) = solver.step(fun, &y, args, options, &state, tags);
        y = new_y;
        state = new_state;
        aux = Some(new_aux);
        num_steps += 1;

        let (step_done, step_result) = solver.terminate(fun, &y, args, options, &state, tags);
        done = step_done;
        result = result.merge(step_result);
        trace!(
            "iterative solve: step {} done = {} result = {}",
            num_steps,
            done,
            result
        );
    }

    if result.is_successful() && !done {
        result = Status::MaxStepsReached;
    }
    debug!(
        "iterative solve: finished after {} steps with {}",
        num_steps, result
    );

    if result.is_successful() {
        if let Some(rewrite) = rewrite {
            let stationarity = rewrite(&y);
            y = solve_options.adjoint.apply(y, &stationarity);
        }
    }

    let solution = Solution {
        value: y,
        result,
        aux,
        stats: Stats {
            num_steps,
            max_steps,
        },
    };

    if solve_options.throw && !result.is_successful() {
        return Err(SolveError::Failed {
            result,
            solution: Box::new(solution),
        });
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Halves `y` each step and finishes once it falls below `tol`.
    struct Halving {
        tol: f64,
        steps: Cell<usize>,
    }

    impl IterativeSolver<f64, (), ()> for Halving {
        type Y = Vec<f64>;
        type Options = ();
        type State = usize;
        type Aux = f64;

        fn init(
            &self,
            _: &(),
            _: &Vec<f64>,
            _: &(),
            _: &(),
            _: &OutputStructure,
            _: &Tags,
        ) -> OptimResult<usize> {
            Ok(0)
        }

        fn step(
            &self,
            _: &(),
            y: &Vec<f64>,
            _: &(),
            _: &(),
            state: &usize,
            _: &Tags,
        ) -> (Vec<f64>, usize, f64) {
            self.steps.set(self.steps.get() + 1);
            (vec![y[0] * 0.5], state + 1, y[0])
        }

        fn terminate(
            &self,
            _: &(),
            y: &Vec<f64>,
            _: &(),
            _: &(),
            _: &usize,
            _: &Tags,
        ) -> (bool, Status) {
            let status = Status::select(
                y[0].is_finite(),
                Status::Successful,
                Status::NonlinearDivergence,
            );
            (y[0].abs() < self.tol, status)
        }

        fn buffers<'s>(&self, _: &'s usize) -> Vec<&'s [f64]> {
            Vec::new()
        }
    }

    fn halving(tol: f64) -> Halving {
        Halving {
            tol,
            steps: Cell::new(0),
        }
    }

    #[test]
    fn runs_until_done() {
        let solver = halving(0.1);
        let opts = SolveOptions::<f64>::default();
        let sol = iterative_solve(
            &(),
            &solver,
            vec![1.0],
            &(),
            &(),
            &OutputStructure { len: 1 },
            &opts,
            None,
        )
        .unwrap();
        assert_eq!(sol.result, Status::Successful);
        assert_eq!(sol.stats.num_steps, 4);
        assert_eq!(sol.value, vec![0.0625]);
        assert_eq!(sol.aux, Some(0.125));
    }

    #[test]
    fn zero_budget_never_steps() {
        let solver = halving(0.1);
        let opts = SolveOptions::<f64>::default()
            .with_max_steps(Some(0))
            .with_throw(false);
        let sol = iterative_solve(
            &(),
            &solver,
            vec![1.0],
            &(),
            &(),
            &OutputStructure { len: 1 },
            &opts,
            None,
        )
        .unwrap();
        assert_eq!(sol.result, Status::MaxStepsReached);
        assert_eq!(sol.stats.num_steps, 0);
        assert_eq!(solver.steps.get(), 0);
        assert!(sol.aux.is_none());
    }

    #[test]
    fn budget_exhaustion_raises_when_throwing() {
        let solver = halving(1e-300);
        let opts = SolveOptions::<f64>::default().with_max_steps(Some(3));
        let err = iterative_solve(
            &(),
            &solver,
            vec![1.0],
            &(),
            &(),
            &OutputStructure { len: 1 },
            &opts,
            None,
        )
        .unwrap_err();
        assert_eq!(err.status(), Some(Status::MaxStepsReached));
        let sol = err.into_solution().unwrap();
        assert_eq!(sol.value, vec![0.125]);
        assert_eq!(solver.steps.get(), 3);
    }

    #[test]
    fn non_finite_start_fails_without_stepping() {
        let solver = halving(0.1);
        let opts = SolveOptions::<f64>::default().with_throw(false);
        let sol = iterative_solve(
            &(),
            &solver,
            vec![f64::NAN],
            &(),
            &(),
            &OutputStructure { len: 1 },
            &opts,
            None,
        )
        .unwrap();
        assert_eq!(sol.result, Status::NonlinearDivergence);
        assert_eq!(solver.steps.get(), 0);
    }

    #[test]
    fn tags_collect_and_query() {
        let tags: Tags = [Tag::Symmetric, Tag::Diagonal].into_iter().collect();
        assert!(tags.contains(Tag::Symmetric));
        assert!(!tags.contains(Tag::Unit));
        assert_eq!(tags.iter().count(), 2);
        assert!(Tags::new().is_empty());
    }
}
