use std::fmt;

/// Outcome of a solve, threaded through every solver transition.
///
/// Numerical failures are values of this type, never panics or errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Converged within the step budget.
    #[default]
    Successful,
    /// The step budget was exhausted before `terminate` reported done.
    MaxStepsReached,
    /// A non-finite value was produced during a step.
    NonlinearDivergence,
    /// A linear solve met a matrix it could not handle.
    SingularMatrix,
}

impl Status {
    /// `true` for [`Status::Successful`].
    #[inline]
    pub fn is_successful(self) -> bool {
        self == Status::Successful
    }

    /// `if_true` when `cond` holds, otherwise `if_false`.
    #[inline]
    pub fn select(cond: bool, if_true: Status, if_false: Status) -> Status {
        if cond {
            if_true
        } else {
            if_false
        }
    }

    /// Combine with a later status, keeping the first failure.
    ///
    /// A failed run is never reset to successful by a later transition.
    #[inline]
    pub fn merge(self, later: Status) -> Status {
        if self.is_successful() {
            later
        } else {
            self
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Successful => write!(f, "successful"),
            Status::MaxStepsReached => write!(f, "maximum number of steps reached"),
            Status::NonlinearDivergence => write!(f, "nonlinear solve diverged"),
            Status::SingularMatrix => write!(f, "singular matrix encountered"),
        }
    }
}

/// Statistics recorded by the driving loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Number of `step` calls performed.
    pub num_steps: usize,
    /// The step budget in force (`None` if unbounded).
    pub max_steps: Option<usize>,
}

/// Result of a solve.
#[derive(Debug, Clone)]
pub struct Solution<Y, Aux> {
    /// Final candidate.
    pub value: Y,
    /// Terminal status.
    pub result: Status,
    /// Auxiliary payload from the last function evaluation, `None` if no step ran.
    pub aux: Option<Aux>,
    /// Loop statistics.
    pub stats: Stats,
}
