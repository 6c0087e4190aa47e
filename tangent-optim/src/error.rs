//! Error types for structural misconfiguration and raised solve failures.
//!
//! Numerical outcomes are reported through [`Status`]; the types here cover
//! mistakes that are detected eagerly, before any iteration begins, and the
//! failure raised at the call boundary when `throw` is set.

use thiserror::Error;

use crate::result::{Solution, Status};

/// Result type for solver construction and initialisation.
pub type OptimResult<T> = Result<T, OptimError>;

/// A solver was configured or called in a way that can never succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimError {
    /// A constructor parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required side-channel option was not supplied.
    #[error("`{0}` must be passed via the line search options")]
    MissingOption(&'static str),

    /// Two inputs that must agree in size do not.
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Error returned by the public entry points.
#[derive(Debug, Error)]
pub enum SolveError<Y, Aux> {
    /// Misconfiguration detected before the loop started.
    #[error(transparent)]
    Config(#[from] OptimError),

    /// The loop finished with a non-successful status and `throw` was set.
    #[error("solve failed after {} steps: {result}", .solution.stats.num_steps)]
    Failed {
        result: Status,
        solution: Box<Solution<Y, Aux>>,
    },
}

impl<Y, Aux> SolveError<Y, Aux> {
    /// The status carried by a raised failure, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            SolveError::Config(_) => None,
            SolveError::Failed { result, .. } => Some(*result),
        }
    }

    /// Recover the best candidate from a raised failure.
    pub fn into_solution(self) -> Option<Solution<Y, Aux>> {
        match self {
            SolveError::Config(_) => None,
            SolveError::Failed { solution, .. } => Some(*solution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Stats;

    #[test]
    fn missing_option_message_names_the_key() {
        let err = OptimError::MissingOption("vector");
        assert_eq!(
            err.to_string(),
            "`vector` must be passed via the line search options"
        );
    }

    #[test]
    fn failed_carries_the_solution() {
        let err: SolveError<Vec<f64>, ()> = SolveError::Failed {
            result: Status::MaxStepsReached,
            solution: Box::new(Solution {
                value: vec![1.0],
                result: Status::MaxStepsReached,
                aux: None,
                stats: Stats {
                    num_steps: 3,
                    max_steps: Some(3),
                },
            }),
        };
        assert_eq!(
            err.to_string(),
            "solve failed after 3 steps: maximum number of steps reached"
        );
        assert_eq!(err.status(), Some(Status::MaxStepsReached));
        assert_eq!(err.into_solution().map(|s| s.value), Some(vec![1.0]));
    }
}
