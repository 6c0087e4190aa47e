use num_traits::Float;

use crate::tree::{max_norm, two_norm};

/// Norm used to measure step and objective changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Norm {
    /// `max_i |v_i|` (default).
    #[default]
    Max,
    /// Euclidean norm.
    Two,
}

impl Norm {
    /// Evaluate the norm of `v`.
    pub fn apply<F: Float>(self, v: &[F]) -> F {
        match self {
            Norm::Max => max_norm(v),
            Norm::Two => two_norm(v),
        }
    }
}

/// Parameters controlling convergence checks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceParams<F> {
    /// Relative tolerance on both the candidate and the objective.
    pub rtol: F,
    /// Absolute tolerance on both the candidate and the objective.
    pub atol: F,
    /// Norm used to compare scaled changes against one.
    pub norm: Norm,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            rtol: 1e-8,
            atol: 1e-8,
            norm: Norm::Max,
        }
    }
}

impl Default for ConvergenceParams<f32> {
    fn default() -> Self {
        ConvergenceParams {
            rtol: 1e-5,
            atol: 1e-5,
            norm: Norm::Max,
        }
    }
}

impl<F: Float> ConvergenceParams<F> {
    /// Create parameters with the given tolerances and the max norm.
    pub fn new(rtol: F, atol: F) -> Self {
        ConvergenceParams {
            rtol,
            atol,
            norm: Norm::Max,
        }
    }

    /// Set the norm.
    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    /// Cauchy termination: both the step and the change in objective are small
    /// relative to `atol + rtol·|·|`, elementwise.
    pub fn cauchy_converged(&self, y: &[F], y_diff: &[F], f: &[F], f_diff: &[F]) -> bool {
        self.scaled_small(y, y_diff) && self.scaled_small(f, f_diff)
    }

    fn scaled_small(&self, x: &[F], diff: &[F]) -> bool {
        debug_assert_eq!(x.len(), diff.len());
        let scaled: Vec<F> = x
            .iter()
            .zip(diff)
            .map(|(&xi, &di)| di / (self.atol + self.rtol * xi.abs()))
            .collect();
        self.norm.apply(&scaled) < F::one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_steps_converge() {
        let params = ConvergenceParams::<f64>::default();
        assert!(params.cauchy_converged(&[1.0, 2.0], &[1e-10, 0.0], &[3.0], &[1e-12]));
    }

    #[test]
    fn large_objective_change_does_not_converge() {
        let params = ConvergenceParams::<f64>::default();
        assert!(!params.cauchy_converged(&[1.0], &[0.0], &[3.0], &[1.0]));
    }

    #[test]
    fn nan_change_never_converges() {
        let params = ConvergenceParams::<f64>::default().with_norm(Norm::Two);
        assert!(!params.cauchy_converged(&[1.0], &[f64::NAN], &[1.0], &[0.0]));
    }
}
