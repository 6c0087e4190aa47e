//! Implicit differentiation of a converged solve.
//!
//! Given a condition `c(y, θ) = 0` that holds at the solution `y*(θ)`, the
//! implicit function theorem gives `dy*/dθ = -C_y⁺ · C_θ`, where `C_y` and
//! `C_θ` are the partial Jacobians of `c`. No forward iteration is unrolled.

use tangent::{Dual, Float};
use tracing::warn;

use crate::linalg::{mat_t_vec, mat_vec};
use crate::linear_solver::{LinearSolver, Qr};
use crate::operator::MatrixOperator;
use crate::result::Status;
use crate::tree::max_norm;

/// Sensitivities of a solution through its stationarity condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplicitAdjoint<F> {
    /// Solver for the linear systems in `C_y`.
    pub linear_solver: Qr<F>,
    /// The stationarity residual is reported when its max norm exceeds this.
    pub stationarity_tol: F,
}

impl<F: Float> Default for ImplicitAdjoint<F> {
    fn default() -> Self {
        ImplicitAdjoint {
            linear_solver: Qr::new(),
            stationarity_tol: F::lit(1e-6),
        }
    }
}

impl<F: Float> ImplicitAdjoint<F> {
    /// Use a specific linear solver.
    pub fn with_linear_solver(mut self, linear_solver: Qr<F>) -> Self {
        self.linear_solver = linear_solver;
        self
    }

    /// Set the stationarity tolerance used by [`apply`](Self::apply).
    pub fn with_stationarity_tol(mut self, tol: F) -> Self {
        self.stationarity_tol = tol;
        self
    }

    /// Forward pass: the primal solution is returned unchanged.
    ///
    /// `stationarity` is the rewrite condition evaluated at the solution; a
    /// warning is logged when it is far from zero, since derivatives taken
    /// through it would then be meaningless.
    pub fn apply<Y>(&self, value: Y, stationarity: &[F]) -> Y {
        let norm = max_norm(stationarity);
        if norm > self.stationarity_tol || norm.is_nan() {
            warn!(
                "implicit adjoint: stationarity residual {} exceeds {}; \
                 derivatives through this solution may be meaningless",
                norm, self.stationarity_tol
            );
        }
        value
    }

    /// Full implicit Jacobian `dy*/dθ` (`n_y × n_θ`).
    pub fn jacobian<C>(&self, condition: C, y: &[F], theta: &[F]) -> (Vec<Vec<F>>, Status)
    where
        C: Fn(&[Dual<F>], &[Dual<F>]) -> Vec<Dual<F>>,
    {
        let (c_y, c_theta) = partial_jacobians(&condition, y, theta);
        let state = self.linear_solver.init(&MatrixOperator::new(c_y));
        let mut result = Status::Successful;
        let mut jac = vec![vec![F::zero(); theta.len()]; y.len()];
        for j in 0..theta.len() {
            let neg_col: Vec<F> = c_theta.iter().map(|row| -row[j]).collect();
            let (col, status) = self.linear_solver.compute(&state, &neg_col);
            result = result.merge(status);
            for (row, v) in jac.iter_mut().zip(col) {
                row[j] = v;
            }
        }
        (jac, result)
    }

    /// Implicit tangent `dy*/dθ · θ̇`.
    pub fn tangent<C>(
        &self,
        condition: C,
        y: &[F],
        theta: &[F],
        theta_dot: &[F],
    ) -> (Vec<F>, Status)
    where
        C: Fn(&[Dual<F>], &[Dual<F>]) -> Vec<Dual<F>>,
    {
        assert_eq!(
            theta_dot.len(),
            theta.len(),
            "theta_dot length ({}) must equal theta length ({})",
            theta_dot.len(),
            theta.len()
        );
        let (c_y, c_theta) = partial_jacobians(&condition, y, theta);
        let rhs: Vec<F> = mat_vec(&c_theta, theta_dot).into_iter().map(|v| -v).collect();
        let state = self.linear_solver.init(&MatrixOperator::new(c_y));
        self.linear_solver.compute(&state, &rhs)
    }

    /// Implicit vector-Jacobian product `(dy*/dθ)^T · ȳ`.
    ///
    /// Solves `C_y^T · λ = ȳ` through the transposed factorisation, then
    /// returns `-C_θ^T · λ`.
    pub fn vjp<C>(&self, condition: C, y: &[F], theta: &[F], y_bar: &[F]) -> (Vec<F>, Status)
    where
        C: Fn(&[Dual<F>], &[Dual<F>]) -> Vec<Dual<F>>,
    {
        assert_eq!(
            y_bar.len(),
            y.len(),
            "y_bar length ({}) must equal y length ({})",
            y_bar.len(),
            y.len()
        );
        let (c_y, c_theta) = partial_jacobians(&condition, y, theta);
        let state = self.linear_solver.init(&MatrixOperator::new(c_y));
        let state_t = self.linear_solver.transpose(&state);
        let (lambda, status) = self.linear_solver.compute(&state_t, y_bar);
        let theta_bar = mat_t_vec(&c_theta, &lambda, theta.len())
            .into_iter()
            .map(|v| -v)
            .collect();
        (theta_bar, status)
    }
}

/// Jacobian of `c` at `[y, θ]`, split into `(C_y, C_θ)`.
fn partial_jacobians<F, C>(condition: &C, y: &[F], theta: &[F]) -> (Vec<Vec<F>>, Vec<Vec<F>>)
where
    F: Float,
    C: Fn(&[Dual<F>], &[Dual<F>]) -> Vec<Dual<F>>,
{
    let n_y = y.len();
    let mut inputs = Vec::with_capacity(n_y + theta.len());
    inputs.extend_from_slice(y);
    inputs.extend_from_slice(theta);

    let (values, jac) =
        tangent::jacobian(|d: &[Dual<F>]| condition(&d[..n_y], &d[n_y..]), &inputs);
    let norm = max_norm(&values);
    if norm > F::lit(1e-6) || norm.is_nan() {
        warn!(
            "implicit differentiation called with |c(y, theta)| = {}; y may not be a solution",
            norm
        );
    }

    jac.into_iter()
        .map(|mut row| {
            let c_theta = row.split_off(n_y);
            (row, c_theta)
        })
        .unzip()
}
