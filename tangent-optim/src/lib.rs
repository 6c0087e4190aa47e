//! Iterative nonlinear solvers built on forward-mode differentiation.
//!
//! Every solver implements the [`IterativeSolver`] protocol and is driven by
//! [`iterative_solve`]. Least-squares problems are dispatched by
//! [`least_squares`] to a minimiser, a root finder or a dedicated
//! least-squares solver. Numerical outcomes are reported as [`Status`] values;
//! only structural misconfiguration is an error.

pub mod adjoint;
pub mod convergence;
pub mod error;
pub mod function;
pub mod iterate;
pub mod least_squares;
pub mod line_search;
pub mod linalg;
pub mod linear_solver;
pub mod minimise;
pub mod operator;
pub mod result;
pub mod root_find;
pub mod solvers;
pub mod tree;

pub use adjoint::ImplicitAdjoint;
pub use convergence::{ConvergenceParams, Norm};
pub use error::{OptimError, OptimResult, SolveError};
pub use function::{NoneAux, ObjectiveFn, OutputStructure, ResidualFn};
pub use iterate::{iterative_solve, IterativeSolver, SolveOptions, Tag, Tags};
pub use least_squares::{
    least_squares, LeastSquaresMethod, LeastSquaresOptions, LeastSquaresSolver, ToMinimiseFn,
};
pub use line_search::{
    BacktrackingArmijo, BacktrackingState, LineSearch, LineSearchAux, LineSearchEval,
    LineSearchOptions,
};
pub use linear_solver::{LinearSolver, Qr, QrState};
pub use minimise::{minimise, Minimiser};
pub use operator::{IdentityOperator, LinearOperator, MatrixOperator};
pub use result::{Solution, Stats, Status};
pub use root_find::{root_find, RootFinder};
pub use solvers::gauss_newton::{GaussNewton, GaussNewtonState};
pub use solvers::lbfgs::{Lbfgs, LbfgsState};
