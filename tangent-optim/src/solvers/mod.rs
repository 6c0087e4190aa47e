//! Concrete solvers built on the iterative-solver protocol.

pub mod gauss_newton;
pub mod lbfgs;
