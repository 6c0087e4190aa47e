//! Linear solvers: reusable factorisations of a [`LinearOperator`].

use std::sync::Arc;

use num_traits::Float;

use crate::linalg::{
    householder_qr, mat_t_vec, mat_vec, solve_upper, solve_upper_transpose, transpose, QrFactors,
};
use crate::operator::LinearOperator;
use crate::result::Status;

/// A solver for `operator · x = vector` that factors once and solves many times.
pub trait LinearSolver<F: Float> {
    /// Factorisation produced by [`init`](LinearSolver::init).
    type State: Clone;

    /// Factor the operator.
    fn init(&self, operator: &dyn LinearOperator<F>) -> Self::State;

    /// Solve against a previously computed factorisation.
    fn compute(&self, state: &Self::State, vector: &[F]) -> (Vec<F>, Status);

    /// Factorisation state for the transposed system.
    fn transpose(&self, state: &Self::State) -> Self::State;

    /// Whether the solver may be handed singular operators.
    fn is_maybe_singular(&self) -> bool;
}

/// QR-based solver for square, rectangular and rank-deficient operators.
///
/// Tall or square systems are solved in the least-squares sense; wide systems
/// return the minimum-norm solution.
///
/// ```
/// use tangent_optim::linear_solver::{LinearSolver, Qr};
/// use tangent_optim::operator::MatrixOperator;
///
/// let a = MatrixOperator::new(vec![vec![2.0, 1.0], vec![1.0, 3.0]]);
/// let qr = Qr::<f64>::default();
/// let state = qr.init(&a);
/// let (x, status) = qr.compute(&state, &[5.0, 7.0]);
/// assert!(status.is_successful());
/// assert!((x[0] - 1.6).abs() < 1e-12 && (x[1] - 1.8).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Qr<F> {
    /// Relative cutoff on the diagonal of `R`; components whose pivot is below
    /// `rcond · max|R_ii|` are set to zero. Defaults to `eps · max(m, n)`.
    pub rcond: Option<F>,
}

impl<F: Float> Qr<F> {
    pub fn new() -> Self {
        Qr { rcond: None }
    }

    /// Set the rank-deficiency cutoff.
    pub fn with_rcond(mut self, rcond: F) -> Self {
        self.rcond = Some(rcond);
        self
    }

    fn cutoff(&self, factors: &QrFactors<F>) -> F {
        let dim = factors.rows().max(factors.cols());
        let rcond = self
            .rcond
            .unwrap_or_else(|| F::epsilon() * F::from(dim).unwrap_or_else(F::one));
        rcond * factors.max_diag()
    }
}

/// Cached reduced QR factors plus the transpose flag.
///
/// The factors always belong to a matrix with at least as many rows as
/// columns. `transpose` records whether the system being solved is the
/// transpose of that matrix.
#[derive(Debug, Clone)]
pub struct QrState<F> {
    factors: Arc<QrFactors<F>>,
    transpose: bool,
}

impl<F: Float> QrState<F> {
    /// Borrow the shared factors.
    pub fn factors(&self) -> &QrFactors<F> {
        &self.factors
    }

    /// `true` if the system solved is the transpose of the factored matrix.
    pub fn is_transposed(&self) -> bool {
        self.transpose
    }

    /// `true` if `other` shares the same factorisation.
    pub fn shares_factors_with(&self, other: &QrState<F>) -> bool {
        Arc::ptr_eq(&self.factors, &other.factors)
    }

    /// Expected length of the right-hand side.
    pub fn in_len(&self) -> usize {
        if self.transpose {
            self.factors.cols()
        } else {
            self.factors.rows()
        }
    }
}

impl<F: Float> LinearSolver<F> for Qr<F> {
    type State = QrState<F>;

    fn init(&self, operator: &dyn LinearOperator<F>) -> QrState<F> {
        let matrix = operator.as_matrix();
        let (rows, cols) = (operator.out_size(), operator.in_size());
        if cols > rows {
            let t = transpose(&matrix);
            QrState {
                factors: Arc::new(householder_qr(&t)),
                transpose: true,
            }
        } else {
            QrState {
                factors: Arc::new(householder_qr(&matrix)),
                transpose: false,
            }
        }
    }

    fn compute(&self, state: &QrState<F>, vector: &[F]) -> (Vec<F>, Status) {
        assert_eq!(
            vector.len(),
            state.in_len(),
            "vector length ({}) must equal the operator's output size ({})",
            vector.len(),
            state.in_len()
        );
        let f = &*state.factors;
        let cutoff = self.cutoff(f);
        let x = if state.transpose {
            // Minimum-norm solve of (Q R)^T x = v: x = Q R^{-T} v
            let y = solve_upper_transpose(&f.r, vector, cutoff);
            mat_vec(&f.q, &y)
        } else {
            let qtv = mat_t_vec(&f.q, vector, f.cols());
            solve_upper(&f.r, &qtv, cutoff)
        };
        (x, Status::Successful)
    }

    fn transpose(&self, state: &QrState<F>) -> QrState<F> {
        QrState {
            factors: Arc::clone(&state.factors),
            transpose: !state.transpose,
        }
    }

    fn is_maybe_singular(&self) -> bool {
        true
    }
}
