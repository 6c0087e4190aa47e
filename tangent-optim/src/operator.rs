//! Linear operators: matrices that need not be materialised until a solver
//! asks for them.

use std::fmt::Debug;

use num_traits::Float;

use crate::linalg::{mat_vec, transpose};

/// An abstract linear map `R^in_size -> R^out_size`.
pub trait LinearOperator<F: Float>: Debug + Send + Sync {
    /// Dimension of the input space (number of columns).
    fn in_size(&self) -> usize;

    /// Dimension of the output space (number of rows).
    fn out_size(&self) -> usize;

    /// Apply the operator: `A·v`.
    fn mv(&self, v: &[F]) -> Vec<F>;

    /// Render the operator as a dense row-major matrix.
    fn as_matrix(&self) -> Vec<Vec<F>>;

    /// The transposed operator.
    fn transpose(&self) -> Box<dyn LinearOperator<F>>;
}

/// A dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOperator<F> {
    rows: Vec<Vec<F>>,
    in_size: usize,
}

impl<F: Float> MatrixOperator<F> {
    /// Wrap a row-major matrix.
    ///
    /// # Panics
    ///
    /// Panics if the rows are ragged.
    pub fn new(rows: Vec<Vec<F>>) -> Self {
        let in_size = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|r| r.len() == in_size),
            "all rows of a MatrixOperator must have {} columns",
            in_size
        );
        MatrixOperator { rows, in_size }
    }

    /// Borrow the rows.
    pub fn rows(&self) -> &[Vec<F>] {
        &self.rows
    }
}

impl<F: Float + Debug + Send + Sync + 'static> LinearOperator<F> for MatrixOperator<F> {
    fn in_size(&self) -> usize {
        self.in_size
    }

    fn out_size(&self) -> usize {
        self.rows.len()
    }

    fn mv(&self, v: &[F]) -> Vec<F> {
        assert_eq!(
            v.len(),
            self.in_size,
            "vector length ({}) must equal operator in_size ({})",
            v.len(),
            self.in_size
        );
        mat_vec(&self.rows, v)
    }

    fn as_matrix(&self) -> Vec<Vec<F>> {
        self.rows.clone()
    }

    fn transpose(&self) -> Box<dyn LinearOperator<F>> {
        let t = transpose(&self.rows);
        Box::new(MatrixOperator {
            in_size: self.rows.len(),
            rows: t,
        })
    }
}

/// The identity on `R^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityOperator {
    pub size: usize,
}

impl<F: Float + Debug + Send + Sync + 'static> LinearOperator<F> for IdentityOperator {
    fn in_size(&self) -> usize {
        self.size
    }

    fn out_size(&self) -> usize {
        self.size
    }

    fn mv(&self, v: &[F]) -> Vec<F> {
        assert_eq!(v.len(), self.size, "vector length must equal identity size");
        v.to_vec()
    }

    fn as_matrix(&self) -> Vec<Vec<F>> {
        (0..self.size)
            .map(|i| {
                let mut row = vec![F::zero(); self.size];
                row[i] = F::one();
                row
            })
            .collect()
    }

    fn transpose(&self) -> Box<dyn LinearOperator<F>> {
        Box::new(*self)
    }
}

#[cfg(feature = "nalgebra")]
impl<F: Float + nalgebra::Scalar> From<&nalgebra::DMatrix<F>> for MatrixOperator<F> {
    fn from(m: &nalgebra::DMatrix<F>) -> Self {
        let rows = (0..m.nrows())
            .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
            .collect();
        MatrixOperator::new(rows)
    }
}

#[cfg(feature = "nalgebra")]
impl<F: Float + nalgebra::Scalar> From<&MatrixOperator<F>> for nalgebra::DMatrix<F> {
    fn from(op: &MatrixOperator<F>) -> Self {
        let flat: Vec<F> = op.rows.iter().flatten().copied().collect();
        nalgebra::DMatrix::from_row_slice(op.rows.len(), op.in_size, &flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_swaps_dimensions() {
        let a = MatrixOperator::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let at = LinearOperator::<f64>::transpose(&a);
        assert_eq!(at.in_size(), 2);
        assert_eq!(at.out_size(), 3);
        assert_eq!(at.mv(&[1.0, 1.0]), vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn identity_renders_unit_diagonal() {
        let id = IdentityOperator { size: 2 };
        let m: Vec<Vec<f64>> = id.as_matrix();
        assert_eq!(m, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    #[should_panic(expected = "must have")]
    fn ragged_rows_panic() {
        let _ = MatrixOperator::new(vec![vec![1.0], vec![1.0, 2.0]]);
    }
}
