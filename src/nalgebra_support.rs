//! nalgebra adapters for forward-mode differentiation.
//!
//! Thin wrappers accepting `DVector<F>` and returning `DVector<F>` / `DMatrix<F>`.

use nalgebra::{DMatrix, DVector};

use crate::dual::Dual;
use crate::float::Float;

/// Compute `(f(x), J)` for a vector function, returning nalgebra types.
pub fn jacobian_nalgebra<F: Float + nalgebra::Scalar>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &DVector<F>,
) -> (DVector<F>, DMatrix<F>) {
    let (values, jac) = crate::api::jacobian(f, x.as_slice());
    let m = values.len();
    let n = x.len();
    let flat: Vec<F> = jac.into_iter().flatten().collect();
    (
        DVector::from_vec(values),
        DMatrix::from_row_slice(m, n, &flat),
    )
}

/// Compute `(f(x), ∇f(x))` for a scalar function, returning a `DVector` gradient.
pub fn grad_nalgebra<F: Float + nalgebra::Scalar>(
    f: impl Fn(&[Dual<F>]) -> Dual<F>,
    x: &DVector<F>,
) -> (F, DVector<F>) {
    let (value, g) = crate::api::grad(f, x.as_slice());
    (value, DVector::from_vec(g))
}
