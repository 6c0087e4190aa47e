//! Forward-mode automatic differentiation.
//!
//! Functions written over [`Dual`] numbers can be evaluated plainly, or with a
//! seeded tangent to obtain directional derivatives, Jacobians and gradients.
//! `tangent-optim` builds its solvers on top of these primitives.

pub mod api;
pub mod dual;
pub mod float;
mod ops;

#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;

pub use api::{grad, jacobian, jvp, value};
pub use dual::Dual;
pub use float::Float;

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
