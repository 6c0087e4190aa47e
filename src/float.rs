use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Only primitive float types implement this; [`Dual`](crate::Dual) does not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Convert an `f64` literal, falling back to zero for unrepresentable values.
    fn lit(v: f64) -> Self {
        Self::from_f64(v).unwrap_or_else(Self::zero)
    }
}

impl Float for f32 {}
impl Float for f64 {}
