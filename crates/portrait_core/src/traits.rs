use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the integrators.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// The right-hand side of a planar vector field x' = f(x, y), y' = g(x, y).
///
/// The orbit integrator builds one of these per chart on the fly; the
/// steppers in `solvers` only ever see this seam.
pub trait PlanarSystem<T: Scalar> {
    /// Evaluates the vector field at (x, y).
    fn apply(&self, x: T, y: T) -> (T, T);
}

impl<T: Scalar, F> PlanarSystem<T> for F
where
    F: Fn(T, T) -> (T, T),
{
    fn apply(&self, x: T, y: T) -> (T, T) {
        self(x, y)
    }
}
