use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the integrator.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order ODE system y' = f(t, y).
pub trait OdeSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the right hand side.
    /// t: independent variable (radius, for the Poisson equation)
    /// y: current state
    /// out: buffer to write dy/dt into
    fn apply(&self, t: T, y: &[T], out: &mut [T]);
}
