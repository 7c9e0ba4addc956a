use std::fmt;

/// A vector field (flow) or map x_{n+1} = f(x_n), parameterized by a
/// read-only parameter vector.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field or map function.
    /// x: current state
    /// params: bound parameter vector
    /// out: buffer to write the result (dx/dt or x_{n+1}), `dimension()` long
    ///
    /// Returns `false` when the function is undefined at `x`.
    fn apply(&self, x: &[f64], params: &[f64], out: &mut [f64]) -> bool;
}

/// Adapts a closure to [`DynamicalSystem`].
pub struct FnSystem<F> {
    dimension: usize,
    function: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&[f64], &[f64], &mut [f64]) -> bool,
{
    pub fn new(dimension: usize, function: F) -> Self {
        Self {
            dimension,
            function,
        }
    }
}

impl<F> DynamicalSystem for FnSystem<F>
where
    F: Fn(&[f64], &[f64], &mut [f64]) -> bool,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn apply(&self, x: &[f64], params: &[f64], out: &mut [f64]) -> bool {
        (self.function)(x, params, out)
    }
}

impl<F> fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}
