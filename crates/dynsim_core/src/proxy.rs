use crate::traits::DynamicalSystem;
use std::cell::{Cell, RefCell};

/// Call boundary between the integrators and the user vector field.
///
/// The parameter vector is bound once per run; every call evaluates into a
/// private scratch buffer first so a failed evaluation never leaves a
/// half-written output behind.
pub struct RhsProxy<'a> {
    system: &'a dyn DynamicalSystem,
    parameters: Vec<f64>,
    // Interior mutability keeps `call_system_function` usable through `&self`
    // from inside the steppers. This makes the proxy !Sync.
    scratch: RefCell<Vec<f64>>,
    evaluations: Cell<usize>,
}

impl<'a> RhsProxy<'a> {
    pub fn new(system: &'a dyn DynamicalSystem, parameters: &[f64]) -> Self {
        Self {
            system,
            parameters: parameters.to_vec(),
            scratch: RefCell::new(vec![0.0; system.dimension()]),
            evaluations: Cell::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.system.dimension()
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Rebinds the parameter vector, e.g. between two scan points.
    pub fn set_parameters(&mut self, parameters: &[f64]) {
        self.parameters.clear();
        self.parameters.extend_from_slice(parameters);
    }

    /// Number of vector field evaluations since construction (or the last
    /// [`reset_evaluations`](Self::reset_evaluations)).
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    pub fn reset_evaluations(&self) {
        self.evaluations.set(0);
    }

    /// Evaluates f(state) into `out`. On failure `out` is left untouched.
    pub fn call_system_function(&self, state: &[f64], out: &mut [f64]) -> bool {
        debug_assert_eq!(state.len(), self.dimension());
        debug_assert_eq!(out.len(), self.dimension());

        let mut scratch = self.scratch.borrow_mut();
        self.evaluations.set(self.evaluations.get() + 1);
        if !self.system.apply(state, &self.parameters, &mut scratch) {
            return false;
        }
        out.copy_from_slice(&scratch);
        true
    }
}
