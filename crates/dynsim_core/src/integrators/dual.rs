use super::{next_substep, scaled_error, underflow, Integrator, StepControl};
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::proxy::RhsProxy;
use crate::steppers::Stepper;

const GROW: f64 = 2.0;
const SHRINK: f64 = 0.125;

/// Runs two steppers with the same h and uses their difference as the error
/// estimate. The higher-order result is kept.
///
/// Steppers see a private sub-orbit of accepted sub-steps, so multistep
/// methods work here.
pub struct DualStepperIntegrator {
    steppers: [Box<dyn Stepper>; 2],
    /// Index of the stepper whose result is committed.
    leading: usize,
    step_size: f64,
    control: StepControl,
    weights: Vec<f64>,
    proposed: f64,
    orbit: History,
    results: [Vec<f64>; 2],
    substeps: Vec<f64>,
}

impl DualStepperIntegrator {
    pub fn new(
        first: Box<dyn Stepper>,
        second: Box<dyn Stepper>,
        step_size: f64,
        control: StepControl,
        dim: usize,
    ) -> Result<Self, ConfigError> {
        control.validate(dim)?;
        let leading = if second.order() > first.order() { 1 } else { 0 };
        let capacity = first.least_orbit_size().max(second.least_orbit_size());
        Ok(Self {
            steppers: [first, second],
            leading,
            step_size,
            weights: control.weights(dim),
            control,
            proposed: step_size,
            orbit: History::new(capacity, dim),
            results: [vec![0.0; dim], vec![0.0; dim]],
            substeps: Vec::new(),
        })
    }

    /// Name of the stepper whose result is committed.
    pub fn leading_stepper(&self) -> &'static str {
        self.steppers[self.leading].name()
    }

    fn sync_orbit(&mut self, history: &History) {
        if self.orbit.is_empty() || self.orbit.current() != history.current() {
            self.orbit.reset(history.current());
        }
    }
}

impl Integrator for DualStepperIntegrator {
    fn name(&self) -> &'static str {
        "dual_stepper"
    }

    fn step_size(&self) -> f64 {
        self.step_size
    }

    fn least_orbit_size(&self) -> usize {
        1
    }

    fn execute(
        &mut self,
        proxy: &RhsProxy<'_>,
        history: &mut History,
    ) -> Result<(), IntegrationError> {
        let dt = self.step_size;
        self.substeps.clear();
        self.sync_orbit(history);

        let mut accumulated = 0.0;
        loop {
            if self.proposed < self.control.min_step_size || !self.proposed.is_finite() {
                return Err(underflow(self.proposed, self.control.min_step_size));
            }
            let (h, last) = next_substep(self.proposed, accumulated, dt);
            for (stepper, out) in self.steppers.iter_mut().zip(self.results.iter_mut()) {
                if !stepper.perform(proxy, h, &mut self.orbit, out) {
                    return Err(IntegrationError::EvaluationFailed);
                }
            }

            let errmax =
                scaled_error(&self.results[0], &self.results[1], &self.weights)
                    / self.control.accuracy;
            if errmax.is_nan() {
                return Err(underflow(h, self.control.min_step_size));
            }
            if errmax <= 1.0 {
                self.orbit.push(&self.results[self.leading]);
                self.substeps.push(h);
                log::trace!("dual stepper accepted h = {:e} (errmax {:.3e})", h, errmax);
                if last {
                    if h >= self.proposed {
                        self.proposed = GROW * h;
                    }
                    break;
                }
                self.proposed = GROW * h;
                accumulated += h;
            } else {
                self.proposed = SHRINK * h;
                log::trace!("dual stepper rejected h = {:e} (errmax {:.3e})", h, errmax);
            }
        }

        history.push(self.orbit.current());
        Ok(())
    }

    fn reset(&mut self) {
        self.proposed = self.step_size;
        self.orbit = History::new(self.orbit.capacity(), self.orbit.dimension());
    }

    fn invalidate_derivatives(&mut self) {
        self.orbit.invalidate_derivatives();
    }

    fn last_substeps(&self) -> &[f64] {
        &self.substeps
    }
}
