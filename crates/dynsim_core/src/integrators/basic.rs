use super::Integrator;
use crate::error::IntegrationError;
use crate::history::History;
use crate::proxy::RhsProxy;
use crate::steppers::Stepper;

/// Fixed step size, one stepper call per outer iteration.
pub struct BasicIntegrator {
    stepper: Box<dyn Stepper>,
    step_size: f64,
    out: Vec<f64>,
    substeps: [f64; 1],
}

impl BasicIntegrator {
    pub fn new(stepper: Box<dyn Stepper>, step_size: f64, dim: usize) -> Self {
        Self {
            stepper,
            step_size,
            out: vec![0.0; dim],
            substeps: [step_size],
        }
    }

    pub fn stepper(&self) -> &dyn Stepper {
        self.stepper.as_ref()
    }
}

impl Integrator for BasicIntegrator {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn step_size(&self) -> f64 {
        self.step_size
    }

    fn least_orbit_size(&self) -> usize {
        self.stepper.least_orbit_size()
    }

    fn execute(
        &mut self,
        proxy: &RhsProxy<'_>,
        history: &mut History,
    ) -> Result<(), IntegrationError> {
        if !self
            .stepper
            .perform(proxy, self.step_size, history, &mut self.out)
        {
            return Err(IntegrationError::EvaluationFailed);
        }
        history.push(&self.out);
        Ok(())
    }

    fn last_substeps(&self) -> &[f64] {
        &self.substeps
    }
}
