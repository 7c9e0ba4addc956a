use super::{next_substep, underflow, Integrator};
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::proxy::RhsProxy;
use crate::steppers::Stepper;

/// Slope-limited sub-stepping: no sub-step may move any variable by more
/// than roughly `threshold`, judged from f at the start of the sub-step.
pub struct ManhattanIntegrator {
    stepper: Box<dyn Stepper>,
    step_size: f64,
    threshold: f64,
    min_step_size: f64,
    scratch: History,
    current: Vec<f64>,
    next: Vec<f64>,
    substeps: Vec<f64>,
}

impl ManhattanIntegrator {
    pub fn new(
        stepper: Box<dyn Stepper>,
        step_size: f64,
        threshold: f64,
        min_step_size: f64,
        dim: usize,
    ) -> Result<Self, ConfigError> {
        if stepper.least_orbit_size() > 1 {
            return Err(ConfigError::MultistepNotSupported {
                method: "manhattan",
                stepper: stepper.name(),
            });
        }
        if !(threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: crate::config::keys::THRESHOLD.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            stepper,
            step_size,
            threshold,
            min_step_size,
            scratch: History::new(1, dim),
            current: vec![0.0; dim],
            next: vec![0.0; dim],
            substeps: Vec::new(),
        })
    }
}

impl Integrator for ManhattanIntegrator {
    fn name(&self) -> &'static str {
        "manhattan"
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
        self.current.copy_from_slice(history.current());

        let mut h = dt;
        let mut accumulated = 0.0;
        loop {
            self.scratch.reset(&self.current);
            if !self.scratch.ensure_rhs(0, proxy) {
                return Err(IntegrationError::EvaluationFailed);
            }
            let rhs = self.scratch.rhs(0);
            if rhs.iter().any(|f| f.is_nan()) {
                return Err(underflow(h, self.min_step_size));
            }
            let slope = rhs.iter().fold(0.0_f64, |m, f| m.max(f.abs()));
            if h * slope > self.threshold {
                h = self.threshold / slope;
            }
            if h < self.min_step_size {
                return Err(underflow(h, self.min_step_size));
            }

            let (step, last) = next_substep(h, accumulated, dt);
            if !self
                .stepper
                .perform(proxy, step, &mut self.scratch, &mut self.next)
            {
                return Err(IntegrationError::EvaluationFailed);
            }
            std::mem::swap(&mut self.current, &mut self.next);
            self.substeps.push(step);
            log::trace!("manhattan sub-step {:e} (max slope {:e})", step, slope);
            if last {
                break;
            }
            accumulated += step;
        }

        history.push(&self.current);
        Ok(())
    }

    fn last_substeps(&self) -> &[f64] {
        &self.substeps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrators::test_support::{assert_tiles, iterate_once};
    use crate::steppers::test_support::decay;
    use crate::steppers::{EulerForward, Rk44};
    use crate::traits::FnSystem;

    #[test]
    fn gentle_slopes_take_a_single_step() {
        let mut integrator =
            ManhattanIntegrator::new(Box::new(EulerForward::new()), 0.1, 1.0, 1e-12, 1).unwrap();
        let x = iterate_once(&mut integrator, &decay(), &[1.0]);
        assert_eq!(integrator.last_substeps(), &[0.1]);
        assert_eq!(x, vec![0.9]);
    }

    #[test]
    fn steep_slopes_are_subdivided() {
        // f = -x, x = 1: h * 1 must stay below 0.05.
        let mut integrator =
            ManhattanIntegrator::new(Box::new(Rk44::new(1)), 1.0, 0.05, 1e-12, 1).unwrap();
        let x = iterate_once(&mut integrator, &decay(), &[1.0]);
        let substeps = integrator.last_substeps();
        assert_tiles(substeps, 1.0);
        assert!((substeps[0] - 0.05).abs() < 1e-15);
        assert!(substeps.iter().all(|h| *h <= 0.05 + 1e-15));
        assert!((x[0] - (-1.0f64).exp()).abs() < 1e-7);
    }

    #[test]
    fn substeps_keep_the_previous_size_once_the_slope_flattens() {
        let mut integrator =
            ManhattanIntegrator::new(Box::new(EulerForward::new()), 1.0, 0.5, 1e-12, 1).unwrap();
        iterate_once(&mut integrator, &decay(), &[2.0]);
        let substeps = integrator.last_substeps();
        // Starts at 0.5 / 2 and never grows again within the iteration.
        assert_eq!(substeps[0], 0.25);
        assert!(substeps.windows(2).all(|w| w[1] <= w[0]));
        assert_tiles(substeps, 1.0);
    }

    #[test]
    fn failure_and_underflow() {
        let failing = FnSystem::new(1, |_x: &[f64], _p: &[f64], _out: &mut [f64]| false);
        let proxy = RhsProxy::new(&failing, &[]);
        let mut integrator =
            ManhattanIntegrator::new(Box::new(EulerForward::new()), 0.1, 1.0, 1e-12, 1).unwrap();
        let mut history = History::new(1, 1);
        history.reset(&[1.0]);
        assert_eq!(
            integrator.execute(&proxy, &mut history),
            Err(IntegrationError::EvaluationFailed)
        );

        let steep = FnSystem::new(1, |_x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = 1e20;
            true
        });
        let proxy = RhsProxy::new(&steep, &[]);
        assert!(matches!(
            integrator.execute(&proxy, &mut history),
            Err(IntegrationError::StepSizeUnderflow { .. })
        ));
    }

    #[test]
    fn nan_slope_is_an_underflow() {
        let broken = FnSystem::new(2, |_x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = 0.1;
            out[1] = f64::NAN;
            true
        });
        let proxy = RhsProxy::new(&broken, &[]);
        let mut integrator =
            ManhattanIntegrator::new(Box::new(EulerForward::new()), 0.1, 1.0, 1e-12, 2).unwrap();
        let mut history = History::new(1, 2);
        history.reset(&[1.0, 1.0]);
        assert!(matches!(
            integrator.execute(&proxy, &mut history),
            Err(IntegrationError::StepSizeUnderflow { .. })
        ));
        assert_eq!(history.len(), 1);
        assert!(integrator.last_substeps().is_empty());
    }
}
