use super::{next_substep, scaled_error, underflow, Integrator, StepControl};
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::proxy::RhsProxy;
use crate::steppers::Stepper;

/// Exponents of the step-size controller derived from the stepper order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalvingConstants {
    pub pgrow: f64,
    pub pshrnk: f64,
    pub fcor: f64,
    pub errcon: f64,
}

impl HalvingConstants {
    pub fn for_order(order: usize, safety: f64) -> Self {
        let (pgrow, pshrnk, fcor) = if order == 0 {
            (-0.2, -0.25, 0.0)
        } else {
            let p = order as f64;
            (-1.0 / (p + 1.0), -1.0 / p, 1.0 / (2f64.powi(order as i32) - 1.0))
        };
        Self {
            pgrow,
            pshrnk,
            fcor,
            errcon: (4.0 / safety).powf(1.0 / pgrow),
        }
    }
}

/// Compares one step of size h with two of size h/2 and adapts h until the
/// difference is within the accuracy. Accepted results carry the local
/// extrapolation term.
pub struct StepHalvingIntegrator {
    stepper: Box<dyn Stepper>,
    step_size: f64,
    control: StepControl,
    constants: HalvingConstants,
    weights: Vec<f64>,
    proposed: f64,
    scratch: History,
    current: Vec<f64>,
    full: Vec<f64>,
    mid: Vec<f64>,
    half: Vec<f64>,
    substeps: Vec<f64>,
}

impl StepHalvingIntegrator {
    pub fn new(
        stepper: Box<dyn Stepper>,
        step_size: f64,
        control: StepControl,
        dim: usize,
    ) -> Result<Self, ConfigError> {
        if stepper.least_orbit_size() > 1 {
            return Err(ConfigError::MultistepNotSupported {
                method: "step_halving",
                stepper: stepper.name(),
            });
        }
        control.validate(dim)?;
        Ok(Self {
            constants: HalvingConstants::for_order(stepper.order(), control.safety),
            weights: control.weights(dim),
            stepper,
            step_size,
            control,
            proposed: step_size,
            scratch: History::new(1, dim),
            current: vec![0.0; dim],
            full: vec![0.0; dim],
            mid: vec![0.0; dim],
            half: vec![0.0; dim],
            substeps: Vec::new(),
        })
    }

    pub fn constants(&self) -> HalvingConstants {
        self.constants
    }

    /// Full step into `full`, two half steps into `half`.
    fn trial(&mut self, proxy: &RhsProxy<'_>, h: f64) -> bool {
        self.scratch.reset(&self.current);
        if !self.stepper.perform(proxy, h, &mut self.scratch, &mut self.full) {
            return false;
        }
        if !self.stepper.perform(proxy, 0.5 * h, &mut self.scratch, &mut self.mid) {
            return false;
        }
        self.scratch.push(&self.mid);
        self.stepper.perform(proxy, 0.5 * h, &mut self.scratch, &mut self.half)
    }
}

impl Integrator for StepHalvingIntegrator {
    fn name(&self) -> &'static str {
        "step_halving"
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
        let HalvingConstants {
            pgrow,
            pshrnk,
            fcor,
            errcon,
        } = self.constants;
        let safety = self.control.safety;

        self.substeps.clear();
        self.current.copy_from_slice(history.current());
        let mut accumulated = 0.0;

        loop {
            if self.proposed < self.control.min_step_size || !self.proposed.is_finite() {
                return Err(underflow(self.proposed, self.control.min_step_size));
            }
            let (h, last) = next_substep(self.proposed, accumulated, dt);
            if !self.trial(proxy, h) {
                return Err(IntegrationError::EvaluationFailed);
            }

            let errmax =
                scaled_error(&self.half, &self.full, &self.weights) / self.control.accuracy;
            if errmax.is_nan() {
                return Err(underflow(h, self.control.min_step_size));
            }

            if errmax <= 1.0 {
                for i in 0..self.current.len() {
                    self.current[i] = self.half[i] + (self.half[i] - self.full[i]) * fcor;
                }
                self.substeps.push(h);
                let grown = if errmax > errcon {
                    safety * h * errmax.powf(pgrow)
                } else {
                    4.0 * h
                };
                log::trace!("step halving accepted h = {:e} (errmax {:.3e})", h, errmax);
                if last {
                    // A clamped final step says nothing about the next one.
                    if h >= self.proposed {
                        self.proposed = grown;
                    }
                    break;
                }
                self.proposed = grown;
                accumulated += h;
            } else {
                let shrunk = safety * h * errmax.powf(pshrnk);
                self.proposed = shrunk.max(0.1 * h);
                log::trace!(
                    "step halving rejected h = {:e} (errmax {:.3e}), retrying with {:e}",
                    h,
                    errmax,
                    self.proposed
                );
            }
        }

        history.push(&self.current);
        Ok(())
    }

    fn reset(&mut self) {
        self.proposed = self.step_size;
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
    use crate::steppers::{ButcherStepper, ButcherTableau, EulerForward, Heun, Rk44};
    use crate::traits::FnSystem;

    fn control(accuracy: f64) -> StepControl {
        StepControl {
            accuracy,
            ..StepControl::default()
        }
    }

    #[test]
    fn constants_follow_the_order() {
        let c = HalvingConstants::for_order(4, 0.9);
        assert!((c.pgrow + 0.2).abs() < 1e-15);
        assert!((c.pshrnk + 0.25).abs() < 1e-15);
        assert!((c.fcor - 1.0 / 15.0).abs() < 1e-15);
        assert!((c.errcon - 0.225f64.powi(5)).abs() < 1e-12);

        let unknown = HalvingConstants::for_order(0, 0.9);
        assert_eq!((unknown.pgrow, unknown.pshrnk, unknown.fcor), (-0.2, -0.25, 0.0));
    }

    #[test]
    fn substeps_tile_the_outer_step() {
        let mut integrator =
            StepHalvingIntegrator::new(Box::new(Heun::new(1)), 1.0, control(1e-7), 1).unwrap();
        let x = iterate_once(&mut integrator, &decay(), &[1.0]);
        assert!(integrator.last_substeps().len() > 1);
        assert_tiles(integrator.last_substeps(), 1.0);
        assert!((x[0] - (-1.0f64).exp()).abs() < 1e-5);
    }

    #[test]
    fn oversized_steps_are_rejected() {
        let mut integrator =
            StepHalvingIntegrator::new(Box::new(EulerForward::new()), 10.0, control(1e-3), 1)
                .unwrap();
        iterate_once(&mut integrator, &decay(), &[1.0]);
        let first = integrator.last_substeps()[0];
        assert!(first < 1.0 && first > 0.01, "first accepted step {first}");
        assert_tiles(integrator.last_substeps(), 10.0);
    }

    #[test]
    fn unknown_order_uses_fallback_constants() {
        let tableau = ButcherTableau::from_arrays(&[0.5], &[0.0, 1.0], 0).unwrap();
        let integrator = StepHalvingIntegrator::new(
            Box::new(ButcherStepper::new(tableau, 1)),
            0.5,
            StepControl::default(),
            1,
        )
        .unwrap();
        assert_eq!(integrator.constants().fcor, 0.0);
    }

    #[test]
    fn grown_steps_carry_over_between_iterations() {
        let system = decay();
        let proxy = RhsProxy::new(&system, &[]);
        let mut integrator =
            StepHalvingIntegrator::new(Box::new(Rk44::new(1)), 0.1, control(1e-4), 1).unwrap();
        let mut history = History::new(1, 1);
        history.reset(&[1.0]);
        for _ in 0..10 {
            integrator.execute(&proxy, &mut history).unwrap();
            assert_eq!(integrator.last_substeps().len(), 1);
        }
        assert!((history.current()[0] - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn nan_error_is_an_underflow() {
        let system = FnSystem::new(1, |_x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = f64::NAN;
            true
        });
        let proxy = RhsProxy::new(&system, &[]);
        let mut integrator =
            StepHalvingIntegrator::new(Box::new(Heun::new(1)), 0.1, StepControl::default(), 1)
                .unwrap();
        let mut history = History::new(1, 1);
        history.reset(&[1.0]);
        assert!(matches!(
            integrator.execute(&proxy, &mut history),
            Err(IntegrationError::StepSizeUnderflow { .. })
        ));
    }
}
