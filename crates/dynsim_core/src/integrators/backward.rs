use serde::{Deserialize, Serialize};

use super::Integrator;
use crate::config::{keys, ConfigQuery};
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::proxy::RhsProxy;
use crate::steppers::{euler_forward, ImplicitStepper};

/// Controls of the fixed-point loop around an implicit stepper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointSettings {
    /// Iteration stops once successive iterates are closer than this (L2).
    pub threshold: f64,
    /// `None` iterates until convergence.
    pub max_iterations: Option<usize>,
}

impl Default for FixedPointSettings {
    fn default() -> Self {
        Self {
            threshold: 1e-10,
            max_iterations: None,
        }
    }
}

impl FixedPointSettings {
    pub fn from_config(config: &dyn ConfigQuery) -> Result<Self, ConfigError> {
        let threshold = config.get_real_or(keys::THRESHOLD, Self::default().threshold)?;
        if !(threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: keys::THRESHOLD.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let max_iterations = if config.check_for_key(keys::MAX_ITERATIONS) {
            let value = config.get_integer(keys::MAX_ITERATIONS)?;
            if value < 1 {
                return Err(ConfigError::InvalidValue {
                    key: keys::MAX_ITERATIONS.to_string(),
                    reason: format!("must be at least 1, got {value}"),
                });
            }
            Some(value as usize)
        } else {
            None
        };
        Ok(Self {
            threshold,
            max_iterations,
        })
    }
}

/// Drives an implicit stepper to a fixed point, starting from an
/// Euler-forward prediction.
pub struct BackwardIntegrator {
    stepper: Box<dyn ImplicitStepper>,
    step_size: f64,
    settings: FixedPointSettings,
    iterated: Vec<f64>,
    next: Vec<f64>,
    last_iterations: usize,
    substeps: [f64; 1],
}

impl BackwardIntegrator {
    pub fn new(
        stepper: Box<dyn ImplicitStepper>,
        step_size: f64,
        settings: FixedPointSettings,
        dim: usize,
    ) -> Self {
        Self {
            stepper,
            step_size,
            settings,
            iterated: vec![0.0; dim],
            next: vec![0.0; dim],
            last_iterations: 0,
            substeps: [step_size],
        }
    }

    /// Fixed-point iterations spent in the last outer iteration.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl Integrator for BackwardIntegrator {
    fn name(&self) -> &'static str {
        "backward"
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
        let h = self.step_size;
        if !euler_forward(proxy, h, history, &mut self.iterated) {
            return Err(IntegrationError::EvaluationFailed);
        }

        let mut iterations = 0;
        loop {
            if !self
                .stepper
                .perform(proxy, h, history, &self.iterated, &mut self.next)
            {
                return Err(IntegrationError::EvaluationFailed);
            }
            iterations += 1;
            let d = distance(&self.next, &self.iterated);
            std::mem::swap(&mut self.iterated, &mut self.next);

            if d < self.settings.threshold {
                break;
            }
            let capped = self
                .settings
                .max_iterations
                .map_or(false, |max| iterations >= max);
            if capped || d.is_nan() {
                log::warn!(
                    "{} did not converge after {} iterations (distance {:e})",
                    self.stepper.name(),
                    iterations,
                    d
                );
                self.last_iterations = iterations;
                return Err(IntegrationError::NotConverged {
                    iterations,
                    distance: d,
                });
            }
        }

        self.last_iterations = iterations;
        history.push(&self.iterated);
        Ok(())
    }

    fn last_substeps(&self) -> &[f64] {
        &self.substeps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steppers::test_support::decay;
    use crate::steppers::{Bdf, EulerBackward, HeunBackward};
    use crate::traits::FnSystem;

    fn run(
        integrator: &mut BackwardIntegrator,
        steps: usize,
        initial: f64,
    ) -> Result<f64, IntegrationError> {
        let system = decay();
        let proxy = RhsProxy::new(&system, &[]);
        let mut history = History::new(integrator.least_orbit_size(), 1);
        history.reset(&[initial]);
        for _ in 0..steps {
            integrator.execute(&proxy, &mut history)?;
        }
        Ok(history.current()[0])
    }

    #[test]
    fn euler_backward_converges_to_the_implicit_solution() {
        let mut integrator = BackwardIntegrator::new(
            Box::new(EulerBackward::new(1)),
            0.1,
            FixedPointSettings::default(),
            1,
        );
        let x = run(&mut integrator, 1, 1.0).unwrap();
        assert!((x - 1.0 / 1.1).abs() < 1e-9);
        assert!(integrator.last_iterations() > 1);
    }

    #[test]
    fn bdf_tracks_the_exact_solution() {
        let mut integrator = BackwardIntegrator::new(
            Box::new(Bdf::new(3, 1).unwrap()),
            0.01,
            FixedPointSettings::default(),
            1,
        );
        let x = run(&mut integrator, 100, 1.0).unwrap();
        assert!((x - (-1.0f64).exp()).abs() < 5e-4);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        // h = 3 makes the fixed-point map expand.
        let settings = FixedPointSettings {
            threshold: 1e-12,
            max_iterations: Some(25),
        };
        let mut integrator =
            BackwardIntegrator::new(Box::new(HeunBackward::new(1)), 3.0, settings, 1);
        match run(&mut integrator, 1, 1.0) {
            Err(IntegrationError::NotConverged { iterations, .. }) => assert_eq!(iterations, 25),
            other => panic!("expected non-convergence, got {other:?}"),
        }
    }

    #[test]
    fn evaluation_failure_propagates() {
        let system = FnSystem::new(1, |x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = -x[0];
            x[0] > 0.95
        });
        let proxy = RhsProxy::new(&system, &[]);
        let mut integrator = BackwardIntegrator::new(
            Box::new(EulerBackward::new(1)),
            0.1,
            FixedPointSettings::default(),
            1,
        );
        let mut history = History::new(1, 1);
        history.reset(&[1.0]);
        assert_eq!(
            integrator.execute(&proxy, &mut history),
            Err(IntegrationError::EvaluationFailed)
        );
        assert_eq!(history.current(), &[1.0]);
    }

    #[test]
    fn settings_from_config() {
        use crate::config::Settings;
        let settings = FixedPointSettings::from_config(
            &Settings::new().with("threshold", 1e-6).with("max_iterations", 50i64),
        )
        .unwrap();
        assert_eq!(settings.max_iterations, Some(50));
        assert!(FixedPointSettings::from_config(&Settings::new())
            .unwrap()
            .max_iterations
            .is_none());
        let settings = Settings::new().with("max_iterations", 0i64);
        assert!(FixedPointSettings::from_config(&settings).is_err());
    }
}
