//! Integrators run one outer iteration: they drive a stepper (possibly many
//! times, for the adaptive variants) and commit the result as the newest
//! history entry. Nothing is committed when an iteration fails.

pub mod backward;
pub mod basic;
pub mod dual;
pub mod manhattan;
pub mod step_halving;

pub use backward::{BackwardIntegrator, FixedPointSettings};
pub use basic::BasicIntegrator;
pub use dual::DualStepperIntegrator;
pub use manhattan::ManhattanIntegrator;
pub use step_halving::StepHalvingIntegrator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{keys, ConfigQuery, ScopedConfig};
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::method::IntegrationMethod;
use crate::proxy::RhsProxy;
use crate::steppers::{build_implicit_stepper, build_stepper, Stepper};

pub trait Integrator {
    fn name(&self) -> &'static str;

    /// Nominal length of one outer iteration.
    fn step_size(&self) -> f64;

    /// History entries the integrator needs to see.
    fn least_orbit_size(&self) -> usize;

    fn execute(
        &mut self,
        proxy: &RhsProxy<'_>,
        history: &mut History,
    ) -> Result<(), IntegrationError>;

    /// Forgets adaptive state carried between outer iterations.
    fn reset(&mut self) {}

    /// Drops derivatives cached in private sub-orbits, e.g. after the
    /// parameters were rebound.
    fn invalidate_derivatives(&mut self) {}

    /// Sub-step sizes accepted during the last outer iteration.
    fn last_substeps(&self) -> &[f64] {
        &[]
    }
}

/// Accuracy controls shared by the error-estimating integrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepControl {
    pub accuracy: f64,
    pub safety: f64,
    pub min_step_size: f64,
    /// Per-variable error scale; empty means 1 for every variable.
    pub variable_weights: Vec<f64>,
}

impl Default for StepControl {
    fn default() -> Self {
        Self {
            accuracy: 1e-6,
            safety: 0.9,
            min_step_size: 1e-12,
            variable_weights: Vec::new(),
        }
    }
}

impl StepControl {
    pub fn from_config(config: &dyn ConfigQuery, dim: usize) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut control = Self {
            accuracy: config.get_real_or(keys::ACCURACY, defaults.accuracy)?,
            safety: config.get_real_or(keys::SAFETY, defaults.safety)?,
            min_step_size: config.get_real_or(keys::MIN_STEP_SIZE, defaults.min_step_size)?,
            variable_weights: Vec::new(),
        };
        if config.check_for_key(keys::VARIABLE_WEIGHTS) {
            config.get_array(keys::VARIABLE_WEIGHTS, &mut control.variable_weights)?;
        }
        control.validate(dim)?;
        Ok(control)
    }

    pub fn validate(&self, dim: usize) -> Result<(), ConfigError> {
        if !(self.accuracy > 0.0) {
            return Err(invalid(keys::ACCURACY, "must be positive"));
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return Err(invalid(keys::SAFETY, "must lie in (0, 1]"));
        }
        if !(self.min_step_size >= 0.0) {
            return Err(invalid(keys::MIN_STEP_SIZE, "must not be negative"));
        }
        if !self.variable_weights.is_empty() {
            if self.variable_weights.len() != dim {
                return Err(invalid(
                    keys::VARIABLE_WEIGHTS,
                    &format!(
                        "expected {} weights, got {}",
                        dim,
                        self.variable_weights.len()
                    ),
                ));
            }
            if self.variable_weights.iter().any(|w| !(*w > 0.0)) {
                return Err(invalid(keys::VARIABLE_WEIGHTS, "weights must be positive"));
            }
        }
        Ok(())
    }

    /// Error scale for every variable.
    pub fn weights(&self, dim: usize) -> Vec<f64> {
        if self.variable_weights.is_empty() {
            vec![1.0; dim]
        } else {
            self.variable_weights.clone()
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// max_i |a_i - b_i| / weights_i; NaN if any difference is NaN.
pub(crate) fn scaled_error(a: &[f64], b: &[f64], weights: &[f64]) -> f64 {
    let mut error = 0.0_f64;
    for i in 0..a.len() {
        let e = ((a[i] - b[i]) / weights[i]).abs();
        if e.is_nan() {
            return f64::NAN;
        }
        error = error.max(e);
    }
    error
}

/// Size of the next sub-step and whether it closes the outer iteration.
pub(crate) fn next_substep(proposed: f64, accumulated: f64, dt: f64) -> (f64, bool) {
    let remaining = dt - accumulated;
    if proposed >= remaining || accumulated + proposed >= dt {
        (remaining, true)
    } else {
        (proposed, false)
    }
}

pub(crate) fn underflow(step: f64, min_step: f64) -> IntegrationError {
    log::warn!("step size {:e} fell below the minimum {:e}", step, min_step);
    IntegrationError::StepSizeUnderflow { step, min_step }
}

fn one_step_stepper(
    config: &dyn ConfigQuery,
    prefix: &str,
    dim: usize,
    method: &'static str,
) -> Result<Box<dyn Stepper>, ConfigError> {
    let stepper = build_stepper(&ScopedConfig::new(config, prefix), dim)?;
    if stepper.least_orbit_size() > 1 {
        return Err(ConfigError::MultistepNotSupported {
            method,
            stepper: stepper.name(),
        });
    }
    Ok(stepper)
}

fn positive_step_size(config: &dyn ConfigQuery) -> Result<f64, ConfigError> {
    let step_size = config.get_real(keys::STEP_SIZE)?;
    if !(step_size > 0.0) || !step_size.is_finite() {
        return Err(invalid(keys::STEP_SIZE, "must be positive and finite"));
    }
    Ok(step_size)
}

/// Builds the integrator selected by the `method` key. Adaptive methods read
/// their steppers from the `stepper.` (and `second_stepper.`) scopes.
pub fn build_integrator(config: &dyn ConfigQuery, dim: usize) -> Result<Box<dyn Integrator>> {
    let method = IntegrationMethod::from_config(config)?;
    let token = method.token();
    let integrator = assemble(method, config, dim)
        .with_context(|| format!("failed to configure integration method `{token}`"))?;
    log::debug!(
        "built {} integrator (dt = {}, least orbit size {})",
        integrator.name(),
        integrator.step_size(),
        integrator.least_orbit_size()
    );
    Ok(integrator)
}

fn assemble(
    method: IntegrationMethod,
    config: &dyn ConfigQuery,
    dim: usize,
) -> Result<Box<dyn Integrator>, ConfigError> {
    let step_size = positive_step_size(config)?;
    let integrator: Box<dyn Integrator> = match method {
        IntegrationMethod::Manhattan => Box::new(ManhattanIntegrator::new(
            one_step_stepper(config, keys::STEPPER, dim, "manhattan")?,
            step_size,
            config.get_real(keys::THRESHOLD)?,
            config.get_real_or(keys::MIN_STEP_SIZE, StepControl::default().min_step_size)?,
            dim,
        )?),
        IntegrationMethod::StepHalving => Box::new(StepHalvingIntegrator::new(
            one_step_stepper(config, keys::STEPPER, dim, "step_halving")?,
            step_size,
            StepControl::from_config(config, dim)?,
            dim,
        )?),
        IntegrationMethod::DualStepper => Box::new(DualStepperIntegrator::new(
            build_stepper(&ScopedConfig::new(config, keys::STEPPER), dim)?,
            build_stepper(&ScopedConfig::new(config, keys::SECOND_STEPPER), dim)?,
            step_size,
            StepControl::from_config(config, dim)?,
            dim,
        )?),
        m if m.is_implicit() => Box::new(BackwardIntegrator::new(
            build_implicit_stepper(config, dim)?,
            step_size,
            FixedPointSettings::from_config(config)?,
            dim,
        )),
        _ => Box::new(BasicIntegrator::new(build_stepper(config, dim)?, step_size, dim)),
    };
    Ok(integrator)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::history::History;
    use crate::proxy::RhsProxy;
    use crate::traits::FnSystem;

    use super::Integrator;

    pub fn assert_err_contains<T>(result: anyhow::Result<T>, needle: &str) {
        match result {
            Ok(_) => panic!("expected an error containing `{needle}`"),
            Err(err) => {
                let message = format!("{err:#}");
                assert!(
                    message.contains(needle),
                    "error `{message}` does not contain `{needle}`"
                );
            }
        }
    }

    /// Runs one outer iteration on `system` from `initial`.
    pub fn iterate_once<F>(
        integrator: &mut dyn Integrator,
        system: &FnSystem<F>,
        initial: &[f64],
    ) -> Vec<f64>
    where
        F: Fn(&[f64], &[f64], &mut [f64]) -> bool,
    {
        let proxy = RhsProxy::new(system, &[]);
        let mut history = History::new(integrator.least_orbit_size(), initial.len());
        history.reset(initial);
        integrator
            .execute(&proxy, &mut history)
            .expect("iteration failed");
        history.current().to_vec()
    }

    /// Checks that the accepted sub-steps tile the outer step exactly.
    pub fn assert_tiles(substeps: &[f64], dt: f64) {
        assert!(!substeps.is_empty());
        let sum: f64 = substeps.iter().sum();
        assert!((sum - dt).abs() <= 1e-12 * dt, "sub-steps sum to {sum}, expected {dt}");
        assert!(substeps.iter().all(|h| *h > 0.0 && *h <= dt));
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::assert_err_contains;
    use super::*;
    use crate::config::Settings;

    #[test]
    fn builds_basic_and_backward_integrators() {
        let basic = build_integrator(
            &Settings::new().with("method", "rk44").with("step_size", 0.1),
            2,
        )
        .unwrap();
        assert_eq!(basic.name(), "basic");
        assert_eq!(basic.least_orbit_size(), 1);

        let backward = build_integrator(
            &Settings::new()
                .with("method", "bdf")
                .with("order", 3i64)
                .with("step_size", 0.1),
            2,
        )
        .unwrap();
        assert_eq!(backward.name(), "backward");
        assert_eq!(backward.least_orbit_size(), 3);
    }

    #[test]
    fn builds_adaptive_integrators_from_scoped_settings() {
        let settings = Settings::new()
            .with("method", "dual_stepper")
            .with("step_size", 0.5)
            .with("stepper.method", "adams_bashforth")
            .with("stepper.order", 3i64)
            .with("second_stepper.method", "rk44");
        let dual = build_integrator(&settings, 1).unwrap();
        assert_eq!(dual.name(), "dual_stepper");
        assert_eq!(dual.least_orbit_size(), 1);

        let settings = Settings::new()
            .with("method", "step_halving")
            .with("step_size", 0.5)
            .with("stepper.method", "heun");
        assert_eq!(build_integrator(&settings, 1).unwrap().name(), "step_halving");
    }

    #[test]
    fn missing_or_bad_settings_are_reported_with_method() {
        assert_err_contains(
            build_integrator(&Settings::new().with("method", "heun"), 1),
            "step_size",
        );
        assert_err_contains(
            build_integrator(
                &Settings::new().with("method", "heun").with("step_size", -1.0),
                1,
            ),
            "`heun`",
        );
        assert_err_contains(
            build_integrator(
                &Settings::new()
                    .with("method", "manhattan")
                    .with("step_size", 0.1)
                    .with("threshold", 0.5)
                    .with("stepper.method", "adams_bashforth"),
                1,
            ),
            "one-step",
        );
    }

    #[test]
    fn step_control_validates_weights() {
        let settings = Settings::new().with("variable_weights", vec![1.0, 2.0]);
        assert!(StepControl::from_config(&settings, 2).is_ok());
        assert!(StepControl::from_config(&settings, 3).is_err());

        let settings = Settings::new().with("variable_weights", vec![1.0, 0.0]);
        assert!(StepControl::from_config(&settings, 2).is_err());

        let control: StepControl = serde_json::from_str(r#"{"accuracy": 1e-8}"#).unwrap();
        assert_eq!(control.safety, 0.9);
        assert_eq!(control.weights(2), vec![1.0, 1.0]);
    }

    #[test]
    fn scaled_error_uses_weights_and_flags_nan() {
        assert_eq!(scaled_error(&[1.0, 2.0], &[0.0, 0.0], &[1.0, 4.0]), 1.0);
        assert!(scaled_error(&[f64::NAN], &[0.0], &[1.0]).is_nan());
    }

    #[test]
    fn last_substep_is_the_exact_remainder() {
        assert_eq!(next_substep(0.3, 0.0, 1.0), (0.3, false));
        let (h, last) = next_substep(0.5, 0.75, 1.0);
        assert!(last);
        assert_eq!(h, 1.0 - 0.75);
    }
}
