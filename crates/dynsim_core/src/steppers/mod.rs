//! Steppers advance one state by one step of a fixed size.
//!
//! Explicit steppers implement [`Stepper`]; implicit ones implement
//! [`ImplicitStepper`] and are driven by the fixed-point loop of
//! [`BackwardIntegrator`](crate::integrators::BackwardIntegrator). Every
//! stepper reads its input from a [`History`] window (index 0 is the state to
//! advance) and writes the result into a caller-provided buffer. A `false`
//! return means the vector field could not be evaluated somewhere along the
//! step; `out` must then be discarded.

pub mod butcher;
pub mod explicit;
pub mod implicit;
pub mod multistep;

pub use butcher::{ButcherStepper, ButcherTableau};
pub use explicit::{EulerForward, Gill44, Heun, Midpoint, Radau, Ralston, Rk44, Rkf456, Rkm45};
pub use implicit::{AdamsMoulton, Bdf, EulerBackward, HeunBackward};
pub use multistep::{AdamsBashforth, Corrector, Pece};

use crate::config::{keys, ConfigQuery};
use crate::error::ConfigError;
use crate::history::History;
use crate::method::IntegrationMethod;
use crate::proxy::RhsProxy;

pub trait Stepper {
    fn name(&self) -> &'static str;

    /// Order of accuracy, `0` if unknown.
    fn order(&self) -> usize;

    /// Number of history entries the stepper reads.
    fn least_orbit_size(&self) -> usize {
        1
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool;
}

pub trait ImplicitStepper {
    fn name(&self) -> &'static str;

    fn order(&self) -> usize;

    fn least_orbit_size(&self) -> usize {
        1
    }

    /// Evaluates the implicit update with `iterated` standing in for the
    /// unknown next state.
    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool;
}

/// y + h f(y) from the most recent history entry. Multistep methods fall back
/// to this until their window is filled.
pub(crate) fn euler_forward(
    proxy: &RhsProxy<'_>,
    h: f64,
    history: &mut History,
    out: &mut [f64],
) -> bool {
    if !history.ensure_rhs(0, proxy) {
        return false;
    }
    let y = history.current();
    let f = history.rhs(0);
    for i in 0..out.len() {
        out[i] = y[i] + h * f[i];
    }
    true
}

pub(crate) fn check_order(
    method: &'static str,
    order: i64,
    max: usize,
) -> Result<usize, ConfigError> {
    if order < 1 || order > max as i64 {
        return Err(ConfigError::OrderOutOfRange {
            method,
            order,
            min: 1,
            max,
        });
    }
    Ok(order as usize)
}

/// Builds the explicit stepper selected by the `method` key of `config`.
pub fn build_stepper(
    config: &dyn ConfigQuery,
    dim: usize,
) -> Result<Box<dyn Stepper>, ConfigError> {
    let method = IntegrationMethod::from_config(config)?;
    let stepper: Box<dyn Stepper> = match method {
        IntegrationMethod::EulerForward => Box::new(EulerForward::new()),
        IntegrationMethod::Heun => Box::new(Heun::new(dim)),
        IntegrationMethod::Midpoint => Box::new(Midpoint::new(dim)),
        IntegrationMethod::Ralston => Box::new(Ralston::new(dim)),
        IntegrationMethod::Radau => Box::new(Radau::new(dim)),
        IntegrationMethod::Rk44 => Box::new(Rk44::new(dim)),
        IntegrationMethod::Gill44 => Box::new(Gill44::new(dim)),
        IntegrationMethod::Rkm45 => Box::new(Rkm45::new(dim)),
        IntegrationMethod::Rkf456 => Box::new(Rkf456::new(dim)),
        IntegrationMethod::Butcher => {
            Box::new(ButcherStepper::new(ButcherTableau::from_config(config)?, dim))
        }
        IntegrationMethod::AdamsBashforth => Box::new(AdamsBashforth::new(
            config.get_integer_or(keys::ORDER, 4)?,
            dim,
        )?),
        IntegrationMethod::PeceAdams => Box::new(Pece::new(
            config.get_integer_or(keys::PREDICTOR_ORDER, 4)?,
            Corrector::adams_moulton(config.get_integer_or(keys::CORRECTOR_ORDER, 4)?)?,
            dim,
        )?),
        IntegrationMethod::PeceBdf => Box::new(Pece::new(
            config.get_integer_or(keys::PREDICTOR_ORDER, 4)?,
            Corrector::bdf(config.get_integer_or(keys::CORRECTOR_ORDER, 4)?)?,
            dim,
        )?),
        other => {
            return Err(ConfigError::UnknownEnumValue {
                key: keys::METHOD.to_string(),
                value: format!("{} (not an explicit stepper)", other.token()),
            })
        }
    };
    Ok(stepper)
}

/// Builds the implicit stepper selected by the `method` key of `config`.
pub fn build_implicit_stepper(
    config: &dyn ConfigQuery,
    dim: usize,
) -> Result<Box<dyn ImplicitStepper>, ConfigError> {
    let method = IntegrationMethod::from_config(config)?;
    let stepper: Box<dyn ImplicitStepper> = match method {
        IntegrationMethod::EulerBackward => Box::new(EulerBackward::new(dim)),
        IntegrationMethod::HeunBackward => Box::new(HeunBackward::new(dim)),
        IntegrationMethod::AdamsMoulton => Box::new(AdamsMoulton::new(
            config.get_integer_or(keys::ORDER, 4)?,
            dim,
        )?),
        IntegrationMethod::Bdf => Box::new(Bdf::new(config.get_integer_or(keys::ORDER, 4)?, dim)?),
        other => {
            return Err(ConfigError::UnknownEnumValue {
                key: keys::METHOD.to_string(),
                value: format!("{} (not an implicit stepper)", other.token()),
            })
        }
    };
    Ok(stepper)
}
