//! Implicit steppers. Each evaluates the update formula once with a guess for
//! the unknown next state; the fixed-point loop lives in the backward
//! integrator.

use super::multistep::Corrector;
use super::{euler_forward, ImplicitStepper};
use crate::error::ConfigError;
use crate::history::History;
use crate::proxy::RhsProxy;

/// y + h f(iterated)
#[derive(Debug)]
pub struct EulerBackward {
    f_iterated: Vec<f64>,
}

impl EulerBackward {
    pub fn new(dim: usize) -> Self {
        Self {
            f_iterated: vec![0.0; dim],
        }
    }
}

impl ImplicitStepper for EulerBackward {
    fn name(&self) -> &'static str {
        "euler_backward"
    }

    fn order(&self) -> usize {
        1
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool {
        if !proxy.call_system_function(iterated, &mut self.f_iterated) {
            return false;
        }
        let y = history.current();
        for i in 0..out.len() {
            out[i] = y[i] + h * self.f_iterated[i];
        }
        true
    }
}

/// Implicit trapezoid: y + h/2 (f(y) + f(iterated)).
#[derive(Debug)]
pub struct HeunBackward {
    f_iterated: Vec<f64>,
}

impl HeunBackward {
    pub fn new(dim: usize) -> Self {
        Self {
            f_iterated: vec![0.0; dim],
        }
    }
}

impl ImplicitStepper for HeunBackward {
    fn name(&self) -> &'static str {
        "heun_backward"
    }

    fn order(&self) -> usize {
        2
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool {
        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        if !proxy.call_system_function(iterated, &mut self.f_iterated) {
            return false;
        }
        let y = history.current();
        let f = history.rhs(0);
        for i in 0..out.len() {
            out[i] = y[i] + 0.5 * h * (f[i] + self.f_iterated[i]);
        }
        true
    }
}

/// Shared body of the implicit multistep methods.
#[derive(Debug)]
struct ImplicitMultistep {
    corrector: Corrector,
    f_iterated: Vec<f64>,
}

impl ImplicitMultistep {
    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool {
        if history.len() < self.corrector.window() {
            return euler_forward(proxy, h, history, out);
        }
        for back in 0..self.corrector.rhs_window() {
            if !history.ensure_rhs(back, proxy) {
                return false;
            }
        }
        if !proxy.call_system_function(iterated, &mut self.f_iterated) {
            return false;
        }
        self.corrector.apply(history, h, &self.f_iterated, out);
        true
    }
}

/// Adams-Moulton, order 1 to 7.
#[derive(Debug)]
pub struct AdamsMoulton(ImplicitMultistep);

impl AdamsMoulton {
    pub fn new(order: i64, dim: usize) -> Result<Self, ConfigError> {
        Ok(Self(ImplicitMultistep {
            corrector: Corrector::adams_moulton(order)?,
            f_iterated: vec![0.0; dim],
        }))
    }
}

impl ImplicitStepper for AdamsMoulton {
    fn name(&self) -> &'static str {
        "adams_moulton"
    }

    fn order(&self) -> usize {
        self.0.corrector.order()
    }

    fn least_orbit_size(&self) -> usize {
        self.0.corrector.window()
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool {
        self.0.perform(proxy, h, history, iterated, out)
    }
}

/// Backward differentiation formula, order 1 to 6.
#[derive(Debug)]
pub struct Bdf(ImplicitMultistep);

impl Bdf {
    pub fn new(order: i64, dim: usize) -> Result<Self, ConfigError> {
        Ok(Self(ImplicitMultistep {
            corrector: Corrector::bdf(order)?,
            f_iterated: vec![0.0; dim],
        }))
    }
}

impl ImplicitStepper for Bdf {
    fn name(&self) -> &'static str {
        "bdf"
    }

    fn order(&self) -> usize {
        self.0.corrector.order()
    }

    fn least_orbit_size(&self) -> usize {
        self.0.corrector.window()
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        iterated: &[f64],
        out: &mut [f64],
    ) -> bool {
        self.0.perform(proxy, h, history, iterated, out)
    }
}
