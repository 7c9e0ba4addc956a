//! Outer iteration loop tying a system, an integrator and a history together.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::config::ConfigQuery;
use crate::error::{ConfigError, IntegrationError};
use crate::history::History;
use crate::integrators::{build_integrator, Integrator};
use crate::proxy::RhsProxy;
use crate::traits::DynamicalSystem;

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub iterations: usize,
    pub time: f64,
    pub evaluations: usize,
    pub substeps: usize,
    /// Why the run stopped early, if it did.
    #[serde(skip)]
    pub error: Option<IntegrationError>,
}

pub struct Simulation<'a> {
    proxy: RhsProxy<'a>,
    integrator: Box<dyn Integrator>,
    history: History,
    iteration: usize,
    time: f64,
    is_final: bool,
}

impl<'a> Simulation<'a> {
    pub fn new(
        system: &'a dyn DynamicalSystem,
        parameters: &[f64],
        integrator: Box<dyn Integrator>,
        initial: &[f64],
        history_capacity: usize,
    ) -> Result<Self> {
        let dim = system.dimension();
        if initial.len() != dim {
            bail!(
                "Initial state has {} components, system dimension is {}",
                initial.len(),
                dim
            );
        }
        let required = integrator.least_orbit_size();
        if history_capacity < required {
            return Err(ConfigError::HistoryTooShort {
                capacity: history_capacity,
                required,
            }
            .into());
        }

        let mut history = History::new(history_capacity, dim);
        history.reset(initial);
        Ok(Self {
            proxy: RhsProxy::new(system, parameters),
            integrator,
            history,
            iteration: 0,
            time: 0.0,
            is_final: false,
        })
    }

    /// Builds the integrator from `config` with the smallest history it needs.
    pub fn from_config(
        system: &'a dyn DynamicalSystem,
        parameters: &[f64],
        config: &dyn ConfigQuery,
        initial: &[f64],
    ) -> Result<Self> {
        let integrator = build_integrator(config, system.dimension())?;
        let capacity = integrator.least_orbit_size();
        Self::new(system, parameters, integrator, initial, capacity)
    }

    /// Starts a new run from `initial`.
    pub fn reset(&mut self, initial: &[f64]) -> Result<()> {
        if initial.len() != self.history.dimension() {
            bail!(
                "Initial state has {} components, system dimension is {}",
                initial.len(),
                self.history.dimension()
            );
        }
        self.history.reset(initial);
        self.integrator.reset();
        self.proxy.reset_evaluations();
        self.iteration = 0;
        self.time = 0.0;
        self.is_final = false;
        Ok(())
    }

    /// Rebinds the parameter vector between runs. Cached derivatives are
    /// discarded since they were computed with the old parameters.
    pub fn rebind_parameters(&mut self, parameters: &[f64]) {
        self.proxy.set_parameters(parameters);
        self.history.invalidate_derivatives();
        self.integrator.invalidate_derivatives();
    }

    /// Advances one outer iteration. An error marks the run as final.
    pub fn step(&mut self) -> Result<(), IntegrationError> {
        match self.integrator.execute(&self.proxy, &mut self.history) {
            Ok(()) => {
                self.iteration += 1;
                self.time += self.integrator.step_size();
                Ok(())
            }
            Err(err) => {
                log::warn!(
                    "run stopped at iteration {} (t = {}): {}",
                    self.iteration,
                    self.time,
                    err
                );
                self.is_final = true;
                Err(err)
            }
        }
    }

    /// Runs up to `iterations` outer iterations, stopping at the first error.
    pub fn run(&mut self, iterations: usize) -> RunSummary {
        let start = self.iteration;
        let mut substeps = 0;
        let mut error = None;
        for _ in 0..iterations {
            if self.is_final {
                break;
            }
            if let Err(err) = self.step() {
                error = Some(err);
                break;
            }
            substeps += self.integrator.last_substeps().len();
        }
        RunSummary {
            iterations: self.iteration - start,
            time: self.time,
            evaluations: self.proxy.evaluations(),
            substeps,
            error,
        }
    }

    pub fn state(&self) -> &[f64] {
        self.history.current()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    pub fn proxy(&self) -> &RhsProxy<'a> {
        &self.proxy
    }
}
