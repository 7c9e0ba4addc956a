//! Runge-Kutta stepper driven by an arbitrary explicit Butcher tableau.

use super::Stepper;
use crate::config::{keys, ConfigQuery};
use crate::error::ConfigError;
use crate::history::History;
use crate::proxy::RhsProxy;
use nalgebra::{DMatrix, DVector};

/// Explicit Butcher tableau with `S` stages.
///
/// The coupling matrix is strictly lower triangular and is given row-wise as
/// a flat array `[a21, a31, a32, a41, ...]` of length `S(S-1)/2`. Nodes are
/// the row sums `c_i = Σ_j a_ij`.
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
    order: usize,
}

impl ButcherTableau {
    /// `order` is only used by step-size control; pass `0` if unknown.
    pub fn from_arrays(lower: &[f64], weights: &[f64], order: usize) -> Result<Self, ConfigError> {
        let stages = stage_count(lower.len()).ok_or_else(|| {
            ConfigError::MalformedTableau(format!(
                "{} coupling coefficients do not form a strictly lower triangle",
                lower.len()
            ))
        })?;
        if weights.len() != stages {
            return Err(ConfigError::MalformedTableau(format!(
                "{} stages need {} weights, got {}",
                stages,
                stages,
                weights.len()
            )));
        }
        if lower.iter().chain(weights).any(|v| !v.is_finite()) {
            return Err(ConfigError::MalformedTableau(
                "coefficients must be finite".to_string(),
            ));
        }

        let mut a = DMatrix::zeros(stages, stages);
        let mut idx = 0;
        for i in 1..stages {
            for j in 0..i {
                a[(i, j)] = lower[idx];
                idx += 1;
            }
        }
        let c = DVector::from_iterator(stages, a.row_iter().map(|row| row.sum()));
        let b = DVector::from_column_slice(weights);

        let weight_sum = b.sum();
        if (weight_sum - 1.0).abs() > 1e-12 {
            log::warn!("Butcher weights sum to {weight_sum}, the method is not consistent");
        }

        Ok(Self { a, b, c, order })
    }

    /// Well-known tableaux by name.
    pub fn named(name: &str) -> Result<Self, ConfigError> {
        let third = 1.0 / 3.0;
        let (lower, weights, order): (Vec<f64>, Vec<f64>, usize) = match name {
            "euler" => (vec![], vec![1.0], 1),
            "heun" => (vec![1.0], vec![0.5, 0.5], 2),
            "midpoint" => (vec![0.5], vec![0.0, 1.0], 2),
            "ralston" => (vec![2.0 / 3.0], vec![0.25, 0.75], 2),
            "kutta3" => (vec![0.5, -1.0, 2.0], vec![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0], 3),
            "rk44" => (
                vec![0.5, 0.0, 0.5, 0.0, 0.0, 1.0],
                vec![1.0 / 6.0, third, third, 1.0 / 6.0],
                4,
            ),
            "three_eighths" => (
                vec![third, -third, 1.0, 1.0, -1.0, 1.0],
                vec![0.125, 0.375, 0.375, 0.125],
                4,
            ),
            _ => {
                return Err(ConfigError::UnknownEnumValue {
                    key: keys::BUTCHER_TABLEAU.to_string(),
                    value: name.to_string(),
                })
            }
        };
        Self::from_arrays(&lower, &weights, order)
    }

    /// Reads either a named tableau or the raw `butcher_a`/`butcher_b` arrays.
    pub fn from_config(config: &dyn ConfigQuery) -> Result<Self, ConfigError> {
        if config.check_for_key(keys::BUTCHER_TABLEAU) {
            return Self::named(&config.get_text(keys::BUTCHER_TABLEAU)?);
        }

        let mut lower = Vec::new();
        let mut weights = Vec::new();
        config.get_array(keys::BUTCHER_A, &mut lower)?;
        config.get_array(keys::BUTCHER_B, &mut weights)?;
        let order = config.get_integer_or(keys::BUTCHER_ORDER, 0)?;
        if order < 0 {
            return Err(ConfigError::InvalidValue {
                key: keys::BUTCHER_ORDER.to_string(),
                reason: "order must not be negative".to_string(),
            });
        }
        Self::from_arrays(&lower, &weights, order as usize)
    }

    pub fn stages(&self) -> usize {
        self.b.len()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn nodes(&self) -> &DVector<f64> {
        &self.c
    }
}

/// Solves `S(S-1)/2 = len` for the stage count.
fn stage_count(len: usize) -> Option<usize> {
    let mut stages = 1;
    while stages * (stages - 1) / 2 < len {
        stages += 1;
    }
    (stages * (stages - 1) / 2 == len).then_some(stages)
}

#[derive(Debug)]
pub struct ButcherStepper {
    tableau: ButcherTableau,
    k: Vec<Vec<f64>>,
    tmp: Vec<f64>,
}

impl ButcherStepper {
    pub fn new(tableau: ButcherTableau, dim: usize) -> Self {
        let stages = tableau.stages();
        Self {
            tableau,
            k: vec![vec![0.0; dim]; stages],
            tmp: vec![0.0; dim],
        }
    }

    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }
}

impl Stepper for ButcherStepper {
    fn name(&self) -> &'static str {
        "butcher"
    }

    fn order(&self) -> usize {
        self.tableau.order
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        if !history.ensure_rhs(0, proxy) {
            return false;
        }
        let y = history.current();
        self.k[0].copy_from_slice(history.rhs(0));

        let a = &self.tableau.a;
        for stage in 1..self.k.len() {
            let (done, rest) = self.k.split_at_mut(stage);
            for i in 0..y.len() {
                let mut accum = 0.0;
                for (j, kj) in done.iter().enumerate() {
                    accum += a[(stage, j)] * kj[i];
                }
                self.tmp[i] = y[i] + h * accum;
            }
            if !proxy.call_system_function(&self.tmp, &mut rest[0]) {
                return false;
            }
        }

        let b = &self.tableau.b;
        for i in 0..y.len() {
            let mut accum = 0.0;
            for (s, ks) in self.k.iter().enumerate() {
                accum += b[s] * ks[i];
            }
            out[i] = y[i] + h * accum;
        }
        true
    }
}
