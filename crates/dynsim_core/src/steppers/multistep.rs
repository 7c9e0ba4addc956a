//! Linear multistep methods on the history window.
//!
//! Every method here needs `k` past states (or their derivatives). Until the
//! window holds that many entries the stepper takes a plain Euler-forward step
//! from the current state instead. This costs accuracy during the first few
//! iterations only.

use super::{check_order, euler_forward, Stepper};
use crate::error::ConfigError;
use crate::history::History;
use crate::proxy::RhsProxy;

pub const MAX_ADAMS_ORDER: usize = 7;
pub const MAX_BDF_ORDER: usize = 6;

/// Adams-Bashforth weights, most recent derivative first, as (numerators, denominator).
const ADAMS_BASHFORTH: [(&[f64], f64); MAX_ADAMS_ORDER] = [
    (&[1.0], 1.0),
    (&[3.0, -1.0], 2.0),
    (&[23.0, -16.0, 5.0], 12.0),
    (&[55.0, -59.0, 37.0, -9.0], 24.0),
    (&[1901.0, -2774.0, 2616.0, -1274.0, 251.0], 720.0),
    (&[4277.0, -7923.0, 9982.0, -7298.0, 2877.0, -475.0], 1440.0),
    (
        &[198721.0, -447288.0, 705549.0, -688256.0, 407139.0, -134472.0, 19087.0],
        60480.0,
    ),
];

/// Adams-Moulton weights. The first entry multiplies f at the new state, the
/// rest the history derivatives from the most recent one backwards.
const ADAMS_MOULTON: [(&[f64], f64); MAX_ADAMS_ORDER] = [
    (&[1.0], 1.0),
    (&[1.0, 1.0], 2.0),
    (&[5.0, 8.0, -1.0], 12.0),
    (&[9.0, 19.0, -5.0, 1.0], 24.0),
    (&[251.0, 646.0, -264.0, 106.0, -19.0], 720.0),
    (&[475.0, 1427.0, -798.0, 482.0, -173.0, 27.0], 1440.0),
    (
        &[19087.0, 65112.0, -46461.0, 37504.0, -20211.0, 6312.0, -863.0],
        60480.0,
    ),
];

/// BDF: y_{n+1} = Σ_j alpha_j y_{n-j} + beta h f(y_{n+1}); (alphas, beta, denominator).
const BDF: [(&[f64], f64, f64); MAX_BDF_ORDER] = [
    (&[1.0], 1.0, 1.0),
    (&[4.0, -1.0], 2.0, 3.0),
    (&[18.0, -9.0, 2.0], 6.0, 11.0),
    (&[48.0, -36.0, 16.0, -3.0], 12.0, 25.0),
    (&[300.0, -300.0, 200.0, -75.0, 12.0], 60.0, 137.0),
    (&[360.0, -450.0, 400.0, -225.0, 72.0, -10.0], 60.0, 147.0),
];

pub(crate) fn adams_bashforth_weights(order: usize) -> Vec<f64> {
    let (numerators, denominator) = ADAMS_BASHFORTH[order - 1];
    numerators.iter().map(|n| n / denominator).collect()
}

pub(crate) fn adams_moulton_weights(order: usize) -> Vec<f64> {
    let (numerators, denominator) = ADAMS_MOULTON[order - 1];
    numerators.iter().map(|n| n / denominator).collect()
}

pub(crate) fn bdf_weights(order: usize) -> (Vec<f64>, f64) {
    let (numerators, beta, denominator) = BDF[order - 1];
    (
        numerators.iter().map(|n| n / denominator).collect(),
        beta / denominator,
    )
}

/// Σ_j weights[j] * history.rhs(j), added to `out`.
fn accumulate_rhs(history: &History, weights: &[f64], scale: f64, out: &mut [f64]) {
    for (back, w) in weights.iter().enumerate() {
        let f = history.rhs(back);
        for i in 0..out.len() {
            out[i] += scale * w * f[i];
        }
    }
}

fn ensure_rhs_window(history: &mut History, count: usize, proxy: &RhsProxy<'_>) -> bool {
    (0..count).all(|back| history.ensure_rhs(back, proxy))
}

/// Adams-Bashforth, order 1 to 7.
#[derive(Debug)]
pub struct AdamsBashforth {
    order: usize,
    weights: Vec<f64>,
}

impl AdamsBashforth {
    pub fn new(order: i64, _dim: usize) -> Result<Self, ConfigError> {
        let order = check_order("adams_bashforth", order, MAX_ADAMS_ORDER)?;
        Ok(Self {
            order,
            weights: adams_bashforth_weights(order),
        })
    }
}

impl Stepper for AdamsBashforth {
    fn name(&self) -> &'static str {
        "adams_bashforth"
    }

    fn order(&self) -> usize {
        self.order
    }

    fn least_orbit_size(&self) -> usize {
        self.order
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        if history.len() < self.order {
            return euler_forward(proxy, h, history, out);
        }
        if !ensure_rhs_window(history, self.order, proxy) {
            return false;
        }
        out.copy_from_slice(history.current());
        accumulate_rhs(history, &self.weights, h, out);
        true
    }
}

/// Corrector half of a predictor-corrector pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Corrector {
    AdamsMoulton { order: usize, weights: Vec<f64> },
    Bdf { order: usize, alphas: Vec<f64>, beta: f64 },
}

impl Corrector {
    pub fn adams_moulton(order: i64) -> Result<Self, ConfigError> {
        let order = check_order("adams_moulton", order, MAX_ADAMS_ORDER)?;
        Ok(Corrector::AdamsMoulton {
            order,
            weights: adams_moulton_weights(order),
        })
    }

    pub fn bdf(order: i64) -> Result<Self, ConfigError> {
        let order = check_order("bdf", order, MAX_BDF_ORDER)?;
        let (alphas, beta) = bdf_weights(order);
        Ok(Corrector::Bdf {
            order,
            alphas,
            beta,
        })
    }

    pub fn order(&self) -> usize {
        match self {
            Corrector::AdamsMoulton { order, .. } | Corrector::Bdf { order, .. } => *order,
        }
    }

    /// History entries read besides the implicit point.
    pub(crate) fn window(&self) -> usize {
        match self {
            Corrector::AdamsMoulton { order, .. } => order.saturating_sub(1).max(1),
            Corrector::Bdf { order, .. } => *order,
        }
    }

    /// Writes the corrected state given f evaluated at the implicit point.
    /// Derivatives for AM must already be cached in `history`.
    pub(crate) fn apply(&self, history: &History, h: f64, f_implicit: &[f64], out: &mut [f64]) {
        match self {
            Corrector::AdamsMoulton { weights, .. } => {
                let y = history.current();
                for i in 0..out.len() {
                    out[i] = y[i] + h * weights[0] * f_implicit[i];
                }
                accumulate_rhs(history, &weights[1..], h, out);
            }
            Corrector::Bdf { alphas, beta, .. } => {
                for i in 0..out.len() {
                    out[i] = beta * h * f_implicit[i];
                }
                for (back, alpha) in alphas.iter().enumerate() {
                    let y = history.state(back);
                    for i in 0..out.len() {
                        out[i] += alpha * y[i];
                    }
                }
            }
        }
    }

    /// Derivatives the corrector reads from the history (AM only).
    pub(crate) fn rhs_window(&self) -> usize {
        match self {
            Corrector::AdamsMoulton { weights, .. } => weights.len() - 1,
            Corrector::Bdf { .. } => 0,
        }
    }
}

/// Predict-Evaluate-Correct-Evaluate with an Adams-Bashforth predictor.
///
/// The final evaluation at the corrected state happens lazily: it is the
/// cached derivative of the next history entry.
#[derive(Debug)]
pub struct Pece {
    predictor: AdamsBashforth,
    corrector: Corrector,
    predicted: Vec<f64>,
    f_predicted: Vec<f64>,
}

impl Pece {
    pub fn new(
        predictor_order: i64,
        corrector: Corrector,
        dim: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            predictor: AdamsBashforth::new(predictor_order, dim)?,
            corrector,
            predicted: vec![0.0; dim],
            f_predicted: vec![0.0; dim],
        })
    }

    fn window(&self) -> usize {
        self.predictor.order.max(self.corrector.window())
    }
}

impl Stepper for Pece {
    fn name(&self) -> &'static str {
        match self.corrector {
            Corrector::AdamsMoulton { .. } => "pece_adams",
            Corrector::Bdf { .. } => "pece_bdf",
        }
    }

    fn order(&self) -> usize {
        self.corrector.order()
    }

    fn least_orbit_size(&self) -> usize {
        self.predictor.order.max(self.corrector.order()) + 1
    }

    fn perform(
        &mut self,
        proxy: &RhsProxy<'_>,
        h: f64,
        history: &mut History,
        out: &mut [f64],
    ) -> bool {
        if history.len() < self.window() {
            return euler_forward(proxy, h, history, out);
        }

        // P
        if !self.predictor.perform(proxy, h, history, &mut self.predicted) {
            return false;
        }
        // E
        if !proxy.call_system_function(&self.predicted, &mut self.f_predicted) {
            return false;
        }
        // C
        if !ensure_rhs_window(history, self.corrector.rhs_window(), proxy) {
            return false;
        }
        self.corrector.apply(history, h, &self.f_predicted, out);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steppers::explicit::EulerForward;
    use crate::steppers::test_support::{polynomial, polynomial_history, polynomial_state};
    use crate::traits::FnSystem;

    fn exact_history(capacity: usize, h: f64, filled: usize) -> History {
        // Exact samples of exp(-t) at t = 0, h, 2h, ... with the newest last.
        let mut history = History::new(capacity, 1);
        history.reset(&[1.0]);
        for n in 1..filled {
            history.push(&[(-(n as f64) * h).exp()]);
        }
        history
    }

    fn local_error(stepper: &mut dyn Stepper, h: f64) -> f64 {
        let system = FnSystem::new(1, |x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = -x[0];
            true
        });
        let proxy = RhsProxy::new(&system, &[]);
        let filled = stepper.least_orbit_size();
        let mut history = exact_history(filled, h, filled);
        let mut out = [0.0];
        assert!(stepper.perform(&proxy, h, &mut history, &mut out));
        (out[0] - (-(filled as f64) * h).exp()).abs()
    }

    #[test]
    fn weights_are_consistent() {
        for order in 1..=MAX_ADAMS_ORDER {
            let ab: f64 = adams_bashforth_weights(order).iter().sum();
            let am: f64 = adams_moulton_weights(order).iter().sum();
            assert!((ab - 1.0).abs() < 1e-12, "AB{order} weights sum to {ab}");
            assert!((am - 1.0).abs() < 1e-12, "AM{order} weights sum to {am}");
        }
        for order in 1..=MAX_BDF_ORDER {
            let (alphas, _) = bdf_weights(order);
            let sum: f64 = alphas.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "BDF{order} alphas sum to {sum}");
        }
    }

    #[test]
    fn bootstrap_matches_euler_forward() {
        let system = FnSystem::new(2, |x: &[f64], _p: &[f64], out: &mut [f64]| {
            out[0] = x[1];
            out[1] = -x[0].sin();
            true
        });
        let proxy = RhsProxy::new(&system, &[]);
        let mut steppers: Vec<Box<dyn Stepper>> = vec![
            Box::new(AdamsBashforth::new(5, 2).unwrap()),
            Box::new(Pece::new(3, Corrector::adams_moulton(4).unwrap(), 2).unwrap()),
            Box::new(Pece::new(2, Corrector::bdf(3).unwrap(), 2).unwrap()),
        ];
        for stepper in steppers.iter_mut() {
            let mut history = History::new(stepper.least_orbit_size(), 2);
            history.reset(&[0.3, -0.2]);
            history.push(&[0.31, -0.21]);

            let mut multistep = [0.0; 2];
            let mut euler = [0.0; 2];
            assert!(stepper.perform(&proxy, 0.05, &mut history, &mut multistep));
            assert!(EulerForward::new().perform(&proxy, 0.05, &mut history, &mut euler));
            assert_eq!(multistep, euler, "{} did not bootstrap with Euler", stepper.name());
        }
    }

    #[test]
    fn adams_bashforth_local_orders() {
        for order in 1..=4i64 {
            let mut stepper = AdamsBashforth::new(order, 1).unwrap();
            let e1 = local_error(&mut stepper, 0.01);
            let e2 = local_error(&mut stepper, 0.005);
            let observed = (e1 / e2).log2();
            assert!(
                (observed - (order as f64 + 1.0)).abs() < 0.2,
                "AB{order}: observed {observed}"
            );
        }
    }

    #[test]
    fn adams_bashforth_is_exact_on_polynomials() {
        let (t0, h) = (0.3, 0.1);
        for order in 1..=MAX_ADAMS_ORDER as i64 {
            let mut stepper = AdamsBashforth::new(order, 2).unwrap();
            let filled = stepper.least_orbit_size();
            for q in 0..order as i32 {
                let system = polynomial(q);
                let proxy = RhsProxy::new(&system, &[]);
                let mut history = polynomial_history(q, filled, t0, h);
                let mut out = [0.0; 2];
                assert!(stepper.perform(&proxy, h, &mut history, &mut out));
                let exact = polynomial_state(q, t0 + filled as f64 * h);
                assert!(
                    (out[0] - exact[0]).abs() < 1e-12,
                    "AB{order} on t^{q}: {} vs {}",
                    out[0],
                    exact[0]
                );
                assert!((out[1] - exact[1]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn pece_improves_on_its_predictor() {
        let h = 0.05;
        let ab = local_error(&mut AdamsBashforth::new(3, 1).unwrap(), h);
        let pece_am = local_error(
            &mut Pece::new(3, Corrector::adams_moulton(4).unwrap(), 1).unwrap(),
            h,
        );
        let pece_bdf = local_error(&mut Pece::new(3, Corrector::bdf(3).unwrap(), 1).unwrap(), h);
        assert!(pece_am < ab, "AM corrector error {pece_am} vs predictor {ab}");
        assert!(pece_bdf < 1e-5);
    }

    #[test]
    fn pece_window_is_padded() {
        let pece = Pece::new(2, Corrector::bdf(5).unwrap(), 1).unwrap();
        assert_eq!(pece.least_orbit_size(), 6);
        assert_eq!(pece.name(), "pece_bdf");
        assert_eq!(pece.order(), 5);
    }

    #[test]
    fn orders_are_bounds_checked() {
        assert!(AdamsBashforth::new(0, 1).is_err());
        assert!(AdamsBashforth::new(7, 1).is_ok());
        assert!(Corrector::adams_moulton(8).is_err());
        assert!(Corrector::bdf(6).is_ok());
        assert!(Corrector::bdf(7).is_err());
    }
}
