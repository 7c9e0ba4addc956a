use serde::{Deserialize, Serialize};

use super::coefficients::CoefficientCache;
use super::Samples;
use crate::error::ConfigError;

/// Highest derivative order a stencil is generated for.
pub const MAX_DIFFERENCE_ORDER: u32 = 32;

/// Central difference stencil of a given derivative order.
///
/// Orders one to five have fixed stencils; higher orders are generated from
/// binomial coefficients. Order zero is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DifferenceScheme {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    GenericEven(u32),
    GenericOdd(u32),
}

impl DifferenceScheme {
    pub fn for_order(order: u32) -> Result<Self, ConfigError> {
        Ok(match order {
            1 => DifferenceScheme::First,
            2 => DifferenceScheme::Second,
            3 => DifferenceScheme::Third,
            4 => DifferenceScheme::Fourth,
            5 => DifferenceScheme::Fifth,
            n if n > MAX_DIFFERENCE_ORDER => {
                return Err(ConfigError::OrderOutOfRange {
                    method: "difference operator",
                    order: i64::from(n),
                    min: 0,
                    max: MAX_DIFFERENCE_ORDER as usize,
                })
            }
            n if n % 2 == 0 => DifferenceScheme::GenericEven(n),
            n => DifferenceScheme::GenericOdd(n),
        })
    }

    pub fn order(self) -> u32 {
        match self {
            DifferenceScheme::First => 1,
            DifferenceScheme::Second => 2,
            DifferenceScheme::Third => 3,
            DifferenceScheme::Fourth => 4,
            DifferenceScheme::Fifth => 5,
            DifferenceScheme::GenericEven(n) | DifferenceScheme::GenericOdd(n) => n,
        }
    }

    /// Cells the stencil reaches to the left of the evaluation point.
    pub fn left_offset(self) -> usize {
        let n = self.order() as usize;
        if n % 2 == 0 {
            n / 2
        } else {
            (n - 1) / 2 + 1
        }
    }

    /// Cells the stencil reaches to the right; stencils are symmetric.
    pub fn right_offset(self) -> usize {
        self.left_offset()
    }

    /// Derivative at `index`. The caller guarantees the stencil stays inside
    /// `samples` (or that `samples` wraps).
    pub fn apply<S: Samples + ?Sized>(
        self,
        samples: &S,
        index: isize,
        spacing: f64,
        cache: &CoefficientCache,
    ) -> f64 {
        let s = |offset: isize| samples.sample(index + offset);
        match self {
            DifferenceScheme::First => (s(1) - s(-1)) / (2.0 * spacing),
            DifferenceScheme::Second => (s(-1) - 2.0 * s(0) + s(1)) / (spacing * spacing),
            DifferenceScheme::Third => {
                (-s(-2) + 2.0 * s(-1) - 2.0 * s(1) + s(2)) / (2.0 * spacing.powi(3))
            }
            DifferenceScheme::Fourth => {
                (s(-2) - 4.0 * s(-1) + 6.0 * s(0) - 4.0 * s(1) + s(2)) / spacing.powi(4)
            }
            DifferenceScheme::Fifth => {
                (-s(-3) + 4.0 * s(-2) - 5.0 * s(-1) + 5.0 * s(1) - 4.0 * s(2) + s(3))
                    / (2.0 * spacing.powi(5))
            }
            DifferenceScheme::GenericEven(n) => {
                let m = (n / 2) as isize;
                let mut sum = 0.0;
                for k in 0..=n {
                    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                    sum += sign * cache.binomial(n, k) as f64 * s(k as isize - m);
                }
                sum / spacing.powi(n as i32)
            }
            DifferenceScheme::GenericOdd(n) => {
                let m = ((n - 1) / 2) as isize;
                let mut sum = 0.0;
                for k in 0..=n + 1 {
                    sum += cache.odd_coefficient(n, k) as f64 * s(k as isize - m - 1);
                }
                sum / (2.0 * spacing.powi(n as i32))
            }
        }
    }
}
