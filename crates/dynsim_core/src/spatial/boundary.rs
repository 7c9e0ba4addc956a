use std::fmt;

use serde::{Deserialize, Serialize};

use super::coefficients::CoefficientCache;
use super::scheme::DifferenceScheme;
use super::ComponentView;
use crate::error::{BoundarySide, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryKind {
    Cyclic,
    Fluxless,
    Interpolated,
    Constant,
    Invalid,
}

impl Default for BoundaryKind {
    fn default() -> Self {
        BoundaryKind::Invalid
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryKind::Cyclic => "CYCLIC",
            BoundaryKind::Fluxless => "FLUXLESS",
            BoundaryKind::Interpolated => "INTERPOLATED",
            BoundaryKind::Constant => "CONSTANT",
            BoundaryKind::Invalid => "INVALID",
        };
        f.write_str(name)
    }
}

/// Everything a policy may look at when the stencil leaves the lattice.
pub struct BoundaryContext<'a> {
    pub operator: &'a str,
    pub side: BoundarySide,
    pub scheme: DifferenceScheme,
    pub view: ComponentView<'a>,
    pub index: usize,
    pub spacing: f64,
    pub cache: &'a CoefficientCache,
}

/// Derivative near one end of the lattice.
pub trait BoundaryPolicy: fmt::Debug {
    fn kind(&self) -> BoundaryKind;

    fn evaluate(&self, ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError>;
}

/// Periodic lattice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cyclic;

impl BoundaryPolicy for Cyclic {
    fn kind(&self) -> BoundaryKind {
        BoundaryKind::Cyclic
    }

    fn evaluate(&self, ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError> {
        Ok(ctx
            .scheme
            .apply(&ctx.view.cyclic(), ctx.index as isize, ctx.spacing, ctx.cache))
    }
}

/// Zero derivative.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fluxless;

impl BoundaryPolicy for Fluxless {
    fn kind(&self) -> BoundaryKind {
        BoundaryKind::Fluxless
    }

    fn evaluate(&self, _ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError> {
        Ok(0.0)
    }
}

/// Repeats the derivative of the nearest cell where the stencil fits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolated;

impl BoundaryPolicy for Interpolated {
    fn kind(&self) -> BoundaryKind {
        BoundaryKind::Interpolated
    }

    fn evaluate(&self, ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError> {
        let cells = ctx.view.len();
        let left = ctx.scheme.left_offset();
        let right = ctx.scheme.right_offset();
        let required = left + right + 1;
        if cells < required {
            return Err(ConfigError::GridTooSmall {
                operator: ctx.operator.to_string(),
                cells,
                required,
            });
        }
        let nearest = ctx.index.clamp(left, cells - 1 - right);
        Ok(ctx
            .scheme
            .apply(&ctx.view, nearest as isize, ctx.spacing, ctx.cache))
    }
}

/// Fixed derivative value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub value: f64,
}

impl BoundaryPolicy for Constant {
    fn kind(&self) -> BoundaryKind {
        BoundaryKind::Constant
    }

    fn evaluate(&self, _ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError> {
        Ok(self.value)
    }
}

/// Placeholder for a side that was never configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Invalid;

impl BoundaryPolicy for Invalid {
    fn kind(&self) -> BoundaryKind {
        BoundaryKind::Invalid
    }

    fn evaluate(&self, ctx: &BoundaryContext<'_>) -> Result<f64, ConfigError> {
        Err(ConfigError::InvalidBoundaryPolicy {
            operator: ctx.operator.to_string(),
            side: ctx.side,
        })
    }
}
