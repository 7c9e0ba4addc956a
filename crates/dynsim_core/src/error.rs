//! Error types shared by the integration core and the spatial operators.

use std::fmt;
use thiserror::Error;

/// Which edge of the cell range a boundary policy is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundarySide {
    Min,
    Max,
}

impl fmt::Display for BoundarySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundarySide::Min => write!(f, "min"),
            BoundarySide::Max => write!(f, "max"),
        }
    }
}

/// Setup mistakes. These are never recovered from: the caller is expected to
/// report the message and abort the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("key '{key}' holds the wrong type (expected {expected})")]
    WrongType { key: String, expected: &'static str },

    #[error("unknown value '{value}' for key '{key}'")]
    UnknownEnumValue { key: String, value: String },

    #[error("{method} order {order} is out of range (allowed {min}..={max})")]
    OrderOutOfRange {
        method: &'static str,
        order: i64,
        min: usize,
        max: usize,
    },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("malformed Butcher tableau: {0}")]
    MalformedTableau(String),

    #[error("{method} requires a one-step stepper, got '{stepper}'")]
    MultistepNotSupported {
        method: &'static str,
        stepper: &'static str,
    },

    #[error("history capacity {capacity} is smaller than the required look-back {required}")]
    HistoryTooShort { capacity: usize, required: usize },

    #[error("boundary policy of operator '{operator}' ({side} side) was never set")]
    InvalidBoundaryPolicy { operator: String, side: BoundarySide },

    #[error("constant boundary of operator '{operator}' ({side} side) has no configured value")]
    MissingBoundaryValue { operator: String, side: BoundarySide },

    #[error("operator '{operator}' needs at least {required} cells, got {cells}")]
    GridTooSmall {
        operator: String,
        cells: usize,
        required: usize,
    },
}

/// Failures of a single outer iteration. Any of these ends the current run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("system function could not be evaluated")]
    EvaluationFailed,

    #[error("fixed point not reached after {iterations} iterations (distance {distance:e})")]
    NotConverged { iterations: usize, distance: f64 },

    #[error("step size {step:e} fell below the minimum {min_step:e}")]
    StepSizeUnderflow { step: f64, min_step: f64 },
}
