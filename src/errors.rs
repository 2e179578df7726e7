use thiserror::Error;

use crate::types::LossKind;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WellbeingError>;

/// Every failure the engine can report.
///
/// Variants fall into two groups: domain validation (bad inputs, fatal to the
/// call) and not-ready (an operation was requested before the household reached
/// the lifecycle state it needs). Undefined utility values are not errors; they
/// travel as NaN through the arithmetic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WellbeingError {
    // ---- Domain validation ----
    #[error("recovery rate must be positive, got {value}")]
    NonPositiveRate { value: f64 },

    #[error("recovery time must be positive, got {value}")]
    NonPositiveTime { value: f64 },

    #[error("rebuilt percentage must lie in [0, 100), got {value}")]
    RebuiltPercentOutOfRange { value: f64 },

    #[error("elasticity of marginal utility must be positive, got {eta}")]
    InvalidEta { eta: f64 },

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter { name: &'static str, value: f64, reason: &'static str },

    #[error("unknown integration method '{name}', expected 'trapezoid' or 'quad'")]
    UnknownMethod { name: String },

    #[error("unknown loss kind '{name}'")]
    UnknownLossKind { name: String },

    #[error("trapezoidal integration needs at least 2 time points, got {points}")]
    GridTooShort { points: usize },

    #[error("time points must be finite and strictly increasing")]
    UnorderedGrid,

    #[error("exactly one of a time grid or a horizon must be supplied")]
    AmbiguousTimeDomain,

    #[error("utility cannot be normalized for a single consumption value")]
    NormalizeSingleValue,

    #[error("empty batch")]
    EmptyBatch,

    #[error("invalid search bounds [{lower}, {upper}]")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("sweep needs at least 2 steps, got {steps}")]
    TooFewSweepSteps { steps: usize },

    // ---- Not ready ----
    #[error("recovery rate has not been set; assign it or run the optimizer first")]
    RateNotSet,

    #[error("{kind} has not been calculated yet")]
    LossNotComputed { kind: LossKind },

    #[error("derived losses have not been calculated; run get_losses first")]
    LossesNotComputed,

    #[error("recovery-rate sweep has not been run")]
    SweepNotRun,
}

impl WellbeingError {
    /// True for errors caused by calling an operation too early in the lifecycle.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Self::RateNotSet | Self::LossNotComputed { .. } | Self::LossesNotComputed | Self::SweepNotRun
        )
    }

    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter { name, value, reason }
    }
}
