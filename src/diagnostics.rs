//! Structured notices returned alongside numerical results.
//!
//! Nothing here ever aborts a computation. Each notice is also forwarded to
//! `tracing` at debug level so a subscriber can surface it when asked to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::LossKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// `eta == 1` switches CRRA utility to the natural logarithm, a special
    /// case that is not the continuous limit of the general form's constant.
    LogUtility { eta: f64 },
    /// Consumption values at or below zero were mapped to NaN utility.
    UndefinedUtility { count: usize },
    /// Adaptive quadrature stopped at its subdivision limit before meeting
    /// tolerance for `count` rates; `lambda` is the one with the largest error.
    QuadratureNotConverged { count: usize, lambda: f64, estimated_error: f64, intervals: usize },
    /// `count` integrated totals over `[lambda_min, lambda_max]` came out NaN
    /// (typically consumption driven below zero).
    UndefinedTotal { kind: LossKind, count: usize, lambda_min: f64, lambda_max: f64 },
    /// The simplex search hit its iteration cap.
    OptimizerNotConverged { iterations: usize, best_lambda: f64 },
}

impl Diagnostic {
    pub fn emit(&self) {
        tracing::debug!(diagnostic = %self, "numerical notice");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogUtility { eta } => {
                write!(f, "LogUtility eta={eta}: utility uses ln(c)")
            }
            Self::UndefinedUtility { count } => {
                write!(f, "UndefinedUtility: {count} non-positive consumption value(s) mapped to NaN")
            }
            Self::QuadratureNotConverged { count, lambda, estimated_error, intervals } => {
                write!(
                    f,
                    "QuadratureNotConverged for {count} rate(s), worst lambda={lambda}: error≈{estimated_error:e} after {intervals} intervals"
                )
            }
            Self::UndefinedTotal { kind, count, lambda_min, lambda_max } => {
                write!(f, "UndefinedTotal {kind}: {count} rate(s) in [{lambda_min}, {lambda_max}]")
            }
            Self::OptimizerNotConverged { iterations, best_lambda } => {
                write!(f, "OptimizerNotConverged after {iterations} iterations, best lambda={best_lambda}")
            }
        }
    }
}

/// A value plus the notices raised while computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Outcome<T> {
    pub fn with(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        for d in &diagnostics {
            d.emit();
        }
        Self { value, diagnostics }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome { value: f(self.value), diagnostics: self.diagnostics }
    }

    /// Move the notices into `sink` and return the bare value.
    pub fn drain_into(self, sink: &mut Vec<Diagnostic>) -> T {
        sink.extend(self.diagnostics);
        self.value
    }

    pub fn has(&self, pred: fn(&Diagnostic) -> bool) -> bool {
        self.diagnostics.iter().any(pred)
    }
}
