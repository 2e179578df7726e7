//! Instantaneous loss rates of a damaged household as functions of time `t`
//! and recovery rate `λ`. All are rates (per year), not totals; see
//! [`crate::integration`] for totals.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, WellbeingError};
use crate::types::LossKind;
use crate::utility::{self, crra};

/// Rebuild expenditure `λ·v·k·e^(-λt)`; integrates to `v·k` over `[0, ∞)`.
#[inline]
pub fn reconstruction_rate(t: f64, lambda: f64, v: f64, k_str: f64) -> f64 {
    lambda * v * k_str * (-lambda * t).exp()
}

/// Income foregone on the still-damaged capital: `π·v·k·e^(-λt)`.
#[inline]
pub fn income_rate(t: f64, lambda: f64, v: f64, k_str: f64, pi: f64) -> f64 {
    pi * v * k_str * (-lambda * t).exp()
}

#[inline]
pub fn consumption_rate(t: f64, lambda: f64, v: f64, k_str: f64, pi: f64) -> f64 {
    income_rate(t, lambda, v, k_str, pi) + reconstruction_rate(t, lambda, v, k_str)
}

/// Consumption path after the shock: `c0` minus the consumption loss.
#[inline]
pub fn consumption(t: f64, lambda: f64, v: f64, k_str: f64, pi: f64, c0: f64) -> f64 {
    c0 - consumption_rate(t, lambda, v, k_str, pi)
}

/// `U(c0) − U(c(t))`. NaN once consumption reaches zero.
#[inline]
pub fn utility_rate(t: f64, lambda: f64, v: f64, k_str: f64, pi: f64, c0: f64, eta: f64) -> f64 {
    crra(c0, eta) - crra(consumption(t, lambda, v, k_str, pi, c0), eta)
}

/// Economic parameters shared by all four rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateParams {
    /// Loss ratio (damage / asset value).
    pub v: f64,
    /// Asset value.
    pub k_str: f64,
    /// Productivity of capital.
    pub pi: f64,
    /// Pre-disaster consumption.
    pub c0: f64,
    /// Elasticity of marginal utility.
    pub eta: f64,
}

impl RateParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.v) {
            return Err(WellbeingError::invalid("v", self.v, "loss ratio must lie in [0, 1]"));
        }
        if !(self.k_str > 0.0) || !self.k_str.is_finite() {
            return Err(WellbeingError::invalid("k_str", self.k_str, "asset value must be positive"));
        }
        if !(self.c0 > 0.0) || !self.c0.is_finite() {
            return Err(WellbeingError::invalid("c0", self.c0, "consumption must be positive"));
        }
        if !(self.pi >= 0.0) || !self.pi.is_finite() {
            return Err(WellbeingError::invalid("pi", self.pi, "productivity must be non-negative"));
        }
        utility::check_eta(self.eta)
    }

    pub fn damage(&self) -> f64 {
        self.v * self.k_str
    }
}

/// One loss kind bound to a household's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossRate {
    pub kind: LossKind,
    pub params: RateParams,
}

impl LossRate {
    pub fn new(kind: LossKind, params: RateParams) -> Self {
        Self { kind, params }
    }

    /// Rate at time `t` for recovery rate `lambda`.
    #[inline]
    pub fn at(&self, t: f64, lambda: f64) -> f64 {
        let RateParams { v, k_str, pi, c0, eta } = self.params;
        match self.kind {
            LossKind::Reconstruction => reconstruction_rate(t, lambda, v, k_str),
            LossKind::Income => income_rate(t, lambda, v, k_str, pi),
            LossKind::Consumption => consumption_rate(t, lambda, v, k_str, pi),
            LossKind::Utility => utility_rate(t, lambda, v, k_str, pi, c0, eta),
        }
    }

    /// Curve over `times` for a single `lambda`.
    pub fn curve(&self, times: &[f64], lambda: f64) -> Vec<f64> {
        times.iter().map(|&t| self.at(t, lambda)).collect()
    }

    /// Outer-product table: `out[i][j] = rate(times[i], lambdas[j])`.
    pub fn surface(&self, times: &[f64], lambdas: &[f64]) -> Vec<Vec<f64>> {
        times
            .iter()
            .map(|&t| lambdas.iter().map(|&l| self.at(t, l)).collect())
            .collect()
    }
}
