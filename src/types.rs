use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::WellbeingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HouseholdId(pub u64);

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four loss curves a household accumulates while it rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LossKind {
    /// Rebuild expenditure: `λ·v·k·e^(-λt)`.
    Reconstruction,
    /// Foregone income on damaged capital: `π·v·k·e^(-λt)`.
    Income,
    /// Income loss plus reconstruction expenditure.
    Consumption,
    /// Utility gap `U(c0) − U(c0 − consumption loss)`.
    Utility,
}

impl LossKind {
    pub const ALL: [LossKind; 4] = [
        LossKind::Reconstruction,
        LossKind::Income,
        LossKind::Consumption,
        LossKind::Utility,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LossKind::Reconstruction => "Reconstruction Costs",
            LossKind::Income => "Income Loss",
            LossKind::Consumption => "Consumption Loss",
            LossKind::Utility => "Utility Loss",
        }
    }

    /// Monetary kinds are expressed in currency units; utility is unitless.
    pub fn is_monetary(self) -> bool {
        !matches!(self, LossKind::Utility)
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LossKind {
    type Err = WellbeingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reconstruction" | "reconstruction costs" => Ok(LossKind::Reconstruction),
            "income" | "income loss" => Ok(LossKind::Income),
            "consumption" | "consumption loss" => Ok(LossKind::Consumption),
            "utility" | "utility loss" => Ok(LossKind::Utility),
            _ => Err(WellbeingError::UnknownLossKind { name: s.to_string() }),
        }
    }
}

/// Numerical scheme used to turn a loss rate into a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    /// Trapezoidal rule over the household's fixed time grid.
    #[default]
    Trapezoid,
    /// Adaptive Gauss–Kronrod quadrature over `[0, t_max]`.
    Quad,
}

impl IntegrationMethod {
    pub fn name(self) -> &'static str {
        match self {
            IntegrationMethod::Trapezoid => "trapezoid",
            IntegrationMethod::Quad => "quad",
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IntegrationMethod {
    type Err = WellbeingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trapezoid" => Ok(IntegrationMethod::Trapezoid),
            "quad" => Ok(IntegrationMethod::Quad),
            other => Err(WellbeingError::UnknownMethod { name: other.to_string() }),
        }
    }
}

/// Key of a loss record entry: one of the four integrated kinds or a derived metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LossLabel {
    Kind(LossKind),
    WellbeingLoss,
    AssetLoss,
    EquityWeightedLoss,
}

impl LossLabel {
    pub fn label(self) -> &'static str {
        match self {
            LossLabel::Kind(kind) => kind.label(),
            LossLabel::WellbeingLoss => "Wellbeing Loss",
            LossLabel::AssetLoss => "Asset Loss",
            LossLabel::EquityWeightedLoss => "Equity Weighted Loss",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Wellbeing Loss" => Some(LossLabel::WellbeingLoss),
            "Asset Loss" => Some(LossLabel::AssetLoss),
            "Equity Weighted Loss" => Some(LossLabel::EquityWeightedLoss),
            other => LossKind::ALL
                .into_iter()
                .find(|k| k.label() == other)
                .map(LossLabel::Kind),
        }
    }
}

impl From<LossKind> for LossLabel {
    fn from(kind: LossKind) -> Self {
        LossLabel::Kind(kind)
    }
}

impl fmt::Display for LossLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
