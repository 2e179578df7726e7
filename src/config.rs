use serde::{Deserialize, Serialize};

use crate::household::SweepOptions;
use crate::types::IntegrationMethod;

/// Parameters of the seeded synthetic household population.
///
/// Monthly incomes and absolute damages are log-normal (ln-space params);
/// relative damage is uniform on `[0, max_relative_damage)` and the asset
/// value follows as `damage / relative_damage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub households: usize,
    /// Median monthly income ≈ 3 000.
    pub income_mu: f64,
    pub income_sigma: f64,
    /// Median damage ≈ 12 000.
    pub damage_mu: f64,
    pub damage_sigma: f64,
    pub max_relative_damage: f64,
    /// Share of households that escape without damage.
    pub undamaged_share: f64,
    /// Asset value of an undamaged household, as a multiple of yearly income.
    pub undamaged_asset_multiple: f64,
}

impl SyntheticConfig {
    pub fn canonical() -> Self {
        Self {
            households: 200,
            income_mu: 8.0,
            income_sigma: 0.5,
            damage_mu: 9.4,
            damage_sigma: 0.8,
            max_relative_damage: 0.7,
            undamaged_share: 0.1,
            undamaged_asset_multiple: 3.0,
        }
    }
}

/// Driver configuration for a batch assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub seed: u64,
    pub method: IntegrationMethod,
    /// Sweep used to bracket λ* for households without a preset rate.
    pub sweep: SweepOptions,
    /// Keep the sweep table in each report.
    pub keep_sweep: bool,
    pub synthetic: SyntheticConfig,
}

impl BatchConfig {
    pub fn canonical() -> Self {
        Self {
            seed: 42,
            method: IntegrationMethod::Trapezoid,
            // 200 candidate recovery times keeps a 200-household run interactive.
            sweep: SweepOptions { no_steps: 200, ..SweepOptions::default() },
            keep_sweep: false,
            synthetic: SyntheticConfig::canonical(),
        }
    }
}
