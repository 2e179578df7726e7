//! Parallel assessment of many households.
//!
//! Each household is independent: its rate is optimised (unless preset), its
//! losses computed, and the outcome written to a [`HouseholdReport`]. A
//! household that fails validation gets a report carrying the error; the rest
//! of the batch is unaffected.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::diagnostics::Diagnostic;
use crate::errors::Result;
use crate::household::{Household, HouseholdParams, LossRecord, SweepTable};
use crate::types::HouseholdId;

/// One input line: household parameters plus an optional identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<HouseholdId>,
    #[serde(flatten)]
    pub params: HouseholdParams,
}

impl HouseholdRecord {
    pub fn new(id: HouseholdId, params: HouseholdParams) -> Self {
        Self { id: Some(id), params }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdReport {
    pub id: HouseholdId,
    pub params: HouseholdParams,
    #[serde(default)]
    pub lambda: Option<f64>,
    #[serde(default)]
    pub recovery_time: Option<f64>,
    /// λ came from the optimizer rather than the input record.
    pub optimised: bool,
    #[serde(default)]
    pub optimizer_converged: Option<bool>,
    #[serde(default)]
    pub losses: LossRecord,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HouseholdReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Damage as a share of yearly consumption.
    pub fn damage_to_income(&self) -> f64 {
        self.params.v * self.params.k_str / self.params.c0
    }

    fn failed(id: HouseholdId, params: HouseholdParams, error: String) -> Self {
        Self {
            id,
            params,
            lambda: None,
            recovery_time: None,
            optimised: false,
            optimizer_converged: None,
            losses: LossRecord::default(),
            diagnostics: Vec::new(),
            sweep: None,
            error: Some(error),
        }
    }
}

/// Optimise (if needed) and compute losses for one household.
pub fn assess(record: HouseholdRecord, fallback_id: HouseholdId, config: &BatchConfig) -> HouseholdReport {
    let id = record.id.unwrap_or(fallback_id);
    let params = record.params;
    match run(params.clone(), config) {
        Ok((household, optimizer_converged)) => HouseholdReport {
            id,
            lambda: household.lambda(),
            recovery_time: household.recovery_time(),
            optimised: params.l.is_none(),
            optimizer_converged,
            losses: household.losses().clone(),
            diagnostics: household.diagnostics(),
            sweep: if config.keep_sweep { household.sweep().ok().cloned() } else { None },
            error: None,
            params,
        },
        Err(e) => {
            tracing::warn!(household = %id, error = %e, "household assessment failed");
            HouseholdReport::failed(id, params, e.to_string())
        }
    }
}

fn run(params: HouseholdParams, config: &BatchConfig) -> Result<(Household, Option<bool>)> {
    let preset = params.l.is_some();
    let mut household = Household::new(params)?;
    let converged = if preset {
        None
    } else {
        Some(household.sweep_and_optimise(config.sweep, config.method)?.convergence.converged)
    };
    household.get_losses(config.method)?;
    Ok((household, converged))
}

/// Assess every record in parallel. Output order matches input order;
/// records without an id are numbered from 1 by position.
pub fn assess_all(records: Vec<HouseholdRecord>, config: &BatchConfig) -> Vec<HouseholdReport> {
    let total = records.len();
    tracing::info!(households = total, method = %config.method, "batch assessment started");

    let reports: Vec<HouseholdReport> = records
        .into_par_iter()
        .enumerate()
        .map(|(i, record)| assess(record, HouseholdId(i as u64 + 1), config))
        .collect();

    let failed = reports.iter().filter(|r| !r.is_ok()).count();
    tracing::info!(households = total, failed, "batch assessment finished");
    reports
}
