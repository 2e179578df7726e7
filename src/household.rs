use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Outcome};
use crate::errors::{Result, WellbeingError};
use crate::grid::{TimeDomain, TimeGrid};
use crate::integration;
use crate::loss_rates::{LossRate, RateParams};
use crate::optimizer::{self, RateOptimum};
use crate::types::{IntegrationMethod, LossKind, LossLabel};
use crate::utility::{self, DEFAULT_REBUILT_PERCENT};

fn default_pi() -> f64 {
    0.15
}
fn default_eta() -> f64 {
    1.5
}
fn default_rho() -> f64 {
    0.06
}
fn default_t_max() -> f64 {
    10.0
}
fn default_dt() -> f64 {
    1.0 / 52.0
}
fn default_currency() -> String {
    "$".to_string()
}

/// Static economic description of one household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdParams {
    /// Loss ratio: damage / asset value, in `[0, 1]`.
    pub v: f64,
    /// Asset (building structure) value.
    pub k_str: f64,
    /// Pre-disaster consumption per year.
    pub c0: f64,
    /// Reference (average) consumption per year.
    pub c_avg: f64,
    /// Recovery rate, if already known.
    #[serde(default)]
    pub l: Option<f64>,
    #[serde(default = "default_pi")]
    pub pi: f64,
    #[serde(default = "default_eta")]
    pub eta: f64,
    #[serde(default = "default_rho")]
    pub rho: f64,
    /// Simulation horizon in years.
    #[serde(default = "default_t_max")]
    pub t_max: f64,
    /// Nominal time step in years (weekly by default).
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl HouseholdParams {
    pub fn new(v: f64, k_str: f64, c0: f64, c_avg: f64) -> Self {
        Self {
            v,
            k_str,
            c0,
            c_avg,
            l: None,
            pi: default_pi(),
            eta: default_eta(),
            rho: default_rho(),
            t_max: default_t_max(),
            dt: default_dt(),
            currency: default_currency(),
        }
    }

    pub fn with_lambda(mut self, l: f64) -> Self {
        self.l = Some(l);
        self
    }

    pub fn with_pi(mut self, pi: f64) -> Self {
        self.pi = pi;
        self
    }

    pub fn with_eta(mut self, eta: f64) -> Self {
        self.eta = eta;
        self
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn with_horizon(mut self, t_max: f64, dt: f64) -> Self {
        self.t_max = t_max;
        self.dt = dt;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn rate_params(&self) -> RateParams {
        RateParams { v: self.v, k_str: self.k_str, pi: self.pi, c0: self.c0, eta: self.eta }
    }
}

/// Labelled totals: the four integrated kinds plus the derived welfare metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossRecord {
    entries: BTreeMap<LossLabel, f64>,
}

impl LossRecord {
    pub fn get(&self, label: impl Into<LossLabel>) -> Option<f64> {
        self.entries.get(&label.into()).copied()
    }

    pub fn insert(&mut self, label: impl Into<LossLabel>, value: f64) {
        self.entries.insert(label.into(), value);
    }

    pub fn wellbeing_loss(&self) -> Option<f64> {
        self.get(LossLabel::WellbeingLoss)
    }

    pub fn asset_loss(&self) -> Option<f64> {
        self.get(LossLabel::AssetLoss)
    }

    pub fn equity_weighted_loss(&self) -> Option<f64> {
        self.get(LossLabel::EquityWeightedLoss)
    }

    /// All four kinds and all three derived metrics are present.
    pub fn is_complete(&self) -> bool {
        self.entries.len() == LossKind::ALL.len() + 3
    }

    pub fn iter(&self) -> impl Iterator<Item = (LossLabel, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Serialize for LossRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label.label(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LossRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // NaN totals are written as null.
        let raw: BTreeMap<String, Option<f64>> = BTreeMap::deserialize(deserializer)?;
        let mut record = LossRecord::default();
        for (key, value) in raw {
            let label = LossLabel::from_label(&key)
                .ok_or_else(|| <D::Error as de::Error>::custom(format!("unknown loss label '{key}'")))?;
            record.insert(label, value.unwrap_or(f64::NAN));
        }
        Ok(record)
    }
}

/// Instantaneous rate curves over the household's time grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossTimeSeries {
    pub time: Vec<f64>,
    pub curves: BTreeMap<LossKind, Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepOptions {
    pub rec_time_min: f64,
    /// Defaults to the household horizon.
    pub rec_time_max: Option<f64>,
    pub no_steps: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self { rec_time_min: 0.3, rec_time_max: None, no_steps: 1000 }
    }
}

/// JSON has no NaN; serde_json writes it as null.
pub(crate) fn nullable_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// One candidate recovery rate in the diagnostic sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub lambda: f64,
    pub recovery_time: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub reconstruction_total: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub income_total: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub consumption_total: f64,
    #[serde(deserialize_with = "nullable_f64")]
    pub utility_total: f64,
}

/// Totals evaluated over a dense grid of recovery rates. Presentation data
/// only: the optimal rate comes from [`Household::find_optimal_rate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepTable {
    pub rows: Vec<SweepRow>,
}

impl SweepTable {
    pub fn lambdas(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r.lambda)
    }

    pub fn lambda_range(&self) -> Option<(f64, f64)> {
        self.lambdas().fold(None, |acc, l| match acc {
            None => Some((l, l)),
            Some((lo, hi)) => Some((lo.min(l), hi.max(l))),
        })
    }

    /// Row with the lowest defined utility total. Never fed back into λ*.
    pub fn grid_minimum(&self) -> Option<&SweepRow> {
        self.rows
            .iter()
            .filter(|r| !r.utility_total.is_nan())
            .min_by(|a, b| a.utility_total.total_cmp(&b.utility_total))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    /// No recovery rate yet.
    Uninitialized,
    /// Recovery rate known, losses not (or no longer) computed.
    RateSet,
    /// All four kinds and the derived metrics are populated.
    LossesComputed,
}

/// A household's recovery problem: parameters, time grid, and computed results.
#[derive(Debug, Clone)]
pub struct Household {
    params: HouseholdParams,
    grid: TimeGrid,
    domain: TimeDomain,
    lambda: Option<f64>,
    losses: LossRecord,
    time_series: LossTimeSeries,
    sweep: Option<SweepTable>,
    notices: Notices,
}

/// Notices grouped by the computation that raised them, so recomputing a
/// result replaces its notices instead of appending to them.
#[derive(Debug, Clone, Default)]
struct Notices {
    setup: Vec<Diagnostic>,
    losses: BTreeMap<LossLabel, Vec<Diagnostic>>,
    sweep: Vec<Diagnostic>,
    optimizer: Vec<Diagnostic>,
}

impl Notices {
    fn all(&self) -> impl Iterator<Item = &Diagnostic> {
        self.setup
            .iter()
            .chain(&self.sweep)
            .chain(&self.optimizer)
            .chain(self.losses.values().flatten())
    }
}

impl Household {
    pub fn new(params: HouseholdParams) -> Result<Self> {
        params.rate_params().validate()?;
        if !(params.c_avg > 0.0) || !params.c_avg.is_finite() {
            return Err(WellbeingError::invalid("c_avg", params.c_avg, "reference consumption must be positive"));
        }
        if !(params.rho >= 0.0) || !params.rho.is_finite() {
            return Err(WellbeingError::invalid("rho", params.rho, "discount rate must be non-negative"));
        }
        let grid = TimeGrid::new(params.t_max, params.dt)?;

        let mut household = Self {
            domain: TimeDomain::Grid(grid.clone()),
            time_series: LossTimeSeries { time: grid.points().to_vec(), curves: BTreeMap::new() },
            grid,
            lambda: None,
            losses: LossRecord::default(),
            sweep: None,
            notices: Notices::default(),
            params,
        };
        if let Some(l) = household.params.l {
            household.set_lambda(l)?;
        }
        for d in utility::eta_notices(household.params.eta) {
            d.emit();
            household.notices.setup.push(d);
        }
        Ok(household)
    }

    pub fn params(&self) -> &HouseholdParams {
        &self.params
    }

    pub fn rate_params(&self) -> RateParams {
        self.params.rate_params()
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Effective time step after the grid was fitted to `t_max`.
    pub fn dt(&self) -> f64 {
        self.grid.dt()
    }

    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }

    /// Years until 95 % of the damage is rebuilt at the current rate.
    pub fn recovery_time(&self) -> Option<f64> {
        self.lambda
            .and_then(|l| utility::recovery_time(l, DEFAULT_REBUILT_PERCENT).ok())
    }

    /// Assign the recovery rate. Any previously computed losses, and their
    /// notices, are discarded.
    pub fn set_lambda(&mut self, l: f64) -> Result<()> {
        if !(l > 0.0) || !l.is_finite() {
            return Err(WellbeingError::NonPositiveRate { value: l });
        }
        self.lambda = Some(l);
        self.params.l = Some(l);
        self.losses.clear();
        self.notices.losses.clear();
        self.time_series.curves.clear();
        Ok(())
    }

    pub fn state(&self) -> Lifecycle {
        match self.lambda {
            None => Lifecycle::Uninitialized,
            Some(_) if self.losses.is_complete() => Lifecycle::LossesComputed,
            Some(_) => Lifecycle::RateSet,
        }
    }

    fn require_lambda(&self) -> Result<f64> {
        self.lambda.ok_or(WellbeingError::RateNotSet)
    }

    /// Integrate one loss kind at the current rate, store its curve and
    /// undiscounted total, and return the total.
    pub fn calc_loss(&mut self, kind: LossKind, method: IntegrationMethod) -> Result<f64> {
        let l = self.require_lambda()?;
        let rate = LossRate::new(kind, self.rate_params());

        let curve = rate.curve(self.grid.points(), l);
        let Outcome { value: total, diagnostics } = integration::total(&rate, &self.domain, l, 0.0, method)?;
        self.notices.losses.insert(kind.into(), diagnostics);

        self.time_series.curves.insert(kind, curve);
        self.losses.insert(kind, total);
        Ok(total)
    }

    /// Compute all four kinds plus well-being, asset and equity-weighted loss.
    pub fn get_losses(&mut self, method: IntegrationMethod) -> Result<&LossRecord> {
        let l = self.require_lambda()?;
        for kind in LossKind::ALL {
            self.calc_loss(kind, method)?;
        }

        let HouseholdParams { v, k_str, c0, c_avg, eta, rho, .. } = self.params;
        let utility_rate = LossRate::new(LossKind::Utility, self.rate_params());
        let Outcome { value: discounted, diagnostics } =
            integration::total(&utility_rate, &self.domain, l, rho, method)?;
        self.notices.losses.insert(LossLabel::WellbeingLoss, diagnostics);

        let asset_loss = v * k_str;
        self.losses
            .insert(LossLabel::WellbeingLoss, utility::wellbeing_loss(discounted, c_avg, eta));
        self.losses.insert(LossLabel::AssetLoss, asset_loss);
        self.losses
            .insert(LossLabel::EquityWeightedLoss, utility::equity_weight(c0, c_avg, eta) * asset_loss);

        tracing::debug!(
            lambda = l,
            wellbeing_loss = self.losses.wellbeing_loss(),
            asset_loss,
            "household losses computed"
        );
        Ok(&self.losses)
    }

    /// Evaluate every loss total over `no_steps` recovery times between
    /// `rec_time_min` and `rec_time_max`, converted to recovery rates.
    pub fn sweep_diagnostics(&mut self, options: SweepOptions, method: IntegrationMethod) -> Result<&SweepTable> {
        if options.no_steps < 2 {
            return Err(WellbeingError::TooFewSweepSteps { steps: options.no_steps });
        }
        let lo = options.rec_time_min;
        let hi = options.rec_time_max.unwrap_or(self.grid.t_end());
        if !(lo > 0.0) || !hi.is_finite() || hi <= lo {
            return Err(WellbeingError::InvalidBounds { lower: lo, upper: hi });
        }

        let step = (hi - lo) / (options.no_steps - 1) as f64;
        let times: Vec<f64> = (0..options.no_steps).map(|i| lo + i as f64 * step).collect();
        let lambdas = utility::recovery_rates(&times, DEFAULT_REBUILT_PERCENT)?;
        let recovery_times = utility::recovery_times(&lambdas, DEFAULT_REBUILT_PERCENT)?;

        let params = self.rate_params();
        let mut notices = Vec::new();
        let mut totals: BTreeMap<LossKind, Vec<f64>> = BTreeMap::new();
        for kind in LossKind::ALL {
            let rate = LossRate::new(kind, params);
            let out = integration::total_batch(&rate, &self.domain, &lambdas, 0.0, method)?;
            totals.insert(kind, out.drain_into(&mut notices));
        }
        self.notices.sweep = notices;

        let column = |kind: LossKind, i: usize| totals.get(&kind).map_or(f64::NAN, |v| v[i]);
        let rows = lambdas
            .iter()
            .zip(&recovery_times)
            .enumerate()
            .map(|(i, (&lambda, &recovery_time))| SweepRow {
                lambda,
                recovery_time,
                reconstruction_total: column(LossKind::Reconstruction, i),
                income_total: column(LossKind::Income, i),
                consumption_total: column(LossKind::Consumption, i),
                utility_total: column(LossKind::Utility, i),
            })
            .collect();

        Ok(&*self.sweep.insert(SweepTable { rows }))
    }

    /// Run the bounded optimizer for λ* and adopt it as the household's rate.
    pub fn find_optimal_rate(
        &mut self,
        lambda_min: f64,
        lambda_max: f64,
        method: IntegrationMethod,
    ) -> Result<RateOptimum> {
        let Outcome { value: optimum, diagnostics } =
            optimizer::optimal_lambda(&self.rate_params(), lambda_min, lambda_max, &self.domain, method)?;
        // The log-utility notice was already recorded at construction.
        self.notices.optimizer =
            diagnostics.into_iter().filter(|d| !matches!(d, Diagnostic::LogUtility { .. })).collect();
        self.set_lambda(optimum.lambda)?;
        Ok(optimum)
    }

    /// Diagnostic sweep followed by the optimizer over the sweep's λ range.
    /// The two results are independent; the sweep's own minimum is not used.
    pub fn opt_lambda(&mut self, options: SweepOptions, method: IntegrationMethod) -> Result<f64> {
        Ok(self.sweep_and_optimise(options, method)?.lambda)
    }

    /// [`Household::opt_lambda`], returning the optimizer's full result.
    pub fn sweep_and_optimise(&mut self, options: SweepOptions, method: IntegrationMethod) -> Result<RateOptimum> {
        let (lo, hi) = self
            .sweep_diagnostics(options, method)?
            .lambda_range()
            .ok_or(WellbeingError::SweepNotRun)?;
        self.find_optimal_rate(lo, hi, method)
    }

    pub fn losses(&self) -> &LossRecord {
        &self.losses
    }

    pub fn total(&self, kind: LossKind) -> Result<f64> {
        self.losses.get(kind).ok_or(WellbeingError::LossNotComputed { kind })
    }

    /// Well-being loss from the last [`Household::get_losses`] call.
    pub fn wellbeing_loss(&self) -> Result<f64> {
        self.losses.wellbeing_loss().ok_or(WellbeingError::LossesNotComputed)
    }

    pub fn curve(&self, kind: LossKind) -> Result<&[f64]> {
        self.time_series
            .curves
            .get(&kind)
            .map(Vec::as_slice)
            .ok_or(WellbeingError::LossNotComputed { kind })
    }

    pub fn time_series(&self) -> &LossTimeSeries {
        &self.time_series
    }

    pub fn sweep(&self) -> Result<&SweepTable> {
        self.sweep.as_ref().ok_or(WellbeingError::SweepNotRun)
    }

    /// Notices from construction and from the latest sweep, optimisation
    /// and loss computations.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.notices.all().cloned().collect()
    }
}

impl fmt::Display for Household {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        let l = self.lambda.map_or_else(|| "None".to_string(), |l| format!("{l}"));
        writeln!(f, "Household(")?;
        writeln!(f, "  v = {} (loss ratio),", p.v)?;
        writeln!(f, "  k_str = {} (total building value),", p.k_str)?;
        writeln!(f, "  c0 = {} (initial consumption level),", p.c0)?;
        writeln!(f, "  c_avg = {} (average consumption level),", p.c_avg)?;
        writeln!(f, "  l = {l} (recovery rate),")?;
        writeln!(f, "  pi = {} (average productivity of capital),", p.pi)?;
        writeln!(f, "  eta = {} (elasticity of marginal utility of consumption),", p.eta)?;
        writeln!(f, "  rho = {} (discount rate),", p.rho)?;
        writeln!(f, "  t_max = {} (maximum simulation time),", p.t_max)?;
        writeln!(f, "  dt = {} (time step),", self.dt())?;
        writeln!(f, "  currency = {} (currency symbol)", p.currency)?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wealthy() -> HouseholdParams {
        HouseholdParams::new(0.4, 100_000.0, 500_000.0, 450_000.0)
    }

    #[test]
    fn defaults_match_documented_values() {
        let p = HouseholdParams::new(0.1, 1.0, 1.0, 1.0);
        assert_eq!(p.pi, 0.15);
        assert_eq!(p.eta, 1.5);
        assert_eq!(p.rho, 0.06);
        assert_eq!(p.t_max, 10.0);
        assert_eq!(p.dt, 1.0 / 52.0);
        assert_eq!(p.currency, "$");
        assert_eq!(p.l, None);
    }

    #[test]
    fn deserializes_with_defaults() {
        let p: HouseholdParams =
            serde_json::from_str(r#"{"v":0.2,"k_str":5000,"c0":20000,"c_avg":18000}"#).unwrap();
        assert_eq!(p, HouseholdParams::new(0.2, 5000.0, 20000.0, 18000.0));
    }

    #[test]
    fn construction_validates_parameters() {
        assert!(Household::new(HouseholdParams::new(1.5, 1.0, 1.0, 1.0)).is_err());
        assert!(Household::new(HouseholdParams::new(0.5, 1.0, 1.0, 0.0)).is_err());
        assert_eq!(
            Household::new(HouseholdParams::new(0.5, 1.0, 1.0, 1.0).with_eta(-1.0)).unwrap_err(),
            WellbeingError::InvalidEta { eta: -1.0 }
        );
        assert!(Household::new(HouseholdParams::new(0.5, 1.0, 1.0, 1.0).with_lambda(0.0)).is_err());
        assert!(Household::new(HouseholdParams::new(0.5, 1.0, 1.0, 1.0).with_horizon(1.0, 5.0)).is_err());
        assert!(matches!(
            Household::new(HouseholdParams::new(0.1, 1000.0, 5000.0, 5000.0).with_horizon(10.0, 1e-13)),
            Err(WellbeingError::InvalidParameter { name: "dt", .. })
        ));
    }

    #[test]
    fn grid_is_fitted_to_horizon() {
        let h = Household::new(wealthy()).unwrap();
        assert_eq!(h.grid().len(), 521);
        assert_eq!(h.grid().t_end(), 10.0);
        assert_eq!(h.time_series().time.len(), 521);
    }

    #[test]
    fn losses_require_a_rate() {
        let mut h = Household::new(wealthy()).unwrap();
        assert_eq!(h.state(), Lifecycle::Uninitialized);
        assert_eq!(
            h.calc_loss(LossKind::Income, IntegrationMethod::Trapezoid).unwrap_err(),
            WellbeingError::RateNotSet
        );
        assert!(h.get_losses(IntegrationMethod::Trapezoid).unwrap_err().is_not_ready());
    }

    #[test]
    fn accessors_fail_before_computation() {
        let h = Household::new(wealthy().with_lambda(1.0)).unwrap();
        assert_eq!(
            h.total(LossKind::Utility).unwrap_err(),
            WellbeingError::LossNotComputed { kind: LossKind::Utility }
        );
        assert!(h.curve(LossKind::Income).is_err());
        assert_eq!(h.sweep().unwrap_err(), WellbeingError::SweepNotRun);
        assert_eq!(h.wellbeing_loss().unwrap_err(), WellbeingError::LossesNotComputed);
    }

    #[test]
    fn calc_loss_stores_curve_and_total() {
        let mut h = Household::new(wealthy().with_lambda(2.0)).unwrap();
        let total = h.calc_loss(LossKind::Reconstruction, IntegrationMethod::Trapezoid).unwrap();
        assert!((total - 40_000.0).abs() / 40_000.0 < 1e-3);
        assert_eq!(h.total(LossKind::Reconstruction).unwrap(), total);
        let curve = h.curve(LossKind::Reconstruction).unwrap();
        assert_eq!(curve.len(), h.grid().len());
        assert!((curve[0] - 2.0 * 40_000.0).abs() < 1e-9);
        assert_eq!(h.state(), Lifecycle::RateSet);
    }

    #[test]
    fn get_losses_populates_full_record() {
        let mut h = Household::new(wealthy().with_lambda(1.5)).unwrap();
        let record = h.get_losses(IntegrationMethod::Quad).unwrap().clone();
        assert!(record.is_complete());
        for kind in LossKind::ALL {
            assert!(record.get(kind).unwrap().is_finite());
        }
        assert_eq!(record.asset_loss(), Some(40_000.0));
        assert!(record.wellbeing_loss().unwrap() > 0.0);
        // c0 above c_avg: equity weight below one.
        assert!(record.equity_weighted_loss().unwrap() < 40_000.0);
        assert_eq!(h.state(), Lifecycle::LossesComputed);
    }

    #[test]
    fn consumption_total_is_sum_of_parts() {
        let mut h = Household::new(wealthy().with_lambda(0.8)).unwrap();
        let rec = h.calc_loss(LossKind::Reconstruction, IntegrationMethod::Quad).unwrap();
        let inc = h.calc_loss(LossKind::Income, IntegrationMethod::Quad).unwrap();
        let con = h.calc_loss(LossKind::Consumption, IntegrationMethod::Quad).unwrap();
        assert!((con - (rec + inc)).abs() < 1e-6 * con);
    }

    #[test]
    fn new_rate_discards_stale_losses() {
        let mut h = Household::new(wealthy().with_lambda(1.0)).unwrap();
        h.get_losses(IntegrationMethod::Trapezoid).unwrap();
        h.set_lambda(2.0).unwrap();
        assert_eq!(h.state(), Lifecycle::RateSet);
        assert!(h.losses().is_empty());
        assert!(h.curve(LossKind::Utility).is_err());
    }

    #[test]
    fn sweep_covers_requested_recovery_times() {
        let mut h = Household::new(wealthy()).unwrap();
        let opts = SweepOptions { rec_time_min: 0.5, rec_time_max: Some(5.0), no_steps: 10 };
        let table = h.sweep_diagnostics(opts, IntegrationMethod::Trapezoid).unwrap();
        assert_eq!(table.rows.len(), 10);
        assert!((table.rows[0].recovery_time - 0.5).abs() < 1e-12);
        assert!((table.rows[9].recovery_time - 5.0).abs() < 1e-12);
        // Shorter recovery time means a faster rate.
        assert!(table.rows[0].lambda > table.rows[9].lambda);
        for row in &table.rows {
            assert!((row.consumption_total - row.reconstruction_total - row.income_total).abs() < 1e-6);
        }
        // Sweeping alone does not pick a rate.
        assert_eq!(h.lambda(), None);
    }

    #[test]
    fn sweep_rejects_bad_options() {
        let mut h = Household::new(wealthy()).unwrap();
        let few = SweepOptions { no_steps: 1, ..SweepOptions::default() };
        assert_eq!(
            h.sweep_diagnostics(few, IntegrationMethod::Trapezoid).unwrap_err(),
            WellbeingError::TooFewSweepSteps { steps: 1 }
        );
        let inverted = SweepOptions { rec_time_min: 4.0, rec_time_max: Some(2.0), no_steps: 5 };
        assert!(h.sweep_diagnostics(inverted, IntegrationMethod::Trapezoid).is_err());
    }

    #[test]
    fn opt_lambda_sets_rate_within_sweep_range() {
        let mut h = Household::new(wealthy()).unwrap();
        let opts = SweepOptions { no_steps: 100, ..SweepOptions::default() };
        let l = h.opt_lambda(opts, IntegrationMethod::Trapezoid).unwrap();
        let (lo, hi) = h.sweep().unwrap().lambda_range().unwrap();
        assert!(l >= lo && l <= hi);
        assert_eq!(h.lambda(), Some(l));
        assert!(h.recovery_time().unwrap() > 0.0);
        assert_eq!(h.state(), Lifecycle::RateSet);
    }

    #[test]
    fn optimum_depends_only_on_sweep_range() {
        let opts = SweepOptions { no_steps: 20, ..SweepOptions::default() };
        let mut swept = Household::new(wealthy()).unwrap();
        let l = swept.opt_lambda(opts, IntegrationMethod::Trapezoid).unwrap();
        let (lo, hi) = swept.sweep().unwrap().lambda_range().unwrap();

        let mut direct = Household::new(wealthy()).unwrap();
        let optimum = direct.find_optimal_rate(lo, hi, IntegrationMethod::Trapezoid).unwrap();
        assert_eq!(optimum.lambda, l);
        assert!(direct.sweep().is_err());
    }

    #[test]
    fn sweep_and_optimise_returns_full_optimum() {
        let opts = SweepOptions { no_steps: 20, ..SweepOptions::default() };
        let mut h = Household::new(wealthy()).unwrap();
        let optimum = h.sweep_and_optimise(opts, IntegrationMethod::Trapezoid).unwrap();
        let (lo, hi) = h.sweep().unwrap().lambda_range().unwrap();
        assert!(optimum.lambda >= lo && optimum.lambda <= hi);
        assert_eq!(h.lambda(), Some(optimum.lambda));
        assert!(optimum.convergence.objective_evaluations > 0);

        let mut via_rate = Household::new(wealthy()).unwrap();
        assert_eq!(via_rate.opt_lambda(opts, IntegrationMethod::Trapezoid).unwrap(), optimum.lambda);
    }

    #[test]
    fn recomputing_replaces_notices() {
        // Damage far beyond consumption: utility is undefined at every rate.
        let mut h = Household::new(HouseholdParams::new(0.4, 100_000.0, 2_000.0, 1_800.0)).unwrap();
        let opts = SweepOptions { no_steps: 50, ..SweepOptions::default() };
        h.opt_lambda(opts, IntegrationMethod::Trapezoid).unwrap();
        let sweep_notices: Vec<Diagnostic> = h
            .diagnostics()
            .into_iter()
            .filter(|d| matches!(d, Diagnostic::UndefinedTotal { .. }))
            .collect();
        assert_eq!(sweep_notices.len(), 1);
        assert!(matches!(
            sweep_notices[0],
            Diagnostic::UndefinedTotal { kind: LossKind::Utility, count: 50, .. }
        ));

        h.get_losses(IntegrationMethod::Trapezoid).unwrap();
        let after_first = h.diagnostics().len();
        h.get_losses(IntegrationMethod::Trapezoid).unwrap();
        h.calc_loss(LossKind::Utility, IntegrationMethod::Trapezoid).unwrap();
        assert_eq!(h.diagnostics().len(), after_first);

        h.sweep_diagnostics(opts, IntegrationMethod::Trapezoid).unwrap();
        assert_eq!(h.diagnostics().len(), after_first);

        // A new rate drops the loss notices but keeps the sweep's.
        h.set_lambda(1.0).unwrap();
        assert_eq!(h.diagnostics().len(), 1);
    }

    #[test]
    fn log_utility_household_records_notice() {
        let h = Household::new(wealthy().with_eta(1.0)).unwrap();
        assert!(h.diagnostics().iter().any(|d| matches!(d, Diagnostic::LogUtility { .. })));
    }

    #[test]
    fn loss_record_serializes_by_label() {
        let mut record = LossRecord::default();
        record.insert(LossKind::Income, 12.5);
        record.insert(LossLabel::AssetLoss, 100.0);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Income Loss":12.5,"Asset Loss":100.0}"#);
        let back: LossRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn display_lists_parameters() {
        let h = Household::new(wealthy().with_lambda(0.5)).unwrap();
        let text = h.to_string();
        assert!(text.starts_with("Household("));
        assert!(text.contains("l = 0.5 (recovery rate)"));
        assert!(text.contains("currency = $"));
    }
}
