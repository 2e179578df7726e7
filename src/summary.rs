//! Cross-household distribution statistics over a batch of reports.

use serde::Serialize;

use crate::batch::HouseholdReport;

/// Distribution statistics for a continuous metric across households.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistStats {
    pub n: usize,
    pub min: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Linear-interpolated percentiles plus sample mean and standard deviation.
/// NaN values must be filtered out by the caller.
pub fn percentile_stats(values: &mut [f64]) -> Option<DistStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();

    let interp = |p: f64| -> f64 {
        let h = p * (n - 1) as f64;
        let lo = h.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        let frac = h - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    };

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };

    Some(DistStats {
        n,
        min: values[0],
        p5: interp(0.05),
        p25: interp(0.25),
        p50: interp(0.50),
        p75: interp(0.75),
        p95: interp(0.95),
        max: values[n - 1],
        mean,
        std_dev: variance.sqrt(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    Lambda,
    RecoveryTime,
    WellbeingLoss,
    AssetLoss,
    EquityWeightedLoss,
    /// Well-being loss per unit of asset loss.
    WellbeingToAsset,
    DamageToIncome,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Lambda,
        Metric::RecoveryTime,
        Metric::WellbeingLoss,
        Metric::AssetLoss,
        Metric::EquityWeightedLoss,
        Metric::WellbeingToAsset,
        Metric::DamageToIncome,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Lambda => "lambda",
            Metric::RecoveryTime => "recovery time (y)",
            Metric::WellbeingLoss => "wellbeing loss",
            Metric::AssetLoss => "asset loss",
            Metric::EquityWeightedLoss => "equity-weighted loss",
            Metric::WellbeingToAsset => "wellbeing / asset",
            Metric::DamageToIncome => "damage / income",
        }
    }

    /// `None` when the household has no value for this metric.
    pub fn extract(self, report: &HouseholdReport) -> Option<f64> {
        match self {
            Metric::Lambda => report.lambda,
            Metric::RecoveryTime => report.recovery_time,
            Metric::WellbeingLoss => report.losses.wellbeing_loss(),
            Metric::AssetLoss => report.losses.asset_loss(),
            Metric::EquityWeightedLoss => report.losses.equity_weighted_loss(),
            Metric::WellbeingToAsset => {
                let asset = report.losses.asset_loss()?;
                (asset > 0.0).then(|| report.losses.wellbeing_loss().map(|w| w / asset)).flatten()
            }
            Metric::DamageToIncome => Some(report.damage_to_income()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDist {
    pub metric: Metric,
    pub stats: Option<DistStats>,
    /// Households whose value came out NaN.
    pub undefined: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub households: usize,
    pub failed: usize,
    pub not_converged: usize,
    pub metrics: Vec<MetricDist>,
}

impl BatchSummary {
    pub fn metric(&self, metric: Metric) -> Option<&MetricDist> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Summarise successful reports; failed ones only count towards `failed`.
pub fn summarise(reports: &[HouseholdReport]) -> BatchSummary {
    let ok: Vec<&HouseholdReport> = reports.iter().filter(|r| r.is_ok()).collect();
    let metrics = Metric::ALL
        .into_iter()
        .map(|metric| {
            let raw: Vec<f64> = ok.iter().filter_map(|r| metric.extract(r)).collect();
            let undefined = raw.iter().filter(|x| x.is_nan()).count();
            let mut values: Vec<f64> = raw.into_iter().filter(|x| !x.is_nan()).collect();
            MetricDist { metric, stats: percentile_stats(&mut values), undefined }
        })
        .collect();

    BatchSummary {
        households: reports.len(),
        failed: reports.len() - ok.len(),
        not_converged: ok.iter().filter(|r| r.optimizer_converged == Some(false)).count(),
        metrics,
    }
}

/// Households grouped by damage-to-income ratio, `[lower, upper)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioBand {
    pub lower: f64,
    pub upper: f64,
    pub households: usize,
    pub lambda: Option<DistStats>,
    pub wellbeing_to_asset: Option<DistStats>,
}

/// Band successful reports by damage-to-income ratio using sorted `edges`.
/// The last band is open-ended.
pub fn by_damage_to_income(reports: &[HouseholdReport], edges: &[f64]) -> Vec<RatioBand> {
    let mut bounds: Vec<(f64, f64)> = edges.windows(2).map(|w| (w[0], w[1])).collect();
    if let Some(&last) = edges.last() {
        bounds.push((last, f64::INFINITY));
    }

    bounds
        .into_iter()
        .map(|(lower, upper)| {
            let members: Vec<&HouseholdReport> = reports
                .iter()
                .filter(|r| r.is_ok())
                .filter(|r| {
                    let ratio = r.damage_to_income();
                    ratio >= lower && ratio < upper
                })
                .collect();
            let collect = |metric: Metric| {
                let mut values: Vec<f64> = members
                    .iter()
                    .filter_map(|r| metric.extract(r))
                    .filter(|x| !x.is_nan())
                    .collect();
                percentile_stats(&mut values)
            };
            RatioBand {
                lower,
                upper,
                households: members.len(),
                lambda: collect(Metric::Lambda),
                wellbeing_to_asset: collect(Metric::WellbeingToAsset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::household::{HouseholdParams, LossRecord};
    use crate::types::{HouseholdId, LossLabel};

    fn report(id: u64, lambda: f64, wellbeing: f64, v: f64) -> HouseholdReport {
        let mut losses = LossRecord::default();
        losses.insert(LossLabel::WellbeingLoss, wellbeing);
        losses.insert(LossLabel::AssetLoss, v * 100_000.0);
        losses.insert(LossLabel::EquityWeightedLoss, v * 100_000.0);
        HouseholdReport {
            id: HouseholdId(id),
            params: HouseholdParams::new(v, 100_000.0, 50_000.0, 50_000.0),
            lambda: Some(lambda),
            recovery_time: Some(3.0 / lambda),
            optimised: true,
            optimizer_converged: Some(true),
            losses,
            diagnostics: Vec::new(),
            sweep: None,
            error: None,
        }
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let mut values: Vec<f64> = (1..=5).map(|x| x as f64).collect();
        let ds = percentile_stats(&mut values).unwrap();
        assert_eq!(ds.n, 5);
        assert_eq!(ds.min, 1.0);
        assert_eq!(ds.max, 5.0);
        assert_eq!(ds.p50, 3.0);
        assert!((ds.p25 - 2.0).abs() < 1e-12);
        assert!((ds.p5 - 1.2).abs() < 1e-12);
        assert!((ds.mean - 3.0).abs() < 1e-12);
        assert!((ds.std_dev - 2.5_f64.sqrt()).abs() < 1e-12);
        assert!(percentile_stats(&mut []).is_none());
    }

    #[test]
    fn single_value_has_zero_spread() {
        let ds = percentile_stats(&mut [4.0]).unwrap();
        assert_eq!(ds.p95, 4.0);
        assert_eq!(ds.std_dev, 0.0);
    }

    #[test]
    fn summary_counts_failures_and_nan() {
        let mut failed = report(3, 1.0, 1.0, 0.1);
        failed.error = Some("invalid".into());
        let reports = vec![report(1, 0.5, 100.0, 0.2), report(2, 1.5, f64::NAN, 0.4), failed];
        let s = summarise(&reports);
        assert_eq!(s.households, 3);
        assert_eq!(s.failed, 1);
        let wb = s.metric(Metric::WellbeingLoss).unwrap();
        assert_eq!(wb.undefined, 1);
        assert_eq!(wb.stats.as_ref().unwrap().n, 1);
        let lambda = s.metric(Metric::Lambda).unwrap().stats.as_ref().unwrap();
        assert_eq!(lambda.n, 2);
        assert!((lambda.mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn wellbeing_to_asset_skips_undamaged() {
        let undamaged = report(1, 1.0, 0.0, 0.0);
        assert_eq!(Metric::WellbeingToAsset.extract(&undamaged), None);
        let damaged = report(2, 1.0, 5_000.0, 0.1);
        assert_eq!(Metric::WellbeingToAsset.extract(&damaged), Some(0.5));
    }

    #[test]
    fn ratio_bands_partition_households() {
        // damage / income = v·100 000 / 50 000 = 2v
        let reports = vec![report(1, 0.5, 1.0, 0.05), report(2, 1.0, 1.0, 0.2), report(3, 2.0, 1.0, 0.6)];
        let bands = by_damage_to_income(&reports, &[0.0, 0.25, 1.0]);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0].households, 1);
        assert_eq!(bands[1].households, 1);
        assert_eq!(bands[2].households, 1);
        assert_eq!(bands[2].upper, f64::INFINITY);
        assert_eq!(bands[2].lambda.as_ref().unwrap().p50, 2.0);
    }
}
