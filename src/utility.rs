//! CRRA utility and the closed-form conversions between recovery rate and
//! recovery time.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::errors::{Result, WellbeingError};

/// Share of the damage (in percent) that counts as "rebuilt" when converting
/// between recovery rate and recovery time.
pub const DEFAULT_REBUILT_PERCENT: f64 = 95.0;

pub(crate) fn check_eta(eta: f64) -> Result<()> {
    if eta > 0.0 && eta.is_finite() {
        Ok(())
    } else {
        Err(WellbeingError::InvalidEta { eta })
    }
}

/// Notices attached to any computation that evaluates utility with `eta`.
pub fn eta_notices(eta: f64) -> Vec<Diagnostic> {
    if eta == 1.0 { vec![Diagnostic::LogUtility { eta }] } else { Vec::new() }
}

/// Unchecked CRRA kernel. `eta` must already be validated.
/// Non-positive (or NaN) consumption yields NaN.
#[inline]
pub(crate) fn crra(consumption: f64, eta: f64) -> f64 {
    if !(consumption > 0.0) {
        return f64::NAN;
    }
    if eta == 1.0 {
        consumption.ln()
    } else {
        consumption.powf(1.0 - eta) / (1.0 - eta)
    }
}

/// Utility of a single consumption level.
pub fn utility(consumption: f64, eta: f64) -> Result<Outcome<f64>> {
    check_eta(eta)?;
    let mut notices = eta_notices(eta);
    let u = crra(consumption, eta);
    if u.is_nan() {
        notices.push(Diagnostic::UndefinedUtility { count: 1 });
    }
    Ok(Outcome::with(u, notices))
}

/// Utility of a batch of consumption levels, optionally rescaled to `[0, 1]`
/// with NaN-ignoring batch min/max.
pub fn utility_batch(consumption: &[f64], eta: f64, normalize: bool) -> Result<Outcome<Vec<f64>>> {
    check_eta(eta)?;
    if consumption.is_empty() {
        return Err(WellbeingError::EmptyBatch);
    }
    if normalize && consumption.len() == 1 {
        return Err(WellbeingError::NormalizeSingleValue);
    }

    let mut notices = eta_notices(eta);
    let mut u: Vec<f64> = consumption.iter().map(|&c| crra(c, eta)).collect();

    let undefined = u.iter().filter(|x| x.is_nan()).count();
    if undefined > 0 {
        notices.push(Diagnostic::UndefinedUtility { count: undefined });
    }

    if normalize {
        let (lo, hi) = u
            .iter()
            .filter(|x| !x.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        let span = hi - lo;
        for x in u.iter_mut() {
            *x = (*x - lo) / span;
        }
    }

    Ok(Outcome::with(u, notices))
}

/// `ln(1 / (1 - p/100))`, the log-share shared by both conversions.
fn rebuilt_log(rebuilt_per: f64) -> Result<f64> {
    if !(0.0..100.0).contains(&rebuilt_per) {
        return Err(WellbeingError::RebuiltPercentOutOfRange { value: rebuilt_per });
    }
    Ok((1.0 / (1.0 - rebuilt_per / 100.0)).ln())
}

/// Time for `rebuilt_per` percent of the damage to be rebuilt at `rate`.
pub fn recovery_time(rate: f64, rebuilt_per: f64) -> Result<f64> {
    if !(rate > 0.0) {
        return Err(WellbeingError::NonPositiveRate { value: rate });
    }
    Ok(rebuilt_log(rebuilt_per)? / rate)
}

/// Rate at which `rebuilt_per` percent of the damage is rebuilt after `time`.
pub fn recovery_rate(time: f64, rebuilt_per: f64) -> Result<f64> {
    if !(time > 0.0) {
        return Err(WellbeingError::NonPositiveTime { value: time });
    }
    Ok(rebuilt_log(rebuilt_per)? / time)
}

pub fn recovery_times(rates: &[f64], rebuilt_per: f64) -> Result<Vec<f64>> {
    rates.iter().map(|&r| recovery_time(r, rebuilt_per)).collect()
}

pub fn recovery_rates(times: &[f64], rebuilt_per: f64) -> Result<Vec<f64>> {
    times.iter().map(|&t| recovery_rate(t, rebuilt_per)).collect()
}

/// `(c / c_avg)^(-eta)`: marginal utility at `c` relative to the reference level.
pub fn equity_weight(c: f64, c_avg: f64, eta: f64) -> f64 {
    (c / c_avg).powf(-eta)
}

/// Utility loss re-expressed as the consumption drop that would cost a
/// household at `c_avg` the same utility.
pub fn wellbeing_loss(utility_loss: f64, c_avg: f64, eta: f64) -> f64 {
    utility_loss / c_avg.powf(-eta)
}
