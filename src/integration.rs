//! Total discounted loss: `∫ rate(t, λ)·e^(-ρt) dt` over the household horizon.
//!
//! Two interchangeable schemes:
//! - trapezoidal rule over a fixed grid (fast, grid-bound accuracy);
//! - globally adaptive 7/15-point Gauss–Kronrod quadrature (grid-independent).
//!
//! Both have a single-λ entry point returning a scalar and a batch entry point
//! returning one total per λ.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::errors::{Result, WellbeingError};
use crate::grid::TimeDomain;
use crate::loss_rates::LossRate;
use crate::types::IntegrationMethod;

// Kronrod abscissae on [0, 1); odd indices are shared with the 7-point Gauss rule.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

#[derive(Debug, Clone, Copy)]
pub struct QuadOptions {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    /// Maximum number of subintervals.
    pub limit: usize,
}

impl Default for QuadOptions {
    fn default() -> Self {
        Self { abs_tolerance: 1.49e-8, rel_tolerance: 1.49e-8, limit: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadResult {
    pub value: f64,
    pub abs_error: f64,
    pub intervals: usize,
    pub converged: bool,
}

/// Trapezoidal rule. `xs` and `ys` must have equal length ≥ 2.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> Result<f64> {
    if xs.len() < 2 || ys.len() != xs.len() {
        return Err(WellbeingError::GridTooShort { points: xs.len().min(ys.len()) });
    }
    Ok(xs
        .windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum())
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

fn gauss_kronrod_15<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> Segment {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = fc * WGK[7];
    let mut gauss = fc * WG[3];
    for j in 0..7 {
        let dx = half * XGK[j];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    let value = kronrod * half;
    let error = ((kronrod - gauss) * half).abs();
    Segment { a, b, value, error }
}

/// Globally adaptive quadrature of `f` over `[a, b]`: repeatedly bisects the
/// segment with the largest error estimate until the summed estimate meets
/// tolerance or the subinterval limit is reached. A non-finite partial sum
/// stops refinement immediately.
pub fn adaptive_quad<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, options: QuadOptions) -> QuadResult {
    if a == b {
        return QuadResult { value: 0.0, abs_error: 0.0, intervals: 1, converged: true };
    }
    let mut segments = vec![gauss_kronrod_15(&f, a, b)];

    loop {
        let value: f64 = segments.iter().map(|s| s.value).sum();
        let abs_error: f64 = segments.iter().map(|s| s.error).sum();
        let intervals = segments.len();

        if !value.is_finite() {
            return QuadResult { value, abs_error, intervals, converged: false };
        }
        let tolerance = options.abs_tolerance.max(options.rel_tolerance * value.abs());
        if abs_error <= tolerance {
            return QuadResult { value, abs_error, intervals, converged: true };
        }
        if intervals >= options.limit.max(1) {
            return QuadResult { value, abs_error, intervals, converged: false };
        }

        let worst = segments
            .iter()
            .enumerate()
            .max_by(|(_, x), (_, y)| x.error.total_cmp(&y.error))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let Segment { a, b, .. } = segments.swap_remove(worst);
        let mid = 0.5 * (a + b);
        segments.push(gauss_kronrod_15(&f, a, mid));
        segments.push(gauss_kronrod_15(&f, mid, b));
    }
}

fn check_lambda(lambda: f64) -> Result<()> {
    if lambda > 0.0 && lambda.is_finite() {
        Ok(())
    } else {
        Err(WellbeingError::NonPositiveRate { value: lambda })
    }
}

fn check_rho(rho: f64) -> Result<()> {
    if rho >= 0.0 && rho.is_finite() {
        Ok(())
    } else {
        Err(WellbeingError::invalid("rho", rho, "discount rate must be non-negative"))
    }
}

/// Total discounted loss for one recovery rate.
pub fn total(
    rate: &LossRate,
    domain: &TimeDomain,
    lambda: f64,
    rho: f64,
    method: IntegrationMethod,
) -> Result<Outcome<f64>> {
    total_batch(rate, domain, &[lambda], rho, method).map(|out| out.map(|v| v[0]))
}

/// Total discounted loss for each recovery rate in `lambdas`.
pub fn total_batch(
    rate: &LossRate,
    domain: &TimeDomain,
    lambdas: &[f64],
    rho: f64,
    method: IntegrationMethod,
) -> Result<Outcome<Vec<f64>>> {
    if lambdas.is_empty() {
        return Err(WellbeingError::EmptyBatch);
    }
    for &l in lambdas {
        check_lambda(l)?;
    }
    check_rho(rho)?;

    let mut notices = Vec::new();
    let mut unconverged: Vec<(f64, f64, usize)> = Vec::new();
    let totals: Vec<f64> = match method {
        IntegrationMethod::Trapezoid => {
            let times = domain.sample_points();
            if times.len() < 2 {
                return Err(WellbeingError::GridTooShort { points: times.len() });
            }
            let discount: Vec<f64> = times.iter().map(|&t| (-rho * t).exp()).collect();
            let mut ys = vec![0.0; times.len()];
            lambdas
                .iter()
                .map(|&l| {
                    for ((y, &t), &d) in ys.iter_mut().zip(times.iter()).zip(&discount) {
                        *y = rate.at(t, l) * d;
                    }
                    trapezoid(&times, &ys)
                })
                .collect::<Result<Vec<f64>>>()?
        }
        IntegrationMethod::Quad => {
            let t_end = domain.t_end();
            lambdas
                .iter()
                .map(|&l| {
                    let res = adaptive_quad(
                        |t| rate.at(t, l) * (-rho * t).exp(),
                        0.0,
                        t_end,
                        QuadOptions::default(),
                    );
                    if !res.converged && res.value.is_finite() {
                        unconverged.push((l, res.abs_error, res.intervals));
                    }
                    res.value
                })
                .collect()
        }
    };

    // One notice per batch, however many rates are affected.
    if let Some(&(lambda, estimated_error, intervals)) =
        unconverged.iter().max_by(|a, b| a.1.total_cmp(&b.1))
    {
        notices.push(Diagnostic::QuadratureNotConverged {
            count: unconverged.len(),
            lambda,
            estimated_error,
            intervals,
        });
    }
    let undefined: Vec<f64> =
        lambdas.iter().zip(&totals).filter(|(_, v)| v.is_nan()).map(|(&l, _)| l).collect();
    if !undefined.is_empty() {
        notices.push(Diagnostic::UndefinedTotal {
            kind: rate.kind,
            count: undefined.len(),
            lambda_min: undefined.iter().copied().fold(f64::INFINITY, f64::min),
            lambda_max: undefined.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        });
    }

    Ok(Outcome::with(totals, notices))
}
