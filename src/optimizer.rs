//! Bounded derivative-free search for the recovery rate that minimises total
//! utility loss.
//!
//! References:
//! - Nelder and Mead (1965), simplex direct search.

use crate::diagnostics::{Diagnostic, Outcome};
use crate::errors::{Result, WellbeingError};
use crate::grid::TimeDomain;
use crate::integration;
use crate::loss_rates::{LossRate, RateParams};
use crate::types::{IntegrationMethod, LossKind};
use crate::utility;

/// Box constraints, one interval per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(WellbeingError::EmptyBatch);
        }
        for (&lo, &hi) in lower.iter().zip(&upper) {
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(WellbeingError::InvalidBounds { lower: lo, upper: hi });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn interval(lower: f64, upper: f64) -> Result<Self> {
        Self::new(vec![lower], vec![upper])
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, v)| v.clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    fn is_degenerate(&self) -> bool {
        self.lower.iter().zip(&self.upper).all(|(lo, hi)| lo == hi)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    /// Defaults to `200 × dimension` when `None`.
    pub max_iterations: Option<usize>,
    /// Relative offset of the initial simplex vertices from the seed.
    pub initial_step: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    pub x_tolerance: f64,
    pub f_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            initial_step: 0.05,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Tolerance,
    MaxIterations,
    /// Every bound interval is a single point; nothing to search.
    DegenerateBounds,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceInfo {
    pub iterations: usize,
    pub objective_evaluations: usize,
    pub converged: bool,
    pub reason: TerminationReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisationResult {
    pub x: Vec<f64>,
    pub objective: f64,
    pub convergence: ConvergenceInfo,
}

/// Bounded Nelder–Mead. Every candidate is clamped into `bounds`; an
/// undefined (NaN) objective counts as +∞ so such points are never preferred.
pub fn nelder_mead<F>(
    initial: &[f64],
    bounds: &Bounds,
    options: NelderMeadOptions,
    mut objective_fn: F,
) -> Result<OptimisationResult>
where
    F: FnMut(&[f64]) -> f64,
{
    let dim = bounds.dimension();
    if initial.len() != dim {
        return Err(WellbeingError::InvalidBounds { lower: initial.len() as f64, upper: dim as f64 });
    }

    let mut evals = 0usize;
    let mut eval = |x: &[f64]| {
        evals += 1;
        let f = objective_fn(x);
        if f.is_nan() { f64::INFINITY } else { f }
    };

    let x0 = bounds.clamp(initial);
    if bounds.is_degenerate() {
        let f0 = eval(&x0);
        return Ok(OptimisationResult {
            x: x0,
            objective: f0,
            convergence: ConvergenceInfo {
                iterations: 0,
                objective_evaluations: 1,
                converged: true,
                reason: TerminationReason::DegenerateBounds,
            },
        });
    }

    let mut simplex = Vec::with_capacity(dim + 1);
    let mut values = Vec::with_capacity(dim + 1);
    values.push(eval(&x0));
    simplex.push(x0.clone());

    for d in 0..dim {
        let mut x = x0.clone();
        x[d] = if x[d] != 0.0 { x[d] * (1.0 + options.initial_step) } else { 0.00025 };
        // Reflect an overshooting vertex back inside before clamping.
        if x[d] > bounds.upper[d] {
            x[d] = 2.0 * bounds.upper[d] - x[d];
        }
        let x = bounds.clamp(&x);
        values.push(eval(&x));
        simplex.push(x);
    }

    let max_iterations = options.max_iterations.unwrap_or(200 * dim);
    let mut iterations = 0usize;
    let mut reason = TerminationReason::MaxIterations;
    let mut converged = false;

    let sort = |simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>| {
        let mut order: Vec<usize> = (0..simplex.len()).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        *values = order.iter().map(|&i| values[i]).collect();
    };
    sort(&mut simplex, &mut values);

    while iterations < max_iterations {
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|x| x.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|&f| if f == values[0] { 0.0 } else { (f - values[0]).abs() })
            .fold(0.0_f64, f64::max);
        if x_spread <= options.x_tolerance && f_spread <= options.f_tolerance {
            converged = true;
            reason = TerminationReason::Tolerance;
            break;
        }
        iterations += 1;

        let centroid: Vec<f64> = (0..dim)
            .map(|d| simplex.iter().take(dim).map(|x| x[d]).sum::<f64>() / dim as f64)
            .collect();
        let along = |coef: f64, from: &[f64]| -> Vec<f64> {
            let x: Vec<f64> = (0..dim).map(|d| centroid[d] + coef * (centroid[d] - from[d])).collect();
            bounds.clamp(&x)
        };

        let xr = along(options.reflection, &simplex[dim]);
        let fr = eval(&xr);

        if fr < values[0] {
            let xe = along(options.reflection * options.expansion, &simplex[dim]);
            let fe = eval(&xe);
            if fe < fr {
                simplex[dim] = xe;
                values[dim] = fe;
            } else {
                simplex[dim] = xr;
                values[dim] = fr;
            }
        } else if fr < values[dim - 1] {
            simplex[dim] = xr;
            values[dim] = fr;
        } else {
            let mut shrink = false;
            if fr < values[dim] {
                let xc = along(options.contraction * options.reflection, &simplex[dim]);
                let fc = eval(&xc);
                if fc <= fr {
                    simplex[dim] = xc;
                    values[dim] = fc;
                } else {
                    shrink = true;
                }
            } else {
                let xcc = along(-options.contraction, &simplex[dim]);
                let fcc = eval(&xcc);
                if fcc < values[dim] {
                    simplex[dim] = xcc;
                    values[dim] = fcc;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                for i in 1..=dim {
                    let x: Vec<f64> = (0..dim)
                        .map(|d| simplex[0][d] + options.shrink * (simplex[i][d] - simplex[0][d]))
                        .collect();
                    simplex[i] = bounds.clamp(&x);
                    values[i] = eval(&simplex[i]);
                }
            }
        }

        sort(&mut simplex, &mut values);
    }

    Ok(OptimisationResult {
        x: simplex.swap_remove(0),
        objective: values[0],
        convergence: ConvergenceInfo {
            iterations,
            objective_evaluations: evals,
            converged,
            reason,
        },
    })
}

/// The minimiser found by [`optimal_lambda`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateOptimum {
    pub lambda: f64,
    /// Undiscounted total utility loss at `lambda` (infinite if undefined everywhere).
    pub utility_loss: f64,
    pub convergence: ConvergenceInfo,
}

/// Recovery rate in `[lambda_min, lambda_max]` minimising undiscounted total
/// utility loss, searched from `lambda_min`.
pub fn optimal_lambda(
    params: &RateParams,
    lambda_min: f64,
    lambda_max: f64,
    domain: &TimeDomain,
    method: IntegrationMethod,
) -> Result<Outcome<RateOptimum>> {
    params.validate()?;
    if !(lambda_min > 0.0) || !lambda_max.is_finite() || lambda_min > lambda_max {
        return Err(WellbeingError::InvalidBounds { lower: lambda_min, upper: lambda_max });
    }
    let bounds = Bounds::interval(lambda_min, lambda_max)?;
    let rate = LossRate::new(LossKind::Utility, *params);

    let result = nelder_mead(&[lambda_min], &bounds, NelderMeadOptions::default(), |x| {
        integration::total(&rate, domain, x[0], 0.0, method)
            .map(|out| out.value)
            .unwrap_or(f64::INFINITY)
    })?;

    let lambda = result.x[0];
    let mut notices = utility::eta_notices(params.eta);
    if !result.convergence.converged {
        notices.push(Diagnostic::OptimizerNotConverged {
            iterations: result.convergence.iterations,
            best_lambda: lambda,
        });
    }
    tracing::debug!(
        lambda,
        iterations = result.convergence.iterations,
        evaluations = result.convergence.objective_evaluations,
        "recovery rate optimised"
    );

    Ok(Outcome::with(
        RateOptimum { lambda, utility_loss: result.objective, convergence: result.convergence },
        notices,
    ))
}
