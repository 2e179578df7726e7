use serde::Serialize;

use crate::errors::{Result, WellbeingError};

/// Points sampled when a bare horizon is integrated with the trapezoid rule.
pub const DEFAULT_HORIZON_POINTS: usize = 100;

/// Largest grid [`TimeGrid::new`] will build (about 80 MB of points).
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Evenly spaced points from 0 to `t_max` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeGrid {
    points: Vec<f64>,
    dt: f64,
}

impl TimeGrid {
    /// Grid of `floor(t_max/dt) + 1` points; the step is re-derived as
    /// `t_max / floor(t_max/dt)` so the last point lands exactly on `t_max`.
    pub fn new(t_max: f64, dt: f64) -> Result<Self> {
        if !(t_max > 0.0) || !t_max.is_finite() {
            return Err(WellbeingError::invalid("t_max", t_max, "must be positive and finite"));
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(WellbeingError::invalid("dt", dt, "must be positive and finite"));
        }
        // Absorb representation error so 10 / (1/52) gives 520 steps, not 519.
        let ratio = (t_max / dt * (1.0 + 1e-9)).floor();
        if ratio >= MAX_GRID_POINTS as f64 {
            return Err(WellbeingError::invalid("dt", dt, "time step too small for the horizon"));
        }
        let steps = ratio as usize;
        if steps < 1 {
            return Err(WellbeingError::GridTooShort { points: steps + 1 });
        }
        Ok(Self::linspace(t_max, steps + 1))
    }

    /// `n` evenly spaced points over `[0, t_max]`.
    pub fn linspace(t_max: f64, n: usize) -> Self {
        let steps = n.saturating_sub(1).max(1);
        let dt = t_max / steps as f64;
        let mut points: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        if let Some(last) = points.last_mut() {
            *last = t_max;
        }
        Self { points, dt }
    }

    /// Wrap caller-supplied time points; they must be finite and strictly increasing.
    pub fn from_points(points: Vec<f64>) -> Result<Self> {
        if points.iter().any(|t| !t.is_finite()) || points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(WellbeingError::UnorderedGrid);
        }
        let dt = match points.as_slice() {
            [first, .., last] => (last - first) / (points.len() - 1) as f64,
            _ => 0.0,
        };
        Ok(Self { points, dt })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Effective (mean) step between points.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn t_end(&self) -> f64 {
        self.points.last().copied().unwrap_or(0.0)
    }
}

/// The time axis a loss is integrated over.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeDomain {
    /// Explicit grid: used point-by-point by the trapezoid rule, and for its
    /// last point as the upper limit of quadrature.
    Grid(TimeGrid),
    /// Bare horizon `[0, t_max]`.
    Horizon(f64),
}

impl TimeDomain {
    /// Build from optional parts; exactly one must be present.
    pub fn from_parts(times: Option<Vec<f64>>, t_max: Option<f64>) -> Result<Self> {
        match (times, t_max) {
            (Some(points), None) => Ok(TimeDomain::Grid(TimeGrid::from_points(points)?)),
            (None, Some(t_max)) => {
                if !(t_max > 0.0) || !t_max.is_finite() {
                    return Err(WellbeingError::invalid("t_max", t_max, "must be positive and finite"));
                }
                Ok(TimeDomain::Horizon(t_max))
            }
            _ => Err(WellbeingError::AmbiguousTimeDomain),
        }
    }

    pub fn t_end(&self) -> f64 {
        match self {
            TimeDomain::Grid(grid) => grid.t_end(),
            TimeDomain::Horizon(t_max) => *t_max,
        }
    }

    /// Points the trapezoid rule sums over.
    pub fn sample_points(&self) -> std::borrow::Cow<'_, [f64]> {
        match self {
            TimeDomain::Grid(grid) => std::borrow::Cow::Borrowed(grid.points()),
            TimeDomain::Horizon(t_max) => {
                std::borrow::Cow::Owned(TimeGrid::linspace(*t_max, DEFAULT_HORIZON_POINTS).points)
            }
        }
    }
}

impl From<TimeGrid> for TimeDomain {
    fn from(grid: TimeGrid) -> Self {
        TimeDomain::Grid(grid)
    }
}
