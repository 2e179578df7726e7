//! Household recovery and well-being loss after a disaster.
//!
//! A damaged household rebuilds its assets at an exponential recovery rate λ.
//! Reconstruction spending and foregone income depress consumption while it
//! does so; the resulting utility gap, integrated over time and converted back
//! to consumption units, is the household's well-being loss. [`household`]
//! ties the pieces together and [`optimizer`] finds the λ that minimises
//! total utility loss.

pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod grid;
pub mod household;
pub mod integration;
pub mod loss_rates;
pub mod optimizer;
pub mod summary;
pub mod synthetic;
pub mod types;
pub mod utility;

pub use errors::{Result, WellbeingError};
pub use household::{Household, HouseholdParams};
pub use types::{IntegrationMethod, LossKind};
