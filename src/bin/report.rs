//! Summarises a household report stream written by `wellbeing`.
//!
//! Reads `reports.ndjson` (or the first positional argument) and prints:
//!   Tier 1  household status and numerical notices
//!   Tier 2  cross-household distribution of each metric
//!   Tier 3  recovery rate and well-being loss by damage-to-income band

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use wellbeing::batch::HouseholdReport;
use wellbeing::diagnostics::Diagnostic;
use wellbeing::summary::{self, DistStats};
use wellbeing::utility::{DEFAULT_REBUILT_PERCENT, recovery_time};

const RATIO_BAND_EDGES: [f64; 6] = [0.0, 0.1, 0.25, 0.5, 1.0, 2.0];

fn main() {
    let reports_path = std::env::args().nth(1).unwrap_or_else(|| "reports.ndjson".to_string());

    let file = File::open(&reports_path).unwrap_or_else(|e| {
        eprintln!("error: cannot open {reports_path}: {e}");
        eprintln!("Run `cargo run --release` first to generate the report stream.");
        std::process::exit(1);
    });

    let mut reports: Vec<HouseholdReport> = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.unwrap_or_else(|e| {
            eprintln!("error reading line {}: {}", line_no + 1, e);
            std::process::exit(1);
        });
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HouseholdReport>(&line) {
            Ok(r) => reports.push(r),
            Err(e) => {
                eprintln!("error: failed to deserialize line {}: {}", line_no + 1, e);
                eprintln!("  line: {line}");
                std::process::exit(1);
            }
        }
    }

    let s = summary::summarise(&reports);

    // ── Tier 1: status ───────────────────────────────────────────────────────
    println!("=== Tier 1: Household Status ===");
    println!("  Households:               {}", s.households);
    println!("  Assessed:                 {}", s.households - s.failed);
    println!("  Failed validation:        {}", s.failed);
    println!("  Optimizer not converged:  {}", s.not_converged);

    let mut notices: BTreeMap<&'static str, usize> = BTreeMap::new();
    for d in reports.iter().flat_map(|r| &r.diagnostics) {
        *notices.entry(notice_name(d)).or_default() += 1;
    }
    if notices.is_empty() {
        println!("  No numerical notices");
    } else {
        println!("  Numerical notices:");
        for (name, count) in &notices {
            println!("    {name:<24} {count}");
        }
    }
    for r in reports.iter().filter(|r| !r.is_ok()) {
        println!("    household {}: {}", r.id, r.error.as_deref().unwrap_or(""));
    }
    println!();

    // ── Tier 2: distributions ────────────────────────────────────────────────
    println!("=== Tier 2: Cross-Household Distributions ===");
    println!(
        "{:<22} | {:>5} | {:>11} | {:>11} | {:>11} | {:>11} | {:>11} | {:>11} | {:>11} | {:>5}",
        "Metric", "n", "min", "p5", "p25", "p50", "p75", "p95", "max", "NaN#"
    );
    println!("{}", "-".repeat(22 + 3 + 5 + 7 * (3 + 11) + 3 + 5));
    for md in &s.metrics {
        match &md.stats {
            Some(ds) => println!(
                "{:<22} | {:>5} | {:>11.3} | {:>11.3} | {:>11.3} | {:>11.3} | {:>11.3} | {:>11.3} | {:>11.3} | {:>5}",
                md.metric.label(),
                ds.n,
                ds.min,
                ds.p5,
                ds.p25,
                ds.p50,
                ds.p75,
                ds.p95,
                ds.max,
                md.undefined,
            ),
            None => println!("{:<22} | {:>5} | (no defined values) | {:>5}", md.metric.label(), 0, md.undefined),
        }
    }
    println!();

    // ── Tier 3: damage-to-income bands ───────────────────────────────────────
    println!("=== Tier 3: By Damage / Income ===");
    println!(
        "{:>13} | {:>6} | {:>10} | {:>11} | {:>14}",
        "Band", "n", "λ p50", "RecT(λ p50)", "WB/Asset p50"
    );
    println!("{}", "-".repeat(13 + 3 + 6 + 3 + 10 + 3 + 11 + 3 + 14));
    let p50 = |ds: &Option<DistStats>| ds.as_ref().map(|d| d.p50);
    let fmt = |x: Option<f64>, width: usize| match x {
        Some(v) => format!("{v:>width$.3}"),
        None => format!("{:>width$}", "n/a"),
    };
    for band in summary::by_damage_to_income(&reports, &RATIO_BAND_EDGES) {
        let label = if band.upper.is_finite() {
            format!("[{:.2}, {:.2})", band.lower, band.upper)
        } else {
            format!("≥ {:.2}", band.lower)
        };
        let rec_time = p50(&band.lambda).map(|l| recovery_time(l, DEFAULT_REBUILT_PERCENT).unwrap_or(f64::NAN));
        println!(
            "{:>13} | {:>6} | {} | {} | {}",
            label,
            band.households,
            fmt(p50(&band.lambda), 10),
            fmt(rec_time, 11),
            fmt(p50(&band.wellbeing_to_asset), 14),
        );
    }
}

fn notice_name(d: &Diagnostic) -> &'static str {
    match d {
        Diagnostic::LogUtility { .. } => "LogUtility",
        Diagnostic::UndefinedUtility { .. } => "UndefinedUtility",
        Diagnostic::QuadratureNotConverged { .. } => "QuadratureNotConverged",
        Diagnostic::UndefinedTotal { .. } => "UndefinedTotal",
        Diagnostic::OptimizerNotConverged { .. } => "OptimizerNotConverged",
    }
}
