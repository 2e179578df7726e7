use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use tracing::Level;

use wellbeing::batch::{self, HouseholdRecord, HouseholdReport};
use wellbeing::config::BatchConfig;
use wellbeing::summary::{self, Metric};
use wellbeing::synthetic;
use wellbeing::types::IntegrationMethod;

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut input_path: Option<String> = None;
    let mut synthetic_count: Option<usize> = None;
    let mut seed_override: Option<u64> = None;
    let mut method_override: Option<IntegrationMethod> = None;
    let mut sweep_steps: Option<usize> = None;
    let mut output_path = "reports.ndjson".to_string();
    let mut keep_sweep = false;
    let mut quiet = false;
    let mut verbose = false;
    let mut log_json = false;

    let value = |i: usize, flag: &str| -> String {
        args.get(i).cloned().unwrap_or_else(|| fail(format!("{flag} requires a value")))
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(value(i, "--input"));
            }
            "--synthetic" => {
                i += 1;
                synthetic_count = Some(
                    value(i, "--synthetic")
                        .parse()
                        .unwrap_or_else(|_| fail("--synthetic requires a household count")),
                );
            }
            "--seed" => {
                i += 1;
                seed_override =
                    Some(value(i, "--seed").parse().unwrap_or_else(|_| fail("--seed requires a u64")));
            }
            "--method" => {
                i += 1;
                method_override = Some(value(i, "--method").parse().unwrap_or_else(|e| fail(e)));
            }
            "--sweep-steps" => {
                i += 1;
                sweep_steps = Some(
                    value(i, "--sweep-steps")
                        .parse()
                        .unwrap_or_else(|_| fail("--sweep-steps requires a positive integer")),
                );
            }
            "--output" => {
                i += 1;
                output_path = value(i, "--output");
            }
            "--keep-sweep" => keep_sweep = true,
            "--quiet" => quiet = true,
            "--verbose" => verbose = true,
            "--log-json" => log_json = true,
            other => fail(format!("unknown argument '{other}'")),
        }
        i += 1;
    }

    init_logging(quiet, verbose, log_json);

    let mut config = BatchConfig::canonical();
    if let Some(seed) = seed_override {
        config.seed = seed;
    }
    if let Some(method) = method_override {
        config.method = method;
    }
    if let Some(steps) = sweep_steps {
        config.sweep.no_steps = steps;
    }
    config.keep_sweep = keep_sweep;

    let records = match (&input_path, synthetic_count) {
        (Some(_), Some(_)) => fail("--input and --synthetic are mutually exclusive"),
        (Some(path), None) => read_records(path),
        (None, n) => {
            if let Some(n) = n {
                config.synthetic.households = n;
            }
            synthetic::generate(&config.synthetic, config.seed).unwrap_or_else(|e| fail(e))
        }
    };

    let reports = batch::assess_all(records, &config);

    let file = File::create(&output_path)
        .unwrap_or_else(|e| fail(format!("cannot create {output_path}: {e}")));
    let mut writer = BufWriter::new(file);
    for r in &reports {
        serde_json::to_writer(&mut writer, r).unwrap_or_else(|e| fail(e));
        writeln!(writer).unwrap_or_else(|e| fail(e));
    }
    writer.flush().unwrap_or_else(|e| fail(e));

    if !quiet {
        println!("Households assessed: {} → {output_path}", reports.len());
        print_overview(&reports, config.method);
    }
}

fn init_logging(quiet: bool, verbose: bool, json: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_records(path: &str) -> Vec<HouseholdRecord> {
    let file = File::open(path).unwrap_or_else(|e| fail(format!("cannot open {path}: {e}")));
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.unwrap_or_else(|e| fail(format!("reading line {}: {e}", line_no + 1)));
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HouseholdRecord>(&line) {
            Ok(r) => records.push(r),
            Err(e) => fail(format!("line {}: {e}\n  line: {line}", line_no + 1)),
        }
    }
    records
}

fn print_overview(reports: &[HouseholdReport], method: IntegrationMethod) {
    let s = summary::summarise(reports);
    println!(
        "\n=== Batch overview (method: {method}, failed: {}, optimizer not converged: {}) ===",
        s.failed, s.not_converged
    );
    println!(
        "{:<22} | {:>6} | {:>12} | {:>12} | {:>12} | {:>9}",
        "Metric", "n", "p5", "p50", "p95", "undefined"
    );
    println!("{}", "-".repeat(22 + 3 + 6 + 3 + 12 + 3 + 12 + 3 + 12 + 3 + 9));
    for metric in [Metric::Lambda, Metric::RecoveryTime, Metric::WellbeingLoss, Metric::AssetLoss] {
        let Some(md) = s.metric(metric) else { continue };
        match &md.stats {
            Some(ds) => println!(
                "{:<22} | {:>6} | {:>12.3} | {:>12.3} | {:>12.3} | {:>9}",
                metric.label(),
                ds.n,
                ds.p5,
                ds.p50,
                ds.p95,
                md.undefined
            ),
            None => println!("{:<22} | {:>6} | {:>12} | {:>12} | {:>12} | {:>9}", metric.label(), 0, "-", "-", "-", md.undefined),
        }
    }
}
