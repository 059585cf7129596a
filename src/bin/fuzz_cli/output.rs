//! Output formatting for the dslx-fuzz CLI.
//!
//! Human-readable text goes to stdout; with `--json` stdout carries a single
//! JSON document. Logs always go to stderr.

use anyhow::Result;
use dslx_fuzz::fuzz::{FuzzReport, Sample, SampleResult};
use serde::Serialize;

pub fn print_report(report: &FuzzReport, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "Results ({} of {} samples, seed: {}, {}ms):",
        report.samples_run, report.samples_requested, report.seed, report.elapsed_ms
    );
    println!("  Passed:      {:>6}", report.passed);
    println!("  Mismatches:  {:>6}", report.mismatches);
    println!("  Crashes:     {:>6}", report.crashes);
    if report.cancelled {
        println!("  (cancelled)");
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &report.failures {
            println!(
                "  [iter {}] {} ({})",
                failure.iteration,
                failure.outcome.summary(),
                &failure.fingerprint[..12.min(failure.fingerprint.len())]
            );
            if let Some(path) = &failure.artifact_path {
                println!("    saved to {}", path.display());
            }
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

pub fn print_sample_result(
    sample: &Sample,
    result: &SampleResult,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    if json_output {
        #[derive(Serialize)]
        struct ReplayJson<'a> {
            fingerprint: String,
            outcome: &'a dslx_fuzz::fuzz::ComparisonOutcome,
            results: Vec<&'a dslx_fuzz::fuzz::BackendResult>,
        }
        let json = ReplayJson {
            fingerprint: sample.fingerprint(),
            outcome: &result.outcome,
            results: result.backend_results().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Sample {}", sample.fingerprint());
    if verbose {
        println!();
        print!("{}", sample.source());
    }
    println!();
    for (i, args) in sample.args_batch.iter().enumerate() {
        println!("  call #{i}: {args}");
    }
    println!();
    for backend in result.backend_results() {
        println!("{}:", backend.backend);
        for line in backend.results_text().lines() {
            println!("  {line}");
        }
    }
    println!();
    println!("Outcome: {}", result.outcome.summary());
    Ok(())
}
