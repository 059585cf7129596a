//! Sanity run: a short fixed-shape session that must pass cleanly.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use crate::driver::{run_fuzz, FuzzConfig};
use crate::options::GeneratorOptions;
use crate::report::FuzzReport;
use crate::sample::RunConfig;

pub const SANITY_SAMPLE_COUNT: u64 = 8;
pub const SANITY_CALLS_PER_SAMPLE: usize = 4;

/// Eight samples, four calls each, codegen on, divide disallowed.
pub fn sanity_config(seed: u64, artifact_dir: &Path) -> Result<FuzzConfig> {
    Ok(FuzzConfig {
        generator: GeneratorOptions::builder().disallow_divide(true).build()?,
        run: RunConfig {
            codegen: true,
            calls_per_sample: SANITY_CALLS_PER_SAMPLE,
            ..RunConfig::default()
        },
        ..FuzzConfig::new(seed, SANITY_SAMPLE_COUNT, artifact_dir)
    })
}

/// Run the sanity session; any failing sample is an error.
pub fn run_sanity(seed: u64, artifact_dir: &Path) -> Result<FuzzReport> {
    let report = run_fuzz(&sanity_config(seed, artifact_dir)?)?;
    if !report.is_clean() {
        let first = report
            .failures
            .first()
            .map(|f| f.outcome.summary())
            .unwrap_or_default();
        bail!(
            "sanity run failed: {} of {} samples failed (first: {first}); artifacts under {}",
            report.samples_failed,
            report.samples_run,
            artifact_dir.display()
        );
    }
    info!(seed, samples = report.samples_run, "sanity run passed");
    Ok(report)
}
