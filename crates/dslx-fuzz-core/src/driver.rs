//! Fuzz driver: the generate → run → compare → persist loop.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::artifacts::persist_failure;
use crate::options::GeneratorOptions;
use crate::report::{FailureRecord, FuzzReport};
use crate::runner::SampleRunner;
use crate::sample::RunConfig;
use crate::session::FuzzSession;

/// Configuration for a fuzz run.
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Number of samples to run.
    pub sample_count: u64,
    pub generator: GeneratorOptions,
    pub run: RunConfig,
    /// Root directory for crasher directories.
    pub artifact_dir: PathBuf,
    /// Stop after the first failing sample.
    pub stop_on_failure: bool,
}

impl FuzzConfig {
    pub fn new(seed: u64, sample_count: u64, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            seed,
            sample_count,
            generator: GeneratorOptions::default(),
            run: RunConfig::default(),
            artifact_dir: artifact_dir.into(),
            stop_on_failure: false,
        }
    }
}

/// Run a fuzz session with the built-in backends.
pub fn run_fuzz(config: &FuzzConfig) -> Result<FuzzReport> {
    let runner = SampleRunner::for_config(&config.run);
    let mut session = FuzzSession::new(config.seed);
    run_fuzz_in(config, &runner, &mut session)
}

/// Run a fuzz session with a given runner and session.
///
/// Generation errors abort the run. Failing samples are persisted and
/// recorded; IO errors while persisting become report warnings. Cancellation
/// is checked between samples.
pub fn run_fuzz_in(
    config: &FuzzConfig,
    runner: &SampleRunner,
    session: &mut FuzzSession,
) -> Result<FuzzReport> {
    info!(
        seed = config.seed,
        samples = config.sample_count,
        calls_per_sample = config.run.calls_per_sample,
        backends = ?runner.backend_names(),
        "starting fuzz run"
    );
    let start = Instant::now();
    let mut report = FuzzReport::new(config.seed, config.sample_count);

    for _ in 0..config.sample_count {
        if session.is_cancelled() {
            info!(completed = report.samples_run, "fuzz run cancelled");
            report.cancelled = true;
            break;
        }

        let iteration = session.iteration();
        let sample = session
            .generate_sample(&config.generator, &config.run)
            .with_context(|| format!("generating sample {iteration} (seed {})", config.seed))?;
        let fingerprint = sample.fingerprint();
        debug!(
            iteration,
            fingerprint = %fingerprint,
            functions = sample.program.functions.len(),
            nodes = sample.program.node_count(),
            "generated sample"
        );

        let result = runner.run(&sample);
        report.record(&result.outcome);
        report.warnings.extend(result.warnings.iter().cloned());
        if !result.outcome.is_failure() {
            continue;
        }

        warn!(
            iteration,
            fingerprint = %fingerprint,
            outcome = %result.outcome.summary(),
            "sample failed"
        );
        let artifact_path =
            match persist_failure(&config.artifact_dir, config.seed, iteration, &sample, &result) {
                Ok(path) => {
                    info!(path = %path.display(), "saved failing sample");
                    report.artifact_paths.push(path.clone());
                    Some(path)
                }
                Err(e) => {
                    warn!(iteration, error = %format!("{e:#}"), "failed to persist failing sample");
                    report
                        .warnings
                        .push(format!("iteration {iteration}: failed to persist sample: {e:#}"));
                    None
                }
            };
        report.failures.push(FailureRecord {
            iteration,
            fingerprint,
            outcome: result.outcome,
            artifact_path,
        });
        if config.stop_on_failure {
            info!(iteration, "stopping on first failure");
            break;
        }
    }

    report.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        samples_run = report.samples_run,
        passed = report.passed,
        mismatches = report.mismatches,
        crashes = report.crashes,
        elapsed_ms = report.elapsed_ms,
        "fuzz run finished"
    );
    Ok(report)
}

/// Run `shard_count` independent sessions in parallel and merge their reports.
///
/// Shard `k` is seeded with `seed + k`, runs `sample_count` samples, and
/// writes artifacts under `<artifact_dir>/shard-<k>/`. All shards observe
/// the same cancel flag.
pub fn run_shards(
    config: &FuzzConfig,
    shard_count: u64,
    cancel: Arc<AtomicBool>,
) -> Result<FuzzReport> {
    if shard_count == 0 {
        bail!("shard count must be at least 1");
    }
    let reports = (0..shard_count)
        .into_par_iter()
        .map(|k| {
            let shard = FuzzConfig {
                seed: config.seed.wrapping_add(k),
                artifact_dir: config.artifact_dir.join(format!("shard-{k}")),
                ..config.clone()
            };
            let runner = SampleRunner::for_config(&shard.run);
            let mut session = FuzzSession::with_cancel_flag(shard.seed, Arc::clone(&cancel));
            run_fuzz_in(&shard, &runner, &mut session).with_context(|| format!("shard {k}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut merged = FuzzReport::new(config.seed, 0);
    for report in reports {
        merged.merge(report);
    }
    Ok(merged)
}
