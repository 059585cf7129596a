//! Sample runner: evaluate one sample on every backend and compare.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dslx_frontend::{EvalError, EvalLimits};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::artifacts::write_sample_files;
use crate::backend::{backends_for, Artifact, Evaluator};
use crate::report::{compare, BackendOutput, BackendResult, CallResult, ComparisonOutcome};
use crate::sample::{RunConfig, Sample};

/// Everything produced by running one sample.
#[derive(Debug, Clone)]
pub struct SampleResult {
    pub outcome: ComparisonOutcome,
    pub reference: BackendResult,
    pub others: Vec<BackendResult>,
    /// Intermediate forms from every backend that compiled.
    pub artifacts: Vec<Artifact>,
    /// Kept per-sample directory when `save_temps` is on.
    pub temp_dir: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl SampleResult {
    pub fn backend_results(&self) -> impl Iterator<Item = &BackendResult> {
        std::iter::once(&self.reference).chain(&self.others)
    }
}

/// Runs samples against a reference backend and the backends compared to it.
pub struct SampleRunner {
    reference: Arc<dyn Evaluator>,
    others: Vec<Arc<dyn Evaluator>>,
}

impl SampleRunner {
    /// The built-in backend set for `config` (codegen only when enabled).
    pub fn for_config(config: &RunConfig) -> Self {
        let (reference, others) = backends_for(config);
        Self { reference, others }
    }

    /// Custom backends, e.g. test doubles.
    pub fn with_backends(reference: Arc<dyn Evaluator>, others: Vec<Arc<dyn Evaluator>>) -> Self {
        Self { reference, others }
    }

    pub fn backend_names(&self) -> Vec<String> {
        std::iter::once(&self.reference)
            .chain(&self.others)
            .map(|b| b.name().to_string())
            .collect()
    }

    /// Evaluate every argument set on every backend and compare the results.
    ///
    /// Never fails: backend problems become [`ComparisonOutcome::BackendCrash`]
    /// and temp-file problems become warnings.
    pub fn run(&self, sample: &Sample) -> SampleResult {
        let limits = match sample.run_config.timeout_ms {
            Some(ms) => EvalLimits::with_timeout(Duration::from_millis(ms)),
            None => EvalLimits::unlimited(),
        };

        let run_one = |backend: &Arc<dyn Evaluator>| run_backend(backend.as_ref(), sample, &limits);
        let (reference, others) = if sample.run_config.parallel_backends {
            rayon::join(
                || run_one(&self.reference),
                || self.others.par_iter().map(run_one).collect::<Vec<_>>(),
            )
        } else {
            (
                run_one(&self.reference),
                self.others.iter().map(run_one).collect(),
            )
        };

        let mut artifacts = reference.1;
        let mut other_results = Vec::with_capacity(others.len());
        for (result, backend_artifacts) in others {
            other_results.push(result);
            artifacts.extend(backend_artifacts);
        }

        let outcome = compare(&reference.0, &other_results);
        debug!(outcome = %outcome.summary(), "compared backends");

        let mut result = SampleResult {
            outcome,
            reference: reference.0,
            others: other_results,
            artifacts,
            temp_dir: None,
            warnings: Vec::new(),
        };
        if sample.run_config.save_temps {
            match save_temps(sample, &result) {
                Ok(dir) => result.temp_dir = Some(dir),
                Err(e) => {
                    warn!(error = %e, "failed to save sample temp files");
                    result.warnings.push(format!("save-temps: {e:#}"));
                }
            }
        }
        result
    }
}

fn run_backend(
    backend: &dyn Evaluator,
    sample: &Sample,
    limits: &EvalLimits,
) -> (BackendResult, Vec<Artifact>) {
    let name = backend.name().to_string();
    let compiled = within_limit(limits, || backend.compile(&sample.program));
    let executable = match compiled {
        Ok(Ok(executable)) => executable,
        Ok(Err(e)) => return (compile_failed(name, e.to_string()), Vec::new()),
        Err(timeout) => {
            warn!(backend = %name, "compilation exceeded the timeout");
            return (
                compile_failed(name, format!("compilation: {timeout}")),
                Vec::new(),
            );
        }
    };
    let calls = sample
        .args_batch
        .iter()
        .map(
            |args| match within_limit(limits, || executable.evaluate(args.values(), limits)) {
                Ok(Ok(value)) => CallResult::Value { value },
                Ok(Err(error)) | Err(error) => CallResult::Error {
                    error: error.to_string(),
                },
            },
        )
        .collect();
    (
        BackendResult {
            backend: name,
            output: BackendOutput::Evaluated { calls },
        },
        executable.artifacts(),
    )
}

/// Run `f` and turn a wall-clock overrun into [`EvalError::Timeout`].
///
/// Built-in backends tick their own budget and stop early; a backend that
/// blocks is measured here once it returns.
fn within_limit<T>(limits: &EvalLimits, f: impl FnOnce() -> T) -> Result<T, EvalError> {
    let start = Instant::now();
    let value = f();
    match limits.timeout {
        Some(limit) if start.elapsed() > limit => Err(EvalError::Timeout {
            limit_ms: limit.as_millis() as u64,
        }),
        _ => Ok(value),
    }
}

fn compile_failed(backend: String, error: String) -> BackendResult {
    BackendResult {
        backend,
        output: BackendOutput::CompileFailed { error },
    }
}

fn save_temps(sample: &Sample, result: &SampleResult) -> anyhow::Result<PathBuf> {
    let dir = tempfile::Builder::new().prefix("dslx-fuzz-").tempdir()?;
    write_sample_files(dir.path(), sample, result)?;
    Ok(dir.keep())
}
