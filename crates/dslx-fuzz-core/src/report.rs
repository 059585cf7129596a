//! Per-sample results, comparison outcomes and the session report.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dslx_frontend::Value;
use serde::{Deserialize, Serialize};

/// Result of one call on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResult {
    Value { value: Value },
    Error { error: String },
}

/// Everything one backend produced for a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendOutput {
    CompileFailed { error: String },
    Evaluated { calls: Vec<CallResult> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendResult {
    pub backend: String,
    pub output: BackendOutput,
}

impl BackendResult {
    /// Text form written to `results/<backend>.txt`, one line per call.
    pub fn results_text(&self) -> String {
        match &self.output {
            BackendOutput::CompileFailed { error } => format!("compile error: {error}\n"),
            BackendOutput::Evaluated { calls } => calls
                .iter()
                .map(|call| match call {
                    CallResult::Value { value } => format!("{value}\n"),
                    CallResult::Error { error } => format!("error: {error}\n"),
                })
                .collect(),
        }
    }
}

/// Verdict for one sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComparisonOutcome {
    Match,
    Mismatch {
        reference: String,
        backend: String,
        /// First call whose results differ.
        call_index: usize,
        expected: String,
        actual: String,
        /// Every call index that differs, in order.
        mismatched_calls: Vec<usize>,
    },
    BackendCrash {
        backend: String,
        /// `None` when the backend failed before evaluating anything.
        call_index: Option<usize>,
        error: String,
    },
}

impl ComparisonOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, ComparisonOutcome::Match)
    }

    pub fn summary(&self) -> String {
        match self {
            ComparisonOutcome::Match => "match".to_string(),
            ComparisonOutcome::Mismatch {
                reference,
                backend,
                call_index,
                expected,
                actual,
                ..
            } => format!(
                "mismatch at call #{call_index}: {reference} = {expected}, {backend} = {actual}"
            ),
            ComparisonOutcome::BackendCrash {
                backend,
                call_index: Some(index),
                error,
            } => format!("{backend} crashed at call #{index}: {error}"),
            ComparisonOutcome::BackendCrash {
                backend, error, ..
            } => format!("{backend} crashed: {error}"),
        }
    }
}

fn call_text(call: &CallResult) -> String {
    match call {
        CallResult::Value { value } => value.to_string(),
        CallResult::Error { error } => format!("error: {error}"),
    }
}

fn first_crash(result: &BackendResult) -> Option<ComparisonOutcome> {
    match &result.output {
        BackendOutput::CompileFailed { error } => Some(ComparisonOutcome::BackendCrash {
            backend: result.backend.clone(),
            call_index: None,
            error: error.clone(),
        }),
        BackendOutput::Evaluated { calls } => {
            calls.iter().enumerate().find_map(|(index, call)| match call {
                CallResult::Error { error } => Some(ComparisonOutcome::BackendCrash {
                    backend: result.backend.clone(),
                    call_index: Some(index),
                    error: error.clone(),
                }),
                CallResult::Value { .. } => None,
            })
        }
    }
}

/// Compare every backend against the reference.
///
/// Crashes take precedence over mismatches (reference first, then the other
/// backends in order). Otherwise the first backend whose results differ
/// yields a mismatch carrying every differing call index.
pub fn compare(reference: &BackendResult, others: &[BackendResult]) -> ComparisonOutcome {
    if let Some(crash) = std::iter::once(reference).chain(others).find_map(first_crash) {
        return crash;
    }
    let BackendOutput::Evaluated { calls: expected } = &reference.output else {
        return ComparisonOutcome::Match;
    };
    for other in others {
        let BackendOutput::Evaluated { calls: actual } = &other.output else {
            continue;
        };
        let mismatched_calls: Vec<usize> = expected
            .iter()
            .zip(actual)
            .enumerate()
            .filter(|(_, (e, a))| e != a)
            .map(|(i, _)| i)
            .collect();
        if let Some(&call_index) = mismatched_calls.first() {
            return ComparisonOutcome::Mismatch {
                reference: reference.backend.clone(),
                backend: other.backend.clone(),
                call_index,
                expected: call_text(&expected[call_index]),
                actual: call_text(&actual[call_index]),
                mismatched_calls,
            };
        }
    }
    ComparisonOutcome::Match
}

/// One failing sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub iteration: u64,
    pub fingerprint: String,
    pub outcome: ComparisonOutcome,
    /// Persisted crasher directory, if writing it succeeded.
    pub artifact_path: Option<PathBuf>,
}

/// Summary of a fuzz session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzReport {
    pub seed: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub samples_requested: u64,
    pub samples_run: u64,
    pub samples_failed: u64,
    pub passed: u64,
    pub mismatches: u64,
    pub crashes: u64,
    /// Stopped early by cancellation.
    pub cancelled: bool,
    pub failures: Vec<FailureRecord>,
    pub artifact_paths: Vec<PathBuf>,
    /// Non-fatal problems, e.g. artifacts that could not be written.
    pub warnings: Vec<String>,
}

impl FuzzReport {
    pub fn new(seed: u64, samples_requested: u64) -> Self {
        Self {
            seed,
            started_at: Utc::now(),
            elapsed_ms: 0,
            samples_requested,
            samples_run: 0,
            samples_failed: 0,
            passed: 0,
            mismatches: 0,
            crashes: 0,
            cancelled: false,
            failures: Vec::new(),
            artifact_paths: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Count one sample's outcome.
    pub fn record(&mut self, outcome: &ComparisonOutcome) {
        self.samples_run += 1;
        match outcome {
            ComparisonOutcome::Match => self.passed += 1,
            ComparisonOutcome::Mismatch { .. } => {
                self.samples_failed += 1;
                self.mismatches += 1;
            }
            ComparisonOutcome::BackendCrash { .. } => {
                self.samples_failed += 1;
                self.crashes += 1;
            }
        }
    }

    /// Fold a shard's report into this one. Elapsed time is the maximum.
    pub fn merge(&mut self, other: FuzzReport) {
        self.started_at = self.started_at.min(other.started_at);
        self.elapsed_ms = self.elapsed_ms.max(other.elapsed_ms);
        self.samples_requested += other.samples_requested;
        self.samples_run += other.samples_run;
        self.samples_failed += other.samples_failed;
        self.passed += other.passed;
        self.mismatches += other.mismatches;
        self.crashes += other.crashes;
        self.cancelled |= other.cancelled;
        self.failures.extend(other.failures);
        self.artifact_paths.extend(other.artifact_paths);
        self.warnings.extend(other.warnings);
    }

    pub fn is_clean(&self) -> bool {
        self.samples_failed == 0
    }
}
