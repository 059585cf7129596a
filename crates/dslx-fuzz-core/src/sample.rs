//! Samples: a program plus the arguments it is run on.

use std::fmt;

use dslx_frontend::{Program, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Arguments for one invocation of the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentSet(pub Vec<Value>);

impl ArgumentSet {
    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl fmt::Display for ArgumentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// How a sample is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Also run the codegen + netlist simulation backend.
    pub codegen: bool,
    /// Keep a per-sample temp directory with sources and backend artifacts.
    pub save_temps: bool,
    /// Number of argument sets generated per sample.
    pub calls_per_sample: usize,
    /// Per-evaluation wall-clock limit.
    pub timeout_ms: Option<u64>,
    /// Run the backends of one sample concurrently.
    pub parallel_backends: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            codegen: false,
            save_temps: false,
            calls_per_sample: 1,
            timeout_ms: None,
            parallel_backends: false,
        }
    }
}

/// A generated (or replayed) test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub program: Program,
    pub args_batch: Vec<ArgumentSet>,
    pub run_config: RunConfig,
}

impl Sample {
    /// DSLX-style source text of the program.
    pub fn source(&self) -> String {
        self.program.to_string()
    }

    /// SHA-256 of the source text, hex encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.source().as_bytes()))
    }

    /// Argument sets, one per line.
    pub fn args_text(&self) -> String {
        self.args_batch
            .iter()
            .map(|args| format!("{args}\n"))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Sample> {
        serde_json::from_str(json)
    }
}
