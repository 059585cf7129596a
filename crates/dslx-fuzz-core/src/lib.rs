//! Differential fuzzing for the DSLX-style frontend.
//!
//! A [`FuzzSession`] draws random programs ([`AstGenerator`]) and argument
//! sets ([`ArgumentGenerator`]) from one seeded RNG. The [`SampleRunner`]
//! evaluates each [`Sample`] on the reference interpreter and on every other
//! enabled backend, and [`run_fuzz`] persists any sample whose backends
//! disagree or crash.
//!
//! # Example
//!
//! ```ignore
//! use dslx_fuzz_core::{run_fuzz, FuzzConfig};
//!
//! let config = FuzzConfig::new(0, 100, "artifacts");
//! let report = run_fuzz(&config)?;
//! assert!(report.is_clean());
//! ```

pub mod artifacts;
pub mod backend;
pub mod driver;
pub mod generator;
pub mod options;
pub mod report;
pub mod runner;
pub mod sample;
pub mod sanity;
pub mod session;
pub mod value_gen;

pub use artifacts::{artifact_dir_name, load_sample, persist_failure};
pub use backend::{backends_for, Artifact, BackendError, BackendKind, Evaluator, Executable};
pub use driver::{run_fuzz, run_fuzz_in, run_shards, FuzzConfig};
pub use generator::{AstGenerator, GenerationError};
pub use options::{GeneratorOptions, GeneratorOptionsBuilder, OptionsError, MAX_GENERATOR_DEPTH};
pub use report::{
    compare, BackendOutput, BackendResult, CallResult, ComparisonOutcome, FailureRecord,
    FuzzReport,
};
pub use runner::{SampleResult, SampleRunner};
pub use sample::{ArgumentSet, RunConfig, Sample};
pub use sanity::{run_sanity, sanity_config};
pub use session::FuzzSession;
pub use value_gen::ArgumentGenerator;
