//! dslx-fuzz
//!
//! Differential fuzzing for a DSLX-style hardware description language:
//!
//! - **Frontend**: AST, type checker, interpreter, IR and netlist codegen ([`frontend`])
//! - **Fuzzer**: program/argument generation, multi-backend comparison and
//!   crasher capture ([`fuzz`])
//!
//! The `dslx-fuzz` binary drives both from the command line.

pub mod paths;

pub use dslx_frontend as frontend;
pub use dslx_fuzz_core as fuzz;
