//! A compact DSLX-style frontend over fixed-width bit vectors.
//!
//! Provides four independent ways to evaluate a program:
//!
//! - [`interp::Interpreter`]: tree-walking reference interpreter
//! - [`ir::evaluate`]: interpreter over the lowered dataflow IR
//! - [`ir::optimize`] followed by [`ir::evaluate`]
//! - [`codegen::Netlist`] + [`codegen::simulate`]: flattened bit-level netlist
//!
//! All of them take an [`EvalLimits`] and report failures as [`EvalError`].

pub mod ast;
pub mod codegen;
pub mod error;
pub mod interp;
pub mod ir;
pub mod ops;
mod printer;
pub mod typecheck;
pub mod types;
pub mod value;

pub use ast::{BinaryOp, Expr, Function, Param, Program, ReduceOp, UnaryOp, ENTRY_POINT};
pub use error::{EvalError, EvalLimits, EvalResult};
pub use typecheck::{check_program, TypeError};
pub use types::{Type, MAX_BITS_WIDTH};
pub use value::{Bits, Value};
