//! Evaluation backends.
//!
//! Each backend compiles a [`Program`] once into an [`Executable`] and then
//! evaluates it on any number of argument sets. The interpreter is the
//! reference; the others are compared against it.

use std::fmt;
use std::sync::Arc;

use dslx_frontend::codegen::{emit_verilog, simulate, Netlist};
use dslx_frontend::interp::Interpreter;
use dslx_frontend::ir::{self, Package};
use dslx_frontend::{check_program, EvalLimits, EvalResult, Program, Value};
use tracing::debug;

use crate::sample::RunConfig;

/// A file a backend wants kept next to the sample (e.g. lowered IR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The program could not be prepared for evaluation.
    Compile { backend: String, message: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Compile { backend, message } => {
                write!(f, "{backend}: compilation failed: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// A way of evaluating programs.
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError>;
}

/// A program prepared by an [`Evaluator`].
pub trait Executable: Send + Sync {
    /// Intermediate forms worth saving alongside a failing sample.
    fn artifacts(&self) -> Vec<Artifact> {
        Vec::new()
    }

    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value>;
}

/// Built-in backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Interpreter,
    Ir,
    IrOpt,
    Codegen,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Interpreter,
        BackendKind::Ir,
        BackendKind::IrOpt,
        BackendKind::Codegen,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Interpreter => "interpreter",
            BackendKind::Ir => "ir",
            BackendKind::IrOpt => "ir-opt",
            BackendKind::Codegen => "codegen",
        }
    }

    pub fn evaluator(self) -> Arc<dyn Evaluator> {
        match self {
            BackendKind::Interpreter => Arc::new(InterpreterBackend),
            BackendKind::Ir => Arc::new(IrBackend { optimize: false }),
            BackendKind::IrOpt => Arc::new(IrBackend { optimize: true }),
            BackendKind::Codegen => Arc::new(CodegenBackend),
        }
    }
}

/// Reference backend followed by the backends compared against it.
pub fn backends_for(config: &RunConfig) -> (Arc<dyn Evaluator>, Vec<Arc<dyn Evaluator>>) {
    let mut others = vec![BackendKind::Ir.evaluator(), BackendKind::IrOpt.evaluator()];
    if config.codegen {
        others.push(BackendKind::Codegen.evaluator());
    }
    (BackendKind::Interpreter.evaluator(), others)
}

fn compile_error(backend: &str, message: impl fmt::Display) -> BackendError {
    BackendError::Compile {
        backend: backend.to_string(),
        message: message.to_string(),
    }
}

fn checked(backend: &str, program: &Program) -> Result<(), BackendError> {
    check_program(program).map_err(|e| compile_error(backend, e))
}

// ---- interpreter ----

struct InterpreterBackend;

struct InterpreterExecutable {
    program: Program,
}

impl Evaluator for InterpreterBackend {
    fn name(&self) -> &str {
        BackendKind::Interpreter.name()
    }

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError> {
        checked(self.name(), program)?;
        Ok(Box::new(InterpreterExecutable {
            program: program.clone(),
        }))
    }
}

impl Executable for InterpreterExecutable {
    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        Interpreter::new(&self.program).run(args, limits)
    }
}

// ---- IR ----

struct IrBackend {
    optimize: bool,
}

struct IrExecutable {
    package: Package,
    file_name: &'static str,
}

impl Evaluator for IrBackend {
    fn name(&self) -> &str {
        if self.optimize {
            BackendKind::IrOpt.name()
        } else {
            BackendKind::Ir.name()
        }
    }

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError> {
        checked(self.name(), program)?;
        let package = ir::lower_program(program).map_err(|e| compile_error(self.name(), e))?;
        if !self.optimize {
            return Ok(Box::new(IrExecutable {
                package,
                file_name: "ir.txt",
            }));
        }
        let (optimized, stats) = ir::optimize(&package);
        debug!(
            before = package.node_count(),
            after = optimized.node_count(),
            folded = stats.folded,
            simplified = stats.simplified,
            deduplicated = stats.deduplicated,
            removed = stats.removed,
            "optimized IR"
        );
        Ok(Box::new(IrExecutable {
            package: optimized,
            file_name: "ir_opt.txt",
        }))
    }
}

impl Executable for IrExecutable {
    fn artifacts(&self) -> Vec<Artifact> {
        vec![Artifact {
            file_name: self.file_name.to_string(),
            contents: self.package.to_string(),
        }]
    }

    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        ir::evaluate(&self.package, args, limits)
    }
}

// ---- codegen ----

struct CodegenBackend;

struct CodegenExecutable {
    netlist: Netlist,
}

impl Evaluator for CodegenBackend {
    fn name(&self) -> &str {
        BackendKind::Codegen.name()
    }

    fn compile(&self, program: &Program) -> Result<Box<dyn Executable>, BackendError> {
        checked(self.name(), program)?;
        let package = ir::lower_program(program).map_err(|e| compile_error(self.name(), e))?;
        let (optimized, _) = ir::optimize(&package);
        let netlist = Netlist::from_package(&optimized).map_err(|e| compile_error(self.name(), e))?;
        debug!(cells = netlist.cell_count(), "generated netlist");
        Ok(Box::new(CodegenExecutable { netlist }))
    }
}

impl Executable for CodegenExecutable {
    fn artifacts(&self) -> Vec<Artifact> {
        vec![Artifact {
            file_name: "netlist.v".to_string(),
            contents: emit_verilog(&self.netlist),
        }]
    }

    fn evaluate(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        simulate(&self.netlist, args, limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslx_frontend::{BinaryOp, Expr, Function, Param, Type, ENTRY_POINT};

    fn add_program() -> Program {
        Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![
                    Param {
                        name: "a".into(),
                        ty: Type::ubits(8),
                    },
                    Param {
                        name: "b".into(),
                        ty: Type::ubits(8),
                    },
                ],
                ret: Type::ubits(8),
                body: Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::var("b")),
            }],
        }
    }

    #[test]
    fn test_backend_kind_names() {
        let names: Vec<&str> = BackendKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["interpreter", "ir", "ir-opt", "codegen"]);
        for kind in BackendKind::ALL {
            assert_eq!(kind.evaluator().name(), kind.name());
        }
    }

    #[test]
    fn test_all_backends_agree_on_wrapping_add() {
        let program = add_program();
        let args = [Value::ubits(8, 200), Value::ubits(8, 100)];
        for kind in BackendKind::ALL {
            let exe = kind.evaluator().compile(&program).unwrap();
            assert_eq!(
                exe.evaluate(&args, &EvalLimits::unlimited()).unwrap(),
                Value::ubits(8, 44),
                "{}",
                kind.name()
            );
        }
    }

    #[test]
    fn test_backend_artifacts() {
        let program = add_program();
        let names = |kind: BackendKind| -> Vec<String> {
            kind.evaluator()
                .compile(&program)
                .unwrap()
                .artifacts()
                .into_iter()
                .map(|a| a.file_name)
                .collect()
        };
        assert!(names(BackendKind::Interpreter).is_empty());
        assert_eq!(names(BackendKind::Ir), vec!["ir.txt"]);
        assert_eq!(names(BackendKind::IrOpt), vec!["ir_opt.txt"]);
        assert_eq!(names(BackendKind::Codegen), vec!["netlist.v"]);
    }

    #[test]
    fn test_ill_typed_program_fails_to_compile() {
        let mut program = add_program();
        program.functions[0].ret = Type::ubits(9);
        let err = BackendKind::Ir.evaluator().compile(&program).err().unwrap();
        assert!(matches!(err, BackendError::Compile { .. }));
    }

    #[test]
    fn test_backends_for_config() {
        let (reference, others) = backends_for(&RunConfig::default());
        assert_eq!(reference.name(), "interpreter");
        assert_eq!(others.len(), 2);
        let (_, others) = backends_for(&RunConfig {
            codegen: true,
            ..RunConfig::default()
        });
        assert_eq!(others.last().unwrap().name(), "codegen");
    }
}
