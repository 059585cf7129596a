//! Evaluation errors and execution limits shared by every backend.

use std::fmt;
use std::time::{Duration, Instant};

use crate::types::Type;
use crate::value::Value;

/// Runtime or lowering failure inside a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Evaluation exceeded its wall-clock limit.
    Timeout { limit_ms: u64 },
    /// A variable was referenced outside of its scope.
    UnboundName(String),
    /// Invocation of a function the program does not define.
    UnknownFunction(String),
    /// Wrong number of arguments for a function.
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },
    /// An operand had a shape the operation cannot accept.
    Malformed(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Timeout { limit_ms } => {
                write!(f, "TIMEOUT: evaluation exceeded {limit_ms}ms")
            }
            EvalError::UnboundName(name) => write!(f, "unbound name '{name}'"),
            EvalError::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            EvalError::Arity {
                function,
                expected,
                got,
            } => write!(
                f,
                "function '{function}' expects {expected} argument(s), got {got}"
            ),
            EvalError::Malformed(message) => write!(f, "malformed operation: {message}"),
        }
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;

/// Check entry-point arguments against the declared parameter types.
pub fn check_args(function: &str, params: &[Type], args: &[Value]) -> EvalResult<()> {
    if args.len() != params.len() {
        return Err(EvalError::Arity {
            function: function.to_string(),
            expected: params.len(),
            got: args.len(),
        });
    }
    for (index, (arg, ty)) in args.iter().zip(params).enumerate() {
        if !arg.conforms_to(ty) {
            return Err(EvalError::Malformed(format!(
                "argument {index} of '{function}' expects {ty}, got {arg}"
            )));
        }
    }
    Ok(())
}

/// Limits applied to a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalLimits {
    pub timeout: Option<Duration>,
}

impl EvalLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Start the clock for one evaluation.
    pub fn start(&self) -> Budget {
        Budget {
            deadline: self.timeout.map(|t| (Instant::now() + t, t)),
            steps: 0,
        }
    }
}

/// Running budget; backends call [`Budget::tick`] once per evaluated node.
#[derive(Debug)]
pub struct Budget {
    deadline: Option<(Instant, Duration)>,
    steps: u64,
}

/// The clock is only read every this many steps.
const CLOCK_INTERVAL: u64 = 64;

impl Budget {
    pub fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if let Some((deadline, limit)) = self.deadline {
            if self.steps % CLOCK_INTERVAL == 0 && Instant::now() >= deadline {
                return Err(EvalError::Timeout {
                    limit_ms: limit.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
