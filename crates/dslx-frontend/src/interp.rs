//! Tree-walking interpreter. This is the reference semantics every other
//! evaluation path is compared against.

use tracing::trace;

use crate::ast::{Expr, Function, Program, ENTRY_POINT};
use crate::error::{check_args, Budget, EvalError, EvalLimits, EvalResult};
use crate::ops;
use crate::value::Value;

pub struct Interpreter<'p> {
    program: &'p Program,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    /// Evaluate the entry point on `args`.
    pub fn run(&self, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
        let entry = self
            .program
            .function(ENTRY_POINT)
            .ok_or_else(|| EvalError::UnknownFunction(ENTRY_POINT.to_string()))?;
        check_args(ENTRY_POINT, &entry.param_types(), args)?;
        let mut budget = limits.start();
        let value = self.call(ENTRY_POINT, args.to_vec(), &mut budget)?;
        trace!(steps = budget.steps(), "interpreter finished");
        Ok(value)
    }

    fn call(&self, name: &str, args: Vec<Value>, budget: &mut Budget) -> EvalResult<Value> {
        let function = self
            .program
            .function(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        if function.params.len() != args.len() {
            return Err(EvalError::Arity {
                function: name.to_string(),
                expected: function.params.len(),
                got: args.len(),
            });
        }
        let mut frame = Frame::new(function, args);
        self.eval(&function.body, &mut frame, budget)
    }

    fn eval(&self, expr: &Expr, frame: &mut Frame, budget: &mut Budget) -> EvalResult<Value> {
        budget.tick()?;
        match expr {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Var { name } => frame.lookup(name),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs, frame, budget)?;
                let r = self.eval(rhs, frame, budget)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Unary { op, operand } => ops::unary(*op, &self.eval(operand, frame, budget)?),
            Expr::Cast { operand, to } => {
                let (signed, width) = to
                    .as_bits()
                    .ok_or_else(|| EvalError::Malformed(format!("cast to {to}")))?;
                ops::cast(&self.eval(operand, frame, budget)?, signed, width)
            }
            Expr::Slice {
                operand,
                start,
                width,
            } => ops::slice(&self.eval(operand, frame, budget)?, *start, *width),
            Expr::Ternary {
                cond,
                on_true,
                on_false,
            } => {
                if ops::is_true(&self.eval(cond, frame, budget)?)? {
                    self.eval(on_true, frame, budget)
                } else {
                    self.eval(on_false, frame, budget)
                }
            }
            Expr::Let {
                name, value, body, ..
            } => {
                let bound = self.eval(value, frame, budget)?;
                frame.push(name, bound);
                let result = self.eval(body, frame, budget);
                frame.pop();
                result
            }
            Expr::Tuple { elements } => Ok(Value::Tuple(self.eval_all(elements, frame, budget)?)),
            Expr::TupleIndex { tuple, index } => {
                ops::tuple_index(self.eval(tuple, frame, budget)?, *index)
            }
            Expr::Array { elements } => Ok(Value::Array(self.eval_all(elements, frame, budget)?)),
            Expr::ArrayIndex { array, index } => {
                let array = self.eval(array, frame, budget)?;
                let index = self.eval(index, frame, budget)?;
                ops::array_index(array, &index)
            }
            Expr::ArrayUpdate {
                array,
                index,
                value,
            } => {
                let array = self.eval(array, frame, budget)?;
                let index = self.eval(index, frame, budget)?;
                let value = self.eval(value, frame, budget)?;
                ops::array_update(array, &index, value)
            }
            Expr::Reduce { op, operand } => ops::reduce(*op, &self.eval(operand, frame, budget)?),
            Expr::Invoke { callee, args } => {
                let args = self.eval_all(args, frame, budget)?;
                self.call(callee, args, budget)
            }
        }
    }

    fn eval_all(
        &self,
        exprs: &[Expr],
        frame: &mut Frame,
        budget: &mut Budget,
    ) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, frame, budget)).collect()
    }
}

/// Lexical scope of one function activation.
struct Frame {
    bindings: Vec<(String, Value)>,
}

impl Frame {
    fn new(function: &Function, args: Vec<Value>) -> Self {
        let bindings = function
            .params
            .iter()
            .map(|p| p.name.clone())
            .zip(args)
            .collect();
        Self { bindings }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| EvalError::UnboundName(name.to_string()))
    }

    fn push(&mut self, name: &str, value: Value) {
        self.bindings.push((name.to_string(), value));
    }

    fn pop(&mut self) {
        self.bindings.pop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ast::{BinaryOp, Param};
    use crate::types::Type;

    fn param(name: &str, ty: Type) -> Param {
        Param {
            name: name.into(),
            ty,
        }
    }

    /// `f0(a) = a * a`, `main(x, y) = f0(x) + y`
    fn square_plus() -> Program {
        Program {
            functions: vec![
                Function {
                    name: "f0".into(),
                    params: vec![param("a", Type::ubits(8))],
                    ret: Type::ubits(8),
                    body: Expr::binary(BinaryOp::Mul, Expr::var("a"), Expr::var("a")),
                },
                Function {
                    name: ENTRY_POINT.into(),
                    params: vec![param("x", Type::ubits(8)), param("y", Type::ubits(8))],
                    ret: Type::ubits(8),
                    body: Expr::binary(
                        BinaryOp::Add,
                        Expr::Invoke {
                            callee: "f0".into(),
                            args: vec![Expr::var("x")],
                        },
                        Expr::var("y"),
                    ),
                },
            ],
        }
    }

    #[test]
    fn test_invoke_and_wraparound() {
        let program = square_plus();
        let interp = Interpreter::new(&program);
        let out = interp
            .run(
                &[Value::ubits(8, 16), Value::ubits(8, 3)],
                &EvalLimits::unlimited(),
            )
            .unwrap();
        assert_eq!(out, Value::ubits(8, 3));
    }

    #[test]
    fn test_let_shadowing() {
        let body = Expr::Let {
            name: "x".into(),
            ty: Type::ubits(4),
            value: Box::new(Expr::literal(Value::ubits(4, 1))),
            body: Box::new(Expr::Let {
                name: "x".into(),
                ty: Type::ubits(4),
                value: Box::new(Expr::binary(
                    BinaryOp::Add,
                    Expr::var("x"),
                    Expr::literal(Value::ubits(4, 5)),
                )),
                body: Box::new(Expr::var("x")),
            }),
        };
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![],
                ret: Type::ubits(4),
                body,
            }],
        };
        let out = Interpreter::new(&program)
            .run(&[], &EvalLimits::unlimited())
            .unwrap();
        assert_eq!(out, Value::ubits(4, 6));
    }

    #[test]
    fn test_arity_mismatch() {
        let program = square_plus();
        let err = Interpreter::new(&program)
            .run(&[Value::ubits(8, 1)], &EvalLimits::unlimited())
            .unwrap_err();
        assert!(matches!(err, EvalError::Arity { expected: 2, got: 1, .. }));
    }

    #[test]
    fn test_argument_wider_than_parameter() {
        let program = square_plus();
        let err = Interpreter::new(&program)
            .run(
                &[Value::ubits(16, 1), Value::ubits(8, 1)],
                &EvalLimits::unlimited(),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::Malformed(_)));
    }

    #[test]
    fn test_timeout() {
        let mut body = Expr::var("x");
        for _ in 0..200 {
            body = Expr::binary(BinaryOp::Add, body, Expr::var("x"));
        }
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![param("x", Type::ubits(8))],
                ret: Type::ubits(8),
                body,
            }],
        };
        let err = Interpreter::new(&program)
            .run(
                &[Value::ubits(8, 1)],
                &EvalLimits::with_timeout(Duration::ZERO),
            )
            .unwrap_err();
        assert!(matches!(err, EvalError::Timeout { .. }));
    }
}
