//! IR interpreter.

use super::{IrFunction, NodeId, Op, Package};
use crate::error::{check_args, Budget, EvalError, EvalLimits, EvalResult};
use crate::ops;
use crate::value::Value;

/// Evaluate the package entry point on `args`.
pub fn evaluate(package: &Package, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    let entry = package
        .entry()
        .ok_or_else(|| EvalError::UnknownFunction(crate::ast::ENTRY_POINT.to_string()))?;
    check_args(&entry.name, &entry.params, args)?;
    let mut budget = limits.start();
    eval_function(package, entry, args.to_vec(), &mut budget)
}

fn eval_function(
    package: &Package,
    function: &IrFunction,
    args: Vec<Value>,
    budget: &mut Budget,
) -> EvalResult<Value> {
    if args.len() != function.params.len() {
        return Err(EvalError::Arity {
            function: function.name.clone(),
            expected: function.params.len(),
            got: args.len(),
        });
    }
    let mut values: Vec<Value> = Vec::with_capacity(function.nodes.len());
    for node in &function.nodes {
        budget.tick()?;
        let value = match &node.op {
            Op::Param(index) => args
                .get(*index)
                .cloned()
                .ok_or_else(|| EvalError::Malformed(format!("no parameter {index}")))?,
            Op::Literal(value) => value.clone(),
            Op::Binary(op, a, b) => ops::binary(*op, fetch(&values, a)?, fetch(&values, b)?)?,
            Op::Unary(op, a) => ops::unary(*op, fetch(&values, a)?)?,
            Op::Cast {
                operand,
                signed,
                width,
            } => ops::cast(fetch(&values, operand)?, *signed, *width)?,
            Op::Slice {
                operand,
                start,
                width,
            } => ops::slice(fetch(&values, operand)?, *start, *width)?,
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                if ops::is_true(fetch(&values, cond)?)? {
                    fetch(&values, on_true)?.clone()
                } else {
                    fetch(&values, on_false)?.clone()
                }
            }
            Op::Tuple(items) => Value::Tuple(
                items
                    .iter()
                    .map(|i| fetch(&values, i).cloned())
                    .collect::<EvalResult<_>>()?,
            ),
            Op::TupleIndex(tuple, index) => {
                ops::tuple_index(fetch(&values, tuple)?.clone(), *index)?
            }
            Op::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|i| fetch(&values, i).cloned())
                    .collect::<EvalResult<_>>()?,
            ),
            Op::ArrayIndex(array, index) => {
                ops::array_index(fetch(&values, array)?.clone(), fetch(&values, index)?)?
            }
            Op::ArrayUpdate {
                array,
                index,
                value,
            } => ops::array_update(
                fetch(&values, array)?.clone(),
                fetch(&values, index)?,
                fetch(&values, value)?.clone(),
            )?,
            Op::Reduce(op, a) => ops::reduce(*op, fetch(&values, a)?)?,
            Op::Invoke { callee, args } => {
                let callee = package
                    .function(callee)
                    .ok_or_else(|| EvalError::UnknownFunction(callee.clone()))?;
                let args = args
                    .iter()
                    .map(|i| fetch(&values, i).cloned())
                    .collect::<EvalResult<Vec<_>>>()?;
                eval_function(package, callee, args, budget)?
            }
        };
        values.push(value);
    }
    values
        .into_iter()
        .nth(function.ret.0)
        .ok_or_else(|| EvalError::Malformed(format!("return node {} missing", function.ret)))
}

fn fetch<'v>(values: &'v [Value], id: &NodeId) -> EvalResult<&'v Value> {
    values
        .get(id.0)
        .ok_or_else(|| EvalError::Malformed(format!("forward reference to {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ENTRY_POINT};
    use crate::ir::{Node, Op};
    use crate::types::Type;

    fn package(nodes: Vec<Node>, ret: usize) -> Package {
        Package {
            functions: vec![IrFunction {
                name: ENTRY_POINT.into(),
                params: vec![Type::sbits(8), Type::sbits(8)],
                ret_ty: nodes[ret].ty.clone(),
                nodes,
                ret: NodeId(ret),
            }],
        }
    }

    #[test]
    fn test_rejects_argument_of_wrong_type() {
        let pkg = package(
            vec![Node {
                op: Op::Param(0),
                ty: Type::sbits(8),
            }],
            0,
        );
        let err = evaluate(
            &pkg,
            &[Value::ubits(16, 1), Value::sbits(8, 0)],
            &EvalLimits::unlimited(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Malformed(_)));
    }

    #[test]
    fn test_signed_division_by_zero() {
        let pkg = package(
            vec![
                Node {
                    op: Op::Param(0),
                    ty: Type::sbits(8),
                },
                Node {
                    op: Op::Param(1),
                    ty: Type::sbits(8),
                },
                Node {
                    op: Op::Binary(BinaryOp::Div, NodeId(0), NodeId(1)),
                    ty: Type::sbits(8),
                },
            ],
            2,
        );
        let out = evaluate(
            &pkg,
            &[Value::sbits(8, -5), Value::sbits(8, 0)],
            &EvalLimits::unlimited(),
        )
        .unwrap();
        assert_eq!(out, Value::sbits(8, -128));
    }

    #[test]
    fn test_select_and_tuple() {
        let pkg = package(
            vec![
                Node {
                    op: Op::Param(0),
                    ty: Type::sbits(8),
                },
                Node {
                    op: Op::Param(1),
                    ty: Type::sbits(8),
                },
                Node {
                    op: Op::Binary(BinaryOp::Lt, NodeId(0), NodeId(1)),
                    ty: Type::bool(),
                },
                Node {
                    op: Op::Select {
                        cond: NodeId(2),
                        on_true: NodeId(0),
                        on_false: NodeId(1),
                    },
                    ty: Type::sbits(8),
                },
                Node {
                    op: Op::Tuple(vec![NodeId(3), NodeId(2)]),
                    ty: Type::tuple(vec![Type::sbits(8), Type::bool()]),
                },
            ],
            4,
        );
        let out = evaluate(
            &pkg,
            &[Value::sbits(8, -3), Value::sbits(8, 2)],
            &EvalLimits::unlimited(),
        )
        .unwrap();
        assert_eq!(
            out,
            Value::Tuple(vec![Value::sbits(8, -3), Value::bool(true)])
        );
    }
}
