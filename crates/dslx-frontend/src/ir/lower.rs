//! AST to IR lowering. Input programs must already pass the type checker.

use std::collections::HashMap;
use std::fmt;

use super::{IrFunction, Node, NodeId, Op, Package};
use crate::ast::{BinaryOp, Expr, Function, Program};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowerError {
    pub function: String,
    pub message: String,
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to lower '{}': {}", self.function, self.message)
    }
}

impl std::error::Error for LowerError {}

pub fn lower_program(program: &Program) -> Result<Package, LowerError> {
    let mut signatures: HashMap<String, Type> = HashMap::new();
    let mut functions = Vec::with_capacity(program.functions.len());
    for function in &program.functions {
        let lowered = lower_function(function, &signatures).map_err(|message| LowerError {
            function: function.name.clone(),
            message,
        })?;
        signatures.insert(function.name.clone(), function.ret.clone());
        functions.push(lowered);
    }
    Ok(Package { functions })
}

fn lower_function(
    function: &Function,
    signatures: &HashMap<String, Type>,
) -> Result<IrFunction, String> {
    let mut builder = Builder {
        signatures,
        nodes: Vec::new(),
        scope: Vec::new(),
    };
    for (index, param) in function.params.iter().enumerate() {
        let id = builder.add(Op::Param(index), param.ty.clone());
        builder.scope.push((param.name.clone(), id));
    }
    let ret = builder.lower(&function.body)?;
    Ok(IrFunction {
        name: function.name.clone(),
        params: function.param_types(),
        ret_ty: function.ret.clone(),
        nodes: builder.nodes,
        ret,
    })
}

struct Builder<'a> {
    signatures: &'a HashMap<String, Type>,
    nodes: Vec<Node>,
    scope: Vec<(String, NodeId)>,
}

impl Builder<'_> {
    fn add(&mut self, op: Op, ty: Type) -> NodeId {
        self.nodes.push(Node { op, ty });
        NodeId(self.nodes.len() - 1)
    }

    fn ty(&self, id: NodeId) -> &Type {
        &self.nodes[id.0].ty
    }

    fn lower_all(&mut self, exprs: &[Expr]) -> Result<Vec<NodeId>, String> {
        exprs.iter().map(|e| self.lower(e)).collect()
    }

    fn lower(&mut self, expr: &Expr) -> Result<NodeId, String> {
        let id = match expr {
            Expr::Literal { value } => self.add(Op::Literal(value.clone()), value.ty()),
            Expr::Var { name } => self
                .scope
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id)
                .ok_or_else(|| format!("unbound name '{name}'"))?,
            Expr::Binary { op, lhs, rhs } => {
                let a = self.lower(lhs)?;
                let b = self.lower(rhs)?;
                let ty = match op {
                    BinaryOp::Concat => {
                        let width = self.width(a)? + self.width(b)?;
                        Type::ubits(width)
                    }
                    op if op.is_comparison() => Type::bool(),
                    _ => self.ty(a).clone(),
                };
                self.add(Op::Binary(*op, a, b), ty)
            }
            Expr::Unary { op, operand } => {
                let a = self.lower(operand)?;
                let ty = self.ty(a).clone();
                self.add(Op::Unary(*op, a), ty)
            }
            Expr::Cast { operand, to } => {
                let a = self.lower(operand)?;
                let (signed, width) = to.as_bits().ok_or_else(|| format!("cast to {to}"))?;
                self.add(
                    Op::Cast {
                        operand: a,
                        signed,
                        width,
                    },
                    to.clone(),
                )
            }
            Expr::Slice {
                operand,
                start,
                width,
            } => {
                let a = self.lower(operand)?;
                self.add(
                    Op::Slice {
                        operand: a,
                        start: *start,
                        width: *width,
                    },
                    Type::ubits(*width),
                )
            }
            Expr::Ternary {
                cond,
                on_true,
                on_false,
            } => {
                let cond = self.lower(cond)?;
                let on_true = self.lower(on_true)?;
                let on_false = self.lower(on_false)?;
                let ty = self.ty(on_true).clone();
                self.add(
                    Op::Select {
                        cond,
                        on_true,
                        on_false,
                    },
                    ty,
                )
            }
            Expr::Let {
                name, value, body, ..
            } => {
                let bound = self.lower(value)?;
                self.scope.push((name.clone(), bound));
                let result = self.lower(body);
                self.scope.pop();
                result?
            }
            Expr::Tuple { elements } => {
                let items = self.lower_all(elements)?;
                let ty = Type::tuple(items.iter().map(|i| self.ty(*i).clone()).collect());
                self.add(Op::Tuple(items), ty)
            }
            Expr::TupleIndex { tuple, index } => {
                let a = self.lower(tuple)?;
                let ty = match self.ty(a) {
                    Type::Tuple { elements } => elements
                        .get(*index as usize)
                        .cloned()
                        .ok_or_else(|| format!("tuple index {index} out of range"))?,
                    other => return Err(format!("tuple index on {other}")),
                };
                self.add(Op::TupleIndex(a, *index), ty)
            }
            Expr::Array { elements } => {
                let items = self.lower_all(elements)?;
                let element = items
                    .first()
                    .map(|i| self.ty(*i).clone())
                    .ok_or("empty array literal")?;
                let ty = Type::array(element, items.len() as u32);
                self.add(Op::Array(items), ty)
            }
            Expr::ArrayIndex { array, index } => {
                let a = self.lower(array)?;
                let i = self.lower(index)?;
                let ty = match self.ty(a) {
                    Type::Array { element, .. } => element.as_ref().clone(),
                    other => return Err(format!("array index on {other}")),
                };
                self.add(Op::ArrayIndex(a, i), ty)
            }
            Expr::ArrayUpdate {
                array,
                index,
                value,
            } => {
                let array = self.lower(array)?;
                let index = self.lower(index)?;
                let value = self.lower(value)?;
                let ty = self.ty(array).clone();
                self.add(
                    Op::ArrayUpdate {
                        array,
                        index,
                        value,
                    },
                    ty,
                )
            }
            Expr::Reduce { op, operand } => {
                let a = self.lower(operand)?;
                self.add(Op::Reduce(*op, a), Type::bool())
            }
            Expr::Invoke { callee, args } => {
                let args = self.lower_all(args)?;
                let ty = self
                    .signatures
                    .get(callee)
                    .cloned()
                    .ok_or_else(|| format!("unknown function '{callee}'"))?;
                self.add(
                    Op::Invoke {
                        callee: callee.clone(),
                        args,
                    },
                    ty,
                )
            }
        };
        Ok(id)
    }

    fn width(&self, id: NodeId) -> Result<u32, String> {
        self.ty(id)
            .as_bits()
            .map(|(_, w)| w)
            .ok_or_else(|| format!("expected bits, got {}", self.ty(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Param, ENTRY_POINT};
    use crate::value::Value;

    #[test]
    fn test_let_binds_without_nodes() {
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![Param {
                    name: "a".into(),
                    ty: Type::ubits(4),
                }],
                ret: Type::ubits(8),
                body: Expr::Let {
                    name: "x".into(),
                    ty: Type::ubits(8),
                    value: Box::new(Expr::binary(BinaryOp::Concat, Expr::var("a"), Expr::var("a"))),
                    body: Box::new(Expr::binary(
                        BinaryOp::Xor,
                        Expr::var("x"),
                        Expr::literal(Value::ubits(8, 0xFF)),
                    )),
                },
            }],
        };
        let package = lower_program(&program).unwrap();
        let main = package.entry().unwrap();
        assert_eq!(main.nodes.len(), 4);
        assert_eq!(main.node(NodeId(1)).ty, Type::ubits(8));
        assert_eq!(main.ret, NodeId(3));
        let text = package.to_string();
        assert!(text.contains("n1: u8 = concat(n0, n0)"), "{text}");
        assert!(text.contains("ret n3"));
    }

    #[test]
    fn test_unknown_callee_is_an_error() {
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![],
                ret: Type::ubits(1),
                body: Expr::Invoke {
                    callee: "missing".into(),
                    args: vec![],
                },
            }],
        };
        let err = lower_program(&program).unwrap_err();
        assert_eq!(err.function, ENTRY_POINT);
    }
}
