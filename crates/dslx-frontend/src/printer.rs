//! DSLX-style source rendering.
//!
//! The text form is what gets written to `sample.x`; round-tripping goes
//! through the JSON form of the AST, so nothing here needs to be parseable.

use std::fmt::{self, Write};

use crate::ast::{Expr, Function, Program, UnaryOp};

const INDENT: &str = "    ";

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        writeln!(f, ") -> {} {{", self.ret)?;
        let mut out = String::new();
        write_block_body(&mut out, &self.body, 1)?;
        f.write_str(&out)?;
        writeln!(f, "}}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write_expr(&mut out, self, 0)?;
        f.write_str(&out)
    }
}

/// A chain of lets rendered one per line, followed by the tail expression.
fn write_block_body(out: &mut String, mut expr: &Expr, depth: usize) -> fmt::Result {
    let indent = INDENT.repeat(depth);
    while let Expr::Let {
        name,
        ty,
        value,
        body,
    } = expr
    {
        write!(out, "{indent}let {name}: {ty} = ")?;
        write_expr(out, value, depth)?;
        writeln!(out, ";")?;
        expr = body;
    }
    write!(out, "{indent}")?;
    write_expr(out, expr, depth)?;
    writeln!(out)
}

fn is_atomic(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal { .. }
            | Expr::Var { .. }
            | Expr::Tuple { .. }
            | Expr::Array { .. }
            | Expr::Invoke { .. }
            | Expr::Reduce { .. }
            | Expr::ArrayUpdate { .. }
    )
}

fn write_operand(out: &mut String, expr: &Expr, depth: usize) -> fmt::Result {
    if is_atomic(expr) {
        write_expr(out, expr, depth)
    } else {
        out.push('(');
        write_expr(out, expr, depth)?;
        write!(out, ")")
    }
}

fn write_list(out: &mut String, items: &[Expr], depth: usize) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(out, item, depth)?;
    }
    Ok(())
}

fn write_expr(out: &mut String, expr: &Expr, depth: usize) -> fmt::Result {
    match expr {
        Expr::Literal { value } => write!(out, "{value}"),
        Expr::Var { name } => write!(out, "{name}"),
        Expr::Binary { op, lhs, rhs } => {
            write_operand(out, lhs, depth)?;
            write!(out, " {} ", op.symbol())?;
            write_operand(out, rhs, depth)
        }
        Expr::Unary { op, operand } => {
            out.push(match op {
                UnaryOp::Neg => '-',
                UnaryOp::Not => '!',
            });
            write_operand(out, operand, depth)
        }
        Expr::Cast { operand, to } => {
            write_operand(out, operand, depth)?;
            write!(out, " as {to}")
        }
        Expr::Slice {
            operand,
            start,
            width,
        } => {
            write_operand(out, operand, depth)?;
            write!(out, "[{start} +: u{width}]")
        }
        Expr::Ternary {
            cond,
            on_true,
            on_false,
        } => {
            out.push_str("if ");
            write_expr(out, cond, depth)?;
            out.push_str(" { ");
            write_expr(out, on_true, depth)?;
            out.push_str(" } else { ");
            write_expr(out, on_false, depth)?;
            write!(out, " }}")
        }
        Expr::Let { .. } => {
            out.push_str("{\n");
            write_block_body(out, expr, depth + 1)?;
            write!(out, "{}}}", INDENT.repeat(depth))
        }
        Expr::Tuple { elements } => {
            out.push('(');
            write_list(out, elements, depth)?;
            if elements.len() == 1 {
                out.push(',');
            }
            write!(out, ")")
        }
        Expr::TupleIndex { tuple, index } => {
            write_operand(out, tuple, depth)?;
            write!(out, ".{index}")
        }
        Expr::Array { elements } => {
            out.push('[');
            write_list(out, elements, depth)?;
            write!(out, "]")
        }
        Expr::ArrayIndex { array, index } => {
            write_operand(out, array, depth)?;
            out.push('[');
            write_expr(out, index, depth)?;
            write!(out, "]")
        }
        Expr::ArrayUpdate {
            array,
            index,
            value,
        } => {
            out.push_str("update(");
            write_expr(out, array, depth)?;
            out.push_str(", ");
            write_expr(out, index, depth)?;
            out.push_str(", ");
            write_expr(out, value, depth)?;
            write!(out, ")")
        }
        Expr::Reduce { op, operand } => {
            write!(out, "{}(", op.builtin_name())?;
            write_expr(out, operand, depth)?;
            write!(out, ")")
        }
        Expr::Invoke { callee, args } => {
            write!(out, "{callee}(")?;
            write_list(out, args, depth)?;
            write!(out, ")")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, Expr, Function, Param, Program, ReduceOp};
    use crate::types::Type;
    use crate::value::Value;

    #[test]
    fn test_renders_let_chain() {
        let body = Expr::Let {
            name: "x0".into(),
            ty: Type::ubits(8),
            value: Box::new(Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::var("a"))),
            body: Box::new(Expr::Tuple {
                elements: vec![Expr::Reduce {
                    op: ReduceOp::Xor,
                    operand: Box::new(Expr::var("x0")),
                }],
            }),
        };
        let program = Program {
            functions: vec![Function {
                name: "main".into(),
                params: vec![Param {
                    name: "a".into(),
                    ty: Type::ubits(8),
                }],
                ret: Type::tuple(vec![Type::bool()]),
                body,
            }],
        };
        assert_eq!(
            program.to_string(),
            "fn main(a: u8) -> (u1,) {\n    let x0: u8 = a + a;\n    (xor_reduce(x0),)\n}\n"
        );
    }

    #[test]
    fn test_parenthesizes_nested_operands() {
        let expr = Expr::Slice {
            operand: Box::new(Expr::binary(
                BinaryOp::Shl,
                Expr::literal(Value::ubits(4, 3)),
                Expr::Cast {
                    operand: Box::new(Expr::var("b")),
                    to: Type::ubits(4),
                },
            )),
            start: 1,
            width: 2,
        };
        assert_eq!(expr.to_string(), "(u4:3 << (b as u4))[1 +: u2]");
    }
}
