//! Verilog text for a netlist.
//!
//! One `assign` per wire. Division is emitted with plain `/` and `%`; the
//! zero-divisor behaviour of the language is only modelled by [`super::sim`].

use std::fmt::Write;

use super::{ArithOp, Cell, CmpOp, Netlist, WireId};
use crate::ast::ReduceOp;

pub fn emit_verilog(netlist: &Netlist) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_module(&mut out, netlist);
    out
}

fn range(width: u64) -> String {
    if width <= 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

fn operand(netlist: &Netlist, id: WireId, signed: bool) -> String {
    let name = wire_name(netlist, id);
    if signed {
        format!("$signed({name})")
    } else {
        name
    }
}

fn wire_name(netlist: &Netlist, id: WireId) -> String {
    match netlist.wire(id).cell {
        Cell::Input { port } => format!("p{port}"),
        _ => id.to_string(),
    }
}

fn write_module(out: &mut String, netlist: &Netlist) -> std::fmt::Result {
    writeln!(out, "module {}(", netlist.name)?;
    for (port, ty) in netlist.inputs.iter().enumerate() {
        writeln!(
            out,
            "  input wire {}p{port},",
            range(ty.flat_bit_count())
        )?;
    }
    writeln!(
        out,
        "  output wire {}out",
        range(netlist.output_ty.flat_bit_count())
    )?;
    writeln!(out, ");")?;

    for (i, wire) in netlist.wires.iter().enumerate() {
        if matches!(wire.cell, Cell::Input { .. }) {
            continue;
        }
        let id = WireId(i);
        let expr = cell_expr(netlist, wire.width, &wire.cell);
        writeln!(out, "  wire {}{id};", range(wire.width))?;
        writeln!(out, "  assign {id} = {expr};")?;
    }
    writeln!(out, "  assign out = {};", wire_name(netlist, netlist.output))?;
    writeln!(out, "endmodule")
}

fn cell_expr(netlist: &Netlist, width: u64, cell: &Cell) -> String {
    let name = |id: &WireId| wire_name(netlist, *id);
    match cell {
        Cell::Input { port } => format!("p{port}"),
        Cell::Const { bits } => format!("{}'h{:x}", bits.width().max(1), bits),
        Cell::Arith { op, signed, a, b } => {
            let symbol = match op {
                ArithOp::Add => "+",
                ArithOp::Sub => "-",
                ArithOp::Mul => "*",
                ArithOp::Div => "/",
                ArithOp::Mod => "%",
                ArithOp::And => "&",
                ArithOp::Or => "|",
                ArithOp::Xor => "^",
                ArithOp::Shl => "<<",
                ArithOp::Shr if *signed => ">>>",
                ArithOp::Shr => ">>",
            };
            let signed_operands = *signed && !matches!(op, ArithOp::Shl | ArithOp::Shr);
            let rhs = operand(netlist, *b, signed_operands);
            format!("{} {symbol} {rhs}", operand(netlist, *a, *signed))
        }
        Cell::Compare { op, signed, a, b } => {
            let symbol = match op {
                CmpOp::Eq => "==",
                CmpOp::Ne => "!=",
                CmpOp::Lt => "<",
                CmpOp::Le => "<=",
                CmpOp::Gt => ">",
                CmpOp::Ge => ">=",
            };
            format!(
                "{} {symbol} {}",
                operand(netlist, *a, *signed),
                operand(netlist, *b, *signed)
            )
        }
        Cell::Neg { a } => format!("-{}", name(a)),
        Cell::Not { a } => format!("~{}", name(a)),
        Cell::Resize { a, sign_extend } => {
            let source = netlist.wire(*a).width;
            if width <= source {
                format!("{}[{}:0]", name(a), width - 1)
            } else {
                let fill = if *sign_extend {
                    format!("{}[{}]", name(a), source - 1)
                } else {
                    "1'b0".to_string()
                };
                format!("{{{{{}{{{fill}}}}}, {}}}", width - source, name(a))
            }
        }
        Cell::Concat { parts } => {
            let parts: Vec<String> = parts.iter().map(name).collect();
            format!("{{{}}}", parts.join(", "))
        }
        Cell::Extract { a, start } => format!("{}[{}:{start}]", name(a), start + width - 1),
        Cell::Mux {
            sel,
            on_true,
            on_false,
        } => format!("{} ? {} : {}", name(sel), name(on_true), name(on_false)),
        Cell::EqConst { a, value } => format!("{} == {value}", name(a)),
        Cell::Reduce { op, a } => {
            let symbol = match op {
                ReduceOp::And => '&',
                ReduceOp::Or => '|',
                ReduceOp::Xor => '^',
            };
            format!("{symbol}{}", name(a))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr, Function, Param, Program, ENTRY_POINT};
    use crate::ir::lower_program;
    use crate::types::Type;

    #[test]
    fn test_emits_module() {
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![
                    Param {
                        name: "a".into(),
                        ty: Type::sbits(8),
                    },
                    Param {
                        name: "b".into(),
                        ty: Type::sbits(8),
                    },
                ],
                ret: Type::bool(),
                body: Expr::binary(BinaryOp::Lt, Expr::var("a"), Expr::var("b")),
            }],
        };
        let netlist = Netlist::from_package(&lower_program(&program).unwrap()).unwrap();
        let text = emit_verilog(&netlist);
        assert!(text.starts_with("module main("));
        assert!(text.contains("input wire [7:0] p0,"));
        assert!(text.contains("output wire out"));
        assert!(text.contains("assign w2 = $signed(p0) < $signed(p1);"), "{text}");
        assert!(text.trim_end().ends_with("endmodule"));
    }
}
