//! Netlist simulator.
//!
//! Word-level cells are evaluated on `u64` words with explicit masking;
//! structural cells (concat, extract, resize, mux) move individual bits.

use super::layout::{flatten, unflatten, BitVec};
use super::{ArithOp, Cell, CmpOp, Netlist, WireId};
use crate::ast::ReduceOp;
use crate::error::{check_args, EvalError, EvalLimits, EvalResult};
use crate::value::Value;

pub fn simulate(netlist: &Netlist, args: &[Value], limits: &EvalLimits) -> EvalResult<Value> {
    check_args(&netlist.name, &netlist.inputs, args)?;

    let mut budget = limits.start();
    let mut state: Vec<BitVec> = Vec::with_capacity(netlist.wires.len());
    for wire in &netlist.wires {
        budget.tick()?;
        let width = wire.width as usize;
        let bits = match &wire.cell {
            Cell::Input { port } => flatten(&args[*port]),
            Cell::Const { bits } => bits.clone(),
            Cell::Arith { op, signed, a, b } => {
                let (a, b) = (word(&state, *a), word(&state, *b));
                BitVec::from_u64(wire.width as u32, arith(*op, *signed, a, b))
            }
            Cell::Compare { op, signed, a, b } => {
                let (a, b) = (word(&state, *a), word(&state, *b));
                BitVec::from_u64(1, u64::from(compare(*op, *signed, a, b)))
            }
            Cell::Neg { a } => {
                let a = word(&state, *a);
                BitVec::from_u64(wire.width as u32, (!a.value).wrapping_add(1))
            }
            Cell::Not { a } => BitVec::from_bits(state[a.0].bits().iter().map(|b| !b).collect()),
            Cell::Resize { a, sign_extend } => {
                let source = &state[a.0];
                let fill = *sign_extend && source.most_significant();
                BitVec::from_bits(
                    (0..width)
                        .map(|i| if i < source.width() { source.bit(i) } else { fill })
                        .collect(),
                )
            }
            Cell::Concat { parts } => BitVec::concat(parts.iter().map(|p| &state[p.0])),
            Cell::Extract { a, start } => state[a.0].extract(*start as usize, width),
            Cell::Mux {
                sel,
                on_true,
                on_false,
            } => {
                if state[sel.0].bit(0) {
                    state[on_true.0].clone()
                } else {
                    state[on_false.0].clone()
                }
            }
            Cell::EqConst { a, value } => {
                let a = &state[a.0];
                let matches = a.width() >= 64 || *value >> a.width() == 0;
                BitVec::from_u64(1, u64::from(matches && a.to_u64() == *value))
            }
            Cell::Reduce { op, a } => {
                let bits = state[a.0].bits();
                let result = match op {
                    ReduceOp::And => bits.iter().all(|b| *b),
                    ReduceOp::Or => bits.iter().any(|b| *b),
                    ReduceOp::Xor => bits.iter().filter(|b| **b).count() % 2 == 1,
                };
                BitVec::from_u64(1, u64::from(result))
            }
        };
        if bits.width() != width {
            return Err(EvalError::Malformed(format!(
                "wire w{} produced {} bits, expected {}",
                state.len(),
                bits.width(),
                width
            )));
        }
        state.push(bits);
    }
    Ok(unflatten(&state[netlist.output.0], &netlist.output_ty))
}

/// A word-level operand: value plus its width.
#[derive(Clone, Copy)]
struct Word {
    value: u64,
    width: u32,
}

impl Word {
    fn ones(&self) -> u64 {
        u64::MAX >> (64 - self.width)
    }

    fn msb(&self) -> bool {
        self.value >> (self.width - 1) & 1 == 1
    }

    /// Two's complement reading of the word.
    fn signed(&self) -> i64 {
        let shift = 64 - self.width;
        ((self.value << shift) as i64) >> shift
    }

    fn wrap(&self, value: u64) -> u64 {
        value & self.ones()
    }
}

fn word(state: &[BitVec], id: WireId) -> Word {
    let bits = &state[id.0];
    Word {
        value: bits.to_u64(),
        width: bits.width().clamp(1, 64) as u32,
    }
}

fn arith(op: ArithOp, signed: bool, a: Word, b: Word) -> u64 {
    match op {
        ArithOp::Add => a.wrap(a.value.wrapping_add(b.value)),
        ArithOp::Sub => a.wrap(a.value.wrapping_sub(b.value)),
        ArithOp::Mul => a.wrap(a.value.wrapping_mul(b.value)),
        ArithOp::And => a.value & b.value,
        ArithOp::Or => a.value | b.value,
        ArithOp::Xor => a.value ^ b.value,
        ArithOp::Div if signed => signed_div(a, b),
        ArithOp::Div => a.value.checked_div(b.value).unwrap_or(a.ones()),
        ArithOp::Mod if signed => signed_mod(a, b),
        ArithOp::Mod => a.value.checked_rem(b.value).unwrap_or(0),
        ArithOp::Shl => {
            if b.value >= u64::from(a.width) {
                0
            } else {
                a.wrap(a.value << b.value)
            }
        }
        ArithOp::Shr => {
            let fill = signed && a.msb();
            if b.value >= u64::from(a.width) {
                if fill {
                    a.ones()
                } else {
                    0
                }
            } else if fill {
                a.wrap((a.signed() >> b.value) as u64)
            } else {
                a.value >> b.value
            }
        }
    }
}

fn signed_div(a: Word, b: Word) -> u64 {
    let min = 1u64 << (a.width - 1);
    if b.value == 0 {
        return if a.msb() { min } else { min - 1 };
    }
    let (x, y) = (a.signed(), b.signed());
    match x.checked_div(y) {
        Some(q) if !(a.value == min && y == -1) => a.wrap(q as u64),
        // MIN / -1 overflows and wraps back to MIN.
        _ => min,
    }
}

fn signed_mod(a: Word, b: Word) -> u64 {
    if b.value == 0 {
        return 0;
    }
    let (x, y) = (a.signed(), b.signed());
    a.wrap(x.checked_rem(y).unwrap_or(0) as u64)
}

fn compare(op: CmpOp, signed: bool, a: Word, b: Word) -> bool {
    let ordering = if signed {
        a.signed().cmp(&b.signed())
    } else {
        a.value.cmp(&b.value)
    };
    match op {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => ordering.is_ne(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr, Function, Param, Program, ENTRY_POINT};
    use crate::codegen::Netlist;
    use crate::interp::Interpreter;
    use crate::ir::lower_program;
    use crate::types::Type;

    fn netlist_for(program: &Program) -> Netlist {
        Netlist::from_package(&lower_program(program).unwrap()).unwrap()
    }

    fn binary_main(op: BinaryOp, ty: Type, ret: Type) -> Program {
        Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![
                    Param {
                        name: "a".into(),
                        ty: ty.clone(),
                    },
                    Param {
                        name: "b".into(),
                        ty,
                    },
                ],
                ret,
                body: Expr::binary(op, Expr::var("a"), Expr::var("b")),
            }],
        }
    }

    #[test]
    fn test_agrees_with_interpreter_on_edge_values() {
        let interesting = [0i64, 1, -1, 2, -2, 3, 5, -7, 63, -64, 127, -128];
        let limits = EvalLimits::unlimited();
        for signed in [false, true] {
            let ty = if signed { Type::sbits(8) } else { Type::ubits(8) };
            for op in BinaryOp::ALL {
                if op == BinaryOp::Concat || (op.is_shift() && signed) {
                    continue;
                }
                let ret = if op.is_comparison() { Type::bool() } else { ty.clone() };
                let program = binary_main(op, ty.clone(), ret);
                let netlist = netlist_for(&program);
                let interp = Interpreter::new(&program);
                for x in interesting {
                    for y in interesting {
                        let args = if signed {
                            [Value::sbits(8, x), Value::sbits(8, y)]
                        } else {
                            [Value::ubits(8, x as u64), Value::ubits(8, y as u64)]
                        };
                        assert_eq!(
                            simulate(&netlist, &args, &limits).unwrap(),
                            interp.run(&args, &limits).unwrap(),
                            "{op:?} on {} {}",
                            args[0],
                            args[1]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_signed_shift_right_fills_sign() {
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![
                    Param {
                        name: "a".into(),
                        ty: Type::sbits(6),
                    },
                    Param {
                        name: "b".into(),
                        ty: Type::ubits(3),
                    },
                ],
                ret: Type::sbits(6),
                body: Expr::binary(BinaryOp::Shr, Expr::var("a"), Expr::var("b")),
            }],
        };
        let netlist = netlist_for(&program);
        let limits = EvalLimits::unlimited();
        for amount in 0..8 {
            let args = [Value::sbits(6, -20), Value::ubits(3, amount)];
            assert_eq!(
                simulate(&netlist, &args, &limits).unwrap(),
                Interpreter::new(&program).run(&args, &limits).unwrap()
            );
        }
    }

    #[test]
    fn test_array_index_and_update() {
        let array_ty = Type::array(Type::ubits(4), 3);
        let body = Expr::Tuple {
            elements: vec![
                Expr::ArrayIndex {
                    array: Box::new(Expr::var("arr")),
                    index: Box::new(Expr::var("i")),
                },
                Expr::ArrayUpdate {
                    array: Box::new(Expr::var("arr")),
                    index: Box::new(Expr::var("i")),
                    value: Box::new(Expr::literal(Value::ubits(4, 15))),
                },
            ],
        };
        let program = Program {
            functions: vec![Function {
                name: ENTRY_POINT.into(),
                params: vec![
                    Param {
                        name: "arr".into(),
                        ty: array_ty.clone(),
                    },
                    Param {
                        name: "i".into(),
                        ty: Type::ubits(2),
                    },
                ],
                ret: Type::tuple(vec![Type::ubits(4), array_ty]),
                body,
            }],
        };
        let netlist = netlist_for(&program);
        let limits = EvalLimits::unlimited();
        let arr = Value::Array(vec![Value::ubits(4, 1), Value::ubits(4, 2), Value::ubits(4, 3)]);
        for i in 0..4 {
            let args = [arr.clone(), Value::ubits(2, i)];
            assert_eq!(
                simulate(&netlist, &args, &limits).unwrap(),
                Interpreter::new(&program).run(&args, &limits).unwrap(),
                "index {i}"
            );
        }
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let program = binary_main(BinaryOp::Add, Type::ubits(4), Type::ubits(4));
        let err = simulate(
            &netlist_for(&program),
            &[Value::ubits(4, 1)],
            &EvalLimits::unlimited(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Arity { .. }));
    }
}
