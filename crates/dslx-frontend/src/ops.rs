//! Operator dispatch over [`Value`]s, shared by the interpreter and the IR
//! evaluator.

use std::cmp::Ordering;

use crate::ast::{BinaryOp, ReduceOp, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::value::{Bits, Value};

fn expect_bits<'a>(value: &'a Value, what: &str) -> EvalResult<&'a Bits> {
    value
        .as_bits()
        .ok_or_else(|| EvalError::Malformed(format!("{what} is not a bits value: {value}")))
}

pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let a = expect_bits(lhs, "lhs")?;
    let b = expect_bits(rhs, "rhs")?;
    let bits = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.div(b),
        BinaryOp::Mod => a.rem(b),
        BinaryOp::And => a.and(b),
        BinaryOp::Or => a.or(b),
        BinaryOp::Xor => a.xor(b),
        BinaryOp::Shl => a.shl(b.raw),
        BinaryOp::Shr => a.shr(b.raw),
        BinaryOp::Eq => Bits::from_bool(a.compare(b) == Ordering::Equal),
        BinaryOp::Ne => Bits::from_bool(a.compare(b) != Ordering::Equal),
        BinaryOp::Lt => Bits::from_bool(a.compare(b) == Ordering::Less),
        BinaryOp::Le => Bits::from_bool(a.compare(b) != Ordering::Greater),
        BinaryOp::Gt => Bits::from_bool(a.compare(b) == Ordering::Greater),
        BinaryOp::Ge => Bits::from_bool(a.compare(b) != Ordering::Less),
        BinaryOp::Concat => a.concat(b),
    };
    Ok(Value::Bits(bits))
}

pub fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    let a = expect_bits(operand, "operand")?;
    Ok(Value::Bits(match op {
        UnaryOp::Neg => a.neg(),
        UnaryOp::Not => a.not(),
    }))
}

pub fn reduce(op: ReduceOp, operand: &Value) -> EvalResult<Value> {
    let a = expect_bits(operand, "reduction operand")?;
    Ok(Value::Bits(match op {
        ReduceOp::And => a.and_reduce(),
        ReduceOp::Or => a.or_reduce(),
        ReduceOp::Xor => a.xor_reduce(),
    }))
}

pub fn cast(operand: &Value, signed: bool, width: u32) -> EvalResult<Value> {
    Ok(Value::Bits(expect_bits(operand, "cast operand")?.cast(signed, width)))
}

pub fn slice(operand: &Value, start: u32, width: u32) -> EvalResult<Value> {
    Ok(Value::Bits(expect_bits(operand, "slice operand")?.slice(start, width)))
}

pub fn is_true(cond: &Value) -> EvalResult<bool> {
    Ok(expect_bits(cond, "condition")?.is_true())
}

pub fn tuple_index(tuple: Value, index: u32) -> EvalResult<Value> {
    match tuple {
        Value::Tuple(mut elements) if (index as usize) < elements.len() => {
            Ok(elements.swap_remove(index as usize))
        }
        other => Err(EvalError::Malformed(format!(
            "tuple index {index} on {other}"
        ))),
    }
}

/// Out-of-bounds indices clamp to the last element.
pub fn array_index(array: Value, index: &Value) -> EvalResult<Value> {
    let index = expect_bits(index, "array index")?.raw;
    match array {
        Value::Array(mut elements) if !elements.is_empty() => {
            let last = elements.len() - 1;
            let at = usize::try_from(index).map_or(last, |i| i.min(last));
            Ok(elements.swap_remove(at))
        }
        other => Err(EvalError::Malformed(format!("cannot index {other}"))),
    }
}

/// Out-of-bounds updates return the array unchanged.
pub fn array_update(array: Value, index: &Value, value: Value) -> EvalResult<Value> {
    let index = expect_bits(index, "array index")?.raw;
    match array {
        Value::Array(mut elements) => {
            if let Some(slot) = usize::try_from(index)
                .ok()
                .and_then(|i| elements.get_mut(i))
            {
                *slot = value;
            }
            Ok(Value::Array(elements))
        }
        other => Err(EvalError::Malformed(format!("cannot update {other}"))),
    }
}
