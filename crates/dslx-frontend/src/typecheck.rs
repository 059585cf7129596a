//! Type checker.
//!
//! Every program handed to a backend is expected to pass [`check_program`];
//! the backends assume well-typed input and only report `Malformed` errors
//! if that assumption is broken.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinaryOp, Expr, Function, Program, ENTRY_POINT};
use crate::types::{Type, MAX_BITS_WIDTH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub function: Option<String>,
    pub message: String,
}

impl TypeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            function: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "type error in '{}': {}", function, self.message),
            None => write!(f, "type error: {}", self.message),
        }
    }
}

impl std::error::Error for TypeError {}

type TypeResult<T> = Result<T, TypeError>;

/// Check a whole program. Functions may only call functions defined earlier.
pub fn check_program(program: &Program) -> TypeResult<()> {
    let mut signatures: HashMap<&str, (Vec<Type>, Type)> = HashMap::new();
    for function in &program.functions {
        if signatures.contains_key(function.name.as_str()) {
            return Err(TypeError::new(format!(
                "function '{}' defined twice",
                function.name
            )));
        }
        check_function(function, &signatures).map_err(|mut e| {
            e.function = Some(function.name.clone());
            e
        })?;
        signatures.insert(
            function.name.as_str(),
            (function.param_types(), function.ret.clone()),
        );
    }
    if program.entry().is_none() {
        return Err(TypeError::new(format!(
            "program has no '{ENTRY_POINT}' function"
        )));
    }
    Ok(())
}

fn check_function(
    function: &Function,
    signatures: &HashMap<&str, (Vec<Type>, Type)>,
) -> TypeResult<()> {
    let mut checker = Checker {
        signatures,
        scope: Vec::new(),
    };
    for param in &function.params {
        check_type_wellformed(&param.ty)?;
        checker.scope.push((param.name.clone(), param.ty.clone()));
    }
    check_type_wellformed(&function.ret)?;
    let body = checker.check(&function.body)?;
    if body != function.ret {
        return Err(TypeError::new(format!(
            "body has type {} but return type is {}",
            body, function.ret
        )));
    }
    Ok(())
}

/// Reject zero/oversized widths and empty aggregates.
pub fn check_type_wellformed(ty: &Type) -> TypeResult<()> {
    match ty {
        Type::Bits { width, .. } => {
            if *width == 0 || *width > MAX_BITS_WIDTH {
                return Err(TypeError::new(format!("bits width {width} out of range")));
            }
            Ok(())
        }
        Type::Tuple { elements } => {
            if elements.is_empty() {
                return Err(TypeError::new("empty tuple type"));
            }
            elements.iter().try_for_each(check_type_wellformed)
        }
        Type::Array { element, size } => {
            if *size == 0 {
                return Err(TypeError::new("zero-sized array type"));
            }
            check_type_wellformed(element)
        }
    }
}

struct Checker<'a> {
    signatures: &'a HashMap<&'a str, (Vec<Type>, Type)>,
    scope: Vec<(String, Type)>,
}

impl Checker<'_> {
    fn lookup(&self, name: &str) -> TypeResult<Type> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty.clone())
            .ok_or_else(|| TypeError::new(format!("unbound name '{name}'")))
    }

    fn bits(&mut self, expr: &Expr, what: &str) -> TypeResult<(bool, u32)> {
        let ty = self.check(expr)?;
        ty.as_bits()
            .ok_or_else(|| TypeError::new(format!("{what} must be a bits type, got {ty}")))
    }

    fn unsigned_bits(&mut self, expr: &Expr, what: &str) -> TypeResult<u32> {
        match self.bits(expr, what)? {
            (false, width) => Ok(width),
            (true, width) => Err(TypeError::new(format!(
                "{what} must be unsigned, got s{width}"
            ))),
        }
    }

    fn check(&mut self, expr: &Expr) -> TypeResult<Type> {
        match expr {
            Expr::Literal { value } => {
                let ty = value.ty();
                check_type_wellformed(&ty)?;
                if !value.conforms_to(&ty) {
                    return Err(TypeError::new(format!("literal {value} is malformed")));
                }
                Ok(ty)
            }
            Expr::Var { name } => self.lookup(name),
            Expr::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs),
            Expr::Unary { operand, .. } => {
                let (signed, width) = self.bits(operand, "unary operand")?;
                Ok(Type::Bits { signed, width })
            }
            Expr::Cast { operand, to } => {
                self.bits(operand, "cast operand")?;
                check_type_wellformed(to)?;
                if !to.is_bits() {
                    return Err(TypeError::new(format!("cannot cast to {to}")));
                }
                Ok(to.clone())
            }
            Expr::Slice {
                operand,
                start,
                width,
            } => {
                let (_, operand_width) = self.bits(operand, "slice operand")?;
                if *width == 0 || u64::from(*start) + u64::from(*width) > u64::from(operand_width)
                {
                    return Err(TypeError::new(format!(
                        "slice [{start} +: u{width}] out of range for width {operand_width}"
                    )));
                }
                Ok(Type::ubits(*width))
            }
            Expr::Ternary {
                cond,
                on_true,
                on_false,
            } => {
                let cond_ty = self.check(cond)?;
                if cond_ty != Type::bool() {
                    return Err(TypeError::new(format!("condition must be u1, got {cond_ty}")));
                }
                let t = self.check(on_true)?;
                let f = self.check(on_false)?;
                if t != f {
                    return Err(TypeError::new(format!("ternary arms differ: {t} vs {f}")));
                }
                Ok(t)
            }
            Expr::Let {
                name,
                ty,
                value,
                body,
            } => {
                check_type_wellformed(ty)?;
                let value_ty = self.check(value)?;
                if &value_ty != ty {
                    return Err(TypeError::new(format!(
                        "let '{name}' declared {ty} but bound to {value_ty}"
                    )));
                }
                self.scope.push((name.clone(), ty.clone()));
                let result = self.check(body);
                self.scope.pop();
                result
            }
            Expr::Tuple { elements } => {
                if elements.is_empty() {
                    return Err(TypeError::new("empty tuple"));
                }
                let elements = elements
                    .iter()
                    .map(|e| self.check(e))
                    .collect::<TypeResult<Vec<_>>>()?;
                Ok(Type::tuple(elements))
            }
            Expr::TupleIndex { tuple, index } => match self.check(tuple)? {
                Type::Tuple { elements } => elements
                    .get(*index as usize)
                    .cloned()
                    .ok_or_else(|| TypeError::new(format!("tuple index {index} out of range"))),
                other => Err(TypeError::new(format!("cannot index {other} with .{index}"))),
            },
            Expr::Array { elements } => {
                let Some(first) = elements.first() else {
                    return Err(TypeError::new("empty array literal"));
                };
                let element = self.check(first)?;
                for other in &elements[1..] {
                    let ty = self.check(other)?;
                    if ty != element {
                        return Err(TypeError::new(format!(
                            "array elements differ: {element} vs {ty}"
                        )));
                    }
                }
                Ok(Type::array(element, elements.len() as u32))
            }
            Expr::ArrayIndex { array, index } => {
                let element = self.array_element(array)?;
                self.unsigned_bits(index, "array index")?;
                Ok(element)
            }
            Expr::ArrayUpdate {
                array,
                index,
                value,
            } => {
                let array_ty = self.check(array)?;
                let Type::Array { element, .. } = &array_ty else {
                    return Err(TypeError::new(format!("cannot update {array_ty}")));
                };
                self.unsigned_bits(index, "array index")?;
                let value_ty = self.check(value)?;
                if &value_ty != element.as_ref() {
                    return Err(TypeError::new(format!(
                        "update value {value_ty} does not match element {element}"
                    )));
                }
                Ok(array_ty)
            }
            Expr::Reduce { operand, .. } => {
                self.bits(operand, "reduction operand")?;
                Ok(Type::bool())
            }
            Expr::Invoke { callee, args } => {
                let (params, ret) = self
                    .signatures
                    .get(callee.as_str())
                    .cloned()
                    .ok_or_else(|| TypeError::new(format!("unknown function '{callee}'")))?;
                if params.len() != args.len() {
                    return Err(TypeError::new(format!(
                        "'{callee}' expects {} argument(s), got {}",
                        params.len(),
                        args.len()
                    )));
                }
                for (i, (param, arg)) in params.iter().zip(args).enumerate() {
                    let arg_ty = self.check(arg)?;
                    if &arg_ty != param {
                        return Err(TypeError::new(format!(
                            "argument {i} of '{callee}' is {arg_ty}, expected {param}"
                        )));
                    }
                }
                Ok(ret)
            }
        }
    }

    fn array_element(&mut self, array: &Expr) -> TypeResult<Type> {
        match self.check(array)? {
            Type::Array { element, .. } => Ok(*element),
            other => Err(TypeError::new(format!("cannot index {other}"))),
        }
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> TypeResult<Type> {
        if op == BinaryOp::Concat {
            let l = self.unsigned_bits(lhs, "concat operand")?;
            let r = self.unsigned_bits(rhs, "concat operand")?;
            if l + r > MAX_BITS_WIDTH {
                return Err(TypeError::new(format!("concat result u{} too wide", l + r)));
            }
            return Ok(Type::ubits(l + r));
        }
        if op.is_shift() {
            let (signed, width) = self.bits(lhs, "shift operand")?;
            self.unsigned_bits(rhs, "shift amount")?;
            return Ok(Type::Bits { signed, width });
        }
        let l = self.bits(lhs, "binary operand")?;
        let r = self.bits(rhs, "binary operand")?;
        if l != r {
            return Err(TypeError::new(format!(
                "operands of '{}' differ: {} vs {}",
                op.symbol(),
                Type::Bits {
                    signed: l.0,
                    width: l.1
                },
                Type::Bits {
                    signed: r.0,
                    width: r.1
                }
            )));
        }
        if op.is_comparison() {
            Ok(Type::bool())
        } else {
            Ok(Type::Bits {
                signed: l.0,
                width: l.1,
            })
        }
    }
}
