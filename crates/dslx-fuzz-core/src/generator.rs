//! Random program generator.
//!
//! Programs are built top-down from a target type: at each node the generator
//! collects every production that can yield the requested type in the current
//! scope, picks one by weight, and recurses with one less unit of depth. At
//! depth zero only variables and literals remain legal, which bounds the size
//! of every expression.
//!
//! All randomness comes from the session RNG, so the same RNG state and
//! options always produce the same program.

use std::fmt;

use dslx_frontend::{
    check_program, BinaryOp, Expr, Function, Param, Program, ReduceOp, Type, TypeError, UnaryOp,
    ENTRY_POINT,
};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::trace;

use crate::options::GeneratorOptions;
use crate::value_gen::ArgumentGenerator;

/// Widths drawn preferentially when picking a bits type.
const COMMON_WIDTHS: [u32; 7] = [1, 2, 4, 8, 16, 32, 64];
/// Widest index or shift-amount type emitted.
const MAX_INDEX_WIDTH: u32 = 4;
const MAX_SHIFT_AMOUNT_WIDTH: u32 = 8;
/// Aggregates nest at most this deep.
const MAX_TYPE_NESTING: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No production can yield the requested type.
    NoLegalProduction { ty: Type, depth: u32 },
    /// The generated program failed type checking.
    IllTyped(TypeError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::NoLegalProduction { ty, depth } => {
                write!(f, "no legal production for {ty} at depth {depth}")
            }
            GenerationError::IllTyped(err) => write!(f, "generated program is ill-typed: {err}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<TypeError> for GenerationError {
    fn from(err: TypeError) -> Self {
        GenerationError::IllTyped(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Production {
    Var,
    Literal,
    Arith,
    Shift,
    Unary,
    Cast,
    Slice,
    Concat,
    Compare,
    Reduce,
    Invoke,
    Ternary,
    TupleLiteral,
    TupleIndex,
    ArrayLiteral,
    ArrayIndex,
    ArrayUpdate,
}

struct Signature {
    name: String,
    params: Vec<Type>,
    ret: Type,
}

type Scope = Vec<(String, Type)>;

pub struct AstGenerator<'a> {
    rng: &'a mut StdRng,
    options: &'a GeneratorOptions,
    arith_ops: Vec<BinaryOp>,
    shift_ops: Vec<BinaryOp>,
    compare_ops: Vec<BinaryOp>,
    allow_concat: bool,
    callable: Vec<Signature>,
    next_local: usize,
}

impl<'a> AstGenerator<'a> {
    pub fn new(rng: &'a mut StdRng, options: &'a GeneratorOptions) -> Self {
        let binops = options.allowed_binops();
        let select = |pred: fn(BinaryOp) -> bool| -> Vec<BinaryOp> {
            binops.iter().copied().filter(|op| pred(*op)).collect()
        };
        Self {
            arith_ops: select(BinaryOp::is_same_type_arith),
            shift_ops: select(BinaryOp::is_shift),
            compare_ops: select(BinaryOp::is_comparison),
            allow_concat: binops.contains(&BinaryOp::Concat),
            rng,
            options,
            callable: Vec::new(),
            next_local: 0,
        }
    }

    /// Generate helper functions followed by `main`, then type check the result.
    pub fn generate_program(&mut self) -> Result<Program, GenerationError> {
        let helpers = self.rng.gen_range(0..=self.options.max_helper_functions());
        let mut functions = Vec::with_capacity(helpers as usize + 1);
        for i in 0..helpers {
            let function = self.gen_function(format!("f{i}"))?;
            self.callable.push(Signature {
                name: function.name.clone(),
                params: function.param_types(),
                ret: function.ret.clone(),
            });
            functions.push(function);
        }
        functions.push(self.gen_function(ENTRY_POINT.to_string())?);

        let program = Program { functions };
        check_program(&program)?;
        trace!(nodes = program.node_count(), "generated program");
        Ok(program)
    }

    fn gen_function(&mut self, name: String) -> Result<Function, GenerationError> {
        self.next_local = 0;
        let param_count = self.rng.gen_range(1..=self.options.max_params());
        let params: Vec<Param> = (0..param_count)
            .map(|i| Param {
                name: format!("p{i}"),
                ty: self.gen_type(),
            })
            .collect();
        let mut scope: Scope = params.iter().map(|p| (p.name.clone(), p.ty.clone())).collect();

        let let_count = self.rng.gen_range(1..=self.options.max_lets());
        let mut bindings = Vec::with_capacity(let_count as usize);
        for _ in 0..let_count {
            let ty = self.pick_type(&scope);
            let value = self.gen_expr(&ty, &scope, self.options.max_depth())?;
            let local = format!("x{}", self.next_local);
            self.next_local += 1;
            scope.push((local.clone(), ty.clone()));
            bindings.push((local, ty, value));
        }

        let (tail, ret) = self.gen_tail(&scope);
        let body = bindings
            .into_iter()
            .rev()
            .fold(tail, |body, (name, ty, value)| Expr::Let {
                name,
                ty,
                value: Box::new(value),
                body: Box::new(body),
            });
        Ok(Function {
            name,
            params,
            ret,
            body,
        })
    }

    /// The body result: the last binding, or a tuple of it and other locals.
    fn gen_tail(&mut self, scope: &Scope) -> (Expr, Type) {
        let last = scope.len() - 1;
        let max_arity = (self.options.max_tuple_arity() as usize).min(3).min(scope.len());
        let arity = self.rng.gen_range(1..=max_arity);
        let mut picks = vec![last];
        for _ in 1..arity {
            picks.push(self.rng.gen_range(0..scope.len()));
        }
        let tuple_ty = Type::tuple(picks.iter().map(|i| scope[*i].1.clone()).collect());
        if arity == 1 || tuple_ty.flat_bit_count() > self.aggregate_budget() {
            let (name, ty) = &scope[last];
            return (Expr::var(name.clone()), ty.clone());
        }
        let elements = picks.iter().map(|i| Expr::var(scope[*i].0.clone())).collect();
        (Expr::Tuple { elements }, tuple_ty)
    }

    // ---- Types ----

    fn aggregate_budget(&self) -> u64 {
        u64::from(self.options.max_width_aggregate_types())
    }

    fn pick_type(&mut self, scope: &Scope) -> Type {
        if !scope.is_empty() && self.rng.gen_bool(0.5) {
            scope[self.rng.gen_range(0..scope.len())].1.clone()
        } else {
            self.gen_type()
        }
    }

    fn gen_type(&mut self) -> Type {
        self.gen_type_within(self.aggregate_budget(), 0)
    }

    fn gen_type_within(&mut self, budget: u64, nesting: u32) -> Type {
        let aggregate_ok = nesting < MAX_TYPE_NESTING && budget >= 2;
        let roll = if aggregate_ok {
            self.rng.gen_range(0..10)
        } else {
            0
        };
        match roll {
            0..=6 => self.gen_bits_type(budget),
            7 | 8 => self.gen_tuple_type(budget, nesting),
            _ => self.gen_array_type(budget, nesting),
        }
    }

    fn gen_bits_type(&mut self, budget: u64) -> Type {
        let cap = u64::from(self.options.max_width_bits_types()).min(budget).max(1) as u32;
        let width = if self.rng.gen_bool(0.5) {
            let common: Vec<u32> = COMMON_WIDTHS.into_iter().filter(|w| *w <= cap).collect();
            common[self.rng.gen_range(0..common.len())]
        } else {
            self.rng.gen_range(1..=cap)
        };
        let signed = self.options.emit_signed_types() && self.rng.gen_bool(0.3);
        Type::Bits { signed, width }
    }

    fn gen_tuple_type(&mut self, budget: u64, nesting: u32) -> Type {
        let arity = u64::from(self.rng.gen_range(1..=self.options.max_tuple_arity())).min(budget);
        let mut remaining = budget;
        let mut elements = Vec::with_capacity(arity as usize);
        for i in 0..arity {
            // Leave at least one bit for each later element.
            let reserve = arity - 1 - i;
            let element = self.gen_type_within(remaining - reserve, nesting + 1);
            remaining -= element.flat_bit_count();
            elements.push(element);
        }
        Type::tuple(elements)
    }

    fn gen_array_type(&mut self, budget: u64, nesting: u32) -> Type {
        let size = u64::from(self.rng.gen_range(1..=self.options.max_array_size())).min(budget);
        let element = self.gen_type_within(budget / size, nesting + 1);
        Type::array(element, size as u32)
    }

    fn unsigned_index_type(&mut self, max_width: u32) -> Type {
        let cap = max_width.min(self.options.max_width_bits_types());
        Type::ubits(self.rng.gen_range(1..=cap))
    }

    // ---- Expressions ----

    fn choose(&mut self, choices: &[(Production, u32)]) -> Option<Production> {
        let total: u32 = choices.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.rng.gen_range(0..total);
        for (production, weight) in choices {
            if roll < *weight {
                return Some(*production);
            }
            roll -= weight;
        }
        None
    }

    fn legal_productions(&self, ty: &Type, scope: &Scope, depth: u32) -> Vec<(Production, u32)> {
        let mut choices = vec![(Production::Literal, 2)];
        if scope.iter().any(|(_, t)| t == ty) {
            choices.push((Production::Var, 4));
        }
        if depth == 0 {
            return choices;
        }
        choices.push((Production::Ternary, 1));
        if self.callable.iter().any(|s| &s.ret == ty) {
            choices.push((Production::Invoke, 3));
        }
        let fits_in_array = ty.flat_bit_count() <= self.aggregate_budget();
        match ty {
            Type::Bits { signed, width } => {
                if !self.arith_ops.is_empty() {
                    choices.push((Production::Arith, 6));
                }
                if !self.shift_ops.is_empty() {
                    choices.push((Production::Shift, 2));
                }
                choices.push((Production::Unary, 2));
                choices.push((Production::Cast, 2));
                if !signed {
                    choices.push((Production::Slice, 2));
                    if *width >= 2 && self.allow_concat {
                        choices.push((Production::Concat, 2));
                    }
                }
                if ty == &Type::bool() {
                    choices.push((Production::Reduce, 2));
                    if !self.compare_ops.is_empty() {
                        choices.push((Production::Compare, 4));
                    }
                }
                choices.push((Production::TupleIndex, 1));
                if fits_in_array {
                    choices.push((Production::ArrayIndex, 1));
                }
            }
            Type::Tuple { .. } => {
                choices.push((Production::TupleLiteral, 4));
                if fits_in_array {
                    choices.push((Production::ArrayIndex, 1));
                }
            }
            Type::Array { .. } => {
                choices.push((Production::ArrayLiteral, 4));
                choices.push((Production::ArrayUpdate, 2));
            }
        }
        choices
    }

    fn gen_expr(&mut self, ty: &Type, scope: &Scope, depth: u32) -> Result<Expr, GenerationError> {
        let choices = self.legal_productions(ty, scope, depth);
        let production = self
            .choose(&choices)
            .ok_or_else(|| GenerationError::NoLegalProduction {
                ty: ty.clone(),
                depth,
            })?;
        let next = depth.saturating_sub(1);
        let expr = match production {
            Production::Var => {
                let candidates: Vec<&String> = scope
                    .iter()
                    .filter(|(_, t)| t == ty)
                    .map(|(n, _)| n)
                    .collect();
                Expr::var(candidates[self.rng.gen_range(0..candidates.len())].clone())
            }
            Production::Literal => Expr::literal(ArgumentGenerator::new(&mut *self.rng).generate(ty)),
            Production::Arith => {
                let op = self.arith_ops[self.rng.gen_range(0..self.arith_ops.len())];
                let lhs = self.gen_expr(ty, scope, next)?;
                let rhs = self.gen_expr(ty, scope, next)?;
                Expr::binary(op, lhs, rhs)
            }
            Production::Shift => {
                let op = self.shift_ops[self.rng.gen_range(0..self.shift_ops.len())];
                let amount_ty = self.unsigned_index_type(MAX_SHIFT_AMOUNT_WIDTH);
                let lhs = self.gen_expr(ty, scope, next)?;
                let rhs = self.gen_expr(&amount_ty, scope, next)?;
                Expr::binary(op, lhs, rhs)
            }
            Production::Unary => {
                let op = if self.rng.gen_bool(0.5) {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                Expr::Unary {
                    op,
                    operand: Box::new(self.gen_expr(ty, scope, next)?),
                }
            }
            Production::Cast => {
                let from = self.gen_bits_type(u64::from(self.options.max_width_bits_types()));
                Expr::Cast {
                    operand: Box::new(self.gen_expr(&from, scope, next)?),
                    to: ty.clone(),
                }
            }
            Production::Slice => {
                let width = self.bits_width(ty);
                let source_width = self
                    .rng
                    .gen_range(width..=self.options.max_width_bits_types().max(width));
                let signed = self.options.emit_signed_types() && self.rng.gen_bool(0.3);
                let source = Type::Bits {
                    signed,
                    width: source_width,
                };
                let start = self.rng.gen_range(0..=source_width - width);
                Expr::Slice {
                    operand: Box::new(self.gen_expr(&source, scope, next)?),
                    start,
                    width,
                }
            }
            Production::Concat => {
                let width = self.bits_width(ty);
                let high = self.rng.gen_range(1..width);
                let lhs = self.gen_expr(&Type::ubits(high), scope, next)?;
                let rhs = self.gen_expr(&Type::ubits(width - high), scope, next)?;
                Expr::binary(BinaryOp::Concat, lhs, rhs)
            }
            Production::Compare => {
                let op = self.compare_ops[self.rng.gen_range(0..self.compare_ops.len())];
                let operand_ty = self.bits_operand_type(scope);
                let lhs = self.gen_expr(&operand_ty, scope, next)?;
                let rhs = self.gen_expr(&operand_ty, scope, next)?;
                Expr::binary(op, lhs, rhs)
            }
            Production::Reduce => {
                let op = [ReduceOp::And, ReduceOp::Or, ReduceOp::Xor][self.rng.gen_range(0..3)];
                let operand_ty = self.bits_operand_type(scope);
                Expr::Reduce {
                    op,
                    operand: Box::new(self.gen_expr(&operand_ty, scope, next)?),
                }
            }
            Production::Invoke => {
                let candidates: Vec<usize> = (0..self.callable.len())
                    .filter(|i| &self.callable[*i].ret == ty)
                    .collect();
                let index = candidates[self.rng.gen_range(0..candidates.len())];
                let (callee, params) = {
                    let sig = &self.callable[index];
                    (sig.name.clone(), sig.params.clone())
                };
                let args = params
                    .iter()
                    .map(|p| self.gen_expr(p, scope, next))
                    .collect::<Result<_, _>>()?;
                Expr::Invoke { callee, args }
            }
            Production::Ternary => Expr::Ternary {
                cond: Box::new(self.gen_expr(&Type::bool(), scope, next)?),
                on_true: Box::new(self.gen_expr(ty, scope, next)?),
                on_false: Box::new(self.gen_expr(ty, scope, next)?),
            },
            Production::TupleLiteral => {
                let Type::Tuple { elements } = ty else {
                    return Err(self.no_production(ty, depth));
                };
                let elements = elements
                    .iter()
                    .map(|e| self.gen_expr(e, scope, next))
                    .collect::<Result<_, _>>()?;
                Expr::Tuple { elements }
            }
            Production::TupleIndex => {
                let (tuple_ty, index) = self.tuple_containing(ty);
                Expr::TupleIndex {
                    tuple: Box::new(self.gen_expr(&tuple_ty, scope, next)?),
                    index,
                }
            }
            Production::ArrayLiteral => {
                let Type::Array { element, size } = ty else {
                    return Err(self.no_production(ty, depth));
                };
                let elements = (0..*size)
                    .map(|_| self.gen_expr(element, scope, next))
                    .collect::<Result<_, _>>()?;
                Expr::Array { elements }
            }
            Production::ArrayIndex => {
                let max_size = (self.aggregate_budget() / ty.flat_bit_count().max(1))
                    .min(u64::from(self.options.max_array_size()))
                    .max(1);
                let size = self.rng.gen_range(1..=max_size) as u32;
                let array_ty = Type::array(ty.clone(), size);
                let index_ty = self.unsigned_index_type(MAX_INDEX_WIDTH);
                Expr::ArrayIndex {
                    array: Box::new(self.gen_expr(&array_ty, scope, next)?),
                    index: Box::new(self.gen_expr(&index_ty, scope, next)?),
                }
            }
            Production::ArrayUpdate => {
                let Type::Array { element, .. } = ty else {
                    return Err(self.no_production(ty, depth));
                };
                let index_ty = self.unsigned_index_type(MAX_INDEX_WIDTH);
                Expr::ArrayUpdate {
                    array: Box::new(self.gen_expr(ty, scope, next)?),
                    index: Box::new(self.gen_expr(&index_ty, scope, next)?),
                    value: Box::new(self.gen_expr(element, scope, next)?),
                }
            }
        };
        Ok(expr)
    }

    fn no_production(&self, ty: &Type, depth: u32) -> GenerationError {
        GenerationError::NoLegalProduction {
            ty: ty.clone(),
            depth,
        }
    }

    fn bits_width(&self, ty: &Type) -> u32 {
        ty.as_bits().map_or(1, |(_, width)| width)
    }

    /// A bits type for comparison/reduction operands, preferring types in scope.
    fn bits_operand_type(&mut self, scope: &Scope) -> Type {
        let in_scope: Vec<&Type> = scope.iter().map(|(_, t)| t).filter(|t| t.is_bits()).collect();
        if !in_scope.is_empty() && self.rng.gen_bool(0.6) {
            in_scope[self.rng.gen_range(0..in_scope.len())].clone()
        } else {
            self.gen_bits_type(u64::from(self.options.max_width_bits_types()))
        }
    }

    /// A tuple type with `ty` at a random position, within the aggregate budget.
    fn tuple_containing(&mut self, ty: &Type) -> (Type, u32) {
        let mut remaining = self.aggregate_budget().saturating_sub(ty.flat_bit_count());
        let max_extra = self.options.max_tuple_arity().saturating_sub(1).min(2);
        let extra = self.rng.gen_range(0..=max_extra);
        let mut elements = Vec::new();
        for _ in 0..extra {
            if remaining == 0 {
                break;
            }
            let element = self.gen_bits_type(remaining);
            remaining -= element.flat_bit_count();
            elements.push(element);
        }
        let index = self.rng.gen_range(0..=elements.len());
        elements.insert(index, ty.clone());
        (Type::tuple(elements), index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn generate(seed: u64, options: &GeneratorOptions) -> Program {
        let mut rng = StdRng::seed_from_u64(seed);
        AstGenerator::new(&mut rng, options)
            .generate_program()
            .unwrap()
    }

    #[test]
    fn test_same_seed_same_program() {
        let options = GeneratorOptions::default();
        for seed in 0..20 {
            assert_eq!(generate(seed, &options), generate(seed, &options));
        }
    }

    #[test]
    fn test_generated_programs_typecheck() {
        let options = GeneratorOptions::default();
        for seed in 0..50 {
            let program = generate(seed, &options);
            check_program(&program).unwrap();
            assert!(program.entry().is_some());
        }
    }

    #[test]
    fn test_zero_depth_uses_only_terminals_in_lets() {
        let options = GeneratorOptions::builder()
            .max_depth(1)
            .max_helper_functions(0)
            .build()
            .unwrap();
        for seed in 0..20 {
            let program = generate(seed, &options);
            // Each let value is a single production over terminals.
            let mut body = &program.functions[0].body;
            while let Expr::Let { value, body: rest, .. } = body {
                assert!(value
                    .children()
                    .iter()
                    .all(|c| matches!(c, Expr::Literal { .. } | Expr::Var { .. })));
                body = rest;
            }
        }
    }

    #[test]
    fn test_bits_widths_respect_limit() {
        let options = GeneratorOptions::builder()
            .max_width_bits_types(8)
            .max_width_aggregate_types(32)
            .build()
            .unwrap();
        for seed in 0..30 {
            let program = generate(seed, &options);
            for function in &program.functions {
                for param in &function.params {
                    assert!(param.ty.flat_bit_count() <= 32);
                    if let Some((_, width)) = param.ty.as_bits() {
                        assert!(width <= 8);
                    }
                }
            }
        }
    }
}
