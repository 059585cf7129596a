//! IR optimizer: constant folding, algebraic simplification, common
//! subexpression elimination and dead code elimination.
//!
//! Folding goes through the same operator table as the IR evaluator, so an
//! optimized function must produce bit-identical results to the original.

use std::collections::HashMap;

use tracing::debug;

use super::{IrFunction, Node, NodeId, Op, Package};
use crate::ast::BinaryOp;
use crate::ops;
use crate::types::Type;
use crate::value::{mask, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptStats {
    pub folded: usize,
    pub simplified: usize,
    pub deduplicated: usize,
    pub removed: usize,
}

/// Optimize every function in the package.
pub fn optimize(package: &Package) -> (Package, OptStats) {
    let mut stats = OptStats::default();
    let functions = package
        .functions
        .iter()
        .map(|f| eliminate_dead_code(&rewrite(f, &mut stats), &mut stats))
        .collect();
    debug!(
        folded = stats.folded,
        simplified = stats.simplified,
        deduplicated = stats.deduplicated,
        removed = stats.removed,
        "optimized package"
    );
    (Package { functions }, stats)
}

enum Rewrite {
    Alias(NodeId),
    Literal(Value),
}

fn rewrite(function: &IrFunction, stats: &mut OptStats) -> IrFunction {
    let mut nodes: Vec<Node> = Vec::with_capacity(function.nodes.len());
    let mut remap: Vec<NodeId> = Vec::with_capacity(function.nodes.len());
    let mut seen: HashMap<(Op, Type), NodeId> = HashMap::new();

    for node in &function.nodes {
        let op = node.op.map_operands(|id| remap[id.0]);
        let op = match simplify(&op, &nodes, &node.ty) {
            Some(Rewrite::Alias(id)) => {
                stats.simplified += 1;
                remap.push(id);
                continue;
            }
            Some(Rewrite::Literal(value)) => {
                stats.folded += 1;
                Op::Literal(value)
            }
            None => op,
        };
        let key = (op, node.ty.clone());
        if let Some(existing) = seen.get(&key) {
            stats.deduplicated += 1;
            remap.push(*existing);
            continue;
        }
        let id = NodeId(nodes.len());
        nodes.push(Node {
            op: key.0.clone(),
            ty: key.1.clone(),
        });
        seen.insert(key, id);
        remap.push(id);
    }

    IrFunction {
        name: function.name.clone(),
        params: function.params.clone(),
        ret_ty: function.ret_ty.clone(),
        ret: remap[function.ret.0],
        nodes,
    }
}

fn literal(nodes: &[Node], id: NodeId) -> Option<&Value> {
    match &nodes[id.0].op {
        Op::Literal(value) => Some(value),
        _ => None,
    }
}

fn literal_raw(nodes: &[Node], id: NodeId) -> Option<u64> {
    literal(nodes, id).and_then(Value::as_bits).map(|b| b.raw)
}

fn all_literal(nodes: &[Node], ids: &[NodeId]) -> Option<Vec<Value>> {
    ids.iter().map(|id| literal(nodes, *id).cloned()).collect()
}

fn simplify(op: &Op, nodes: &[Node], ty: &Type) -> Option<Rewrite> {
    if let Some(rewrite) = simplify_structure(op, nodes, ty) {
        return Some(rewrite);
    }
    if matches!(op, Op::Param(_) | Op::Literal(_) | Op::Invoke { .. }) {
        return None;
    }
    let operands = all_literal(nodes, &op.operands())?;
    let folded = match op {
        Op::Binary(bin, ..) => ops::binary(*bin, &operands[0], &operands[1]),
        Op::Unary(un, _) => ops::unary(*un, &operands[0]),
        Op::Cast { signed, width, .. } => ops::cast(&operands[0], *signed, *width),
        Op::Slice { start, width, .. } => ops::slice(&operands[0], *start, *width),
        Op::Reduce(red, _) => ops::reduce(*red, &operands[0]),
        Op::Tuple(_) => Ok(Value::Tuple(operands)),
        Op::Array(_) => Ok(Value::Array(operands)),
        Op::TupleIndex(_, index) => ops::tuple_index(operands[0].clone(), *index),
        Op::ArrayIndex(..) => ops::array_index(operands[0].clone(), &operands[1]),
        Op::ArrayUpdate { .. } => {
            ops::array_update(operands[0].clone(), &operands[1], operands[2].clone())
        }
        Op::Select { .. } | Op::Param(_) | Op::Literal(_) | Op::Invoke { .. } => return None,
    };
    folded.ok().map(Rewrite::Literal)
}

/// Rewrites that do not need every operand to be constant.
fn simplify_structure(op: &Op, nodes: &[Node], ty: &Type) -> Option<Rewrite> {
    match op {
        Op::Select {
            cond,
            on_true,
            on_false,
        } => {
            if on_true == on_false {
                return Some(Rewrite::Alias(*on_true));
            }
            let cond = literal_raw(nodes, *cond)?;
            Some(Rewrite::Alias(if cond != 0 { *on_true } else { *on_false }))
        }
        Op::Binary(bin, lhs, rhs) => {
            let rhs = literal_raw(nodes, *rhs)?;
            let width = ty.as_bits()?.1;
            let identity = match bin {
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Shl
                | BinaryOp::Shr => rhs == 0,
                BinaryOp::Mul => rhs == 1,
                BinaryOp::And => rhs == mask(width),
                _ => false,
            };
            identity.then_some(Rewrite::Alias(*lhs))
        }
        Op::Cast { operand, .. } if &nodes[operand.0].ty == ty => Some(Rewrite::Alias(*operand)),
        Op::TupleIndex(tuple, index) => match &nodes[tuple.0].op {
            Op::Tuple(items) => items.get(*index as usize).copied().map(Rewrite::Alias),
            _ => None,
        },
        Op::ArrayIndex(array, index) => {
            let Op::Array(items) = &nodes[array.0].op else {
                return None;
            };
            let index = literal_raw(nodes, *index)?;
            let last = items.len().checked_sub(1)?;
            let at = usize::try_from(index).map_or(last, |i| i.min(last));
            Some(Rewrite::Alias(items[at]))
        }
        _ => None,
    }
}

fn eliminate_dead_code(function: &IrFunction, stats: &mut OptStats) -> IrFunction {
    let mut live = vec![false; function.nodes.len()];
    live[function.ret.0] = true;
    for (i, node) in function.nodes.iter().enumerate().rev() {
        if live[i] {
            for operand in node.op.operands() {
                live[operand.0] = true;
            }
        }
    }

    let mut renumber: Vec<Option<NodeId>> = vec![None; function.nodes.len()];
    let mut nodes = Vec::new();
    for (i, node) in function.nodes.iter().enumerate() {
        if !live[i] {
            stats.removed += 1;
            continue;
        }
        // Operands precede their users, so they are already renumbered.
        let op = node
            .op
            .map_operands(|id| renumber[id.0].unwrap_or(id));
        renumber[i] = Some(NodeId(nodes.len()));
        nodes.push(Node {
            op,
            ty: node.ty.clone(),
        });
    }

    IrFunction {
        name: function.name.clone(),
        params: function.params.clone(),
        ret_ty: function.ret_ty.clone(),
        ret: renumber[function.ret.0].unwrap_or(function.ret),
        nodes,
    }
}
