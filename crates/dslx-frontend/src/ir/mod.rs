//! Dataflow IR.
//!
//! Each function is a list of nodes in topological order: a node's operands
//! always precede it. `let` bindings disappear during lowering and ternaries
//! become eager `Select` nodes.

pub mod eval;
pub mod lower;
pub mod opt;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{BinaryOp, ReduceOp, UnaryOp, ENTRY_POINT};
use crate::types::Type;
use crate::value::Value;

pub use eval::evaluate;
pub use lower::{lower_program, LowerError};
pub use opt::{optimize, OptStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Param(usize),
    Literal(Value),
    Binary(BinaryOp, NodeId, NodeId),
    Unary(UnaryOp, NodeId),
    Cast {
        operand: NodeId,
        signed: bool,
        width: u32,
    },
    Slice {
        operand: NodeId,
        start: u32,
        width: u32,
    },
    Select {
        cond: NodeId,
        on_true: NodeId,
        on_false: NodeId,
    },
    Tuple(Vec<NodeId>),
    TupleIndex(NodeId, u32),
    Array(Vec<NodeId>),
    ArrayIndex(NodeId, NodeId),
    ArrayUpdate {
        array: NodeId,
        index: NodeId,
        value: NodeId,
    },
    Reduce(ReduceOp, NodeId),
    Invoke {
        callee: String,
        args: Vec<NodeId>,
    },
}

impl Op {
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            Op::Param(_) | Op::Literal(_) => Vec::new(),
            Op::Binary(_, a, b) | Op::ArrayIndex(a, b) => vec![*a, *b],
            Op::Unary(_, a)
            | Op::Cast { operand: a, .. }
            | Op::Slice { operand: a, .. }
            | Op::TupleIndex(a, _)
            | Op::Reduce(_, a) => vec![*a],
            Op::Select {
                cond,
                on_true,
                on_false,
            } => vec![*cond, *on_true, *on_false],
            Op::ArrayUpdate {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Op::Tuple(items) | Op::Array(items) | Op::Invoke { args: items, .. } => items.clone(),
        }
    }

    /// Same op with every operand passed through `f`.
    pub fn map_operands(&self, mut f: impl FnMut(NodeId) -> NodeId) -> Op {
        match self {
            Op::Param(i) => Op::Param(*i),
            Op::Literal(v) => Op::Literal(v.clone()),
            Op::Binary(op, a, b) => Op::Binary(*op, f(*a), f(*b)),
            Op::Unary(op, a) => Op::Unary(*op, f(*a)),
            Op::Cast {
                operand,
                signed,
                width,
            } => Op::Cast {
                operand: f(*operand),
                signed: *signed,
                width: *width,
            },
            Op::Slice {
                operand,
                start,
                width,
            } => Op::Slice {
                operand: f(*operand),
                start: *start,
                width: *width,
            },
            Op::Select {
                cond,
                on_true,
                on_false,
            } => Op::Select {
                cond: f(*cond),
                on_true: f(*on_true),
                on_false: f(*on_false),
            },
            Op::Tuple(items) => Op::Tuple(items.iter().map(|i| f(*i)).collect()),
            Op::TupleIndex(a, index) => Op::TupleIndex(f(*a), *index),
            Op::Array(items) => Op::Array(items.iter().map(|i| f(*i)).collect()),
            Op::ArrayIndex(a, i) => Op::ArrayIndex(f(*a), f(*i)),
            Op::ArrayUpdate {
                array,
                index,
                value,
            } => Op::ArrayUpdate {
                array: f(*array),
                index: f(*index),
                value: f(*value),
            },
            Op::Reduce(op, a) => Op::Reduce(*op, f(*a)),
            Op::Invoke { callee, args } => Op::Invoke {
                callee: callee.clone(),
                args: args.iter().map(|i| f(*i)).collect(),
            },
        }
    }

    fn mnemonic(&self) -> String {
        match self {
            Op::Param(_) => "param".into(),
            Op::Literal(_) => "literal".into(),
            Op::Binary(op, ..) => format!("{op:?}").to_ascii_lowercase(),
            Op::Unary(op, _) => format!("{op:?}").to_ascii_lowercase(),
            Op::Cast { .. } => "convert".into(),
            Op::Slice { .. } => "bit_slice".into(),
            Op::Select { .. } => "sel".into(),
            Op::Tuple(_) => "tuple".into(),
            Op::TupleIndex(..) => "tuple_index".into(),
            Op::Array(_) => "array".into(),
            Op::ArrayIndex(..) => "array_index".into(),
            Op::ArrayUpdate { .. } => "array_update".into(),
            Op::Reduce(op, _) => op.builtin_name().into(),
            Op::Invoke { .. } => "invoke".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub op: Op,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<Type>,
    pub ret_ty: Type,
    pub nodes: Vec<Node>,
    pub ret: NodeId,
}

impl IrFunction {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

/// Lowered program; functions keep their source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub functions: Vec<IrFunction>,
}

impl Package {
    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn entry(&self) -> Option<&IrFunction> {
        self.function(ENTRY_POINT)
    }

    pub fn node_count(&self) -> usize {
        self.functions.iter().map(|f| f.nodes.len()).sum()
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "p{i}: {ty}")?;
        }
        writeln!(f, ") -> {} {{", self.ret_ty)?;
        for (i, node) in self.nodes.iter().enumerate() {
            write!(f, "  {}: {} = {}(", NodeId(i), node.ty, node.op.mnemonic())?;
            let mut extra = Vec::new();
            match &node.op {
                Op::Param(index) => extra.push(format!("index={index}")),
                Op::Literal(value) => extra.push(format!("value={value}")),
                Op::Cast { signed, width, .. } => {
                    extra.push(format!("new_bit_count={width}"));
                    extra.push(format!("signed={signed}"));
                }
                Op::Slice { start, width, .. } => {
                    extra.push(format!("start={start}"));
                    extra.push(format!("width={width}"));
                }
                Op::TupleIndex(_, index) => extra.push(format!("index={index}")),
                Op::Invoke { callee, .. } => extra.push(format!("to_apply={callee}")),
                _ => {}
            }
            let operands = node.op.operands();
            let parts: Vec<String> = operands
                .iter()
                .map(NodeId::to_string)
                .chain(extra)
                .collect();
            writeln!(f, "{})", parts.join(", "))?;
        }
        writeln!(f, "  ret {}", self.ret)?;
        writeln!(f, "}}")
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "package sample")?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
