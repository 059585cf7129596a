//! Abstract syntax tree.
//!
//! A [`Program`] is an ordered list of functions. A function may only invoke
//! functions defined before it, so programs are acyclic by construction. The
//! entry point is the function named [`ENTRY_POINT`].

use serde::{Deserialize, Serialize};

use crate::types::Type;
use crate::value::Value;

pub const ENTRY_POINT: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn entry(&self) -> Option<&Function> {
        self.function(ENTRY_POINT)
    }

    /// Number of expression nodes across all function bodies.
    pub fn node_count(&self) -> usize {
        self.functions.iter().map(|f| f.body.node_count()).sum()
    }

    /// True if any expression in the program satisfies `pred`.
    pub fn any_expr(&self, pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
        self.functions.iter().any(|f| f.body.any(pred))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Expr,
}

impl Function {
    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 17] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Xor,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Lt,
        BinaryOp::Le,
        BinaryOp::Gt,
        BinaryOp::Ge,
        BinaryOp::Concat,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Concat => "++",
        }
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    /// Ops whose operands and result share one bits type.
    pub fn is_same_type_arith(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
        )
    }
}

impl std::str::FromStr for BinaryOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "add" | "+" => BinaryOp::Add,
            "sub" | "-" => BinaryOp::Sub,
            "mul" | "*" => BinaryOp::Mul,
            "div" | "/" => BinaryOp::Div,
            "mod" | "%" => BinaryOp::Mod,
            "and" | "&" => BinaryOp::And,
            "or" | "|" => BinaryOp::Or,
            "xor" | "^" => BinaryOp::Xor,
            "shl" | "<<" => BinaryOp::Shl,
            "shr" | ">>" => BinaryOp::Shr,
            "eq" | "==" => BinaryOp::Eq,
            "ne" | "!=" => BinaryOp::Ne,
            "lt" | "<" => BinaryOp::Lt,
            "le" | "<=" => BinaryOp::Le,
            "gt" | ">" => BinaryOp::Gt,
            "ge" | ">=" => BinaryOp::Ge,
            "concat" | "++" => BinaryOp::Concat,
            other => return Err(format!("unknown binary operator '{other}'")),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    And,
    Or,
    Xor,
}

impl ReduceOp {
    pub fn builtin_name(self) -> &'static str {
        match self {
            ReduceOp::And => "and_reduce",
            ReduceOp::Or => "or_reduce",
            ReduceOp::Xor => "xor_reduce",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Value,
    },
    Var {
        name: String,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        to: Type,
    },
    /// `operand[start +: uN[width]]`
    Slice {
        operand: Box<Expr>,
        start: u32,
        width: u32,
    },
    Ternary {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Box<Expr>,
    },
    Let {
        name: String,
        ty: Type,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    Tuple {
        elements: Vec<Expr>,
    },
    TupleIndex {
        tuple: Box<Expr>,
        index: u32,
    },
    Array {
        elements: Vec<Expr>,
    },
    ArrayIndex {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    ArrayUpdate {
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    Reduce {
        op: ReduceOp,
        operand: Box<Expr>,
    },
    Invoke {
        callee: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn literal(value: Value) -> Expr {
        Expr::Literal { value }
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var { name: name.into() }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Direct sub-expressions, in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal { .. } | Expr::Var { .. } => Vec::new(),
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Unary { operand, .. }
            | Expr::Cast { operand, .. }
            | Expr::Slice { operand, .. }
            | Expr::Reduce { operand, .. } => vec![operand.as_ref()],
            Expr::Ternary {
                cond,
                on_true,
                on_false,
            } => vec![cond.as_ref(), on_true.as_ref(), on_false.as_ref()],
            Expr::Let { value, body, .. } => vec![value.as_ref(), body.as_ref()],
            Expr::Tuple { elements } | Expr::Array { elements } => elements.iter().collect(),
            Expr::TupleIndex { tuple, .. } => vec![tuple.as_ref()],
            Expr::ArrayIndex { array, index } => vec![array.as_ref(), index.as_ref()],
            Expr::ArrayUpdate {
                array,
                index,
                value,
            } => vec![array.as_ref(), index.as_ref(), value.as_ref()],
            Expr::Invoke { args, .. } => args.iter().collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().into_iter().map(Expr::node_count).sum::<usize>()
    }

    pub fn any(&self, pred: &mut dyn FnMut(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.children().into_iter().any(|child| child.any(pred))
    }
}
