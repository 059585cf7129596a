//! Code generation: IR to a flat, bit-level netlist.
//!
//! Every IR value becomes a single wire carrying its flattened bits (see
//! [`layout`]). Function invocations are inlined, so the netlist for a package
//! is one combinational block with one input port per entry parameter and a
//! single output port. The netlist can be simulated ([`sim`]) or printed as
//! Verilog ([`verilog`]).

pub mod layout;
pub mod sim;
pub mod verilog;

use std::fmt;

use tracing::debug;

use crate::ast::{BinaryOp, ReduceOp, UnaryOp};
use crate::ir::{IrFunction, NodeId, Op, Package};
use crate::types::Type;
use layout::{array_element_span, flatten, tuple_element_span, BitVec};

pub use sim::simulate;
pub use verilog::emit_verilog;

/// Nesting limit for inlined invocations.
const MAX_INLINE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenError(pub String);

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codegen failed: {}", self.0)
    }
}

impl std::error::Error for CodegenError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireId(pub usize);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The driver of a wire. Arithmetic cells only see wires of at most 64 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Input { port: usize },
    Const { bits: BitVec },
    Arith {
        op: ArithOp,
        signed: bool,
        a: WireId,
        b: WireId,
    },
    Compare {
        op: CmpOp,
        signed: bool,
        a: WireId,
        b: WireId,
    },
    Neg { a: WireId },
    Not { a: WireId },
    /// Truncate or extend `a` to the wire width.
    Resize { a: WireId, sign_extend: bool },
    /// `parts[0]` lands in the most significant bits.
    Concat { parts: Vec<WireId> },
    /// Bits `start..start + width` of `a`.
    Extract { a: WireId, start: u64 },
    Mux {
        sel: WireId,
        on_true: WireId,
        on_false: WireId,
    },
    /// 1 when `a` equals `value`.
    EqConst { a: WireId, value: u64 },
    Reduce { op: ReduceOp, a: WireId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub width: u64,
    pub cell: Cell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Netlist {
    pub name: String,
    pub inputs: Vec<Type>,
    pub output_ty: Type,
    /// Topologically ordered: a cell only reads lower-numbered wires.
    pub wires: Vec<Wire>,
    pub output: WireId,
}

impl Netlist {
    /// Build the netlist for the package entry point.
    pub fn from_package(package: &Package) -> Result<Netlist, CodegenError> {
        let entry = package
            .entry()
            .ok_or_else(|| CodegenError("package has no entry function".into()))?;
        let mut builder = NetlistBuilder {
            package,
            wires: Vec::new(),
        };
        let inputs: Vec<WireId> = entry
            .params
            .iter()
            .enumerate()
            .map(|(port, ty)| builder.add(ty.flat_bit_count(), Cell::Input { port }))
            .collect();
        let output = builder.lower_function(entry, &inputs, 0)?;
        debug!(wires = builder.wires.len(), "built netlist");
        Ok(Netlist {
            name: entry.name.clone(),
            inputs: entry.params.clone(),
            output_ty: entry.ret_ty.clone(),
            wires: builder.wires,
            output,
        })
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.0]
    }

    pub fn cell_count(&self) -> usize {
        self.wires
            .iter()
            .filter(|w| !matches!(w.cell, Cell::Input { .. }))
            .count()
    }
}

struct NetlistBuilder<'p> {
    package: &'p Package,
    wires: Vec<Wire>,
}

impl NetlistBuilder<'_> {
    fn add(&mut self, width: u64, cell: Cell) -> WireId {
        self.wires.push(Wire { width, cell });
        WireId(self.wires.len() - 1)
    }

    fn width(&self, id: WireId) -> u64 {
        self.wires[id.0].width
    }

    fn lower_function(
        &mut self,
        function: &IrFunction,
        args: &[WireId],
        depth: usize,
    ) -> Result<WireId, CodegenError> {
        if depth > MAX_INLINE_DEPTH {
            return Err(CodegenError(format!(
                "inlining '{}' exceeds depth {MAX_INLINE_DEPTH}",
                function.name
            )));
        }
        let mut map: Vec<WireId> = Vec::with_capacity(function.nodes.len());
        for node in &function.nodes {
            let w = |id: &NodeId| map[id.0];
            let width = node.ty.flat_bit_count();
            let wire = match &node.op {
                Op::Param(index) => *args.get(*index).ok_or_else(|| {
                    CodegenError(format!("'{}' has no parameter {index}", function.name))
                })?,
                Op::Literal(value) => self.add(
                    width,
                    Cell::Const {
                        bits: flatten(value),
                    },
                ),
                Op::Binary(op, a, b) => {
                    let signed = function
                        .node(*a)
                        .ty
                        .as_bits()
                        .map_or(false, |(signed, _)| signed);
                    let (a, b) = (w(a), w(b));
                    let cell = match binary_cell(*op) {
                        BinaryCell::Arith(op) => Cell::Arith { op, signed, a, b },
                        BinaryCell::Compare(op) => Cell::Compare { op, signed, a, b },
                        BinaryCell::Concat => Cell::Concat { parts: vec![a, b] },
                    };
                    self.add(width, cell)
                }
                Op::Unary(UnaryOp::Neg, a) => self.add(width, Cell::Neg { a: w(a) }),
                Op::Unary(UnaryOp::Not, a) => self.add(width, Cell::Not { a: w(a) }),
                Op::Cast { operand, .. } => {
                    let sign_extend = function
                        .node(*operand)
                        .ty
                        .as_bits()
                        .map_or(false, |(signed, _)| signed);
                    self.add(
                        width,
                        Cell::Resize {
                            a: w(operand),
                            sign_extend,
                        },
                    )
                }
                Op::Slice { operand, start, .. } => self.add(
                    width,
                    Cell::Extract {
                        a: w(operand),
                        start: u64::from(*start),
                    },
                ),
                Op::Select {
                    cond,
                    on_true,
                    on_false,
                } => self.add(
                    width,
                    Cell::Mux {
                        sel: w(cond),
                        on_true: w(on_true),
                        on_false: w(on_false),
                    },
                ),
                Op::Tuple(items) | Op::Array(items) => self.add(
                    width,
                    Cell::Concat {
                        parts: items.iter().map(w).collect(),
                    },
                ),
                Op::TupleIndex(tuple, index) => {
                    let Type::Tuple { elements } = &function.node(*tuple).ty else {
                        return Err(CodegenError(format!("tuple index on {}", node.ty)));
                    };
                    let (start, width) = tuple_element_span(elements, *index as usize);
                    self.add(width, Cell::Extract { a: w(tuple), start })
                }
                Op::ArrayIndex(array, index) => {
                    let elements = self.array_elements(&function.node(*array).ty, w(array))?;
                    self.clamped_index(&elements, w(index))
                }
                Op::ArrayUpdate {
                    array,
                    index,
                    value,
                } => {
                    let elements = self.array_elements(&function.node(*array).ty, w(array))?;
                    let (index, value) = (w(index), w(value));
                    let parts = elements
                        .iter()
                        .enumerate()
                        .map(|(i, element)| {
                            let hit = self.add(
                                1,
                                Cell::EqConst {
                                    a: index,
                                    value: i as u64,
                                },
                            );
                            let element_width = self.width(*element);
                            self.add(
                                element_width,
                                Cell::Mux {
                                    sel: hit,
                                    on_true: value,
                                    on_false: *element,
                                },
                            )
                        })
                        .collect();
                    self.add(width, Cell::Concat { parts })
                }
                Op::Reduce(op, a) => self.add(1, Cell::Reduce { op: *op, a: w(a) }),
                Op::Invoke { callee, args } => {
                    let target = self
                        .package
                        .function(callee)
                        .ok_or_else(|| CodegenError(format!("unknown function '{callee}'")))?;
                    let args: Vec<WireId> = args.iter().map(w).collect();
                    self.lower_function(target, &args, depth + 1)?
                }
            };
            map.push(wire);
        }
        Ok(map[function.ret.0])
    }

    fn array_elements(&mut self, ty: &Type, array: WireId) -> Result<Vec<WireId>, CodegenError> {
        let Type::Array { element, size } = ty else {
            return Err(CodegenError(format!("array operation on {ty}")));
        };
        Ok((0..*size)
            .map(|i| {
                let (start, width) = array_element_span(element, *size, i);
                self.add(width, Cell::Extract { a: array, start })
            })
            .collect())
    }

    /// Select `elements[index]`, clamping out-of-range indices to the last
    /// element.
    fn clamped_index(&mut self, elements: &[WireId], index: WireId) -> WireId {
        let (last, rest) = match elements.split_last() {
            Some(split) => split,
            None => return index,
        };
        let width = self.width(*last);
        let mut result = *last;
        for (i, element) in rest.iter().enumerate().rev() {
            let hit = self.add(
                1,
                Cell::EqConst {
                    a: index,
                    value: i as u64,
                },
            );
            result = self.add(
                width,
                Cell::Mux {
                    sel: hit,
                    on_true: *element,
                    on_false: result,
                },
            );
        }
        result
    }
}

enum BinaryCell {
    Arith(ArithOp),
    Compare(CmpOp),
    Concat,
}

fn binary_cell(op: BinaryOp) -> BinaryCell {
    match op {
        BinaryOp::Add => BinaryCell::Arith(ArithOp::Add),
        BinaryOp::Sub => BinaryCell::Arith(ArithOp::Sub),
        BinaryOp::Mul => BinaryCell::Arith(ArithOp::Mul),
        BinaryOp::Div => BinaryCell::Arith(ArithOp::Div),
        BinaryOp::Mod => BinaryCell::Arith(ArithOp::Mod),
        BinaryOp::And => BinaryCell::Arith(ArithOp::And),
        BinaryOp::Or => BinaryCell::Arith(ArithOp::Or),
        BinaryOp::Xor => BinaryCell::Arith(ArithOp::Xor),
        BinaryOp::Shl => BinaryCell::Arith(ArithOp::Shl),
        BinaryOp::Shr => BinaryCell::Arith(ArithOp::Shr),
        BinaryOp::Eq => BinaryCell::Compare(CmpOp::Eq),
        BinaryOp::Ne => BinaryCell::Compare(CmpOp::Ne),
        BinaryOp::Lt => BinaryCell::Compare(CmpOp::Lt),
        BinaryOp::Le => BinaryCell::Compare(CmpOp::Le),
        BinaryOp::Gt => BinaryCell::Compare(CmpOp::Gt),
        BinaryOp::Ge => BinaryCell::Compare(CmpOp::Ge),
        BinaryOp::Concat => BinaryCell::Concat,
    }
}
