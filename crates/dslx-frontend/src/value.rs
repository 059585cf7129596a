//! Runtime values and the reference bit-vector semantics.
//!
//! The interpreter and the IR evaluator both use the operations on [`Bits`];
//! the netlist simulator in `codegen::sim` carries its own implementation
//! over flattened bit vectors.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// All-ones mask for a width in `1..=64`.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// A fixed-width bit vector. `raw` never has bits set above `width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bits {
    pub signed: bool,
    pub width: u32,
    pub raw: u64,
}

impl Bits {
    pub fn new(signed: bool, width: u32, raw: u64) -> Self {
        Self {
            signed,
            width,
            raw: raw & mask(width),
        }
    }

    pub fn unsigned(width: u32, raw: u64) -> Self {
        Self::new(false, width, raw)
    }

    pub fn from_bool(value: bool) -> Self {
        Self::unsigned(1, u64::from(value))
    }

    pub fn ty(&self) -> Type {
        Type::Bits {
            signed: self.signed,
            width: self.width,
        }
    }

    fn same_shape(&self, raw: u64) -> Self {
        Self::new(self.signed, self.width, raw)
    }

    fn sign_bit(&self) -> bool {
        (self.raw >> (self.width - 1)) & 1 == 1
    }

    /// Value as a two's complement integer, sign-extended from `width`.
    pub fn to_i64(&self) -> i64 {
        if self.sign_bit() && self.width < 64 {
            (self.raw | !mask(self.width)) as i64
        } else {
            self.raw as i64
        }
    }

    fn is_negative(&self) -> bool {
        self.signed && self.sign_bit()
    }

    fn signed_min(&self) -> u64 {
        1u64 << (self.width - 1)
    }

    pub fn is_true(&self) -> bool {
        self.raw != 0
    }

    pub fn add(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw.wrapping_add(rhs.raw))
    }

    pub fn sub(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw.wrapping_sub(rhs.raw))
    }

    pub fn mul(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw.wrapping_mul(rhs.raw))
    }

    pub fn div(&self, rhs: &Bits) -> Bits {
        if !self.signed {
            if rhs.raw == 0 {
                return self.same_shape(u64::MAX);
            }
            return self.same_shape(self.raw / rhs.raw);
        }
        let (a, b) = (self.to_i64(), rhs.to_i64());
        if b == 0 {
            return if a < 0 {
                self.same_shape(self.signed_min())
            } else {
                self.same_shape(self.signed_min() - 1)
            };
        }
        if self.raw == self.signed_min() && b == -1 {
            return *self;
        }
        self.same_shape(a.wrapping_div(b) as u64)
    }

    pub fn rem(&self, rhs: &Bits) -> Bits {
        if rhs.raw == 0 {
            return self.same_shape(0);
        }
        if !self.signed {
            return self.same_shape(self.raw % rhs.raw);
        }
        let (a, b) = (self.to_i64(), rhs.to_i64());
        if self.raw == self.signed_min() && b == -1 {
            return self.same_shape(0);
        }
        self.same_shape(a.wrapping_rem(b) as u64)
    }

    pub fn and(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw & rhs.raw)
    }

    pub fn or(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw | rhs.raw)
    }

    pub fn xor(&self, rhs: &Bits) -> Bits {
        self.same_shape(self.raw ^ rhs.raw)
    }

    pub fn shl(&self, amount: u64) -> Bits {
        if amount >= u64::from(self.width) {
            return self.same_shape(0);
        }
        self.same_shape(self.raw << amount)
    }

    /// Arithmetic for signed values, logical otherwise.
    pub fn shr(&self, amount: u64) -> Bits {
        if self.is_negative() {
            if amount >= u64::from(self.width) {
                return self.same_shape(u64::MAX);
            }
            return self.same_shape((self.to_i64() >> amount) as u64);
        }
        if amount >= u64::from(self.width) {
            return self.same_shape(0);
        }
        self.same_shape(self.raw >> amount)
    }

    pub fn neg(&self) -> Bits {
        self.same_shape(self.raw.wrapping_neg())
    }

    pub fn not(&self) -> Bits {
        self.same_shape(!self.raw)
    }

    /// Ordering honouring the signedness of `self`.
    pub fn compare(&self, rhs: &Bits) -> Ordering {
        if self.signed {
            self.to_i64().cmp(&rhs.to_i64())
        } else {
            self.raw.cmp(&rhs.raw)
        }
    }

    /// `self ++ rhs`; `self` lands in the most significant bits.
    pub fn concat(&self, rhs: &Bits) -> Bits {
        let width = self.width + rhs.width;
        let high = if rhs.width >= 64 { 0 } else { self.raw << rhs.width };
        Bits::unsigned(width, high | rhs.raw)
    }

    /// Width conversion: truncate, or extend according to the source signedness.
    pub fn cast(&self, signed: bool, width: u32) -> Bits {
        let raw = if width > self.width && self.is_negative() {
            self.to_i64() as u64
        } else {
            self.raw
        };
        Bits::new(signed, width, raw)
    }

    pub fn slice(&self, start: u32, width: u32) -> Bits {
        let shifted = if start >= 64 { 0 } else { self.raw >> start };
        Bits::unsigned(width, shifted)
    }

    pub fn and_reduce(&self) -> Bits {
        Bits::from_bool(self.raw == mask(self.width))
    }

    pub fn or_reduce(&self) -> Bits {
        Bits::from_bool(self.raw != 0)
    }

    pub fn xor_reduce(&self) -> Bits {
        Bits::from_bool(self.raw.count_ones() % 2 == 1)
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.signed {
            write!(f, "s{}:{}", self.width, self.to_i64())
        } else {
            write!(f, "u{}:{}", self.width, self.raw)
        }
    }
}

/// A runtime value. Equality is structural and bit-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Bits(Bits),
    Tuple(Vec<Value>),
    /// Always non-empty.
    Array(Vec<Value>),
}

impl Value {
    pub fn ubits(width: u32, raw: u64) -> Self {
        Value::Bits(Bits::unsigned(width, raw))
    }

    pub fn sbits(width: u32, value: i64) -> Self {
        Value::Bits(Bits::new(true, width, value as u64))
    }

    pub fn bool(value: bool) -> Self {
        Value::Bits(Bits::from_bool(value))
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Bits(bits) => bits.ty(),
            Value::Tuple(elements) => Type::tuple(elements.iter().map(Value::ty).collect()),
            Value::Array(elements) => Type::array(
                elements.first().map(Value::ty).unwrap_or_else(|| Type::ubits(1)),
                elements.len() as u32,
            ),
        }
    }

    /// All-zero value of the given type.
    pub fn zero(ty: &Type) -> Value {
        match ty {
            Type::Bits { signed, width } => Value::Bits(Bits::new(*signed, *width, 0)),
            Type::Tuple { elements } => Value::Tuple(elements.iter().map(Value::zero).collect()),
            Type::Array { element, size } => {
                Value::Array((0..*size).map(|_| Value::zero(element)).collect())
            }
        }
    }

    /// Does this value inhabit `ty`?
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Bits(bits), Type::Bits { signed, width }) => {
                bits.signed == *signed && bits.width == *width && bits.raw & !mask(*width) == 0
            }
            (Value::Tuple(values), Type::Tuple { elements }) => {
                values.len() == elements.len()
                    && values.iter().zip(elements).all(|(v, t)| v.conforms_to(t))
            }
            (Value::Array(values), Type::Array { element, size }) => {
                values.len() == *size as usize && values.iter().all(|v| v.conforms_to(element))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bits(bits) => write!(f, "{bits}"),
            Value::Tuple(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                if elements.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Array(elements) => {
                write!(f, "{}:[", self.ty())?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
        }
    }
}
