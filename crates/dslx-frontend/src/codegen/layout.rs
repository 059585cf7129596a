//! Flat bit layout of values.
//!
//! Aggregates flatten with element 0 in the most significant bits, the same
//! order `++` uses for bits values.

use std::fmt;

use crate::types::Type;
use crate::value::{Bits, Value};

/// Bit vector of arbitrary width, stored least significant bit first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitVec {
    bits: Vec<bool>,
}

impl BitVec {
    pub fn zeros(width: usize) -> Self {
        Self {
            bits: vec![false; width],
        }
    }

    pub fn from_u64(width: u32, raw: u64) -> Self {
        let bits = (0..width).map(|i| i < 64 && (raw >> i) & 1 == 1).collect();
        Self { bits }
    }

    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn bit(&self, index: usize) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Low 64 bits as an integer.
    pub fn to_u64(&self) -> u64 {
        self.bits
            .iter()
            .take(64)
            .enumerate()
            .fold(0, |acc, (i, b)| acc | (u64::from(*b) << i))
    }

    pub fn extract(&self, start: usize, width: usize) -> BitVec {
        Self {
            bits: (start..start + width).map(|i| self.bit(i)).collect(),
        }
    }

    /// Concatenate with `parts[0]` in the most significant position.
    pub fn concat<'a>(parts: impl DoubleEndedIterator<Item = &'a BitVec>) -> BitVec {
        let mut bits = Vec::new();
        for part in parts.rev() {
            bits.extend_from_slice(&part.bits);
        }
        Self { bits }
    }

    pub fn most_significant(&self) -> bool {
        self.bits.last().copied().unwrap_or(false)
    }
}

impl fmt::LowerHex for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits.is_empty() {
            return write!(f, "0");
        }
        let digits = (self.bits.len() + 3) / 4;
        for d in (0..digits).rev() {
            let nibble = (0..4).fold(0u32, |acc, i| acc | (u32::from(self.bit(d * 4 + i)) << i));
            write!(f, "{nibble:x}")?;
        }
        Ok(())
    }
}

pub fn flatten(value: &Value) -> BitVec {
    match value {
        Value::Bits(bits) => BitVec::from_u64(bits.width, bits.raw),
        Value::Tuple(elements) | Value::Array(elements) => {
            let parts: Vec<BitVec> = elements.iter().map(flatten).collect();
            BitVec::concat(parts.iter())
        }
    }
}

/// Rebuild a value of type `ty` from its flat form. Missing bits read as 0.
pub fn unflatten(bits: &BitVec, ty: &Type) -> Value {
    unflatten_at(bits, 0, ty)
}

fn unflatten_at(bits: &BitVec, lsb: usize, ty: &Type) -> Value {
    match ty {
        Type::Bits { signed, width } => {
            let raw = bits.extract(lsb, *width as usize).to_u64();
            Value::Bits(Bits::new(*signed, *width, raw))
        }
        Type::Tuple { elements } => {
            let mut offset = lsb;
            let mut values: Vec<Value> = Vec::with_capacity(elements.len());
            for element in elements.iter().rev() {
                values.push(unflatten_at(bits, offset, element));
                offset += element.flat_bit_count() as usize;
            }
            values.reverse();
            Value::Tuple(values)
        }
        Type::Array { element, size } => {
            let stride = element.flat_bit_count() as usize;
            let values = (0..*size as usize)
                .map(|i| unflatten_at(bits, lsb + (*size as usize - 1 - i) * stride, element))
                .collect();
            Value::Array(values)
        }
    }
}

/// Bit offset (from the LSB) and width of tuple element `index`.
pub fn tuple_element_span(elements: &[Type], index: usize) -> (u64, u64) {
    let offset = elements[index + 1..]
        .iter()
        .map(Type::flat_bit_count)
        .sum();
    (offset, elements[index].flat_bit_count())
}

/// Bit offset (from the LSB) and width of array element `index`.
pub fn array_element_span(element: &Type, size: u32, index: u32) -> (u64, u64) {
    let stride = element.flat_bit_count();
    (u64::from(size - 1 - index) * stride, stride)
}
