//! Type model for the bit-vector language.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Widest bits type the language supports.
pub const MAX_BITS_WIDTH: u32 = 64;

/// A concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// `uN` / `sN` with `N` in `1..=64`.
    Bits { signed: bool, width: u32 },
    /// `(T0, T1, ...)`, arity >= 1.
    Tuple { elements: Vec<Type> },
    /// `T[N]`, N >= 1.
    Array { element: Box<Type>, size: u32 },
}

impl Type {
    pub fn ubits(width: u32) -> Self {
        Type::Bits {
            signed: false,
            width,
        }
    }

    pub fn sbits(width: u32) -> Self {
        Type::Bits {
            signed: true,
            width,
        }
    }

    /// The boolean type, `u1`.
    pub fn bool() -> Self {
        Type::ubits(1)
    }

    pub fn tuple(elements: Vec<Type>) -> Self {
        Type::Tuple { elements }
    }

    pub fn array(element: Type, size: u32) -> Self {
        Type::Array {
            element: Box::new(element),
            size,
        }
    }

    pub fn is_bits(&self) -> bool {
        matches!(self, Type::Bits { .. })
    }

    pub fn is_unsigned_bits(&self) -> bool {
        matches!(self, Type::Bits { signed: false, .. })
    }

    /// `(signed, width)` for bits types.
    pub fn as_bits(&self) -> Option<(bool, u32)> {
        match self {
            Type::Bits { signed, width } => Some((*signed, *width)),
            _ => None,
        }
    }

    /// Number of bits when the value is flattened into a bit vector.
    pub fn flat_bit_count(&self) -> u64 {
        match self {
            Type::Bits { width, .. } => u64::from(*width),
            Type::Tuple { elements } => elements.iter().map(Type::flat_bit_count).sum(),
            Type::Array { element, size } => element.flat_bit_count() * u64::from(*size),
        }
    }

    /// Nesting depth; bits types are depth 0.
    pub fn depth(&self) -> u32 {
        match self {
            Type::Bits { .. } => 0,
            Type::Tuple { elements } => 1 + elements.iter().map(Type::depth).max().unwrap_or(0),
            Type::Array { element, .. } => 1 + element.depth(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bits { signed, width } => {
                write!(f, "{}{}", if *signed { 's' } else { 'u' }, width)
            }
            Type::Tuple { elements } => {
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
            Type::Array { element, size } => write!(f, "{element}[{size}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Type::ubits(8).to_string(), "u8");
        assert_eq!(Type::sbits(3).to_string(), "s3");
        assert_eq!(
            Type::tuple(vec![Type::ubits(1), Type::sbits(7)]).to_string(),
            "(u1, s7)"
        );
        assert_eq!(Type::tuple(vec![Type::ubits(4)]).to_string(), "(u4,)");
        assert_eq!(Type::array(Type::ubits(4), 3).to_string(), "u4[3]");
    }

    #[test]
    fn test_flat_bit_count() {
        let ty = Type::tuple(vec![Type::array(Type::ubits(4), 3), Type::sbits(5)]);
        assert_eq!(ty.flat_bit_count(), 17);
        assert_eq!(ty.depth(), 2);
    }
}
