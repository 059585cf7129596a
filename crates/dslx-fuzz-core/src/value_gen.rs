//! Boundary-heavy random value generation.
//!
//! Generates [`Value`]s for any language type with an aggressive boundary
//! distribution: ~40% exact boundaries, ~30% near-boundary, ~30% uniform.
//! Draws come from the caller's RNG so a whole session stays reproducible
//! from one seed.

use dslx_frontend::value::mask;
use dslx_frontend::{Bits, Type, Value};
use rand::rngs::StdRng;
use rand::Rng;

use crate::sample::ArgumentSet;

/// Random value generator with boundary-heavy distribution.
pub struct ArgumentGenerator<'a> {
    rng: &'a mut StdRng,
}

impl<'a> ArgumentGenerator<'a> {
    pub fn new(rng: &'a mut StdRng) -> Self {
        Self { rng }
    }

    /// One value per parameter type, in order.
    pub fn generate_args(&mut self, params: &[Type]) -> ArgumentSet {
        ArgumentSet(params.iter().map(|ty| self.generate(ty)).collect())
    }

    /// Generate a random value of `ty`.
    pub fn generate(&mut self, ty: &Type) -> Value {
        match ty {
            Type::Bits { signed, width } => Value::Bits(self.gen_bits(*signed, *width)),
            Type::Tuple { elements } => {
                Value::Tuple(elements.iter().map(|e| self.generate(e)).collect())
            }
            Type::Array { element, size } => {
                Value::Array((0..*size).map(|_| self.generate(element)).collect())
            }
        }
    }

    fn gen_bits(&mut self, signed: bool, width: u32) -> Bits {
        let boundaries = boundaries(width);
        Bits::new(signed, width, self.gen_raw(&boundaries, width))
    }

    /// Generate raw bits with boundary-heavy distribution.
    fn gen_raw(&mut self, boundaries: &[u64], width: u32) -> u64 {
        let max = mask(width);
        let tier: f64 = self.rng.gen();
        if tier < 0.4 {
            // Exact boundary value
            boundaries[self.rng.gen_range(0..boundaries.len())]
        } else if tier < 0.7 {
            // Near-boundary: pick a boundary, offset by ±1..16 (wrapping)
            let base = boundaries[self.rng.gen_range(0..boundaries.len())];
            let offset = self.rng.gen_range(1..=16_u64);
            if self.rng.gen_bool(0.5) {
                base.wrapping_add(offset) & max
            } else {
                base.wrapping_sub(offset) & max
            }
        } else {
            // Uniform random
            self.rng.gen_range(0..=max)
        }
    }
}

/// Interesting raw bit patterns for a bits type of `width`: zero, one,
/// all ones, and the values around the sign bit. Sorted and deduplicated.
fn boundaries(width: u32) -> Vec<u64> {
    let max = mask(width);
    let mut values = vec![0, 1, max];
    if width > 1 {
        let msb = 1u64 << (width - 1);
        values.extend([msb, msb - 1, max - 1]);
        if width > 2 {
            values.extend([2, msb + 1]);
        }
    }
    values.sort_unstable();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_values_conform_to_type() {
        let mut rng = StdRng::seed_from_u64(7);
        let ty = Type::tuple(vec![
            Type::sbits(1),
            Type::array(Type::ubits(13), 3),
            Type::tuple(vec![Type::ubits(64)]),
        ]);
        let mut gen = ArgumentGenerator::new(&mut rng);
        for _ in 0..200 {
            assert!(gen.generate(&ty).conforms_to(&ty));
        }
    }

    #[test]
    fn test_deterministic_from_seed() {
        let params = vec![Type::ubits(8), Type::sbits(33)];
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(
                ArgumentGenerator::new(&mut a).generate_args(&params),
                ArgumentGenerator::new(&mut b).generate_args(&params)
            );
        }
    }

    #[test]
    fn test_hits_boundaries() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut gen = ArgumentGenerator::new(&mut rng);
        let values: Vec<u64> = (0..500)
            .map(|_| gen.gen_bits(false, 8).raw)
            .collect();
        assert!(values.contains(&0));
        assert!(values.contains(&255));
        assert!(values.contains(&128));
    }

    #[test]
    fn test_boundaries_fit_width() {
        for width in 1..=64 {
            assert!(boundaries(width).iter().all(|b| *b <= mask(width)));
        }
    }
}
