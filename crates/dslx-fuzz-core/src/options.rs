//! Generator options.
//!
//! Options are built once through [`GeneratorOptions::builder`] (or loaded
//! from JSON and validated) and are read-only afterwards.

use std::fmt;
use std::path::Path;

use dslx_frontend::{BinaryOp, MAX_BITS_WIDTH};
use serde::{Deserialize, Serialize};

/// Deepest expression nesting the generator accepts. Program size grows
/// exponentially with depth.
pub const MAX_GENERATOR_DEPTH: u32 = 10;

/// Invalid generator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// A width limit of zero.
    ZeroWidth(&'static str),
    /// Bits types wider than the language supports.
    BitsWidthTooLarge { max: u32, got: u32 },
    /// Aggregates must be able to hold at least one bits value.
    AggregateNarrowerThanBits { aggregate: u32, bits: u32 },
    /// A count limit that must be at least one.
    ZeroLimit(&'static str),
    /// Expression depth above [`MAX_GENERATOR_DEPTH`].
    DepthTooLarge { max: u32, got: u32 },
    /// No binary operator survives the allowlist and divide filtering.
    EmptyBinopAllowlist,
    /// The options file could not be read or parsed.
    Load(String),
}

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionsError::ZeroWidth(field) => write!(f, "{field} must be at least 1"),
            OptionsError::BitsWidthTooLarge { max, got } => {
                write!(f, "max_width_bits_types {got} exceeds the supported {max}")
            }
            OptionsError::AggregateNarrowerThanBits { aggregate, bits } => write!(
                f,
                "max_width_aggregate_types ({aggregate}) is smaller than max_width_bits_types ({bits})"
            ),
            OptionsError::ZeroLimit(field) => write!(f, "{field} must be at least 1"),
            OptionsError::DepthTooLarge { max, got } => {
                write!(f, "max_depth {got} exceeds the supported {max}")
            }
            OptionsError::EmptyBinopAllowlist => {
                write!(f, "no binary operators left after applying the allowlist")
            }
            OptionsError::Load(message) => write!(f, "failed to load generator options: {message}"),
        }
    }
}

impl std::error::Error for OptionsError {}

/// Knobs for the random program generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    disallow_divide: bool,
    max_depth: u32,
    max_lets: u32,
    max_params: u32,
    max_helper_functions: u32,
    max_width_bits_types: u32,
    max_width_aggregate_types: u32,
    max_tuple_arity: u32,
    max_array_size: u32,
    emit_signed_types: bool,
    short_samples: bool,
    binop_allowlist: Option<Vec<BinaryOp>>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            disallow_divide: false,
            max_depth: 4,
            max_lets: 6,
            max_params: 4,
            max_helper_functions: 2,
            max_width_bits_types: 64,
            max_width_aggregate_types: 1024,
            max_tuple_arity: 4,
            max_array_size: 5,
            emit_signed_types: true,
            short_samples: false,
            binop_allowlist: None,
        }
    }
}

impl GeneratorOptions {
    pub fn builder() -> GeneratorOptionsBuilder {
        GeneratorOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Start a builder from these options, e.g. to apply CLI overrides.
    pub fn to_builder(&self) -> GeneratorOptionsBuilder {
        GeneratorOptionsBuilder {
            options: self.clone(),
        }
    }

    /// Parse and validate options from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: GeneratorOptions =
            serde_json::from_str(json).map_err(|e| OptionsError::Load(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| OptionsError::Load(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.max_width_bits_types == 0 {
            return Err(OptionsError::ZeroWidth("max_width_bits_types"));
        }
        if self.max_width_bits_types > MAX_BITS_WIDTH {
            return Err(OptionsError::BitsWidthTooLarge {
                max: MAX_BITS_WIDTH,
                got: self.max_width_bits_types,
            });
        }
        if self.max_width_aggregate_types == 0 {
            return Err(OptionsError::ZeroWidth("max_width_aggregate_types"));
        }
        if self.max_width_aggregate_types < self.max_width_bits_types {
            return Err(OptionsError::AggregateNarrowerThanBits {
                aggregate: self.max_width_aggregate_types,
                bits: self.max_width_bits_types,
            });
        }
        for (field, value) in [
            ("max_depth", self.max_depth),
            ("max_lets", self.max_lets),
            ("max_params", self.max_params),
            ("max_tuple_arity", self.max_tuple_arity),
            ("max_array_size", self.max_array_size),
        ] {
            if value == 0 {
                return Err(OptionsError::ZeroLimit(field));
            }
        }
        if self.max_depth > MAX_GENERATOR_DEPTH {
            return Err(OptionsError::DepthTooLarge {
                max: MAX_GENERATOR_DEPTH,
                got: self.max_depth,
            });
        }
        if self.allowed_binops().is_empty() {
            return Err(OptionsError::EmptyBinopAllowlist);
        }
        Ok(())
    }

    /// Binary operators the generator may emit, in a fixed order.
    pub fn allowed_binops(&self) -> Vec<BinaryOp> {
        BinaryOp::ALL
            .into_iter()
            .filter(|op| {
                self.binop_allowlist
                    .as_ref()
                    .map_or(true, |allow| allow.contains(op))
            })
            .filter(|op| !(self.disallow_divide && op.is_division()))
            .collect()
    }

    pub fn disallow_divide(&self) -> bool {
        self.disallow_divide
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Upper bound on `let` bindings per function body.
    pub fn max_lets(&self) -> u32 {
        if self.short_samples {
            self.max_lets.min(2)
        } else {
            self.max_lets
        }
    }

    pub fn max_params(&self) -> u32 {
        self.max_params
    }

    pub fn max_helper_functions(&self) -> u32 {
        if self.short_samples {
            0
        } else {
            self.max_helper_functions
        }
    }

    pub fn max_width_bits_types(&self) -> u32 {
        self.max_width_bits_types
    }

    pub fn max_width_aggregate_types(&self) -> u32 {
        self.max_width_aggregate_types
    }

    pub fn max_tuple_arity(&self) -> u32 {
        self.max_tuple_arity
    }

    pub fn max_array_size(&self) -> u32 {
        self.max_array_size
    }

    pub fn emit_signed_types(&self) -> bool {
        self.emit_signed_types
    }

    pub fn short_samples(&self) -> bool {
        self.short_samples
    }
}

/// Builder for [`GeneratorOptions`]; [`build`](Self::build) validates.
#[derive(Debug, Clone)]
pub struct GeneratorOptionsBuilder {
    options: GeneratorOptions,
}

impl GeneratorOptionsBuilder {
    pub fn disallow_divide(mut self, value: bool) -> Self {
        self.options.disallow_divide = value;
        self
    }

    pub fn max_depth(mut self, value: u32) -> Self {
        self.options.max_depth = value;
        self
    }

    pub fn max_lets(mut self, value: u32) -> Self {
        self.options.max_lets = value;
        self
    }

    pub fn max_params(mut self, value: u32) -> Self {
        self.options.max_params = value;
        self
    }

    pub fn max_helper_functions(mut self, value: u32) -> Self {
        self.options.max_helper_functions = value;
        self
    }

    pub fn max_width_bits_types(mut self, value: u32) -> Self {
        self.options.max_width_bits_types = value;
        self
    }

    pub fn max_width_aggregate_types(mut self, value: u32) -> Self {
        self.options.max_width_aggregate_types = value;
        self
    }

    pub fn max_tuple_arity(mut self, value: u32) -> Self {
        self.options.max_tuple_arity = value;
        self
    }

    pub fn max_array_size(mut self, value: u32) -> Self {
        self.options.max_array_size = value;
        self
    }

    pub fn emit_signed_types(mut self, value: bool) -> Self {
        self.options.emit_signed_types = value;
        self
    }

    pub fn short_samples(mut self, value: bool) -> Self {
        self.options.short_samples = value;
        self
    }

    pub fn binop_allowlist(mut self, ops: Option<Vec<BinaryOp>>) -> Self {
        self.options.binop_allowlist = ops;
        self
    }

    pub fn build(self) -> Result<GeneratorOptions, OptionsError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = GeneratorOptions::builder().build().unwrap();
        assert_eq!(options.allowed_binops().len(), BinaryOp::ALL.len());
    }

    #[test]
    fn test_disallow_divide_filters_ops() {
        let options = GeneratorOptions::builder()
            .disallow_divide(true)
            .build()
            .unwrap();
        let ops = options.allowed_binops();
        assert!(!ops.contains(&BinaryOp::Div));
        assert!(!ops.contains(&BinaryOp::Mod));
        assert!(ops.contains(&BinaryOp::Add));
    }

    #[test]
    fn test_rejects_invalid_widths() {
        assert_eq!(
            GeneratorOptions::builder().max_width_bits_types(0).build(),
            Err(OptionsError::ZeroWidth("max_width_bits_types"))
        );
        assert!(matches!(
            GeneratorOptions::builder().max_width_bits_types(65).build(),
            Err(OptionsError::BitsWidthTooLarge { .. })
        ));
        assert!(matches!(
            GeneratorOptions::builder()
                .max_width_aggregate_types(16)
                .max_width_bits_types(32)
                .build(),
            Err(OptionsError::AggregateNarrowerThanBits { .. })
        ));
    }

    #[test]
    fn test_rejects_excessive_depth() {
        assert!(GeneratorOptions::builder()
            .max_depth(MAX_GENERATOR_DEPTH)
            .build()
            .is_ok());
        assert_eq!(
            GeneratorOptions::builder().max_depth(64).build(),
            Err(OptionsError::DepthTooLarge {
                max: MAX_GENERATOR_DEPTH,
                got: 64
            })
        );
        assert!(matches!(
            GeneratorOptions::from_json(r#"{"max_depth": 11}"#),
            Err(OptionsError::DepthTooLarge { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_allowlist_after_divide_filter() {
        let result = GeneratorOptions::builder()
            .disallow_divide(true)
            .binop_allowlist(Some(vec![BinaryOp::Div, BinaryOp::Mod]))
            .build();
        assert_eq!(result, Err(OptionsError::EmptyBinopAllowlist));
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert_eq!(
            GeneratorOptions::builder().max_params(0).build(),
            Err(OptionsError::ZeroLimit("max_params"))
        );
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let options =
            GeneratorOptions::from_json(r#"{"disallow_divide": true, "binop_allowlist": ["add", "xor"]}"#)
                .unwrap();
        assert!(options.disallow_divide());
        assert_eq!(options.allowed_binops(), vec![BinaryOp::Add, BinaryOp::Xor]);
        assert_eq!(options.max_depth(), GeneratorOptions::default().max_depth());
    }

    #[test]
    fn test_short_samples_shrink_limits() {
        let options = GeneratorOptions::builder().short_samples(true).build().unwrap();
        assert_eq!(options.max_helper_functions(), 0);
        assert!(options.max_lets() <= 2);
    }
}
