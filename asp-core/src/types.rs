//! Declared types, width classes and exact integer literals
//!
//! Every binding carries a [`DataType`] fixed at declaration. Integer types
//! map onto a [`WidthClass`], which is also what the cycle accountant charges.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Fault;

// ═══════════════════════════════════════════════════════════════════════════════
// WIDTH CLASSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Width class of a storage slot
///
/// Serialized as its bit count (`16`, `32`, `64`, `128`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum WidthClass {
    W16,
    W32,
    W64,
    W128,
}

impl WidthClass {
    /// All classes, in ascending order
    pub const ALL: [WidthClass; 4] = [Self::W16, Self::W32, Self::W64, Self::W128];

    /// Number of classes (size of per-class tables)
    pub const COUNT: usize = 4;

    pub const fn bits(self) -> u32 {
        match self {
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
            Self::W128 => 128,
        }
    }

    /// Position in per-class tables
    pub const fn index(self) -> usize {
        match self {
            Self::W16 => 0,
            Self::W32 => 1,
            Self::W64 => 2,
            Self::W128 => 3,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(Self::W16),
            32 => Some(Self::W32),
            64 => Some(Self::W64),
            128 => Some(Self::W128),
            _ => None,
        }
    }

    /// Bit mask `2^bits - 1`
    pub const fn mask(self) -> u128 {
        match self {
            Self::W128 => u128::MAX,
            other => (1u128 << other.bits()) - 1,
        }
    }

    /// Integer type of this width
    pub const fn int_type(self) -> DataType {
        match self {
            Self::W16 => DataType::I16,
            Self::W32 => DataType::I32,
            Self::W64 => DataType::I64,
            Self::W128 => DataType::I128,
        }
    }
}

impl TryFrom<u32> for WidthClass {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::from_bits(bits).ok_or_else(|| format!("unsupported register width {bits} (expected 16, 32, 64 or 128)"))
    }
}

impl From<WidthClass> for u32 {
    fn from(class: WidthClass) -> u32 {
        class.bits()
    }
}

impl fmt::Display for WidthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.bits())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DATA TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Declared type of a register or variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Char,
    Str,
}

impl DataType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::I128 => "i128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::Str => "str",
        }
    }

    /// Width class used for masking and cycle accounting
    pub const fn width_class(self) -> WidthClass {
        match self {
            Self::I16 => WidthClass::W16,
            Self::I32 | Self::F32 | Self::Char => WidthClass::W32,
            Self::I64 | Self::F64 => WidthClass::W64,
            Self::I128 | Self::Str => WidthClass::W128,
        }
    }

    pub const fn is_int(self) -> bool {
        matches!(self, Self::I16 | Self::I32 | Self::I64 | Self::I128)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl FromStr for DataType {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "i16" | "int16" => Ok(Self::I16),
            "i32" | "int32" => Ok(Self::I32),
            "i64" | "int64" => Ok(Self::I64),
            "i128" | "int128" => Ok(Self::I128),
            "f32" | "float32" => Ok(Self::F32),
            "f64" | "float64" => Ok(Self::F64),
            "char" => Ok(Self::Char),
            "str" | "string" => Ok(Self::Str),
            _ => Err(Fault::InvalidType(s.to_string())),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INTEGER LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Exact signed integer in `-2^127 ..= 2^128 - 1`
///
/// Stored integers are always non-negative (already reduced modulo `2^W`);
/// negative values only come from literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntLit {
    negative: bool,
    magnitude: u128,
}

impl IntLit {
    pub const ZERO: IntLit = IntLit { negative: false, magnitude: 0 };

    pub const fn from_unsigned(value: u128) -> Self {
        Self { negative: false, magnitude: value }
    }

    pub fn from_i128(value: i128) -> Self {
        Self {
            negative: value < 0,
            magnitude: value.unsigned_abs(),
        }
    }

    /// Truncate a float toward zero; saturates at the representable range
    pub fn from_f64_trunc(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        let t = value.trunc();
        if t < 0.0 {
            let magnitude = ((-t) as u128).min(1u128 << 127);
            Self::new(true, magnitude)
        } else {
            Self::from_unsigned(t as u128)
        }
    }

    fn new(negative: bool, magnitude: u128) -> Self {
        Self {
            negative: negative && magnitude != 0,
            magnitude,
        }
    }

    pub const fn is_negative(self) -> bool {
        self.negative
    }

    pub const fn is_zero(self) -> bool {
        self.magnitude == 0
    }

    pub const fn magnitude(self) -> u128 {
        self.magnitude
    }

    /// Two's-complement image modulo `2^128`
    pub const fn wrapping_u128(self) -> u128 {
        if self.negative {
            self.magnitude.wrapping_neg()
        } else {
            self.magnitude
        }
    }

    pub fn to_f64(self) -> f64 {
        let m = self.magnitude as f64;
        if self.negative { -m } else { m }
    }
}

impl Ord for IntLit {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for IntLit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for IntLit {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Fault::InvalidLiteral(s.to_string()));
        }
        let magnitude: u128 = digits
            .parse()
            .map_err(|_| Fault::InvalidLiteral(s.to_string()))?;
        if negative && magnitude > 1u128 << 127 {
            return Err(Fault::InvalidLiteral(s.to_string()));
        }
        Ok(Self::new(negative, magnitude))
    }
}

impl fmt::Display for IntLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}
