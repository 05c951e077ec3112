//! Runtime values and the per-type arithmetic/comparison kernels
//!
//! The store and engine never branch on widths themselves: they hand a
//! [`Value`] and the destination [`DataType`] to [`apply`], [`compare`] or
//! [`coerce`], which pick one implementation per tag and mask exactly once.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Fault, FaultResult};
use crate::types::{DataType, IntLit, WidthClass};

/// A typed runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(IntLit),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
}

impl Value {
    /// Zero value a fresh binding of `ty` starts with
    pub fn zero(ty: DataType) -> Self {
        match ty {
            DataType::F32 => Self::F32(0.0),
            DataType::F64 => Self::F64(0.0),
            DataType::Char => Self::Char('\0'),
            DataType::Str => Self::Str(String::new()),
            _ => Self::Int(IntLit::ZERO),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Char(_) => "char",
            Self::Str(_) => "str",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::F32(_) | Self::F64(_))
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(lit) => Some(lit.to_f64()),
            Self::F32(x) => Some(f64::from(*x)),
            Self::F64(x) => Some(*x),
            _ => None,
        }
    }

    fn as_int(&self, op: &'static str) -> FaultResult<IntLit> {
        match self {
            Self::Int(lit) => Ok(*lit),
            Self::F32(x) => Ok(IntLit::from_f64_trunc(f64::from(*x))),
            Self::F64(x) => Ok(IntLit::from_f64_trunc(*x)),
            other => Err(mismatch(op, "number", other)),
        }
    }

    /// Parse one line of interactive input for a destination of type `ty`
    pub fn parse_input(ty: DataType, line: &str) -> FaultResult<Value> {
        let line = line.trim_end_matches(['\n', '\r']);
        let invalid = || Fault::InvalidInput(line.to_string());
        let value = match ty {
            t if t.is_int() => Value::Int(line.trim().parse::<IntLit>().map_err(|_| invalid())?),
            DataType::F32 | DataType::F64 => {
                Value::F64(line.trim().parse::<f64>().map_err(|_| invalid())?)
            }
            DataType::Char => {
                let mut chars = line.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(invalid()),
                }
            }
            _ => Value::Str(line.to_string()),
        };
        coerce(value, ty)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(lit) => write!(f, "{lit}"),
            Self::F32(x) => write!(f, "{x}"),
            Self::F64(x) => write!(f, "{x}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

fn mismatch(op: &'static str, expected: &'static str, found: &Value) -> Fault {
    Fault::TypeMismatch {
        op,
        expected,
        found: found.type_name(),
    }
}

/// Reduce a raw 128-bit result modulo `2^bits` of `class`
#[inline]
pub fn normalize(raw: u128, class: WidthClass) -> u128 {
    raw & class.mask()
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITES
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert `value` into the representation of a binding of type `ty`
pub fn coerce(value: Value, ty: DataType) -> FaultResult<Value> {
    if ty.is_int() {
        let lit = value.as_int("write").map_err(|_| mismatch("write", ty.name(), &value))?;
        let bits = normalize(lit.wrapping_u128(), ty.width_class());
        return Ok(Value::Int(IntLit::from_unsigned(bits)));
    }
    match (ty, value) {
        (DataType::F32, v) if v.is_numeric() => Ok(Value::F32(v.as_f64().unwrap_or_default() as f32)),
        (DataType::F64, v) if v.is_numeric() => Ok(Value::F64(v.as_f64().unwrap_or_default())),
        (DataType::Char, Value::Char(c)) => Ok(Value::Char(c)),
        (DataType::Char, Value::Str(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(Fault::TypeMismatch {
                    op: "write",
                    expected: "char",
                    found: "str",
                }),
            }
        }
        (DataType::Str, Value::Str(s)) => Ok(Value::Str(s)),
        (DataType::Str, Value::Char(c)) => Ok(Value::Str(c.to_string())),
        (ty, other) => Err(mismatch("write", ty.name(), &other)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARITHMETIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Arithmetic and bitwise operations applied to a destination binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Inc,
    Dec,
    And,
    Or,
    Xor,
    Not,
}

impl ArithOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Mod => "MOD",
            Self::Neg => "NEG",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Not => "NOT",
        }
    }

    /// Operates on the destination alone
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Neg | Self::Inc | Self::Dec | Self::Not)
    }

    pub const fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Not)
    }
}

fn source<'a>(op: ArithOp, operand: Option<&'a Value>) -> FaultResult<&'a Value> {
    operand.ok_or_else(|| Fault::InvalidInstruction(format!("{} needs a source operand", op.name())))
}

/// Compute `current <op> operand` for a destination of type `ty`
///
/// The result is already in the destination's representation. Nothing is
/// written here, so a fault leaves the destination untouched.
pub fn apply(op: ArithOp, ty: DataType, current: &Value, operand: Option<&Value>) -> FaultResult<Value> {
    if ty.is_int() {
        // a float source computes in f64; the result is truncated and masked once
        let float_src = operand.filter(|v| !op.is_unary() && matches!(v, Value::F32(_) | Value::F64(_)));
        if let Some(src) = float_src {
            if op.is_bitwise() {
                return Err(mismatch(op.name(), "integer", src));
            }
            let a = current.as_f64().ok_or_else(|| mismatch(op.name(), "number", current))?;
            return coerce(Value::F64(float_apply(op, a, operand)?), ty);
        }
        let a = current.as_int(op.name())?.wrapping_u128();
        let b = if op.is_unary() {
            None
        } else {
            Some(source(op, operand)?.as_int(op.name())?)
        };
        let raw = int_apply(op, a, b)?;
        return Ok(Value::Int(IntLit::from_unsigned(normalize(raw, ty.width_class()))));
    }

    match ty {
        ty if ty.is_float() => {
            let a = current.as_f64().ok_or_else(|| mismatch(op.name(), "number", current))?;
            let r = float_apply(op, a, operand)?;
            Ok(if ty == DataType::F32 {
                Value::F32(r as f32)
            } else {
                Value::F64(r)
            })
        }
        DataType::Str if op == ArithOp::Add => {
            let mut s = current.to_string();
            match source(op, operand)? {
                Value::Str(rhs) => s.push_str(rhs),
                Value::Char(c) => s.push(*c),
                other => return Err(mismatch(op.name(), "text", other)),
            }
            Ok(Value::Str(s))
        }
        _ => Err(mismatch(op.name(), "number", current)),
    }
}

fn int_apply(op: ArithOp, a: u128, b: Option<IntLit>) -> FaultResult<u128> {
    let rhs = || b.ok_or_else(|| Fault::InvalidInstruction(format!("{} needs a source operand", op.name())));
    let raw = match op {
        ArithOp::Add => a.wrapping_add(rhs()?.wrapping_u128()),
        ArithOp::Sub => a.wrapping_sub(rhs()?.wrapping_u128()),
        ArithOp::Mul => a.wrapping_mul(rhs()?.wrapping_u128()),
        ArithOp::Div => {
            let b = rhs()?;
            if b.is_zero() {
                return Err(Fault::DivisionByZero);
            }
            let q = a / b.magnitude();
            if b.is_negative() { q.wrapping_neg() } else { q }
        }
        ArithOp::Mod => {
            let b = rhs()?;
            if b.is_zero() {
                return Err(Fault::DivisionByZero);
            }
            a % b.magnitude()
        }
        ArithOp::And => a & rhs()?.wrapping_u128(),
        ArithOp::Or => a | rhs()?.wrapping_u128(),
        ArithOp::Xor => a ^ rhs()?.wrapping_u128(),
        ArithOp::Neg => a.wrapping_neg(),
        ArithOp::Inc => a.wrapping_add(1),
        ArithOp::Dec => a.wrapping_sub(1),
        ArithOp::Not => !a,
    };
    Ok(raw)
}

fn float_apply(op: ArithOp, a: f64, operand: Option<&Value>) -> FaultResult<f64> {
    let rhs = || -> FaultResult<f64> {
        let v = source(op, operand)?;
        v.as_f64().ok_or_else(|| mismatch(op.name(), "number", v))
    };
    let r = match op {
        ArithOp::Add => a + rhs()?,
        ArithOp::Sub => a - rhs()?,
        ArithOp::Mul => a * rhs()?,
        ArithOp::Div | ArithOp::Mod => {
            let b = rhs()?;
            if b == 0.0 {
                return Err(Fault::DivisionByZero);
            }
            if op == ArithOp::Div { a / b } else { a % b }
        }
        ArithOp::Neg => -a,
        ArithOp::Inc => a + 1.0,
        ArithOp::Dec => a - 1.0,
        ArithOp::And | ArithOp::Or | ArithOp::Xor | ArithOp::Not => {
            return Err(Fault::TypeMismatch {
                op: op.name(),
                expected: "integer",
                found: "float",
            });
        }
    };
    Ok(r)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPARISONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Comparison operators that set the shared flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Eq => "EQ",
            Self::Ne => "NE",
        }
    }

    /// Evaluate against an ordering; `None` (unordered) satisfies only `NE`
    pub fn holds(self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return self == Self::Ne;
        };
        match self {
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
        }
    }
}

/// Compare two resolved operands without touching either
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> FaultResult<bool> {
    let ord = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (l, r) if l.is_numeric() && r.is_numeric() => {
            let (a, b) = (l.as_f64().unwrap_or_default(), r.as_f64().unwrap_or_default());
            a.partial_cmp(&b)
        }
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (l @ (Value::Char(_) | Value::Str(_)), r @ (Value::Char(_) | Value::Str(_))) => {
            Some(l.to_string().cmp(&r.to_string()))
        }
        (l, r) => {
            let expected = if l.is_numeric() { "number" } else { "text" };
            return Err(mismatch(op.name(), expected, r));
        }
    };
    Ok(op.holds(ord))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i128) -> Value {
        Value::Int(IntLit::from_i128(v))
    }

    #[test]
    fn test_coerce_masks_negative_ints() {
        assert_eq!(coerce(int(-1), DataType::I16).unwrap(), int(65535));
        assert_eq!(coerce(int(70000), DataType::I16).unwrap(), int(70000 - 65536));
        assert_eq!(
            coerce(int(-1), DataType::I128).unwrap(),
            Value::Int(IntLit::from_unsigned(u128::MAX))
        );
    }

    #[test]
    fn test_coerce_float_into_int_truncates() {
        assert_eq!(coerce(Value::F64(7.9), DataType::I32).unwrap(), int(7));
        assert_eq!(coerce(Value::F64(-1.5), DataType::I16).unwrap(), int(65535));
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(coerce(Value::Str("x".into()), DataType::Char).unwrap(), Value::Char('x'));
        assert_eq!(coerce(Value::Char('y'), DataType::Str).unwrap(), Value::Str("y".into()));
        assert!(matches!(
            coerce(Value::Str("xy".into()), DataType::Char),
            Err(Fault::TypeMismatch { .. })
        ));
        assert!(matches!(
            coerce(Value::Str("5".into()), DataType::I32),
            Err(Fault::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_int_wraparound() {
        let r = apply(ArithOp::Add, DataType::I16, &int(65535), Some(&int(1))).unwrap();
        assert_eq!(r, int(0));

        let r = apply(ArithOp::Sub, DataType::I32, &int(0), Some(&int(1))).unwrap();
        assert_eq!(r, int(u32::MAX as i128));

        let r = apply(ArithOp::Neg, DataType::I16, &int(1), None).unwrap();
        assert_eq!(r, int(65535));
    }

    #[test]
    fn test_mul_masks_once() {
        // 300 * 300 = 90000, reduced only at the end
        let r = apply(ArithOp::Mul, DataType::I16, &int(300), Some(&int(300))).unwrap();
        assert_eq!(r, int(90000 % 65536));

        let big = Value::Int(IntLit::from_unsigned(u128::MAX));
        let r = apply(ArithOp::Mul, DataType::I128, &big, Some(&big)).unwrap();
        assert_eq!(r, int(1));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            apply(ArithOp::Div, DataType::I32, &int(10), Some(&int(0))),
            Err(Fault::DivisionByZero)
        );
        assert_eq!(
            apply(ArithOp::Mod, DataType::I64, &int(10), Some(&int(0))),
            Err(Fault::DivisionByZero)
        );
        assert_eq!(
            apply(ArithOp::Div, DataType::F64, &Value::F64(1.0), Some(&Value::F64(0.0))),
            Err(Fault::DivisionByZero)
        );
    }

    #[test]
    fn test_division_by_negative_literal() {
        let r = apply(ArithOp::Div, DataType::I16, &int(10), Some(&int(-2))).unwrap();
        assert_eq!(r, int(65536 - 5));
        let r = apply(ArithOp::Mod, DataType::I16, &int(10), Some(&int(-3))).unwrap();
        assert_eq!(r, int(1));
    }

    #[test]
    fn test_int_dest_with_float_source() {
        // 10 / 0.5 = 20, not a division by zero
        let r = apply(ArithOp::Div, DataType::I16, &int(10), Some(&Value::F64(0.5))).unwrap();
        assert_eq!(r, int(20));

        // 2 * 2.5 = 5, truncated after the multiply
        let r = apply(ArithOp::Mul, DataType::I16, &int(2), Some(&Value::F64(2.5))).unwrap();
        assert_eq!(r, int(5));

        let r = apply(ArithOp::Sub, DataType::I16, &int(1), Some(&Value::F32(1.5))).unwrap();
        assert_eq!(r, int(0));
        let r = apply(ArithOp::Sub, DataType::I16, &int(1), Some(&Value::F64(2.5))).unwrap();
        assert_eq!(r, int(65535));

        assert_eq!(
            apply(ArithOp::Mod, DataType::I32, &int(7), Some(&Value::F64(0.0))),
            Err(Fault::DivisionByZero)
        );
        assert!(matches!(
            apply(ArithOp::And, DataType::I32, &int(7), Some(&Value::F64(1.0))),
            Err(Fault::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_float_ops_narrow() {
        let r = apply(ArithOp::Add, DataType::F32, &Value::F32(0.5), Some(&int(2))).unwrap();
        assert_eq!(r, Value::F32(2.5));
        assert!(matches!(
            apply(ArithOp::And, DataType::F64, &Value::F64(1.0), Some(&int(1))),
            Err(Fault::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_concat() {
        let r = apply(
            ArithOp::Add,
            DataType::Str,
            &Value::Str("ab".into()),
            Some(&Value::Char('c')),
        )
        .unwrap();
        assert_eq!(r, Value::Str("abc".into()));
        assert!(apply(ArithOp::Sub, DataType::Str, &Value::Str("ab".into()), Some(&int(1))).is_err());
        assert!(apply(ArithOp::Inc, DataType::Char, &Value::Char('a'), None).is_err());
    }

    #[test]
    fn test_bitwise() {
        let r = apply(ArithOp::Not, DataType::I16, &int(0), None).unwrap();
        assert_eq!(r, int(0xFFFF));
        let r = apply(ArithOp::Xor, DataType::I16, &int(0b1100), Some(&int(0b1010))).unwrap();
        assert_eq!(r, int(0b0110));
    }

    #[test]
    fn test_compare_semantics() {
        assert!(compare(CompareOp::Lt, &int(-1), &int(0)).unwrap());
        assert!(compare(CompareOp::Ge, &int(5), &Value::F64(4.5)).unwrap());
        assert!(compare(CompareOp::Lt, &Value::Str("abc".into()), &Value::Str("abd".into())).unwrap());
        assert!(compare(CompareOp::Eq, &Value::Char('a'), &Value::Str("a".into())).unwrap());

        let nan = Value::F64(f64::NAN);
        assert!(!compare(CompareOp::Eq, &nan, &nan).unwrap());
        assert!(compare(CompareOp::Ne, &nan, &nan).unwrap());

        assert!(matches!(
            compare(CompareOp::Eq, &int(1), &Value::Str("1".into())),
            Err(Fault::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(Value::parse_input(DataType::I16, "42\n").unwrap(), int(42));
        assert_eq!(Value::parse_input(DataType::I16, "-1\r\n").unwrap(), int(65535));
        assert_eq!(Value::parse_input(DataType::F32, "1.5").unwrap(), Value::F32(1.5));
        assert_eq!(Value::parse_input(DataType::Str, "hello world\n").unwrap(), Value::Str("hello world".into()));
        assert!(matches!(Value::parse_input(DataType::I32, "abc"), Err(Fault::InvalidInput(_))));
        assert!(matches!(Value::parse_input(DataType::Char, "ab"), Err(Fault::InvalidInput(_))));
    }
}
