//! Assembled program representation
//!
//! A [`Program`] is the immutable output of the assembler: an ordered list of
//! [`Instruction`]s plus the [`SymbolTable`] mapping labels and functions to
//! instruction indices.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Origin;
use crate::opcode::Opcode;
use crate::types::{DataType, IntLit};
use crate::value::Value;

/// A single operand after assembly
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Register or variable reference
    Name(String),
    Int(IntLit),
    Float(f64),
    Char(char),
    Str(String),
    /// Type keyword of VAR/CONST
    Type(DataType),
    /// Resolved jump target (instruction index)
    Target(usize),
    /// Function called by CALL (resolved through the symbol table)
    Function(String),
}

impl Operand {
    /// Literal value, if this operand is one
    pub fn literal(&self) -> Option<Value> {
        match self {
            Self::Int(v) => Some(Value::Int(*v)),
            Self::Float(v) => Some(Value::F64(*v)),
            Self::Char(c) => Some(Value::Char(*c)),
            Self::Str(s) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) | Self::Function(n) => f.write_str(n),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Char(c) => write!(f, "{c:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Type(t) => write!(f, "{t}"),
            Self::Target(i) => write!(f, "@{i}"),
        }
    }
}

/// One executable instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// Where the instruction was written
    pub origin: Origin,
    /// Source text (trimmed) for diagnostics
    pub text: String,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for (i, op) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{op}")?;
        }
        Ok(())
    }
}

/// Declared parameter of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
}

/// Function entry point and signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    /// Index of the first instruction of the body
    pub entry: usize,
    pub params: Vec<Param>,
}

/// Label and function maps
///
/// Ordered maps so that two assemblies of the same source compare and print
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    pub labels: BTreeMap<String, usize>,
    pub functions: BTreeMap<String, FunctionInfo>,
}

impl SymbolTable {
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }
}

/// Immutable assembled program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub symbols: SymbolTable,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }
}
