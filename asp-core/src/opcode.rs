//! Opcodes of the .asp instruction set
//!
//! Closed enumeration of every instruction, with its mnemonic, category and
//! operand signature. The assembler checks operand counts and kinds against
//! [`Opcode::signature`] before anything runs.

use std::fmt;

use crate::value::{ArithOp, CompareOp};

/// Opcode categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeCategory {
    /// MOV
    Data,
    /// VAR, CONST, FREE
    Declaration,
    /// ADD .. DEC
    Arithmetic,
    /// AND, OR, XOR, NOT
    Bitwise,
    /// LT .. NE
    Compare,
    /// Jumps, calls, returns, HALT, NOP
    Control,
    /// PRINT, INPUT
    Io,
}

impl OpcodeCategory {
    pub const ALL: [OpcodeCategory; 7] = [
        Self::Data,
        Self::Declaration,
        Self::Arithmetic,
        Self::Bitwise,
        Self::Compare,
        Self::Control,
        Self::Io,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Data => "Data",
            Self::Declaration => "Declaration",
            Self::Arithmetic => "Arithmetic",
            Self::Bitwise => "Bitwise",
            Self::Compare => "Compare",
            Self::Control => "Control",
            Self::Io => "I/O",
        }
    }

    /// Opcodes of this category, in table order
    pub fn opcodes(self) -> impl Iterator<Item = Opcode> {
        Opcode::ALL.into_iter().filter(move |op| op.category() == self)
    }
}

/// Kind of operand accepted in one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Writable name (register or variable)
    Dest,
    /// Name or literal
    Src,
    /// Name being declared
    Decl,
    /// Type keyword
    Type,
    /// Jump label
    Label,
    /// Function name
    Function,
}

/// Operand signature: required kinds, optional trailing kinds, and whether
/// the last kind repeats
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub required: &'static [OperandKind],
    pub optional: &'static [OperandKind],
    pub variadic: Option<OperandKind>,
}

impl Signature {
    const fn fixed(required: &'static [OperandKind]) -> Self {
        Self {
            required,
            optional: &[],
            variadic: None,
        }
    }

    /// Human readable operand count (`2`, `2..3`, `1+`)
    pub fn describe(&self) -> String {
        let min = self.required.len();
        if self.variadic.is_some() {
            format!("{min}+")
        } else if self.optional.is_empty() {
            min.to_string()
        } else {
            format!("{min}..{}", min + self.optional.len())
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        let min = self.required.len();
        if self.variadic.is_some() {
            count >= min
        } else {
            (min..=min + self.optional.len()).contains(&count)
        }
    }

    /// Kind expected at position `i`
    pub fn kind_at(&self, i: usize) -> Option<OperandKind> {
        if let Some(kind) = self.required.get(i) {
            return Some(*kind);
        }
        self.optional
            .get(i - self.required.len())
            .copied()
            .or(self.variadic)
    }
}

/// Instruction opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ─────────────────────────────────────────────────────────
    // Data and declarations
    // ─────────────────────────────────────────────────────────
    Mov,
    Var,
    Const,
    Free,

    // ─────────────────────────────────────────────────────────
    // Arithmetic and bitwise
    // ─────────────────────────────────────────────────────────
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

    // ─────────────────────────────────────────────────────────
    // Comparisons
    // ─────────────────────────────────────────────────────────
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    // ─────────────────────────────────────────────────────────
    // Control flow
    // ─────────────────────────────────────────────────────────
    Jmp,
    Jz,
    Jnz,
    Call,
    Ret,
    Retv,
    Result,
    Halt,
    Nop,

    // ─────────────────────────────────────────────────────────
    // I/O
    // ─────────────────────────────────────────────────────────
    Print,
    Input,
}

use OperandKind::{Decl, Dest, Function, Label, Src, Type};

impl Opcode {
    /// Every opcode, in listing order
    pub const ALL: [Opcode; 33] = [
        Self::Mov,
        Self::Var,
        Self::Const,
        Self::Free,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Neg,
        Self::Inc,
        Self::Dec,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Not,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::Eq,
        Self::Ne,
        Self::Jmp,
        Self::Jz,
        Self::Jnz,
        Self::Call,
        Self::Ret,
        Self::Retv,
        Self::Result,
        Self::Halt,
        Self::Nop,
        Self::Print,
        Self::Input,
    ];

    /// Look up a mnemonic, case-insensitively
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        Self::ALL.into_iter().find(|op| op.mnemonic() == upper)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Mov => "MOV",
            Self::Var => "VAR",
            Self::Const => "CONST",
            Self::Free => "FREE",
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
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Jmp => "JMP",
            Self::Jz => "JZ",
            Self::Jnz => "JNZ",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Retv => "RETV",
            Self::Result => "RESULT",
            Self::Halt => "HALT",
            Self::Nop => "NOP",
            Self::Print => "PRINT",
            Self::Input => "INPUT",
        }
    }

    pub fn category(&self) -> OpcodeCategory {
        match self {
            Self::Mov => OpcodeCategory::Data,
            Self::Var | Self::Const | Self::Free => OpcodeCategory::Declaration,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::Neg | Self::Inc | Self::Dec => {
                OpcodeCategory::Arithmetic
            }
            Self::And | Self::Or | Self::Xor | Self::Not => OpcodeCategory::Bitwise,
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne => OpcodeCategory::Compare,
            Self::Jmp
            | Self::Jz
            | Self::Jnz
            | Self::Call
            | Self::Ret
            | Self::Retv
            | Self::Result
            | Self::Halt
            | Self::Nop => OpcodeCategory::Control,
            Self::Print | Self::Input => OpcodeCategory::Io,
        }
    }

    /// Operands accepted by this opcode
    pub fn signature(&self) -> Signature {
        match self {
            Self::Mov => Signature::fixed(&[Dest, Src]),
            Self::Var | Self::Const => Signature {
                required: &[Decl, Type],
                optional: &[Src],
                variadic: None,
            },
            Self::Free => Signature::fixed(&[Decl]),
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod | Self::And | Self::Or | Self::Xor => {
                Signature::fixed(&[Dest, Src])
            }
            Self::Neg | Self::Inc | Self::Dec | Self::Not => Signature::fixed(&[Dest]),
            Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Eq | Self::Ne => Signature::fixed(&[Src, Src]),
            Self::Jmp | Self::Jz | Self::Jnz => Signature::fixed(&[Label]),
            Self::Call => Signature {
                required: &[Function],
                optional: &[],
                variadic: Some(Src),
            },
            Self::Ret | Self::Halt | Self::Nop => Signature::fixed(&[]),
            Self::Retv | Self::Print => Signature::fixed(&[Src]),
            Self::Result | Self::Input => Signature::fixed(&[Dest]),
        }
    }

    /// Arithmetic/bitwise operation behind this opcode
    pub fn arith_op(&self) -> Option<ArithOp> {
        Some(match self {
            Self::Add => ArithOp::Add,
            Self::Sub => ArithOp::Sub,
            Self::Mul => ArithOp::Mul,
            Self::Div => ArithOp::Div,
            Self::Mod => ArithOp::Mod,
            Self::Neg => ArithOp::Neg,
            Self::Inc => ArithOp::Inc,
            Self::Dec => ArithOp::Dec,
            Self::And => ArithOp::And,
            Self::Or => ArithOp::Or,
            Self::Xor => ArithOp::Xor,
            Self::Not => ArithOp::Not,
            _ => return None,
        })
    }

    /// Comparison behind this opcode
    pub fn compare_op(&self) -> Option<CompareOp> {
        Some(match self {
            Self::Lt => CompareOp::Lt,
            Self::Le => CompareOp::Le,
            Self::Gt => CompareOp::Gt,
            Self::Ge => CompareOp::Ge,
            Self::Eq => CompareOp::Eq,
            Self::Ne => CompareOp::Ne,
            _ => return None,
        })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
