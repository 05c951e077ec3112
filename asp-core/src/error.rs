//! Error types for the Assemplex core
//!
//! [`Fault`] is the kind of failure. [`AspError`] wraps it with the place
//! where it happened (assembly line or runtime program counter).

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result alias used by the store, values and engine internals.
pub type FaultResult<T> = Result<T, Fault>;

/// Result alias used by the public entry points.
pub type AspResult<T> = Result<T, AspError>;

/// Fault kinds raised while assembling or executing a program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error("unknown operand: {0}")]
    UnknownOperand(String),

    #[error("unknown name: {0}")]
    UnknownName(String),

    #[error("duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("type mismatch in {op}: expected {expected}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot write constant: {0}")]
    ConstViolation(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("{mnemonic} expects {expected} operand(s), found {found}")]
    ArityMismatch {
        mnemonic: &'static str,
        expected: String,
        found: usize,
    },

    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("fixed register cannot be freed: {0}")]
    FixedRegister(String),

    #[error("no return value available")]
    NoReturnValue,

    #[error("unbalanced function block: {0}")]
    UnbalancedFunction(String),

    #[error("include cycle through {0}")]
    IncludeCycle(String),

    #[error("{name} not found in {file}")]
    ImportNotFound { name: String, file: String },
}

impl Fault {
    /// Short stable name of the fault kind, used in CLI diagnostics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperand(_) => "UnknownOperand",
            Self::UnknownName(_) => "UnknownName",
            Self::DuplicateDeclaration(_) => "DuplicateDeclaration",
            Self::InvalidType(_) => "InvalidType",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::ConstViolation(_) => "ConstViolation",
            Self::DivisionByZero => "DivisionByZero",
            Self::UnknownLabel(_) => "UnknownLabel",
            Self::UnknownFunction(_) => "UnknownFunction",
            Self::DuplicateLabel(_) => "DuplicateLabel",
            Self::DuplicateFunction(_) => "DuplicateFunction",
            Self::InvalidInput(_) => "InvalidInput",
            Self::InvalidInstruction(_) => "InvalidInstruction",
            Self::ArityMismatch { .. } => "ArityMismatch",
            Self::InvalidLiteral(_) => "InvalidLiteral",
            Self::FixedRegister(_) => "FixedRegister",
            Self::NoReturnValue => "NoReturnValue",
            Self::UnbalancedFunction(_) => "UnbalancedFunction",
            Self::IncludeCycle(_) => "IncludeCycle",
            Self::ImportNotFound { .. } => "ImportNotFound",
        }
    }
}

/// Where a line of expanded source came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    /// File the line was read from (`<source>` for in-memory programs)
    pub file: Arc<str>,
    /// 1-based line number inside `file`
    pub line: usize,
}

impl Origin {
    pub fn new(file: impl Into<Arc<str>>, line: usize) -> Self {
        Self { file: file.into(), line }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Top-level error returned by the assembler, preprocessor and engine.
#[derive(Debug, Error)]
pub enum AspError {
    #[error("{origin}: assembly error: {fault}\n    | {text}")]
    Assembly {
        origin: Origin,
        text: String,
        fault: Fault,
    },

    #[error("{origin} (pc {pc}): runtime error: {fault}\n    | {text}")]
    Runtime {
        pc: usize,
        origin: Origin,
        text: String,
        fault: Fault,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("invalid machine config: {0}")]
    Config(String),

    #[error("cannot encode run report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("no program loaded")]
    NoProgram,
}

impl AspError {
    /// The fault carried by assembly and runtime errors.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Assembly { fault, .. } | Self::Runtime { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Origin of the offending line, when the error is tied to one.
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::Assembly { origin, .. } | Self::Runtime { origin, .. } => Some(origin),
            _ => None,
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }
}
