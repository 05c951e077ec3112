//! # Assemplex Core
//!
//! Assembles and runs `.asp` programs: a line-oriented assembly language with
//! a fixed bank of width-typed registers, typed variables, comparisons,
//! branches and function calls.
//!
//! ## Pipeline
//!
//! ```text
//! .asp source
//!      ↓
//! Preprocessor (INCLUDE / IMPORT / IMPORTVAR)
//!      ↓
//! Assembler (labels, functions, operand checks)
//!      ↓
//! Program + SymbolTable
//!      ↓
//! Engine (Store + ExecutionState + CycleCounter)
//!      ↓
//! output + RunReport
//! ```
//!
//! ## Example
//!
//! ```
//! use asp_core::prelude::*;
//!
//! let mut runtime = AspRuntime::new(MachineConfig::default().with_prompt_input(false))?;
//! runtime.load_source("MOV r1, 5\nPRINT r1\n")?;
//!
//! let mut out = Vec::new();
//! let report = runtime.run_with(std::io::empty(), &mut out)?;
//! assert_eq!(out, b"5\n");
//! assert_eq!(report.total_cycles, 1);
//! # Ok::<(), asp_core::AspError>(())
//! ```

pub mod assembler;
pub mod config;
pub mod cycles;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod lexer;
pub mod opcode;
pub mod preprocess;
pub mod runtime;
pub mod store;
pub mod types;
pub mod value;

pub use assembler::{Assembler, assemble};
pub use config::{MachineConfig, RegisterSpec};
pub use cycles::{CycleCosts, CycleCounter};
pub use engine::{CallFrame, Engine, ExecutionState, ExitReason};
pub use error::{AspError, AspResult, Fault, FaultResult, Origin};
pub use instruction::{FunctionInfo, Instruction, Operand, Param, Program, SymbolTable};
pub use opcode::{Opcode, OpcodeCategory};
pub use preprocess::{FsLoader, MemoryLoader, Preprocessor, SourceLine, SourceLoader};
pub use runtime::{AspRuntime, RegisterValue, RunReport};
pub use store::{Binding, Scope, Store};
pub use types::{DataType, IntLit, WidthClass};
pub use value::{ArithOp, CompareOp, Value};

/// Common imports
pub mod prelude {
    pub use crate::{
        AspError, AspResult, AspRuntime, Engine, ExitReason, Fault, MachineConfig, Program, RunReport, Value,
        assemble,
    };
}
