//! Execution engine
//!
//! Program-counter driven dispatch over an assembled [`Program`]. All machine
//! state (pc, comparison flag, call stack, cycle counter) lives in one
//! [`ExecutionState`] owned by the engine, so independent runs never share
//! anything.
//!
//! Conditional jumps read the comparison flag: `JZ` jumps when the last
//! comparison was false, `JNZ` when it was true. The flag starts false and
//! only compare instructions change it.

use std::fmt;
use std::io::{self, BufRead, Write};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::config::MachineConfig;
use crate::cycles::CycleCounter;
use crate::error::{AspError, AspResult, Fault, FaultResult};
use crate::instruction::{Instruction, Operand, Program};
use crate::opcode::Opcode;
use crate::store::{Scope, Store};
use crate::types::DataType;
use crate::value::Value;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    /// HALT executed
    Halt,
    /// RET/RETV with an empty call stack
    Return,
    /// Program counter ran past the last instruction
    End,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Halt => "halt",
            Self::Return => "return",
            Self::End => "end",
        })
    }
}

/// Call frame pushed by CALL
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Instruction index to resume at
    pub return_pc: usize,
    /// Caller's local scope, restored on return
    pub saved_locals: Option<Scope>,
    /// Callee name, for diagnostics
    pub function: String,
}

/// Machine state of one run
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub pc: usize,
    /// Shared comparison flag
    pub flag: bool,
    pub cycles: CycleCounter,
    pub call_stack: Vec<CallFrame>,
    /// Value recorded by RETV, consumed by RESULT
    pub pending_return: Option<Value>,
    pub exit: Option<ExitReason>,
}

impl ExecutionState {
    pub fn new(cycles: CycleCounter) -> Self {
        Self {
            pc: 0,
            flag: false,
            cycles,
            call_stack: Vec::new(),
            pending_return: None,
            exit: None,
        }
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }
}

/// Reasons an instruction can stop the run
enum Interrupt {
    Fault(Fault),
    Io(io::Error),
}

impl From<Fault> for Interrupt {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl From<io::Error> for Interrupt {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Interpreter for one program run
pub struct Engine<'p, R, W> {
    program: &'p Program,
    store: Store,
    state: ExecutionState,
    input: R,
    output: W,
    prompt_input: bool,
}

impl<'p, R: BufRead, W: Write> Engine<'p, R, W> {
    pub fn new(program: &'p Program, config: &MachineConfig, input: R, output: W) -> Self {
        Self {
            program,
            store: Store::with_registers(&config.registers),
            state: ExecutionState::new(CycleCounter::new(config.cycles)),
            input,
            output,
            prompt_input: config.prompt_input,
        }
    }

    /// Run until HALT, a top-level return, the end of the program, or a fault
    pub fn run(&mut self) -> AspResult<ExitReason> {
        let stopped = self.run_until_stopped();
        // output written before a fault is still delivered
        self.output.flush()?;
        stopped?;
        let exit = self.state.exit.unwrap_or(ExitReason::End);
        info!(
            exit = %exit,
            cycles = self.state.cycles.total(),
            instructions = self.state.cycles.instructions(),
            "run complete"
        );
        Ok(exit)
    }

    fn run_until_stopped(&mut self) -> AspResult<()> {
        while self.step()? {}
        Ok(())
    }

    /// Execute one instruction; returns false once the run has stopped
    pub fn step(&mut self) -> AspResult<bool> {
        if self.state.exit.is_some() {
            return Ok(false);
        }
        let pc = self.state.pc;
        let program = self.program;
        let Some(instr) = program.get(pc) else {
            self.state.exit = Some(ExitReason::End);
            return Ok(false);
        };

        trace!(pc, op = %instr.opcode, flag = self.state.flag, "dispatch");
        self.state.pc = pc + 1;

        if let Err(interrupt) = self.execute(instr) {
            self.state.pc = pc;
            return Err(match interrupt {
                Interrupt::Fault(fault) => AspError::Runtime {
                    pc,
                    origin: instr.origin.clone(),
                    text: instr.text.clone(),
                    fault,
                },
                Interrupt::Io(err) => AspError::Output(err),
            });
        }

        self.state.cycles.tick();
        Ok(self.state.exit.is_none())
    }

    fn execute(&mut self, instr: &Instruction) -> Result<(), Interrupt> {
        use Opcode::*;

        let ops = &instr.operands;
        match instr.opcode {
            // ─────────────────────────────────────────────────────────
            // Data and declarations
            // ─────────────────────────────────────────────────────────
            Mov => {
                let value = self.value_of(operand(ops, 1)?)?;
                let ty = self.store.write(name_of(operand(ops, 0)?)?, value)?;
                self.charge(ty);
            }

            Var | Const => {
                let name = name_of(operand(ops, 0)?)?;
                let ty = match operand(ops, 1)? {
                    Operand::Type(ty) => *ty,
                    other => return Err(Fault::InvalidType(other.to_string()).into()),
                };
                let initial = ops.get(2).map(|op| self.value_of(op)).transpose()?;
                let charged = initial.is_some();
                self.store.declare(name, ty, instr.opcode == Const, initial)?;
                if charged {
                    self.charge(ty);
                }
            }

            Free => {
                self.store.free(name_of(operand(ops, 0)?)?)?;
            }

            // ─────────────────────────────────────────────────────────
            // Arithmetic and bitwise
            // ─────────────────────────────────────────────────────────
            Add | Sub | Mul | Div | Mod | Neg | Inc | Dec | And | Or | Xor | Not => {
                let op = instr
                    .opcode
                    .arith_op()
                    .ok_or_else(|| Fault::InvalidInstruction(instr.opcode.to_string()))?;
                let src = ops.get(1).map(|o| self.value_of(o)).transpose()?;
                let ty = self.store.arithmetic(op, name_of(operand(ops, 0)?)?, src.as_ref())?;
                self.charge(ty);
            }

            // ─────────────────────────────────────────────────────────
            // Comparisons
            // ─────────────────────────────────────────────────────────
            Lt | Le | Gt | Ge | Eq | Ne => {
                let op = instr
                    .opcode
                    .compare_op()
                    .ok_or_else(|| Fault::InvalidInstruction(instr.opcode.to_string()))?;
                let left = self.value_of(operand(ops, 0)?)?;
                let right = self.value_of(operand(ops, 1)?)?;
                self.state.flag = self.store.compare(op, &left, &right)?;
            }

            // ─────────────────────────────────────────────────────────
            // Control flow
            // ─────────────────────────────────────────────────────────
            Jmp => {
                self.state.pc = target_of(operand(ops, 0)?)?;
            }

            Jz => {
                if !self.state.flag {
                    self.state.pc = target_of(operand(ops, 0)?)?;
                }
            }

            Jnz => {
                if self.state.flag {
                    self.state.pc = target_of(operand(ops, 0)?)?;
                }
            }

            Call => self.call(ops)?,

            Ret => self.return_from_call(),

            Retv => {
                let value = self.value_of(operand(ops, 0)?)?;
                self.state.pending_return = Some(value);
                self.return_from_call();
            }

            Result => {
                let value = self.state.pending_return.clone().ok_or(Fault::NoReturnValue)?;
                let ty = self.store.write(name_of(operand(ops, 0)?)?, value)?;
                self.state.pending_return = None;
                self.charge(ty);
            }

            Halt => {
                self.state.exit = Some(ExitReason::Halt);
            }

            Nop => {}

            // ─────────────────────────────────────────────────────────
            // I/O
            // ─────────────────────────────────────────────────────────
            Print => {
                let value = self.value_of(operand(ops, 0)?)?;
                writeln!(self.output, "{value}")?;
            }

            Input => {
                let dest = name_of(operand(ops, 0)?)?;
                let ty = self.store.type_of(dest)?;
                let line = self.read_line(dest)?;
                let value = Value::parse_input(ty, &line)?;
                let ty = self.store.write(dest, value)?;
                self.charge(ty);
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CALLS
    // ═══════════════════════════════════════════════════════════════════════════

    fn call(&mut self, ops: &[Operand]) -> FaultResult<()> {
        let name = match operand(ops, 0)? {
            Operand::Function(name) => name,
            other => return Err(Fault::UnknownFunction(other.to_string())),
        };
        let program = self.program;
        let info = program
            .symbols
            .function(name)
            .ok_or_else(|| Fault::UnknownFunction(name.clone()))?;

        // arguments are evaluated in the caller's scope
        let args = ops[1..]
            .iter()
            .map(|op| self.value_of(op))
            .collect::<FaultResult<Vec<_>>>()?;
        if args.len() != info.params.len() {
            return Err(Fault::ArityMismatch {
                mnemonic: "CALL",
                expected: info.params.len().to_string(),
                found: args.len(),
            });
        }

        let saved = self.store.replace_locals(Some(Scope::new()));
        for (param, arg) in info.params.iter().zip(args) {
            if let Err(fault) = self.store.declare(&param.name, param.ty, false, Some(arg)) {
                self.store.replace_locals(saved);
                return Err(fault);
            }
        }

        // RESULT only sees what this call returns
        self.state.pending_return = None;
        self.state.call_stack.push(CallFrame {
            return_pc: self.state.pc,
            saved_locals: saved,
            function: name.clone(),
        });
        self.state.pc = info.entry;
        debug!(function = %name, depth = self.state.call_depth(), entry = info.entry, "call");
        Ok(())
    }

    fn return_from_call(&mut self) {
        match self.state.call_stack.pop() {
            Some(frame) => {
                self.store.replace_locals(frame.saved_locals);
                self.state.pc = frame.return_pc;
                debug!(function = %frame.function, depth = self.state.call_depth(), "return");
            }
            None => {
                self.state.exit = Some(ExitReason::Return);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn value_of(&self, op: &Operand) -> FaultResult<Value> {
        match op {
            Operand::Name(name) => self.store.read(name),
            other => other
                .literal()
                .ok_or_else(|| Fault::UnknownOperand(other.to_string())),
        }
    }

    fn charge(&mut self, ty: DataType) {
        self.state.cycles.charge(ty.width_class());
    }

    fn read_line(&mut self, dest: &str) -> Result<String, Interrupt> {
        if self.prompt_input {
            write!(self.output, "Enter value for {dest}: ")?;
            self.output.flush()?;
        }
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Fault::InvalidInput("end of input".to_string()).into());
        }
        Ok(line)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cycles(&self) -> &CycleCounter {
        &self.state.cycles
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Clear all machine state so the same program can run again
    pub fn reset(&mut self) {
        self.store.reset();
        let mut cycles = self.state.cycles.clone();
        cycles.reset();
        self.state = ExecutionState::new(cycles);
    }
}

fn operand(ops: &[Operand], i: usize) -> FaultResult<&Operand> {
    ops.get(i)
        .ok_or_else(|| Fault::InvalidInstruction(format!("missing operand {}", i + 1)))
}

fn name_of(op: &Operand) -> FaultResult<&str> {
    op.name().ok_or_else(|| Fault::UnknownOperand(op.to_string()))
}

fn target_of(op: &Operand) -> FaultResult<usize> {
    match op {
        Operand::Target(index) => Ok(*index),
        other => Err(Fault::UnknownLabel(other.to_string())),
    }
}
