//! Assembler and symbol resolver
//!
//! Turns expanded source lines into an immutable [`Program`].
//!
//! # Syntax
//!
//! ```text
//! // comment              ; also a comment
//! VAR total, i64, 0
//! loop:                   label, names the next instruction
//!     ADD total, r1
//!     DEC r1
//!     GT r1, 0
//!     JNZ loop
//! CALL show, total
//! HALT
//!
//! FUNC show value:i64
//!     PRINT value
//! ENDFUNC                 implicit RET
//! ```
//!
//! The first pass collects labels and function entries while building
//! instructions. The second pass patches jump targets and checks every CALL
//! against the function table, so no unresolved symbol survives assembly.

use tracing::debug;

use crate::error::{AspError, AspResult, Fault, FaultResult, Origin};
use crate::instruction::{FunctionInfo, Instruction, Operand, Param, Program, SymbolTable};
use crate::lexer::{self, Token};
use crate::opcode::{Opcode, OperandKind};
use crate::preprocess::SourceLine;

/// Unresolved symbol recorded during the first pass
#[derive(Debug)]
enum Reference {
    Label { index: usize, operand: usize, name: String },
    Call { index: usize, name: String },
}

/// Two-pass assembler
#[derive(Debug, Default)]
pub struct Assembler {
    instructions: Vec<Instruction>,
    symbols: SymbolTable,
    references: Vec<Reference>,
    /// Function whose body is currently open, with where it started
    open_function: Option<(String, Origin, String)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble expanded source lines
    pub fn assemble(mut self, lines: &[SourceLine]) -> AspResult<Program> {
        self.first_pass(lines)?;
        self.second_pass()?;

        debug!(
            instructions = self.instructions.len(),
            labels = self.symbols.labels.len(),
            functions = self.symbols.functions.len(),
            "assembled program"
        );

        Ok(Program {
            instructions: self.instructions,
            symbols: self.symbols,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FIRST PASS
    // ═══════════════════════════════════════════════════════════════════════════

    fn first_pass(&mut self, lines: &[SourceLine]) -> AspResult<()> {
        for line in lines {
            self.line(line).map_err(|fault| AspError::Assembly {
                origin: line.origin.clone(),
                text: line.text.trim().to_string(),
                fault,
            })?;
        }

        if let Some((name, origin, text)) = self.open_function.take() {
            return Err(AspError::Assembly {
                origin,
                text,
                fault: Fault::UnbalancedFunction(format!("FUNC {name} has no ENDFUNC")),
            });
        }
        Ok(())
    }

    fn line(&mut self, line: &SourceLine) -> FaultResult<()> {
        let tokens = lexer::tokenize(&line.text)?;
        let Some(first) = tokens.first() else {
            return Ok(());
        };
        let Some(head) = first.ident() else {
            return Err(Fault::InvalidInstruction(line.text.trim().to_string()));
        };

        match head {
            "func" => self.open_function(&tokens[1..], line),
            "endfunc" => self.close_function(&tokens[1..], line),
            _ if tokens.get(1) == Some(&Token::Colon) => {
                self.define_label(head)?;
                match tokens.get(2) {
                    Some(Token::Ident(mnemonic)) => self.push_instruction(mnemonic, &tokens[3..], line),
                    Some(other) => Err(Fault::UnknownOperand(describe(other))),
                    None => Ok(()),
                }
            }
            _ => self.push_instruction(head, &tokens[1..], line),
        }
    }

    fn define_label(&mut self, name: &str) -> FaultResult<()> {
        if self.symbols.labels.contains_key(name) {
            return Err(Fault::DuplicateLabel(name.to_string()));
        }
        self.symbols
            .labels
            .insert(name.to_string(), self.instructions.len());
        Ok(())
    }

    fn open_function(&mut self, rest: &[Token], line: &SourceLine) -> FaultResult<()> {
        let Some(Token::Ident(name)) = rest.first() else {
            return Err(Fault::InvalidInstruction("FUNC needs a name".to_string()));
        };
        if let Some((open, ..)) = &self.open_function {
            return Err(Fault::UnbalancedFunction(format!("FUNC {name} inside FUNC {open}")));
        }
        if self.symbols.functions.contains_key(name) {
            return Err(Fault::DuplicateFunction(name.clone()));
        }

        let params = parse_params(name, &rest[1..])?;
        self.symbols.functions.insert(
            name.clone(),
            FunctionInfo {
                name: name.clone(),
                entry: self.instructions.len(),
                params,
            },
        );
        self.open_function = Some((name.clone(), line.origin.clone(), line.text.trim().to_string()));
        Ok(())
    }

    fn close_function(&mut self, rest: &[Token], line: &SourceLine) -> FaultResult<()> {
        if let Some(extra) = rest.first() {
            return Err(Fault::UnknownOperand(describe(extra)));
        }
        if self.open_function.take().is_none() {
            return Err(Fault::UnbalancedFunction("ENDFUNC without FUNC".to_string()));
        }
        // falling off the body returns to the caller
        self.instructions.push(Instruction {
            opcode: Opcode::Ret,
            operands: Vec::new(),
            origin: line.origin.clone(),
            text: line.text.trim().to_string(),
        });
        Ok(())
    }

    fn push_instruction(&mut self, mnemonic: &str, rest: &[Token], line: &SourceLine) -> FaultResult<()> {
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| Fault::InvalidInstruction(mnemonic.to_ascii_uppercase()))?;

        let mut raw = Vec::with_capacity(rest.len());
        for token in rest {
            match token {
                Token::Comma => {}
                Token::Colon => return Err(Fault::UnknownOperand(":".to_string())),
                other => raw.push(other),
            }
        }

        let signature = opcode.signature();
        if !signature.accepts(raw.len()) {
            return Err(Fault::ArityMismatch {
                mnemonic: opcode.mnemonic(),
                expected: signature.describe(),
                found: raw.len(),
            });
        }

        let index = self.instructions.len();
        let mut operands = Vec::with_capacity(raw.len());
        for (i, token) in raw.into_iter().enumerate() {
            let kind = signature
                .kind_at(i)
                .ok_or_else(|| Fault::UnknownOperand(describe(token)))?;
            let operand = match (kind, token) {
                (OperandKind::Dest | OperandKind::Decl | OperandKind::Src, Token::Ident(n)) => {
                    Operand::Name(n.clone())
                }
                (OperandKind::Src, Token::Int(v)) => Operand::Int(*v),
                (OperandKind::Src, Token::Float(v)) => Operand::Float(*v),
                (OperandKind::Src, Token::Char(c)) => Operand::Char(*c),
                (OperandKind::Src, Token::Str(s)) => Operand::Str(s.clone()),
                (OperandKind::Type, Token::Ident(t)) => Operand::Type(t.parse()?),
                (OperandKind::Type, other) => return Err(Fault::InvalidType(describe(other))),
                (OperandKind::Label, Token::Ident(n)) => {
                    self.references.push(Reference::Label {
                        index,
                        operand: i,
                        name: n.clone(),
                    });
                    Operand::Target(usize::MAX)
                }
                (OperandKind::Function, Token::Ident(n)) => {
                    self.references.push(Reference::Call { index, name: n.clone() });
                    Operand::Function(n.clone())
                }
                (_, other) => return Err(Fault::UnknownOperand(describe(other))),
            };
            operands.push(operand);
        }

        self.instructions.push(Instruction {
            opcode,
            operands,
            origin: line.origin.clone(),
            text: line.text.trim().to_string(),
        });
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SECOND PASS
    // ═══════════════════════════════════════════════════════════════════════════

    fn second_pass(&mut self) -> AspResult<()> {
        for reference in std::mem::take(&mut self.references) {
            let (index, fault) = match reference {
                Reference::Label { index, operand, name } => match self.symbols.label(&name) {
                    Some(target) => {
                        self.instructions[index].operands[operand] = Operand::Target(target);
                        continue;
                    }
                    None => (index, Fault::UnknownLabel(name)),
                },
                Reference::Call { index, name } => match self.symbols.function(&name) {
                    Some(info) => {
                        let args = self.instructions[index].operands.len() - 1;
                        if args == info.params.len() {
                            continue;
                        }
                        let fault = Fault::ArityMismatch {
                            mnemonic: "CALL",
                            expected: info.params.len().to_string(),
                            found: args,
                        };
                        (index, fault)
                    }
                    None => (index, Fault::UnknownFunction(name)),
                },
            };
            let instr = &self.instructions[index];
            return Err(AspError::Assembly {
                origin: instr.origin.clone(),
                text: instr.text.clone(),
                fault,
            });
        }
        Ok(())
    }
}

/// `name:type` pairs after a FUNC name, optionally comma separated, with an
/// optional trailing colon
fn parse_params(function: &str, tokens: &[Token]) -> FaultResult<Vec<Param>> {
    let mut params: Vec<Param> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match (&tokens[i], tokens.get(i + 1), tokens.get(i + 2)) {
            (Token::Comma, ..) => i += 1,
            (Token::Colon, None, _) => i += 1,
            (Token::Ident(name), Some(Token::Colon), Some(Token::Ident(ty))) => {
                if params.iter().any(|p| &p.name == name) {
                    return Err(Fault::DuplicateDeclaration(name.clone()));
                }
                params.push(Param {
                    name: name.clone(),
                    ty: ty.parse()?,
                });
                i += 3;
            }
            _ => {
                return Err(Fault::InvalidInstruction(format!(
                    "malformed parameter list for FUNC {function}"
                )));
            }
        }
    }
    Ok(params)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(s) => s.clone(),
        Token::Int(v) => v.to_string(),
        Token::Float(v) => v.to_string(),
        Token::Char(c) => format!("{c:?}"),
        Token::Str(s) => format!("{s:?}"),
        Token::Comma => ",".to_string(),
        Token::Colon => ":".to_string(),
    }
}

/// Assemble in-memory source that needs no include expansion
pub fn assemble(source: &str) -> AspResult<Program> {
    Assembler::new().assemble(&SourceLine::numbered("<source>", source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, IntLit};

    fn fault_of(source: &str) -> Fault {
        match assemble(source) {
            Err(AspError::Assembly { fault, .. }) => fault,
            other => panic!("expected assembly error, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_program() {
        let program = assemble("MOV r1, 5\nPRINT r1\n").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.instructions[0].opcode, Opcode::Mov);
        assert_eq!(
            program.instructions[0].operands,
            vec![Operand::Name("r1".into()), Operand::Int(IntLit::from_i128(5))]
        );
        assert_eq!(program.instructions[1].origin.line, 2);
    }

    #[test]
    fn test_labels_and_jumps() {
        let program = assemble(
            "start:\n  INC r1\n  LT r1, 10\n  JNZ start\n  JMP done\ndone:\n",
        )
        .unwrap();
        assert_eq!(program.symbols.label("start"), Some(0));
        assert_eq!(program.symbols.label("done"), Some(4));
        assert_eq!(program.instructions[2].operands, vec![Operand::Target(0)]);
        assert_eq!(program.instructions[3].operands, vec![Operand::Target(4)]);
    }

    #[test]
    fn test_label_prefix_on_instruction() {
        let program = assemble("top: NOP\nJMP top\n").unwrap();
        assert_eq!(program.symbols.label("top"), Some(0));
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_functions_get_implicit_ret() {
        let program = assemble(
            "CALL add, 1, 2\nHALT\nFUNC add a:i32, b:i32\n  RETV a\nENDFUNC\nfunc legacy:\nENDFUNC\n",
        )
        .unwrap();
        let add = program.symbols.function("add").unwrap();
        assert_eq!(add.entry, 2);
        assert_eq!(
            add.params,
            vec![
                Param { name: "a".into(), ty: DataType::I32 },
                Param { name: "b".into(), ty: DataType::I32 },
            ]
        );
        assert_eq!(program.instructions[3].opcode, Opcode::Ret);
        let legacy = program.symbols.function("legacy").unwrap();
        assert!(legacy.params.is_empty());
        assert_eq!(legacy.entry, 4);
        assert_eq!(program.instructions[4].opcode, Opcode::Ret);
    }

    #[test]
    fn test_unresolved_symbols() {
        assert_eq!(fault_of("JMP nowhere\n"), Fault::UnknownLabel("nowhere".into()));
        assert_eq!(fault_of("CALL ghost\n"), Fault::UnknownFunction("ghost".into()));
    }

    #[test]
    fn test_assembly_faults() {
        assert!(matches!(fault_of("FLY r1\n"), Fault::InvalidInstruction(_)));
        assert!(matches!(fault_of("MOV r1\n"), Fault::ArityMismatch { found: 1, .. }));
        assert!(matches!(fault_of("VAR x, i8\n"), Fault::InvalidType(_)));
        assert!(matches!(fault_of("MOV 5, r1\n"), Fault::UnknownOperand(_)));
        assert!(matches!(fault_of("a:\na:\n"), Fault::DuplicateLabel(_)));
        assert!(matches!(
            fault_of("FUNC f\nENDFUNC\nFUNC f\nENDFUNC\n"),
            Fault::DuplicateFunction(_)
        ));
        assert!(matches!(fault_of("FUNC f\nFUNC g\n"), Fault::UnbalancedFunction(_)));
        assert!(matches!(fault_of("ENDFUNC\n"), Fault::UnbalancedFunction(_)));
        assert!(matches!(fault_of("FUNC f\nNOP\n"), Fault::UnbalancedFunction(_)));
        assert!(matches!(
            fault_of("CALL f, 1\nFUNC f a:i16, b:i16\nENDFUNC\n"),
            Fault::ArityMismatch { found: 1, .. }
        ));
    }

    #[test]
    fn test_error_reports_line() {
        let err = assemble("NOP\nNOP\nJMP missing\n").unwrap_err();
        assert_eq!(err.origin().map(|o| o.line), Some(3));
        assert!(err.to_string().contains("JMP missing"));
    }

    #[test]
    fn test_deterministic() {
        let source = "b:\nNOP\na:\nCALL f\nFUNC f\nENDFUNC\nFUNC g x:str\nENDFUNC\n";
        let first = assemble(source).unwrap();
        let second = assemble(source).unwrap();
        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first, second);
    }

    #[test]
    fn test_case_insensitive() {
        let program = assemble("Loop:\nmov R1, 1\nJmp LOOP\n").unwrap();
        assert_eq!(program.symbols.label("loop"), Some(0));
        assert_eq!(program.instructions[0].operands[0], Operand::Name("r1".into()));
    }
}
