//! Runtime facade: load, assemble and run .asp programs

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::assembler::Assembler;
use crate::config::MachineConfig;
use crate::engine::{Engine, ExitReason};
use crate::error::{AspError, AspResult};
use crate::instruction::Program;
use crate::preprocess::{Preprocessor, SourceLoader};

/// Final register value in a [`RunReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    pub name: String,
    pub value: String,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub exit: ExitReason,
    pub total_cycles: u64,
    /// Cycles per width class, keyed `w16`, `w32`, `w64`, `w128`
    pub cycles_by_width: BTreeMap<String, u64>,
    pub instructions: u64,
    /// Register bank after the run, in bank order
    pub registers: Vec<RegisterValue>,
}

impl RunReport {
    pub fn from_engine<R: BufRead, W: Write>(engine: &Engine<'_, R, W>, exit: ExitReason) -> Self {
        let cycles = engine.cycles();
        Self {
            exit,
            total_cycles: cycles.total(),
            cycles_by_width: cycles.iter().map(|(c, n)| (c.to_string(), n)).collect(),
            instructions: cycles.instructions(),
            registers: engine
                .store()
                .registers()
                .map(|(name, value)| RegisterValue {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> AspResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads one program and runs it against a machine configuration
pub struct AspRuntime {
    config: MachineConfig,
    program: Option<Program>,
}

impl AspRuntime {
    /// Runtime for a validated machine configuration
    pub fn new(config: MachineConfig) -> AspResult<Self> {
        config.validate()?;
        Ok(Self { config, program: None })
    }

    /// Runtime configured from the environment (`ASP_CONFIG`, `ASP_PROMPT_INPUT`)
    pub fn from_env() -> AspResult<Self> {
        Self::new(MachineConfig::from_env()?)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Load a program file, expanding its includes from the filesystem
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> AspResult<&Program> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading program");
        let lines = Preprocessor::from_fs().expand_file(path)?;
        self.install(Assembler::new().assemble(&lines)?)
    }

    /// Load a program through a custom loader
    pub fn load_with<L: SourceLoader>(&mut self, loader: L, path: impl AsRef<Path>) -> AspResult<&Program> {
        let lines = Preprocessor::new(loader).expand_file(path)?;
        self.install(Assembler::new().assemble(&lines)?)
    }

    /// Load in-memory source; includes resolve against the working directory
    pub fn load_source(&mut self, source: &str) -> AspResult<&Program> {
        let lines = Preprocessor::from_fs().expand_source("<source>", source, ".")?;
        self.install(Assembler::new().assemble(&lines)?)
    }

    fn install(&mut self, program: Program) -> AspResult<&Program> {
        Ok(self.program.insert(program))
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Run the loaded program with the given input and output streams
    pub fn run_with<R: BufRead, W: Write>(&self, input: R, output: W) -> AspResult<RunReport> {
        let program = self.program.as_ref().ok_or(AspError::NoProgram)?;
        let mut engine = Engine::new(program, &self.config, input, output);
        let exit = engine.run()?;
        Ok(RunReport::from_engine(&engine, exit))
    }

    /// Run the loaded program on stdin/stdout
    pub fn run(&self) -> AspResult<RunReport> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with(stdin.lock(), stdout.lock())
    }

    /// Load and run a file on stdin/stdout
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> AspResult<RunReport> {
        self.load_file(path)?;
        self.run()
    }

    /// Load and run in-memory source on stdin/stdout
    pub fn run_source(&mut self, source: &str) -> AspResult<RunReport> {
        self.load_source(source)?;
        self.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::MemoryLoader;

    fn runtime() -> AspRuntime {
        AspRuntime::new(MachineConfig::default().with_prompt_input(false)).unwrap()
    }

    #[test]
    fn test_runtime_simple_program() {
        let mut rt = runtime();
        rt.load_source("MOV r1, 5\nMOV r14, -1\nPRINT r1\n").unwrap();
        let mut out = Vec::new();
        let report = rt.run_with("".as_bytes(), &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "5\n");
        assert_eq!(report.exit, ExitReason::End);
        assert_eq!(report.total_cycles, 9);
        assert_eq!(report.cycles_by_width["w16"], 1);
        assert_eq!(report.cycles_by_width["w128"], 8);
        assert_eq!(report.instructions, 3);
        assert_eq!(report.registers[0].value, "5");
        assert_eq!(report.registers[13].value, u128::MAX.to_string());
    }

    #[test]
    fn test_run_without_program() {
        let rt = runtime();
        assert!(matches!(rt.run_with("".as_bytes(), Vec::new()), Err(AspError::NoProgram)));
    }

    #[test]
    fn test_load_with_loader() {
        let loader = MemoryLoader::new()
            .with_file("main.asp", "INCLUDE \"lib.asp\"\nCALL hello\n")
            .with_file("lib.asp", "JMP start\nFUNC hello\n  PRINT \"hi\"\nENDFUNC\nstart:\n");
        let mut rt = runtime();
        rt.load_with(loader, "main.asp").unwrap();
        let mut out = Vec::new();
        rt.run_with("".as_bytes(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hi\n");
    }

    #[test]
    fn test_report_json() {
        let mut rt = runtime();
        rt.load_source("HALT\n").unwrap();
        let report = rt.run_with("".as_bytes(), Vec::new()).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"exit\": \"halt\""));
        assert!(json.contains("\"total_cycles\": 0"));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = MachineConfig::default();
        config.cycles.w32 = 0;
        assert!(matches!(AspRuntime::new(config), Err(AspError::Config(_))));
    }
}
