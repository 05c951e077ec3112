//! asp - Assemplex assembly interpreter
//! Command-line interface for checking, dumping and running .asp programs

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use asp_core::config::{self, MachineConfig};
use asp_core::preprocess::Preprocessor;
use asp_core::{AspError, AspRuntime, Assembler, OpcodeCategory, Program};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "asp")]
#[command(author = "Assemplex Contributors")]
#[command(version = "2026.10.19")]
#[command(about = "Assemplex - width-typed assembly interpreter", long_about = None)]
struct Cli {
    /// Log calls, returns and assembly details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and run a program
    Run {
        /// Program file (.asp)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Machine config (TOML); defaults to $ASP_CONFIG or the built-in machine
        #[arg(short, long, value_name = "TOML")]
        config: Option<PathBuf>,

        /// Print the run report as JSON instead of the cycle total
        #[arg(long)]
        json: bool,

        /// Read INPUT lines without printing a prompt
        #[arg(long)]
        no_prompt: bool,
    },

    /// Assemble only and show the symbol tables
    Check {
        /// Program file (.asp)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the symbol tables as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the assembled instruction listing
    Dump {
        /// Program file (.asp)
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show information about the machine and instruction set
    Info,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            input,
            config,
            json,
            no_prompt,
        } => run_command(&input, config.as_deref(), json, no_prompt),
        Commands::Check { input, json } => check_command(&input, json),
        Commands::Dump { input } => dump_command(&input),
        Commands::Info => {
            print_info();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprint!("{}", render_error(&e));
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("asp_core=debug,asp=debug")
    } else {
        EnvFilter::try_new(config::log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>, no_prompt: bool) -> Result<MachineConfig> {
    let config = match path {
        Some(path) => {
            debug!(path = %path.display(), "machine config from file");
            MachineConfig::from_file(path)?
        }
        None => MachineConfig::from_env()?,
    };
    Ok(if no_prompt { config.with_prompt_input(false) } else { config })
}

fn assemble_file(input: &Path) -> Result<Program> {
    let lines = Preprocessor::from_fs().expand_file(input)?;
    Ok(Assembler::new().assemble(&lines)?)
}

fn run_command(input: &Path, config: Option<&Path>, json: bool, no_prompt: bool) -> Result<()> {
    let config = load_config(config, no_prompt)?;
    let mut runtime = AspRuntime::new(config)?;
    let report = runtime.run_file(input)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("Total cycles: {}", report.total_cycles);
    }
    Ok(())
}

fn check_command(input: &Path, json: bool) -> Result<()> {
    let program = assemble_file(input)?;
    let symbols = &program.symbols;

    if json {
        let functions: BTreeMap<_, _> = symbols
            .functions
            .values()
            .map(|f| {
                let params: Vec<_> = f
                    .params
                    .iter()
                    .map(|p| serde_json::json!({ "name": p.name, "type": p.ty.name() }))
                    .collect();
                (f.name.clone(), serde_json::json!({ "entry": f.entry, "params": params }))
            })
            .collect();
        let doc = serde_json::json!({
            "file": input.display().to_string(),
            "instructions": program.len(),
            "labels": symbols.labels,
            "functions": functions,
        });
        println!("{}", serde_json::to_string_pretty(&doc).context("encoding symbol tables")?);
        return Ok(());
    }

    println!("{} {}", "Checking".green().bold(), input.display().to_string().cyan());

    if !symbols.labels.is_empty() {
        println!("\n{}", "Labels:".bold());
        for (name, index) in &symbols.labels {
            println!("  {:<24} {}", name.cyan(), index);
        }
    }
    if !symbols.functions.is_empty() {
        println!("\n{}", "Functions:".bold());
        for f in symbols.functions.values() {
            let params: Vec<String> = f.params.iter().map(|p| format!("{}:{}", p.name, p.ty)).collect();
            println!("  {:<24} {} ({})", f.name.cyan(), f.entry, params.join(", "));
        }
    }

    println!(
        "\n{} No errors found ({} instruction(s))",
        "    Finished".green().bold(),
        program.len()
    );
    Ok(())
}

fn dump_command(input: &Path) -> Result<()> {
    let program = assemble_file(input)?;
    print!("{}", listing(&program));
    Ok(())
}

/// One line per instruction, with labels and function entries above their target
fn listing(program: &Program) -> String {
    let mut marks: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (name, index) in &program.symbols.labels {
        marks.entry(*index).or_default().push(format!("{name}:"));
    }
    for f in program.symbols.functions.values() {
        marks.entry(f.entry).or_default().push(format!("FUNC {}", f.name));
    }

    let mut out = String::new();
    for (index, instr) in program.instructions.iter().enumerate() {
        for mark in marks.get(&index).into_iter().flatten() {
            let _ = writeln!(out, "{}", mark.yellow());
        }
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {}",
            index.to_string().dimmed(),
            instr.origin.to_string().dimmed(),
            instr
        );
    }
    // labels placed after the last instruction
    for mark in marks.get(&program.len()).into_iter().flatten() {
        let _ = writeln!(out, "{}", mark.yellow());
    }
    out
}

/// Opcodes grouped by category, with their operand counts
fn instruction_table() -> String {
    let mut out = String::new();
    for category in OpcodeCategory::ALL {
        let ops: Vec<String> = category
            .opcodes()
            .map(|op| format!("{}/{}", op.mnemonic(), op.signature().describe()))
            .collect();
        let _ = writeln!(out, "  {:<12} {}", category.name().cyan(), ops.join("  "));
    }
    out
}

// ============================================================================
// Diagnostics
// ============================================================================

fn render_error(err: &anyhow::Error) -> String {
    let Some(asp) = err.downcast_ref::<AspError>() else {
        return format!("{} {:#}\n", "error:".red().bold(), err);
    };

    match asp {
        AspError::Assembly { origin, text, fault } | AspError::Runtime { origin, text, fault, .. } => {
            let stage = if asp.is_runtime() { "runtime" } else { "assembly" };
            let gutter = origin.line.to_string();
            let pad = " ".repeat(gutter.len());
            format!(
                "{}: {}\n{}{} {} ({})\n{} {}\n{} {} {}\n",
                format!("error[{}]", fault.kind()).red().bold(),
                fault,
                pad,
                "-->".blue().bold(),
                origin,
                stage,
                pad,
                "|".blue().bold(),
                gutter.blue().bold(),
                "|".blue().bold(),
                text,
            )
        }
        other => format!("{} {}\n", "error:".red().bold(), other),
    }
}

fn print_info() {
    let machine = MachineConfig::default();

    println!("{}", "Assemplex - width-typed assembly interpreter".bold());
    println!();
    println!("{}", "Register bank:".bold());
    for reg in &machine.registers {
        println!("  {:<6} {:>3}-bit", reg.name.cyan(), reg.width.bits());
    }
    println!();
    println!("{}", "Cycle costs:".bold());
    println!("  16-bit   {}", machine.cycles.w16);
    println!("  32-bit   {}", machine.cycles.w32);
    println!("  64-bit   {}", machine.cycles.w64);
    println!("  128-bit  {}", machine.cycles.w128);
    println!();
    println!("{}", "Instruction set:".bold());
    print!("{}", instruction_table());
    println!();
    println!("{}", "Pipeline:".bold());
    println!("  Source (.asp)");
    println!("       ↓");
    println!("  INCLUDE / IMPORT / IMPORTVAR expansion");
    println!("       ↓");
    println!("  Assembly (labels, functions)");
    println!("       ↓");
    println!("  Execution + cycle accounting");
    println!();
    println!("{}", "Commands:".bold());
    println!("  asp run program.asp              # Run and print total cycles");
    println!("  asp run program.asp --json       # Run and print the run report");
    println!("  asp check program.asp            # Assemble only");
    println!("  asp dump program.asp             # Show the instruction listing");
    println!();
    println!("{}", "Environment:".bold());
    println!("  ASP_CONFIG        machine config file (TOML)");
    println!("  ASP_PROMPT_INPUT  prompt before INPUT (true/false)");
    println!("  ASP_LOG           log filter (default: warn)");
}
