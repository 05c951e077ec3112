//! Machine configuration
//!
//! [`MachineConfig`] describes the register bank and cycle cost table. It can
//! be loaded from a TOML file; the environment (optionally from a `.env`
//! file) selects that file and a few runtime switches.
//!
//! ```toml
//! prompt_input = true
//!
//! [cycles]
//! w16 = 1
//! w32 = 2
//! w64 = 4
//! w128 = 8
//!
//! [[registers]]
//! name = "acc"
//! width = 64
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cycles::CycleCosts;
use crate::error::{AspError, AspResult};
use crate::types::WidthClass;

// Load .env the first time any setting is read
static DOTENV_INIT: Lazy<()> = Lazy::new(|| {
    let _ = dotenv::dotenv();
});

#[inline]
fn ensure_loaded() {
    let _ = &*DOTENV_INIT;
}

/// Path of the machine config file (`ASP_CONFIG`)
pub fn config_path() -> Option<String> {
    ensure_loaded();
    env::var("ASP_CONFIG").ok().filter(|v| !v.trim().is_empty())
}

/// INPUT prompt override (`ASP_PROMPT_INPUT`), when set to a boolean
pub fn prompt_input_override() -> Option<bool> {
    ensure_loaded();
    env::var("ASP_PROMPT_INPUT").ok().and_then(|v| parse_bool(&v))
}

/// Log filter for the command-line tool (`ASP_LOG`)
/// Default: "warn"
pub fn log_filter() -> String {
    ensure_loaded();
    env::var("ASP_LOG").unwrap_or_else(|_| "warn".to_string())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// One register of the fixed bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSpec {
    pub name: String,
    /// Width in bits: 16, 32, 64 or 128
    pub width: WidthClass,
}

impl RegisterSpec {
    pub fn new(name: impl Into<String>, width: WidthClass) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    /// r1-r6 16-bit, r7-r10 32-bit, r11-r13 64-bit, r14-r16 128-bit
    pub fn default_bank() -> Vec<RegisterSpec> {
        (1..=16)
            .map(|i| {
                let width = match i {
                    1..=6 => WidthClass::W16,
                    7..=10 => WidthClass::W32,
                    11..=13 => WidthClass::W64,
                    _ => WidthClass::W128,
                };
                RegisterSpec::new(format!("r{i}"), width)
            })
            .collect()
    }
}

/// Register bank, cost table and I/O behaviour of one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub cycles: CycleCosts,
    pub registers: Vec<RegisterSpec>,
    /// Print a prompt before INPUT reads a line
    pub prompt_input: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cycles: CycleCosts::default(),
            registers: RegisterSpec::default_bank(),
            prompt_input: true,
        }
    }
}

impl MachineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> AspResult<Self> {
        let config: MachineConfig = toml::from_str(content)
            .map_err(|e| AspError::Config(format!("failed to parse machine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AspResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AspError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Config named by `ASP_CONFIG`, else the default machine; `ASP_PROMPT_INPUT` overrides the file
    pub fn from_env() -> AspResult<Self> {
        let mut config = match config_path() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(prompt) = prompt_input_override() {
            config.prompt_input = prompt;
        }
        Ok(config)
    }

    pub fn with_prompt_input(mut self, prompt: bool) -> Self {
        self.prompt_input = prompt;
        self
    }

    pub fn with_cycles(mut self, cycles: CycleCosts) -> Self {
        self.cycles = cycles;
        self
    }

    /// Reject duplicate or malformed register names and zero costs
    pub fn validate(&self) -> AspResult<()> {
        if self.registers.is_empty() {
            return Err(AspError::Config("register bank is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for reg in &self.registers {
            let name = reg.name.to_ascii_lowercase();
            let valid = name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(AspError::Config(format!("invalid register name '{}'", reg.name)));
            }
            if !seen.insert(name) {
                return Err(AspError::Config(format!("duplicate register '{}'", reg.name)));
            }
        }
        if let Some(class) = self.cycles.zero_classes().next() {
            return Err(AspError::Config(format!("cycle cost for {class} must be non-zero")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_machine() {
        let config = MachineConfig::default();
        assert_eq!(config.registers.len(), 16);
        assert_eq!(config.registers[0], RegisterSpec::new("r1", WidthClass::W16));
        assert_eq!(config.registers[9].width, WidthClass::W32);
        assert_eq!(config.registers[12].width, WidthClass::W64);
        assert_eq!(config.registers[15].width, WidthClass::W128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config = MachineConfig::from_toml_str(
            r#"
            prompt_input = false

            [cycles]
            w16 = 2
            w128 = 16

            [[registers]]
            name = "acc"
            width = 64

            [[registers]]
            name = "flag"
            width = 16
            "#,
        )
        .unwrap();

        assert!(!config.prompt_input);
        assert_eq!(config.cycles.w16, 2);
        assert_eq!(config.cycles.w32, 2);
        assert_eq!(config.cycles.w128, 16);
        assert_eq!(config.registers.len(), 2);
        assert_eq!(config.registers[0].width, WidthClass::W64);
    }

    #[test]
    fn test_rejects_bad_configs() {
        let dup = r#"
            [[registers]]
            name = "a"
            width = 16
            [[registers]]
            name = "A"
            width = 32
        "#;
        assert!(matches!(MachineConfig::from_toml_str(dup), Err(AspError::Config(_))));

        let zero = "[cycles]\nw64 = 0\n";
        assert!(matches!(MachineConfig::from_toml_str(zero), Err(AspError::Config(_))));

        let width = "[[registers]]\nname = \"x\"\nwidth = 12\n";
        assert!(matches!(MachineConfig::from_toml_str(width), Err(AspError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.toml");
        fs::write(&path, "prompt_input = false\n").unwrap();
        let config = MachineConfig::from_file(&path).unwrap();
        assert!(!config.prompt_input);
        assert_eq!(config.registers.len(), 16);

        let missing = MachineConfig::from_file(dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(AspError::Io { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
