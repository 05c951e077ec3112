//! Source inclusion
//!
//! Expands `INCLUDE`, `IMPORT` and `IMPORTVAR` directives before assembly:
//!
//! ```text
//! INCLUDE "lib/math.asp"              whole file
//! IMPORT square FROM "lib/math.asp"   only the FUNC square ... ENDFUNC block
//! IMPORTVAR limit FROM "config.asp"   only the first top-level MOV/VAR/CONST of limit
//! ```
//!
//! Paths are relative to the including file. Every expanded line keeps the
//! file and line it came from.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AspError, AspResult, Fault, Origin};
use crate::lexer::{self, Token};

/// One line of expanded source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub origin: Origin,
    pub text: String,
}

impl SourceLine {
    /// Number the lines of `source` as coming from `file`
    pub fn numbered(file: &str, source: &str) -> Vec<SourceLine> {
        let file: std::sync::Arc<str> = file.into();
        source
            .lines()
            .enumerate()
            .map(|(i, text)| SourceLine {
                origin: Origin::new(file.clone(), i + 1),
                text: text.to_string(),
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Where included files are read from
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;

    /// Identity of a file for cycle detection
    fn canonical(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// Reads from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// In-memory file set, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.files.insert(path.into(), source.into());
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Directive {
    Include(String),
    Import { name: String, path: String },
    ImportVar { name: String, path: String },
}

/// Recognize a directive line; `Ok(None)` for ordinary lines
fn directive(text: &str) -> Result<Option<Directive>, Fault> {
    // lexing errors surface later, from the assembler
    let Ok(tokens) = lexer::tokenize(text) else {
        return Ok(None);
    };
    let Some(head) = tokens.first().and_then(Token::ident) else {
        return Ok(None);
    };
    match (head, &tokens[1..]) {
        ("include", [Token::Str(path)]) => Ok(Some(Directive::Include(path.clone()))),
        ("include", _) => Err(Fault::InvalidInstruction("INCLUDE expects a quoted path".to_string())),
        ("import", [Token::Ident(name), from, Token::Str(path)]) if from.is_ident("from") => {
            Ok(Some(Directive::Import {
                name: name.clone(),
                path: path.clone(),
            }))
        }
        ("import", _) => Err(Fault::InvalidInstruction(
            "IMPORT expects: IMPORT name FROM \"file\"".to_string(),
        )),
        ("importvar", [Token::Ident(name), from, Token::Str(path)]) if from.is_ident("from") => {
            Ok(Some(Directive::ImportVar {
                name: name.clone(),
                path: path.clone(),
            }))
        }
        ("importvar", _) => Err(Fault::InvalidInstruction(
            "IMPORTVAR expects: IMPORTVAR name FROM \"file\"".to_string(),
        )),
        _ => Ok(None),
    }
}

fn tokens_of(line: &SourceLine) -> Option<Vec<Token>> {
    lexer::tokenize(&line.text).ok().filter(|t| !t.is_empty())
}

/// The `FUNC name ... ENDFUNC` block of `name`
fn extract_function(lines: &[SourceLine], name: &str) -> Option<Vec<SourceLine>> {
    let start = lines.iter().position(|line| {
        tokens_of(line).is_some_and(|t| t[0].is_ident("func") && t.get(1).is_some_and(|n| n.is_ident(name)))
    })?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| tokens_of(line).is_some_and(|t| t[0].is_ident("endfunc")))
        .map(|offset| start + 1 + offset)
        .unwrap_or(lines.len() - 1);
    Some(lines[start..=end].to_vec())
}

/// The first top-level MOV/VAR/CONST defining `name`
fn extract_variable(lines: &[SourceLine], name: &str) -> Option<SourceLine> {
    let mut depth = 0usize;
    for line in lines {
        let Some(tokens) = tokens_of(line) else {
            continue;
        };
        let head = tokens[0].ident().unwrap_or_default();
        match head {
            "func" => depth += 1,
            "endfunc" => depth = depth.saturating_sub(1),
            "mov" | "var" | "const" if depth == 0 && tokens.get(1).is_some_and(|t| t.is_ident(name)) => {
                return Some(line.clone());
            }
            _ => {}
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════════
// PREPROCESSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Expands inclusion directives recursively
pub struct Preprocessor<L: SourceLoader = FsLoader> {
    loader: L,
    /// Files currently being expanded, outermost first
    stack: Vec<PathBuf>,
}

impl Preprocessor<FsLoader> {
    /// Preprocessor reading from the filesystem
    pub fn from_fs() -> Self {
        Self::new(FsLoader)
    }
}

impl<L: SourceLoader> Preprocessor<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            stack: Vec::new(),
        }
    }

    /// Read and expand a root file
    pub fn expand_file(&mut self, path: impl AsRef<Path>) -> AspResult<Vec<SourceLine>> {
        let path = path.as_ref();
        let source = self.loader.load(path).map_err(|source| AspError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.expand_nested(path, &source)
    }

    /// Expand in-memory source; includes resolve against `base_dir`
    pub fn expand_source(&mut self, name: &str, source: &str, base_dir: impl AsRef<Path>) -> AspResult<Vec<SourceLine>> {
        let lines = SourceLine::numbered(name, source);
        self.expand_lines(lines, base_dir.as_ref())
    }

    fn expand_nested(&mut self, path: &Path, source: &str) -> AspResult<Vec<SourceLine>> {
        let canonical = self.loader.canonical(path);
        self.stack.push(canonical);
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let lines = SourceLine::numbered(&path.display().to_string(), source);
        let result = self.expand_lines(lines, &base);
        self.stack.pop();
        result
    }

    fn expand_lines(&mut self, lines: Vec<SourceLine>, base: &Path) -> AspResult<Vec<SourceLine>> {
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            let at_line = |fault: Fault| AspError::Assembly {
                origin: line.origin.clone(),
                text: line.text.trim().to_string(),
                fault,
            };
            match directive(&line.text).map_err(at_line)? {
                None => out.push(line),
                Some(Directive::Include(rel)) => {
                    let expanded = self.include(base, &rel, &line)?;
                    debug!(file = %rel, lines = expanded.len(), "included file");
                    out.extend(expanded);
                }
                Some(Directive::Import { name, path }) => {
                    let expanded = self.include(base, &path, &line)?;
                    let block = extract_function(&expanded, &name).ok_or_else(|| {
                        at_line(Fault::ImportNotFound {
                            name: name.clone(),
                            file: path.clone(),
                        })
                    })?;
                    debug!(function = %name, file = %path, "imported function");
                    out.extend(block);
                }
                Some(Directive::ImportVar { name, path }) => {
                    let expanded = self.include(base, &path, &line)?;
                    let def = extract_variable(&expanded, &name).ok_or_else(|| {
                        at_line(Fault::ImportNotFound {
                            name: name.clone(),
                            file: path.clone(),
                        })
                    })?;
                    debug!(variable = %name, file = %path, "imported variable");
                    out.push(def);
                }
            }
        }
        Ok(out)
    }

    fn include(&mut self, base: &Path, rel: &str, line: &SourceLine) -> AspResult<Vec<SourceLine>> {
        let path = base.join(rel);
        let canonical = self.loader.canonical(&path);
        if self.stack.contains(&canonical) {
            return Err(AspError::Assembly {
                origin: line.origin.clone(),
                text: line.text.trim().to_string(),
                fault: Fault::IncludeCycle(path.display().to_string()),
            });
        }
        let source = self.loader.load(&path).map_err(|source| AspError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.expand_nested(&path, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[SourceLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.trim()).collect()
    }

    #[test]
    fn test_plain_source_passes_through() {
        let mut pre = Preprocessor::new(MemoryLoader::new());
        let lines = pre.expand_source("main.asp", "MOV r1, 1\n// note\nHALT\n", "").unwrap();
        assert_eq!(texts(&lines), vec!["MOV r1, 1", "// note", "HALT"]);
        assert_eq!(lines[2].origin, Origin::new("main.asp", 3));
    }

    #[test]
    fn test_include_keeps_origins() {
        let loader = MemoryLoader::new()
            .with_file("lib/util.asp", "NOP\nINCLUDE \"deep.asp\"\n")
            .with_file("lib/deep.asp", "HALT\n");
        let mut pre = Preprocessor::new(loader);
        let lines = pre
            .expand_source("main.asp", "MOV r1, 1\nINCLUDE \"lib/util.asp\"\n", "")
            .unwrap();
        assert_eq!(texts(&lines), vec!["MOV r1, 1", "NOP", "HALT"]);
        assert_eq!(lines[1].origin, Origin::new("lib/util.asp", 1));
        assert_eq!(lines[2].origin, Origin::new("lib/deep.asp", 1));
    }

    #[test]
    fn test_import_function_block() {
        let loader = MemoryLoader::new().with_file(
            "math.asp",
            "MOV r1, 9\nFUNC square x:i32\n  MUL x, x\n  RETV x\nENDFUNC\nFUNC cube x:i32\nENDFUNC\n",
        );
        let mut pre = Preprocessor::new(loader);
        let lines = pre
            .expand_source("main.asp", "IMPORT square FROM \"math.asp\"\n", "")
            .unwrap();
        assert_eq!(
            texts(&lines),
            vec!["FUNC square x:i32", "MUL x, x", "RETV x", "ENDFUNC"]
        );
    }

    #[test]
    fn test_import_variable() {
        let loader = MemoryLoader::new().with_file(
            "config.asp",
            "FUNC f\n  VAR limit, i32, 1\nENDFUNC\nCONST limit, i32, 100\nMOV limit, 5\n",
        );
        let mut pre = Preprocessor::new(loader);
        let lines = pre
            .expand_source("main.asp", "IMPORTVAR limit FROM \"config.asp\"\n", "")
            .unwrap();
        assert_eq!(texts(&lines), vec!["CONST limit, i32, 100"]);
    }

    #[test]
    fn test_import_not_found() {
        let loader = MemoryLoader::new().with_file("math.asp", "NOP\n");
        let mut pre = Preprocessor::new(loader);
        let err = pre
            .expand_source("main.asp", "IMPORT nope FROM \"math.asp\"\n", "")
            .unwrap_err();
        assert!(matches!(err.fault(), Some(Fault::ImportNotFound { .. })));
    }

    #[test]
    fn test_include_cycle() {
        let loader = MemoryLoader::new()
            .with_file("a.asp", "INCLUDE \"b.asp\"\n")
            .with_file("b.asp", "INCLUDE \"a.asp\"\n");
        let mut pre = Preprocessor::new(loader);
        let err = pre.expand_file("a.asp").unwrap_err();
        assert!(matches!(err.fault(), Some(Fault::IncludeCycle(_))));
        assert_eq!(err.origin(), Some(&Origin::new("b.asp", 1)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut pre = Preprocessor::new(MemoryLoader::new());
        let err = pre
            .expand_source("main.asp", "INCLUDE \"gone.asp\"\n", "")
            .unwrap_err();
        assert!(matches!(err, AspError::Io { .. }));
    }

    #[test]
    fn test_malformed_directive() {
        let mut pre = Preprocessor::new(MemoryLoader::new());
        let err = pre.expand_source("main.asp", "INCLUDE gone.asp\n", "").unwrap_err();
        assert!(matches!(err.fault(), Some(Fault::InvalidInstruction(_))));
    }
}
