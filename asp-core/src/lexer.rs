//! Line lexer for .asp source
//!
//! Programs are line oriented, so the lexer works on one line at a time and
//! stops at a `//` or `;` comment. Identifiers are lower-cased here, so every
//! later stage sees normalized names.

use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Fault, FaultResult};
use crate::types::IntLit;

/// Token of one source line
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Mnemonic, register, variable, label, type or keyword (lower case)
    Ident(String),
    Int(IntLit),
    Float(f64),
    Char(char),
    Str(String),
    Comma,
    Colon,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match self {
            Self::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_ident(&self, keyword: &str) -> bool {
        self.ident() == Some(keyword)
    }
}

/// Lexer over a single line
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            chars: line.chars().peekable(),
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.column += 1;
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut s = String::new();
        s.extend(first.to_lowercase());
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                s.extend(c.to_lowercase());
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn read_number(&mut self, first: char) -> FaultResult<Token> {
        let mut s = String::new();
        s.push(first);
        let mut is_float = false;
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+') && s.ends_with(['e', 'E']);
            if c.is_ascii_digit() || exponent_sign {
                s.push(c);
            } else if c == '.' || c == 'e' || c == 'E' {
                is_float = true;
                s.push(c);
            } else if c.is_alphanumeric() || c == '_' {
                // digits glued to letters, e.g. `12ab`
                s.push(c);
                self.advance();
                while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
                    s.push(c);
                    self.advance();
                }
                return Err(Fault::InvalidLiteral(s));
            } else {
                break;
            }
            self.advance();
        }

        if is_float {
            s.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| Fault::InvalidLiteral(s))
        } else {
            s.parse::<IntLit>().map(Token::Int)
        }
    }

    fn read_escape(&mut self, quote: char) -> FaultResult<char> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some(other) => Err(Fault::InvalidLiteral(format!("{quote}\\{other}"))),
            None => Err(Fault::InvalidLiteral(format!("unterminated {quote}"))),
        }
    }

    fn read_string(&mut self) -> FaultResult<String> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(s),
                Some('\\') => s.push(self.read_escape('"')?),
                Some(c) => s.push(c),
                None => return Err(Fault::InvalidLiteral(format!("unterminated string \"{s}"))),
            }
        }
    }

    fn read_char(&mut self) -> FaultResult<char> {
        let c = match self.advance() {
            Some('\\') => self.read_escape('\'')?,
            Some('\'') | None => return Err(Fault::InvalidLiteral("empty char literal".to_string())),
            Some(c) => c,
        };
        match self.advance() {
            Some('\'') => Ok(c),
            _ => Err(Fault::InvalidLiteral(format!("unterminated char literal '{c}"))),
        }
    }

    /// Next token, or `None` at end of line or at a comment
    pub fn next_token(&mut self) -> FaultResult<Option<Token>> {
        self.skip_whitespace();

        let Some(c) = self.advance() else {
            return Ok(None);
        };

        let token = match c {
            ';' => return Ok(None),
            '/' if self.peek() == Some('/') => return Ok(None),
            ',' => Token::Comma,
            ':' => Token::Colon,
            '"' => Token::Str(self.read_string()?),
            '\'' => Token::Char(self.read_char()?),
            '-' | '+' if self.peek().is_some_and(|d| d.is_ascii_digit()) => self.read_number(c)?,
            c if c.is_ascii_digit() => self.read_number(c)?,
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_identifier(c)),
            other => {
                return Err(Fault::UnknownOperand(format!(
                    "unexpected '{other}' at column {}",
                    self.column - 1
                )));
            }
        };
        Ok(Some(token))
    }

    /// All tokens of the line
    pub fn tokenize(mut self) -> FaultResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Tokenize one line
pub fn tokenize(line: &str) -> FaultResult<Vec<Token>> {
    Lexer::new(line).tokenize()
}
