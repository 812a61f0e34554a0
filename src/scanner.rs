//! Streaming lexer for SparkleCode.
//!
//! [`Scanner`] walks the source bytes once and yields `Result<Token>` items:
//! an `Err` is a lexical error, after which scanning picks up again on the
//! next call so every error in the input is surfaced.  The sequence always
//! ends with exactly one `EOF` token, and the iterator is fused after it.
//!
//! Lexical rules:
//!
//! - `!=`, `==`, `<=`, `>=` are matched greedily over their one-byte prefixes.
//! - `//` runs to end of line; `/* ... */` comments nest.
//! - Strings are `"`-delimited, have no escapes and may span lines.
//! - Numbers are unsigned, with an optional fractional part (`1`, `2.5`; `3.`
//!   is `3` followed by `.`).
//! - Identifiers are `[A-Za-z_][A-Za-z0-9_]*`; reserved words come back as
//!   their keyword kind.
//!
//! ```rust
//! use sparklecode::scanner::Scanner;
//!
//! for result in Scanner::new("print 123; // example") {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use crate::error::{Diagnostics, Result, SparkleError};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

/// Reserved words, looked up by identifier bytes.
static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fn"     => TokenType::FN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    /// First byte of the lexeme being scanned.
    start: usize,
    /// Next byte to look at.
    pos: usize,
    line: usize,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            bytes: text.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            done: false,
        }
    }

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `ahead` positions past the cursor, `0` beyond the input.
    #[inline(always)]
    fn look(&self, ahead: usize) -> u8 {
        self.bytes.get(self.pos + ahead).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.look(0);
        self.pos += 1;
        b
    }

    /// `long` if the next byte is `second` (consuming it), else `short`.
    #[inline(always)]
    fn pair(&mut self, second: u8, long: TokenType, short: TokenType) -> TokenType {
        if !self.at_end() && self.look(0) == second {
            self.pos += 1;
            long
        } else {
            short
        }
    }

    /// Lex from `self.start`.  `Ok(None)` means whitespace or a comment was
    /// consumed and nothing is emitted for it.
    fn lex_one(&mut self) -> Result<Option<TokenType>> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b';' => TokenType::SEMICOLON,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b'*' => TokenType::STAR,

            b'!' => self.pair(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.pair(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.pair(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.pair(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' => match self.look(0) {
                b'/' => {
                    // Leave the newline for the main loop so it is counted.
                    let rest = &self.bytes[self.pos..];
                    self.pos += memchr(b'\n', rest).unwrap_or(rest.len());
                    return Ok(None);
                }
                b'*' => {
                    self.pos += 1;
                    self.block_comment()?;
                    return Ok(None);
                }
                _ => TokenType::SLASH,
            },

            b' ' | b'\r' | b'\t' => return Ok(None),

            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.word(),

            _ => {
                // Skip the whole character, not just its first byte.
                let c: char = self.text[self.start..].chars().next().unwrap_or('\u{fffd}');
                self.pos = self.start + c.len_utf8();

                return Err(SparkleError::lex(
                    self.line,
                    format!("Unexpected character '{}'.", c),
                ));
            }
        };

        Ok(Some(kind))
    }

    /// Body of a `/* */` comment, opener already consumed.
    fn block_comment(&mut self) -> Result<()> {
        let opened_on: usize = self.line;
        let mut depth: usize = 1;

        while !self.at_end() {
            match (self.look(0), self.look(1)) {
                (b'/', b'*') => {
                    depth += 1;
                    self.pos += 2;
                }
                (b'*', b'/') => {
                    depth -= 1;
                    self.pos += 2;

                    if depth == 0 {
                        debug!("Block comment from line {} closed", opened_on);
                        return Ok(());
                    }
                }
                (b'\n', _) => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }

        Err(SparkleError::lex(self.line, "Unterminated block comment."))
    }

    fn string(&mut self) -> Result<TokenType> {
        while !self.at_end() && self.look(0) != b'"' {
            if self.bump() == b'\n' {
                self.line += 1;
            }
        }

        if self.at_end() {
            return Err(SparkleError::lex(self.line, "Unterminated string."));
        }

        self.pos += 1;

        let contents: &str = &self.text[self.start + 1..self.pos - 1];
        Ok(TokenType::STRING(contents.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        self.digits();

        if self.look(0) == b'.' && self.look(1).is_ascii_digit() {
            self.pos += 1;
            self.digits();
        }

        // Only ASCII digits and at most one dot reach here.
        let n: f64 = self.text[self.start..self.pos].parse().unwrap_or(0.0);
        TokenType::NUMBER(n)
    }

    fn digits(&mut self) {
        while self.look(0).is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn word(&mut self) -> TokenType {
        while matches!(self.look(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(&self.bytes[self.start..self.pos])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while !self.at_end() {
            self.start = self.pos;

            match self.lex_one() {
                Ok(Some(kind)) => {
                    let lexeme: &str = &self.text[self.start..self.pos];
                    return Some(Ok(Token::new(kind, lexeme, self.line)));
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }

        self.done = true;
        Some(Ok(Token::new(TokenType::EOF, "", self.line)))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan a whole source unit, recording every lexical error in `diagnostics`.
///
/// The returned vector always ends with a single `EOF` token, even when errors
/// were reported.
pub fn scan_tokens(text: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for result in Scanner::new(text) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => diagnostics.report(e),
        }
    }

    info!(
        "Scanned {} token(s), {} diagnostic(s)",
        tokens.len(),
        diagnostics.len()
    );

    tokens
}
