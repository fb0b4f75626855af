//! Module `scanner` implements a one-pass lexer for the language.
//!
//! It turns a UTF-8 source string into a sequence of [`Token`]s, skipping
//! whitespace and comments, and emitting exactly one `EOF` token at the end.
//! The scanner is a `FusedIterator`, so it chains safely with other iterator
//! adapters. A lexing error does not stop the scan: the offending input is
//! skipped and the next call picks up right after it.
//!
//! # Token Recognition
//!
//! - Single-character tokens: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`.
//! - Two-character operators: `!=`, `==`, `<=`, `>=`.
//! - String literals: `"` … `"`, allowing multi-line and reporting unterminated errors.
//! - Numeric literals: integer and optional fractional part.
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect-hash `KEYWORDS` map.
//!
//! Comment skipping uses `memchr` to jump straight to the next newline.
//!
//! # Example
//!
//! ```rust
//! use rlox_tree::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("print 123; // example");
//! for result in &mut scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile-time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "fun"    => TokenType::FUN,
    "for"    => TokenType::FOR,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "print"  => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

/// Scanner over a borrowed source string.
pub struct Scanner<'a> {
    source: &'a str,
    src: &'a [u8],
    start: usize,               // first byte of the current lexeme
    curr: usize,                // one past the last byte examined
    line: usize,                // 1-based
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
    done: bool,
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `source`.
    pub fn new(source: &'a str) -> Self {
        info!("Scanner created over {} bytes", source.len());

        Self {
            source,
            src: source.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
            done: false,
        }
    }

    /// Drain the scanner, splitting tokens from lexing errors. The token list
    /// always ends with `EOF`.
    pub fn scan_tokens(self) -> (Vec<Token>, Vec<LoxError>) {
        let mut tokens: Vec<Token> = Vec::new();
        let mut errors: Vec<LoxError> = Vec::new();

        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }

        info!(
            "Scanned {} token(s) with {} error(s)",
            tokens.len(),
            errors.len()
        );

        (tokens, errors)
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Advance one byte and return it. Callers guard with [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte, or `0` past the end.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.src.get(self.curr).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.src.get(self.curr + 1).copied().unwrap_or(0)
    }

    /// Consume the current byte iff it equals `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.peek() == expected && !self.is_at_end() {
            self.curr += 1;
            true
        } else {
            false
        }
    }

    fn pick(&mut self, expected: u8, matched: TokenType, single: TokenType) -> TokenType {
        if self.match_byte(expected) {
            matched
        } else {
            single
        }
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a single lexeme starting at `self.curr`. A real token leaves its
    /// kind in `self.pending`; whitespace and comments leave it empty.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        let tt = match b {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.pick(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.pick(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.pick(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.pick(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b' ' | b'\r' | b'\t' => return Ok(()),

            b'\n' => {
                self.line += 1;
                return Ok(());
            }

            b'/' => {
                if self.match_byte(b'/') {
                    match memchr(b'\n', &self.src[self.curr..]) {
                        Some(pos) => self.curr += pos,
                        None => self.curr = self.src.len(),
                    }
                    return Ok(());
                }

                TokenType::SLASH
            }

            b'"' => self.string()?,

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Skip the whole character so multi-byte input never splits.
                let ch = self.source[self.start..].chars().next().unwrap_or('\u{fffd}');
                self.curr = self.start + ch.len_utf8();

                debug!("Unexpected character {:?} on line {}", ch, self.line);

                return Err(LoxError::lex(self.line, "Unexpected character."));
            }
        };

        self.pending = Some(tt);

        Ok(())
    }

    /// Double-quoted string literal; `self.start` points at the opening quote.
    fn string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        let text: &str = &self.source[self.start + 1..self.curr - 1];

        Ok(TokenType::STRING(text.to_owned()))
    }

    /// Numeric literal (`123`, `3.14`). A trailing `.` is not consumed.
    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Only ASCII digits and one dot were consumed, so parsing cannot fail.
        let n: f64 = self.source[self.start..self.curr]
            .parse::<f64>()
            .unwrap_or(0.0);

        TokenType::NUMBER(n)
    }

    /// Identifier or keyword.
    fn identifier(&mut self) -> TokenType {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        KEYWORDS
            .get(&self.source[self.start..self.curr])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.is_at_end() {
                self.done = true;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lexeme: &str = &self.source[self.start..self.curr];
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lexeme, self.line)));
            }
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
