//! Centralised error hierarchy for the interpreter.
//!
//! Every phase (scanner, parser, resolver, runtime) converts its failure
//! modes into one of the variants defined here. Static phases accumulate
//! errors and hand them back as values; nothing in the library keeps a
//! process-wide "had error" flag. Printing is left to a [`Reporter`].

use std::io::{self, Write};

use log::info;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error{location}: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// Where on the line the error was found (` at 'x'`, ` at end`, or empty).
        location: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static-analysis failure found by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error`. Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex {
            message,
            location: String::new(),
            line,
        }
    }

    /// Helper constructor for the **parser**. The location is derived from
    /// the offending token.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Resolve error: line={}, msg={}",
            token.line, message
        );

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Source line of the error, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. } => Some(*line),
            LoxError::Runtime(e) => Some(e.line),
            LoxError::Io(_) => None,
        }
    }

    /// Feed this error to a reporter through the matching channel.
    pub fn report_to(&self, reporter: &mut dyn Reporter) {
        match self {
            LoxError::Lex {
                message,
                location,
                line,
            }
            | LoxError::Parse {
                message,
                location,
                line,
            }
            | LoxError::Resolve {
                message,
                location,
                line,
            } => reporter.report(*line, location, message),
            LoxError::Runtime(e) => reporter.runtime_error(e),
            LoxError::Io(e) => reporter.report(0, "", &e.to_string()),
        }
    }
}

fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// A fault raised while evaluating a program. It carries the line of the
/// token that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}\n[line {line}]")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    pub fn new<S: Into<String>>(token: &Token, msg: S) -> Self {
        Self {
            message: msg.into(),
            line: token.line,
        }
    }
}

/// Sink for diagnostics shared by every phase.
pub trait Reporter {
    /// Report a static (lex, parse, resolve) error.
    fn report(&mut self, line: usize, location: &str, message: &str);

    /// Report an error that stopped execution.
    fn runtime_error(&mut self, error: &RuntimeError);
}

/// [`Reporter`] that writes diagnostics to any byte stream.
pub struct StreamReporter<W: Write> {
    out: W,
}

impl<W: Write> StreamReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for StreamReporter<W> {
    fn report(&mut self, line: usize, location: &str, message: &str) {
        // A broken diagnostics stream has nowhere left to report to.
        let _ = writeln!(self.out, "[line {}] Error{}: {}", line, location, message);
    }

    fn runtime_error(&mut self, error: &RuntimeError) {
        let _ = writeln!(self.out, "{}", error);
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
