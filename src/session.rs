//! Drives one source text through scanning, parsing, resolution and
//! execution against a long-lived interpreter.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::{LoxError, Reporter, StreamReporter};
use crate::interpreter::{Interpreter, InterpreterConfig};
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

/// Outcome of running one source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Lex, parse or resolve errors were reported; nothing ran.
    StaticError,
    /// Execution stopped at a runtime error.
    RuntimeError,
}

impl Status {
    /// Conventional process exit code (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::StaticError => 65,
            Status::RuntimeError => 70,
        }
    }
}

/// An interpreter plus the reporter its diagnostics go to. A REPL keeps one
/// session for every line, so globals persist between lines.
pub struct Session<W: Write, R: Reporter> {
    interpreter: Interpreter<W>,
    reporter: R,
}

impl Session<io::Stdout, StreamReporter<io::Stderr>> {
    /// Program output to stdout, diagnostics to stderr.
    pub fn stdio(config: InterpreterConfig) -> Self {
        Self::new(
            Interpreter::with_config(io::stdout(), config),
            StreamReporter::new(io::stderr()),
        )
    }
}

impl<W: Write, R: Reporter> Session<W, R> {
    pub fn new(interpreter: Interpreter<W>, reporter: R) -> Self {
        Self {
            interpreter,
            reporter,
        }
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_parts(self) -> (Interpreter<W>, R) {
        (self.interpreter, self.reporter)
    }

    /// Scan, parse, resolve and execute `source`.
    pub fn run(&mut self, source: &str) -> Status {
        info!("Running {} bytes of source", source.len());

        let (tokens, mut errors) = Scanner::new(source).scan_tokens();

        let statements = match Parser::new(tokens).parse() {
            Ok(statements) => statements,
            Err(parse_errors) => {
                errors.extend(parse_errors);
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return self.report_static(&errors);
        }

        let resolver = Resolver::new().with_globals(self.interpreter.global_names());

        match resolver.resolve(&statements) {
            Ok(locals) => self.interpreter.add_locals(locals),
            Err(errors) => return self.report_static(&errors),
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => Status::Ok,
            Err(e) => {
                debug!("Runtime debug: {}", e);
                self.reporter.runtime_error(&e);
                Status::RuntimeError
            }
        }
    }

    fn report_static(&mut self, errors: &[LoxError]) -> Status {
        debug!("{} static error(s); skipping execution", errors.len());

        for error in errors {
            error.report_to(&mut self.reporter);
        }

        Status::StaticError
    }
}
