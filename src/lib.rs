pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod stack;
pub mod token;
pub mod value;

/// Name of the method that acts as a class initializer.
pub const INITIALIZER_NAME: &str = "init";

/// Upper bound on call arguments and function parameters.
pub const MAX_ARITY: usize = 255;
