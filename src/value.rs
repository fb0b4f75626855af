use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::callable::{Callable, LoxInstance};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Callable),
    Instance(Rc<RefCell<LoxInstance>>),
}

impl Value {
    /// `nil` and `false` are falsy; everything else, `0` and `""` included,
    /// is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Short kind name used in diagnostics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Callable(Callable::Class(_)) => "class",
            Value::Callable(_) => "function",
            Value::Instance(_) => "instance",
        }
    }
}

impl PartialEq for Value {
    /// Values of different kinds are never equal. Functions, classes and
    /// instances compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                let magnitude = n.abs();

                // Shortest round-trip form outside the plain-decimal range.
                if magnitude >= 1e16 || (magnitude != 0.0 && magnitude < 1e-6) {
                    write!(f, "{:e}", n)
                } else if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Callable(c) => write!(f, "{}", c),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class().name),
        }
    }
}
