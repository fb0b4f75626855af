//! Syntax tree produced by the parser and consumed by the resolver and the
//! interpreter.
//!
//! Nodes are immutable once built. The only identity the later passes care
//! about is [`ExprId`], carried by the expressions that name a variable
//! (`Variable`, `Assign`, `This`, `Super`); the resolver keys its binding
//! distances on it.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

/// Stable identity of a variable-referencing expression.
///
/// Ids come from a process-wide counter so that trees parsed from separate
/// REPL lines never collide in the interpreter's side-table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A literal constant that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Integral lexemes such as `"3"` are still stored as `3.0`.
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) if n.fract() == 0.0 => write!(f, "{:.1}", n),
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::Str(s) => write!(f, "{}", s),
            LiteralValue::Bool(b) => write!(f, "{}", b),
            LiteralValue::Nil => write!(f, "nil"),
        }
    }
}

/// Every kind of expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `name = value`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Infix arithmetic, comparison or equality operator.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Function, method or class invocation.
    Call {
        callee: Box<Expr>,
        /// The closing `)`, kept for error locations.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// `object.name`
    Get { object: Box<Expr>, name: Token },

    /// `( expression )`
    Grouping(Box<Expr>),

    Literal(LiteralValue),

    /// Short-circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `object.name = value`
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },

    This { id: ExprId, keyword: Token },

    /// Prefix `!` or `-`.
    Unary { operator: Token, right: Box<Expr> },

    Variable { id: ExprId, name: Token },
}

impl Expr {
    /// Line of the first token this expression carries, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Expr::Assign { name, .. } | Expr::Variable { name, .. } => Some(name.line),
            Expr::Binary { left, .. } | Expr::Logical { left, .. } => left.line(),
            Expr::Call { callee, .. } => callee.line(),
            Expr::Get { object, .. } | Expr::Set { object, .. } => object.line(),
            Expr::Grouping(inner) => inner.line(),
            Expr::Literal(_) => None,
            Expr::Super { keyword, .. } | Expr::This { keyword, .. } => Some(keyword.line),
            Expr::Unary { operator, .. } => Some(operator.line),
        }
    }
}

/// A named function: top-level `fun`, nested function, or class method.
///
/// Shared behind an `Rc` so runtime function values can keep their
/// declaration alive after the statement list that produced it is dropped.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// Every kind of statement. A program is a sequence of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>),

    Class {
        name: Token,
        /// Always an `Expr::Variable` when present.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },

    Expression(Expr),

    Function(Rc<FunctionDecl>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    Print(Expr),

    Return {
        /// The `return` keyword, for error locations.
        keyword: Token,
        value: Option<Expr>,
    },

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    While { condition: Expr, body: Box<Stmt> },
}
