//! Tree-walking evaluator.
//!
//! Statements execute against the current scope handle, which is swapped on
//! entry to a block or call and restored on every way out: normal
//! completion, a runtime error, or a `return` travelling up to its call.
//! `return` is not an error; it travels as [`Flow::Return`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};
use crate::environment::{EnvId, Environments};
use crate::error::RuntimeError;
use crate::resolver::Locals;
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::value::Value;
use crate::INITIALIZER_NAME;

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    /// A `return` unwinding towards the nearest call boundary.
    Return(Value),
}

/// Tunables for one interpreter instance.
#[derive(Debug, Clone, Copy)]
pub struct InterpreterConfig {
    /// Nesting limit for calls to user functions and classes. Exceeding it
    /// raises `Stack overflow.` instead of exhausting the host stack.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 255,
        }
    }
}

pub struct Interpreter<W: Write = io::Stdout> {
    envs: Environments,
    globals: EnvId,
    environment: EnvId,
    locals: HashMap<ExprId, usize>,
    out: W,
    config: InterpreterConfig,
    depth: usize,
}

impl Interpreter<io::Stdout> {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        Self::with_config(out, InterpreterConfig::default())
    }

    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn with_config(out: W, config: InterpreterConfig) -> Self {
        info!("Initializing Interpreter with {:?}", config);

        let mut envs = Environments::new();
        let globals = envs.globals();

        debug!("Defining native function 'clock'");

        envs.define(
            globals,
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value]| {
                    let millis = Utc::now().timestamp_millis();
                    Ok(Value::Number(millis as f64 / 1000.0))
                },
            }))),
        );

        Self {
            envs,
            globals,
            environment: globals,
            locals: HashMap::new(),
            out,
            config,
            depth: 0,
        }
    }

    /// Record binding distances computed by the resolver.
    pub fn add_locals(&mut self, locals: Locals) {
        debug!("Adding {} resolved reference(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Names currently bound in the global scope.
    pub fn global_names(&self) -> Vec<String> {
        self.envs.names(self.globals)
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub(crate) fn environments_mut(&mut self) -> &mut Environments {
        &mut self.envs
    }

    /// Interprets a list of statements (a "program"). Stops at the first
    /// runtime error; state stays usable for later programs.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        info!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                // Next REPL line starts at top level.
                self.environment = self.globals;
                self.depth = 0;

                debug!("Runtime error: {}", e);

                return Err(e);
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);

                writeln!(self.out, "{}", value).map_err(|e| print_failed(expr, e))?;

                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.envs.define(self.environment, &name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env = self.envs.push(self.environment);
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let flow @ Flow::Return(_) = self.execute(body)? {
                        return Ok(flow);
                    }
                }

                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    declaration.clone(),
                    self.environment,
                    false,
                    &mut self.envs,
                );

                self.envs.define(
                    self.environment,
                    &declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);

                Ok(Flow::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass: Option<Rc<LoxClass>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Callable(Callable::Class(class)) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(RuntimeError::new(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                self.envs.define(self.environment, &name.lexeme, Value::Nil);

                let method_env = match &superclass {
                    Some(class) => {
                        let env = self.envs.push(self.environment);
                        self.envs.define(
                            env,
                            "super",
                            Value::Callable(Callable::Class(class.clone())),
                        );
                        env
                    }
                    None => self.environment,
                };

                let table: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|method| {
                        let function = LoxFunction::new(
                            method.clone(),
                            method_env,
                            method.name.lexeme == INITIALIZER_NAME,
                            &mut self.envs,
                        );
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                if method_env != self.environment {
                    self.envs.release(method_env);
                }

                let class = LoxClass::new(name.lexeme.clone(), superclass, table);

                info!("Class '{}' defined", name.lexeme);

                self.envs.define(
                    self.environment,
                    &name.lexeme,
                    Value::Callable(Callable::Class(Rc::new(class))),
                );

                Ok(Flow::Normal)
            }
        }
    }

    /// Run `statements` with `env` as the current scope, then restore the
    /// previous scope and release `env`, whatever the outcome.
    pub(crate) fn execute_block(&mut self, statements: &[Stmt], env: EnvId) -> IResult<Flow> {
        let previous = self.environment;
        self.environment = env;

        let mut result = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        self.envs.release(env);

        result
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        if !self.envs.assign_at(
                            self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        ) {
                            return Err(undefined_variable(name));
                        }
                    }
                    None => self.envs.assign(self.globals, name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(RuntimeError::new(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;

                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                let short_circuit = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name, &mut self.envs),
                _ => Err(RuntimeError::new(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => {
                let (found, object) = self.super_method(*id, keyword, method)?;
                let bound = found.bind(object, &mut self.envs);

                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
        }
    }

    /// The superclass method `super.method` names, plus the `this` it binds to.
    fn super_method(
        &self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> IResult<(Rc<LoxFunction>, Rc<RefCell<LoxInstance>>)> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(undefined_variable(keyword));
        };

        let superclass = self.envs.get_at(self.environment, distance, "super");
        let object = self
            .envs
            .get_at(self.environment, distance.saturating_sub(1), "this");

        let (
            Some(Value::Callable(Callable::Class(superclass))),
            Some(Value::Instance(object)),
        ) = (superclass, object)
        else {
            return Err(undefined_variable(keyword));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok((found, object)),
            None => Err(RuntimeError::new(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn look_up_variable(&mut self, id: ExprId, name: &Token) -> IResult<Value> {
        match self.locals.get(&id) {
            Some(&distance) => self
                .envs
                .get_at(self.environment, distance, &name.lexeme)
                .ok_or_else(|| undefined_variable(name)),
            None => self.envs.get(self.globals, name),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> IResult<Value> {
        // `object.method(args)` and `super.method(args)` call the method
        // directly instead of first materializing a bound function value.
        match callee {
            Expr::Get { object, name } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name, "Only instances have properties."));
                };

                let has_field = instance.borrow().fields_contain(&name.lexeme);
                let method = instance.borrow().class().find_method(&name.lexeme);

                if let (false, Some(method)) = (has_field, method) {
                    return self.invoke_method(&method, instance, paren, arguments);
                }

                let callee = LoxInstance::get(&instance, name, &mut self.envs)?;
                self.call_value(callee, paren, arguments)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => {
                let (found, object) = self.super_method(*id, keyword, method)?;
                self.invoke_method(&found, object, paren, arguments)
            }

            _ => {
                let callee = self.evaluate(callee)?;
                self.call_value(callee, paren, arguments)
            }
        }
    }

    fn invoke_method(
        &mut self,
        method: &LoxFunction,
        instance: Rc<RefCell<LoxInstance>>,
        paren: &Token,
        arguments: &[Expr],
    ) -> IResult<Value> {
        let args = self.evaluate_arguments(arguments)?;
        check_arity(method.arity(), args.len(), paren)?;

        self.enter_call(paren)?;
        let result = method.call_method(instance, self, args);
        self.depth -= 1;

        result
    }

    fn call_value(&mut self, callee: Value, paren: &Token, arguments: &[Expr]) -> IResult<Value> {
        let args = self.evaluate_arguments(arguments)?;

        let Value::Callable(callable) = callee else {
            return Err(RuntimeError::new(
                paren,
                "Can only call functions and classes.",
            ));
        };

        check_arity(callable.arity(), args.len(), paren)?;

        self.enter_call(paren)?;
        let result = callable.call(self, paren, args);
        self.depth -= 1;

        result
    }

    fn evaluate_arguments(&mut self, arguments: &[Expr]) -> IResult<Vec<Value>> {
        arguments.iter().map(|arg| self.evaluate(arg)).collect()
    }

    fn enter_call(&mut self, paren: &Token) -> IResult<()> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::new(paren, "Stack overflow."));
        }

        self.depth += 1;

        Ok(())
    }
}

fn check_arity(arity: usize, got: usize, paren: &Token) -> IResult<()> {
    if arity != got {
        return Err(RuntimeError::new(
            paren,
            format!("Expected {} arguments but got {}.", arity, got),
        ));
    }

    Ok(())
}

fn binary(op: &Token, left: Value, right: Value) -> IResult<Value> {
    use Value::{Bool, Number};

    match (&op.token_type, left, right) {
        (TokenType::EQUAL_EQUAL, l, r) => Ok(Bool(l == r)),
        (TokenType::BANG_EQUAL, l, r) => Ok(Bool(l != r)),

        (TokenType::PLUS, Number(a), Number(b)) => Ok(Number(a + b)),
        (TokenType::PLUS, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (TokenType::PLUS, _, _) => Err(RuntimeError::new(
            op,
            "Operands must be two numbers or two strings.",
        )),

        (TokenType::MINUS, Number(a), Number(b)) => Ok(Number(a - b)),
        (TokenType::STAR, Number(a), Number(b)) => Ok(Number(a * b)),
        // IEEE semantics: dividing by zero yields an infinity or NaN.
        (TokenType::SLASH, Number(a), Number(b)) => Ok(Number(a / b)),
        (TokenType::GREATER, Number(a), Number(b)) => Ok(Bool(a > b)),
        (TokenType::GREATER_EQUAL, Number(a), Number(b)) => Ok(Bool(a >= b)),
        (TokenType::LESS, Number(a), Number(b)) => Ok(Bool(a < b)),
        (TokenType::LESS_EQUAL, Number(a), Number(b)) => Ok(Bool(a <= b)),

        (
            TokenType::MINUS
            | TokenType::STAR
            | TokenType::SLASH
            | TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL,
            _,
            _,
        ) => Err(RuntimeError::new(op, "Operands must be numbers.")),

        _ => Err(RuntimeError::new(op, "Invalid binary operator.")),
    }
}

fn undefined_variable(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

fn print_failed(expr: &Expr, e: io::Error) -> RuntimeError {
    RuntimeError {
        message: format!("Failed to write output: {}", e),
        line: expr.line().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamReporter;
    use crate::session::{Session, Status};

    fn scope_count_after(source: &str) -> usize {
        let interpreter = Interpreter::with_output(Vec::<u8>::new());
        let mut session = Session::new(interpreter, StreamReporter::new(Vec::<u8>::new()));

        assert_eq!(session.run(source), Status::Ok);

        session.interpreter().envs.len()
    }

    fn looped(body: &str, iterations: usize) -> String {
        format!(
            "class A {{ m() {{ return 1; }} }}\n\
             class B < A {{ m() {{ return super.m(); }} plain() {{ return 2; }} }}\n\
             var b = B();\n\
             var i = 0;\n\
             while (i < {}) {{ {} i = i + 1; }}",
            iterations, body
        )
    }

    #[test]
    fn super_calls_in_a_loop_release_their_scopes() {
        let few = scope_count_after(&looped("b.m();", 10));
        let many = scope_count_after(&looped("b.m();", 1000));

        assert_eq!(few, many);
    }

    #[test]
    fn method_calls_in_a_loop_release_their_scopes() {
        let few = scope_count_after(&looped("b.plain();", 10));
        let many = scope_count_after(&looped("b.plain();", 1000));

        assert_eq!(few, many);
    }

    #[test]
    fn super_call_fast_path_returns_the_superclass_result() {
        let interpreter = Interpreter::with_output(Vec::<u8>::new());
        let mut session = Session::new(interpreter, StreamReporter::new(Vec::<u8>::new()));

        let source = format!("{}\nprint b.m() + b.plain();", looped("b.m();", 3));
        assert_eq!(session.run(&source), Status::Ok);

        let (interpreter, _) = session.into_parts();
        assert_eq!(String::from_utf8(interpreter.into_output()).unwrap(), "3\n");
    }
}
