//! The callable side of the value model: native functions, user functions
//! and classes, plus the instances classes produce.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvId, Environments};
use crate::error::RuntimeError;
use crate::interpreter::{Flow, IResult, Interpreter};
use crate::token::Token;
use crate::value::Value;
use crate::INITIALIZER_NAME;

/// Anything that can appear on the left of `( … )`.
#[derive(Debug, Clone)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
        }
    }

    /// Invoke with arguments already checked against [`Self::arity`].
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        match self {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(&arguments).map_err(|message| RuntimeError::new(paren, message))
            }

            Callable::Function(function) => function.call(interpreter, arguments),

            Callable::Class(class) => LoxClass::instantiate(class, interpreter, arguments),
        }
    }

    /// Identity comparison.
    pub fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::Function(function) => write!(f, "<fn {}>", function.name()),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

/// A function implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A user-defined function or method together with the scope it closes over.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvId,
    is_initializer: bool,
}

impl LoxFunction {
    /// Create a function closing over `closure`, which is pinned in the arena
    /// from now on.
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: EnvId,
        is_initializer: bool,
        envs: &mut Environments,
    ) -> Self {
        envs.capture(closure);

        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>, envs: &mut Environments) -> LoxFunction {
        let env = envs.push(self.closure);
        envs.define(env, "this", Value::Instance(instance));

        LoxFunction::new(self.declaration.clone(), env, self.is_initializer, envs)
    }

    /// Call as a method of `instance` without materializing a bound function
    /// value. The `this` scope is released afterwards unless the body
    /// captured something beneath it.
    pub fn call_method<W: Write>(
        &self,
        instance: Rc<RefCell<LoxInstance>>,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        let this_env = interpreter.environments_mut().push(self.closure);
        interpreter
            .environments_mut()
            .define(this_env, "this", Value::Instance(instance));

        let transient = LoxFunction {
            declaration: self.declaration.clone(),
            closure: this_env,
            is_initializer: self.is_initializer,
        };

        let result = transient.call(interpreter, arguments);
        interpreter.environments_mut().release(this_env);

        result
    }

    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        let env = interpreter.environments_mut().push(self.closure);

        for (param, arg) in self.declaration.params.iter().zip(arguments) {
            interpreter
                .environments_mut()
                .define(env, &param.lexeme, arg);
        }

        let flow = interpreter.execute_block(&self.declaration.body, env)?;

        if self.is_initializer {
            return interpreter
                .environments_mut()
                .get_at(self.closure, 0, "this")
                .ok_or_else(|| {
                    RuntimeError::new(&self.declaration.name, "Undefined variable 'this'.")
                });
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

/// A class: a name, an optional superclass and a fixed method table.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Look in this class, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        match self.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self
                .superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name)),
        }
    }

    /// Arity of the initializer, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER_NAME)
            .map_or(0, |init| init.arity())
    }

    fn instantiate<W: Write>(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
    ) -> IResult<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        if let Some(initializer) = class.find_method(INITIALIZER_NAME) {
            initializer.call_method(instance.clone(), interpreter, arguments)?;
        }

        info!("Instantiated '{}'", class.name);

        Ok(Value::Instance(instance))
    }
}

/// An object created by calling a class.
#[derive(Debug)]
pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// A field if present, otherwise a method bound to `instance`.
    pub fn get(
        instance: &Rc<RefCell<LoxInstance>>,
        name: &Token,
        envs: &mut Environments,
    ) -> IResult<Value> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = instance.borrow().class.find_method(&name.lexeme);

        match method {
            Some(method) => {
                let bound = method.bind(instance.clone(), envs);
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(RuntimeError::new(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn fields_contain(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields need no declaration; setting one always succeeds.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn declaration(source: &str) -> Rc<FunctionDecl> {
        let (tokens, _) = Scanner::new(source).scan_tokens();
        match Parser::new(tokens).parse().unwrap().remove(0) {
            Stmt::Function(declaration) => declaration,
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn initializer_without_this_binding_is_an_error() {
        let mut interpreter = Interpreter::with_output(Vec::<u8>::new());
        let globals = interpreter.environments_mut().globals();

        let init = LoxFunction::new(
            declaration("fun init() {}"),
            globals,
            true,
            interpreter.environments_mut(),
        );

        let err = init.call(&mut interpreter, Vec::new()).unwrap_err();

        assert_eq!(err.message, "Undefined variable 'this'.");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn plain_function_returns_nil_without_return() {
        let mut interpreter = Interpreter::with_output(Vec::<u8>::new());
        let globals = interpreter.environments_mut().globals();

        let f = LoxFunction::new(
            declaration("fun f(a) { a; }"),
            globals,
            false,
            interpreter.environments_mut(),
        );

        assert_eq!(f.arity(), 1);
        assert_eq!(f.call(&mut interpreter, vec![Value::Number(1.0)]), Ok(Value::Nil));
    }
}
