//! Lexical scopes, stored in an arena and addressed by [`EnvId`] handles.
//!
//! A closure refers to its defining scope by handle, so a function stored in
//! the very scope it closes over forms no ownership cycle. Scopes are created
//! and released in stack order; a scope that some function value captured
//! is never released and lives for the rest of the run.

use std::collections::HashMap;

use log::debug;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// Handle to one scope in an [`Environments`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(usize);

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<EnvId>,
    captured: bool,
}

/// Arena owning every live scope. Index 0 is the global scope.
#[derive(Debug)]
pub struct Environments {
    scopes: Vec<Scope>,
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

impl Environments {
    pub fn new() -> Self {
        Environments {
            scopes: vec![Scope {
                captured: true,
                ..Scope::default()
            }],
        }
    }

    /// The root scope; it has no enclosing parent and is never released.
    pub fn globals(&self) -> EnvId {
        EnvId(0)
    }

    /// Number of scopes currently held.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Create a child scope of `enclosing`.
    pub fn push(&mut self, enclosing: EnvId) -> EnvId {
        self.scopes.push(Scope {
            values: HashMap::new(),
            enclosing: Some(enclosing),
            captured: false,
        });

        EnvId(self.scopes.len() - 1)
    }

    /// Keep `id` alive for the rest of the run.
    pub fn capture(&mut self, id: EnvId) {
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.captured = true;
        }
    }

    /// Drop `id` if it is the newest scope and nothing captured it. Any
    /// child of `id` would sit above it in the arena, so a newest scope has
    /// no live children.
    pub fn release(&mut self, id: EnvId) {
        if id.0 + 1 == self.scopes.len() && !self.scopes[id.0].captured {
            self.scopes.pop();
        } else {
            debug!("Scope {} retained", id.0);
        }
    }

    /// Bind `name` in `id`, replacing any binding of the same name there.
    pub fn define(&mut self, id: EnvId, name: &str, value: Value) {
        if let Some(scope) = self.scopes.get_mut(id.0) {
            scope.values.insert(name.to_string(), value);
        }
    }

    /// Look `name` up in `id`, then along the enclosing chain.
    pub fn get(&self, id: EnvId, name: &Token) -> Result<Value, RuntimeError> {
        let mut cursor = Some(id);

        while let Some(env) = cursor {
            let scope = &self.scopes[env.0];

            if let Some(value) = scope.values.get(&name.lexeme) {
                return Ok(value.clone());
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name))
    }

    /// Overwrite an existing binding found along the chain. Never creates one.
    pub fn assign(&mut self, id: EnvId, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut cursor = Some(id);

        while let Some(env) = cursor {
            let scope = &mut self.scopes[env.0];

            if let Some(slot) = scope.values.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }

            cursor = scope.enclosing;
        }

        Err(undefined(name))
    }

    /// The scope exactly `distance` enclosing links above `id`.
    pub fn ancestor(&self, id: EnvId, distance: usize) -> Option<EnvId> {
        let mut env = id;

        for _ in 0..distance {
            env = self.scopes.get(env.0)?.enclosing?;
        }

        Some(env)
    }

    /// Direct lookup in the scope `distance` links above `id`.
    pub fn get_at(&self, id: EnvId, distance: usize, name: &str) -> Option<Value> {
        let env = self.ancestor(id, distance)?;

        self.scopes[env.0].values.get(name).cloned()
    }

    /// Direct overwrite in the scope `distance` links above `id`. Returns
    /// `false` if that scope has no such binding.
    pub fn assign_at(&mut self, id: EnvId, distance: usize, name: &str, value: Value) -> bool {
        let Some(env) = self.ancestor(id, distance) else {
            return false;
        };

        match self.scopes[env.0].values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Names bound in the given scope.
    pub fn names(&self, id: EnvId) -> Vec<String> {
        self.scopes
            .get(id.0)
            .map(|scope| scope.values.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}
