//! Runtime scope chain.
//!
//! Every block, call and subclass body gets one `Environment` whose
//! `enclosing` link is fixed at creation.  Links are strong `Rc`s: a closure
//! keeps the scope it was defined in (and everything outward of it) alive for
//! as long as the closure itself is reachable.
//!
//! A slot can exist before it holds a value: a class name is declared first
//! so its methods can capture it, and reading it before the class is built is
//! a runtime error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{Result, SparkleError};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to an environment.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    /// `None` marks a declared slot that has not been initialized yet.
    values: HashMap<String, Option<Value>>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// The global scope: no enclosing link.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap `self` into a shareable handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Insert or overwrite a binding in this scope.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Some(value));
    }

    /// Reserve `name` in this scope without giving it a value.
    pub fn declare(&mut self, name: &str) {
        self.values.insert(name.to_string(), None);
    }

    /// Binding in this scope only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned().flatten()
    }

    /// Bindings of this scope only; uninitialized slots come back as `None`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&Value>)> + '_ {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Walk outward until a scope holds `name`.  Only used for globals.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(slot) = self.values.get(&name.lexeme) {
            initialized(slot, name)
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Walk outward until a scope holds `name` and overwrite it there.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = Some(value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The environment exactly `distance` enclosing links away from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Result<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for hop in 0..distance {
            let next: Option<EnvRef> = current.borrow().enclosing.clone();

            current = next.ok_or_else(|| {
                SparkleError::runtime(
                    0,
                    format!("Scope chain ended after {} of {} hops.", hop, distance),
                )
            })?;
        }

        Ok(current)
    }

    /// Read `name` from the environment `distance` hops out, without walking
    /// any further.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
        let target: EnvRef = Self::ancestor(env, distance)?;
        let slot: Option<Option<Value>> = target.borrow().values.get(&name.lexeme).cloned();

        debug!("get_at({}, '{}') -> {:?}", distance, name.lexeme, slot.is_some());

        match slot {
            Some(slot) => initialized(&slot, name),
            None => Err(undefined(name)),
        }
    }

    /// Overwrite `name` in the environment `distance` hops out.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        let target: EnvRef = Self::ancestor(env, distance)?;

        target.borrow_mut().define(&name.lexeme, value);

        Ok(())
    }
}

fn initialized(slot: &Option<Value>, name: &Token) -> Result<Value> {
    slot.clone().ok_or_else(|| {
        SparkleError::runtime(
            name.line,
            format!("Cannot access uninitialized variable '{}'.", name.lexeme),
        )
    })
}

fn undefined(name: &Token) -> SparkleError {
    SparkleError::runtime(
        name.line,
        format!("Undefined variable '{}'.", name.lexeme),
    )
}

#[cfg(test)]
mod environment_tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_walks_the_chain_outward() {
        let globals: EnvRef = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&globals)).into_ref();

        let value = inner.borrow().get(&ident("a")).unwrap();
        assert_eq!(value, Value::Number(1.0));
    }

    #[test]
    fn get_at_skips_shadowing_bindings() {
        let outer: EnvRef = Environment::new().into_ref();
        outer.borrow_mut().define("a", Value::Number(1.0));

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("a", Value::Number(2.0));

        assert_eq!(
            Environment::get_at(&inner, 0, &ident("a")).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 1, &ident("a")).unwrap(),
            Value::Number(1.0)
        );
    }

    #[test]
    fn assign_at_writes_to_the_exact_scope() {
        let outer: EnvRef = Environment::new().into_ref();
        outer.borrow_mut().define("a", Value::Number(1.0));

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner.borrow_mut().define("a", Value::Number(2.0));

        Environment::assign_at(&inner, 1, &ident("a"), Value::Number(10.0)).unwrap();

        assert_eq!(outer.borrow().get(&ident("a")).unwrap(), Value::Number(10.0));
        assert_eq!(inner.borrow().get(&ident("a")).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn undefined_global_is_an_error() {
        let globals: EnvRef = Environment::new().into_ref();

        let err = globals.borrow().get(&ident("missing")).unwrap_err();
        assert_eq!(err.message(), "Undefined variable 'missing'.");

        let err = globals
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn declared_slot_is_unreadable_until_assigned() {
        let outer: EnvRef = Environment::new().into_ref();
        outer.borrow_mut().declare("C");

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&outer)).into_ref();

        let err = Environment::get_at(&inner, 1, &ident("C")).unwrap_err();
        assert_eq!(err.message(), "Cannot access uninitialized variable 'C'.");
        assert!(inner.borrow().get(&ident("C")).is_err());
        assert_eq!(outer.borrow().get_local("C"), None);

        outer.borrow_mut().assign(&ident("C"), Value::Bool(true)).unwrap();
        assert_eq!(inner.borrow().get(&ident("C")).unwrap(), Value::Bool(true));
    }

    #[test]
    fn ancestor_past_the_globals_is_an_error() {
        let globals: EnvRef = Environment::new().into_ref();

        assert!(Environment::ancestor(&globals, 1).is_err());
    }
}
