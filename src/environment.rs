use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("Error: Variable {0} not defined.")]
    UndefinedName(String),
    #[error("Error: Redefining {0} is not allowed.")]
    NameConflict(String),
}

// --- Environment Definition ---

/// One frame of bindings plus a link to the enclosing frame.
///
/// Frames live behind `Rc<RefCell<...>>`: closures keep their defining frame
/// alive after the call that created it returns, and `define` mutates the
/// very frame a closure has already captured.
#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Binds `name` in the *current* frame. Shadowing a name from an outer
    /// frame is fine; binding a name twice in the same frame is not.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> Result<(), EnvError> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(EnvError::NameConflict(name));
        }
        trace!(name = %name, kind = %value.kind(), "bind");
        self.bindings.insert(name, value);
        Ok(())
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn lookup(&self, name: &str) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow().lookup(name),
            None => Err(EnvError::UndefinedName(name.to_string())),
        }
    }

    /// Gets every identifier visible from this frame
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}
