use crate::runtime::{builtins::Builtin, error::RuntimeError, value::Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A shared name table. The session's main namespace is one of these and
/// serves as both globals and locals for top-level code.
#[derive(Clone, Debug, Default)]
pub struct Namespace(Rc<RefCell<HashMap<String, Value>>>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    /// Binds `name`, returning the value it replaces.
    pub fn set(&self, name: &str, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(name.to_string(), value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.0.borrow_mut().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Name resolution for one executing frame: locals, then globals, then the
/// builtin table.
#[derive(Clone, Debug)]
pub struct Environment {
    pub globals: Namespace,
    pub locals: Namespace,
}

impl Environment {
    pub fn new(globals: Namespace, locals: Namespace) -> Self {
        Self { globals, locals }
    }

    pub fn module(namespace: Namespace) -> Self {
        Self {
            globals: namespace.clone(),
            locals: namespace,
        }
    }

    pub fn is_module_level(&self) -> bool {
        self.globals.ptr_eq(&self.locals)
    }

    pub fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value);
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value);
        }
        Builtin::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| RuntimeError::NameError {
                name: name.to_string(),
            })
    }

    pub fn assign(&self, name: &str, value: Value) {
        self.locals.set(name, value);
    }

    pub fn delete(&self, name: &str) -> Result<(), RuntimeError> {
        self.locals
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::NameError {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_globals_then_builtins() {
        let globals = Namespace::new();
        globals.set("g", Value::int(1));
        let env = Environment::new(globals, Namespace::new());
        env.assign("x", Value::int(2));
        assert!(env.lookup("g").unwrap().py_eq(&Value::int(1)));
        assert!(env.lookup("x").unwrap().py_eq(&Value::int(2)));
        assert!(matches!(env.lookup("len"), Ok(Value::Builtin(_))));
        assert_eq!(
            env.lookup("missing").unwrap_err(),
            RuntimeError::NameError {
                name: "missing".into()
            }
        );
    }

    #[test]
    fn module_environment_shares_one_namespace() {
        let namespace = Namespace::new();
        let env = Environment::module(namespace.clone());
        env.assign("a", Value::None);
        assert!(env.is_module_level());
        assert!(namespace.contains("a"));
    }
}
