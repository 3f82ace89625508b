use crate::bridge::error::{BridgeError, BridgeResult};
use crate::runtime::{
    environment::Namespace,
    value::{ListRef, Value},
};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// One list under construction.
#[derive(Debug)]
pub struct ContainerFrame {
    handle: ListRef,
    depth: usize,
}

impl ContainerFrame {
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.handle.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds nested lists from a stream of open/append/close instructions.
/// Values go into the innermost open list, or into the namespace when no
/// list is open.
#[derive(Debug)]
pub struct BuilderStack {
    frames: Vec<ContainerFrame>,
    max_levels: usize,
}

impl BuilderStack {
    pub fn new(max_levels: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_levels,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&ContainerFrame> {
        self.frames.last()
    }

    /// Starts a new list, nested into the current one or bound as `name`.
    pub fn open(&mut self, name: &str, namespace: &Namespace) -> BridgeResult<()> {
        if self.frames.len() >= self.max_levels {
            return Err(BridgeError::CapacityExceeded {
                max: self.max_levels,
            });
        }
        let handle: ListRef = Rc::new(RefCell::new(Vec::new()));
        self.append_or_bind(name, Value::List(handle.clone()), namespace);
        let depth = self.frames.len() + 1;
        self.frames.push(ContainerFrame { handle, depth });
        debug!(binding = name, depth, "opened list");
        Ok(())
    }

    pub fn append_or_bind(&mut self, name: &str, value: Value, namespace: &Namespace) {
        match self.frames.last() {
            Some(frame) => {
                trace!(depth = frame.depth, kind = value.type_name(), "append");
                frame.handle.borrow_mut().push(value);
            }
            None => {
                trace!(binding = name, kind = value.type_name(), "bind");
                namespace.set(name, value);
            }
        }
    }

    /// Finishes the innermost list. Returns `false` when no list was open.
    pub fn close(&mut self) -> bool {
        match self.frames.pop() {
            Some(frame) => {
                debug!(depth = frame.depth, items = frame.len(), "closed list");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_lists_are_built_in_order() {
        let namespace = Namespace::new();
        let mut stack = BuilderStack::new(8);
        stack.open("l", &namespace).unwrap();
        stack.append_or_bind("ignored", Value::int(1), &namespace);
        stack.open("ignored", &namespace).unwrap();
        assert_eq!(stack.top().map(ContainerFrame::depth), Some(2));
        stack.append_or_bind("ignored", Value::int(2), &namespace);
        assert!(stack.close());
        stack.append_or_bind("ignored", Value::int(3), &namespace);
        assert!(stack.close());
        assert!(!stack.close());
        assert_eq!(namespace.get("l").unwrap().repr(), "[1, [2], 3]");
        assert!(!namespace.contains("ignored"));
    }

    #[test]
    fn closed_list_is_owned_by_its_parent_only() {
        let namespace = Namespace::new();
        let mut stack = BuilderStack::new(8);
        stack.open("l", &namespace).unwrap();
        stack.close();
        match namespace.get("l") {
            Some(Value::List(handle)) => assert_eq!(Rc::strong_count(&handle), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn open_beyond_capacity_changes_nothing() {
        let namespace = Namespace::new();
        let mut stack = BuilderStack::new(2);
        stack.open("l", &namespace).unwrap();
        stack.open("l", &namespace).unwrap();
        let err = stack.open("l", &namespace).unwrap_err();
        assert_eq!(err, BridgeError::CapacityExceeded { max: 2 });
        assert_eq!(stack.depth(), 2);
        assert!(stack.top().is_some_and(ContainerFrame::is_empty));
        assert_eq!(namespace.get("l").unwrap().repr(), "[[]]");
    }
}
