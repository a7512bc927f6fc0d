use std::cell::RefCell;
use std::rc::Rc;

use crate::interner::RStr;
use crate::table::Table;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Environment
//
// A scope is a table of bindings plus a strong handle on the enclosing
// scope. Lexically nested scopes form a singly-linked chain rooted at the
// global environment; closures extend a scope's lifetime by holding a
// handle past its block's exit.
//===----------------------------------------------------------------------===//

pub type EnvRef = Rc<Env>;

#[derive(Debug)]
pub struct Env {
    vars: RefCell<Table>,
    enclosing: Option<EnvRef>,
}

/// Outcome of an assignment through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Assigned,
    Undefined,
    ReadOnly,
}

impl Env {
    pub fn new() -> EnvRef {
        Rc::new(Env { vars: RefCell::new(Table::new()), enclosing: None })
    }

    pub fn with_enclosing(enclosing: EnvRef) -> EnvRef {
        Rc::new(Env {
            vars: RefCell::new(Table::new()),
            enclosing: Some(enclosing),
        })
    }

    /// Introduces a binding in this scope. Fails when the name already
    /// exists here; shadowing an outer scope is allowed.
    pub fn define(&self, name: &RStr, value: Value, is_const: bool) -> bool {
        let mut vars = self.vars.borrow_mut();
        if vars.has(name) {
            return false;
        }
        vars.set(name.clone(), value, is_const);
        true
    }

    /// Introduces or overwrites a binding in this scope. Used by imports,
    /// which shadow earlier same-named registrations.
    pub fn define_or_replace(&self, name: &RStr, value: Value, is_const: bool) {
        self.vars.borrow_mut().set(name.clone(), value, is_const);
    }

    /// Innermost binding for `name`, walking the chain outward.
    pub fn get(&self, name: &RStr) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value);
        }
        match &self.enclosing {
            Some(parent) => parent.get(name),
            None => None,
        }
    }

    /// Lookup confined to this scope.
    pub fn get_local(&self, name: &RStr) -> Option<Value> {
        self.vars.borrow().get(name)
    }

    /// Assigns at the innermost binding. Fails when the name is not bound
    /// anywhere, or when the binding is const.
    pub fn set(&self, name: &RStr, value: Value) -> SetOutcome {
        let flag = self.vars.borrow().get_const_flag(name);
        match flag {
            Some(true) => SetOutcome::ReadOnly,
            Some(false) => {
                self.vars.borrow_mut().set(name.clone(), value, false);
                SetOutcome::Assigned
            }
            None => match &self.enclosing {
                Some(parent) => parent.set(name, value),
                None => SetOutcome::Undefined,
            },
        }
    }

    /// Whether the innermost binding for `name` is const.
    pub fn is_const(&self, name: &RStr) -> bool {
        match self.vars.borrow().get_const_flag(name) {
            Some(flag) => flag,
            None => match &self.enclosing {
                Some(parent) => parent.is_const(name),
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::intern;

    #[test]
    fn define_then_get() {
        let env = Env::new();
        let name = intern("x");
        assert!(env.define(&name, Value::Int(1), false));
        match env.get(&name) {
            Some(Value::Int(1)) => {}
            other => panic!("expected Int(1), got {:?}", other),
        }
    }

    #[test]
    fn redefining_in_same_scope_fails() {
        let env = Env::new();
        let name = intern("x");
        assert!(env.define(&name, Value::Int(1), false));
        assert!(!env.define(&name, Value::Int(2), false));
    }

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let outer = Env::new();
        let name = intern("x");
        outer.define(&name, Value::Int(1), false);

        let inner = Env::with_enclosing(outer.clone());
        assert!(inner.define(&name, Value::Int(2), false));
        match inner.get(&name) {
            Some(Value::Int(2)) => {}
            other => panic!("expected shadowed Int(2), got {:?}", other),
        }
        match outer.get(&name) {
            Some(Value::Int(1)) => {}
            other => panic!("outer binding changed: {:?}", other),
        }
    }

    #[test]
    fn get_walks_the_chain() {
        let outer = Env::new();
        let name = intern("y");
        outer.define(&name, Value::Int(10), false);
        let inner = Env::with_enclosing(outer);
        match inner.get(&name) {
            Some(Value::Int(10)) => {}
            other => panic!("expected Int(10), got {:?}", other),
        }
        assert!(inner.get_local(&name).is_none());
    }

    #[test]
    fn set_assigns_at_innermost_binding() {
        let outer = Env::new();
        let name = intern("z");
        outer.define(&name, Value::Int(1), false);
        let inner = Env::with_enclosing(outer.clone());

        assert_eq!(inner.set(&name, Value::Int(5)), SetOutcome::Assigned);
        match outer.get(&name) {
            Some(Value::Int(5)) => {}
            other => panic!("expected Int(5), got {:?}", other),
        }
    }

    #[test]
    fn set_of_unknown_name_fails() {
        let env = Env::new();
        assert_eq!(env.set(&intern("ghost"), Value::Nil), SetOutcome::Undefined);
    }

    #[test]
    fn const_binding_rejects_assignment() {
        let env = Env::new();
        let name = intern("PI");
        env.define(&name, Value::Float(3.14), true);
        assert_eq!(env.set(&name, Value::Int(3)), SetOutcome::ReadOnly);
        assert!(env.is_const(&name));
    }

    #[test]
    fn const_in_outer_scope_rejects_assignment_from_inner() {
        let outer = Env::new();
        let name = intern("K");
        outer.define(&name, Value::Int(1), true);
        let inner = Env::with_enclosing(outer);
        assert_eq!(inner.set(&name, Value::Int(2)), SetOutcome::ReadOnly);
    }
}
