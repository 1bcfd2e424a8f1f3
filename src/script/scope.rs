//! Lexical environments.
//!
//! Every block gets a [`Scope`]; function scopes additionally carry a
//! [`Frame`] with the `this` binding. Arrow functions create a function
//! scope without a frame, so `this` resolves lexically.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::{ObjRef, Value};

pub type ScopeRef = Rc<RefCell<Scope>>;
pub type FrameRef = Rc<RefCell<Frame>>;

pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

pub struct Frame {
    /// `None` inside a derived constructor until `super()` returns.
    pub this: Option<Value>,
    pub home: Option<ObjRef>,
    pub new_target: Option<ObjRef>,
    pub callee: Option<ObjRef>,
}

impl Frame {
    pub fn new(this: Value) -> FrameRef {
        Rc::new(RefCell::new(Frame {
            this: Some(this),
            home: None,
            new_target: None,
            callee: None,
        }))
    }
}

#[derive(Default)]
pub struct Scope {
    vars: HashMap<Rc<str>, Binding>,
    parent: Option<ScopeRef>,
    frame: Option<FrameRef>,
    /// `var` declarations land in the nearest function scope.
    is_function: bool,
}

pub enum AssignOutcome {
    Assigned,
    Constant,
    Missing,
}

pub fn root() -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        frame: Some(Frame::new(Value::Undefined)),
        is_function: true,
        ..Scope::default()
    }))
}

pub fn child(parent: &ScopeRef) -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        parent: Some(parent.clone()),
        ..Scope::default()
    }))
}

pub fn function(parent: &ScopeRef, frame: Option<FrameRef>) -> ScopeRef {
    Rc::new(RefCell::new(Scope {
        parent: Some(parent.clone()),
        frame,
        is_function: true,
        ..Scope::default()
    }))
}

pub fn declare(scope: &ScopeRef, name: &Rc<str>, value: Value, mutable: bool) {
    scope
        .borrow_mut()
        .vars
        .insert(name.clone(), Binding { value, mutable });
}

/// Declares a `var` in the nearest function scope. A bare `var x;` keeps an
/// existing value.
pub fn declare_var(scope: &ScopeRef, name: &Rc<str>, value: Option<Value>) {
    let mut current = scope.clone();
    loop {
        let next = {
            let s = current.borrow();
            if s.is_function {
                None
            } else {
                s.parent.clone()
            }
        };
        match next {
            Some(p) => current = p,
            None => break,
        }
    }
    let mut s = current.borrow_mut();
    match (s.vars.get_mut(name), value) {
        (Some(binding), Some(v)) => binding.value = v,
        (Some(_), None) => {}
        (None, v) => {
            s.vars.insert(
                name.clone(),
                Binding {
                    value: v.unwrap_or(Value::Undefined),
                    mutable: true,
                },
            );
        }
    }
}

pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = scope.clone();
    loop {
        let next = {
            let s = current.borrow();
            if let Some(b) = s.vars.get(name) {
                return Some(b.value.clone());
            }
            s.parent.clone()
        };
        current = next?;
    }
}

pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> AssignOutcome {
    let mut current = scope.clone();
    loop {
        let next = {
            let mut s = current.borrow_mut();
            if let Some(b) = s.vars.get_mut(name) {
                if !b.mutable {
                    return AssignOutcome::Constant;
                }
                b.value = value;
                return AssignOutcome::Assigned;
            }
            s.parent.clone()
        };
        match next {
            Some(p) => current = p,
            None => return AssignOutcome::Missing,
        }
    }
}

/// Nearest enclosing non-arrow frame.
pub fn frame(scope: &ScopeRef) -> Option<FrameRef> {
    let mut current = scope.clone();
    loop {
        let next = {
            let s = current.borrow();
            if let Some(f) = &s.frame {
                return Some(f.clone());
            }
            s.parent.clone()
        };
        current = next?;
    }
}

/// Fresh copy of the given bindings for a `for (let ...)` iteration.
pub fn copy_bindings(from: &ScopeRef, names: &[Rc<str>], parent: &ScopeRef) -> ScopeRef {
    let next = child(parent);
    {
        let src = from.borrow();
        let mut dst = next.borrow_mut();
        for name in names {
            if let Some(b) = src.vars.get(name) {
                dst.vars.insert(
                    name.clone(),
                    Binding {
                        value: b.value.clone(),
                        mutable: b.mutable,
                    },
                );
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_hoists_to_function_scope() {
        let global = root();
        let block = child(&global);
        let name: Rc<str> = "x".into();
        declare_var(&block, &name, Some(Value::Number(1.0)));
        assert!(matches!(lookup(&global, "x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn const_rejects_assignment() {
        let global = root();
        let name: Rc<str> = "c".into();
        declare(&global, &name, Value::Null, false);
        assert!(matches!(assign(&global, "c", Value::Bool(true)), AssignOutcome::Constant));
        assert!(matches!(assign(&global, "missing", Value::Bool(true)), AssignOutcome::Missing));
    }

    #[test]
    fn arrow_scope_sees_outer_frame() {
        let global = root();
        let arrow = function(&global, None);
        let f = frame(&arrow).expect("frame");
        assert!(matches!(f.borrow().this, Some(Value::Undefined)));
    }
}
