//! Lexical environments (`spec.md` §3 "Scope/Environment", §4.4).
//!
//! A chain of frames, each a map from identifier to a binding record.
//! Frames are arena-like in spirit (`spec.md` §9 "Design notes": "arena-
//! allocated frames with integer parent indices") but since this tree
//! walker doesn't compile a separate slot-resolution pass the way the
//! teacher's bytecode compiler does, frames are plain `Rc<RefCell<Scope>>`
//! nodes — a closure capturing its defining scope and a cyclic
//! function→scope→function graph are both ordinary, because the whole
//! graph is released when the owning `EvalCtx`'s last `Rc` is dropped.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Param,
    Fn,
}

#[derive(Debug, Clone)]
struct Binding {
    kind: BindingKind,
    /// `false` between entering a block and executing a `let`/`const`
    /// declaration — the temporal dead zone (`spec.md` §4.4).
    initialized: bool,
    value: Value,
}

#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeRef>,
    bindings: AHashMap<Rc<str>, Binding>,
    /// `true` for the global scope and for each function call's top frame —
    /// the targets `var`/`function` hoisting climbs to (`spec.md` §4.4).
    pub is_function_boundary: bool,
}

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Reading a `let`/`const` binding before its declaration executed.
    TemporalDeadZone(Rc<str>),
    /// Reading or writing a name with no binding anywhere in the chain.
    NotDefined(Rc<str>),
    /// Writing to a `const` binding after initialization.
    AssignToConst(Rc<str>),
}

impl Scope {
    pub fn new_global() -> ScopeRef {
        Rc::new(RefCell::new(Self { parent: None, bindings: AHashMap::new(), is_function_boundary: true }))
    }

    pub fn child(parent: &ScopeRef, is_function_boundary: bool) -> ScopeRef {
        Rc::new(RefCell::new(Self { parent: Some(parent.clone()), bindings: AHashMap::new(), is_function_boundary }))
    }

    /// Declares an already-initialized binding in this exact frame (not
    /// walking the chain). Used for `var`/`param` bindings and for
    /// `let`/`const` once their initializer has run; see [`Self::declare_tdz`]
    /// for the pre-initializer state.
    pub fn declare(&mut self, name: Rc<str>, kind: BindingKind, value: Value) {
        self.bindings.insert(name, Binding { kind, initialized: true, value });
    }

    /// Declares a `let`/`const` binding in the TDZ state, before its
    /// initializer (if any) has run.
    pub fn declare_tdz(&mut self, name: Rc<str>, kind: BindingKind) {
        self.bindings.insert(name, Binding { kind, initialized: false, value: Value::Undefined });
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}

/// Walks the scope chain looking up `name`, honoring the TDZ.
pub fn get(scope: &ScopeRef, name: &str) -> Result<Value, ScopeError> {
    let mut cur = scope.clone();
    loop {
        let next_parent = {
            let s = cur.borrow();
            if let Some(binding) = s.bindings.get(name) {
                if !binding.initialized {
                    return Err(ScopeError::TemporalDeadZone(Rc::from(name)));
                }
                return Ok(binding.value.clone());
            }
            s.parent.clone()
        };
        match next_parent {
            Some(p) => cur = p,
            None => return Err(ScopeError::NotDefined(Rc::from(name))),
        }
    }
}

pub fn has(scope: &ScopeRef, name: &str) -> bool {
    let mut cur = scope.clone();
    loop {
        let next_parent = {
            let s = cur.borrow();
            if s.bindings.contains_key(name) {
                return true;
            }
            s.parent.clone()
        };
        match next_parent {
            Some(p) => cur = p,
            None => return false,
        }
    }
}

/// Assigns to an existing binding anywhere in the chain, enforcing `const`.
/// Also clears the TDZ flag (used to "initialize" a `let`/`const` the first
/// time its declaration statement runs).
pub fn set(scope: &ScopeRef, name: &str, value: Value) -> Result<(), ScopeError> {
    let mut cur = scope.clone();
    loop {
        let next_parent = {
            let mut s = cur.borrow_mut();
            if let Some(binding) = s.bindings.get_mut(name) {
                if binding.initialized && binding.kind == BindingKind::Const {
                    return Err(ScopeError::AssignToConst(Rc::from(name)));
                }
                binding.value = value;
                binding.initialized = true;
                return Ok(());
            }
            s.parent.clone()
        };
        match next_parent {
            Some(p) => cur = p,
            None => return Err(ScopeError::NotDefined(Rc::from(name))),
        }
    }
}

/// Declares `name` as `var` at the nearest function/global boundary,
/// implementing hoisting (`spec.md` §4.4). A no-op if already declared
/// there (repeated `var` declarations are legal and share one binding).
pub fn hoist_var(scope: &ScopeRef, name: Rc<str>) {
    let mut cur = scope.clone();
    loop {
        let is_boundary = cur.borrow().is_function_boundary;
        if is_boundary {
            let mut s = cur.borrow_mut();
            if !s.bindings.contains_key(&name) {
                s.bindings.insert(name, Binding { kind: BindingKind::Var, initialized: true, value: Value::Undefined });
            }
            return;
        }
        let parent = cur.borrow().parent.clone().expect("scope chain must end at a function boundary");
        cur = parent;
    }
}

/// Hoists a function declaration's *value* (not just the binding) to the
/// nearest function/global boundary — functions hoist both binding and
/// value, unlike `var` (`spec.md` §4.4).
pub fn hoist_function(scope: &ScopeRef, name: Rc<str>, value: Value) {
    let mut cur = scope.clone();
    loop {
        let is_boundary = cur.borrow().is_function_boundary;
        if is_boundary {
            cur.borrow_mut().bindings.insert(name, Binding { kind: BindingKind::Fn, initialized: true, value });
            return;
        }
        let parent = cur.borrow().parent.clone().expect("scope chain must end at a function boundary");
        cur = parent;
    }
}
