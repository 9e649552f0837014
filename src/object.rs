//! Object model (`spec.md` §3 "Object", §4.3, §4.7).
//!
//! An [`Object`] is a property map plus an internal class tag. The class
//! tag selects which extra storage applies (indexed elements for arrays,
//! captured scope for script functions, a resolver for dynamic-property
//! host objects) the same way the teacher's `HeapData` variants carry
//! per-kind payloads alongside a shared property map.

use std::{cell::Cell, rc::Rc};

use indexmap::IndexMap;

use crate::{ast::FunctionDef, heap::HeapId, interpreter::RunResult, scope::ScopeRef, value::Value};

/// A single property slot. Enumeration order is insertion order
/// (`spec.md` §3 invariant); `IndexMap` gives us that for free.
pub type PropertyMap = IndexMap<Rc<str>, Value, ahash::RandomState>;

/// Host-implemented property resolver backing a `DynamicHost` object
/// (`spec.md` §4.7 item 3).
///
/// `get`/`set`/`delete` drive property access on the script side of a single
/// object; `enumerate` drives `Object.keys`/`Object.values`/`Object.entries`
/// and `for...in`. The resolver receives `&mut EvalCtx` so it may allocate
/// script values (via `ctx.make()`) while answering.
pub trait DynamicPropResolver {
    fn get(&self, ctx: &mut crate::interpreter::EvalCtx, name: &str) -> RunResult<Option<Value>>;
    fn set(&self, ctx: &mut crate::interpreter::EvalCtx, name: &str, value: Value) -> RunResult<bool>;
    fn delete(&self, ctx: &mut crate::interpreter::EvalCtx, name: &str) -> RunResult<bool>;
    fn enumerate(&self, ctx: &mut crate::interpreter::EvalCtx) -> RunResult<Vec<(String, Value)>>;
}

/// A host method's implementation: takes the raw argument list, returns a
/// script value or a [`RunResult`] error.
pub type HostMethodFn = dyn Fn(&mut crate::interpreter::EvalCtx, &[Value]) -> RunResult<Value>;

/// A host method bound into script globals via
/// [`crate::host::HostObjectBuilder`] (`spec.md` §4.7 item 2).
///
/// `arity` enforces a fixed argument count for typed methods; `None` marks a
/// varargs method that receives the full argument list unchecked.
pub struct HostMethod {
    pub name: Rc<str>,
    pub arity: Option<usize>,
    pub func: Rc<HostMethodFn>,
}

impl std::fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMethod").field("name", &self.name).field("arity", &self.arity).finish()
    }
}

/// A function defined by script source, carrying its captured lexical scope.
///
/// Closures capture the environment frame, not a snapshot (`spec.md` §4.4):
/// `closure` is the `ScopeRef` in effect where the function was defined, and
/// a call pushes a fresh frame whose parent is this scope, not the caller's.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    pub def: Rc<FunctionDef>,
    pub closure: ScopeRef,
    pub is_arrow: bool,
}

/// Signature of a built-in prototype method (`Array.prototype.push`,
/// `String.prototype.toUpperCase`, ...). Unlike [`HostMethod`] (embedder
/// globals, §4.7) these take an explicit `this` — a plain `fn` pointer is
/// enough since no state needs capturing, so looking one up never allocates
/// (`spec.md` §4.3).
pub type BuiltinFn = fn(&mut crate::interpreter::EvalCtx, &Value, &[Value]) -> RunResult<Value>;

/// A built-in prototype method bound to a specific `this` value, materialized
/// only when the method is read as a value rather than called directly (e.g.
/// `const f = arr.push`); the direct-call path in the interpreter never
/// allocates one of these.
pub struct BuiltinMethod {
    pub name: Rc<str>,
    pub func: BuiltinFn,
    pub bound_this: Value,
}

impl std::fmt::Debug for BuiltinMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinMethod").field("name", &self.name).finish()
    }
}

pub enum FunctionData {
    Script(ScriptFunction),
    Native(Rc<HostMethod>),
    Builtin(Rc<BuiltinMethod>),
}

impl std::fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script(s) => f.debug_tuple("Script").field(&s.def.name).finish(),
            Self::Native(m) => f.debug_tuple("Native").field(&m.name).finish(),
            Self::Builtin(m) => f.debug_tuple("Builtin").field(&m.name).finish(),
        }
    }
}

/// An opaque handle to host-side state that was not explicitly requested as
/// a script object/array, wrapped so the script side sees a stable object
/// identity instead of reflecting into host internals (`spec.md` §4.7 "an
/// opaque host handle is wrapped as an object whose identity is preserved").
///
/// `cached_object` remembers which heap object this handle was last wrapped
/// as, so marshalling the same handle twice yields the same script object
/// (`===`-equal) rather than two distinct ones.
#[derive(Clone)]
pub struct HostHandle {
    payload: Rc<dyn std::any::Any>,
    cached_object: Rc<Cell<Option<HeapId>>>,
}

impl HostHandle {
    pub fn new<T: 'static>(payload: T) -> Self {
        Self { payload: Rc::new(payload), cached_object: Rc::new(Cell::new(None)) }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    pub fn cached_object(&self) -> Option<HeapId> {
        self.cached_object.get()
    }

    pub fn set_cached_object(&self, id: HeapId) {
        self.cached_object.set(Some(id));
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostHandle")
    }
}

/// The internal class tag from `spec.md` §3: "Object, Array, String, Date,
/// Function, Host, DynamicHost".
pub enum ObjectClass {
    Plain,
    Array,
    /// Boxed primitive from `new String(...)`/auto-boxing of a primitive
    /// string when it needs object identity (spec.md §4.3 "Property access
    /// on primitives auto-boxes").
    StringBox(Rc<str>),
    NumberBox(f64),
    BooleanBox(bool),
    /// Milliseconds since the epoch; `NaN` means an invalid date.
    Date(f64),
    Function(FunctionData),
    /// A plain host-provided object built via `HostObjectBuilder` — same
    /// storage shape as `Plain`, tagged separately only for diagnostics.
    Host,
    /// The "opaque host handle" fallback from `spec.md` §4.7: a host value
    /// not explicitly requested as a script object/array, wrapped so its
    /// identity survives repeated marshalling.
    OpaqueHost(HostHandle),
    DynamicHost(Rc<dyn DynamicPropResolver>),
}

impl std::fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "Plain"),
            Self::Array => write!(f, "Array"),
            Self::StringBox(s) => write!(f, "StringBox({s:?})"),
            Self::NumberBox(n) => write!(f, "NumberBox({n})"),
            Self::BooleanBox(b) => write!(f, "BooleanBox({b})"),
            Self::Date(t) => write!(f, "Date({t})"),
            Self::Function(func) => write!(f, "Function({func:?})"),
            Self::Host => write!(f, "Host"),
            Self::OpaqueHost(_) => write!(f, "OpaqueHost"),
            Self::DynamicHost(_) => write!(f, "DynamicHost"),
        }
    }
}

/// A heap-allocated object: a property map, an internal class tag, and (for
/// arrays) an indexed element store.
#[derive(Debug)]
pub struct Object {
    pub class: ObjectClass,
    pub props: PropertyMap,
    pub elements: Vec<Value>,
    pub frozen: bool,
}

impl Object {
    pub fn plain() -> Self {
        Self { class: ObjectClass::Plain, props: PropertyMap::default(), elements: Vec::new(), frozen: false }
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Self { class: ObjectClass::Array, props: PropertyMap::default(), elements, frozen: false }
    }

    pub fn host() -> Self {
        Self { class: ObjectClass::Host, props: PropertyMap::default(), elements: Vec::new(), frozen: false }
    }

    pub fn opaque_host(handle: HostHandle) -> Self {
        Self { class: ObjectClass::OpaqueHost(handle), props: PropertyMap::default(), elements: Vec::new(), frozen: false }
    }

    pub fn dynamic_host(resolver: Rc<dyn DynamicPropResolver>) -> Self {
        Self {
            class: ObjectClass::DynamicHost(resolver),
            props: PropertyMap::default(),
            elements: Vec::new(),
            frozen: false,
        }
    }

    pub fn function(data: FunctionData) -> Self {
        Self { class: ObjectClass::Function(data), props: PropertyMap::default(), elements: Vec::new(), frozen: false }
    }

    pub fn date(millis: f64) -> Self {
        Self { class: ObjectClass::Date(millis), props: PropertyMap::default(), elements: Vec::new(), frozen: false }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.class, ObjectClass::Array)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.class, ObjectClass::Function(_))
    }

    pub fn class_name(&self) -> &'static str {
        match self.class {
            ObjectClass::Plain => "Object",
            ObjectClass::Array => "Array",
            ObjectClass::StringBox(_) => "String",
            ObjectClass::NumberBox(_) => "Number",
            ObjectClass::BooleanBox(_) => "Boolean",
            ObjectClass::Date(_) => "Date",
            ObjectClass::Function(_) => "Function",
            ObjectClass::Host => "Object",
            ObjectClass::OpaqueHost(_) => "Object",
            ObjectClass::DynamicHost(_) => "Object",
        }
    }
}
