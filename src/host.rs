//! Host-interop layer (`spec.md` §4.7, §9 "Host-interop layer").
//!
//! Three ways a host registers state as script globals, none of which touch
//! reflection: plain value globals (handled directly by
//! [`crate::run::EvalOpts::custom_globals`]), the [`HostObjectBuilder`] here
//! for typed/varargs static objects, and [`crate::object::DynamicPropResolver`]
//! for a single object whose properties are computed on the fly.

use std::rc::Rc;

use crate::{
    interpreter::{to_display_string, to_number, EvalCtx, RunResult},
    object::{DynamicPropResolver, HostHandle, HostMethod, Object},
    value::Value,
};

/// Builds a static host object: named constants plus fixed-arity and
/// varargs methods, installed once and then marshalled like any other
/// script object (`spec.md` §4.7 item 2).
pub struct HostObjectBuilder {
    object: Object,
}

impl HostObjectBuilder {
    pub fn new() -> Self {
        Self { object: Object::host() }
    }

    /// Installs a named constant, marshalled once via [`to_script_value`].
    pub fn constant(mut self, ctx: &mut EvalCtx, name: &str, value: impl Into<HostValue>) -> RunResult<Self> {
        let key = ctx.interner_intern(name);
        let script_value = to_script_value(ctx, value.into())?;
        self.object.props.insert(key, script_value);
        Ok(self)
    }

    /// Installs a fixed-arity method. `arity` must be `<= 5`, matching
    /// `spec.md` §4.7's `n_max >= 5` requirement for typed adapters; beyond
    /// that, callers register a varargs method instead.
    pub fn method(
        self,
        ctx: &mut EvalCtx,
        name: &str,
        arity: usize,
        func: impl Fn(&mut EvalCtx, &[Value]) -> RunResult<Value> + 'static,
    ) -> RunResult<Self> {
        let method = Rc::new(HostMethod { name: Rc::from(name), arity: Some(arity), func: Rc::new(func) });
        self.install_method(ctx, name, method)
    }

    /// Installs a varargs method receiving the full argument list unchecked
    /// (`spec.md` §4.7 item 2 "varargs methods").
    pub fn varargs_method(
        self,
        ctx: &mut EvalCtx,
        name: &str,
        func: impl Fn(&mut EvalCtx, &[Value]) -> RunResult<Value> + 'static,
    ) -> RunResult<Self> {
        let method = Rc::new(HostMethod { name: Rc::from(name), arity: None, func: Rc::new(func) });
        self.install_method(ctx, name, method)
    }

    fn install_method(mut self, ctx: &mut EvalCtx, name: &str, method: Rc<HostMethod>) -> RunResult<Self> {
        let func_id = ctx.alloc_object(Object::function(crate::object::FunctionData::Native(method)))?;
        let key = ctx.interner_intern(name);
        self.object.props.insert(key, Value::Object(func_id));
        Ok(self)
    }

    pub fn build(self, ctx: &mut EvalCtx) -> RunResult<Value> {
        let id = ctx.alloc_object(self.object)?;
        Ok(Value::Object(id))
    }
}

impl Default for HostObjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a [`DynamicPropResolver`]-backed object: reads/writes/deletes on
/// the script side dispatch through the resolver, and `enumerate` drives
/// `for...in`/`Object.keys` (`spec.md` §4.7 item 3).
pub fn make_dynamic_host(ctx: &mut EvalCtx, resolver: Rc<dyn DynamicPropResolver>) -> RunResult<Value> {
    let id = ctx.alloc_object(Object::dynamic_host(resolver))?;
    Ok(Value::Object(id))
}

/// A host-side value awaiting marshalling into a script [`Value`]
/// (`spec.md` §4.7 "Marshalling").
#[derive(Debug, Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    Str(String),
    /// Marshalled into a real script array, requested explicitly by the
    /// caller (`spec.md` §4.7 "host maps/lists map to script objects/arrays
    /// if explicitly requested").
    List(Vec<HostValue>),
    /// Marshalled into a real script object with own enumerable properties
    /// in the given order, same opt-in as `List`.
    Map(Vec<(String, HostValue)>),
    /// Not requested as a script object/array: wrapped as an opaque handle
    /// whose identity is preserved across repeated marshalling (`spec.md`
    /// §4.7 "otherwise an opaque host handle is wrapped as an object whose
    /// identity is preserved").
    Opaque(HostHandle),
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}
impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Long(v)
    }
}
impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Double(v)
    }
}
impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}
impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

/// Marshals a host value into a script [`Value`], requesting a real script
/// object/array for lists rather than an opaque handle (`spec.md` §4.7
/// "host maps/lists map to script objects/arrays if explicitly requested").
pub fn to_script_value(ctx: &mut EvalCtx, value: HostValue) -> RunResult<Value> {
    match value {
        HostValue::Null => Ok(Value::Null),
        HostValue::Bool(b) => Ok(Value::Bool(b)),
        HostValue::Long(n) => Ok(Value::Number(n as f64)),
        HostValue::Double(n) => Ok(Value::Number(n)),
        HostValue::Str(s) => ctx.make_string(s),
        HostValue::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(to_script_value(ctx, item)?);
            }
            Ok(Value::Object(ctx.make_array(values)?))
        }
        HostValue::Map(entries) => {
            let id = ctx.make_object()?;
            for (key, item) in entries {
                let value = to_script_value(ctx, item)?;
                let key = ctx.interner_intern(&key);
                ctx.set_property(id, key, value)?;
            }
            Ok(Value::Object(id))
        }
        HostValue::Opaque(handle) => {
            if let Some(id) = handle.cached_object() {
                return Ok(Value::Object(id));
            }
            let id = ctx.alloc_object(Object::opaque_host(handle.clone()))?;
            handle.set_cached_object(id);
            Ok(Value::Object(id))
        }
    }
}

/// Extracts an integer from a script value, coercing the way `ToNumber`
/// does (`spec.md` §4.7 "Script-to-host extraction is explicit").
pub fn as_long(ctx: &mut EvalCtx, value: &Value) -> RunResult<i64> {
    Ok(to_number(ctx, value)? as i64)
}

/// Extracts a string from a script value via the same coercion `String(x)`
/// would use.
pub fn as_str(ctx: &mut EvalCtx, value: &Value) -> RunResult<String> {
    to_display_string(ctx, value)
}

/// Extracts the raw numeric value from a script value.
pub fn get_value(ctx: &mut EvalCtx, value: &Value) -> RunResult<f64> {
    to_number(ctx, value)
}
