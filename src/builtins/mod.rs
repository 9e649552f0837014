//! Built-in namespaces and prototype methods (`spec.md` §4.3).
//!
//! Every global (`Object`, `Array`, `String`, `Math`, `Date`, `Number`,
//! `Boolean`, `JSON`, and the minimal `Error`/`TypeError`/`RangeError`
//! family) is installed the same way a host integration would install its
//! own globals (`spec.md` §4.7): as plain objects whose methods are either
//! [`crate::object::BuiltinMethod`] (bound to a `this`) or ordinary
//! varargs-style functions stored directly on a namespace object. None of
//! this reaches for reflection — every method is an explicit Rust `fn`.

mod array_ns;
mod date_ns;
mod error_ns;
mod json_ns;
mod math_ns;
mod number_ns;
mod object_ns;
mod string_ns;

use std::rc::Rc;

use crate::{
    interpreter::{to_display_string, EvalCtx, RunResult},
    object::{BuiltinFn, BuiltinMethod, FunctionData, Object, ObjectClass},
    scope::BindingKind,
    value::Value,
};

pub use date_ns::format_date;

/// Installs every built-in global into `ctx.global` and records well-known
/// constructor identities for `instanceof`/diagnostics use.
pub fn install_globals(ctx: &mut EvalCtx) -> RunResult<()> {
    let object_ctor = install_namespace(ctx, object_ns::ctor, object_ns::statics())?;
    let array_ctor = install_namespace(ctx, array_ns::ctor, array_ns::statics())?;
    let string_ctor = install_namespace(ctx, string_ns::ctor, &[])?;
    let number_ctor = install_namespace(ctx, number_ns::ctor, number_ns::statics())?;
    let boolean_ctor = install_namespace(ctx, boolean_ctor, &[])?;
    let date_ctor = install_namespace(ctx, date_ns::ctor, date_ns::statics())?;
    let error_ctor = install_namespace(ctx, error_ns::ctor_error, &[])?;
    let type_error_ctor = install_namespace(ctx, error_ns::ctor_type_error, &[])?;
    let range_error_ctor = install_namespace(ctx, error_ns::ctor_range_error, &[])?;
    install_plain_namespace(ctx, "Math", math_ns::entries())?;
    install_plain_namespace(ctx, "JSON", json_ns::entries())?;
    install_global_value(ctx, "Object", object_ctor.clone())?;
    install_global_value(ctx, "Array", array_ctor.clone())?;
    install_global_value(ctx, "String", string_ctor.clone())?;
    install_global_value(ctx, "Number", number_ctor.clone())?;
    install_global_value(ctx, "Boolean", boolean_ctor.clone())?;
    install_global_value(ctx, "Date", date_ctor.clone())?;
    install_global_value(ctx, "Error", error_ctor.clone())?;
    install_global_value(ctx, "TypeError", type_error_ctor.clone())?;
    install_global_value(ctx, "RangeError", range_error_ctor.clone())?;
    install_regexp_stub(ctx)?;

    ctx.well_known.object_ctor = Some(as_id(&object_ctor));
    ctx.well_known.array_ctor = Some(as_id(&array_ctor));
    ctx.well_known.string_ctor = Some(as_id(&string_ctor));
    ctx.well_known.number_ctor = Some(as_id(&number_ctor));
    ctx.well_known.boolean_ctor = Some(as_id(&boolean_ctor));
    ctx.well_known.date_ctor = Some(as_id(&date_ctor));
    ctx.well_known.error_ctor = Some(as_id(&error_ctor));
    ctx.well_known.type_error_ctor = Some(as_id(&type_error_ctor));
    ctx.well_known.range_error_ctor = Some(as_id(&range_error_ctor));
    Ok(())
}

fn as_id(v: &Value) -> crate::heap::HeapId {
    match v {
        Value::Object(id) => *id,
        _ => unreachable!("constructors are always objects"),
    }
}

/// A namespace's own static entries: `(name, func)` pairs installed on the
/// constructor object itself (e.g. `Array.isArray`, `Object.keys`).
pub type StaticEntry = (&'static str, BuiltinFn);

fn install_namespace(ctx: &mut EvalCtx, ctor: BuiltinFn, statics: &[StaticEntry]) -> RunResult<Value> {
    let ctor_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(BuiltinMethod {
        name: Rc::from("constructor"),
        func: ctor,
        bound_this: Value::Undefined,
    }))))?;
    for (name, func) in statics {
        let method_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(BuiltinMethod {
            name: Rc::from(*name),
            func: *func,
            bound_this: Value::Undefined,
        }))))?;
        let key = ctx.interner_intern(name);
        ctx.set_property(ctor_id, key, Value::Object(method_id))?;
    }
    Ok(Value::Object(ctor_id))
}

fn install_plain_namespace(ctx: &mut EvalCtx, global_name: &str, entries: Vec<(&'static str, NamespaceEntry)>) -> RunResult<()> {
    let ns_id = ctx.make_object()?;
    for (name, entry) in entries {
        let value = match entry {
            NamespaceEntry::Const(n) => Value::Number(n),
            NamespaceEntry::Func(func) => {
                let method_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(BuiltinMethod {
                    name: Rc::from(name),
                    func,
                    bound_this: Value::Undefined,
                }))))?;
                Value::Object(method_id)
            }
        };
        let key = ctx.interner_intern(name);
        ctx.set_property(ns_id, key, value)?;
    }
    install_global_value(ctx, global_name, Value::Object(ns_id))
}

pub enum NamespaceEntry {
    Const(f64),
    Func(BuiltinFn),
}

fn install_global_value(ctx: &mut EvalCtx, name: &str, value: Value) -> RunResult<()> {
    ctx.global.borrow_mut().declare(Rc::from(name), BindingKind::Var, value);
    Ok(())
}

fn boolean_ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let b = args.first().is_some_and(Value::to_boolean);
    match this {
        Value::Object(id) => {
            ctx.heap.get_mut(*id).class = ObjectClass::BooleanBox(b);
            Ok(this.clone())
        }
        _ => Ok(Value::Bool(b)),
    }
}

fn install_regexp_stub(ctx: &mut EvalCtx) -> RunResult<()> {
    let ctor_id = ctx.alloc_object(Object::function(FunctionData::Builtin(Rc::new(BuiltinMethod {
        name: Rc::from("RegExp"),
        func: |ctx, _this, _args| Err(ctx.raise_str("RegExp is not supported")),
        bound_this: Value::Undefined,
    }))))?;
    install_global_value(ctx, "RegExp", Value::Object(ctor_id))
}

/// Looks up a built-in prototype method for an object by its internal class
/// (`spec.md` §4.3). Returns `None` for ordinary `Plain`/`Host` objects,
/// which have no prototype methods of their own.
pub fn class_builtin_method(class: &ObjectClass, key: &str) -> Option<BuiltinFn> {
    match class {
        ObjectClass::Array => array_ns::prototype_method(key),
        ObjectClass::Date(_) => date_ns::prototype_method(key),
        ObjectClass::StringBox(_) => string_ns::prototype_method(key),
        ObjectClass::NumberBox(_) => number_ns::prototype_method(key),
        ObjectClass::BooleanBox(_) => boolean_prototype_method(key),
        ObjectClass::Plain | ObjectClass::Host | ObjectClass::OpaqueHost(_) => object_ns::prototype_method(key),
        _ => None,
    }
}

/// Prototype methods reachable directly off a raw (unboxed) primitive value
/// (e.g. `(5).toFixed(2)`, `true.toString()`).
pub fn primitive_builtin_method(value: &Value, key: &str) -> Option<BuiltinFn> {
    match value {
        Value::Number(_) => number_ns::prototype_method(key),
        Value::Bool(_) => boolean_prototype_method(key),
        _ => None,
    }
}

/// Prototype methods reachable off a raw `string` primitive.
pub fn string_builtin_method(key: &str) -> Option<BuiltinFn> {
    string_ns::prototype_method(key)
}

fn boolean_prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "toString" => Some(|ctx, this, _args| {
            let s = to_display_string(ctx, this)?;
            Ok(Value::Str(ctx.alloc_str(s)?))
        }),
        "valueOf" => Some(|_ctx, this, _args| Ok(this.clone())),
        _ => None,
    }
}

/// Coerces a built-in method argument to `f64`, following `ToNumber`.
pub(super) fn arg_number(ctx: &mut EvalCtx, args: &[Value], idx: usize) -> RunResult<f64> {
    match args.get(idx) {
        Some(v) => crate::interpreter::to_number(ctx, v),
        None => Ok(f64::NAN),
    }
}

pub(super) fn arg_string(ctx: &mut EvalCtx, args: &[Value], idx: usize) -> RunResult<String> {
    match args.get(idx) {
        Some(v) => to_display_string(ctx, v),
        None => Ok("undefined".to_string()),
    }
}
