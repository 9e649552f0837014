//! `Error`/`TypeError`/`RangeError` constructors (`spec.md` §4.8: "scripts
//! may throw and catch `Error`-like objects"). Minimal `name`/`message`
//! objects with a `toString`, enough for script-level `try`/`catch` to
//! inspect what was thrown; engine-raised faults never go through these.

use crate::{
    interpreter::{to_display_string, EvalCtx, RunResult},
    object::ObjectClass,
    value::Value,
};

fn make_error(ctx: &mut EvalCtx, this: &Value, args: &[Value], name: &str) -> RunResult<Value> {
    let message = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => String::new(),
    };
    let id = match this {
        Value::Object(id) if matches!(ctx.heap.get(*id).class, ObjectClass::Plain) => *id,
        _ => ctx.make_object()?,
    };
    let name_key = ctx.interner_intern("name");
    let name_value = ctx.make_string(name.to_string())?;
    ctx.set_property(id, name_key, name_value)?;
    let message_key = ctx.interner_intern("message");
    let message_value = ctx.make_string(message)?;
    ctx.set_property(id, message_key, message_value)?;
    Ok(Value::Object(id))
}

pub fn ctor_error(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    make_error(ctx, this, args, "Error")
}

pub fn ctor_type_error(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    make_error(ctx, this, args, "TypeError")
}

pub fn ctor_range_error(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    make_error(ctx, this, args, "RangeError")
}
