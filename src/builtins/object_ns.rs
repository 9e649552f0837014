//! `Object` namespace (`spec.md` §4.3: "`keys`, `values`, `entries`,
//! `assign`, `freeze`, `isFrozen`").

use crate::{
    interpreter::{to_property_key, EvalCtx, RunResult},
    object::BuiltinFn,
    value::Value,
};

use super::StaticEntry;

pub fn ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    if let Some(Value::Object(id)) = args.first() {
        return Ok(Value::Object(*id));
    }
    match this {
        Value::Object(_) => Ok(this.clone()),
        _ => Ok(Value::Object(ctx.make_object()?)),
    }
}

pub fn statics() -> &'static [StaticEntry] {
    &[
        ("keys", keys),
        ("values", values),
        ("entries", entries),
        ("assign", assign),
        ("freeze", freeze),
        ("isFrozen", is_frozen),
    ]
}

pub fn prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "hasOwnProperty" => Some(has_own_property),
        "toString" => Some(to_string_method),
        _ => None,
    }
}

fn own_keys(ctx: &mut EvalCtx, value: &Value) -> RunResult<Vec<String>> {
    crate::interpreter::enumerate_keys(ctx, value)
}

fn keys(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let ks = own_keys(ctx, &target)?;
    let values: Vec<Value> = ks.into_iter().map(|k| ctx.make_string(k)).collect::<RunResult<_>>()?;
    Ok(Value::Object(ctx.make_array(values)?))
}

fn values(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let ks = own_keys(ctx, &target)?;
    let mut out = Vec::with_capacity(ks.len());
    for k in ks {
        out.push(crate::interpreter::get_property_checked(ctx, &target, &k)?);
    }
    Ok(Value::Object(ctx.make_array(out)?))
}

fn entries(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let ks = own_keys(ctx, &target)?;
    let mut out = Vec::with_capacity(ks.len());
    for k in ks {
        let v = crate::interpreter::get_property_checked(ctx, &target, &k)?;
        let key_value = ctx.make_string(k)?;
        out.push(Value::Object(ctx.make_array(vec![key_value, v])?));
    }
    Ok(Value::Object(ctx.make_array(out)?))
}

fn assign(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let Some(target @ Value::Object(_)) = args.first().cloned() else {
        return Err(ctx.raise_str("Object.assign target must be an object"));
    };
    for source in &args[1..] {
        if source.is_nullish() {
            continue;
        }
        let ks = own_keys(ctx, source)?;
        for k in ks {
            let v = crate::interpreter::get_property_checked(ctx, source, &k)?;
            crate::interpreter::set_property_checked(ctx, &target, &k, v)?;
        }
    }
    Ok(target)
}

fn freeze(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    if let Some(Value::Object(id)) = args.first() {
        ctx.heap.get_mut(*id).frozen = true;
    }
    Ok(args.first().cloned().unwrap_or(Value::Undefined))
}

fn is_frozen(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(match args.first() {
        Some(Value::Object(id)) => ctx.heap.get(*id).frozen,
        _ => true,
    }))
}

fn has_own_property(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let key_value = args.first().cloned().unwrap_or(Value::Undefined);
    let key = to_property_key(ctx, &key_value)?;
    let Value::Object(id) = this else { return Ok(Value::Bool(false)) };
    if let Ok(idx) = key.parse::<usize>() {
        if idx < ctx.heap.get(*id).elements.len() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(ctx.heap.get(*id).props.contains_key(key.as_str())))
}

fn to_string_method(_ctx: &mut EvalCtx, _this: &Value, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Str(std::rc::Rc::from("[object Object]")))
}
