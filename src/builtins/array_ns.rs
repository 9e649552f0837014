//! `Array` namespace (`spec.md` §4.3: "`isArray`, prototype `map`/`filter`/
//! `reduce`/`forEach`/`join`/`slice`/`concat`/`indexOf`/`push`/`pop`/
//! `shift`/`unshift`/`sort`/`reverse`/`includes`").

use crate::{
    interpreter::{call_value, strict_equals, to_display_string, to_number, EvalCtx, RunResult},
    object::{BuiltinFn, ObjectClass},
    value::Value,
};

use super::StaticEntry;

pub fn ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let elements = if args.len() == 1 {
        if let Value::Number(n) = args[0] {
            vec![Value::Undefined; n as usize]
        } else {
            args.to_vec()
        }
    } else {
        args.to_vec()
    };
    match this {
        Value::Object(id) => {
            ctx.heap.get_mut(*id).class = ObjectClass::Array;
            ctx.heap.get_mut(*id).elements = elements;
            Ok(this.clone())
        }
        _ => Ok(Value::Object(ctx.make_array(elements)?)),
    }
}

pub fn statics() -> &'static [StaticEntry] {
    &[("isArray", is_array)]
}

fn is_array(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(matches!(args.first(), Some(Value::Object(id)) if ctx.heap.get(*id).is_array())))
}

pub fn prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "push" => Some(push),
        "pop" => Some(pop),
        "shift" => Some(shift),
        "unshift" => Some(unshift),
        "map" => Some(map),
        "filter" => Some(filter),
        "reduce" => Some(reduce),
        "forEach" => Some(for_each),
        "join" => Some(join),
        "slice" => Some(slice),
        "concat" => Some(concat),
        "indexOf" => Some(index_of),
        "sort" => Some(sort),
        "reverse" => Some(reverse),
        "includes" => Some(includes),
        "toString" => Some(join),
        _ => None,
    }
}

fn this_id(ctx: &mut EvalCtx, this: &Value) -> RunResult<crate::heap::HeapId> {
    match this {
        Value::Object(id) if ctx.heap.get(*id).is_array() => Ok(*id),
        _ => Err(ctx.raise_str("Array.prototype method called on a non-array")),
    }
}

fn push(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    for v in args {
        ctx.push_element(id, v.clone())?;
    }
    Ok(Value::Number(ctx.heap.get(id).elements.len() as f64))
}

fn pop(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    Ok(ctx.heap.get_mut(id).elements.pop().unwrap_or(Value::Undefined))
}

fn shift(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let elements = &mut ctx.heap.get_mut(id).elements;
    if elements.is_empty() {
        Ok(Value::Undefined)
    } else {
        Ok(elements.remove(0))
    }
}

fn unshift(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    for (i, v) in args.iter().enumerate() {
        ctx.heap.get_mut(id).elements.insert(i, v.clone());
    }
    Ok(Value::Number(ctx.heap.get(id).elements.len() as f64))
}

fn map(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    let elements = ctx.heap.get(id).elements.clone();
    let mut out = Vec::with_capacity(elements.len());
    for (i, v) in elements.into_iter().enumerate() {
        let idx_value = Value::Number(i as f64);
        out.push(call_value(ctx, callback.clone(), Value::Undefined, vec![v, idx_value, this.clone()])?);
    }
    Ok(Value::Object(ctx.make_array(out)?))
}

fn filter(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    let elements = ctx.heap.get(id).elements.clone();
    let mut out = Vec::new();
    for (i, v) in elements.into_iter().enumerate() {
        let idx_value = Value::Number(i as f64);
        let keep = call_value(ctx, callback.clone(), Value::Undefined, vec![v.clone(), idx_value, this.clone()])?;
        if keep.to_boolean() {
            out.push(v);
        }
    }
    Ok(Value::Object(ctx.make_array(out)?))
}

fn reduce(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    let elements = ctx.heap.get(id).elements.clone();
    let mut iter = elements.into_iter().enumerate();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match iter.next() {
            Some((_, v)) => v,
            None => return Err(ctx.raise_str("Reduce of empty array with no initial value")),
        },
    };
    for (i, v) in iter {
        let idx_value = Value::Number(i as f64);
        acc = call_value(ctx, callback.clone(), Value::Undefined, vec![acc, v, idx_value, this.clone()])?;
    }
    Ok(acc)
}

fn for_each(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let callback = args.first().cloned().unwrap_or(Value::Undefined);
    let elements = ctx.heap.get(id).elements.clone();
    for (i, v) in elements.into_iter().enumerate() {
        let idx_value = Value::Number(i as f64);
        call_value(ctx, callback.clone(), Value::Undefined, vec![v, idx_value, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn join(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let sep = match args.first() {
        Some(v) if !matches!(v, Value::Undefined) => to_display_string(ctx, v)?,
        _ => ",".to_string(),
    };
    let elements = ctx.heap.get(id).elements.clone();
    let mut parts = Vec::with_capacity(elements.len());
    for v in elements {
        parts.push(if v.is_nullish() { String::new() } else { to_display_string(ctx, &v)? });
    }
    Ok(Value::Str(ctx.alloc_str(parts.join(&sep))?))
}

fn slice(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let len = ctx.heap.get(id).elements.len() as i64;
    let start = resolve_index(to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))?, len);
    let end = match args.get(1) {
        Some(v) => resolve_index(to_number(ctx, v)?, len),
        None => len,
    };
    let elements = ctx.heap.get(id).elements.clone();
    let slice = if start < end { elements[start as usize..end as usize].to_vec() } else { Vec::new() };
    Ok(Value::Object(ctx.make_array(slice)?))
}

fn resolve_index(n: f64, len: i64) -> i64 {
    let i = if n.is_nan() { 0 } else { n as i64 };
    if i < 0 { (len + i).max(0) } else { i.min(len) }
}

fn concat(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let mut out = ctx.heap.get(id).elements.clone();
    for arg in args {
        match arg {
            Value::Object(other_id) if ctx.heap.get(*other_id).is_array() => {
                out.extend(ctx.heap.get(*other_id).elements.clone());
            }
            other => out.push(other.clone()),
        }
    }
    Ok(Value::Object(ctx.make_array(out)?))
}

fn index_of(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let target = args.first().cloned().unwrap_or(Value::Undefined);
    let elements = ctx.heap.get(id).elements.clone();
    for (i, v) in elements.iter().enumerate() {
        if strict_equals(ctx, v, &target) {
            return Ok(Value::Number(i as f64));
        }
    }
    Ok(Value::Number(-1.0))
}

fn includes(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let found = index_of(ctx, this, args)?;
    Ok(Value::Bool(!matches!(found, Value::Number(n) if n < 0.0)))
}

fn sort(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    let mut elements = ctx.heap.get(id).elements.clone();
    let comparator = args.first().cloned();
    let mut err = None;
    elements.sort_by(|a, b| {
        if err.is_some() {
            return std::cmp::Ordering::Equal;
        }
        match &comparator {
            Some(cmp) => match call_value(ctx, cmp.clone(), Value::Undefined, vec![a.clone(), b.clone()]) {
                Ok(result) => to_number(ctx, &result).unwrap_or(0.0).partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal),
                Err(e) => {
                    err = Some(e);
                    std::cmp::Ordering::Equal
                }
            },
            None => {
                let sa = to_display_string(ctx, a).unwrap_or_default();
                let sb = to_display_string(ctx, b).unwrap_or_default();
                sa.cmp(&sb)
            }
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    ctx.heap.get_mut(id).elements = elements;
    Ok(this.clone())
}

fn reverse(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let id = this_id(ctx, this)?;
    ctx.heap.get_mut(id).elements.reverse();
    Ok(this.clone())
}
