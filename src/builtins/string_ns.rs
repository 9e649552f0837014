//! `String` namespace (`spec.md` §4.3: prototype `charAt`/`charCodeAt`/
//! `slice`/`substring`/`toUpperCase`/`toLowerCase`/`trim`/`split` (string
//! separator only)/`repeat`/`includes`/`startsWith`/`endsWith`/`indexOf`/
//! `replace` (string search only)").

use crate::{
    interpreter::{to_display_string, to_number, EvalCtx, RunResult},
    object::{BuiltinFn, ObjectClass},
    value::Value,
};

pub fn ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => String::new(),
    };
    match this {
        Value::Object(id) => {
            let rc = ctx.alloc_str(s)?;
            ctx.heap.get_mut(*id).class = ObjectClass::StringBox(rc);
            Ok(this.clone())
        }
        _ => Ok(Value::Str(ctx.alloc_str(s)?)),
    }
}

pub fn prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "charAt" => Some(char_at),
        "charCodeAt" => Some(char_code_at),
        "slice" => Some(slice),
        "substring" => Some(substring),
        "toUpperCase" => Some(to_upper_case),
        "toLowerCase" => Some(to_lower_case),
        "trim" => Some(trim),
        "split" => Some(split),
        "repeat" => Some(repeat),
        "includes" => Some(includes),
        "startsWith" => Some(starts_with),
        "endsWith" => Some(ends_with),
        "indexOf" => Some(index_of),
        "replace" => Some(replace),
        "match" => Some(match_unsupported),
        "toString" | "valueOf" => Some(to_string_method),
        _ => None,
    }
}

fn match_unsupported(ctx: &mut EvalCtx, _this: &Value, _args: &[Value]) -> RunResult<Value> {
    Err(ctx.raise_str("String.prototype.match is not supported"))
}

fn this_str(ctx: &mut EvalCtx, this: &Value) -> RunResult<std::rc::Rc<str>> {
    match this {
        Value::Str(s) => Ok(s.clone()),
        Value::Object(id) => match &ctx.heap.get(*id).class {
            ObjectClass::StringBox(s) => Ok(s.clone()),
            _ => Err(ctx.raise_str("String.prototype method called on incompatible receiver")),
        },
        _ => Err(ctx.raise_str("String.prototype method called on incompatible receiver")),
    }
}

fn resolve_index(n: f64, len: i64) -> i64 {
    let i = if n.is_nan() { 0 } else { n as i64 };
    if i < 0 { (len + i).max(0) } else { i.min(len) }
}

fn char_at(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let idx = to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))? as i64;
    let c = if idx >= 0 { s.chars().nth(idx as usize) } else { None };
    ctx.make_string(c.map(|c| c.to_string()).unwrap_or_default())
}

fn char_code_at(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let idx = to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))? as i64;
    Ok(match if idx >= 0 { s.chars().nth(idx as usize) } else { None } {
        Some(c) => Value::Number(c as u32 as f64),
        None => Value::Number(f64::NAN),
    })
}

fn slice(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let start = resolve_index(to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))?, len);
    let end = match args.get(1) {
        Some(v) => resolve_index(to_number(ctx, v)?, len),
        None => len,
    };
    let result: String = if start < end { chars[start as usize..end as usize].iter().collect() } else { String::new() };
    ctx.make_string(result)
}

fn substring(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let clamp = |n: f64| -> i64 {
        if n.is_nan() || n < 0.0 {
            0
        } else {
            (n as i64).min(len)
        }
    };
    let a = clamp(to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))?);
    let b = match args.get(1) {
        Some(v) => clamp(to_number(ctx, v)?),
        None => len,
    };
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    let result: String = chars[start as usize..end as usize].iter().collect();
    ctx.make_string(result)
}

fn to_upper_case(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    ctx.make_string(s.to_uppercase())
}

fn to_lower_case(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    ctx.make_string(s.to_lowercase())
}

fn trim(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    ctx.make_string(s.trim().to_string())
}

fn split(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let parts: Vec<String> = match args.first() {
        None | Some(Value::Undefined) => vec![s.to_string()],
        Some(sep_value) => {
            let sep = to_display_string(ctx, sep_value)?;
            if sep.is_empty() {
                s.chars().map(|c| c.to_string()).collect()
            } else {
                s.split(sep.as_str()).map(str::to_string).collect()
            }
        }
    };
    let mut values = Vec::with_capacity(parts.len());
    for p in parts {
        values.push(ctx.make_string(p)?);
    }
    Ok(Value::Object(ctx.make_array(values)?))
}

fn repeat(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let count = to_number(ctx, args.first().unwrap_or(&Value::Number(0.0)))?;
    if count < 0.0 || !count.is_finite() {
        return Err(ctx.raise_str("Invalid count value"));
    }
    ctx.make_string(s.repeat(count as usize))
}

fn includes(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let needle = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    Ok(Value::Bool(s.contains(needle.as_str())))
}

fn starts_with(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let needle = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    Ok(Value::Bool(s.starts_with(needle.as_str())))
}

fn ends_with(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let needle = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    Ok(Value::Bool(s.ends_with(needle.as_str())))
}

fn index_of(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let needle = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    Ok(match s.find(needle.as_str()) {
        Some(byte_idx) => Value::Number(s[..byte_idx].chars().count() as f64),
        None => Value::Number(-1.0),
    })
}

fn replace(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    let needle = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    let replacement = match args.get(1) {
        Some(v) => to_display_string(ctx, v)?,
        None => "undefined".to_string(),
    };
    ctx.make_string(s.replacen(needle.as_str(), &replacement, 1))
}

fn to_string_method(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let s = this_str(ctx, this)?;
    Ok(Value::Str(s))
}
