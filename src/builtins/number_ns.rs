//! `Number` namespace (`spec.md` §4.3).

use crate::{
    interpreter::{to_number, EvalCtx, RunResult},
    object::{BuiltinFn, ObjectClass},
    value::{number_to_string, Value},
};

use super::StaticEntry;

pub fn ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let n = match args.first() {
        Some(v) => to_number(ctx, v)?,
        None => 0.0,
    };
    match this {
        Value::Object(id) => {
            ctx.heap.get_mut(*id).class = ObjectClass::NumberBox(n);
            Ok(this.clone())
        }
        _ => Ok(Value::Number(n)),
    }
}

pub fn statics() -> &'static [StaticEntry] {
    &[
        ("isInteger", is_integer),
        ("isFinite", is_finite),
        ("isNaN", is_nan),
        ("parseFloat", parse_float),
        ("parseInt", parse_int),
    ]
}

fn is_integer(_ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.fract() == 0.0 && n.is_finite())))
}

fn is_finite(_ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite())))
}

fn is_nan(_ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_nan())))
}

fn parse_float(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = super::arg_string(ctx, args, 0)?;
    let trimmed = s.trim_start();
    let prefix: String = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0) || *c == 'e' || *c == 'E')
        .map(|(_, c)| c)
        .collect();
    Ok(Value::Number(prefix.parse::<f64>().unwrap_or(f64::NAN)))
}

fn parse_int(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let s = super::arg_string(ctx, args, 0)?;
    let radix = match args.get(1) {
        Some(v) => to_number(ctx, v)? as u32,
        None => 10,
    };
    let radix = if radix == 0 { 10 } else { radix };
    let trimmed = s.trim();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(r) => (-1.0, r),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(sign * i64::from_str_radix(&digits, radix).map(|v| v as f64).unwrap_or(f64::NAN)))
}

pub fn prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "toString" => Some(to_string_method),
        "valueOf" => Some(value_of),
        "toFixed" => Some(to_fixed),
        _ => None,
    }
}

fn this_number(ctx: &mut EvalCtx, this: &Value) -> RunResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(id) => match &ctx.heap.get(*id).class {
            ObjectClass::NumberBox(n) => Ok(*n),
            _ => Err(ctx.raise_str("Number.prototype method called on incompatible receiver")),
        },
        _ => Err(ctx.raise_str("Number.prototype method called on incompatible receiver")),
    }
}

fn to_string_method(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let n = this_number(ctx, this)?;
    ctx.make_string(number_to_string(n))
}

fn value_of(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Number(this_number(ctx, this)?))
}

fn to_fixed(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let n = this_number(ctx, this)?;
    let digits = match args.first() {
        Some(v) => to_number(ctx, v)? as usize,
        None => 0,
    };
    ctx.make_string(format!("{n:.digits$}"))
}
