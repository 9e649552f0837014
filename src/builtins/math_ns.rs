//! `Math` namespace (`spec.md` §4.3: "standard constants and functions").
//! Rounding/NaN behavior follows ES6 defaults (`spec.md` §9 open question b).

use rand::Rng;

use crate::{
    interpreter::{to_number, EvalCtx, RunResult},
    value::Value,
};

use super::NamespaceEntry;

pub fn entries() -> Vec<(&'static str, NamespaceEntry)> {
    vec![
        ("PI", NamespaceEntry::Const(std::f64::consts::PI)),
        ("E", NamespaceEntry::Const(std::f64::consts::E)),
        ("LN2", NamespaceEntry::Const(std::f64::consts::LN_2)),
        ("LN10", NamespaceEntry::Const(std::f64::consts::LN_10)),
        ("SQRT2", NamespaceEntry::Const(std::f64::consts::SQRT_2)),
        ("abs", NamespaceEntry::Func(abs)),
        ("floor", NamespaceEntry::Func(floor)),
        ("ceil", NamespaceEntry::Func(ceil)),
        ("round", NamespaceEntry::Func(round)),
        ("trunc", NamespaceEntry::Func(trunc)),
        ("sign", NamespaceEntry::Func(sign)),
        ("sqrt", NamespaceEntry::Func(sqrt)),
        ("cbrt", NamespaceEntry::Func(cbrt)),
        ("pow", NamespaceEntry::Func(pow)),
        ("max", NamespaceEntry::Func(max)),
        ("min", NamespaceEntry::Func(min)),
        ("random", NamespaceEntry::Func(random)),
        ("log", NamespaceEntry::Func(log)),
        ("log2", NamespaceEntry::Func(log2)),
        ("log10", NamespaceEntry::Func(log10)),
        ("sin", NamespaceEntry::Func(sin)),
        ("cos", NamespaceEntry::Func(cos)),
        ("tan", NamespaceEntry::Func(tan)),
        ("hypot", NamespaceEntry::Func(hypot)),
    ]
}

fn unary(ctx: &mut EvalCtx, args: &[Value], f: impl Fn(f64) -> f64) -> RunResult<Value> {
    let n = super::arg_number(ctx, args, 0)?;
    Ok(Value::Number(f(n)))
}

fn abs(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::abs)
}
fn floor(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::floor)
}
fn ceil(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::ceil)
}
fn round(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, |n| (n + 0.5).floor())
}
fn trunc(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::trunc)
}
fn sign(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, |n| if n.is_nan() { f64::NAN } else { n.signum() * if n == 0.0 { 0.0 } else { 1.0 } })
}
fn sqrt(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::sqrt)
}
fn cbrt(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::cbrt)
}
fn log(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::ln)
}
fn log2(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::log2)
}
fn log10(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::log10)
}
fn sin(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::sin)
}
fn cos(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::cos)
}
fn tan(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    unary(ctx, args, f64::tan)
}

fn pow(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let base = super::arg_number(ctx, args, 0)?;
    let exp = super::arg_number(ctx, args, 1)?;
    Ok(Value::Number(base.powf(exp)))
}

fn max(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let mut result = f64::NEG_INFINITY;
    for a in args {
        let n = to_number(ctx, a)?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.max(n);
    }
    Ok(Value::Number(result))
}

fn min(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let mut result = f64::INFINITY;
    for a in args {
        let n = to_number(ctx, a)?;
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        result = result.min(n);
    }
    Ok(Value::Number(result))
}

fn hypot(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let mut sum = 0.0;
    for a in args {
        let n = to_number(ctx, a)?;
        sum += n * n;
    }
    Ok(Value::Number(sum.sqrt()))
}

fn random(_ctx: &mut EvalCtx, _this: &Value, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Number(rand::thread_rng().gen_range(0.0..1.0)))
}
