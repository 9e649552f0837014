//! `Date` namespace (`spec.md` §4.3: "construction, `now`, `getTime`,
//! formatting"). Semantics follow ES6 defaults via `chrono`
//! (`spec.md` §9 open question b).

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

use crate::{
    interpreter::{to_number, EvalCtx, RunResult},
    object::{BuiltinFn, ObjectClass},
    value::Value,
};

use super::StaticEntry;

pub fn ctor(ctx: &mut EvalCtx, this: &Value, args: &[Value]) -> RunResult<Value> {
    let millis = if args.is_empty() { now_millis() } else { to_number(ctx, &args[0])? };
    match this {
        Value::Object(id) => {
            ctx.heap.get_mut(*id).class = ObjectClass::Date(millis);
            Ok(this.clone())
        }
        _ => ctx.make_string(format_date(millis)),
    }
}

pub fn statics() -> &'static [StaticEntry] {
    &[("now", now)]
}

fn now(_ctx: &mut EvalCtx, _this: &Value, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Number(now_millis()))
}

fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

pub fn prototype_method(key: &str) -> Option<BuiltinFn> {
    match key {
        "getTime" | "valueOf" => Some(get_time),
        "getFullYear" => Some(get_full_year),
        "getMonth" => Some(get_month),
        "getDate" => Some(get_date),
        "getDay" => Some(get_day),
        "getHours" => Some(get_hours),
        "getMinutes" => Some(get_minutes),
        "getSeconds" => Some(get_seconds),
        "toISOString" | "toString" => Some(to_iso_string),
        _ => None,
    }
}

fn this_millis(ctx: &mut EvalCtx, this: &Value) -> RunResult<f64> {
    match this {
        Value::Object(id) => match &ctx.heap.get(*id).class {
            ObjectClass::Date(m) => Ok(*m),
            _ => Err(ctx.raise_str("Date.prototype method called on incompatible receiver")),
        },
        _ => Err(ctx.raise_str("Date.prototype method called on incompatible receiver")),
    }
}

fn datetime(millis: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn get_time(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    Ok(Value::Number(this_millis(ctx, this)?))
}

fn get_full_year(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.year() as f64).unwrap_or(f64::NAN)))
}

fn get_month(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| (d.month() - 1) as f64).unwrap_or(f64::NAN)))
}

fn get_date(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.day() as f64).unwrap_or(f64::NAN)))
}

fn get_day(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.weekday().num_days_from_sunday() as f64).unwrap_or(f64::NAN)))
}

fn get_hours(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.hour() as f64).unwrap_or(f64::NAN)))
}

fn get_minutes(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.minute() as f64).unwrap_or(f64::NAN)))
}

fn get_seconds(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    Ok(Value::Number(datetime(m).map(|d| d.second() as f64).unwrap_or(f64::NAN)))
}

fn to_iso_string(ctx: &mut EvalCtx, this: &Value, _args: &[Value]) -> RunResult<Value> {
    let m = this_millis(ctx, this)?;
    ctx.make_string(format_date(m))
}

/// Renders milliseconds-since-epoch as an ISO-8601 UTC string, or `"Invalid
/// Date"` for a non-finite/out-of-range value.
pub fn format_date(millis: f64) -> String {
    match datetime(millis) {
        Some(d) => d.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => "Invalid Date".to_string(),
    }
}
