//! `JSON` namespace (`spec.md` §4.3: "`parse`, `stringify`"; §8 invariant
//! "Round-trip JSON").

use serde_json::Value as Json;

use crate::{
    heap::HeapId,
    interpreter::{enumerate_keys, get_property, to_display_string, EvalCtx, RunResult},
    object::ObjectClass,
    value::Value,
};

use super::NamespaceEntry;

pub fn entries() -> Vec<(&'static str, NamespaceEntry)> {
    vec![("parse", NamespaceEntry::Func(parse)), ("stringify", NamespaceEntry::Func(stringify))]
}

fn parse(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let text = match args.first() {
        Some(v) => to_display_string(ctx, v)?,
        None => return Err(ctx.raise_str("Unexpected end of JSON input")),
    };
    let parsed: Json = serde_json::from_str(&text).map_err(|e| ctx.raise_str(format!("Unexpected token in JSON: {e}")))?;
    json_to_value(ctx, &parsed)
}

fn json_to_value(ctx: &mut EvalCtx, json: &Json) -> RunResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
        Json::String(s) => ctx.make_string(s.clone()),
        Json::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(json_to_value(ctx, item)?);
            }
            Ok(Value::Object(ctx.make_array(values)?))
        }
        Json::Object(map) => {
            let id = ctx.make_object()?;
            for (k, v) in map {
                let value = json_to_value(ctx, v)?;
                let key = ctx.interner_intern(k);
                ctx.set_property(id, key, value)?;
            }
            Ok(Value::Object(id))
        }
    }
}

fn stringify(ctx: &mut EvalCtx, _this: &Value, args: &[Value]) -> RunResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let mut seen = Vec::new();
    match value_to_json(ctx, &value, &mut seen)? {
        Some(json) => ctx.make_string(json.to_string()),
        None => Ok(Value::Undefined),
    }
}

fn value_to_json(ctx: &mut EvalCtx, value: &Value, seen: &mut Vec<HeapId>) -> RunResult<Option<Json>> {
    match value {
        Value::Undefined => Ok(None),
        Value::Null => Ok(Some(Json::Null)),
        Value::Bool(b) => Ok(Some(Json::Bool(*b))),
        Value::Number(n) => Ok(Some(number_to_json(*n))),
        Value::Str(s) => Ok(Some(Json::String(s.to_string()))),
        Value::Object(id) => object_to_json(ctx, *id, seen),
    }
}

fn number_to_json(n: f64) -> Json {
    if !n.is_finite() {
        return Json::Null;
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return Json::Number((n as i64).into());
    }
    serde_json::Number::from_f64(n).map(Json::Number).unwrap_or(Json::Null)
}

fn object_to_json(ctx: &mut EvalCtx, id: HeapId, seen: &mut Vec<HeapId>) -> RunResult<Option<Json>> {
    if seen.contains(&id) {
        return Err(ctx.raise_str("Converting circular structure to JSON"));
    }
    seen.push(id);

    let result = (|| {
        if ctx.heap.get(id).is_array() {
            let elements = ctx.heap.get(id).elements.clone();
            let mut items = Vec::with_capacity(elements.len());
            for v in elements {
                items.push(value_to_json(ctx, &v, seen)?.unwrap_or(Json::Null));
            }
            return Ok(Some(Json::Array(items)));
        }
        if let ObjectClass::Function(_) = &ctx.heap.get(id).class {
            return Ok(None);
        }
        let keys = enumerate_keys(ctx, &Value::Object(id))?;
        let mut map = serde_json::Map::new();
        for key in keys {
            if let Some(prop_value) = get_property(ctx, &Value::Object(id), &key)? {
                if let Some(json) = value_to_json(ctx, &prop_value, seen)? {
                    map.insert(key, json);
                }
            }
        }
        Ok(Some(Json::Object(map)))
    })();

    seen.pop();
    result
}
