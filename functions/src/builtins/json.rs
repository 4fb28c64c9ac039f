use common::err::{CResult, ReError};
use common::row::Value;
use session::Session;

use crate::function::Function;

fn parse(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str(text).ok()
}

fn to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(to_value).collect()),
        serde_json::Value::Object(_) => Value::String(json.to_string()),
    }
}

/// Walks a `$.a.b[0]`-style path segment by segment. Only the subset this
/// server needs is supported: dotted object keys and `[n]` array indexing,
/// no wildcards or slices.
fn navigate<'a>(mut current: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            rest = after_dot;
            let end = rest
                .find(['.', '['])
                .unwrap_or(rest.len());
            let (key, remainder) = rest.split_at(end);
            current = current.as_object()?.get(key)?;
            rest = remainder;
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let end = after_bracket.find(']')?;
            let (index, remainder) = after_bracket.split_at(end);
            let index: usize = index.parse().ok()?;
            current = current.as_array()?.get(index)?;
            rest = &remainder[1..];
        } else {
            return None;
        }
    }
    Some(current)
}

/// `JSON_EXTRACT(json_text, path)`. Returns `NULL` if the document doesn't
/// parse or the path doesn't resolve.
pub struct JsonExtract;
impl Function for JsonExtract {
    fn name(&self) -> &str {
        "JSON_EXTRACT"
    }
    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let text = args[0]
            .as_str()
            .ok_or_else(|| ReError::Error("JSON_EXTRACT: first argument must be a string".into()))?;
        let path = args[1]
            .as_str()
            .ok_or_else(|| ReError::Error("JSON_EXTRACT: path must be a string".into()))?;
        let Some(document) = parse(text) else {
            return Ok(Value::Null);
        };
        Ok(navigate(&document, path).map(to_value).unwrap_or(Value::Null))
    }
}

pub struct JsonValid;
impl Function for JsonValid {
    fn name(&self) -> &str {
        "JSON_VALID"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Bool(false));
        }
        let text = args[0]
            .as_str()
            .ok_or_else(|| ReError::Error("JSON_VALID: argument must be a string".into()))?;
        Ok(Value::Bool(parse(text).is_some()))
    }
}
