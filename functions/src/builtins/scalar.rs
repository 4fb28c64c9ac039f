use common::err::{CResult, ReError};
use common::row::Value;
use session::Session;

use crate::function::Function;

fn to_text(value: &Value) -> String {
    value.to_text()
}

pub struct Upper;
impl Function for Upper {
    fn name(&self) -> &str {
        "UPPER"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::String(to_text(&args[0]).to_uppercase()))
    }
}

pub struct Lower;
impl Function for Lower {
    fn name(&self) -> &str {
        "LOWER"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::String(to_text(&args[0]).to_lowercase()))
    }
}

pub struct Length;
impl Function for Length {
    fn name(&self) -> &str {
        "LENGTH"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Int(to_text(&args[0]).len() as i64))
    }
}

/// Variadic: concatenates every argument's text rendering. Returns `NULL`
/// if any argument is `NULL`, matching MySQL's `CONCAT` semantics.
pub struct Concat;
impl Function for Concat {
    fn name(&self) -> &str {
        "CONCAT"
    }
    fn arity(&self) -> Option<usize> {
        None
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args.iter().any(Value::is_null) {
            return Ok(Value::Null);
        }
        Ok(Value::String(args.iter().map(to_text).collect()))
    }
}

/// `SUBSTRING(str, pos)` or `SUBSTRING(str, pos, len)`. `pos` is 1-based;
/// a negative `pos` counts from the end of the string, per MySQL.
pub struct Substring;
impl Function for Substring {
    fn name(&self) -> &str {
        "SUBSTRING"
    }
    fn arity(&self) -> Option<usize> {
        None
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args.len() != 2 && args.len() != 3 {
            return Err(ReError::Error("SUBSTRING: expected 2 or 3 arguments".into()));
        }
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let text: Vec<char> = to_text(&args[0]).chars().collect();
        let pos = args[1]
            .as_f64()
            .ok_or_else(|| ReError::Error("SUBSTRING: pos must be numeric".into()))? as i64;
        let start: usize = if pos > 0 {
            (pos - 1) as usize
        } else if pos < 0 {
            text.len().saturating_sub((-pos) as usize)
        } else {
            0
        };
        let start = start.min(text.len());
        let end = match args.get(2) {
            Some(len) => {
                let len = len.as_f64().unwrap_or(0.0).max(0.0) as usize;
                (start + len).min(text.len())
            }
            None => text.len(),
        };
        Ok(Value::String(text[start..end].iter().collect()))
    }
}

/// Variadic: the first non-null argument, or `NULL` if every argument is.
pub struct Coalesce;
impl Function for Coalesce {
    fn name(&self) -> &str {
        "COALESCE"
    }
    fn arity(&self) -> Option<usize> {
        None
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
    }
}

pub struct Abs;
impl Function for Abs {
    fn name(&self) -> &str {
        "ABS"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let n = args[0]
            .as_f64()
            .ok_or_else(|| ReError::Error("ABS: argument must be numeric".into()))?;
        match args[0] {
            Value::Int(_) => Ok(Value::Int(n.abs() as i64)),
            _ => Ok(Value::Float(n.abs())),
        }
    }
}

/// `ROUND(n)` or `ROUND(n, decimals)`.
pub struct Round;
impl Function for Round {
    fn name(&self) -> &str {
        "ROUND"
    }
    fn arity(&self) -> Option<usize> {
        None
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args.is_empty() || args.len() > 2 {
            return Err(ReError::Error("ROUND: expected 1 or 2 arguments".into()));
        }
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let n = args[0]
            .as_f64()
            .ok_or_else(|| ReError::Error("ROUND: argument must be numeric".into()))?;
        let decimals = match args.get(1) {
            Some(d) => d.as_f64().unwrap_or(0.0) as i32,
            None => 0,
        };
        let factor = 10f64.powi(decimals);
        Ok(Value::Float((n * factor).round() / factor))
    }
}

/// Reads the calling session's current database, per the `USE`/
/// `DATABASE()` interaction this server exposes. Returns `NULL` with no
/// session attached or no database selected.
pub struct Database;
impl Function for Database {
    fn name(&self) -> &str {
        "DATABASE"
    }
    fn arity(&self) -> Option<usize> {
        Some(0)
    }
    fn eval(&self, _args: &[Value], session: Option<&Session>) -> CResult<Value> {
        Ok(session
            .and_then(Session::current_database)
            .map(Value::String)
            .unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn upper_and_lower_roundtrip() {
        assert_eq!(Upper.eval(&[Value::String("hi".into())], None).unwrap(), Value::String("HI".into()));
        assert_eq!(Lower.eval(&[Value::String("HI".into())], None).unwrap(), Value::String("hi".into()));
    }

    #[test]
    fn concat_short_circuits_on_null() {
        assert_eq!(Concat.eval(&[Value::String("a".into()), Value::Null], None).unwrap(), Value::Null);
        assert_eq!(
            Concat.eval(&[Value::String("a".into()), Value::String("b".into())], None).unwrap(),
            Value::String("ab".into())
        );
    }

    #[test]
    fn substring_handles_negative_position() {
        let result = Substring
            .eval(&[Value::String("hello".into()), Value::Int(-3)], None)
            .unwrap();
        assert_eq!(result, Value::String("llo".into()));
    }

    #[test]
    fn coalesce_returns_first_non_null() {
        let result = Coalesce.eval(&[Value::Null, Value::Null, Value::Int(5)], None).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn round_respects_decimal_places() {
        let result = Round.eval(&[Value::Float(3.14159), Value::Int(2)], None).unwrap();
        assert_eq!(result, Value::Float(3.14));
    }

    #[test]
    fn database_reads_session_current_database() {
        let session = Session::new(1, "root", "localhost");
        session.use_database("test");
        let result = Database.eval(&[], Some(&session)).unwrap();
        assert_eq!(result, Value::String("test".into()));
    }

    #[test]
    fn database_with_no_session_is_null() {
        assert_eq!(Database.eval(&[], None).unwrap(), Value::Null);
    }
}
