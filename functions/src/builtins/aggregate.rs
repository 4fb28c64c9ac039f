use common::err::{CResult, ReError};
use common::row::Value;
use session::Session;

use crate::function::Function;

/// Aggregate functions receive their whole input column as a single
/// `Value::List` argument (the planner/executor materialize the group
/// before calling in), so every aggregate here is `arity() == Some(1)`.
fn column_values(args: &[Value]) -> CResult<&[Value]> {
    match &args[0] {
        Value::List(values) => Ok(values),
        other => Err(ReError::Error(format!(
            "aggregate expected a column of values, got {}",
            other.type_name()
        ))),
    }
}

pub struct Count;
impl Function for Count {
    fn name(&self) -> &str {
        "COUNT"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        let values = column_values(args)?;
        Ok(Value::Int(values.iter().filter(|v| !v.is_null()).count() as i64))
    }
}

pub struct Sum;
impl Function for Sum {
    fn name(&self) -> &str {
        "SUM"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        let values = column_values(args)?;
        let sum: f64 = values.iter().filter_map(Value::as_f64).sum();
        Ok(Value::Float(sum))
    }
}

pub struct Avg;
impl Function for Avg {
    fn name(&self) -> &str {
        "AVG"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        let values = column_values(args)?;
        let numeric: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        if numeric.is_empty() {
            return Ok(Value::Null);
        }
        Ok(Value::Float(numeric.iter().sum::<f64>() / numeric.len() as f64))
    }
}

pub struct Min;
impl Function for Min {
    fn name(&self) -> &str {
        "MIN"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        let values = column_values(args)?;
        Ok(values
            .iter()
            .filter_map(|v| v.as_f64().map(|n| (n, v)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }
}

pub struct Max;
impl Function for Max {
    fn name(&self) -> &str {
        "MAX"
    }
    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        let values = column_values(args)?;
        Ok(values
            .iter()
            .filter_map(|v| v.as_f64().map(|n| (n, v)))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null))
    }
}
