use chrono::{NaiveDateTime, Utc};

use common::err::{CResult, ReError};
use common::row::Value;
use session::Session;

use crate::function::Function;

fn as_datetime(value: &Value) -> CResult<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::String(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
            })
            .map_err(|_| ReError::Error(format!("invalid datetime literal: {s}"))),
        other => Err(ReError::Error(format!(
            "expected a datetime or date string, got {}",
            other.type_name()
        ))),
    }
}

pub struct Now;
impl Function for Now {
    fn name(&self) -> &str {
        "NOW"
    }
    fn arity(&self) -> Option<usize> {
        Some(0)
    }
    fn eval(&self, _args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        Ok(Value::DateTime(Utc::now().naive_utc()))
    }
}

/// `DATE_FORMAT(datetime, format)`, using `strftime`-style directives.
pub struct DateFormat;
impl Function for DateFormat {
    fn name(&self) -> &str {
        "DATE_FORMAT"
    }
    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() {
            return Ok(Value::Null);
        }
        let dt = as_datetime(&args[0])?;
        let format = args[1]
            .as_str()
            .ok_or_else(|| ReError::Error("DATE_FORMAT: format must be a string".into()))?;
        Ok(Value::String(dt.format(format).to_string()))
    }
}

/// `DATEDIFF(date1, date2)`: whole days between the two dates, `date1 - date2`.
pub struct DateDiff;
impl Function for DateDiff {
    fn name(&self) -> &str {
        "DATEDIFF"
    }
    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn eval(&self, args: &[Value], _session: Option<&Session>) -> CResult<Value> {
        if args[0].is_null() || args[1].is_null() {
            return Ok(Value::Null);
        }
        let a = as_datetime(&args[0])?;
        let b = as_datetime(&args[1])?;
        Ok(Value::Int((a.date() - b.date()).num_days()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn now_returns_a_datetime() {
        assert!(matches!(Now.eval(&[], None).unwrap(), Value::DateTime(_)));
    }

    #[test]
    fn date_format_renders_with_strftime_directives() {
        let args = [Value::String("2024-03-05 10:30:00".into()), Value::String("%Y/%m/%d".into())];
        assert_eq!(DateFormat.eval(&args, None).unwrap(), Value::String("2024/03/05".into()));
    }

    #[test]
    fn datediff_counts_whole_days() {
        let args = [
            Value::String("2024-03-10".into()),
            Value::String("2024-03-01".into()),
        ];
        assert_eq!(DateDiff.eval(&args, None).unwrap(), Value::Int(9));
    }

    #[test]
    fn datediff_with_null_is_null() {
        let args = [Value::Null, Value::String("2024-03-01".into())];
        assert_eq!(DateDiff.eval(&args, None).unwrap(), Value::Null);
    }
}
