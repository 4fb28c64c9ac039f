use common::row::{Row, Value};
use crate::filter::{FilterExpr, FilterOp, LogicOp};

/// Evaluates a filter expression tree against one row. Comparisons promote
/// numerics (`Int`/`Float`/`Bool`) through `f64`; otherwise values compare
/// lexically via their text rendering. `LIKE` supports SQL's `%` (any run)
/// and `_` (any one char) wildcards without backslash-escape handling.
pub fn eval(expr: &FilterExpr, row: &Row) -> bool {
    match expr {
        FilterExpr::Node { logic, children } => match logic {
            LogicOp::And => children.iter().all(|c| eval(c, row)),
            LogicOp::Or => children.iter().any(|c| eval(c, row)),
        },
        FilterExpr::Leaf { field, op, value } => {
            let field_value = row.get(field);
            eval_leaf(field_value, op, value)
        }
    }
}

fn eval_leaf(field_value: Option<&Value>, op: &FilterOp, value: &Value) -> bool {
    match op {
        FilterOp::Is => matches_is(field_value, value),
        FilterOp::IsNot => !matches_is(field_value, value),
        FilterOp::In => match value {
            Value::List(items) => field_value.is_some_and(|fv| items.iter().any(|v| values_equal(fv, v))),
            _ => false,
        },
        FilterOp::NotIn => match value {
            Value::List(items) => field_value.is_some_and(|fv| !items.iter().any(|v| values_equal(fv, v))),
            _ => false,
        },
        FilterOp::Like => match (field_value, value) {
            (Some(Value::String(s)), Value::String(pattern)) => like_match(s, pattern),
            (Some(fv), Value::String(pattern)) => like_match(&fv.to_text(), pattern),
            _ => false,
        },
        FilterOp::NotLike => match (field_value, value) {
            (Some(Value::String(s)), Value::String(pattern)) => !like_match(s, pattern),
            (Some(fv), Value::String(pattern)) => !like_match(&fv.to_text(), pattern),
            _ => false,
        },
        _ => {
            let Some(fv) = field_value else { return false };
            compare(fv, value, op)
        }
    }
}

fn matches_is(field_value: Option<&Value>, value: &Value) -> bool {
    match value {
        Value::Null => field_value.map_or(true, |v| v.is_null()),
        other => field_value.is_some_and(|fv| values_equal(fv, other)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a.to_text() == b.to_text()
}

fn compare(a: &Value, b: &Value, op: &FilterOp) -> bool {
    let ordering = if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        x.partial_cmp(&y)
    } else {
        a.to_text().partial_cmp(&b.to_text())
    };
    let Some(ordering) = ordering else { return false };
    match op {
        FilterOp::Eq => ordering.is_eq(),
        FilterOp::Ne => !ordering.is_eq(),
        FilterOp::Lt => ordering.is_lt(),
        FilterOp::Lte => ordering.is_le(),
        FilterOp::Gt => ordering.is_gt(),
        FilterOp::Gte => ordering.is_ge(),
        FilterOp::Like | FilterOp::NotLike | FilterOp::In | FilterOp::NotIn | FilterOp::Is | FilterOp::IsNot => {
            unreachable!()
        }
    }
}

/// `%` matches any run of characters (including none); `_` matches exactly
/// one character. Implemented as a small recursive matcher rather than a
/// regex translation, since MySQL `LIKE` wildcards aren't regex syntax.
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    like_match_impl(&t, &p)
}

fn like_match_impl(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            like_match_impl(text, &pattern[1..])
                || (!text.is_empty() && like_match_impl(&text[1..], pattern))
        }
        Some('_') => !text.is_empty() && like_match_impl(&text[1..], &pattern[1..]),
        Some(c) => text.first() == Some(c) && like_match_impl(&text[1..], &pattern[1..]),
    }
}
