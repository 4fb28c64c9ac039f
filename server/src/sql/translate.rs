use common::err::{CResult, ReError};
use common::row::Value as RowValue;
use datasource::filter::{FilterExpr, FilterOp, LogicOp};
use sqlparser::ast::{BinaryOperator, Expr, Value as SqlValue};

/// Translates a parsed `WHERE` expression into the pushdown filter tree the
/// data-source layer understands. Only the subset of `Expr` that maps onto
/// `FilterExpr` is supported; anything else (subqueries, function calls in
/// predicate position, column-to-column comparisons) is rejected rather than
/// silently dropped, since dropping a predicate would change result
/// semantics.
pub fn translate_where(expr: &Expr) -> CResult<FilterExpr> {
    match expr {
        Expr::BinaryOp { left, op, right } => translate_binary_op(left, op, right),
        Expr::Nested(inner) => translate_where(inner),
        Expr::IsNull(inner) => Ok(FilterExpr::leaf(column_name(inner)?, FilterOp::Is, RowValue::Null)),
        Expr::IsNotNull(inner) => Ok(FilterExpr::leaf(column_name(inner)?, FilterOp::IsNot, RowValue::Null)),
        Expr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => {
            let field = column_name(inner)?;
            let lo = literal_value(low)?;
            let hi = literal_value(high)?;
            if *negated {
                Ok(FilterExpr::or(vec![
                    FilterExpr::leaf(field.clone(), FilterOp::Lt, lo),
                    FilterExpr::leaf(field, FilterOp::Gt, hi),
                ]))
            } else {
                Ok(FilterExpr::and(vec![
                    FilterExpr::leaf(field.clone(), FilterOp::Gte, lo),
                    FilterExpr::leaf(field, FilterOp::Lte, hi),
                ]))
            }
        }
        Expr::InList { expr: inner, list, negated } => {
            let field = column_name(inner)?;
            let values = list.iter().map(literal_value).collect::<CResult<Vec<_>>>()?;
            let op = if *negated { FilterOp::NotIn } else { FilterOp::In };
            Ok(FilterExpr::leaf(field, op, RowValue::List(values)))
        }
        Expr::Like { negated, expr: inner, pattern, .. } => {
            let field = column_name(inner)?;
            let value = literal_value(pattern)?;
            let op = if *negated { FilterOp::NotLike } else { FilterOp::Like };
            Ok(FilterExpr::leaf(field, op, value))
        }
        other => Err(ReError::Unsupported(format!(
            "unsupported WHERE expression: {other}"
        ))),
    }
}

fn translate_binary_op(left: &Expr, op: &BinaryOperator, right: &Expr) -> CResult<FilterExpr> {
    match op {
        BinaryOperator::And => Ok(FilterExpr::and(vec![translate_where(left)?, translate_where(right)?])),
        BinaryOperator::Or => Ok(FilterExpr::or(vec![translate_where(left)?, translate_where(right)?])),
        BinaryOperator::Eq
        | BinaryOperator::NotEq
        | BinaryOperator::Lt
        | BinaryOperator::LtEq
        | BinaryOperator::Gt
        | BinaryOperator::GtEq => {
            let (field, value) = comparison_operands(left, right)?;
            let filter_op = match op {
                BinaryOperator::Eq => FilterOp::Eq,
                BinaryOperator::NotEq => FilterOp::Ne,
                BinaryOperator::Lt => FilterOp::Lt,
                BinaryOperator::LtEq => FilterOp::Lte,
                BinaryOperator::Gt => FilterOp::Gt,
                BinaryOperator::GtEq => FilterOp::Gte,
                _ => unreachable!(),
            };
            Ok(FilterExpr::leaf(field, filter_op, value))
        }
        other => Err(ReError::Unsupported(format!("unsupported operator in WHERE: {other}"))),
    }
}

/// A comparison leaf always has a column on one side and a literal on the
/// other; this server doesn't evaluate column-to-column or function-valued
/// predicates, so either ordering (`col = 1` or `1 = col`) is accepted but
/// `col = other_col` is not.
fn comparison_operands(left: &Expr, right: &Expr) -> CResult<(String, RowValue)> {
    if let Ok(field) = column_name(left) {
        return Ok((field, literal_value(right)?));
    }
    if let Ok(field) = column_name(right) {
        return Ok((field, literal_value(left)?));
    }
    Err(ReError::Unsupported(
        "WHERE comparisons must have a column on one side".to_string(),
    ))
}

fn column_name(expr: &Expr) -> CResult<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => Ok(parts
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default()),
        _ => Err(ReError::Unsupported("expected a column reference".to_string())),
    }
}

/// Converts a literal `Expr::Value` into a row value. Negative numbers
/// arrive as `UnaryOp { op: Minus, expr: Value(Number(..)) }` since
/// sqlparser doesn't fold sign into the literal itself.
fn literal_value(expr: &Expr) -> CResult<RowValue> {
    match expr {
        Expr::Value(v) => sql_value_to_row_value(v),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr: inner,
        } => match literal_value(inner)? {
            RowValue::Int(i) => Ok(RowValue::Int(-i)),
            RowValue::Float(f) => Ok(RowValue::Float(-f)),
            other => Err(ReError::Unsupported(format!("cannot negate {}", other.type_name()))),
        },
        _ => Err(ReError::Unsupported("expected a literal value".to_string())),
    }
}

fn sql_value_to_row_value(value: &SqlValue) -> CResult<RowValue> {
    match value {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(RowValue::Int(i))
            } else {
                n.parse::<f64>()
                    .map(RowValue::Float)
                    .map_err(|_| ReError::ParseError(format!("invalid numeric literal: {n}")))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(RowValue::String(s.clone())),
        SqlValue::Boolean(b) => Ok(RowValue::Bool(*b)),
        SqlValue::Null => Ok(RowValue::Null),
        other => Err(ReError::Unsupported(format!("unsupported literal: {other}"))),
    }
}
