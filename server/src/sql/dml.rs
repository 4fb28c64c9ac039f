use common::err::{CResult, ReError};
use common::row::{Row, Value as RowValue};
use datasource::contract::Transaction;
use session::{QueryContext, Session};
use sqlparser::ast::{Insert, SetExpr};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::translate::translate_where;
use super::{object_name_to_string, resolve_source, SqlOutcome};
use crate::state::AppState;

pub async fn insert(state: &AppState, session: &Session, ctx: &QueryContext, insert: Insert) -> CResult<SqlOutcome> {
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let table = object_name_to_string(&insert.table_name);
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();

    let source_query = insert
        .source
        .ok_or_else(|| ReError::Unsupported("INSERT requires VALUES or SELECT".to_string()))?;
    let SetExpr::Values(values) = *source_query.body else {
        return Err(ReError::Unsupported("only INSERT ... VALUES is supported".to_string()));
    };

    let handle = resolve_source(state, session)?;
    let guard = handle.read().await;
    if !guard.is_writable() {
        return Err(ReError::ReadOnly("insert".to_string()));
    }

    let target_columns = if columns.is_empty() {
        let info = guard.get_table_info(&table).await?;
        info.columns.iter().map(|c| c.name.clone()).collect()
    } else {
        columns
    };

    let mut rows = Vec::with_capacity(values.rows.len());
    for value_row in &values.rows {
        if value_row.len() != target_columns.len() {
            return Err(ReError::Unsupported(format!(
                "INSERT has {} values but {} columns",
                value_row.len(),
                target_columns.len()
            )));
        }
        let mut row = Row::new();
        for (name, expr) in target_columns.iter().zip(value_row.iter()) {
            row.set(name.clone(), expr_to_value(expr)?);
        }
        rows.push(row);
    }

    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let txn_guard = session.transaction_guard().await;
    let affected = match txn_guard.as_deref() {
        Some(txn) => txn.insert(&table, rows).await?,
        None => guard.insert(&table, rows).await?,
    };
    drop(txn_guard);
    state.query_cache.invalidate_table(&table);
    Ok(SqlOutcome::affected(affected))
}

fn expr_to_value(expr: &sqlparser::ast::Expr) -> CResult<RowValue> {
    use sqlparser::ast::{Expr, UnaryOperator, Value as SqlValue};
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(RowValue::Int(i))
            } else {
                n.parse::<f64>()
                    .map(RowValue::Float)
                    .map_err(|_| ReError::ParseError(format!("invalid numeric literal: {n}")))
            }
        }
        Expr::Value(SqlValue::SingleQuotedString(s)) | Expr::Value(SqlValue::DoubleQuotedString(s)) => {
            Ok(RowValue::String(s.clone()))
        }
        Expr::Value(SqlValue::Boolean(b)) => Ok(RowValue::Bool(*b)),
        Expr::Value(SqlValue::Null) => Ok(RowValue::Null),
        Expr::UnaryOp { op: UnaryOperator::Minus, expr: inner } => match expr_to_value(inner)? {
            RowValue::Int(i) => Ok(RowValue::Int(-i)),
            RowValue::Float(f) => Ok(RowValue::Float(-f)),
            other => Err(ReError::Unsupported(format!("cannot negate {}", other.type_name()))),
        },
        other => Err(ReError::Unsupported(format!("unsupported value in INSERT: {other}"))),
    }
}

/// Parses `<text>` as `SELECT <text>` and pulls out the lone projected
/// expression, a cheap way to reuse the full expression grammar for a
/// fragment without depending on `Parser`'s lower-level entry points.
fn parse_value_fragment(text: &str) -> CResult<sqlparser::ast::Expr> {
    let wrapped = format!("SELECT {text}");
    let statements =
        Parser::parse_sql(&MySqlDialect {}, &wrapped).map_err(|e| ReError::ParseError(e.to_string()))?;
    let Some(sqlparser::ast::Statement::Query(query)) = statements.into_iter().next() else {
        return Err(ReError::ParseError(format!("invalid expression: {text}")));
    };
    let SetExpr::Select(select) = *query.body else {
        return Err(ReError::ParseError(format!("invalid expression: {text}")));
    };
    let item = select
        .projection
        .into_iter()
        .next()
        .ok_or_else(|| ReError::ParseError(format!("invalid expression: {text}")))?;
    match item {
        sqlparser::ast::SelectItem::UnnamedExpr(e) | sqlparser::ast::SelectItem::ExprWithAlias { expr: e, .. } => Ok(e),
        _ => Err(ReError::ParseError(format!("invalid expression: {text}"))),
    }
}

fn parse_where_fragment(text: &str) -> CResult<sqlparser::ast::Expr> {
    let wrapped = format!("SELECT * FROM t WHERE {text}");
    let statements =
        Parser::parse_sql(&MySqlDialect {}, &wrapped).map_err(|e| ReError::ParseError(e.to_string()))?;
    let Some(sqlparser::ast::Statement::Query(query)) = statements.into_iter().next() else {
        return Err(ReError::ParseError(format!("invalid WHERE clause: {text}")));
    };
    let SetExpr::Select(select) = *query.body else {
        return Err(ReError::ParseError(format!("invalid WHERE clause: {text}")));
    };
    select
        .selection
        .ok_or_else(|| ReError::ParseError(format!("invalid WHERE clause: {text}")))
}

/// Splits `s` on top-level occurrences of `sep`, skipping anything inside
/// single/double quotes or parentheses so a literal like `'a, b'` or a
/// function call `f(x, y)` isn't split in the middle.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    for c in s.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                _ if c == sep && depth == 0 => {
                    parts.push(current.trim().to_string());
                    current = String::new();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Finds the byte offset of a top-level keyword (`SET`, `WHERE`), case
/// insensitively, skipping matches inside quotes or parens the same way
/// `split_top_level` does.
fn find_keyword(s: &str, keyword: &str) -> Option<usize> {
    let upper = s.to_ascii_uppercase();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let bytes = s.as_bytes();
    let kw = keyword.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ if depth == 0
                    && upper.as_bytes()[i..].starts_with(kw)
                    && (i == 0 || bytes[i - 1].is_ascii_whitespace())
                    && bytes.get(i + kw.len()).map_or(true, |b| b.is_ascii_whitespace()) =>
                {
                    return Some(i);
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Hand-rolled `UPDATE table SET col = expr, ... [WHERE ...]`. Not routed
/// through the full SQL parser: this server only ever parses a fragment
/// of sqlparser's grammar it has verified the AST shape for, and
/// `Statement::Update`'s assignment-target shape differs across
/// sqlparser versions in ways not worth pinning down for one statement
/// kind.
pub async fn update(state: &AppState, session: &Session, ctx: &QueryContext, sql: &str) -> CResult<SqlOutcome> {
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let rest = sql[6..].trim(); // strip "UPDATE"
    let set_at = find_keyword(rest, "SET").ok_or_else(|| ReError::ParseError("UPDATE missing SET".to_string()))?;
    let table = rest[..set_at].trim().to_string();
    let after_set = rest[set_at + 3..].trim();

    let (assignments_text, where_text) = match find_keyword(after_set, "WHERE") {
        Some(pos) => (after_set[..pos].trim(), Some(after_set[pos + 5..].trim())),
        None => (after_set, None),
    };

    let mut changes = Row::new();
    for assignment in split_top_level(assignments_text, ',') {
        let (col, expr_text) = assignment
            .split_once('=')
            .ok_or_else(|| ReError::ParseError(format!("invalid SET clause: {assignment}")))?;
        let expr = parse_value_fragment(expr_text.trim())?;
        changes.set(col.trim().to_string(), expr_to_value(&expr)?);
    }
    if changes.is_empty() {
        return Err(ReError::ParseError("UPDATE requires at least one assignment".to_string()));
    }

    let filter = match where_text {
        Some(text) if !text.is_empty() => Some(translate_where(&parse_where_fragment(text)?)?),
        _ => None,
    };

    let handle = resolve_source(state, session)?;
    let guard = handle.read().await;
    if !guard.is_writable() {
        return Err(ReError::ReadOnly("update".to_string()));
    }
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let txn_guard = session.transaction_guard().await;
    let affected = match txn_guard.as_deref() {
        Some(txn) => txn.update(&table, filter.as_ref(), changes).await?,
        None => guard.update(&table, filter.as_ref(), changes).await?,
    };
    drop(txn_guard);
    state.query_cache.invalidate_table(&table);
    Ok(SqlOutcome::affected(affected))
}

/// Hand-rolled `DELETE FROM table [WHERE ...]`.
pub async fn delete(state: &AppState, session: &Session, ctx: &QueryContext, sql: &str) -> CResult<SqlOutcome> {
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let rest = sql[6..].trim(); // strip "DELETE"
    let rest = rest.strip_prefix("FROM").or_else(|| rest.strip_prefix("from")).unwrap_or(rest).trim();

    let (table_text, where_text) = match find_keyword(rest, "WHERE") {
        Some(pos) => (rest[..pos].trim(), Some(rest[pos + 5..].trim())),
        None => (rest, None),
    };
    let table = table_text.to_string();
    if table.is_empty() {
        return Err(ReError::ParseError("DELETE requires a table name".to_string()));
    }

    let filter = match where_text {
        Some(text) if !text.is_empty() => Some(translate_where(&parse_where_fragment(text)?)?),
        _ => None,
    };

    let handle = resolve_source(state, session)?;
    let guard = handle.read().await;
    if !guard.is_writable() {
        return Err(ReError::ReadOnly("delete".to_string()));
    }
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let txn_guard = session.transaction_guard().await;
    let affected = match txn_guard.as_deref() {
        Some(txn) => txn.delete(&table, filter.as_ref()).await?,
        None => guard.delete(&table, filter.as_ref()).await?,
    };
    drop(txn_guard);
    state.query_cache.invalidate_table(&table);
    Ok(SqlOutcome::affected(affected))
}
