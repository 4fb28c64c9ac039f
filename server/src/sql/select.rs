use std::collections::HashMap;

use common::row::{Row, TableInfo, Value};
use datasource::contract::Transaction;
use datasource::filter::FilterExpr;
use planner::{LogicalPlan, QueryResult};
use session::{QueryContext, Session};
use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, Query, Select, SelectItem, SetExpr,
    TableFactor, Value as SqlValue,
};

use common::err::{CResult, ReError};

use super::translate::translate_where;
use super::{resolve_source, SqlOutcome};
use crate::state::AppState;

const AGGREGATE_NAMES: [&str; 5] = ["COUNT", "SUM", "AVG", "MIN", "MAX"];

/// One item to produce per output row: either a plain column or a call to
/// an aggregate function, keeping the two apart so aggregates can be
/// computed once over the whole (possibly grouped) row set while plain
/// columns are read straight off a representative row.
enum OutputItem {
    Column { field: String, alias: String },
    Wildcard,
    Aggregate { func: String, arg: AggregateArg, alias: String },
}

enum AggregateArg {
    Column(String),
    Star,
}

pub async fn select(state: &AppState, session: &Session, ctx: &QueryContext, query: &Query) -> CResult<SqlOutcome> {
    let sql_text = query.to_string();
    let in_transaction = session.in_transaction().await;
    if !in_transaction {
        if let Some(cached) = state.query_cache.get(&sql_text) {
            return Ok(SqlOutcome::ResultSet {
                columns: cached.columns,
                rows: cached.rows,
            });
        }
    }

    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(ReError::Unsupported("only plain SELECT is supported".to_string()));
    };

    let table = table_name(select)?;
    let handle = resolve_source(state, session)?;
    let guard = handle.read().await;
    let table_info = guard.get_table_info(&table).await?;

    let filter = match &select.selection {
        Some(expr) => Some(translate_where(expr)?),
        None => None,
    };
    record_plan(state, &table, &table_info, filter.clone());

    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let txn_guard = session.transaction_guard().await;
    let mut rows = match txn_guard.as_deref() {
        Some(txn) => txn.query(&table, filter.as_ref()).await?,
        None => guard.query(&table, filter.as_ref()).await?,
    };
    drop(txn_guard);
    drop(guard);

    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }

    let items = output_items(&select.projection, &table_info)?;
    let group_by_fields = group_by_fields(&select.group_by)?;

    let (columns, mut result_rows) = if items.iter().any(|i| matches!(i, OutputItem::Aggregate { .. })) {
        aggregate_rows(state, &items, &group_by_fields, rows)?
    } else {
        project_rows(&items, &table_info, &mut rows);
        (output_column_names(&items, &table_info), rows)
    };

    apply_order_by(query, &mut result_rows);
    apply_limit_offset(query, &mut result_rows)?;

    if !in_transaction {
        state.query_cache.put(
            sql_text,
            QueryResult {
                columns: columns.clone(),
                rows: result_rows.clone(),
                total: result_rows.len() as u64,
            },
        );
    }

    Ok(SqlOutcome::ResultSet {
        columns,
        rows: result_rows,
    })
}

fn table_name(select: &Select) -> CResult<String> {
    let twj = select
        .from
        .first()
        .ok_or_else(|| ReError::Unsupported("SELECT requires a FROM clause".to_string()))?;
    if !twj.joins.is_empty() {
        return Err(ReError::Unsupported("JOINs are not supported".to_string()));
    }
    match &twj.relation {
        TableFactor::Table { name, .. } => Ok(super::object_name_to_string(name)),
        _ => Err(ReError::Unsupported("only plain table references are supported in FROM".to_string())),
    }
}

/// Pushes the filter into a `Scan` node and runs it through the standard
/// rewrite passes purely to record a missing-index recommendation when no
/// matching index is registered; the actual row fetch still goes straight
/// through `DataSource::query`, since there's only ever one table per
/// statement here.
fn record_plan(state: &AppState, table: &str, info: &TableInfo, filter: Option<FilterExpr>) {
    let mut plan = LogicalPlan::scan(table, info);
    if let Some(predicate) = filter {
        plan = LogicalPlan::Filter {
            input: Box::new(plan),
            predicate,
        };
    }
    let plan = planner::optimize(plan);
    if let LogicalPlan::Scan { filter: Some(expr), .. } = &plan {
        let fields = leaf_fields(expr);
        if state.index_manager.find_best_index(table, &fields).is_none() {
            state.info_schema.index_advisor().record_missing_index(table, fields);
        }
    }
}

fn leaf_fields(expr: &FilterExpr) -> Vec<String> {
    match expr {
        FilterExpr::Leaf { field, .. } => vec![field.clone()],
        FilterExpr::Node { children, .. } => children.iter().flat_map(leaf_fields).collect(),
    }
}

fn output_items(projection: &[SelectItem], table_info: &TableInfo) -> CResult<Vec<OutputItem>> {
    let mut items = Vec::new();
    for item in projection {
        match item {
            SelectItem::Wildcard(_) => items.push(OutputItem::Wildcard),
            SelectItem::UnnamedExpr(expr) => items.push(expr_to_output_item(expr, None)?),
            SelectItem::ExprWithAlias { expr, alias } => {
                items.push(expr_to_output_item(expr, Some(alias.value.clone()))?)
            }
            SelectItem::QualifiedWildcard(..) => items.push(OutputItem::Wildcard),
        }
    }
    let _ = table_info;
    Ok(items)
}

fn expr_to_output_item(expr: &Expr, alias: Option<String>) -> CResult<OutputItem> {
    match expr {
        Expr::Identifier(ident) => Ok(OutputItem::Column {
            field: ident.value.clone(),
            alias: alias.unwrap_or_else(|| ident.value.clone()),
        }),
        Expr::CompoundIdentifier(parts) => {
            let field = parts.last().map(|i| i.value.clone()).unwrap_or_default();
            Ok(OutputItem::Column {
                field: field.clone(),
                alias: alias.unwrap_or(field),
            })
        }
        Expr::Function(f) => {
            let name = f.name.to_string().to_ascii_uppercase();
            if !AGGREGATE_NAMES.contains(&name.as_str()) {
                return Err(ReError::Unsupported(format!(
                    "only aggregate functions are supported in the projection: {name}"
                )));
            }
            let arg = aggregate_argument(f)?;
            let default_alias = format!("{name}({})", match &arg {
                AggregateArg::Star => "*".to_string(),
                AggregateArg::Column(c) => c.clone(),
            });
            Ok(OutputItem::Aggregate {
                func: name,
                arg,
                alias: alias.unwrap_or(default_alias),
            })
        }
        other => Err(ReError::Unsupported(format!("unsupported projection expression: {other}"))),
    }
}

fn aggregate_argument(f: &sqlparser::ast::Function) -> CResult<AggregateArg> {
    match &f.args {
        FunctionArguments::List(list) => match list.args.first() {
            Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => Ok(AggregateArg::Star),
            Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(Expr::Identifier(ident)))) => {
                Ok(AggregateArg::Column(ident.value.clone()))
            }
            _ => Err(ReError::Unsupported("aggregate argument must be a column or *".to_string())),
        },
        FunctionArguments::None => Ok(AggregateArg::Star),
        _ => Err(ReError::Unsupported("unsupported aggregate argument form".to_string())),
    }
}

fn output_column_names(items: &[OutputItem], table_info: &TableInfo) -> Vec<String> {
    let mut names = Vec::new();
    for item in items {
        match item {
            OutputItem::Wildcard => names.extend(table_info.columns.iter().map(|c| c.name.clone())),
            OutputItem::Column { alias, .. } => names.push(alias.clone()),
            OutputItem::Aggregate { alias, .. } => names.push(alias.clone()),
        }
    }
    names
}

fn project_rows(items: &[OutputItem], table_info: &TableInfo, rows: &mut Vec<Row>) {
    if items.len() == 1 && matches!(items[0], OutputItem::Wildcard) {
        return;
    }
    for row in rows.iter_mut() {
        let mut projected = Row::new();
        for item in items {
            match item {
                OutputItem::Wildcard => {
                    for col in &table_info.columns {
                        projected.set(col.name.clone(), row.get(&col.name).cloned().unwrap_or(Value::Null));
                    }
                }
                OutputItem::Column { field, alias } => {
                    projected.set(alias.clone(), row.get(field).cloned().unwrap_or(Value::Null));
                }
                OutputItem::Aggregate { .. } => unreachable!("aggregates are handled separately"),
            }
        }
        *row = projected;
    }
}

fn group_by_fields(group_by: &GroupByExpr) -> CResult<Vec<String>> {
    match group_by {
        GroupByExpr::Expressions(exprs, _) => exprs
            .iter()
            .map(|e| match e {
                Expr::Identifier(ident) => Ok(ident.value.clone()),
                other => Err(ReError::Unsupported(format!("unsupported GROUP BY expression: {other}"))),
            })
            .collect(),
        GroupByExpr::All(_) => Err(ReError::Unsupported("GROUP BY ALL is not supported".to_string())),
    }
}

fn aggregate_rows(
    state: &AppState,
    items: &[OutputItem],
    group_by_fields: &[String],
    rows: Vec<Row>,
) -> CResult<(Vec<String>, Vec<Row>)> {
    let mut groups: Vec<(Vec<Value>, Vec<Row>)> = Vec::new();
    if group_by_fields.is_empty() {
        groups.push((Vec::new(), rows));
    } else {
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        for row in rows {
            let key: Vec<Value> = group_by_fields.iter().map(|f| row.get(f).cloned().unwrap_or(Value::Null)).collect();
            let key_text: Vec<String> = key.iter().map(|v| v.to_text()).collect();
            match index.get(&key_text) {
                Some(&i) => groups[i].1.push(row),
                None => {
                    index.insert(key_text, groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }
    }

    let mut column_names = Vec::new();
    for item in items {
        match item {
            OutputItem::Column { alias, .. } => column_names.push(alias.clone()),
            OutputItem::Aggregate { alias, .. } => column_names.push(alias.clone()),
            OutputItem::Wildcard => {
                return Err(ReError::Unsupported("wildcard projection cannot be combined with aggregates".to_string()))
            }
        }
    }

    let mut out_rows = Vec::with_capacity(groups.len());
    for (key, group_rows) in &groups {
        let mut out = Row::new();
        let mut key_iter = group_by_fields.iter().zip(key.iter());
        for item in items {
            match item {
                OutputItem::Column { field, alias } => {
                    let value = key_iter
                        .clone()
                        .find(|(f, _)| *f == field)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| {
                            ReError::Unsupported(format!("column '{field}' must appear in GROUP BY"))
                        })?;
                    out.set(alias.clone(), value);
                }
                OutputItem::Aggregate { func, arg, alias } => {
                    let values: Vec<Value> = match arg {
                        AggregateArg::Star => group_rows.iter().map(|_| Value::Int(1)).collect(),
                        AggregateArg::Column(col) => {
                            group_rows.iter().filter_map(|r| r.get(col).cloned()).collect()
                        }
                    };
                    let result = state.functions.call(func, &[Value::List(values)], None)?;
                    out.set(alias.clone(), result);
                }
                OutputItem::Wildcard => unreachable!(),
            }
        }
        out_rows.push(out);
    }
    Ok((column_names, out_rows))
}

fn apply_order_by(query: &Query, rows: &mut [Row]) {
    let Some(order_by) = &query.order_by else { return };
    let items: Vec<(String, bool)> = order_by
        .exprs
        .iter()
        .filter_map(|item| match &item.expr {
            Expr::Identifier(ident) => Some((ident.value.clone(), item.asc.unwrap_or(true))),
            _ => None,
        })
        .collect();
    rows.sort_by(|a, b| {
        for (field, asc) in &items {
            let av = a.get(field).cloned().unwrap_or(Value::Null);
            let bv = b.get(field).cloned().unwrap_or(Value::Null);
            let ordering = compare_values(&av, &bv);
            let ordering = if *asc { ordering } else { ordering.reverse() };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal);
    }
    a.to_text().cmp(&b.to_text())
}

fn apply_limit_offset(query: &Query, rows: &mut Vec<Row>) -> CResult<()> {
    let offset = match &query.offset {
        Some(o) => literal_usize(&o.value)?,
        None => 0,
    };
    if offset > 0 {
        if offset >= rows.len() {
            rows.clear();
        } else {
            rows.drain(..offset);
        }
    }
    if let Some(limit_expr) = &query.limit {
        let limit = literal_usize(limit_expr)?;
        rows.truncate(limit);
    }
    Ok(())
}

fn literal_usize(expr: &Expr) -> CResult<usize> {
    match expr {
        Expr::Value(SqlValue::Number(n, _)) => n
            .parse::<usize>()
            .map_err(|_| ReError::ParseError(format!("invalid LIMIT/OFFSET value: {n}"))),
        other => Err(ReError::Unsupported(format!("unsupported LIMIT/OFFSET expression: {other}"))),
    }
}

#[cfg(test)]
mod test {
    use common::row::ColumnInfo;
    use sqlparser::ast::Statement;
    use sqlparser::dialect::MySqlDialect;
    use sqlparser::parser::Parser;

    use super::*;

    fn parse_query(sql: &str) -> Query {
        let stmts = Parser::parse_sql(&MySqlDialect {}, sql).unwrap();
        let Statement::Query(query) = stmts.into_iter().next().unwrap() else {
            panic!("expected a query")
        };
        *query
    }

    fn sample_table() -> TableInfo {
        TableInfo::new(
            "accounts",
            vec![
                ColumnInfo::new("id", "bigint").primary_key(),
                ColumnInfo::new("region", "text"),
                ColumnInfo::new("balance", "bigint"),
            ],
        )
    }

    fn row(id: i64, region: &str, balance: i64) -> Row {
        let mut r = Row::new();
        r.set("id", Value::Int(id));
        r.set("region", Value::String(region.to_string()));
        r.set("balance", Value::Int(balance));
        r
    }

    #[test]
    fn wildcard_output_names_cover_every_column() {
        let table_info = sample_table();
        let items = vec![OutputItem::Wildcard];
        assert_eq!(output_column_names(&items, &table_info), vec!["id", "region", "balance"]);
    }

    #[test]
    fn project_rows_applies_aliases_and_drops_other_columns() {
        let table_info = sample_table();
        let items = vec![OutputItem::Column {
            field: "region".to_string(),
            alias: "r".to_string(),
        }];
        let mut rows = vec![row(1, "west", 10)];
        project_rows(&items, &table_info, &mut rows);
        assert_eq!(rows[0].get("r"), Some(&Value::String("west".to_string())));
        assert_eq!(rows[0].get("region"), None);
    }

    #[test]
    fn order_by_sorts_numeric_fields_descending() {
        let query = parse_query("SELECT * FROM accounts ORDER BY balance DESC");
        let mut rows = vec![row(1, "west", 10), row(2, "east", 50), row(3, "north", 30)];
        apply_order_by(&query, &mut rows);
        let balances: Vec<i64> = rows
            .iter()
            .map(|r| match r.get("balance") {
                Some(Value::Int(i)) => *i,
                _ => 0,
            })
            .collect();
        assert_eq!(balances, vec![50, 30, 10]);
    }

    #[test]
    fn limit_and_offset_slice_the_row_set() {
        let query = parse_query("SELECT * FROM accounts LIMIT 1 OFFSET 1");
        let mut rows = vec![row(1, "west", 10), row(2, "east", 50), row(3, "north", 30)];
        apply_limit_offset(&query, &mut rows).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(2)));
    }

    #[test]
    fn group_by_rejects_non_identifier_expressions() {
        let query = parse_query("SELECT region FROM accounts GROUP BY region + 1");
        let SetExpr::Select(select) = query.body.as_ref() else { panic!("expected a SELECT") };
        assert!(group_by_fields(&select.group_by).is_err());
    }
}
