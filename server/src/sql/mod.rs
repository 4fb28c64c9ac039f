mod ddl;
mod dml;
mod select;
mod simple;
pub mod translate;

use std::sync::Arc;

use common::err::{CResult, ReError};
use common::row::Row;
use datasource::contract::DataSource;
use session::{QueryContext, Session};
use sqlparser::ast::{ObjectName, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tokio::sync::RwLock as AsyncRwLock;

use crate::state::AppState;

/// Result of running one statement through the dispatcher. The connection
/// loop turns each variant into the matching wire response: a full
/// result set, an OK packet carrying affected-row counts, or a bare OK
/// with nothing else to report.
pub enum SqlOutcome {
    ResultSet { columns: Vec<String>, rows: Vec<Row> },
    Affected { rows_affected: u64, last_insert_id: u64 },
    Empty,
}

impl SqlOutcome {
    pub fn affected(rows_affected: u64) -> Self {
        SqlOutcome::Affected {
            rows_affected,
            last_insert_id: 0,
        }
    }
}

pub(crate) fn object_name_to_string(name: &ObjectName) -> String {
    name.0.iter().map(|ident| ident.value.clone()).collect::<Vec<_>>().join(".")
}

fn first_keyword(sql: &str) -> String {
    sql.trim_start()
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Entry point for every statement a client sends through `COM_QUERY`.
/// `USE`/`SHOW`/`SET`/`UPDATE`/`DELETE` are recognized by their leading
/// keyword and parsed by hand; everything else goes through the full SQL
/// parser. Splitting it this way keeps the parser dependency scoped to
/// the statement shapes this server has actually verified its AST
/// version against.
pub async fn execute(state: &AppState, session: &Session, ctx: &QueryContext, sql: &str) -> CResult<SqlOutcome> {
    let trimmed = sql.trim().trim_end_matches(';');
    if trimmed.is_empty() {
        return Ok(SqlOutcome::Empty);
    }
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }

    match first_keyword(trimmed).as_str() {
        "USE" => simple::use_database(session, trimmed).await,
        "SHOW" => simple::show(state, session, trimmed).await,
        "SET" => simple::set(session, trimmed).await,
        "UPDATE" => dml::update(state, session, ctx, trimmed).await,
        "DELETE" => dml::delete(state, session, ctx, trimmed).await,
        "BEGIN" | "START" => begin_transaction(state, session).await,
        "COMMIT" => end_transaction(session, TransactionEnd::Commit).await,
        "ROLLBACK" => end_transaction(session, TransactionEnd::Rollback).await,
        _ => dispatch_parsed(state, session, ctx, trimmed).await,
    }
}

enum TransactionEnd {
    Commit,
    Rollback,
}

/// Opens an explicit transaction against the session's bound data source.
/// A backend with no `TransactionalDataSource` capability (most file
/// adapters, the KV store) leaves `BEGIN` a no-op, same as MySQL's own
/// handling of storage engines that don't support transactions.
async fn begin_transaction(state: &AppState, session: &Session) -> CResult<SqlOutcome> {
    let handle = resolve_source(state, session)?;
    let guard = handle.read().await;
    let Some(transactional) = guard.as_transactional() else {
        return Ok(SqlOutcome::Empty);
    };
    let txn = transactional.begin_transaction().await?;
    drop(guard);
    session.begin_transaction(txn).await;
    Ok(SqlOutcome::Empty)
}

/// `COMMIT`/`ROLLBACK` with no transaction open is a no-op, matching
/// MySQL's own behavior outside an explicit transaction.
async fn end_transaction(session: &Session, end: TransactionEnd) -> CResult<SqlOutcome> {
    match session.take_transaction().await {
        Some(txn) => {
            match end {
                TransactionEnd::Commit => txn.commit().await?,
                TransactionEnd::Rollback => txn.rollback().await?,
            }
            Ok(SqlOutcome::Empty)
        }
        None => Ok(SqlOutcome::Empty),
    }
}

async fn dispatch_parsed(state: &AppState, session: &Session, ctx: &QueryContext, sql: &str) -> CResult<SqlOutcome> {
    let statements =
        Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| ReError::ParseError(e.to_string()))?;
    let statement = statements
        .into_iter()
        .next()
        .ok_or_else(|| ReError::ParseError("empty statement".to_string()))?;

    match statement {
        Statement::Query(query) => select::select(state, session, ctx, &query).await,
        Statement::CreateTable(create) => ddl::create_table(state, session, ctx, create).await,
        Statement::Drop {
            object_type: sqlparser::ast::ObjectType::Table,
            names,
            if_exists,
            ..
        } => ddl::drop_tables(state, session, ctx, &names, if_exists).await,
        Statement::Insert(insert) => dml::insert(state, session, ctx, insert).await,
        other => Err(ReError::Unsupported(format!("unsupported statement: {other}"))),
    }
}

/// Resolves the data source this session should run against: whatever it
/// bound with `USE`-style binding, falling back to the process default.
/// Returns the owned handle rather than a guard so the caller controls
/// how long the lock is held (a single query vs. a multi-statement
/// transaction).
pub(crate) fn resolve_source(
    state: &AppState,
    session: &Session,
) -> CResult<Arc<AsyncRwLock<Box<dyn DataSource>>>> {
    match session.bound_data_source() {
        Some(name) => state.data_sources.get(&name),
        None => state.data_sources.get_default(),
    }
}
