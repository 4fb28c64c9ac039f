use common::err::{CResult, ReError};
use common::row::{ColumnInfo, TableInfo};
use session::{QueryContext, Session};
use sqlparser::ast::{ColumnDef, CreateTable, DataType, ObjectName};

use super::{object_name_to_string, resolve_source, SqlOutcome};
use crate::state::AppState;

/// Maps a parsed column type onto the backend-independent type names
/// `TableInfo` carries. Backends interpret `type_name` themselves; this
/// server doesn't enforce storage-level type constraints beyond what a
/// backend chooses to.
fn sql_type_name(dt: &DataType) -> CResult<&'static str> {
    match dt {
        DataType::Int(_) | DataType::Integer(_) | DataType::BigInt(_) | DataType::SmallInt(_) | DataType::TinyInt(_) => {
            Ok("bigint")
        }
        DataType::Real
        | DataType::Float(_)
        | DataType::Double
        | DataType::DoublePrecision
        | DataType::Numeric(_)
        | DataType::Decimal(_)
        | DataType::Dec(_) => Ok("double"),
        DataType::Boolean => Ok("boolean"),
        DataType::Varchar(_) | DataType::Text | DataType::Char(_) | DataType::CharVarying(_) | DataType::String(_) => {
            Ok("varchar")
        }
        other => Err(ReError::Unsupported(format!("unsupported column type: {other}"))),
    }
}

fn column_info(col: &ColumnDef) -> CResult<ColumnInfo> {
    Ok(ColumnInfo::new(col.name.value.clone(), sql_type_name(&col.data_type)?))
}

pub async fn create_table(
    state: &AppState,
    session: &Session,
    ctx: &QueryContext,
    create: CreateTable,
) -> CResult<SqlOutcome> {
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    let table_name = object_name_to_string(&create.name);
    if create.columns.is_empty() {
        return Err(ReError::Unsupported(
            "CREATE TABLE requires explicit column definitions".to_string(),
        ));
    }
    let columns = create
        .columns
        .iter()
        .map(column_info)
        .collect::<CResult<Vec<_>>>()?;
    let info = TableInfo::new(table_name, columns);
    info.validate().map_err(ReError::ConstraintViolation)?;

    let handle = resolve_source(state, session)?;
    let source = handle.read().await;
    if !source.is_writable() {
        return Err(ReError::ReadOnly("create table".to_string()));
    }
    if ctx.is_canceled() {
        return Err(ReError::Canceled);
    }
    match source.create_table(&info).await {
        Ok(()) => {
            state.query_cache.invalidate_table(&info.name);
            Ok(SqlOutcome::affected(0))
        }
        Err(_) if create.if_not_exists => Ok(SqlOutcome::affected(0)),
        Err(err) => Err(err),
    }
}

pub async fn drop_tables(
    state: &AppState,
    session: &Session,
    ctx: &QueryContext,
    names: &[ObjectName],
    if_exists: bool,
) -> CResult<SqlOutcome> {
    let handle = resolve_source(state, session)?;
    let source = handle.read().await;
    if !source.is_writable() {
        return Err(ReError::ReadOnly("drop table".to_string()));
    }
    for name in names {
        if ctx.is_canceled() {
            return Err(ReError::Canceled);
        }
        let table_name = object_name_to_string(name);
        match source.drop_table(&table_name).await {
            Ok(()) => state.query_cache.invalidate_table(&table_name),
            Err(ReError::TableNotFound(_)) if if_exists => {}
            Err(err) => return Err(err),
        }
    }
    Ok(SqlOutcome::affected(0))
}
