use std::sync::Arc;

use common::err::{CResult, ReError};
use common::row::{Row, TableInfo};
use datasource::{DataSource, DataSourceConfig, ExecResult, FilterExpr, FilterableDataSource};
use datasource::contract::{Transaction, TransactionalDataSource};

use crate::engine::MvccEngine;
use crate::txn::MvccTransaction;
use datasource::filter_eval;

/// Sentinel connection scope used when the generic `DataSource` surface is
/// driven directly (no session attached) — only regular tables are ever
/// visible under it, since no session creates temporary tables at id 0.
const NO_SESSION_SCOPE: u32 = 0;

/// Adapts `MvccEngine` to the generic data-source contract so it can be
/// registered with a `FactoryRegistry`/`DataSourceManager` like any other
/// backend. The engine lives behind an `Arc` so a transaction handle
/// (`begin_transaction`) can share it without borrowing from `&self`.
pub struct MvccDataSource {
    config: DataSourceConfig,
    engine: Arc<MvccEngine>,
    connected: bool,
}

impl MvccDataSource {
    pub fn new(config: DataSourceConfig) -> Self {
        Self {
            config,
            engine: Arc::new(MvccEngine::new()),
            connected: false,
        }
    }

    pub fn engine(&self) -> &MvccEngine {
        self.engine.as_ref()
    }
}

#[async_trait::async_trait]
impl DataSource for MvccDataSource {
    async fn connect(&mut self) -> CResult<()> {
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> CResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_writable(&self) -> bool {
        self.config.writable
    }

    fn get_config(&self) -> &DataSourceConfig {
        &self.config
    }

    async fn get_tables(&self) -> CResult<Vec<String>> {
        Ok(self.engine.get_tables())
    }

    async fn get_table_info(&self, table: &str) -> CResult<TableInfo> {
        Ok(self.engine.resolve(NO_SESSION_SCOPE, table)?.info())
    }

    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let rows = handle.scan(snapshot).into_iter().map(|(_, row)| row);
        Ok(match filter {
            Some(expr) => rows.filter(|row| filter_eval::eval(expr, row)).collect(),
            None => rows.collect(),
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("insert into {table}")));
        }
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let mut count = 0u64;
        for row in rows {
            handle.insert(&self.engine.txn, row)?;
            count += 1;
        }
        Ok(count)
    }

    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("update {table}")));
        }
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let mut count = 0u64;
        for (row_id, row) in handle.scan(snapshot) {
            let matches = filter.map_or(true, |expr| filter_eval::eval(expr, &row));
            if !matches {
                continue;
            }
            let mut merged = row;
            for (name, value) in changes.iter() {
                merged.set(name, value.clone());
            }
            handle.update_row(&self.engine.txn, row_id, merged)?;
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("delete from {table}")));
        }
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let mut count = 0u64;
        for (row_id, row) in handle.scan(snapshot) {
            let matches = filter.map_or(true, |expr| filter_eval::eval(expr, &row));
            if matches {
                handle.delete_row(&self.engine.txn, row_id)?;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn create_table(&self, info: &TableInfo) -> CResult<()> {
        self.engine.create_table(info.clone())
    }

    async fn drop_table(&self, table: &str) -> CResult<()> {
        self.engine.drop_table(table)
    }

    async fn truncate_table(&self, table: &str) -> CResult<()> {
        self.engine.truncate_table(NO_SESSION_SCOPE, table, false)
    }

    async fn execute(&self, _sql: &str) -> CResult<ExecResult> {
        Err(ReError::Unsupported(
            "raw SQL passthrough: route through the planner instead".into(),
        ))
    }

    fn as_transactional(&self) -> Option<&dyn TransactionalDataSource> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl FilterableDataSource for MvccDataSource {
    fn supports_pushdown(&self, table: &str) -> bool {
        self.engine.resolve(NO_SESSION_SCOPE, table).is_ok()
    }

    async fn filter(
        &self,
        table: &str,
        expr: &FilterExpr,
        offset: usize,
        limit: usize,
    ) -> CResult<(Vec<Row>, u64)> {
        let handle = self.engine.resolve(NO_SESSION_SCOPE, table)?;
        let snapshot = self.engine.txn.read_snapshot();
        let matching: Vec<Row> = handle
            .scan(snapshot)
            .into_iter()
            .map(|(_, row)| row)
            .filter(|row| filter_eval::eval(expr, row))
            .collect();
        let total = matching.len() as u64;
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}

#[async_trait::async_trait]
impl TransactionalDataSource for MvccDataSource {
    async fn begin_transaction(&self) -> CResult<Box<dyn Transaction>> {
        Ok(Box::new(MvccTransaction::new(self.engine.clone(), self.is_writable())))
    }
}

#[cfg(test)]
mod test {
    use common::row::{ColumnInfo, Value};
    use datasource::{FilterOp, LogicOp};

    use super::*;

    fn config() -> DataSourceConfig {
        DataSourceConfig::new("mvcc", "primary")
    }

    fn users() -> TableInfo {
        TableInfo::new(
            "users",
            vec![
                ColumnInfo::new("id", "bigint").primary_key().auto_increment(),
                ColumnInfo::new("name", "varchar"),
            ],
        )
    }

    #[tokio::test]
    async fn insert_then_query_round_trips() {
        let source = MvccDataSource::new(config());
        source.create_table(&users()).await.unwrap();
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        source.insert("users", vec![row]).await.unwrap();
        let rows = source.query("users", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::String("ada".into())));
    }

    #[tokio::test]
    async fn filter_returns_page_and_total_count() {
        let source = MvccDataSource::new(config());
        source.create_table(&users()).await.unwrap();
        for name in ["a", "b", "c"] {
            let mut row = Row::new();
            row.set("name", Value::String(name.into()));
            source.insert("users", vec![row]).await.unwrap();
        }
        let expr = FilterExpr::Node {
            logic: LogicOp::Or,
            children: vec![
                FilterExpr::leaf("name", FilterOp::Eq, Value::String("a".into())),
                FilterExpr::leaf("name", FilterOp::Eq, Value::String("b".into())),
            ],
        };
        let (page, total) = source.filter("users", &expr, 0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn read_only_source_rejects_writes() {
        let mut cfg = config();
        cfg.writable = false;
        let source = MvccDataSource::new(cfg);
        source.create_table(&users()).await.unwrap();
        let err = source.insert("users", vec![Row::new()]).await.unwrap_err();
        assert!(matches!(err, ReError::ReadOnly(_)));
    }

    #[tokio::test]
    async fn a_transaction_commits_a_write_the_plain_data_source_then_sees() {
        let source = MvccDataSource::new(config());
        source.create_table(&users()).await.unwrap();
        let txn = source.as_transactional().unwrap().begin_transaction().await.unwrap();
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        txn.insert("users", vec![row]).await.unwrap();
        txn.commit().await.unwrap();

        let rows = source.query("users", None).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn a_rolled_back_transaction_leaves_no_trace() {
        let source = MvccDataSource::new(config());
        source.create_table(&users()).await.unwrap();
        let txn = source.as_transactional().unwrap().begin_transaction().await.unwrap();
        let mut row = Row::new();
        row.set("name", Value::String("ada".into()));
        txn.insert("users", vec![row]).await.unwrap();
        txn.rollback().await.unwrap();

        assert!(source.query("users", None).await.unwrap().is_empty());
    }
}
