use common::err::CResult;
use common::row::{Row, TableInfo};

use crate::config::DataSourceConfig;
use crate::filter::FilterExpr;

/// Outcome of a raw SQL passthrough (`execute`), for backends that support
/// one: affected-row count and, if the statement produced a result set, the
/// rows themselves.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub rows: Option<Vec<Row>>,
}

/// The contract every storage backend implements. Object-safe so the
/// server can hold a heterogeneous collection of backends behind
/// `Box<dyn DataSource>`.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn connect(&mut self) -> CResult<()>;
    async fn close(&mut self) -> CResult<()>;
    fn is_connected(&self) -> bool;
    fn is_writable(&self) -> bool;
    fn get_config(&self) -> &DataSourceConfig;

    async fn get_tables(&self) -> CResult<Vec<String>>;
    async fn get_table_info(&self, table: &str) -> CResult<TableInfo>;

    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>>;
    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64>;
    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64>;
    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64>;

    async fn create_table(&self, info: &TableInfo) -> CResult<()>;
    async fn drop_table(&self, table: &str) -> CResult<()>;
    async fn truncate_table(&self, table: &str) -> CResult<()>;

    /// Raw SQL passthrough. Optional: backends with no native SQL surface
    /// (e.g. a plain KV store) return `Unsupported`.
    async fn execute(&self, sql: &str) -> CResult<ExecResult>;

    /// Optional capability handle: backends that also implement
    /// `TransactionalDataSource` override this to return `Some(self)`, so
    /// a caller holding only `&dyn DataSource` can still reach
    /// `begin_transaction` without downcasting.
    fn as_transactional(&self) -> Option<&dyn TransactionalDataSource> {
        None
    }
}

/// A backend's transaction handle: the same DML surface as `DataSource`,
/// terminated by `commit` or `rollback`.
#[async_trait::async_trait]
pub trait Transaction: Send + Sync {
    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>>;
    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64>;
    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64>;
    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64>;

    async fn commit(self: Box<Self>) -> CResult<()>;
    async fn rollback(self: Box<Self>) -> CResult<()>;
}

/// Optional capability: backends that support explicit transactions
/// implement this alongside `DataSource`.
#[async_trait::async_trait]
pub trait TransactionalDataSource: DataSource {
    async fn begin_transaction(&self) -> CResult<Box<dyn Transaction>>;
}

/// Optional capability: backends that can push filter evaluation down
/// natively (rather than the executor filtering a full scan) implement
/// this. `filter` returns the requested page plus the total match count,
/// independent of `limit`.
#[async_trait::async_trait]
pub trait FilterableDataSource: DataSource {
    fn supports_pushdown(&self, table: &str) -> bool;

    async fn filter(
        &self,
        table: &str,
        expr: &FilterExpr,
        offset: usize,
        limit: usize,
    ) -> CResult<(Vec<Row>, u64)>;
}
