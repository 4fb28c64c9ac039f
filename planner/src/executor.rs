use std::sync::Arc;

use common::err::{CResult, ReError};
use common::row::Row;
use datasource::contract::DataSource;
use session::QueryContext;

use crate::node::LogicalPlan;

/// Rows are pulled in batches of this size; a node that produces fewer
/// than a full batch has reached the end of its input.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Lazy pull-based interface every physical operator implements. `open`
/// is called once before the first `next`; `close` releases any resources
/// and is called exactly once, even if `next` returned an error.
#[async_trait::async_trait]
pub trait PhysicalOp: Send {
    async fn open(&mut self) -> CResult<()>;
    async fn next(&mut self, ctx: &QueryContext) -> CResult<Option<Vec<Row>>>;
    async fn close(&mut self) -> CResult<()>;
}

/// Scans one table through a `DataSource`, applying a pushed-down filter
/// if the plan carried one, and yields its rows in `DEFAULT_BATCH_SIZE`
/// chunks.
pub struct ScanOp {
    source: Arc<dyn DataSource>,
    table: String,
    filter: Option<datasource::filter::FilterExpr>,
    buffer: Vec<Row>,
    cursor: usize,
    loaded: bool,
}

impl ScanOp {
    pub fn new(
        source: Arc<dyn DataSource>,
        table: impl Into<String>,
        filter: Option<datasource::filter::FilterExpr>,
    ) -> Self {
        Self {
            source,
            table: table.into(),
            filter,
            buffer: Vec::new(),
            cursor: 0,
            loaded: false,
        }
    }
}

#[async_trait::async_trait]
impl PhysicalOp for ScanOp {
    async fn open(&mut self) -> CResult<()> {
        self.buffer = self.source.query(&self.table, self.filter.as_ref()).await?;
        self.cursor = 0;
        self.loaded = true;
        Ok(())
    }

    async fn next(&mut self, ctx: &QueryContext) -> CResult<Option<Vec<Row>>> {
        if ctx.is_canceled() {
            return Err(ReError::Canceled);
        }
        if !self.loaded || self.cursor >= self.buffer.len() {
            return Ok(None);
        }
        let end = (self.cursor + DEFAULT_BATCH_SIZE).min(self.buffer.len());
        let batch = self.buffer[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Some(batch))
    }

    async fn close(&mut self) -> CResult<()> {
        self.buffer.clear();
        Ok(())
    }
}

/// Filters each batch pulled from `input` against `predicate`, re-pulling
/// from `input` whenever a batch filters down to nothing so the caller
/// never mistakes "this batch was empty" for "the input is exhausted".
pub struct FilterOp {
    input: Box<dyn PhysicalOp>,
    predicate: datasource::filter::FilterExpr,
}

impl FilterOp {
    pub fn new(input: Box<dyn PhysicalOp>, predicate: datasource::filter::FilterExpr) -> Self {
        Self { input, predicate }
    }
}

#[async_trait::async_trait]
impl PhysicalOp for FilterOp {
    async fn open(&mut self) -> CResult<()> {
        self.input.open().await
    }

    async fn next(&mut self, ctx: &QueryContext) -> CResult<Option<Vec<Row>>> {
        loop {
            if ctx.is_canceled() {
                return Err(ReError::Canceled);
            }
            match self.input.next(ctx).await? {
                None => return Ok(None),
                Some(batch) => {
                    let filtered: Vec<Row> = batch
                        .into_iter()
                        .filter(|row| datasource::filter_eval::eval(&self.predicate, row))
                        .collect();
                    if !filtered.is_empty() {
                        return Ok(Some(filtered));
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> CResult<()> {
        self.input.close().await
    }
}

/// Caps total rows returned across `next` calls at `limit`, skipping the
/// first `offset` rows it would otherwise have returned.
pub struct LimitOp {
    input: Box<dyn PhysicalOp>,
    remaining_offset: usize,
    remaining_limit: usize,
}

impl LimitOp {
    pub fn new(input: Box<dyn PhysicalOp>, limit: usize, offset: usize) -> Self {
        Self {
            input,
            remaining_offset: offset,
            remaining_limit: limit,
        }
    }
}

#[async_trait::async_trait]
impl PhysicalOp for LimitOp {
    async fn open(&mut self) -> CResult<()> {
        self.input.open().await
    }

    async fn next(&mut self, ctx: &QueryContext) -> CResult<Option<Vec<Row>>> {
        if ctx.is_canceled() {
            return Err(ReError::Canceled);
        }
        if self.remaining_limit == 0 {
            return Ok(None);
        }
        loop {
            match self.input.next(ctx).await? {
                None => return Ok(None),
                Some(mut batch) => {
                    if self.remaining_offset > 0 {
                        if self.remaining_offset >= batch.len() {
                            self.remaining_offset -= batch.len();
                            continue;
                        }
                        batch.drain(..self.remaining_offset);
                        self.remaining_offset = 0;
                    }
                    if batch.is_empty() {
                        continue;
                    }
                    if batch.len() > self.remaining_limit {
                        batch.truncate(self.remaining_limit);
                    }
                    self.remaining_limit -= batch.len();
                    return Ok(Some(batch));
                }
            }
        }
    }

    async fn close(&mut self) -> CResult<()> {
        self.input.close().await
    }
}

/// Builds the physical operator tree for the subset of `LogicalPlan`
/// variants that map directly onto a pull operator (`Scan`/`Filter`/
/// `Limit`). `Project`/`Sort`/`TopN`/`Join`/`Aggregate` are planned but
/// evaluated by the caller over the materialized rows for now.
pub fn build_executor(plan: &LogicalPlan, source: Arc<dyn DataSource>) -> CResult<Box<dyn PhysicalOp>> {
    match plan {
        LogicalPlan::Scan { table, filter, .. } => {
            Ok(Box::new(ScanOp::new(source, table.clone(), filter.clone())))
        }
        LogicalPlan::Filter { input, predicate } => {
            let input = build_executor(input, source)?;
            Ok(Box::new(FilterOp::new(input, predicate.clone())))
        }
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => {
            let input = build_executor(input, source)?;
            Ok(Box::new(LimitOp::new(input, *limit, *offset)))
        }
        other => Err(ReError::Unsupported(format!(
            "executor does not directly support plan node {other:?}"
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::{ColumnInfo, TableInfo, Value};
    use datasource::DataSourceConfig;
    use mvcc::MvccDataSource;

    async fn seeded_source() -> Arc<dyn DataSource> {
        let mut source = MvccDataSource::new(DataSourceConfig::new("mvcc", "planner-test"));
        source.connect().await.unwrap();
        let table = TableInfo::new(
            "nums",
            vec![ColumnInfo::new("n", "bigint").primary_key()],
        );
        source.create_table(&table).await.unwrap();
        let rows: Vec<Row> = (0..10)
            .map(|n| {
                let mut row = Row::new();
                row.set("n", Value::Int(n));
                row
            })
            .collect();
        source.insert("nums", rows).await.unwrap();
        Arc::new(source)
    }

    #[tokio::test]
    async fn scan_then_limit_caps_rows_pulled() {
        let source = seeded_source().await;
        let plan = LogicalPlan::Limit {
            input: Box::new(LogicalPlan::Scan {
                table: "nums".to_string(),
                schema: vec![],
                filter: None,
            }),
            limit: 3,
            offset: 0,
        };
        let mut op = build_executor(&plan, source).unwrap();
        let ctx = QueryContext::new(1, "SELECT n FROM nums LIMIT 3");
        op.open().await.unwrap();
        let mut total = 0;
        while let Some(batch) = op.next(&ctx).await.unwrap() {
            total += batch.len();
        }
        op.close().await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn canceled_context_stops_the_scan() {
        let source = seeded_source().await;
        let plan = LogicalPlan::Scan {
            table: "nums".to_string(),
            schema: vec![],
            filter: None,
        };
        let mut op = build_executor(&plan, source).unwrap();
        let ctx = QueryContext::new(1, "SELECT n FROM nums");
        op.open().await.unwrap();
        ctx.cancel();
        let err = op.next(&ctx).await.unwrap_err();
        assert!(matches!(err, ReError::Canceled));
    }
}
