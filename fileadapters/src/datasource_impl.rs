use std::path::PathBuf;
use std::sync::Mutex;

use common::err::{CResult, ReError};
use common::row::{Row, TableInfo, Value};
use datasource::{DataSource, DataSourceConfig, ExecResult, FilterExpr, FilterableDataSource};
use mvcc::MvccDataSource;

use crate::format::FileFormat;
use crate::sidecar::{self, SidecarMeta};

const NO_SESSION_SCOPE: u32 = 0;

/// Wraps an in-memory `MvccDataSource` around a single on-disk file: on
/// `connect`, the file (and its optional `<path>.meta.json` sidecar) is
/// parsed and bulk-loaded into one MVCC table named after the format
/// (`csv_data`, `json_data`, ...); on `close`, a writable adapter
/// serialises the table's current contents back to disk atomically (write
/// to a temp file in the same directory, then rename over the original).
pub struct FileDataSource<F: FileFormat> {
    config: DataSourceConfig,
    format: F,
    inner: MvccDataSource,
    path: PathBuf,
    table_name: String,
    schema: Mutex<Option<TableInfo>>,
}

impl<F: FileFormat> FileDataSource<F> {
    pub fn new(config: DataSourceConfig, format: F) -> Self {
        let table_name = format.default_table_name().to_string();
        let mvcc_config = DataSourceConfig::new(config.backend_type.0.clone(), config.name.clone());
        Self {
            inner: MvccDataSource::new(mvcc_config),
            path: PathBuf::new(),
            table_name,
            schema: Mutex::new(None),
            config,
            format,
        }
    }

    fn storage_path(&self) -> CResult<PathBuf> {
        match self.config.option("path") {
            Some(Value::String(p)) => Ok(PathBuf::from(p)),
            _ => Err(ReError::ConfigError(
                "file data source requires a 'path' option".into(),
            )),
        }
    }

    fn schema(&self) -> CResult<TableInfo> {
        self.schema
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ReError::NotConnected(self.config.name.clone()))
    }
}

#[async_trait::async_trait]
impl<F: FileFormat> DataSource for FileDataSource<F> {
    async fn connect(&mut self) -> CResult<()> {
        let path = self.storage_path()?;
        let sidecar = sidecar::load(&path)?;
        let (info, indexes) = match sidecar {
            Some(SidecarMeta { schema, indexes }) => (schema, indexes),
            None => (self.format.infer_schema(&path, &self.table_name)?, Vec::new()),
        };
        self.inner.create_table(&info).await?;
        let rows = self.format.read_rows(&path, &info)?;
        self.inner.engine().bulk_load(NO_SESSION_SCOPE, &info.name, rows)?;
        for column in &indexes {
            self.inner.engine().resolve(NO_SESSION_SCOPE, &info.name)?.create_index(column)?;
        }
        *self.schema.lock().unwrap() = Some(info);
        self.path = path;
        self.inner.connect().await
    }

    async fn close(&mut self) -> CResult<()> {
        if self.config.writable {
            let info = self.schema()?;
            let rows = self.inner.query(&info.name, None).await?;
            self.format.write_rows(&self.path, &info, &rows)?;
            let table = self.inner.engine().resolve(NO_SESSION_SCOPE, &info.name)?;
            let indexes: Vec<String> = info
                .columns
                .iter()
                .filter(|c| table.has_index(&c.name))
                .map(|c| c.name.clone())
                .collect();
            drop(table);
            sidecar::save(&self.path, &SidecarMeta { schema: info, indexes })?;
        }
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_writable(&self) -> bool {
        self.config.writable
    }

    fn get_config(&self) -> &DataSourceConfig {
        &self.config
    }

    async fn get_tables(&self) -> CResult<Vec<String>> {
        self.inner.get_tables().await
    }

    async fn get_table_info(&self, table: &str) -> CResult<TableInfo> {
        self.inner.get_table_info(table).await
    }

    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
        self.inner.query(table, filter).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64> {
        self.inner.insert(table, rows).await
    }

    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64> {
        self.inner.update(table, filter, changes).await
    }

    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64> {
        self.inner.delete(table, filter).await
    }

    async fn create_table(&self, info: &TableInfo) -> CResult<()> {
        self.inner.create_table(info).await
    }

    async fn drop_table(&self, table: &str) -> CResult<()> {
        self.inner.drop_table(table).await
    }

    async fn truncate_table(&self, table: &str) -> CResult<()> {
        self.inner.truncate_table(table).await
    }

    async fn execute(&self, sql: &str) -> CResult<ExecResult> {
        self.inner.execute(sql).await
    }
}

#[async_trait::async_trait]
impl<F: FileFormat> FilterableDataSource for FileDataSource<F> {
    fn supports_pushdown(&self, table: &str) -> bool {
        self.inner.supports_pushdown(table)
    }

    async fn filter(
        &self,
        table: &str,
        expr: &FilterExpr,
        offset: usize,
        limit: usize,
    ) -> CResult<(Vec<Row>, u64)> {
        self.inner.filter(table, expr, offset, limit).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::csv_format::CsvFormat;
    use crate::json_format::JsonFormat;
    use common::row::ColumnInfo;

    fn config(path: &std::path::Path) -> DataSourceConfig {
        let mut cfg = DataSourceConfig::new("csv", "primary");
        cfg.options.insert("path".to_string(), Value::String(path.to_str().unwrap().to_string()));
        cfg
    }

    #[tokio::test]
    async fn connect_hydrates_csv_rows_into_mvcc_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "id,name\n1,ada\n2,grace\n").unwrap();
        let mut source = FileDataSource::new(config(&path), CsvFormat);
        source.connect().await.unwrap();
        let rows = source.query("csv_data", None).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn close_writes_back_inserted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "id,name\n1,ada\n").unwrap();
        let mut source = FileDataSource::new(config(&path), CsvFormat);
        source.connect().await.unwrap();
        let mut row = Row::new();
        row.set("id", Value::String("2".into()));
        row.set("name", Value::String("grace".into()));
        source.insert("csv_data", vec![row]).await.unwrap();
        source.close().await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("grace"));
    }

    #[tokio::test]
    async fn sidecar_schema_is_adopted_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"id":1,"name":"ada"}]"#).unwrap();
        let schema = TableInfo::new(
            "json_data",
            vec![
                ColumnInfo::new("id", "bigint").primary_key(),
                ColumnInfo::new("name", "varchar"),
            ],
        );
        sidecar::save(&path, &SidecarMeta { schema: schema.clone(), indexes: vec![] }).unwrap();
        let mut cfg = DataSourceConfig::new("json", "primary");
        cfg.options.insert("path".to_string(), Value::String(path.to_str().unwrap().to_string()));
        let mut source = FileDataSource::new(cfg, JsonFormat);
        source.connect().await.unwrap();
        let info = source.get_table_info("json_data").await.unwrap();
        assert!(info.columns[0].primary_key);
    }
}
