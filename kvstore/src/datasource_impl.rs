use std::sync::Mutex;

use common::err::{CResult, ReError};
use common::row::{Row, TableInfo, Value};
use datasource::{DataSource, DataSourceConfig, ExecResult, FilterExpr};

use crate::codec;
use crate::engine::KvEngine;
use crate::sequence::SequenceManager;

fn pk_key_text(info: &TableInfo, row: &Row) -> String {
    info.columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| row.get(&c.name).unwrap_or(&Value::Null).to_text())
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

/// Adapts `KvEngine` to the generic data-source contract. Rows are stored
/// keyed by `row\0<table>\0<pk text>`; table schema lives under
/// `meta\0<table>`; auto-increment columns are backed by `SequenceManager`.
pub struct KvDataSource {
    config: DataSourceConfig,
    engine: Option<KvEngine>,
    connected: bool,
    schema_cache: Mutex<Option<TableInfo>>,
}

impl KvDataSource {
    pub fn new(config: DataSourceConfig) -> Self {
        Self {
            config,
            engine: None,
            connected: false,
            schema_cache: Mutex::new(None),
        }
    }

    fn engine(&self) -> CResult<&KvEngine> {
        self.engine
            .as_ref()
            .ok_or_else(|| ReError::NotConnected(self.config.name.clone()))
    }

    fn storage_path(&self) -> CResult<String> {
        match self.config.option("path") {
            Some(Value::String(p)) => Ok(p.clone()),
            _ => Err(ReError::ConfigError(
                "kvstore data source requires a 'path' option".into(),
            )),
        }
    }

    fn load_table_info(&self, table: &str) -> CResult<TableInfo> {
        let engine = self.engine()?;
        let bytes = engine
            .get(&codec::table_meta_key(table))?
            .ok_or_else(|| ReError::TableNotFound(table.to_string()))?;
        codec::decode_table_info(&bytes)
    }
}

#[async_trait::async_trait]
impl DataSource for KvDataSource {
    async fn connect(&mut self) -> CResult<()> {
        let path = self.storage_path()?;
        self.engine = Some(KvEngine::open(path)?);
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> CResult<()> {
        self.engine = None;
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
        let engine = self.engine()?;
        let entries = engine.iter_prefix(b"meta\u{0}")?;
        Ok(entries
            .into_iter()
            .map(|(k, _)| String::from_utf8_lossy(&k[5..]).to_string())
            .collect())
    }

    async fn get_table_info(&self, table: &str) -> CResult<TableInfo> {
        self.load_table_info(table)
    }

    async fn query(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
        let engine = self.engine()?;
        let entries = engine.iter_prefix(&codec::row_prefix(table))?;
        let rows: CResult<Vec<Row>> = entries.into_iter().map(|(_, v)| codec::decode_row(&v)).collect();
        let rows = rows?;
        Ok(match filter {
            Some(expr) => rows
                .into_iter()
                .filter(|row| datasource::filter_eval::eval(expr, row))
                .collect(),
            None => rows,
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("insert into {table}")));
        }
        let info = self.load_table_info(table)?;
        let engine = self.engine()?;
        let sequences = SequenceManager::new(engine);
        let auto_inc_column = info.columns.iter().find(|c| c.auto_increment).map(|c| c.name.clone());
        let mut count = 0u64;
        for mut row in rows {
            if let Some(column) = &auto_inc_column {
                if row.get(column).map_or(true, |v| v.is_null()) {
                    let next = sequences.next(table)?;
                    row.set(column.clone(), Value::Int(next));
                }
            }
            let key = codec::row_key(table, &pk_key_text(&info, &row));
            let bytes = codec::encode_row(&row)?;
            engine.set(&key, &bytes)?;
            count += 1;
        }
        Ok(count)
    }

    async fn update(&self, table: &str, filter: Option<&FilterExpr>, changes: Row) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("update {table}")));
        }
        let info = self.load_table_info(table)?;
        let engine = self.engine()?;
        let entries = engine.iter_prefix(&codec::row_prefix(table))?;
        let mut count = 0u64;
        for (key, bytes) in entries {
            let mut row = codec::decode_row(&bytes)?;
            let matches = filter.map_or(true, |expr| datasource::filter_eval::eval(expr, &row));
            if !matches {
                continue;
            }
            for (name, value) in changes.iter() {
                row.set(name, value.clone());
            }
            let new_key = codec::row_key(table, &pk_key_text(&info, &row));
            if new_key != key {
                engine.delete(&key)?;
            }
            engine.set(&new_key, &codec::encode_row(&row)?)?;
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filter: Option<&FilterExpr>) -> CResult<u64> {
        if !self.is_writable() {
            return Err(ReError::ReadOnly(format!("delete from {table}")));
        }
        let engine = self.engine()?;
        let entries = engine.iter_prefix(&codec::row_prefix(table))?;
        let mut count = 0u64;
        for (key, bytes) in entries {
            let row = codec::decode_row(&bytes)?;
            let matches = filter.map_or(true, |expr| datasource::filter_eval::eval(expr, &row));
            if matches {
                engine.delete(&key)?;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn create_table(&self, info: &TableInfo) -> CResult<()> {
        info.validate().map_err(ReError::ConstraintViolation)?;
        let engine = self.engine()?;
        let key = codec::table_meta_key(&info.name);
        if engine.get(&key)?.is_some() {
            return Err(ReError::ConstraintViolation(format!(
                "table '{}' already exists",
                info.name
            )));
        }
        engine.set(&key, &codec::encode_table_info(info)?)
    }

    async fn drop_table(&self, table: &str) -> CResult<()> {
        let engine = self.engine()?;
        let key = codec::table_meta_key(table);
        if engine.get(&key)?.is_none() {
            return Err(ReError::TableNotFound(table.to_string()));
        }
        engine.delete(&key)?;
        for (k, _) in engine.iter_prefix(&codec::row_prefix(table))? {
            engine.delete(&k)?;
        }
        Ok(())
    }

    async fn truncate_table(&self, table: &str) -> CResult<()> {
        let engine = self.engine()?;
        for (k, _) in engine.iter_prefix(&codec::row_prefix(table))? {
            engine.delete(&k)?;
        }
        Ok(())
    }

    async fn execute(&self, _sql: &str) -> CResult<ExecResult> {
        Err(ReError::Unsupported(
            "raw SQL passthrough: route through the planner instead".into(),
        ))
    }
}
