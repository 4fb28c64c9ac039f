use std::sync::Arc;

use common::err::{CResult, ReError};
use common::row::Row;
use datasource::factory::FactoryRegistry;
use datasource::manager::DataSourceManager;
use session::QueryRegistry;

use crate::acl::{AclAdapter, NoAcl};
use crate::index_advisor::IndexAdvisor;
use crate::tables;

/// Serves every virtual table this server exposes under
/// `information_schema`. Constructed once per server and shared behind an
/// `Arc`; an ACL adapter is optional — without one, every privilege table
/// query returns an empty result set instead of failing.
pub struct InformationSchemaProvider {
    data_sources: Arc<DataSourceManager>,
    factories: Arc<FactoryRegistry>,
    queries: Arc<QueryRegistry>,
    acl: Box<dyn AclAdapter>,
    index_advisor: IndexAdvisor,
}

impl InformationSchemaProvider {
    pub fn new(
        data_sources: Arc<DataSourceManager>,
        factories: Arc<FactoryRegistry>,
        queries: Arc<QueryRegistry>,
    ) -> Self {
        Self {
            data_sources,
            factories,
            queries,
            acl: Box::new(NoAcl),
            index_advisor: IndexAdvisor::new(),
        }
    }

    pub fn with_acl(mut self, acl: Box<dyn AclAdapter>) -> Self {
        self.acl = acl;
        self
    }

    pub fn index_advisor(&self) -> &IndexAdvisor {
        &self.index_advisor
    }

    /// Dispatches by virtual table name (case-insensitive, matching
    /// `information_schema`'s own case-insensitive identifier rules).
    /// `table` (a base-table argument) is required for per-table views
    /// (`COLUMNS`, `KEY_COLUMN_USAGE`, `TABLE_CONSTRAINTS`) and ignored by
    /// every other view.
    pub async fn query(&self, view: &str, instance: &str, table: Option<&str>) -> CResult<Vec<Row>> {
        match view.to_ascii_uppercase().as_str() {
            "SCHEMATA" => Ok(tables::schemata(&self.data_sources.names())),
            "TABLES" => {
                let handle = self.data_sources.get(instance)?;
                let source = handle.read().await;
                tables::tables(instance, source.as_ref()).await
            }
            "COLUMNS" => {
                let table = table.ok_or_else(|| ReError::Error("COLUMNS requires a table name".into()))?;
                let handle = self.data_sources.get(instance)?;
                let source = handle.read().await;
                tables::columns(instance, source.as_ref(), table).await
            }
            "KEY_COLUMN_USAGE" => {
                let table = table.ok_or_else(|| ReError::Error("KEY_COLUMN_USAGE requires a table name".into()))?;
                let handle = self.data_sources.get(instance)?;
                let source = handle.read().await;
                tables::key_column_usage(instance, source.as_ref(), table).await
            }
            "TABLE_CONSTRAINTS" => {
                let table = table.ok_or_else(|| ReError::Error("TABLE_CONSTRAINTS requires a table name".into()))?;
                let handle = self.data_sources.get(instance)?;
                let source = handle.read().await;
                tables::table_constraints(instance, source.as_ref(), table).await
            }
            "ENGINES" => Ok(tables::engines(&self.factories)),
            "PROCESSLIST" => Ok(tables::processlist(&self.queries)),
            "USER_PRIVILEGES" => Ok(tables::user_privileges(self.acl.as_ref())),
            "SCHEMA_PRIVILEGES" => Ok(tables::schema_privileges(self.acl.as_ref(), instance)),
            "INDEX_ADVISOR_RESULTS" => Ok(crate::index_advisor::rows(&self.index_advisor)),
            other => Err(ReError::TableNotFound(format!("information_schema.{other}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::{ColumnInfo, TableInfo};
    use datasource::config::DataSourceConfig;
    use datasource::contract::DataSource;
    use mvcc::MvccDataSource;

    async fn seeded_source() -> Box<dyn DataSource> {
        let mut source = MvccDataSource::new(DataSourceConfig::new("mvcc", "primary"));
        source.connect().await.unwrap();
        Box::new(source)
    }

    #[tokio::test]
    async fn unknown_view_errors() {
        let data_sources = Arc::new(DataSourceManager::new());
        let factories = Arc::new(FactoryRegistry::new());
        let queries = Arc::new(QueryRegistry::new());
        let provider = InformationSchemaProvider::new(data_sources, factories, queries);
        let err = provider.query("NOT_A_VIEW", "primary", None).await.unwrap_err();
        assert!(matches!(err, ReError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn engines_reflects_registered_factories() {
        use datasource::contract::DataSource;
        use datasource::factory::{DataSourceFactory, EngineMetadata};

        struct DummyFactory;
        impl DataSourceFactory for DummyFactory {
            fn get_type(&self) -> datasource::config::BackendType {
                datasource::config::BackendType::new("mvcc")
            }
            fn get_metadata(&self) -> EngineMetadata {
                EngineMetadata {
                    comment: "in-memory MVCC engine".into(),
                    supports_transactions: true,
                    supports_xa: false,
                    supports_savepoints: false,
                }
            }
            fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
                Ok(Box::new(MvccDataSource::new(config)))
            }
        }

        let data_sources = Arc::new(DataSourceManager::new());
        let factories = Arc::new(FactoryRegistry::new());
        factories.register(Box::new(DummyFactory)).unwrap();
        let queries = Arc::new(QueryRegistry::new());
        let provider = InformationSchemaProvider::new(data_sources, factories, queries);
        let rows = provider.query("ENGINES", "primary", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("ENGINE"), Some(&common::row::Value::String("mvcc".to_string())));
    }

    #[tokio::test]
    async fn columns_view_requires_a_table_argument() {
        let data_sources = Arc::new(DataSourceManager::new());
        data_sources.register("primary", seeded_source().await).unwrap();
        let factories = Arc::new(FactoryRegistry::new());
        let queries = Arc::new(QueryRegistry::new());
        let provider = InformationSchemaProvider::new(data_sources, factories, queries);
        let err = provider.query("COLUMNS", "primary", None).await.unwrap_err();
        assert!(matches!(err, ReError::Error(_)));
    }

    #[tokio::test]
    async fn columns_view_reports_table_schema_from_seeded_source() {
        let mut source = MvccDataSource::new(DataSourceConfig::new("mvcc", "primary"));
        source.connect().await.unwrap();
        let info = TableInfo::new("users", vec![ColumnInfo::new("id", "bigint").primary_key()]);
        source.create_table(&info).await.unwrap();
        let data_sources = Arc::new(DataSourceManager::new());
        data_sources.register("primary", Box::new(source)).unwrap();
        let factories = Arc::new(FactoryRegistry::new());
        let queries = Arc::new(QueryRegistry::new());
        let provider = InformationSchemaProvider::new(data_sources, factories, queries);
        let rows = provider.query("COLUMNS", "primary", Some("users")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("COLUMN_NAME"), Some(&common::row::Value::String("id".to_string())));
    }
}
