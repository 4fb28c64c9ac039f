use std::collections::HashMap;
use std::sync::RwLock;

use common::err::{CResult, ReError};

use crate::config::{BackendType, DataSourceConfig};
use crate::contract::DataSource;

/// Engine metadata surfaced through `information_schema.ENGINES`.
#[derive(Debug, Clone)]
pub struct EngineMetadata {
    pub comment: String,
    pub supports_transactions: bool,
    pub supports_xa: bool,
    pub supports_savepoints: bool,
}

/// Builds `DataSource` instances for one backend type tag.
pub trait DataSourceFactory: Send + Sync {
    fn get_type(&self) -> BackendType;
    fn get_metadata(&self) -> EngineMetadata;
    fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>>;
}

/// Process-wide registry mapping backend-type tag to factory. Registration
/// is one-shot per tag; re-registering the same tag is an error.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<HashMap<BackendType, Box<dyn DataSourceFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, factory: Box<dyn DataSourceFactory>) -> CResult<()> {
        let backend_type = factory.get_type();
        let mut factories = self.factories.write().unwrap();
        if factories.contains_key(&backend_type) {
            return Err(ReError::DuplicateRegistration(backend_type.to_string()));
        }
        factories.insert(backend_type, factory);
        Ok(())
    }

    pub fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
        let factories = self.factories.read().unwrap();
        let factory = factories
            .get(&config.backend_type)
            .ok_or_else(|| ReError::DataSourceNotFound(config.backend_type.to_string()))?;
        factory.create(config)
    }

    pub fn metadata_for(&self, backend_type: &BackendType) -> Option<EngineMetadata> {
        self.factories
            .read()
            .unwrap()
            .get(backend_type)
            .map(|f| f.get_metadata())
    }

    pub fn registered_types(&self) -> Vec<BackendType> {
        self.factories.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct NoopSource {
        config: DataSourceConfig,
    }

    #[async_trait::async_trait]
    impl DataSource for NoopSource {
        async fn connect(&mut self) -> CResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> CResult<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn is_writable(&self) -> bool {
            self.config.writable
        }
        fn get_config(&self) -> &DataSourceConfig {
            &self.config
        }
        async fn get_tables(&self) -> CResult<Vec<String>> {
            Ok(vec![])
        }
        async fn get_table_info(&self, table: &str) -> CResult<common::row::TableInfo> {
            Err(ReError::TableNotFound(table.to_string()))
        }
        async fn query(
            &self,
            _table: &str,
            _filter: Option<&crate::filter::FilterExpr>,
        ) -> CResult<Vec<common::row::Row>> {
            Ok(vec![])
        }
        async fn insert(&self, _table: &str, rows: Vec<common::row::Row>) -> CResult<u64> {
            Ok(rows.len() as u64)
        }
        async fn update(
            &self,
            _table: &str,
            _filter: Option<&crate::filter::FilterExpr>,
            _changes: common::row::Row,
        ) -> CResult<u64> {
            Ok(0)
        }
        async fn delete(
            &self,
            _table: &str,
            _filter: Option<&crate::filter::FilterExpr>,
        ) -> CResult<u64> {
            Ok(0)
        }
        async fn create_table(&self, _info: &common::row::TableInfo) -> CResult<()> {
            Ok(())
        }
        async fn drop_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn truncate_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn execute(&self, _sql: &str) -> CResult<crate::contract::ExecResult> {
            Err(ReError::Unsupported("raw SQL passthrough".into()))
        }
    }

    struct NoopFactory;

    impl DataSourceFactory for NoopFactory {
        fn get_type(&self) -> BackendType {
            BackendType::new("noop")
        }
        fn get_metadata(&self) -> EngineMetadata {
            EngineMetadata {
                comment: "test-only no-op backend".into(),
                supports_transactions: false,
                supports_xa: false,
                supports_savepoints: false,
            }
        }
        fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
            Ok(Box::new(NoopSource { config }))
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = FactoryRegistry::new();
        registry.register(Box::new(NoopFactory)).unwrap();
        let err = registry.register(Box::new(NoopFactory)).unwrap_err();
        assert!(matches!(err, ReError::DuplicateRegistration(_)));
    }

    #[test]
    fn create_uses_registered_factory() {
        let registry = FactoryRegistry::new();
        registry.register(Box::new(NoopFactory)).unwrap();
        let config = DataSourceConfig::new("noop", "primary");
        let source = registry.create(config).unwrap();
        assert!(source.is_writable());
    }

    #[test]
    fn create_unknown_type_errors() {
        let registry = FactoryRegistry::new();
        let config = DataSourceConfig::new("missing", "x");
        let err = registry.create(config).unwrap_err();
        assert!(matches!(err, ReError::DataSourceNotFound(_)));
    }
}
