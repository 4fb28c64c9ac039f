use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::err::{CResult, ReError};
use tokio::sync::RwLock as AsyncRwLock;

use crate::contract::DataSource;

/// Owns every named `DataSource` instance for the process: lifecycle
/// (connect/close all), a default instance name, and an enabled-types
/// filter so a deployment can restrict which backend tags may be
/// instantiated at all.
pub struct DataSourceManager {
    instances: RwLock<HashMap<String, Arc<AsyncRwLock<Box<dyn DataSource>>>>>,
    default_name: RwLock<Option<String>>,
    enabled_types: RwLock<Option<Vec<String>>>,
}

impl Default for DataSourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSourceManager {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            default_name: RwLock::new(None),
            enabled_types: RwLock::new(None),
        }
    }

    /// Restricts which backend-type tags may be registered. `None` (the
    /// default) allows any type.
    pub fn set_enabled_types(&self, types: Option<Vec<String>>) {
        *self.enabled_types.write().unwrap() = types;
    }

    pub fn register(&self, name: impl Into<String>, source: Box<dyn DataSource>) -> CResult<()> {
        let name = name.into();
        if let Some(allowed) = self.enabled_types.read().unwrap().as_ref() {
            let backend_type = source.get_config().backend_type.to_string();
            if !allowed.iter().any(|t| t == &backend_type) {
                return Err(ReError::Unsupported(format!(
                    "backend type '{backend_type}' is not enabled"
                )));
            }
        }
        let mut instances = self.instances.write().unwrap();
        if instances.contains_key(&name) {
            return Err(ReError::DuplicateRegistration(name));
        }
        instances.insert(name, Arc::new(AsyncRwLock::new(source)));
        Ok(())
    }

    pub fn set_default(&self, name: impl Into<String>) -> CResult<()> {
        let name = name.into();
        if !self.instances.read().unwrap().contains_key(&name) {
            return Err(ReError::DataSourceNotFound(name));
        }
        *self.default_name.write().unwrap() = Some(name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> CResult<Arc<AsyncRwLock<Box<dyn DataSource>>>> {
        self.instances
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ReError::DataSourceNotFound(name.to_string()))
    }

    pub fn get_default(&self) -> CResult<Arc<AsyncRwLock<Box<dyn DataSource>>>> {
        let name = self
            .default_name
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| ReError::DataSourceNotFound("<no default set>".to_string()))?;
        self.get(&name)
    }

    pub fn names(&self) -> Vec<String> {
        self.instances.read().unwrap().keys().cloned().collect()
    }

    pub async fn connect_all(&self) -> CResult<()> {
        let instances: Vec<_> = self.instances.read().unwrap().values().cloned().collect();
        for instance in instances {
            instance.write().await.connect().await?;
        }
        Ok(())
    }

    pub async fn close_all(&self) -> CResult<()> {
        let instances: Vec<_> = self.instances.read().unwrap().values().cloned().collect();
        for instance in instances {
            instance.write().await.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use common::row::{Row, TableInfo};

    use super::*;
    use crate::config::DataSourceConfig;
    use crate::contract::ExecResult;
    use crate::filter::FilterExpr;

    struct Dummy {
        config: DataSourceConfig,
        connected: bool,
    }

    #[async_trait::async_trait]
    impl DataSource for Dummy {
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
            true
        }
        fn get_config(&self) -> &DataSourceConfig {
            &self.config
        }
        async fn get_tables(&self) -> CResult<Vec<String>> {
            Ok(vec![])
        }
        async fn get_table_info(&self, table: &str) -> CResult<TableInfo> {
            Err(ReError::TableNotFound(table.to_string()))
        }
        async fn query(&self, _table: &str, _filter: Option<&FilterExpr>) -> CResult<Vec<Row>> {
            Ok(vec![])
        }
        async fn insert(&self, _table: &str, rows: Vec<Row>) -> CResult<u64> {
            Ok(rows.len() as u64)
        }
        async fn update(&self, _table: &str, _filter: Option<&FilterExpr>, _changes: Row) -> CResult<u64> {
            Ok(0)
        }
        async fn delete(&self, _table: &str, _filter: Option<&FilterExpr>) -> CResult<u64> {
            Ok(0)
        }
        async fn create_table(&self, _info: &TableInfo) -> CResult<()> {
            Ok(())
        }
        async fn drop_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn truncate_table(&self, _table: &str) -> CResult<()> {
            Ok(())
        }
        async fn execute(&self, _sql: &str) -> CResult<ExecResult> {
            Err(ReError::Unsupported("raw SQL passthrough".into()))
        }
    }

    #[tokio::test]
    async fn connect_all_connects_every_registered_instance() {
        let manager = DataSourceManager::new();
        let dummy = Dummy {
            config: DataSourceConfig::new("mvcc", "primary"),
            connected: false,
        };
        manager.register("primary", Box::new(dummy)).unwrap();
        manager.set_default("primary").unwrap();
        manager.connect_all().await.unwrap();
        let handle = manager.get_default().unwrap();
        assert!(handle.read().await.is_connected());
    }

    #[test]
    fn disallowed_backend_type_is_rejected() {
        let manager = DataSourceManager::new();
        manager.set_enabled_types(Some(vec!["kvstore".to_string()]));
        let dummy = Dummy {
            config: DataSourceConfig::new("mvcc", "primary"),
            connected: false,
        };
        let err = manager.register("primary", Box::new(dummy)).unwrap_err();
        assert!(matches!(err, ReError::Unsupported(_)));
    }
}
