use std::sync::Arc;

use common::err::{CResult, ReError};
use common::row::{Row, TableInfo};
use dashmap::DashMap;

use crate::table::MvccTable;
use crate::txn::TxnManager;

/// The in-memory MVCC engine: a table namespace plus per-connection
/// temporary-table namespaces, all sharing one transaction counter so
/// snapshots are comparable across tables.
pub struct MvccEngine {
    pub(crate) txn: TxnManager,
    tables: DashMap<String, Arc<MvccTable>>,
    temp_tables: DashMap<(u32, String), Arc<MvccTable>>,
}

impl Default for MvccEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MvccEngine {
    pub fn new() -> Self {
        Self {
            txn: TxnManager::new(),
            tables: DashMap::new(),
            temp_tables: DashMap::new(),
        }
    }

    pub fn create_table(&self, info: TableInfo) -> CResult<()> {
        info.validate().map_err(ReError::ConstraintViolation)?;
        if info.temporary {
            return Err(ReError::Bug(
                "create_table: temporary tables must go through create_temp_table".into(),
            ));
        }
        if self.tables.contains_key(&info.name) {
            return Err(ReError::ConstraintViolation(format!(
                "table '{}' already exists",
                info.name
            )));
        }
        self.tables.insert(info.name.clone(), Arc::new(MvccTable::new(info)));
        Ok(())
    }

    /// Creates a table scoped to one connection's `thread_id`. Its name may
    /// shadow a regular table of the same name without affecting it; it's
    /// invisible to `get_tables` and dropped wholesale when the connection
    /// closes (`drop_connection_scope`).
    pub fn create_temp_table(&self, thread_id: u32, mut info: TableInfo) -> CResult<()> {
        info.temporary = true;
        info.validate().map_err(ReError::ConstraintViolation)?;
        let key = (thread_id, info.name.clone());
        if self.temp_tables.contains_key(&key) {
            return Err(ReError::ConstraintViolation(format!(
                "temporary table '{}' already exists",
                info.name
            )));
        }
        self.temp_tables.insert(key, Arc::new(MvccTable::new(info)));
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> CResult<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ReError::TableNotFound(name.to_string()))
    }

    pub fn drop_temp_table(&self, thread_id: u32, name: &str) -> CResult<()> {
        self.temp_tables
            .remove(&(thread_id, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ReError::TableNotFound(name.to_string()))
    }

    /// Drops every temporary table owned by `thread_id`. Called when a
    /// connection closes.
    pub fn drop_connection_scope(&self, thread_id: u32) {
        let keys: Vec<(u32, String)> = self
            .temp_tables
            .iter()
            .filter(|e| e.key().0 == thread_id)
            .map(|e| e.key().clone())
            .collect();
        for key in keys {
            self.temp_tables.remove(&key);
        }
    }

    /// Resolves a table by name, preferring a connection-scoped temporary
    /// table over a regular one of the same name.
    pub fn resolve(&self, thread_id: u32, name: &str) -> CResult<Arc<MvccTable>> {
        if let Some(t) = self.temp_tables.get(&(thread_id, name.to_string())) {
            return Ok(t.clone());
        }
        self.tables
            .get(name)
            .map(|t| t.clone())
            .ok_or_else(|| ReError::TableNotFound(name.to_string()))
    }

    /// Regular (non-temporary) table names only, as `get_tables` requires.
    pub fn get_tables(&self) -> Vec<String> {
        self.tables.iter().map(|e| e.key().clone()).collect()
    }

    /// Regular plus every connection's temporary tables, as `get_all_tables`
    /// requires.
    pub fn get_all_tables(&self) -> Vec<String> {
        let mut names = self.get_tables();
        names.extend(self.temp_tables.iter().map(|e| e.key().1.clone()));
        names
    }

    pub fn truncate_table(&self, thread_id: u32, name: &str, retain_sequences: bool) -> CResult<()> {
        let table = self.resolve(thread_id, name)?;
        table.truncate(retain_sequences);
        Ok(())
    }

    pub fn bulk_load(&self, thread_id: u32, name: &str, rows: Vec<Row>) -> CResult<usize> {
        let table = self.resolve(thread_id, name)?;
        table.bulk_load(&self.txn, rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::row::ColumnInfo;

    fn users_table() -> TableInfo {
        TableInfo::new(
            "users",
            vec![ColumnInfo::new("id", "bigint").primary_key()],
        )
    }

    #[test]
    fn regular_table_visible_to_get_tables_temp_table_is_not() {
        let engine = MvccEngine::new();
        engine.create_table(users_table()).unwrap();
        engine.create_temp_table(1, TableInfo::new("scratch", vec![])).unwrap();
        assert_eq!(engine.get_tables(), vec!["users".to_string()]);
        assert!(engine.get_all_tables().contains(&"scratch".to_string()));
    }

    #[test]
    fn temp_table_shadows_regular_table_of_same_name_for_owning_connection() {
        let engine = MvccEngine::new();
        engine.create_table(users_table()).unwrap();
        engine
            .create_temp_table(1, TableInfo::new("users", vec![ColumnInfo::new("x", "int")]))
            .unwrap();
        let resolved = engine.resolve(1, "users").unwrap();
        assert!(resolved.info().temporary);
        let resolved_other_conn = engine.resolve(2, "users").unwrap();
        assert!(!resolved_other_conn.info().temporary);
    }

    #[test]
    fn drop_connection_scope_removes_only_that_connections_temp_tables() {
        let engine = MvccEngine::new();
        engine.create_temp_table(1, TableInfo::new("a", vec![])).unwrap();
        engine.create_temp_table(2, TableInfo::new("b", vec![])).unwrap();
        engine.drop_connection_scope(1);
        assert!(engine.resolve(1, "a").is_err());
        assert!(engine.resolve(2, "b").is_ok());
    }
}
