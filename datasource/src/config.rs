use std::collections::HashMap;

use common::row::Value;

/// Identifies which backend implementation a `DataSourceConfig` targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendType(pub String);

impl BackendType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable data-source configuration. A backend clones this if it needs a
/// derived view (e.g. a per-table sub-config); it never mutates the
/// original.
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    pub backend_type: BackendType,
    pub name: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub writable: bool,
    pub options: HashMap<String, Value>,
}

impl DataSourceConfig {
    pub fn new(backend_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            backend_type: BackendType::new(backend_type),
            name: name.into(),
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            writable: true,
            options: HashMap::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_config_defaults_to_writable_with_no_options() {
        let config = DataSourceConfig::new("mvcc", "primary");
        assert!(config.writable);
        assert!(config.options.is_empty());
        assert_eq!(config.backend_type.to_string(), "mvcc");
    }
}
