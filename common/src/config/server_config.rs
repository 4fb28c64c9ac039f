use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::{CResult, ReError};

/// Top-level server configuration, loaded from a TOML file (see
/// `ServerConfig::load`). Field defaults mirror what a freshly accepted
/// connection would otherwise need to be told explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub server_version: String,
    pub max_packet_size: u32,
    pub default_database: String,
    pub query_timeout_secs: Option<u64>,
    pub executor_batch_size: usize,
    pub query_cache_max_size: usize,
    pub query_cache_ttl_secs: u64,
    pub index_advisor_capacity: usize,
    pub data_sources: HashMap<String, DataSourceSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3306,
            server_version: "8.0.34-sqlsrv".to_string(),
            max_packet_size: 16 * 1024 * 1024,
            default_database: "default".to_string(),
            query_timeout_secs: None,
            executor_batch_size: 1024,
            query_cache_max_size: 1000,
            query_cache_ttl_secs: 60,
            index_advisor_capacity: 1000,
            data_sources: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSourceSettings {
    pub backend_type: String,
    pub writable: bool,
    pub path: Option<String>,
    pub options: HashMap<String, String>,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> CResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ReError::ConfigError(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.max_packet_size, 16 * 1024 * 1024);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = ServerConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.port, cfg.port);
    }
}
