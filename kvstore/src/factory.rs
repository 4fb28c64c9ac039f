use common::err::CResult;
use datasource::{BackendType, DataSource, DataSourceConfig, DataSourceFactory, EngineMetadata};

use crate::datasource_impl::KvDataSource;

/// Builds `KvDataSource` instances for the `"kvstore"` backend tag. The
/// actual WAL-backed engine is opened lazily on `connect`, from the
/// config's `path` option.
pub struct KvFactory;

impl DataSourceFactory for KvFactory {
    fn get_type(&self) -> BackendType {
        BackendType::new("kvstore")
    }

    fn get_metadata(&self) -> EngineMetadata {
        EngineMetadata {
            comment: "embedded byte-addressable KV engine with write-ahead log".into(),
            supports_transactions: false,
            supports_xa: false,
            supports_savepoints: false,
        }
    }

    fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
        Ok(Box::new(KvDataSource::new(config)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_builds_a_kv_data_source() {
        let factory = KvFactory;
        let config = DataSourceConfig::new("kvstore", "primary");
        let source = factory.create(config).unwrap();
        assert_eq!(source.get_config().name, "primary");
    }
}
