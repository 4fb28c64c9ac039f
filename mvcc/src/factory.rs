use common::err::CResult;
use datasource::{BackendType, DataSource, DataSourceConfig, DataSourceFactory, EngineMetadata};

use crate::datasource_impl::MvccDataSource;

/// Builds `MvccDataSource` instances for the `"mvcc"` backend tag — the
/// server's default in-memory engine, also the one every file-backed
/// adapter hydrates into.
pub struct MvccFactory;

impl DataSourceFactory for MvccFactory {
    fn get_type(&self) -> BackendType {
        BackendType::new("mvcc")
    }

    fn get_metadata(&self) -> EngineMetadata {
        EngineMetadata {
            comment: "in-memory MVCC row store with snapshot isolation".into(),
            supports_transactions: true,
            supports_xa: false,
            supports_savepoints: false,
        }
    }

    fn create(&self, config: DataSourceConfig) -> CResult<Box<dyn DataSource>> {
        Ok(Box::new(MvccDataSource::new(config)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_builds_an_mvcc_data_source() {
        let factory = MvccFactory;
        let config = DataSourceConfig::new("mvcc", "primary");
        let source = factory.create(config).unwrap();
        assert!(source.is_writable());
    }

    #[test]
    fn metadata_advertises_transaction_support() {
        assert!(MvccFactory.get_metadata().supports_transactions);
    }
}
